// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, Level};

use super::thread_priority::configure_render_thread_priority;
use crate::synth::Synthesizer;

/// How long `Output::start` waits for the stream to come up.
const STREAM_START_TIMEOUT: Duration = Duration::from_secs(5);

/// Single producer, single consumer ring of interleaved samples. Samples are
/// stored as raw `f32` bits so both sides can share the buffer without locks.
struct RingBuffer {
    samples: Box<[AtomicU32]>,
    /// Always a power of two.
    capacity: usize,
    read_pos: AtomicUsize,
    write_pos: AtomicUsize,
}

impl RingBuffer {
    fn new(capacity: usize) -> RingBuffer {
        let capacity = capacity.next_power_of_two();
        RingBuffer {
            samples: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            capacity,
            read_pos: AtomicUsize::new(0),
            write_pos: AtomicUsize::new(0),
        }
    }

    fn available(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read) & (self.capacity - 1)
    }

    /// One slot stays empty so a full ring is distinguishable from an empty one.
    fn space(&self) -> usize {
        self.capacity - self.available() - 1
    }

    /// Returns the number of samples written.
    fn write(&self, samples: &[f32]) -> usize {
        let count = self.space().min(samples.len());
        let mask = self.capacity - 1;
        let write = self.write_pos.load(Ordering::Relaxed);
        for (i, sample) in samples[..count].iter().enumerate() {
            self.samples[(write + i) & mask].store(sample.to_bits(), Ordering::Relaxed);
        }
        self.write_pos.store((write + count) & mask, Ordering::Release);
        count
    }

    /// Returns the number of samples read.
    fn read(&self, output: &mut [f32]) -> usize {
        let count = self.available().min(output.len());
        let mask = self.capacity - 1;
        let read = self.read_pos.load(Ordering::Relaxed);
        for (i, sample) in output[..count].iter_mut().enumerate() {
            *sample = f32::from_bits(self.samples[(read + i) & mask].load(Ordering::Relaxed));
        }
        self.read_pos.store((read + count) & mask, Ordering::Release);
        count
    }
}

/// An output device as reported by the host.
pub struct DeviceInfo {
    pub name: String,
    pub host_id: cpal::HostId,
    pub max_channels: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// Lists output devices across all hosts.
pub fn list_devices() -> Result<Vec<DeviceInfo>, Box<dyn Error>> {
    Ok(output_devices()?
        .into_iter()
        .map(|(info, _)| info)
        .collect())
}

fn output_devices() -> Result<Vec<(DeviceInfo, cpal::Device)>, Box<dyn Error>> {
    // Suppress noisy output here.
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    let mut devices = Vec::new();
    for host_id in cpal::available_hosts() {
        let host_devices = match cpal::host_from_id(host_id)?.devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let Ok(configs) = device.supported_output_configs() else {
                continue;
            };
            let max_channels = configs.map(|c| c.channels()).max().unwrap_or(0);
            if max_channels == 0 {
                continue;
            }
            let Ok(name) = device.name() else {
                continue;
            };
            devices.push((
                DeviceInfo {
                    name,
                    host_id,
                    max_channels,
                },
                device,
            ));
        }
    }

    devices.sort_by(|(a, _), (b, _)| a.name.cmp(&b.name));
    Ok(devices)
}

/// Finds a device by name, or the default output device.
fn find_device(name: Option<&str>) -> Result<cpal::Device, Box<dyn Error>> {
    match name {
        Some(name) => output_devices()?
            .into_iter()
            .find(|(info, _)| info.name.trim() == name)
            .map(|(_, device)| device)
            .ok_or_else(|| format!("no device found with name {}", name).into()),
        None => cpal::default_host()
            .default_output_device()
            .ok_or_else(|| "no default output device".into()),
    }
}

/// Reads from the ring into the device buffer, converting to the device format.
fn output_callback<T>(
    ring: Arc<RingBuffer>,
    underruns: Arc<AtomicU64>,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        if scratch.len() < data.len() {
            scratch.resize(data.len(), 0.0);
        }
        let scratch = &mut scratch[..data.len()];
        let read = ring.read(scratch);
        if read < scratch.len() {
            scratch[read..].fill(0.0);
            underruns.fetch_add(1, Ordering::Relaxed);
        }
        for (dst, src) in data.iter_mut().zip(scratch.iter()) {
            *dst = T::from_sample(*src);
        }
    }
}

fn build_stream(
    device: &cpal::Device,
    sample_format: cpal::SampleFormat,
    config: &cpal::StreamConfig,
    ring: Arc<RingBuffer>,
    underruns: Arc<AtomicU64>,
) -> Result<cpal::Stream, Box<dyn Error>> {
    let on_error = |err: cpal::StreamError| error!("CPAL output stream error: {}", err);
    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_output_stream(
            config,
            output_callback::<f32>(ring, underruns),
            on_error,
            None,
        )?,
        cpal::SampleFormat::I16 => device.build_output_stream(
            config,
            output_callback::<i16>(ring, underruns),
            on_error,
            None,
        )?,
        cpal::SampleFormat::I32 => device.build_output_stream(
            config,
            output_callback::<i32>(ring, underruns),
            on_error,
            None,
        )?,
        format => return Err(format!("unsupported sample format {}", format).into()),
    };
    Ok(stream)
}

/// Real-time output. A producer thread owns the synthesizer and keeps a ring
/// buffer topped up; the cpal callback only copies out of the ring.
pub struct Output {
    name: String,
    sample_rate: u32,
    channels: u16,
    running: Arc<AtomicBool>,
    underruns: Arc<AtomicU64>,
    producer_thread: Option<thread::JoinHandle<()>>,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl Output {
    /// Opens the device and starts rendering. The synthesizer's sample rate is
    /// used for the stream.
    pub fn start(
        device_name: Option<&str>,
        mut synth: Synthesizer,
        block_size: usize,
    ) -> Result<Output, Box<dyn Error>> {
        let span = span!(Level::INFO, "audio output (cpal)");
        let _enter = span.enter();

        let device = find_device(device_name)?;
        let name = device.name()?;
        let default_config = device.default_output_config()?;
        let sample_format = default_config.sample_format();
        let channels = default_config.channels().max(1);
        let sample_rate = synth.options().sample_rate;

        // Roughly 100ms of audio.
        let capacity = (sample_rate as usize * channels as usize) / 10;
        let ring = Arc::new(RingBuffer::new(capacity.max(1024)));
        let running = Arc::new(AtomicBool::new(true));
        let underruns = Arc::new(AtomicU64::new(0));

        let producer_thread = {
            let ring = ring.clone();
            let running = running.clone();
            let block_size = block_size.max(1);
            thread::spawn(move || {
                configure_render_thread_priority();
                let mut left = vec![0.0f32; block_size];
                let mut right = vec![0.0f32; block_size];
                let mut interleaved = vec![0.0f32; block_size * channels as usize];
                while running.load(Ordering::Relaxed) {
                    if ring.space() < interleaved.len() {
                        thread::sleep(Duration::from_micros(500));
                        continue;
                    }
                    synth.render(&mut left, &mut right);
                    interleave(&left, &right, channels, &mut interleaved);
                    ring.write(&interleaved);
                }
            })
        };

        let (started_tx, started_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let output_thread = {
            let running = running.clone();
            let underruns = underruns.clone();
            let config = cpal::StreamConfig {
                channels,
                sample_rate: sample_rate,
                buffer_size: cpal::BufferSize::Default,
            };
            // The stream isn't Send on every platform, so it lives and dies here.
            thread::spawn(move || {
                let stream = build_stream(&device, sample_format, &config, ring, underruns)
                    .and_then(|stream| {
                        stream.play()?;
                        Ok(stream)
                    });
                let stream = match stream {
                    Ok(stream) => {
                        let _ = started_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = started_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                while running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(50));
                }
                drop(stream);
            })
        };

        let mut output = Output {
            name,
            sample_rate,
            channels,
            running,
            underruns,
            producer_thread: Some(producer_thread),
            output_thread: Some(output_thread),
        };
        match started_rx.recv_timeout(STREAM_START_TIMEOUT) {
            Ok(Ok(())) => {
                info!(
                    device = output.name,
                    sample_rate,
                    channels,
                    format = %sample_format,
                    "CPAL output stream started"
                );
                Ok(output)
            }
            Ok(Err(e)) => {
                output.stop();
                Err(format!("failed to start output stream: {}", e).into())
            }
            Err(e) => {
                output.stop();
                Err(format!("output stream never started: {}", e).into())
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Callbacks that ran out of rendered audio.
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    /// Stops rendering and closes the stream.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        for thread in [self.producer_thread.take(), self.output_thread.take()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = thread.join() {
                error!("Error waiting for audio thread: {:?}", e);
            }
        }
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        self.stop();
        info!(underruns = self.underruns(), "Audio output stopped");
    }
}

/// Writes a stereo block into a frame-interleaved buffer with `channels`
/// channels. Mono devices get the average, extra channels stay silent.
fn interleave(left: &[f32], right: &[f32], channels: u16, out: &mut [f32]) {
    let channels = channels as usize;
    for ((frame, l), r) in out.chunks_exact_mut(channels).zip(left).zip(right) {
        if channels == 1 {
            frame[0] = (l + r) * 0.5;
            continue;
        }
        frame[0] = *l;
        frame[1] = *r;
        frame[2..].fill(0.0);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ring_buffer_wraps() {
        let ring = RingBuffer::new(8);
        assert_eq!(ring.space(), 7);
        assert_eq!(ring.write(&[1.0, 2.0, 3.0, 4.0, 5.0]), 5);

        let mut out = [0.0; 4];
        assert_eq!(ring.read(&mut out), 4);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);

        // Crosses the end of the backing buffer.
        assert_eq!(ring.write(&[6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0]), 6);
        assert_eq!(ring.space(), 0);
        let mut out = [0.0; 8];
        assert_eq!(ring.read(&mut out), 7);
        assert_eq!(&out[..7], &[5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn test_interleave() {
        let left = [0.5, -0.5];
        let right = [0.25, 1.0];

        let mut stereo = [9.0; 4];
        interleave(&left, &right, 2, &mut stereo);
        assert_eq!(stereo, [0.5, 0.25, -0.5, 1.0]);

        let mut mono = [9.0; 2];
        interleave(&left, &right, 1, &mut mono);
        assert_eq!(mono, [0.375, 0.25]);

        let mut quad = [9.0; 8];
        interleave(&left, &right, 4, &mut quad);
        assert_eq!(quad, [0.5, 0.25, 0.0, 0.0, -0.5, 1.0, 0.0, 0.0]);
    }
}
