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
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, span, Level, Span};

use crate::{
    playsync::CancelHandle,
    sequencer::{MasterClock, MidiSink, Sequencer, Timeline},
};

/// Requests the sequencer thread applies between ticks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlayerCommand {
    Pause,
    Resume,
    Seek(f64),
    SetPlaybackRate(f64),
    SetLoopPlayback(bool),
}

/// What the sequencer thread last reported.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlayerStatus {
    pub position: f64,
    pub duration: f64,
    pub playing: bool,
    /// The end of the file was reached without looping.
    pub finished: bool,
}

/// Options for the sequencer thread.
#[derive(Clone, Copy, Debug)]
pub struct PlayerOptions {
    /// How long the thread sleeps between ticks.
    pub scheduler_interval: Duration,
    pub loop_playback: bool,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        PlayerOptions {
            scheduler_interval: Duration::from_millis(5),
            loop_playback: false,
        }
    }
}

/// Runs a [`Sequencer`] on its own thread. The thread only ticks the sequencer,
/// so the sink is expected to be cheap, like a `SynthHandle` that enqueues
/// commands for the render thread.
pub struct Player {
    commands: Sender<PlayerCommand>,
    status: Arc<Mutex<PlayerStatus>>,
    cancel_handle: CancelHandle,
    /// Set when the thread exits, for any reason.
    done: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
    span: Span,
}

impl Player {
    /// Starts playing the timeline from the beginning.
    pub fn start<S>(
        timeline: Arc<Timeline>,
        sink: S,
        clock: Arc<dyn MasterClock>,
        options: PlayerOptions,
    ) -> Player
    where
        S: MidiSink + Send + 'static,
    {
        let span = span!(Level::INFO, "player");
        let (commands, command_rx) = crossbeam_channel::unbounded();
        let status = Arc::new(Mutex::new(PlayerStatus {
            duration: timeline.duration(),
            ..PlayerStatus::default()
        }));
        let cancel_handle = CancelHandle::new();
        let done = Arc::new(AtomicBool::new(false));

        let mut sequencer = Sequencer::new(timeline, sink, clock);
        sequencer.set_loop_playback(options.loop_playback);

        let join = {
            let status = status.clone();
            let cancel_handle = cancel_handle.clone();
            let done = done.clone();
            let span = span.clone();
            thread::spawn(move || {
                let _enter = span.enter();
                run(
                    sequencer,
                    command_rx,
                    &status,
                    &cancel_handle,
                    options.scheduler_interval,
                );
                done.store(true, Ordering::Relaxed);
                cancel_handle.notify();
            })
        };

        Player {
            commands,
            status,
            cancel_handle,
            done,
            join: Some(join),
            span,
        }
    }

    fn send(&self, command: PlayerCommand) {
        if self.commands.send(command).is_err() {
            debug!(parent: &self.span, ?command, "Player thread already exited");
        }
    }

    pub fn pause(&self) {
        self.send(PlayerCommand::Pause);
    }

    pub fn resume(&self) {
        self.send(PlayerCommand::Resume);
    }

    pub fn seek(&self, seconds: f64) {
        self.send(PlayerCommand::Seek(seconds));
    }

    pub fn set_playback_rate(&self, rate: f64) {
        self.send(PlayerCommand::SetPlaybackRate(rate));
    }

    pub fn set_loop_playback(&self, loop_playback: bool) {
        self.send(PlayerCommand::SetLoopPlayback(loop_playback));
    }

    pub fn status(&self) -> PlayerStatus {
        *self.status.lock()
    }

    /// True once the sequencer thread has exited.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Relaxed)
    }

    /// Blocks until the file finishes or the player is stopped.
    pub fn wait(&mut self) {
        self.cancel_handle.wait(self.done.clone());
        self.join_thread();
    }

    /// Stops playback and joins the sequencer thread.
    pub fn stop(&mut self) {
        self.cancel_handle.cancel();
        self.join_thread();
    }

    fn join_thread(&mut self) {
        if let Some(join) = self.join.take() {
            if let Err(e) = join.join() {
                error!(parent: &self.span, "Error waiting for the sequencer thread: {:?}", e);
            }
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<S: MidiSink>(
    mut sequencer: Sequencer<S>,
    commands: Receiver<PlayerCommand>,
    status: &Mutex<PlayerStatus>,
    cancel_handle: &CancelHandle,
    interval: Duration,
) {
    sequencer.play(true);
    loop {
        if cancel_handle.is_cancelled() {
            info!("Playback cancelled");
            sequencer.stop();
            break;
        }

        while let Ok(command) = commands.try_recv() {
            debug!(?command, "Player command");
            match command {
                PlayerCommand::Pause => sequencer.pause(),
                PlayerCommand::Resume => sequencer.play(false),
                PlayerCommand::Seek(seconds) => sequencer.set_current_time(seconds),
                PlayerCommand::SetPlaybackRate(rate) => sequencer.set_playback_rate(rate),
                PlayerCommand::SetLoopPlayback(loop_playback) => {
                    sequencer.set_loop_playback(loop_playback)
                }
            }
        }

        sequencer.process_tick();
        *status.lock() = PlayerStatus {
            position: sequencer.current_time(),
            duration: sequencer.duration(),
            playing: sequencer.is_playing(),
            finished: sequencer.is_finished(),
        };

        if sequencer.is_finished() {
            break;
        }
        spin_sleep::sleep(interval);
    }
}
