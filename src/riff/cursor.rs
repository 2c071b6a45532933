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
use super::error::LoadError;

/// A sequential little-endian reader over a borrowed buffer.
///
/// Sub-cursors keep the absolute offset of their first byte within the root buffer,
/// so a leaf payload can be recorded as offset + length instead of being copied.
#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    /// The bytes visible to this cursor.
    bytes: &'a [u8],
    /// Absolute offset of `bytes[0]` within the root buffer.
    base: usize,
    /// Read position relative to `bytes`.
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor over the whole buffer.
    pub fn new(bytes: &'a [u8]) -> Cursor<'a> {
        Cursor {
            bytes,
            base: 0,
            pos: 0,
        }
    }

    /// Position relative to the start of this cursor.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Position relative to the start of the root buffer.
    pub fn absolute_position(&self) -> usize {
        self.base + self.pos
    }

    /// Absolute offset of the first byte visible to this cursor.
    pub fn absolute_start(&self) -> usize {
        self.base
    }

    /// Total number of bytes visible to this cursor.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The unread bytes.
    pub fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], LoadError> {
        if self.remaining() < len {
            return Err(LoadError::malformed(
                self.absolute_position(),
                format!("needed {} bytes, {} remaining", len, self.remaining()),
            ));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], LoadError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, LoadError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, LoadError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, LoadError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, LoadError> {
        Ok(i16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, LoadError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    /// Reads a four character code.
    pub fn read_tag(&mut self) -> Result<[u8; 4], LoadError> {
        self.take_array()
    }

    /// Reads a fixed-width, NUL-padded string. Anything after the first NUL is dropped.
    pub fn read_fixed_string(&mut self, len: usize) -> Result<String, LoadError> {
        let raw = self.take(len)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).trim_end().to_string())
    }

    pub fn skip(&mut self, len: usize) -> Result<(), LoadError> {
        self.take(len).map(|_| ())
    }

    /// Splits off the next `len` bytes as an independent cursor and advances past them.
    pub fn sub_cursor(&mut self, len: usize) -> Result<Cursor<'a>, LoadError> {
        let base = self.absolute_position();
        let bytes = self.take(len)?;
        Ok(Cursor { bytes, base, pos: 0 })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fixed_width_reads() {
        let bytes = [0x01, 0x34, 0x12, 0xfe, 0xff, 0x78, 0x56, 0x34, 0x12];
        let mut cursor = Cursor::new(&bytes);

        assert_eq!(cursor.read_u8().unwrap(), 1);
        assert_eq!(cursor.read_u16().unwrap(), 0x1234);
        assert_eq!(cursor.read_i16().unwrap(), -2);
        assert_eq!(cursor.read_u32().unwrap(), 0x12345678);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_read_past_end() {
        let bytes = [0x01, 0x02];
        let mut cursor = Cursor::new(&bytes);
        cursor.read_u8().unwrap();

        let err = cursor.read_u32().unwrap_err();
        assert!(err.is_malformed());
        // A failed read doesn't move the cursor.
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_sub_cursor_is_independent() {
        let bytes = [1, 2, 3, 4, 5, 6];
        let mut cursor = Cursor::new(&bytes);
        cursor.skip(1).unwrap();

        let mut sub = cursor.sub_cursor(3).unwrap();
        assert_eq!(sub.absolute_start(), 1);
        assert_eq!(sub.len(), 3);
        assert_eq!(sub.read_u8().unwrap(), 2);
        assert_eq!(sub.absolute_position(), 2);

        // The parent has moved past the whole sub-slice.
        assert_eq!(cursor.read_u8().unwrap(), 5);
        assert!(sub.sub_cursor(5).is_err());
    }

    #[test]
    fn test_fixed_string() {
        let bytes = b"Piano\0\0garbage\0\0\0\0\0\0";
        let mut cursor = Cursor::new(bytes);
        assert_eq!(cursor.read_fixed_string(20).unwrap(), "Piano");
        assert_eq!(cursor.position(), 20);
    }
}
