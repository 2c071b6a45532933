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
use std::fmt;

use super::{cursor::Cursor, error::LoadError};

/// A four character chunk code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    pub const RIFF: Tag = Tag(*b"RIFF");
    pub const LIST: Tag = Tag(*b"LIST");

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self)
    }
}

impl PartialEq<&[u8; 4]> for Tag {
    fn eq(&self, other: &&[u8; 4]) -> bool {
        &self.0 == *other
    }
}

/// A single chunk: its tag, declared size and a cursor over its payload.
#[derive(Clone, Debug)]
pub struct Chunk<'a> {
    pub tag: Tag,
    pub size: u32,
    pub payload: Cursor<'a>,
}

impl Chunk<'_> {
    /// Absolute offset of the payload in the root buffer.
    pub fn payload_offset(&self) -> usize {
        self.payload.absolute_start()
    }
}

/// Reads one chunk from the cursor, skipping the pad byte after odd-sized payloads.
pub fn read_chunk<'a>(cursor: &mut Cursor<'a>) -> Result<Chunk<'a>, LoadError> {
    let offset = cursor.absolute_position();
    if cursor.remaining() < 8 {
        return Err(LoadError::malformed(
            offset,
            format!("chunk header needs 8 bytes, {} remaining", cursor.remaining()),
        ));
    }

    let tag = Tag(cursor.read_tag()?);
    let size = cursor.read_u32()?;
    if size as usize > cursor.remaining() {
        return Err(LoadError::malformed(
            offset,
            format!(
                "chunk '{}' declares {} bytes, {} remaining",
                tag,
                size,
                cursor.remaining()
            ),
        ));
    }

    let payload = cursor.sub_cursor(size as usize)?;
    if size % 2 == 1 && !cursor.is_empty() {
        cursor.skip(1)?;
    }

    Ok(Chunk { tag, size, payload })
}

/// Reads a chunk that must be a `LIST` (or `RIFF`) container of the given form type.
/// The returned chunk's payload is positioned just after the form type.
pub fn read_list<'a>(
    cursor: &mut Cursor<'a>,
    container: Tag,
    form: &[u8; 4],
) -> Result<Chunk<'a>, LoadError> {
    let mut chunk = read_chunk(cursor)?;
    if chunk.tag != container {
        return Err(LoadError::invalid(
            chunk.tag.to_string(),
            format!("expected '{}' container", container),
        ));
    }

    let found = Tag(chunk.payload.read_tag()?);
    if found != form {
        return Err(LoadError::invalid(
            found.to_string(),
            format!("expected '{}' list", Tag(*form)),
        ));
    }

    Ok(chunk)
}

/// Encodes a chunk, including the trailing pad byte for odd-sized payloads.
pub fn write_chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len() + 1);
    out.extend_from_slice(tag);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
    out
}
