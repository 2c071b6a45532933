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

/// Fatal errors raised while decoding a sample bank. Nothing partially decoded is
/// ever handed out when one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// A chunk header was truncated or declared a size larger than the buffer.
    #[error("Malformed chunk at offset {offset}: {reason}")]
    MalformedChunk { offset: usize, reason: String },

    /// The data is well-formed RIFF but not a valid sample bank.
    #[error("Invalid format in chunk '{chunk}': {reason}")]
    InvalidFormat { chunk: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> LoadError {
        LoadError::MalformedChunk {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(chunk: impl Into<String>, reason: impl Into<String>) -> LoadError {
        LoadError::InvalidFormat {
            chunk: chunk.into(),
            reason: reason.into(),
        }
    }

    /// True if this error came from a truncated or oversized chunk.
    pub fn is_malformed(&self) -> bool {
        matches!(self, LoadError::MalformedChunk { .. })
    }

    /// True if this error came from a structurally invalid bank.
    pub fn is_invalid_format(&self) -> bool {
        matches!(self, LoadError::InvalidFormat { .. })
    }
}
