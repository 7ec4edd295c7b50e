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
/// Error types for decoding, buffering and streaming.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Unsupported audio format")]
    UnsupportedFormat,

    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    #[error("Truncated stream: expected {expected}, got {actual}")]
    TruncatedStream { expected: u64, actual: u64 },

    #[error("No playback format for {0} channels")]
    UnsupportedChannelLayout(u32),

    #[error("Buffer holds no samples")]
    EmptyBuffer,

    #[error("Playback backend error: {0}")]
    Backend(String),

    #[error("Codec error: {0}")]
    Codec(#[from] symphonia::core::errors::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AudioError {
    pub(crate) fn malformed<S: Into<String>>(msg: S) -> Self {
        AudioError::MalformedHeader(msg.into())
    }
}
