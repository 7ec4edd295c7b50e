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

//! Decoding, buffering and streaming of PCM audio.

pub mod backend;
pub mod format;
pub mod io;
pub mod mock;
pub mod sample_source;
pub mod stream;

pub use backend::{BufferId, PlaybackBackend, VoiceId, VoiceState};
pub use format::{AudioFormat, ChannelLayout};
pub use io::{ByteStream, SharedStream};
pub use sample_source::{AudioDescriptor, AudioError, AudioSource};
pub use stream::{SlotState, StreamSettings, StreamingEngine, TickReport};
