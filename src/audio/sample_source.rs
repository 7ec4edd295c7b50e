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

//! Decoding audio files into interleaved signed 16-bit samples.

pub mod error;
pub mod factory;
pub mod file;
pub mod sniffer;
pub mod traits;
pub mod vorbis;
pub mod wav;


pub use error::AudioError;
pub use factory::{create_decoder, AudioDecoder};
pub use file::AudioSource;
pub use sniffer::{FormatProbe, FormatSniffer};
pub use traits::{AudioDescriptor, Decoder, StreamInfo};
pub use vorbis::VorbisDecoder;
pub use wav::WavDecoder;
