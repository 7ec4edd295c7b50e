// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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

use std::{error::Error, fmt, str::FromStr};

use serde::Serialize;

/// Container/codec formats the decoders understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// RIFF/WAVE with integer PCM samples.
    Wav,
    /// Ogg container carrying a Vorbis stream.
    Vorbis,
}

impl FromStr for AudioFormat {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Box<dyn Error>> {
        match s {
            "wav" | "Wav" | "WAV" => Ok(AudioFormat::Wav),
            "vorbis" | "Vorbis" | "ogg" | "OGG" => Ok(AudioFormat::Vorbis),
            _ => Err(format!("Unsupported audio format: {}", s).into()),
        }
    }
}

impl AudioFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Vorbis => "vorbis",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 16-bit sample layouts a playback device can accept, one per channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    Mono16,
    Stereo16,
    Quad16,
    Surround51,
    Surround61,
    Surround71,
}

impl ChannelLayout {
    /// The layout for an interleaved stream with `channels` channels, if any.
    pub fn for_channels(channels: u32) -> Option<ChannelLayout> {
        match channels {
            1 => Some(ChannelLayout::Mono16),
            2 => Some(ChannelLayout::Stereo16),
            4 => Some(ChannelLayout::Quad16),
            6 => Some(ChannelLayout::Surround51),
            7 => Some(ChannelLayout::Surround61),
            8 => Some(ChannelLayout::Surround71),
            _ => None,
        }
    }

    pub fn channel_count(self) -> u32 {
        match self {
            ChannelLayout::Mono16 => 1,
            ChannelLayout::Stereo16 => 2,
            ChannelLayout::Quad16 => 4,
            ChannelLayout::Surround51 => 6,
            ChannelLayout::Surround61 => 7,
            ChannelLayout::Surround71 => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelLayout::Mono16 => "mono16",
            ChannelLayout::Stereo16 => "stereo16",
            ChannelLayout::Quad16 => "quad16",
            ChannelLayout::Surround51 => "5.1-16",
            ChannelLayout::Surround61 => "6.1-16",
            ChannelLayout::Surround71 => "7.1-16",
        }
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
