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
use std::time::Duration;

use serde::Serialize;

use super::error::AudioError;
use crate::audio::io::SharedStream;

/// What a decoder learns about its stream when it opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamInfo {
    pub channel_count: u32,
    pub sample_rate: u32,
    /// Interleaved samples in the whole stream (frames × channels).
    pub total_samples: u64,
}

/// Descriptive information about an opened audio source.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AudioDescriptor {
    pub channel_count: u32,
    pub sample_rate: u32,
    pub total_samples: u64,
    pub loop_enabled: bool,
    pub loop_start: Duration,
    pub loop_end: Duration,
    /// Read offset in interleaved samples.
    pub current_offset: u64,
}

impl AudioDescriptor {
    pub fn from_info(info: StreamInfo, current_offset: u64) -> Self {
        Self {
            channel_count: info.channel_count,
            sample_rate: info.sample_rate,
            total_samples: info.total_samples,
            current_offset,
            ..Default::default()
        }
    }

    /// Total duration of the audio.
    pub fn length(&self) -> Duration {
        self.samples_to_duration(self.total_samples)
    }

    /// Playback position corresponding to `current_offset`.
    pub fn position(&self) -> Duration {
        self.samples_to_duration(self.current_offset)
    }

    fn samples_to_duration(&self, samples: u64) -> Duration {
        if self.channel_count == 0 || self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(
            samples as f64 / self.channel_count as f64 / self.sample_rate as f64,
        )
    }
}

/// A pull-based source of interleaved signed 16-bit samples.
///
/// Offsets and counts are always in interleaved samples, not frames.
pub trait Decoder: Send {
    /// Opens `stream`, which must be positioned at the start of the file.
    fn open(stream: SharedStream) -> Result<Self, AudioError>
    where
        Self: Sized;

    /// Fills `out` with up to `out.len()` samples and returns how many were
    /// written. A short count means the stream is exhausted or a read failed;
    /// neither is reported as an error.
    fn read(&mut self, out: &mut [i16]) -> usize;

    /// Moves the read position to the absolute sample `offset`. Callers keep
    /// `offset` within `[0, total_samples]`.
    fn seek(&mut self, offset: u64) -> Result<(), AudioError>;

    /// Channel count, sample rate and length reported at open.
    fn info(&self) -> StreamInfo;
}
