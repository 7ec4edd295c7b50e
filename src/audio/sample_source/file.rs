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
use std::path::Path;
use std::time::Duration;

use tracing::info;

use super::error::AudioError;
use super::factory::{create_decoder, AudioDecoder};
use super::sniffer::FormatSniffer;
use super::traits::{AudioDescriptor, Decoder, StreamInfo};
use crate::audio::format::AudioFormat;
use crate::audio::io::SharedStream;

/// An opened, decodable audio file.
///
/// The source owns its decoder. The stream may also be held by the caller,
/// in which case the caller must re-seek before touching it directly.
pub struct AudioSource {
    decoder: AudioDecoder,
    stream: SharedStream,
    descriptor: AudioDescriptor,
}

impl AudioSource {
    /// Opens and sniffs the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AudioError> {
        let path = path.as_ref();
        let source = Self::from_stream(SharedStream::open(path)?)?;
        info!(
            path = ?path,
            format = %source.format(),
            channels = source.descriptor.channel_count,
            sample_rate = source.descriptor.sample_rate,
            length = ?source.descriptor.length(),
            "Audio source opened"
        );
        Ok(source)
    }

    /// Sniffs an already opened stream with the default probes.
    pub fn from_stream(stream: SharedStream) -> Result<Self, AudioError> {
        Self::with_sniffer(stream, &FormatSniffer::default())
    }

    pub fn with_sniffer(stream: SharedStream, sniffer: &FormatSniffer) -> Result<Self, AudioError> {
        let decoder = create_decoder(sniffer, &stream)?;
        let info = decoder.info();
        if info.channel_count == 0 {
            return Err(AudioError::malformed("decoder reported zero channels"));
        }
        Ok(Self {
            decoder,
            stream,
            descriptor: AudioDescriptor::from_info(info, 0),
        })
    }

    /// Reads up to `out.len()` samples. Returns 0 once exhausted.
    pub fn read(&mut self, out: &mut [i16]) -> usize {
        let count = self.decoder.read(out);
        let mut offset = self.descriptor.current_offset + count as u64;
        if self.descriptor.total_samples > 0 {
            offset = offset.min(self.descriptor.total_samples);
        }
        self.descriptor.current_offset = offset;
        count
    }

    /// Seeks to an absolute sample offset, rounded down to a frame boundary
    /// and clamped to the end of the stream.
    pub fn seek(&mut self, offset: u64) -> Result<(), AudioError> {
        let channels = u64::from(self.descriptor.channel_count);
        let mut offset = offset / channels * channels;
        if self.descriptor.total_samples > 0 {
            offset = offset.min(self.descriptor.total_samples);
        }
        self.decoder.seek(offset)?;
        self.descriptor.current_offset = offset;
        Ok(())
    }

    /// Seeks to a playback position.
    pub fn seek_time(&mut self, position: Duration) -> Result<(), AudioError> {
        let frames = (position.as_secs_f64() * f64::from(self.descriptor.sample_rate)) as u64;
        self.seek(frames * u64::from(self.descriptor.channel_count))
    }

    /// A snapshot of the stream's properties and current position.
    pub fn describe(&self) -> AudioDescriptor {
        self.descriptor
    }

    pub fn info(&self) -> StreamInfo {
        self.decoder.info()
    }

    pub fn format(&self) -> AudioFormat {
        self.decoder.format()
    }

    pub fn set_loop_enabled(&mut self, enabled: bool) {
        self.descriptor.loop_enabled = enabled;
        self.descriptor.loop_end = if enabled {
            self.descriptor.length()
        } else {
            Duration::ZERO
        };
    }

    /// True once the read offset has reached the end of a stream of known
    /// length.
    pub fn is_at_end(&self) -> bool {
        self.descriptor.total_samples > 0
            && self.descriptor.current_offset >= self.descriptor.total_samples
    }

    /// The underlying stream.
    pub fn stream(&self) -> &SharedStream {
        &self.stream
    }

    /// Releases the decoder and this source's handle on the stream.
    pub fn close(self) {}
}

impl std::fmt::Debug for AudioSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSource")
            .field("format", &self.format())
            .field("descriptor", &self.descriptor)
            .finish()
    }
}
