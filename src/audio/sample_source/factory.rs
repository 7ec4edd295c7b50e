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
use tracing::info;

use super::error::AudioError;
use super::sniffer::FormatSniffer;
use super::traits::{Decoder, StreamInfo};
use super::vorbis::VorbisDecoder;
use super::wav::WavDecoder;
use crate::audio::format::AudioFormat;
use crate::audio::io::SharedStream;

/// A decoder for any supported format.
#[derive(Debug)]
pub enum AudioDecoder {
    Wav(WavDecoder),
    Vorbis(VorbisDecoder),
}

impl AudioDecoder {
    pub fn format(&self) -> AudioFormat {
        match self {
            AudioDecoder::Wav(_) => AudioFormat::Wav,
            AudioDecoder::Vorbis(_) => AudioFormat::Vorbis,
        }
    }

    /// Opens `stream` with the decoder for `format`, starting from byte 0.
    pub fn open_as(format: AudioFormat, stream: SharedStream) -> Result<Self, AudioError> {
        stream.seek(0)?;
        Ok(match format {
            AudioFormat::Wav => AudioDecoder::Wav(WavDecoder::open(stream)?),
            AudioFormat::Vorbis => AudioDecoder::Vorbis(VorbisDecoder::open(stream)?),
        })
    }
}

impl Decoder for AudioDecoder {
    /// Sniffs the format with the default probes and opens the matching
    /// decoder.
    fn open(stream: SharedStream) -> Result<Self, AudioError> {
        create_decoder(&FormatSniffer::default(), &stream)
    }

    fn read(&mut self, out: &mut [i16]) -> usize {
        match self {
            AudioDecoder::Wav(decoder) => decoder.read(out),
            AudioDecoder::Vorbis(decoder) => decoder.read(out),
        }
    }

    fn seek(&mut self, offset: u64) -> Result<(), AudioError> {
        match self {
            AudioDecoder::Wav(decoder) => decoder.seek(offset),
            AudioDecoder::Vorbis(decoder) => decoder.seek(offset),
        }
    }

    fn info(&self) -> StreamInfo {
        match self {
            AudioDecoder::Wav(decoder) => decoder.info(),
            AudioDecoder::Vorbis(decoder) => decoder.info(),
        }
    }
}

/// Detects the format of `stream` and opens a decoder for it.
pub fn create_decoder(
    sniffer: &FormatSniffer,
    stream: &SharedStream,
) -> Result<AudioDecoder, AudioError> {
    let format = sniffer.detect(stream)?;
    let decoder = AudioDecoder::open_as(format, stream.clone())?;
    let info = decoder.info();
    info!(
        format = %format,
        channels = info.channel_count,
        sample_rate = info.sample_rate,
        total_samples = info.total_samples,
        "Decoder created"
    );
    Ok(decoder)
}
