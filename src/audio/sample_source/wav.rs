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
use std::io::SeekFrom;

use tracing::{debug, warn};

use super::error::AudioError;
use super::traits::{Decoder, StreamInfo};
use crate::audio::io::{read_fully, ByteStream, SharedStream};

/// Size of the RIFF/WAVE preamble.
const RIFF_HEADER_LEN: usize = 12;

const FORMAT_PCM: u16 = 0x0001;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// KSDATAFORMAT_SUBTYPE_PCM as it appears on disk.
const SUBFORMAT_PCM: [u8; 16] = [
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];

/// Bytes of sample data converted per stream read.
const SCRATCH_BYTES: usize = 64 * 1024;

/// Returns true if the stream starts with a RIFF/WAVE preamble. Sub-chunks
/// are not validated.
pub fn is_wav(stream: &SharedStream) -> bool {
    let mut guard = stream.lock();
    if guard.seek_to(SeekFrom::Start(0)).is_err() {
        return false;
    }
    let mut header = [0u8; RIFF_HEADER_LEN];
    match read_fully(&mut **guard, &mut header) {
        Ok(RIFF_HEADER_LEN) => &header[0..4] == b"RIFF" && &header[8..12] == b"WAVE",
        _ => false,
    }
}

/// The fields of a `fmt ` chunk that matter for decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WavFormat {
    pub fn bytes_per_sample(&self) -> u64 {
        u64::from(self.bits_per_sample / 8)
    }

    pub fn is_extensible(&self) -> bool {
        self.format_tag == FORMAT_EXTENSIBLE
    }
}

/// Little-endian field reader that turns short reads into `TruncatedStream`.
struct FieldReader<'a> {
    stream: &'a mut dyn ByteStream,
}

impl FieldReader<'_> {
    fn bytes<const N: usize>(&mut self) -> Result<[u8; N], AudioError> {
        let mut buf = [0u8; N];
        let read = read_fully(self.stream, &mut buf)?;
        if read != N {
            return Err(AudioError::TruncatedStream {
                expected: N as u64,
                actual: read as u64,
            });
        }
        Ok(buf)
    }

    fn u16(&mut self) -> Result<u16, AudioError> {
        Ok(u16::from_le_bytes(self.bytes()?))
    }

    fn u32(&mut self) -> Result<u32, AudioError> {
        Ok(u32::from_le_bytes(self.bytes()?))
    }

    fn position(&mut self) -> Result<u64, AudioError> {
        Ok(self.stream.position()?)
    }

    fn seek(&mut self, pos: u64) -> Result<(), AudioError> {
        self.stream.seek_to(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Parses the body of a `fmt ` chunk of `size` bytes.
    fn format_chunk(&mut self, size: u32) -> Result<WavFormat, AudioError> {
        if size < 16 {
            return Err(AudioError::malformed(format!(
                "fmt chunk is {} bytes, need at least 16",
                size
            )));
        }

        let format_tag = self.u16()?;
        if format_tag != FORMAT_PCM && format_tag != FORMAT_EXTENSIBLE {
            return Err(AudioError::malformed(format!(
                "unsupported format tag {:#06x}",
                format_tag
            )));
        }
        let channels = self.u16()?;
        let sample_rate = self.u32()?;
        let _byte_rate = self.u32()?;
        let _block_align = self.u16()?;
        let bits_per_sample = self.u16()?;
        if !matches!(bits_per_sample, 8 | 16 | 24 | 32) {
            return Err(AudioError::malformed(format!(
                "unsupported bits per sample {}",
                bits_per_sample
            )));
        }

        if format_tag == FORMAT_EXTENSIBLE {
            let _extension_size = self.u16()?;
            let valid_bits = self.u16()?;
            let _channel_mask = self.u32()?;
            let subformat: [u8; 16] = self.bytes()?;
            if subformat != SUBFORMAT_PCM {
                return Err(AudioError::malformed("extensible sub-format is not PCM"));
            }
            if valid_bits != bits_per_sample {
                return Err(AudioError::malformed(format!(
                    "valid bits {} differ from container bits {}",
                    valid_bits, bits_per_sample
                )));
            }
        }

        if channels == 0 {
            return Err(AudioError::malformed("zero channels"));
        }
        if sample_rate == 0 {
            return Err(AudioError::malformed("zero sample rate"));
        }

        Ok(WavFormat {
            format_tag,
            channels,
            sample_rate,
            bits_per_sample,
        })
    }
}

/// Where the samples live once the header has been parsed.
#[derive(Debug, Clone, Copy)]
struct SampleRegion {
    start: u64,
    end: u64,
    total_samples: u64,
}

/// Walks the RIFF sub-chunks up to and including the `data` chunk header.
fn parse(stream: &mut dyn ByteStream) -> Result<(WavFormat, SampleRegion), AudioError> {
    let stream_len = stream.byte_len()?;
    let mut reader = FieldReader { stream };

    let preamble: [u8; RIFF_HEADER_LEN] = reader.bytes()?;
    if &preamble[0..4] != b"RIFF" || &preamble[8..12] != b"WAVE" {
        return Err(AudioError::malformed("missing RIFF/WAVE preamble"));
    }

    let mut format: Option<WavFormat> = None;
    loop {
        let id: [u8; 4] = reader.bytes()?;
        let size = reader.u32()?;
        let chunk_start = reader.position()?;

        match &id {
            b"fmt " => {
                format = Some(reader.format_chunk(size)?);
                // Skip cbSize payloads and any other trailing fields.
                reader.seek(chunk_start + u64::from(size))?;
            }
            b"data" => {
                let format =
                    format.ok_or_else(|| AudioError::malformed("data chunk before fmt chunk"))?;
                let bytes_per_sample = format.bytes_per_sample();
                let total_samples = u64::from(size) / bytes_per_sample;

                // Reads stop short at end of file; the declared length stands.
                let available = stream_len.saturating_sub(chunk_start) / bytes_per_sample;
                if available < total_samples {
                    warn!(
                        declared = total_samples,
                        available, "WAV data chunk runs past end of file"
                    );
                }

                let region = SampleRegion {
                    start: chunk_start,
                    end: chunk_start + total_samples * bytes_per_sample,
                    total_samples,
                };
                return Ok((format, region));
            }
            _ => {
                debug!(
                    chunk = %String::from_utf8_lossy(&id),
                    size, "Skipping WAV chunk"
                );
                reader.seek(chunk_start + u64::from(size))?;
            }
        }
    }
}

/// Decodes integer PCM samples from a RIFF/WAVE stream into signed 16-bit.
pub struct WavDecoder {
    stream: SharedStream,
    format: WavFormat,
    region: SampleRegion,
    scratch: Vec<u8>,
}

impl WavDecoder {
    pub fn format(&self) -> WavFormat {
        self.format
    }

    /// Converts whole samples from `bytes` into `out`, returning the count.
    fn convert(bits_per_sample: u16, bytes: &[u8], out: &mut [i16]) -> usize {
        let width = usize::from(bits_per_sample / 8);
        let mut count = 0;
        for (chunk, slot) in bytes.chunks_exact(width).zip(out.iter_mut()) {
            *slot = match bits_per_sample {
                8 => Self::convert_u8(chunk[0]),
                16 => Self::convert_s16([chunk[0], chunk[1]]),
                24 => Self::convert_s24([chunk[0], chunk[1], chunk[2]]),
                _ => Self::convert_s32([chunk[0], chunk[1], chunk[2], chunk[3]]),
            };
            count += 1;
        }
        count
    }

    // Conversion helpers are `pub(crate)` so they can be checked directly in
    // unit tests.

    #[inline]
    pub(crate) fn convert_u8(value: u8) -> i16 {
        (i16::from(value) - 0x80) << 8
    }

    #[inline]
    pub(crate) fn convert_s16(bytes: [u8; 2]) -> i16 {
        i16::from_le_bytes(bytes)
    }

    #[inline]
    pub(crate) fn convert_s24(bytes: [u8; 3]) -> i16 {
        let value = u32::from(bytes[0]) | u32::from(bytes[1]) << 8 | u32::from(bytes[2]) << 16;
        (value >> 8) as i16
    }

    #[inline]
    pub(crate) fn convert_s32(bytes: [u8; 4]) -> i16 {
        (u32::from_le_bytes(bytes) >> 16) as i16
    }
}

impl Decoder for WavDecoder {
    fn open(stream: SharedStream) -> Result<Self, AudioError> {
        let (format, region) = {
            let mut guard = stream.lock();
            let parsed = parse(&mut **guard)?;
            guard.seek_to(SeekFrom::Start(parsed.1.start))?;
            parsed
        };

        debug!(
            channels = format.channels,
            sample_rate = format.sample_rate,
            bits_per_sample = format.bits_per_sample,
            extensible = format.is_extensible(),
            total_samples = region.total_samples,
            "Opened WAV stream"
        );

        Ok(Self {
            stream,
            format,
            region,
            scratch: Vec::new(),
        })
    }

    fn read(&mut self, out: &mut [i16]) -> usize {
        if out.is_empty() {
            return 0;
        }

        let bytes_per_sample = self.format.bytes_per_sample();
        let mut guard = self.stream.lock();
        let position = match guard.position() {
            Ok(position) => position,
            Err(e) => {
                warn!(err = %e, "Failed to query WAV stream position");
                return 0;
            }
        };
        let remaining = self
            .region
            .end
            .saturating_sub(position)
            .div_ceil(bytes_per_sample);
        let wanted = remaining.min(out.len() as u64) as usize;

        let width = bytes_per_sample as usize;
        let samples_per_pass = (SCRATCH_BYTES / width).max(1);
        let mut produced = 0;
        while produced < wanted {
            let pass = (wanted - produced).min(samples_per_pass);
            self.scratch.resize(pass * width, 0);
            let read = match read_fully(&mut **guard, &mut self.scratch) {
                Ok(read) => read,
                Err(e) => {
                    warn!(err = %e, "WAV sample read failed");
                    break;
                }
            };
            produced += Self::convert(
                self.format.bits_per_sample,
                &self.scratch[..read],
                &mut out[produced..],
            );
            if read < pass * width {
                break;
            }
        }
        produced
    }

    fn seek(&mut self, offset: u64) -> Result<(), AudioError> {
        let offset = offset.min(self.region.total_samples);
        self.stream
            .seek(self.region.start + offset * self.format.bytes_per_sample())?;
        Ok(())
    }

    fn info(&self) -> StreamInfo {
        StreamInfo {
            channel_count: u32::from(self.format.channels),
            sample_rate: self.format.sample_rate,
            total_samples: self.region.total_samples,
        }
    }
}

impl std::fmt::Debug for WavDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavDecoder")
            .field("format", &self.format)
            .field("region", &self.region)
            .finish()
    }
}
