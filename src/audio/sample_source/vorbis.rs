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

//! Ogg Vorbis decoding through symphonia.
//!
//! Symphonia wants an owned `MediaSource`, so the shared byte stream is
//! wrapped in [`ByteStreamSource`], which forwards read/seek/tell to it.

use std::io::{self, Read, Seek, SeekFrom};

use symphonia::core::audio::SampleBuffer as PcmBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_VORBIS};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::default::formats::OggReader;
use symphonia::default::get_codecs;
use tracing::{debug, warn};

use super::error::AudioError;
use super::traits::{Decoder, StreamInfo};
use crate::audio::io::SharedStream;

/// Adapts a [`SharedStream`] to symphonia's `MediaSource`.
///
/// `SeekFrom::End(offset)` lands at `size - |offset|`, never past the end.
pub struct ByteStreamSource {
    stream: SharedStream,
    len: u64,
}

impl ByteStreamSource {
    pub fn new(stream: SharedStream) -> io::Result<Self> {
        let len = stream.byte_len()?;
        Ok(Self { stream, len })
    }
}

impl Read for ByteStreamSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.lock().read_bytes(buf)
    }
}

impl Seek for ByteStreamSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let pos = match pos {
            SeekFrom::End(offset) => SeekFrom::Start(self.len.saturating_sub(offset.unsigned_abs())),
            other => other,
        };
        self.stream.lock().seek_to(pos)
    }
}

impl MediaSource for ByteStreamSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.len)
    }
}

fn open_reader(stream: &SharedStream) -> Result<OggReader, AudioError> {
    stream.seek(0)?;
    let source = ByteStreamSource::new(stream.clone())?;
    let mss = MediaSourceStream::new(Box::new(source), Default::default());
    Ok(OggReader::try_new(mss, &FormatOptions::default())?)
}

/// Returns true if the stream is an Ogg container with a Vorbis track.
pub fn is_vorbis(stream: &SharedStream) -> bool {
    // Cheap capture-pattern check so non-Ogg files are never scanned.
    let mut magic = [0u8; 4];
    if stream.seek(0).is_err() {
        return false;
    }
    match stream.read_fully(&mut magic) {
        Ok(4) if &magic == b"OggS" => {}
        _ => return false,
    }

    match open_reader(stream) {
        Ok(reader) => reader
            .tracks()
            .iter()
            .any(|t| t.codec_params.codec == CODEC_TYPE_VORBIS),
        Err(e) => {
            debug!(err = %e, "Ogg probe failed");
            false
        }
    }
}

/// Frames in the longest Vorbis packet.
const SEEK_PREROLL_FRAMES: u64 = 4096;

/// Decodes an Ogg Vorbis stream into interleaved signed 16-bit samples.
pub struct VorbisDecoder {
    reader: OggReader,
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    track_id: u32,
    info: StreamInfo,
    // Decoded samples not yet handed out.
    pending: Vec<i16>,
    pending_pos: usize,
    pcm: Option<PcmBuffer<i16>>,
    // After a seek, the frame the next output must start at and the extra
    // samples to drop within that frame.
    seek_target: Option<(u64, usize)>,
    at_end: bool,
}

impl VorbisDecoder {
    /// Decodes the next packet of our track into `pending`. Returns false when
    /// the stream is exhausted or the codec fails.
    fn decode_next(&mut self) -> bool {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return false;
                }
                Err(e) => {
                    warn!(err = %e, "Ogg demux failed");
                    return false;
                }
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let frames = decoded.frames() as u64;
                    if frames == 0 {
                        continue;
                    }
                    // Trim against the packet's own timestamp. The first
                    // packet after a reset may produce no output.
                    let mut start = 0;
                    if let Some((target, within)) = self.seek_target {
                        if packet.ts() + frames <= target {
                            continue;
                        }
                        let channels = u64::from(self.info.channel_count);
                        start = (target.saturating_sub(packet.ts()) * channels) as usize
                            + within;
                        self.seek_target = None;
                    }
                    let spec = *decoded.spec();
                    let needed = decoded.capacity() * spec.channels.count();
                    if self.pcm.as_ref().map_or(true, |pcm| pcm.capacity() < needed) {
                        self.pcm = Some(PcmBuffer::new(decoded.capacity() as u64, spec));
                    }
                    let Some(pcm) = self.pcm.as_mut() else {
                        continue;
                    };
                    pcm.copy_interleaved_ref(decoded);

                    self.pending.clear();
                    self.pending.extend_from_slice(pcm.samples());
                    self.pending_pos = start.min(self.pending.len());
                    if self.pending_pos < self.pending.len() {
                        return true;
                    }
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                }
                Err(e) => {
                    warn!(err = %e, "Vorbis decode failed");
                    return false;
                }
            }
        }
    }
}

impl Decoder for VorbisDecoder {
    fn open(stream: SharedStream) -> Result<Self, AudioError> {
        let reader = open_reader(&stream)?;
        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec == CODEC_TYPE_VORBIS)
            .ok_or(AudioError::UnsupportedFormat)?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let channel_count = params
            .channels
            .map(|c| c.count() as u32)
            .filter(|c| *c > 0)
            .ok_or_else(|| AudioError::malformed("Vorbis stream has no channel count"))?;
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| AudioError::malformed("Vorbis stream has no sample rate"))?;
        let total_samples = match params.n_frames {
            Some(frames) => frames * u64::from(channel_count),
            None => {
                warn!("Vorbis stream length unknown");
                0
            }
        };

        let decoder = get_codecs().make(&params, &DecoderOptions::default())?;

        debug!(
            channels = channel_count,
            sample_rate, total_samples, "Opened Vorbis stream"
        );

        Ok(Self {
            reader,
            decoder,
            track_id,
            info: StreamInfo {
                channel_count,
                sample_rate,
                total_samples,
            },
            pending: Vec::new(),
            pending_pos: 0,
            pcm: None,
            seek_target: None,
            at_end: false,
        })
    }

    fn read(&mut self, out: &mut [i16]) -> usize {
        let mut written = 0;
        while written < out.len() {
            if self.pending_pos >= self.pending.len() {
                if self.at_end || !self.decode_next() {
                    self.at_end = true;
                    break;
                }
            }
            let available = &self.pending[self.pending_pos..];
            let count = available.len().min(out.len() - written);
            out[written..written + count].copy_from_slice(&available[..count]);
            self.pending_pos += count;
            written += count;
        }
        written
    }

    fn seek(&mut self, offset: u64) -> Result<(), AudioError> {
        let channels = u64::from(self.info.channel_count);
        self.pending.clear();
        self.pending_pos = 0;
        self.seek_target = None;

        if self.info.total_samples > 0 && offset >= self.info.total_samples {
            self.at_end = true;
            return Ok(());
        }
        self.at_end = false;

        // Land at least one whole packet early so the target is never inside
        // the packet that only primes the decoder.
        let target = offset / channels;
        let seeked = self.reader.seek(
            SeekMode::Accurate,
            SeekTo::TimeStamp {
                ts: target.saturating_sub(SEEK_PREROLL_FRAMES),
                track_id: self.track_id,
            },
        )?;
        self.decoder.reset();
        debug!(target, landed = seeked.actual_ts, "Vorbis seek");
        self.seek_target = Some((target, (offset % channels) as usize));
        Ok(())
    }

    fn info(&self) -> StreamInfo {
        self.info
    }
}

impl std::fmt::Debug for VorbisDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VorbisDecoder")
            .field("track_id", &self.track_id)
            .field("info", &self.info)
            .field("at_end", &self.at_end)
            .finish()
    }
}
