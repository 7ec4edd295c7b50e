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

//! Format detection from leading bytes.
//!
//! Every probe seeks to offset 0 before reading and leaves the stream
//! position wherever it ended up. Callers re-seek before decoding.

use tracing::debug;

use super::error::AudioError;
use super::{vorbis, wav};
use crate::audio::format::AudioFormat;
use crate::audio::io::SharedStream;

/// A named format test.
#[derive(Clone, Copy)]
pub struct FormatProbe {
    pub format: AudioFormat,
    pub name: &'static str,
    pub matches: fn(&SharedStream) -> bool,
}

/// Ordered list of format probes. The first probe that matches wins.
#[derive(Clone)]
pub struct FormatSniffer {
    probes: Vec<FormatProbe>,
}

impl Default for FormatSniffer {
    /// WAV is tested before Vorbis.
    fn default() -> Self {
        Self {
            probes: vec![
                FormatProbe {
                    format: AudioFormat::Wav,
                    name: "riff-wave",
                    matches: wav::is_wav,
                },
                FormatProbe {
                    format: AudioFormat::Vorbis,
                    name: "ogg-vorbis",
                    matches: vorbis::is_vorbis,
                },
            ],
        }
    }
}

impl FormatSniffer {
    /// A sniffer with no probes registered.
    pub fn empty() -> Self {
        Self { probes: Vec::new() }
    }

    /// Appends a probe after the ones already registered.
    pub fn register(&mut self, probe: FormatProbe) -> &mut Self {
        self.probes.push(probe);
        self
    }

    pub fn probes(&self) -> &[FormatProbe] {
        &self.probes
    }

    /// Classifies the stream, failing with `UnsupportedFormat` when nothing
    /// matches.
    pub fn detect(&self, stream: &SharedStream) -> Result<AudioFormat, AudioError> {
        for probe in &self.probes {
            if (probe.matches)(stream) {
                debug!(probe = probe.name, format = %probe.format, "Format detected");
                return Ok(probe.format);
            }
        }
        Err(AudioError::UnsupportedFormat)
    }
}

impl std::fmt::Debug for FormatSniffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.probes.iter().map(|p| p.name))
            .finish()
    }
}
