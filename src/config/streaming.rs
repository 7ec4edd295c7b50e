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

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::audio::StreamSettings;

/// A YAML representation of the streaming configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Streaming {
    /// Number of device buffers cycled by a stream (default: 5, minimum: 2).
    slots: Option<usize>,

    /// Audio held by each buffer, e.g. "250ms" (default: 1s).
    slot_duration: Option<String>,

    /// Whether streams restart from the beginning when they run out
    /// (default: true).
    loop_enabled: Option<bool>,

    /// Linear gain applied to the stream's voice (default: 1.0).
    volume: Option<f32>,
}

impl Streaming {
    pub fn slots(&self) -> Result<usize, ConfigError> {
        match self.slots {
            Some(slots) if slots < 2 => Err(ConfigError::InvalidValue {
                key: "streaming.slots",
                reason: format!("at least 2 slots are required, got {}", slots),
            }),
            Some(slots) => Ok(slots),
            None => Ok(StreamSettings::default().slots),
        }
    }

    pub fn slot_duration(&self) -> Result<Duration, ConfigError> {
        let Some(value) = &self.slot_duration else {
            return Ok(StreamSettings::default().slot_duration);
        };
        let duration: Duration = DurationString::from_string(value.clone())
            .map_err(|e| ConfigError::InvalidDuration {
                value: value.clone(),
                reason: e.to_string(),
            })?
            .into();
        if duration.is_zero() {
            return Err(ConfigError::InvalidDuration {
                value: value.clone(),
                reason: "duration must be greater than zero".to_string(),
            });
        }
        Ok(duration)
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
            .unwrap_or(StreamSettings::default().loop_enabled)
    }

    pub fn volume(&self) -> Result<f32, ConfigError> {
        match self.volume {
            Some(volume) if !volume.is_finite() || volume < 0.0 => {
                Err(ConfigError::InvalidValue {
                    key: "streaming.volume",
                    reason: format!("expected a non-negative gain, got {}", volume),
                })
            }
            Some(volume) => Ok(volume),
            None => Ok(StreamSettings::default().volume),
        }
    }

    /// Resolves the section into engine settings, validating every value.
    pub fn to_settings(&self) -> Result<StreamSettings, ConfigError> {
        Ok(StreamSettings {
            slots: self.slots()?,
            slot_duration: self.slot_duration()?,
            loop_enabled: self.loop_enabled(),
            volume: self.volume()?,
        })
    }
}
