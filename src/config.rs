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

//! Settings loaded from an optional YAML file and `KZAUDIO__`-prefixed
//! environment variables, e.g. `KZAUDIO__STREAMING__SLOTS=8`.

use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;

mod error;
mod samples;
mod streaming;

pub use error::ConfigError;
pub use samples::Samples;
pub use streaming::Streaming;

const ENV_PREFIX: &str = "KZAUDIO";

/// The top level configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    streaming: Streaming,

    #[serde(default)]
    samples: Samples,
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).separator("__")
}

impl Settings {
    /// Loads settings from `path`, if given, with environment overrides on
    /// top.
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        Self::build(path, environment())
    }

    fn build(path: Option<&Path>, env: Environment) -> Result<Settings, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let settings = builder
            .add_source(env)
            .build()?
            .try_deserialize::<Settings>()?;
        // Surface bad values at load time rather than on first use.
        settings.streaming.to_settings()?;
        Ok(settings)
    }

    pub fn streaming(&self) -> &Streaming {
        &self.streaming
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }
}
