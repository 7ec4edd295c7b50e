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
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// A YAML representation of the sample library configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Samples {
    /// Directory that relative sample paths are resolved against.
    base_path: Option<PathBuf>,
}

impl Samples {
    /// Returns the base path, defaulting to the current directory.
    pub fn base_path(&self) -> &Path {
        self.base_path.as_deref().unwrap_or(Path::new("."))
    }
}
