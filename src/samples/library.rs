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

//! Sample loading and caching.
//!
//! Samples are decoded entirely into memory when first requested and shared
//! from then on.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::buffer::SampleBuffer;
use crate::audio::backend::PlaybackBackend;
use crate::audio::sample_source::AudioError;

/// Manages loading and caching of sample buffers.
pub struct SampleLibrary {
    backend: Arc<dyn PlaybackBackend>,
    /// Base path for resolving relative file paths.
    base_path: PathBuf,
    /// Cache of loaded samples by resolved path.
    cache: HashMap<PathBuf, Arc<SampleBuffer>>,
}

impl SampleLibrary {
    pub fn new(backend: Arc<dyn PlaybackBackend>, base_path: &Path) -> Self {
        Self {
            backend,
            base_path: base_path.to_path_buf(),
            cache: HashMap::new(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    /// Loads a sample, returning the cached buffer if it is already loaded.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<Arc<SampleBuffer>, AudioError> {
        let full_path = self.resolve(path.as_ref());
        if let Some(buffer) = self.cache.get(&full_path) {
            debug!(path = ?full_path, "Using cached sample");
            return Ok(buffer.clone());
        }

        let buffer = match SampleBuffer::load(self.backend.clone(), &full_path) {
            Ok(buffer) => Arc::new(buffer),
            Err(e) => {
                warn!(path = ?full_path, err = %e, "Failed to load sample");
                return Err(e);
            }
        };

        let descriptor = buffer.descriptor();
        info!(
            path = ?full_path,
            channels = descriptor.channel_count,
            sample_rate = descriptor.sample_rate,
            duration_ms = descriptor.length().as_millis(),
            memory_kb = buffer.memory_size() / 1024,
            "Sample loaded"
        );
        self.cache.insert(full_path, buffer.clone());
        Ok(buffer)
    }

    /// Drops the library's reference to a sample. Returns whether it was
    /// loaded. The buffer itself lives on while callers still hold it.
    pub fn unload<P: AsRef<Path>>(&mut self, path: P) -> bool {
        let full_path = self.resolve(path.as_ref());
        self.cache.remove(&full_path).is_some()
    }

    pub fn unload_all(&mut self) {
        self.cache.clear();
    }

    pub fn is_loaded<P: AsRef<Path>>(&self, path: P) -> bool {
        self.cache.contains_key(&self.resolve(path.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Returns the total memory used by cached samples.
    pub fn memory_usage(&self) -> usize {
        self.cache.values().map(|buffer| buffer.memory_size()).sum()
    }
}

impl std::fmt::Debug for SampleLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLibrary")
            .field("base_path", &self.base_path)
            .field("cached_samples", &self.cache.len())
            .field("total_memory_kb", &(self.memory_usage() / 1024))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock;
    use crate::testutil::{ramp, write_wav};
    use tempfile::tempdir;

    #[test]
    fn test_load_is_cached() {
        let dir = tempdir().unwrap();
        write_wav(dir.path().join("kick.wav"), 1, 44100, &ramp(1000)).unwrap();
        let backend = Arc::new(mock::Backend::new("mock"));
        let mut library = SampleLibrary::new(backend.clone(), dir.path());

        let first = library.load("kick.wav").unwrap();
        let second = library.load(dir.path().join("kick.wav")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(library.len(), 1);
        assert_eq!(library.memory_usage(), 2000);
        assert_eq!(backend.live_buffers(), 1);
    }

    #[test]
    fn test_unload() {
        let dir = tempdir().unwrap();
        write_wav(dir.path().join("a.wav"), 2, 8000, &ramp(16)).unwrap();
        write_wav(dir.path().join("b.wav"), 1, 8000, &ramp(8)).unwrap();
        let backend = Arc::new(mock::Backend::new("mock"));
        let mut library = SampleLibrary::new(backend.clone(), dir.path());

        let a = library.load("a.wav").unwrap();
        library.load("b.wav").unwrap();
        assert!(library.unload("a.wav"));
        assert!(!library.unload("a.wav"));
        assert!(!library.is_loaded("a.wav"));
        // Still held here.
        assert_eq!(a.descriptor().total_samples, 16);

        library.unload_all();
        assert!(library.is_empty());
        drop(a);
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(mock::Backend::new("mock"));
        let mut library = SampleLibrary::new(backend.clone(), dir.path());
        assert!(matches!(
            library.load("missing.wav"),
            Err(AudioError::Io(_))
        ));
        assert!(library.is_empty());
        assert_eq!(backend.live_buffers(), 0);
    }
}
