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

//! Fully decoded samples held in memory and on the device.
//!
//! A buffer keeps a registry of the handles bound to it. Any change to the
//! buffer's content detaches every bound handle from the device, uploads the
//! new content and reattaches the same handles. Dropping the buffer detaches
//! them for good.
//!
//! Locks are never nested: the handle registry, the buffer state and each
//! handle's binding are locked one at a time.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{MappedRwLockReadGuard, Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use super::handle::HandleShared;
use crate::audio::backend::{BufferId, PlaybackBackend};
use crate::audio::format::ChannelLayout;
use crate::audio::sample_source::{AudioDescriptor, AudioError, AudioSource};

/// Samples read per call while loading a source of unknown length.
const LOAD_CHUNK: usize = 16 * 1024;

pub(crate) struct BufferState {
    samples: Vec<i16>,
    channels: u32,
    sample_rate: u32,
    layout: Option<ChannelLayout>,
}

pub(crate) struct BufferShared {
    device_buffer: BufferId,
    state: RwLock<BufferState>,
    handles: Mutex<HashMap<u64, Weak<HandleShared>>>,
}

impl BufferShared {
    fn is_committed(&self) -> bool {
        self.state.read().layout.is_some()
    }

    fn live_handles(&self) -> Vec<Arc<HandleShared>> {
        self.handles
            .lock()
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub(crate) fn forget(&self, handle_id: u64) {
        self.handles.lock().remove(&handle_id);
    }
}

/// Binds `handle` to `buffer`. The handle must not be bound elsewhere.
pub(crate) fn attach(
    buffer: &Arc<BufferShared>,
    handle: &Arc<HandleShared>,
    backend: &dyn PlaybackBackend,
) -> Result<(), AudioError> {
    if !buffer.is_committed() {
        return Err(AudioError::EmptyBuffer);
    }
    buffer
        .handles
        .lock()
        .insert(handle.id(), Arc::downgrade(handle));
    backend.set_voice_buffer(handle.voice(), Some(buffer.device_buffer));
    handle.set_bound(Some(Arc::downgrade(buffer)));
    Ok(())
}

fn validate(
    backend: &dyn PlaybackBackend,
    samples: &[i16],
    channels: u32,
    sample_rate: u32,
) -> Result<ChannelLayout, AudioError> {
    if channels == 0 {
        return Err(AudioError::malformed("zero channels"));
    }
    if sample_rate == 0 {
        return Err(AudioError::malformed("zero sample rate"));
    }
    if samples.is_empty() {
        return Err(AudioError::EmptyBuffer);
    }
    backend
        .layout_for_channels(channels)
        .ok_or(AudioError::UnsupportedChannelLayout(channels))
}

/// Decoded audio shared by any number of [`PlaybackHandle`]s.
///
/// [`PlaybackHandle`]: super::PlaybackHandle
pub struct SampleBuffer {
    shared: Arc<BufferShared>,
    backend: Arc<dyn PlaybackBackend>,
}

impl SampleBuffer {
    /// Creates an empty buffer. Handles cannot bind to it until content has
    /// been loaded.
    pub fn new(backend: Arc<dyn PlaybackBackend>) -> Result<Self, AudioError> {
        let device_buffer = backend.create_buffer()?;
        Ok(Self {
            shared: Arc::new(BufferShared {
                device_buffer,
                state: RwLock::new(BufferState {
                    samples: Vec::new(),
                    channels: 0,
                    sample_rate: 0,
                    layout: None,
                }),
                handles: Mutex::new(HashMap::new()),
            }),
            backend,
        })
    }

    /// Decodes the whole file at `path` into a new buffer.
    pub fn load(backend: Arc<dyn PlaybackBackend>, path: &Path) -> Result<Self, AudioError> {
        let buffer = Self::new(backend)?;
        buffer.load_file(path)?;
        Ok(buffer)
    }

    /// Replaces this buffer's content with the decoded file at `path`.
    pub fn load_file(&self, path: &Path) -> Result<(), AudioError> {
        let mut source = AudioSource::open(path)?;
        self.load_source(&mut source)
    }

    /// Reads `source` from its current position to the end and makes that
    /// the buffer's content.
    pub fn load_source(&self, source: &mut AudioSource) -> Result<(), AudioError> {
        let descriptor = source.describe();
        let samples = if descriptor.total_samples > 0 {
            let expected = descriptor.total_samples - descriptor.current_offset;
            let mut samples = vec![0i16; expected as usize];
            let mut filled = 0;
            while filled < samples.len() {
                let count = source.read(&mut samples[filled..]);
                if count == 0 {
                    break;
                }
                filled += count;
            }
            if (filled as u64) < expected {
                return Err(AudioError::TruncatedStream {
                    expected,
                    actual: filled as u64,
                });
            }
            samples
        } else {
            // Length unknown up front; read until the source runs dry.
            let mut samples = Vec::new();
            let mut chunk = vec![0i16; LOAD_CHUNK];
            loop {
                let count = source.read(&mut chunk);
                if count == 0 {
                    break;
                }
                samples.extend_from_slice(&chunk[..count]);
            }
            samples
        };
        self.initialize(samples, descriptor.channel_count, descriptor.sample_rate)
    }

    /// Replaces the content with `samples`. Bound handles stay bound.
    pub fn initialize(
        &self,
        samples: Vec<i16>,
        channels: u32,
        sample_rate: u32,
    ) -> Result<(), AudioError> {
        validate(&*self.backend, &samples, channels, sample_rate)?;
        self.rebind(move |state| {
            state.samples = samples;
            state.channels = channels;
            state.sample_rate = sample_rate;
        })
    }

    /// Edits the samples in place and uploads the result.
    pub fn update<F: FnOnce(&mut Vec<i16>)>(&self, edit: F) -> Result<(), AudioError> {
        self.rebind(move |state| edit(&mut state.samples))
    }

    /// Uploads the current content again.
    pub fn commit(&self) -> Result<(), AudioError> {
        self.rebind(|_| {})
    }

    /// Copies the content of `other` into this buffer. Handles bound to this
    /// buffer stay bound; those bound to `other` are not affected.
    pub fn assign_from(&self, other: &SampleBuffer) -> Result<(), AudioError> {
        if Arc::ptr_eq(&self.shared, &other.shared) {
            return Ok(());
        }
        let (samples, channels, sample_rate) = {
            let state = other.shared.state.read();
            (state.samples.clone(), state.channels, state.sample_rate)
        };
        self.initialize(samples, channels, sample_rate)
    }

    /// A new buffer with the same content and no bound handles.
    pub fn try_clone(&self) -> Result<SampleBuffer, AudioError> {
        let copy = SampleBuffer::new(self.backend.clone())?;
        let (samples, channels, sample_rate, committed) = {
            let state = self.shared.state.read();
            (
                state.samples.clone(),
                state.channels,
                state.sample_rate,
                state.layout.is_some(),
            )
        };
        if committed {
            copy.initialize(samples, channels, sample_rate)?;
        }
        Ok(copy)
    }

    /// Detaches bound handles, applies `mutate`, uploads and reattaches.
    /// If the upload fails the handles are left unbound.
    fn rebind<F: FnOnce(&mut BufferState)>(&self, mutate: F) -> Result<(), AudioError> {
        let handles = self.shared.live_handles();
        for handle in &handles {
            self.backend.stop(handle.voice());
            self.backend.set_voice_buffer(handle.voice(), None);
        }

        let result = {
            let mut state = self.shared.state.write();
            mutate(&mut *state);
            self.upload(&mut *state)
                .map(|()| (state.samples.len(), state.channels, state.sample_rate))
        };

        match result {
            Ok((total_samples, channels, sample_rate)) => {
                for handle in &handles {
                    self.backend
                        .set_voice_buffer(handle.voice(), Some(self.shared.device_buffer));
                }
                info!(
                    buffer = %self.shared.device_buffer,
                    channels,
                    sample_rate,
                    total_samples,
                    handles = handles.len(),
                    "Sample buffer committed"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    buffer = %self.shared.device_buffer,
                    err = %e,
                    handles = handles.len(),
                    "Sample buffer commit failed, unbinding handles"
                );
                self.shared.handles.lock().clear();
                for handle in &handles {
                    handle.set_bound(None);
                }
                Err(e)
            }
        }
    }

    /// Validates the state and uploads it to the device buffer. The buffer
    /// counts as unloaded unless this succeeds.
    fn upload(&self, state: &mut BufferState) -> Result<(), AudioError> {
        state.layout = None;
        let layout = validate(
            &*self.backend,
            &state.samples,
            state.channels,
            state.sample_rate,
        )?;
        self.backend.upload(
            self.shared.device_buffer,
            layout,
            &state.samples,
            state.sample_rate,
        )?;
        state.layout = Some(layout);
        Ok(())
    }

    pub fn descriptor(&self) -> AudioDescriptor {
        let state = self.shared.state.read();
        AudioDescriptor {
            channel_count: state.channels,
            sample_rate: state.sample_rate,
            total_samples: state.samples.len() as u64,
            ..Default::default()
        }
    }

    pub fn duration(&self) -> Duration {
        self.descriptor().length()
    }

    pub fn layout(&self) -> Option<ChannelLayout> {
        self.shared.state.read().layout
    }

    /// True once content has been uploaded and handles may bind.
    pub fn is_loaded(&self) -> bool {
        self.shared.is_committed()
    }

    /// The interleaved samples. Holding the guard blocks content changes.
    pub fn samples(&self) -> MappedRwLockReadGuard<'_, [i16]> {
        RwLockReadGuard::map(self.shared.state.read(), |state| state.samples.as_slice())
    }

    /// Number of live handles bound to this buffer.
    pub fn bound_handles(&self) -> usize {
        self.shared.live_handles().len()
    }

    /// Bytes of sample memory held.
    pub fn memory_size(&self) -> usize {
        self.shared.state.read().samples.len() * std::mem::size_of::<i16>()
    }

    pub fn device_buffer(&self) -> BufferId {
        self.shared.device_buffer
    }

    pub(crate) fn shared(&self) -> &Arc<BufferShared> {
        &self.shared
    }
}

impl Drop for SampleBuffer {
    fn drop(&mut self) {
        let handles = self.shared.live_handles();
        self.shared.handles.lock().clear();
        for handle in &handles {
            self.backend.stop(handle.voice());
            self.backend.set_voice_buffer(handle.voice(), None);
            handle.set_bound(None);
        }
        self.backend.delete_buffer(self.shared.device_buffer);
        debug!(
            buffer = %self.shared.device_buffer,
            detached = handles.len(),
            "Sample buffer released"
        );
    }
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("device_buffer", &self.shared.device_buffer)
            .field("descriptor", &self.descriptor())
            .field("bound_handles", &self.bound_handles())
            .finish()
    }
}
