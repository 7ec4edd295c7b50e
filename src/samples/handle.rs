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

//! A voice that plays a [`SampleBuffer`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use super::buffer::{attach, BufferShared, SampleBuffer};
use crate::audio::backend::{PlaybackBackend, VoiceId, VoiceState};
use crate::audio::sample_source::AudioError;

/// Global handle ID counter.
static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Volumes are percentages.
const MAX_VOLUME: f32 = 100.0;

#[derive(Debug, Clone, Copy)]
struct Volume {
    current: f32,
    initial: f32,
    muted: bool,
}

impl Volume {
    fn gain(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.current * 0.01
        }
    }
}

pub(crate) struct HandleShared {
    id: u64,
    voice: VoiceId,
    bound: Mutex<Option<Weak<BufferShared>>>,
}

impl HandleShared {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn voice(&self) -> VoiceId {
        self.voice
    }

    pub(crate) fn set_bound(&self, buffer: Option<Weak<BufferShared>>) {
        *self.bound.lock() = buffer;
    }

    fn bound_buffer(&self) -> Option<Arc<BufferShared>> {
        self.bound.lock().as_ref().and_then(Weak::upgrade)
    }
}

/// Plays at most one [`SampleBuffer`] at a time.
///
/// A handle never keeps its buffer alive. If the buffer is dropped the handle
/// becomes unbound, stopped and silent.
pub struct PlaybackHandle {
    shared: Arc<HandleShared>,
    volume: Mutex<Volume>,
    backend: Arc<dyn PlaybackBackend>,
}

impl PlaybackHandle {
    pub fn new(backend: Arc<dyn PlaybackBackend>) -> Result<Self, AudioError> {
        let voice = backend.create_voice()?;
        let handle = Self {
            shared: Arc::new(HandleShared {
                id: NEXT_HANDLE_ID.fetch_add(1, Ordering::SeqCst),
                voice,
                bound: Mutex::new(None),
            }),
            volume: Mutex::new(Volume {
                current: MAX_VOLUME,
                initial: MAX_VOLUME,
                muted: false,
            }),
            backend,
        };
        handle.apply_gain();
        Ok(handle)
    }

    /// Binds this handle to `buffer`, leaving any previous buffer first.
    pub fn bind(&self, buffer: &SampleBuffer) -> Result<(), AudioError> {
        if self
            .shared
            .bound_buffer()
            .is_some_and(|current| Arc::ptr_eq(&current, buffer.shared()))
        {
            return Ok(());
        }
        self.unbind();
        attach(buffer.shared(), &self.shared, &*self.backend)?;
        debug!(
            handle = self.shared.id,
            voice = %self.shared.voice,
            buffer = %buffer.device_buffer(),
            "Handle bound"
        );
        Ok(())
    }

    /// Stops playback and detaches from the current buffer, if any.
    pub fn unbind(&self) {
        let previous = self.shared.bound.lock().take();
        self.backend.stop(self.shared.voice);
        self.backend.set_voice_buffer(self.shared.voice, None);
        if let Some(buffer) = previous.as_ref().and_then(Weak::upgrade) {
            buffer.forget(self.shared.id);
        }
    }

    pub fn is_bound(&self) -> bool {
        self.shared.bound_buffer().is_some()
    }

    /// True if this handle is bound to `buffer`.
    pub fn is_bound_to(&self, buffer: &SampleBuffer) -> bool {
        self.shared
            .bound_buffer()
            .is_some_and(|current| Arc::ptr_eq(&current, buffer.shared()))
    }

    /// Starts playback from the beginning or resumes after a pause. Does
    /// nothing while unbound.
    pub fn play(&self) {
        if self.is_bound() {
            self.backend.play(self.shared.voice);
        }
    }

    pub fn pause(&self) {
        self.backend.pause(self.shared.voice);
    }

    pub fn stop(&self) {
        self.backend.stop(self.shared.voice);
    }

    pub fn is_playing(&self) -> bool {
        self.backend.voice_state(self.shared.voice) == VoiceState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.backend.voice_state(self.shared.voice) == VoiceState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        matches!(
            self.backend.voice_state(self.shared.voice),
            VoiceState::Stopped | VoiceState::Initial
        )
    }

    pub fn volume(&self) -> f32 {
        self.volume.lock().current
    }

    /// Sets the volume as a percentage, clamped to `[0, 100]`.
    pub fn set_volume(&self, volume: f32) {
        self.volume.lock().current = volume.clamp(0.0, MAX_VOLUME);
        self.apply_gain();
    }

    pub fn initial_volume(&self) -> f32 {
        self.volume.lock().initial
    }

    /// Sets the volume restored by [`PlaybackHandle::reset_volume`] and
    /// applies it now.
    pub fn set_initial_volume(&self, volume: f32) {
        {
            let mut state = self.volume.lock();
            state.initial = volume.clamp(0.0, MAX_VOLUME);
            state.current = state.initial;
        }
        self.apply_gain();
    }

    pub fn reset_volume(&self) {
        {
            let mut state = self.volume.lock();
            state.current = state.initial;
        }
        self.apply_gain();
    }

    pub fn is_muted(&self) -> bool {
        self.volume.lock().muted
    }

    pub fn set_muted(&self, muted: bool) {
        self.volume.lock().muted = muted;
        self.apply_gain();
    }

    fn apply_gain(&self) {
        let gain = self.volume.lock().gain();
        self.backend.set_gain(self.shared.voice, gain);
    }

    /// A new handle with its own voice, the same volume settings and bound
    /// to the same buffer.
    pub fn try_clone(&self) -> Result<PlaybackHandle, AudioError> {
        let copy = PlaybackHandle::new(self.backend.clone())?;
        let volume = *self.volume.lock();
        *copy.volume.lock() = volume;
        copy.apply_gain();
        if let Some(buffer) = self.shared.bound_buffer() {
            attach(&buffer, &copy.shared, &*copy.backend)?;
        }
        Ok(copy)
    }

    pub fn voice(&self) -> VoiceId {
        self.shared.voice
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.unbind();
        self.backend.delete_voice(self.shared.voice);
    }
}

impl std::fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("id", &self.shared.id)
            .field("voice", &self.shared.voice)
            .field("bound", &self.is_bound())
            .field("volume", &*self.volume.lock())
            .finish()
    }
}
