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

//! The device layer that sample data is handed to.
//!
//! A backend owns device buffers (blocks of uploaded samples) and voices
//! (things that play buffers). A voice either plays one static buffer or a
//! queue of buffers; queued buffers become "processed" once played and can
//! then be unqueued, refilled and queued again.

use std::fmt;

use super::format::ChannelLayout;
use super::sample_source::AudioError;

/// A device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

/// A device voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    /// Created or rewound, never played.
    Initial,
    Playing,
    Paused,
    Stopped,
}

pub trait PlaybackBackend: Send + Sync {
    /// The sample layout to upload `channels`-channel audio with, if the
    /// device supports one.
    fn layout_for_channels(&self, channels: u32) -> Option<ChannelLayout> {
        ChannelLayout::for_channels(channels)
    }

    fn create_buffer(&self) -> Result<BufferId, AudioError>;

    fn delete_buffer(&self, buffer: BufferId);

    /// Replaces the contents of `buffer`.
    fn upload(
        &self,
        buffer: BufferId,
        layout: ChannelLayout,
        samples: &[i16],
        sample_rate: u32,
    ) -> Result<(), AudioError>;

    fn create_voice(&self) -> Result<VoiceId, AudioError>;

    fn delete_voice(&self, voice: VoiceId);

    /// Attaches a static buffer to the voice, or detaches it with `None`.
    /// Any queued buffers are dropped from the voice.
    fn set_voice_buffer(&self, voice: VoiceId, buffer: Option<BufferId>);

    /// Appends a buffer to the voice's queue.
    fn queue_buffer(&self, voice: VoiceId, buffer: BufferId) -> Result<(), AudioError>;

    /// Removes the oldest processed buffer from the queue.
    fn unqueue_processed(&self, voice: VoiceId) -> Option<BufferId>;

    fn processed_count(&self, voice: VoiceId) -> usize;

    fn queued_count(&self, voice: VoiceId) -> usize;

    /// Starts or resumes the voice. Playing a stopped voice restarts its
    /// queue from the first queued buffer.
    fn play(&self, voice: VoiceId);

    fn pause(&self, voice: VoiceId);

    /// Stops the voice. Every queued buffer becomes processed.
    fn stop(&self, voice: VoiceId);

    fn voice_state(&self, voice: VoiceId) -> VoiceState;

    /// Linear gain, 1.0 being unity.
    fn set_gain(&self, voice: VoiceId, gain: f32);
}
