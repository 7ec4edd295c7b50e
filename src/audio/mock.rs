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
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use parking_lot::Mutex;
use tracing::debug;

use super::backend::{BufferId, PlaybackBackend, VoiceId, VoiceState};
use super::format::ChannelLayout;
use super::sample_source::AudioError;

/// Contents of a device buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferData {
    pub layout: ChannelLayout,
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

#[derive(Debug)]
struct VoiceData {
    state: VoiceState,
    static_buffer: Option<BufferId>,
    // (buffer, processed)
    queue: VecDeque<(BufferId, bool)>,
    gain: f32,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    buffers: HashMap<BufferId, Option<BufferData>>,
    voices: HashMap<VoiceId, VoiceData>,
    uploads: Vec<(BufferId, Vec<i16>)>,
    layouts: Option<HashSet<ChannelLayout>>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A mock backend. Doesn't actually play anything.
///
/// Queued buffers only become processed when [`Backend::consume`] is called,
/// which stands in for the device playing them.
#[derive(Default)]
pub struct Backend {
    name: String,
    state: Mutex<State>,
}

impl Backend {
    pub fn new(name: &str) -> Backend {
        Backend {
            name: name.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    /// Restricts the layouts this backend accepts.
    pub fn with_layouts(self, layouts: &[ChannelLayout]) -> Backend {
        self.state.lock().layouts = Some(layouts.iter().copied().collect());
        self
    }

    /// Plays through up to `count` queued buffers on a playing voice, marking
    /// them processed. The voice stops once nothing unprocessed remains.
    /// Returns how many buffers were consumed.
    pub fn consume(&self, voice: VoiceId, count: usize) -> usize {
        let mut state = self.state.lock();
        let Some(data) = state.voices.get_mut(&voice) else {
            return 0;
        };
        if data.state != VoiceState::Playing {
            return 0;
        }
        let mut consumed = 0;
        for entry in data.queue.iter_mut().filter(|(_, processed)| !processed) {
            if consumed == count {
                break;
            }
            entry.1 = true;
            consumed += 1;
        }
        if data.queue.iter().all(|(_, processed)| *processed) {
            data.state = VoiceState::Stopped;
        }
        debug!(voice = %voice, consumed, "Mock voice consumed buffers");
        consumed
    }

    /// Ends playback of a voice as if its buffer played out.
    pub fn finish(&self, voice: VoiceId) {
        if let Some(data) = self.state.lock().voices.get_mut(&voice) {
            data.state = VoiceState::Stopped;
            for entry in data.queue.iter_mut() {
                entry.1 = true;
            }
        }
    }

    pub fn buffer_data(&self, buffer: BufferId) -> Option<BufferData> {
        self.state.lock().buffers.get(&buffer).cloned().flatten()
    }

    /// Every upload so far, in order.
    pub fn uploads(&self) -> Vec<(BufferId, Vec<i16>)> {
        self.state.lock().uploads.clone()
    }

    pub fn voice_buffer(&self, voice: VoiceId) -> Option<BufferId> {
        self.state
            .lock()
            .voices
            .get(&voice)
            .and_then(|data| data.static_buffer)
    }

    pub fn queued_buffers(&self, voice: VoiceId) -> Vec<BufferId> {
        self.state
            .lock()
            .voices
            .get(&voice)
            .map(|data| data.queue.iter().map(|(buffer, _)| *buffer).collect())
            .unwrap_or_default()
    }

    pub fn gain(&self, voice: VoiceId) -> Option<f32> {
        self.state.lock().voices.get(&voice).map(|data| data.gain)
    }

    pub fn live_buffers(&self) -> usize {
        self.state.lock().buffers.len()
    }

    pub fn live_voices(&self) -> usize {
        self.state.lock().voices.len()
    }
}

impl PlaybackBackend for Backend {
    fn layout_for_channels(&self, channels: u32) -> Option<ChannelLayout> {
        let layout = ChannelLayout::for_channels(channels)?;
        match &self.state.lock().layouts {
            Some(allowed) if !allowed.contains(&layout) => None,
            _ => Some(layout),
        }
    }

    fn create_buffer(&self) -> Result<BufferId, AudioError> {
        let mut state = self.state.lock();
        let id = BufferId(state.next_id());
        state.buffers.insert(id, None);
        Ok(id)
    }

    fn delete_buffer(&self, buffer: BufferId) {
        self.state.lock().buffers.remove(&buffer);
    }

    fn upload(
        &self,
        buffer: BufferId,
        layout: ChannelLayout,
        samples: &[i16],
        sample_rate: u32,
    ) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        let slot = state
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| AudioError::Backend(format!("unknown {}", buffer)))?;
        *slot = Some(BufferData {
            layout,
            samples: samples.to_vec(),
            sample_rate,
        });
        state.uploads.push((buffer, samples.to_vec()));
        Ok(())
    }

    fn create_voice(&self) -> Result<VoiceId, AudioError> {
        let mut state = self.state.lock();
        let id = VoiceId(state.next_id());
        state.voices.insert(
            id,
            VoiceData {
                state: VoiceState::Initial,
                static_buffer: None,
                queue: VecDeque::new(),
                gain: 1.0,
            },
        );
        Ok(id)
    }

    fn delete_voice(&self, voice: VoiceId) {
        self.state.lock().voices.remove(&voice);
    }

    fn set_voice_buffer(&self, voice: VoiceId, buffer: Option<BufferId>) {
        if let Some(data) = self.state.lock().voices.get_mut(&voice) {
            data.static_buffer = buffer;
            data.queue.clear();
            data.state = VoiceState::Initial;
        }
    }

    fn queue_buffer(&self, voice: VoiceId, buffer: BufferId) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        if !state.buffers.contains_key(&buffer) {
            return Err(AudioError::Backend(format!("unknown {}", buffer)));
        }
        let data = state
            .voices
            .get_mut(&voice)
            .ok_or_else(|| AudioError::Backend(format!("unknown {}", voice)))?;
        if data.static_buffer.is_some() {
            return Err(AudioError::Backend(format!(
                "{} has a static buffer attached",
                voice
            )));
        }
        data.queue.push_back((buffer, false));
        Ok(())
    }

    fn unqueue_processed(&self, voice: VoiceId) -> Option<BufferId> {
        let mut state = self.state.lock();
        let data = state.voices.get_mut(&voice)?;
        match data.queue.front() {
            Some((_, true)) => data.queue.pop_front().map(|(buffer, _)| buffer),
            _ => None,
        }
    }

    fn processed_count(&self, voice: VoiceId) -> usize {
        self.state
            .lock()
            .voices
            .get(&voice)
            .map(|data| data.queue.iter().filter(|(_, processed)| *processed).count())
            .unwrap_or(0)
    }

    fn queued_count(&self, voice: VoiceId) -> usize {
        self.state
            .lock()
            .voices
            .get(&voice)
            .map(|data| data.queue.len())
            .unwrap_or(0)
    }

    fn play(&self, voice: VoiceId) {
        if let Some(data) = self.state.lock().voices.get_mut(&voice) {
            if data.state == VoiceState::Stopped {
                for entry in data.queue.iter_mut() {
                    entry.1 = false;
                }
            }
            let has_audio = data.static_buffer.is_some() || !data.queue.is_empty();
            data.state = if has_audio {
                VoiceState::Playing
            } else {
                VoiceState::Stopped
            };
        }
    }

    fn pause(&self, voice: VoiceId) {
        if let Some(data) = self.state.lock().voices.get_mut(&voice) {
            if data.state == VoiceState::Playing {
                data.state = VoiceState::Paused;
            }
        }
    }

    fn stop(&self, voice: VoiceId) {
        if let Some(data) = self.state.lock().voices.get_mut(&voice) {
            data.state = VoiceState::Stopped;
            for entry in data.queue.iter_mut() {
                entry.1 = true;
            }
        }
    }

    fn voice_state(&self, voice: VoiceId) -> VoiceState {
        self.state
            .lock()
            .voices
            .get(&voice)
            .map(|data| data.state)
            .unwrap_or(VoiceState::Stopped)
    }

    fn set_gain(&self, voice: VoiceId, gain: f32) {
        if let Some(data) = self.state.lock().voices.get_mut(&voice) {
            data.gain = gain;
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_consume_and_unqueue() {
        let backend = Backend::new("mock");
        let voice = backend.create_voice().unwrap();
        let a = backend.create_buffer().unwrap();
        let b = backend.create_buffer().unwrap();
        backend.queue_buffer(voice, a).unwrap();
        backend.queue_buffer(voice, b).unwrap();

        // Nothing is consumed until the voice plays.
        assert_eq!(backend.consume(voice, 1), 0);
        backend.play(voice);
        assert_eq!(backend.consume(voice, 1), 1);
        assert_eq!(backend.processed_count(voice), 1);
        assert_eq!(backend.voice_state(voice), VoiceState::Playing);
        assert_eq!(backend.unqueue_processed(voice), Some(a));
        assert_eq!(backend.unqueue_processed(voice), None);

        assert_eq!(backend.consume(voice, 5), 1);
        assert_eq!(backend.voice_state(voice), VoiceState::Stopped);
        assert_eq!(backend.unqueue_processed(voice), Some(b));
        assert_eq!(backend.queued_count(voice), 0);
    }

    #[test]
    fn test_finish_plays_out_queue() {
        let backend = Backend::new("mock");
        let voice = backend.create_voice().unwrap();
        let a = backend.create_buffer().unwrap();
        let b = backend.create_buffer().unwrap();
        backend.queue_buffer(voice, a).unwrap();
        backend.queue_buffer(voice, b).unwrap();
        backend.play(voice);

        backend.finish(voice);
        assert_eq!(backend.voice_state(voice), VoiceState::Stopped);
        assert_eq!(backend.processed_count(voice), 2);
        assert_eq!(backend.queued_buffers(voice), vec![a, b]);
        assert_eq!(backend.consume(voice, 1), 0);
    }

    #[test]
    fn test_static_buffer_blocks_queueing() {
        let backend = Backend::new("mock");
        let voice = backend.create_voice().unwrap();
        let buffer = backend.create_buffer().unwrap();
        backend.set_voice_buffer(voice, Some(buffer));
        assert!(backend.queue_buffer(voice, buffer).is_err());
        backend.set_voice_buffer(voice, None);
        assert!(backend.queue_buffer(voice, buffer).is_ok());
    }

    #[test]
    fn test_play_without_audio_stops() {
        let backend = Backend::new("mock");
        let voice = backend.create_voice().unwrap();
        assert_eq!(backend.voice_state(voice), VoiceState::Initial);
        backend.play(voice);
        assert_eq!(backend.voice_state(voice), VoiceState::Stopped);
    }

    #[test]
    fn test_layout_restriction() {
        let backend = Backend::new("stereo-only").with_layouts(&[ChannelLayout::Stereo16]);
        assert_eq!(backend.layout_for_channels(2), Some(ChannelLayout::Stereo16));
        assert_eq!(backend.layout_for_channels(1), None);
        assert_eq!(backend.layout_for_channels(3), None);
    }

    #[test]
    fn test_upload_unknown_buffer() {
        let backend = Backend::new("mock");
        assert!(matches!(
            backend.upload(BufferId(99), ChannelLayout::Mono16, &[0], 8000),
            Err(AudioError::Backend(_))
        ));
    }
}
