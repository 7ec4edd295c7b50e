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

//! Incremental playback of a long audio source through a ring of device
//! buffers ("slots") queued on a single voice.
//!
//! Nothing runs in the background. The owner calls [`StreamingEngine::tick`]
//! regularly; each tick recycles the slots the device has finished with,
//! refills them from the source and queues them again.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::backend::{BufferId, PlaybackBackend, VoiceId, VoiceState};
use super::format::ChannelLayout;
use super::sample_source::{AudioDescriptor, AudioError, AudioSource};

/// How a stream is cut into slots and played.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    /// Number of slots in the ring. At least 2 are always used.
    pub slots: usize,
    /// Audio held by one slot.
    pub slot_duration: Duration,
    pub loop_enabled: bool,
    /// Linear gain.
    pub volume: f32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            slots: 5,
            slot_duration: Duration::from_secs(1),
            loop_enabled: true,
            volume: 1.0,
        }
    }
}

impl StreamSettings {
    /// Interleaved samples per slot for the given stream.
    pub fn slot_samples(&self, descriptor: &AudioDescriptor) -> usize {
        let frames = (self.slot_duration.as_secs_f64() * f64::from(descriptor.sample_rate))
            .round()
            .max(1.0) as usize;
        frames * descriptor.channel_count as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Not queued on the voice.
    Empty,
    /// Filled and waiting to be played.
    Queued,
    /// Currently being played by the device.
    Draining,
}

/// What a single [`StreamingEngine::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Slots the device had finished playing.
    pub processed: usize,
    /// Slots refilled and queued again.
    pub refilled: usize,
    /// Whether a stopped voice was restarted.
    pub restarted: bool,
}

struct Slot {
    buffer: BufferId,
    queued: bool,
}

pub struct StreamingEngine {
    backend: Arc<dyn PlaybackBackend>,
    source: AudioSource,
    voice: VoiceId,
    layout: ChannelLayout,
    slots: Vec<Slot>,
    /// Slot indices in the order they were queued.
    queue: VecDeque<usize>,
    scratch: Vec<i16>,
    loop_enabled: bool,
    volume: f32,
    active: bool,
    paused: bool,
    exhausted: bool,
}

impl StreamingEngine {
    /// Creates the voice and slot buffers and primes every slot. Playback
    /// does not start until [`StreamingEngine::play`].
    pub fn open(
        backend: Arc<dyn PlaybackBackend>,
        mut source: AudioSource,
        settings: &StreamSettings,
    ) -> Result<Self, AudioError> {
        let descriptor = source.describe();
        let layout = backend
            .layout_for_channels(descriptor.channel_count)
            .ok_or(AudioError::UnsupportedChannelLayout(descriptor.channel_count))?;
        source.set_loop_enabled(settings.loop_enabled);

        let voice = backend.create_voice()?;
        let slot_count = settings.slots.max(2);
        let mut engine = Self {
            backend,
            source,
            voice,
            layout,
            slots: Vec::with_capacity(slot_count),
            queue: VecDeque::with_capacity(slot_count),
            scratch: vec![0; settings.slot_samples(&descriptor)],
            loop_enabled: settings.loop_enabled,
            volume: 1.0,
            active: false,
            paused: false,
            exhausted: false,
        };
        // From here on, a failure drops the engine, which releases whatever
        // was created.
        for _ in 0..slot_count {
            let buffer = engine.backend.create_buffer()?;
            engine.slots.push(Slot {
                buffer,
                queued: false,
            });
        }
        engine.set_volume(settings.volume);
        engine.prime()?;

        info!(
            voice = %engine.voice,
            layout = %layout,
            slots = slot_count,
            slot_samples = engine.scratch.len(),
            loop_enabled = engine.loop_enabled,
            length = ?descriptor.length(),
            "Stream opened"
        );
        Ok(engine)
    }

    /// Fills every empty slot in order, stopping at the first short fill.
    fn prime(&mut self) -> Result<usize, AudioError> {
        let mut queued = 0;
        for index in 0..self.slots.len() {
            if self.slots[index].queued {
                continue;
            }
            let full = self.fill_slot(index)?;
            if self.slots[index].queued {
                queued += 1;
            }
            if !full {
                break;
            }
        }
        Ok(queued)
    }

    /// Fills one slot from the source, looping back to the start if enabled.
    /// The slot is queued if anything was read. Returns whether it is full.
    fn fill_slot(&mut self, index: usize) -> Result<bool, AudioError> {
        let wanted = self.scratch.len();
        let mut filled = 0;
        let mut rewound = false;
        while filled < wanted {
            let count = self.source.read(&mut self.scratch[filled..]);
            if count == 0 {
                if !self.loop_enabled || rewound {
                    self.exhausted = true;
                    break;
                }
                self.source.seek(0)?;
                self.exhausted = false;
                rewound = true;
                debug!(voice = %self.voice, "Stream looped");
                continue;
            }
            rewound = false;
            filled += count;
        }

        if filled > 0 {
            let slot = &mut self.slots[index];
            let rate = self.source.describe().sample_rate;
            self.backend
                .upload(slot.buffer, self.layout, &self.scratch[..filled], rate)?;
            self.backend.queue_buffer(self.voice, slot.buffer)?;
            slot.queued = true;
            self.queue.push_back(index);
        }
        Ok(filled == wanted)
    }

    /// Recycles played slots, refills them and restarts the voice after an
    /// underrun.
    pub fn tick(&mut self) -> Result<TickReport, AudioError> {
        let mut report = TickReport::default();
        if !self.active {
            return Ok(report);
        }

        let mut pending = Vec::new();
        for _ in 0..self.backend.processed_count(self.voice) {
            let Some(buffer) = self.backend.unqueue_processed(self.voice) else {
                break;
            };
            report.processed += 1;
            match self.slots.iter().position(|slot| slot.buffer == buffer) {
                Some(index) => {
                    self.slots[index].queued = false;
                    self.queue.retain(|queued| *queued != index);
                    pending.push(index);
                }
                None => warn!(buffer = %buffer, "Unqueued a buffer this stream does not own"),
            }
        }
        // Slots left empty by an earlier short fill come after the recycled ones.
        for (index, slot) in self.slots.iter().enumerate() {
            if !slot.queued && !pending.contains(&index) {
                pending.push(index);
            }
        }

        for index in pending {
            if self.exhausted && !self.loop_enabled {
                break;
            }
            let full = self.fill_slot(index)?;
            if self.slots[index].queued {
                report.refilled += 1;
            }
            if !full {
                break;
            }
        }

        if !self.paused
            && report.refilled > 0
            && self.backend.voice_state(self.voice) == VoiceState::Stopped
        {
            warn!(voice = %self.voice, "Stream underrun, restarting playback");
            self.backend.play(self.voice);
            report.restarted = true;
        }

        debug!(
            voice = %self.voice,
            processed = report.processed,
            refilled = report.refilled,
            restarted = report.restarted,
            "Stream tick"
        );
        Ok(report)
    }

    /// Starts playback, priming the slots again if the stream was stopped.
    pub fn play(&mut self) -> Result<(), AudioError> {
        if self.queue.is_empty() {
            self.prime()?;
        }
        self.backend.play(self.voice);
        self.active = true;
        self.paused = false;
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.active {
            self.backend.pause(self.voice);
            self.paused = true;
        }
    }

    pub fn resume(&mut self) {
        if self.active && self.paused {
            self.backend.play(self.voice);
            self.paused = false;
        }
    }

    /// Stops the voice, empties every slot and rewinds the source. Calling it
    /// again has no further effect.
    pub fn stop(&mut self) -> Result<(), AudioError> {
        self.backend.stop(self.voice);
        while self.backend.unqueue_processed(self.voice).is_some() {}
        for slot in &mut self.slots {
            slot.queued = false;
        }
        self.queue.clear();
        self.source.seek(0)?;
        self.exhausted = false;
        self.active = false;
        self.paused = false;
        Ok(())
    }

    pub fn is_playing(&self) -> bool {
        self.active && !self.paused && !(self.exhausted && self.queue.is_empty())
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// True once a non-looping source has been read to the end.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted && !self.loop_enabled
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn set_loop_enabled(&mut self, enabled: bool) {
        self.loop_enabled = enabled;
        self.source.set_loop_enabled(enabled);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Sets the linear gain. Negative values are treated as silence.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.max(0.0);
        self.backend.set_gain(self.voice, self.volume);
    }

    pub fn descriptor(&self) -> AudioDescriptor {
        self.source.describe()
    }

    /// The state of each slot, in slot order.
    pub fn slot_states(&self) -> Vec<SlotState> {
        let draining = match self.backend.voice_state(self.voice) {
            VoiceState::Playing | VoiceState::Paused => self.queue.front().copied(),
            _ => None,
        };
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                if !slot.queued {
                    SlotState::Empty
                } else if Some(index) == draining {
                    SlotState::Draining
                } else {
                    SlotState::Queued
                }
            })
            .collect()
    }

    pub fn voice(&self) -> VoiceId {
        self.voice
    }
}

impl Drop for StreamingEngine {
    fn drop(&mut self) {
        self.backend.stop(self.voice);
        self.backend.set_voice_buffer(self.voice, None);
        self.backend.delete_voice(self.voice);
        for slot in &self.slots {
            self.backend.delete_buffer(slot.buffer);
        }
    }
}

impl std::fmt::Debug for StreamingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingEngine")
            .field("voice", &self.voice)
            .field("layout", &self.layout)
            .field("slots", &self.slot_states())
            .field("loop_enabled", &self.loop_enabled)
            .field("active", &self.active)
            .field("paused", &self.paused)
            .finish()
    }
}
