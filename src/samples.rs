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

//! In-memory sample playback.
//!
//! This module provides:
//! - Sample buffers holding fully decoded audio
//! - Playback handles bound to those buffers
//! - A library that loads and caches buffers from disk

mod buffer;
mod handle;
mod library;

pub use buffer::SampleBuffer;
pub use handle::PlaybackHandle;
pub use library::SampleLibrary;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use super::*;
    use crate::audio::backend::{PlaybackBackend, VoiceState};
    use crate::audio::format::ChannelLayout;
    use crate::audio::io::SharedStream;
    use crate::audio::mock;
    use crate::audio::sample_source::{AudioError, AudioSource};
    use crate::testutil::{i16_bytes, pcm_wav, ramp};

    fn backend() -> Arc<mock::Backend> {
        Arc::new(mock::Backend::new("mock"))
    }

    fn loaded(backend: &Arc<mock::Backend>, samples: &[i16], channels: u32) -> SampleBuffer {
        let buffer = SampleBuffer::new(backend.clone()).unwrap();
        buffer.initialize(samples.to_vec(), channels, 8000).unwrap();
        buffer
    }

    #[test]
    fn test_load_from_source() {
        let backend = backend();
        let signal = ramp(400);
        let mut source = AudioSource::from_stream(SharedStream::from_bytes(pcm_wav(
            2,
            8000,
            16,
            &i16_bytes(&signal),
        )))
        .unwrap();
        let buffer = SampleBuffer::new(backend.clone()).unwrap();
        buffer.load_source(&mut source).unwrap();

        assert!(buffer.is_loaded());
        assert_eq!(&*buffer.samples(), &signal[..]);
        assert_eq!(buffer.layout(), Some(ChannelLayout::Stereo16));
        assert!((buffer.duration().as_secs_f64() - 0.025).abs() < 1e-9);
        let uploaded = backend.buffer_data(buffer.device_buffer()).unwrap();
        assert_eq!(uploaded.samples, signal);
        assert_eq!(uploaded.sample_rate, 8000);
    }

    #[test]
    fn test_load_remaining_samples() {
        let backend = backend();
        let mut source = AudioSource::from_stream(SharedStream::from_bytes(pcm_wav(
            1,
            8000,
            16,
            &i16_bytes(&[1, 2, 3, 4]),
        )))
        .unwrap();
        let mut skip = [0i16; 1];
        source.read(&mut skip);

        let buffer = SampleBuffer::new(backend.clone()).unwrap();
        buffer.load_source(&mut source).unwrap();
        assert_eq!(&*buffer.samples(), &[2, 3, 4]);
    }

    #[test]
    fn test_load_truncated_wav() {
        let backend = backend();
        // The data chunk declares 8000 bytes but only 100 follow.
        let mut bytes = pcm_wav(1, 8000, 16, &[0u8; 100]);
        bytes[40..44].copy_from_slice(&8000u32.to_le_bytes());
        let mut source = AudioSource::from_stream(SharedStream::from_bytes(bytes)).unwrap();
        assert_eq!(source.describe().total_samples, 4000);

        let buffer = SampleBuffer::new(backend.clone()).unwrap();
        assert!(matches!(
            buffer.load_source(&mut source),
            Err(AudioError::TruncatedStream {
                expected: 4000,
                actual: 50
            })
        ));
        assert!(!buffer.is_loaded());
    }

    #[test]
    fn test_commit_validation() {
        let backend = backend();
        let buffer = SampleBuffer::new(backend.clone()).unwrap();
        assert!(matches!(
            buffer.initialize(Vec::new(), 1, 8000),
            Err(AudioError::EmptyBuffer)
        ));
        assert!(matches!(
            buffer.initialize(vec![1], 0, 8000),
            Err(AudioError::MalformedHeader(_))
        ));
        assert!(matches!(
            buffer.initialize(vec![1], 1, 0),
            Err(AudioError::MalformedHeader(_))
        ));
        assert!(matches!(
            buffer.initialize(vec![0; 9], 3, 8000),
            Err(AudioError::UnsupportedChannelLayout(3))
        ));
        assert!(!buffer.is_loaded());
        assert!(matches!(
            buffer.commit(),
            Err(AudioError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_unsupported_device_layout() {
        let backend =
            Arc::new(mock::Backend::new("stereo").with_layouts(&[ChannelLayout::Stereo16]));
        let buffer = SampleBuffer::new(backend.clone()).unwrap();
        assert!(matches!(
            buffer.initialize(vec![0; 4], 1, 8000),
            Err(AudioError::UnsupportedChannelLayout(1))
        ));
        assert!(buffer.initialize(vec![0; 4], 2, 8000).is_ok());
    }

    #[test]
    fn test_bind_requires_loaded_buffer() {
        let backend = backend();
        let buffer = SampleBuffer::new(backend.clone()).unwrap();
        let handle = PlaybackHandle::new(backend.clone()).unwrap();
        assert!(matches!(handle.bind(&buffer), Err(AudioError::EmptyBuffer)));
        assert!(!handle.is_bound());
        assert_eq!(buffer.bound_handles(), 0);
    }

    #[test]
    fn test_play_bound_handle() {
        let backend = backend();
        let buffer = loaded(&backend, &ramp(16), 1);
        let handle = PlaybackHandle::new(backend.clone()).unwrap();
        handle.play();
        assert!(handle.is_stopped());

        handle.bind(&buffer).unwrap();
        assert_eq!(backend.voice_buffer(handle.voice()), Some(buffer.device_buffer()));
        handle.play();
        assert!(handle.is_playing());
        handle.pause();
        assert!(handle.is_paused());
        handle.play();
        assert!(handle.is_playing());
        handle.stop();
        assert!(handle.is_stopped());
    }

    #[test]
    fn test_drop_buffer_unbinds_handles() {
        let backend = backend();
        let buffer = loaded(&backend, &ramp(16), 1);
        let first = PlaybackHandle::new(backend.clone()).unwrap();
        let second = PlaybackHandle::new(backend.clone()).unwrap();
        first.bind(&buffer).unwrap();
        second.bind(&buffer).unwrap();
        first.play();
        assert_eq!(buffer.bound_handles(), 2);

        drop(buffer);
        for handle in [&first, &second] {
            assert!(!handle.is_bound());
            assert!(handle.is_stopped());
            assert_eq!(backend.voice_buffer(handle.voice()), None);
        }
        assert_eq!(backend.live_buffers(), 0);
        // Playing an unbound handle stays silent.
        first.play();
        assert!(first.is_stopped());
    }

    #[test]
    fn test_rebuild_keeps_handles_bound() {
        let backend = backend();
        let buffer = loaded(&backend, &ramp(16), 1);
        let first = PlaybackHandle::new(backend.clone()).unwrap();
        let second = PlaybackHandle::new(backend.clone()).unwrap();
        first.bind(&buffer).unwrap();
        second.bind(&buffer).unwrap();
        first.play();

        buffer.initialize(ramp(64), 2, 22050).unwrap();
        for handle in [&first, &second] {
            assert!(handle.is_bound_to(&buffer));
            assert_eq!(backend.voice_buffer(handle.voice()), Some(buffer.device_buffer()));
        }
        // Rebuilding stops playback; the handle plays again on request.
        assert!(first.is_stopped());
        first.play();
        assert!(first.is_playing());
        assert_eq!(buffer.bound_handles(), 2);
        let uploaded = backend.buffer_data(buffer.device_buffer()).unwrap();
        assert_eq!(uploaded.layout, ChannelLayout::Stereo16);
        assert_eq!(uploaded.samples.len(), 64);

        buffer.update(|samples| samples.truncate(32)).unwrap();
        assert!(first.is_bound_to(&buffer));
        assert_eq!(buffer.descriptor().total_samples, 32);
    }

    #[test]
    fn test_failed_rebuild_unbinds_handles() {
        let backend = backend();
        let buffer = loaded(&backend, &ramp(16), 1);
        let handle = PlaybackHandle::new(backend.clone()).unwrap();
        handle.bind(&buffer).unwrap();

        assert!(matches!(
            buffer.update(|samples| samples.clear()),
            Err(AudioError::EmptyBuffer)
        ));
        assert!(!handle.is_bound());
        assert!(!buffer.is_loaded());
        assert_eq!(buffer.bound_handles(), 0);
    }

    #[test]
    fn test_rebinding_moves_handle() {
        let backend = backend();
        let a = loaded(&backend, &ramp(16), 1);
        let b = loaded(&backend, &ramp(32), 1);
        let handle = PlaybackHandle::new(backend.clone()).unwrap();

        handle.bind(&a).unwrap();
        handle.bind(&a).unwrap();
        assert_eq!(a.bound_handles(), 1);

        handle.bind(&b).unwrap();
        assert!(handle.is_bound_to(&b));
        assert_eq!(a.bound_handles(), 0);
        assert_eq!(b.bound_handles(), 1);

        // A later rebuild of the old buffer leaves the handle alone.
        a.initialize(ramp(8), 1, 8000).unwrap();
        assert!(handle.is_bound_to(&b));
        assert_eq!(backend.voice_buffer(handle.voice()), Some(b.device_buffer()));

        handle.unbind();
        assert!(!handle.is_bound());
        assert_eq!(b.bound_handles(), 0);
    }

    #[test]
    fn test_dropped_handle_leaves_registry() {
        let backend = backend();
        let buffer = loaded(&backend, &ramp(16), 1);
        {
            let handle = PlaybackHandle::new(backend.clone()).unwrap();
            handle.bind(&buffer).unwrap();
            assert_eq!(buffer.bound_handles(), 1);
        }
        assert_eq!(buffer.bound_handles(), 0);
        assert_eq!(backend.live_voices(), 0);
    }

    #[test]
    fn test_buffer_copies() {
        let backend = backend();
        let original = loaded(&backend, &ramp(16), 1);
        let handle = PlaybackHandle::new(backend.clone()).unwrap();
        handle.bind(&original).unwrap();

        let copy = original.try_clone().unwrap();
        assert_ne!(copy.device_buffer(), original.device_buffer());
        assert_eq!(&*copy.samples(), &*original.samples());
        assert_eq!(copy.bound_handles(), 0);

        let target = loaded(&backend, &ramp(4), 1);
        let other = PlaybackHandle::new(backend.clone()).unwrap();
        other.bind(&target).unwrap();
        target.assign_from(&original).unwrap();
        assert_eq!(&*target.samples(), &ramp(16)[..]);
        assert!(other.is_bound_to(&target));
        assert!(handle.is_bound_to(&original));
        assert_eq!(original.bound_handles(), 1);

        target.assign_from(&target).unwrap();
        assert_eq!(target.descriptor().total_samples, 16);
    }

    #[test]
    fn test_handle_volume() {
        let backend = backend();
        let handle = PlaybackHandle::new(backend.clone()).unwrap();
        assert_eq!(handle.volume(), 100.0);
        assert_eq!(backend.gain(handle.voice()), Some(1.0));

        handle.set_volume(50.0);
        assert_eq!(backend.gain(handle.voice()), Some(0.5));
        handle.set_volume(250.0);
        assert_eq!(handle.volume(), 100.0);
        handle.set_volume(-5.0);
        assert_eq!(handle.volume(), 0.0);

        handle.set_initial_volume(25.0);
        assert_eq!(handle.volume(), 25.0);
        handle.set_volume(80.0);
        handle.reset_volume();
        assert_eq!(handle.volume(), 25.0);

        handle.set_muted(true);
        assert_eq!(backend.gain(handle.voice()), Some(0.0));
        handle.set_muted(false);
        assert_eq!(backend.gain(handle.voice()), Some(0.25));
    }

    #[test]
    fn test_handle_clone() {
        let backend = backend();
        let buffer = loaded(&backend, &ramp(16), 1);
        let handle = PlaybackHandle::new(backend.clone()).unwrap();
        handle.set_volume(40.0);
        handle.bind(&buffer).unwrap();

        let copy = handle.try_clone().unwrap();
        assert_ne!(copy.voice(), handle.voice());
        assert_eq!(copy.volume(), 40.0);
        assert!(copy.is_bound_to(&buffer));
        assert_eq!(buffer.bound_handles(), 2);
        assert_eq!(backend.voice_state(copy.voice()), VoiceState::Initial);
    }
}
