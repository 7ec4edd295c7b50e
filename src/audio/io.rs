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

//! Byte-level access to audio files.
//!
//! Decoders never touch the filesystem directly. They read through a
//! [`ByteStream`], which any `Read + Seek` type already is, and share it
//! through a [`SharedStream`] handle so that a caller may keep using the
//! same stream after handing it to a decoder.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// Synchronous read/seek/tell/size over an opened file.
///
/// Method names differ from `Read`/`Seek` so both traits can be in scope at
/// once.
pub trait ByteStream: Send {
    /// Reads up to `buf.len()` bytes, returning how many were read.
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Moves the read position and returns the new absolute position.
    fn seek_to(&mut self, pos: SeekFrom) -> io::Result<u64>;

    /// Current absolute read position.
    fn position(&mut self) -> io::Result<u64>;

    /// Total size of the stream in bytes. The read position is preserved.
    fn byte_len(&mut self) -> io::Result<u64>;
}

impl<T: Read + Seek + Send> ByteStream for T {
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }

    fn seek_to(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.seek(pos)
    }

    fn position(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    fn byte_len(&mut self) -> io::Result<u64> {
        let current = self.stream_position()?;
        let len = self.seek(SeekFrom::End(0))?;
        if len != current {
            self.seek(SeekFrom::Start(current))?;
        }
        Ok(len)
    }
}

/// Reads until `buf` is full or the stream runs dry. Interrupted reads are
/// retried; the returned count is short only at end of stream.
pub fn read_fully(stream: &mut dyn ByteStream, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read_bytes(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// A cloneable handle to a byte stream.
///
/// A decoder keeps one clone for as long as it lives, so it can never outlive
/// its stream. Whoever else holds a clone is "borrowing" the stream and must
/// re-seek before using it, since the decoder moves the position freely.
#[derive(Clone)]
pub struct SharedStream {
    inner: Arc<Mutex<Box<dyn ByteStream>>>,
}

impl SharedStream {
    /// Wraps an already opened stream.
    pub fn new<S: ByteStream + 'static>(stream: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(stream))),
        }
    }

    /// Opens the file at `path` for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(file))
    }

    /// An in-memory stream over `bytes`.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(Cursor::new(bytes))
    }

    /// Locks the stream for a sequence of operations.
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn ByteStream>> {
        self.inner.lock()
    }

    pub fn seek(&self, offset: u64) -> io::Result<u64> {
        self.lock().seek_to(SeekFrom::Start(offset))
    }

    pub fn position(&self) -> io::Result<u64> {
        self.lock().position()
    }

    pub fn byte_len(&self) -> io::Result<u64> {
        self.lock().byte_len()
    }

    /// Reads until `buf` is full or the stream ends.
    pub fn read_fully(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut guard = self.lock();
        read_fully(&mut **guard, buf)
    }

    /// Number of live handles to this stream, including `self`.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl std::fmt::Debug for SharedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStream")
            .field("handles", &self.handle_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_len_preserves_position() {
        let stream = SharedStream::from_bytes((0u8..32).collect());
        stream.seek(5).unwrap();
        assert_eq!(stream.byte_len().unwrap(), 32);
        assert_eq!(stream.position().unwrap(), 5);
    }

    #[test]
    fn test_read_fully_short_at_end() {
        let stream = SharedStream::from_bytes(vec![1, 2, 3]);
        let mut buf = [0u8; 8];
        assert_eq!(stream.read_fully(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(stream.read_fully(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_clones_share_position() {
        let stream = SharedStream::from_bytes(vec![0; 16]);
        let other = stream.clone();
        stream.seek(10).unwrap();
        assert_eq!(other.position().unwrap(), 10);
        assert_eq!(stream.handle_count(), 2);
    }

    #[test]
    fn test_open_missing_file_names_path() {
        let err = SharedStream::open("/definitely/not/here.wav").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(err.to_string().contains("not/here.wav"));
    }
}
