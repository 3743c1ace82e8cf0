//! A single reference-counted byte allocation with a release callback.

use crate::BufferPool;
use bytes::Bytes;
use std::{mem, ops::Deref, sync::Arc};

/// Owner for wrapped bytes that runs the release callback when the last
/// handle to any view of the allocation drops.
struct Reclaim<F: FnOnce(Vec<u8>) + Send + 'static> {
    data: Vec<u8>,
    release: Option<F>,
}

impl<F: FnOnce(Vec<u8>) + Send + 'static> AsRef<[u8]> for Reclaim<F> {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl<F: FnOnce(Vec<u8>) + Send + 'static> Drop for Reclaim<F> {
    fn drop(&mut self) {
        // Drop is only called once, so the release callback runs exactly once
        // regardless of how many views of the allocation existed.
        if let Some(release) = self.release.take() {
            release(mem::take(&mut self.data));
        }
    }
}

/// A handle to an owned byte region backing part of a wire-format message.
///
/// All handles derived from the same allocation (via [`Clone`], [`Buffer::split_off`],
/// or [`Buffer::split_to`]) share a single reference count and a single release
/// callback. The callback runs exactly once, when the last handle drops. Sharing
/// is only ever achieved through explicit cloning, so whether a drop triggers the
/// release is determined purely by the count, independent of drop order.
///
/// Cloning is cheap: it bumps the shared count without copying bytes.
#[derive(Clone, Default)]
pub struct Buffer {
    bytes: Bytes,
}

impl Buffer {
    /// Wraps externally supplied bytes with a caller-chosen release callback.
    ///
    /// The callback receives the full allocation back (regardless of any
    /// splits taken in the meantime) once every handle has dropped.
    pub fn new(data: Vec<u8>, release: impl FnOnce(Vec<u8>) + Send + 'static) -> Self {
        Self {
            bytes: Bytes::from_owner(Reclaim {
                data,
                release: Some(release),
            }),
        }
    }

    /// Wraps an owned allocation that is simply dropped on release.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            bytes: Bytes::from(data),
        }
    }

    /// Wraps a static byte region. No release occurs.
    pub const fn from_static(data: &'static [u8]) -> Self {
        Self {
            bytes: Bytes::from_static(data),
        }
    }

    /// Copies `data` into an allocation from `pool`, returned to the pool on
    /// release.
    pub fn copied(data: &[u8], pool: &Arc<dyn BufferPool>) -> Self {
        let mut owned = pool.get(data.len());
        owned[..data.len()].copy_from_slice(data);
        let pool = Arc::clone(pool);
        Self::new(owned, move |data| pool.put(data))
    }

    /// Returns the number of readable bytes in this view.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the view contains no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Splits the buffer into two views of the same allocation, keeping
    /// `[0, at)` and returning `[at, len)`.
    ///
    /// Both views share the original reference count and release callback:
    /// the allocation is released exactly once, only after every handle to
    /// either fragment has dropped.
    ///
    /// # Panics
    ///
    /// Panics if `at > len`.
    pub fn split_off(&mut self, at: usize) -> Self {
        Self {
            bytes: self.bytes.split_off(at),
        }
    }

    /// Splits the buffer like [`Buffer::split_off`], but keeps `[at, len)`
    /// and returns `[0, at)`.
    ///
    /// # Panics
    ///
    /// Panics if `at > len`.
    pub fn split_to(&mut self, at: usize) -> Self {
        Self {
            bytes: self.bytes.split_to(at),
        }
    }

    /// Consumes the handle, exposing the underlying shared bytes.
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl From<Bytes> for Buffer {
    fn from(bytes: Bytes) -> Self {
        Self { bytes }
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self.bytes.as_ref()
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes.as_ref()
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer").field("len", &self.len()).finish()
    }
}
