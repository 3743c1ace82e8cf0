//! An ordered, owned sequence of buffers representing one logical message,
//! plus the stream adapters that expose it as sequential byte I/O.

use crate::{Buffer, BufferPool, Error};
use std::{
    collections::VecDeque,
    io::{Read, Write},
    mem,
    sync::Arc,
};

/// An ordered, owned collection of [`Buffer`]s holding one logical message.
///
/// Order is significant: the message is the concatenation of the members.
/// Cloning takes a fresh reference to every member, so the clone and the
/// original are independently droppable. Dropping a sequence frees every
/// member it owns exactly once.
#[derive(Clone, Default)]
pub struct Buffers {
    bufs: Vec<Buffer>,
}

impl Buffers {
    /// Returns the total number of message bytes across all members.
    ///
    /// Not to be confused with [`Buffers::count`], the number of members.
    pub fn len(&self) -> usize {
        self.bufs.iter().map(Buffer::len).sum()
    }

    /// Returns true if the sequence holds no message bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of member buffers.
    pub fn count(&self) -> usize {
        self.bufs.len()
    }

    /// Appends a buffer to the end of the sequence, taking ownership of it.
    pub fn push(&mut self, buf: Buffer) {
        self.bufs.push(buf);
    }

    /// Moves every member of `other` to the end of the sequence.
    pub fn append(&mut self, other: Buffers) {
        self.bufs.extend(other.bufs);
    }

    /// Returns an error if the total byte count differs from the length
    /// declared by transport framing. Never truncates or pads.
    pub fn expect_len(&self, declared: usize) -> Result<(), Error> {
        let received = self.len();
        if received != declared {
            return Err(Error::LengthMismatch { declared, received });
        }
        Ok(())
    }

    /// Copies member bytes, in order, into `dst`. Returns the number of
    /// bytes written.
    ///
    /// # Panics
    ///
    /// Panics if `dst` is shorter than [`Buffers::len`].
    pub fn copy_to(&self, dst: &mut [u8]) -> usize {
        let mut offset = 0;
        for buf in &self.bufs {
            dst[offset..offset + buf.len()].copy_from_slice(buf);
            offset += buf.len();
        }
        offset
    }

    /// Copies the message into a single fresh contiguous allocation owned by
    /// the caller (not pool-backed).
    pub fn materialize(&self) -> Vec<u8> {
        let mut out = vec![0; self.len()];
        self.copy_to(&mut out);
        out
    }

    /// Returns the message as one contiguous [`Buffer`].
    ///
    /// If the sequence has exactly one member, that member is re-referenced
    /// and returned without copying. Otherwise one allocation of [`Buffers::len`]
    /// bytes is pulled from `pool`, all members are copied into it, and the
    /// result is returned to the pool on release. The single-member fast path
    /// is the dominant cost saving over always copying.
    pub fn coalesce(&self, pool: &Arc<dyn BufferPool>) -> Buffer {
        if self.bufs.len() == 1 {
            return self.bufs[0].clone();
        }
        let mut data = pool.get(self.len());
        self.copy_to(&mut data);
        let pool = Arc::clone(pool);
        Buffer::new(data, move |data| pool.put(data))
    }

    /// Returns a [`Reader`] over a fresh reference to the sequence. The
    /// caller's handle remains independently owned.
    pub fn reader(&self) -> Reader {
        self.clone().into_reader()
    }

    /// Consumes the sequence, returning a [`Reader`] over it.
    pub fn into_reader(self) -> Reader {
        let remaining = self.len();
        Reader {
            bufs: self.bufs.into(),
            offset: 0,
            remaining,
        }
    }

    /// Returns an iterator over the member buffers.
    pub fn iter(&self) -> std::slice::Iter<'_, Buffer> {
        self.bufs.iter()
    }
}

impl From<Buffer> for Buffers {
    fn from(buf: Buffer) -> Self {
        Self { bufs: vec![buf] }
    }
}

impl FromIterator<Buffer> for Buffers {
    fn from_iter<I: IntoIterator<Item = Buffer>>(iter: I) -> Self {
        Self {
            bufs: iter.into_iter().collect(),
        }
    }
}

impl Extend<Buffer> for Buffers {
    fn extend<I: IntoIterator<Item = Buffer>>(&mut self, iter: I) {
        self.bufs.extend(iter);
    }
}

/// Pull-style iteration over owned members. Dropping the iterator early
/// frees every member it still holds.
impl IntoIterator for Buffers {
    type Item = Buffer;
    type IntoIter = std::vec::IntoIter<Buffer>;

    fn into_iter(self) -> Self::IntoIter {
        self.bufs.into_iter()
    }
}

impl<'a> IntoIterator for &'a Buffers {
    type Item = &'a Buffer;
    type IntoIter = std::slice::Iter<'a, Buffer>;

    fn into_iter(self) -> Self::IntoIter {
        self.bufs.iter()
    }
}

impl std::fmt::Debug for Buffers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffers")
            .field("len", &self.len())
            .field("count", &self.count())
            .finish()
    }
}

/// Sequential cursor over an owned buffer sequence.
///
/// Each member is freed as soon as it has been fully consumed. However
/// consumption ends (exhaustion, [`Reader::close`], or drop), every member
/// ends up freed exactly once.
pub struct Reader {
    bufs: VecDeque<Buffer>,
    /// Read position within the front member.
    offset: usize,
    remaining: usize,
}

impl Reader {
    /// Returns the number of unread bytes left in the sequence.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Releases all unread members. Subsequent reads return `Ok(0)`.
    pub fn close(&mut self) {
        self.bufs.clear();
        self.offset = 0;
        self.remaining = 0;
    }
}

impl Read for Reader {
    fn read(&mut self, dst: &mut [u8]) -> std::io::Result<usize> {
        let mut copied = 0;
        while copied < dst.len() && self.remaining != 0 {
            // remaining > 0 guarantees a front member exists.
            let front = &self.bufs[0];
            let take = (dst.len() - copied).min(front.len() - self.offset);
            dst[copied..copied + take].copy_from_slice(&front[self.offset..self.offset + take]);
            copied += take;
            self.offset += take;
            self.remaining -= take;

            if self.offset == front.len() {
                // Fully consumed: free the member and advance.
                self.bufs.pop_front();
                self.offset = 0;
            }
        }
        Ok(copied)
    }
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("remaining", &self.remaining)
            .finish()
    }
}

/// Appends pool-allocated buffers to a target sequence as bytes are written.
///
/// Writes coalesce into the current pool allocation until its capacity is
/// exhausted, then pull a new one sized to the remainder. The in-progress
/// allocation is sealed into the target on [`Write::flush`] and on drop.
///
/// Pool allocation is treated as infallible; a failing pool is a fatal
/// allocation error, not retried here.
pub struct Writer<'a> {
    target: &'a mut Buffers,
    pool: Arc<dyn BufferPool>,
    /// In-progress pool allocation: len is bytes written, spare capacity is
    /// what remains before the next pull.
    current: Vec<u8>,
}

impl<'a> Writer<'a> {
    /// Creates a writer appending to `target` with allocations from `pool`.
    pub fn new(target: &'a mut Buffers, pool: Arc<dyn BufferPool>) -> Self {
        Self {
            target,
            pool,
            current: Vec::new(),
        }
    }

    /// Seals the in-progress allocation into the target sequence. An unused
    /// allocation goes straight back to the pool.
    fn seal(&mut self) {
        let data = mem::take(&mut self.current);
        if data.capacity() == 0 {
            return;
        }
        if data.is_empty() {
            self.pool.put(data);
            return;
        }
        let pool = Arc::clone(&self.pool);
        self.target.push(Buffer::new(data, move |data| pool.put(data)));
    }
}

impl Write for Writer<'_> {
    fn write(&mut self, mut src: &[u8]) -> std::io::Result<usize> {
        let written = src.len();
        while !src.is_empty() {
            if self.current.len() == self.current.capacity() {
                self.seal();
                self.current = self.pool.get(src.len());
                self.current.clear();
            }
            let take = src.len().min(self.current.capacity() - self.current.len());
            self.current.extend_from_slice(&src[..take]);
            src = &src[take..];
        }
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.seal();
        Ok(())
    }
}

impl Drop for Writer<'_> {
    fn drop(&mut self) {
        self.seal();
    }
}
