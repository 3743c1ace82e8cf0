//! Pluggable message serialization over shared buffer sequences.

use crate::Error;
use conduit_mem::{Buffer, BufferPool, Buffers};
use std::{any::Any, sync::Arc};

/// A type-erased message value passed through a codec.
///
/// Codecs downcast through [`Message::as_any`] to the concrete types they
/// understand and return [`Error::UnsupportedMessage`] for anything else.
pub trait Message: Any + Send {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Send> Message for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A codec operating on single contiguous allocations.
///
/// The legacy serialization surface: marshal produces one owned allocation,
/// unmarshal consumes one contiguous slice. Adapt to the sequence surface
/// with [`BlockCodecBridge`].
pub trait BlockCodec: Send + Sync {
    /// Returns the registration name. Must not be empty.
    fn name(&self) -> &'static str;

    /// Serializes a message into a fresh allocation.
    fn marshal(&self, message: &dyn Message) -> Result<Vec<u8>, Error>;

    /// Deserializes contiguous bytes into a message.
    fn unmarshal(&self, data: &[u8], message: &mut dyn Message) -> Result<(), Error>;
}

/// A codec operating on buffer sequences.
///
/// Marshal output may reference caller-held memory without copying; the
/// caller keeps the returned sequence alive for as long as it needs the
/// bytes and frees it by dropping. Unmarshal takes ownership of its input
/// and must free every member on all paths, including errors.
pub trait Codec: Send + Sync {
    /// Returns the registration name. Must not be empty.
    fn name(&self) -> &'static str;

    /// Serializes a message into a sequence of buffers.
    fn marshal(&self, message: &dyn Message) -> Result<Buffers, Error>;

    /// Deserializes an owned sequence into a message.
    ///
    /// `declared_len` is the payload length declared by transport framing;
    /// implementations verify it against the received byte count before
    /// interpreting the bytes.
    fn unmarshal(
        &self,
        declared_len: usize,
        data: Buffers,
        message: &mut dyn Message,
    ) -> Result<(), Error>;
}

/// Adapts a [`BlockCodec`] to the [`Codec`] surface.
///
/// Marshal wraps the block codec's allocation as a single-member sequence.
/// Unmarshal verifies the declared length, flattens the input through the
/// pool (zero-copy when it is already a single member), and hands the block
/// codec contiguous bytes. The flattened buffer and the input members are
/// freed on every path.
pub struct BlockCodecBridge {
    inner: Arc<dyn BlockCodec>,
    pool: Arc<dyn BufferPool>,
}

impl BlockCodecBridge {
    pub fn new(inner: Arc<dyn BlockCodec>, pool: Arc<dyn BufferPool>) -> Self {
        Self { inner, pool }
    }
}

impl Codec for BlockCodecBridge {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn marshal(&self, message: &dyn Message) -> Result<Buffers, Error> {
        let data = self.inner.marshal(message)?;
        Ok(Buffers::from(Buffer::from_vec(data)))
    }

    fn unmarshal(
        &self,
        declared_len: usize,
        data: Buffers,
        message: &mut dyn Message,
    ) -> Result<(), Error> {
        data.expect_len(declared_len)?;
        let flat = data.coalesce(&self.pool);
        drop(data);
        self.inner.unmarshal(&flat, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serializes `String` messages as their UTF-8 bytes.
    pub(crate) struct Utf8Codec;

    impl BlockCodec for Utf8Codec {
        fn name(&self) -> &'static str {
            "utf8"
        }

        fn marshal(&self, message: &dyn Message) -> Result<Vec<u8>, Error> {
            let text = message
                .as_any()
                .downcast_ref::<String>()
                .ok_or(Error::UnsupportedMessage("String"))?;
            Ok(text.clone().into_bytes())
        }

        fn unmarshal(&self, data: &[u8], message: &mut dyn Message) -> Result<(), Error> {
            let out = message
                .as_any_mut()
                .downcast_mut::<String>()
                .ok_or(Error::UnsupportedMessage("String"))?;
            *out = String::from_utf8(data.to_vec()).map_err(|err| Error::Codec(err.into()))?;
            Ok(())
        }
    }

    /// A pool that tracks gets and puts.
    #[derive(Default)]
    pub(crate) struct CountingPool {
        pub gets: AtomicUsize,
        pub puts: AtomicUsize,
    }

    impl CountingPool {
        pub fn outstanding(&self) -> usize {
            self.gets.load(Ordering::SeqCst) - self.puts.load(Ordering::SeqCst)
        }
    }

    impl BufferPool for CountingPool {
        fn get(&self, size: usize) -> Vec<u8> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            vec![0; size]
        }

        fn put(&self, _: Vec<u8>) {
            self.puts.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn bridge(pool: Arc<dyn BufferPool>) -> BlockCodecBridge {
        BlockCodecBridge::new(Arc::new(Utf8Codec), pool)
    }

    fn counted(data: &[u8], releases: &Arc<AtomicUsize>) -> Buffer {
        let releases = Arc::clone(releases);
        Buffer::new(data.to_vec(), move |_| {
            releases.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_bridge_round_trip() {
        let pool = Arc::new(CountingPool::default());
        let codec = bridge(pool.clone());
        assert_eq!(codec.name(), "utf8");

        let out = codec.marshal(&"payload".to_string()).unwrap();
        assert_eq!(out.count(), 1);
        assert_eq!(out.materialize(), b"payload");

        let mut message = String::new();
        codec.unmarshal(out.len(), out, &mut message).unwrap();
        assert_eq!(message, "payload");

        // Single-member input flattens without touching the pool.
        assert_eq!(pool.gets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_bridge_coalesces_multi_member_through_pool() {
        let pool = Arc::new(CountingPool::default());
        let codec = bridge(pool.clone());

        let mut data = Buffers::default();
        data.push(Buffer::from_vec(b"split ".to_vec()));
        data.push(Buffer::from_vec(b"payload".to_vec()));

        let mut message = String::new();
        codec.unmarshal(13, data, &mut message).unwrap();
        assert_eq!(message, "split payload");

        // The flattening allocation was returned to the pool.
        assert_eq!(pool.gets.load(Ordering::SeqCst), 1);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_bridge_length_mismatch_frees_input() {
        let pool: Arc<dyn BufferPool> = Arc::new(CountingPool::default());
        let codec = bridge(pool);

        let releases = Arc::new(AtomicUsize::new(0));
        let mut data = Buffers::default();
        data.push(counted(b"abc", &releases));

        let mut message = String::new();
        let err = codec.unmarshal(4, data, &mut message).unwrap_err();
        assert!(matches!(
            err,
            Error::LengthMismatch {
                declared: 4,
                received: 3
            }
        ));
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bridge_unsupported_message() {
        let pool: Arc<dyn BufferPool> = Arc::new(CountingPool::default());
        let codec = bridge(pool);

        let err = codec.marshal(&42u64).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMessage("String")));
    }

    #[test]
    fn test_bridge_decode_error_frees_input() {
        let pool = Arc::new(CountingPool::default());
        let codec = bridge(pool.clone());

        let releases = Arc::new(AtomicUsize::new(0));
        let mut data = Buffers::default();
        data.push(counted(&[0xFF, 0xFE], &releases));
        data.push(counted(&[0xFD], &releases));

        let mut message = String::new();
        let err = codec.unmarshal(3, data, &mut message).unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
        assert_eq!(releases.load(Ordering::SeqCst), 2);
        assert_eq!(pool.outstanding(), 0);
    }
}
