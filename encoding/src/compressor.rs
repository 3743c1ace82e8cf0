//! Pluggable compression over shared buffer sequences.

use crate::Error;
use conduit_mem::{Buffer, BufferPool, Buffers, Writer};
use std::{
    io::{self, Read, Write},
    sync::Arc,
};

/// A write sink that must be finalized before its output is complete.
///
/// Compressed streams buffer internally and emit trailing frames; dropping
/// one without calling [`FinishWrite::finish`] loses data.
pub trait FinishWrite: Write {
    /// Flushes internal state and writes any trailing frames.
    fn finish(self: Box<Self>) -> io::Result<()>;
}

/// Streaming compression over `io` sinks and sources.
///
/// The legacy streaming surface. Adapt to the sequence surface with
/// [`StreamCompressionBridge`].
pub trait StreamCompression: Send + Sync {
    /// Returns the registration name. Must not be empty.
    fn name(&self) -> &'static str;

    /// Returns a sink that compresses written bytes into `sink`.
    fn compress<'a>(&self, sink: Box<dyn Write + 'a>) -> io::Result<Box<dyn FinishWrite + 'a>>;

    /// Returns a source that decompresses bytes read from `source`.
    fn decompress<'a>(&self, source: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>>;
}

/// Whole-block compression over contiguous bytes.
///
/// The oldest surface: compress sees the entire payload at once, decompress
/// drains a source to completion. Adapt with [`BlockCompressionBridge`].
pub trait BlockCompression: Send + Sync {
    /// Returns the registration name. Must not be empty.
    fn name(&self) -> &'static str;

    /// Compresses `data` into `sink`.
    fn compress_block(&self, sink: &mut dyn Write, data: &[u8]) -> io::Result<()>;

    /// Decompresses `source` to completion.
    fn decompress_block(&self, source: &mut dyn Read) -> io::Result<Vec<u8>>;
}

/// Compression over buffer sequences.
///
/// Both directions take ownership of their input and free every member on
/// all paths, including errors. Output sequences are owned by the caller and
/// freed by dropping.
pub trait Compressor: Send + Sync {
    /// Returns the registration name. Must not be empty.
    fn name(&self) -> &'static str;

    /// Compresses a message into a fresh sequence.
    fn compress(&self, input: Buffers) -> Result<Buffers, Error>;

    /// Decompresses a message into a fresh sequence.
    fn decompress(&self, input: Buffers) -> Result<Buffers, Error>;
}

/// Adapts a [`StreamCompression`] to the [`Compressor`] surface.
///
/// Input members are fed to the stream in order and freed as they are
/// consumed. Output accumulates in pool allocations through [`Writer`]. On
/// error, any partial output and all unconsumed input members are freed
/// before the error is returned.
pub struct StreamCompressionBridge {
    inner: Arc<dyn StreamCompression>,
    pool: Arc<dyn BufferPool>,
}

impl StreamCompressionBridge {
    pub fn new(inner: Arc<dyn StreamCompression>, pool: Arc<dyn BufferPool>) -> Self {
        Self { inner, pool }
    }
}

impl Compressor for StreamCompressionBridge {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn compress(&self, input: Buffers) -> Result<Buffers, Error> {
        let mut out = Buffers::default();
        let result = (|| {
            let writer = Writer::new(&mut out, Arc::clone(&self.pool));
            let mut stream = self.inner.compress(Box::new(writer))?;
            for member in input {
                stream.write_all(&member)?;
            }
            stream.finish()
        })();
        // An error drops `out`, freeing partial output.
        result?;
        Ok(out)
    }

    fn decompress(&self, input: Buffers) -> Result<Buffers, Error> {
        let mut out = Buffers::default();
        let result = (|| {
            let mut stream = self.inner.decompress(Box::new(input.into_reader()))?;
            let mut writer = Writer::new(&mut out, Arc::clone(&self.pool));
            io::copy(&mut stream, &mut writer)?;
            writer.flush()
        })();
        result?;
        Ok(out)
    }
}

/// Adapts a [`BlockCompression`] to the [`Compressor`] surface.
///
/// Compress flattens the input through the pool before the block call;
/// decompress drains the input through a reader and returns the result as a
/// single member.
pub struct BlockCompressionBridge {
    inner: Arc<dyn BlockCompression>,
    pool: Arc<dyn BufferPool>,
}

impl BlockCompressionBridge {
    pub fn new(inner: Arc<dyn BlockCompression>, pool: Arc<dyn BufferPool>) -> Self {
        Self { inner, pool }
    }
}

impl Compressor for BlockCompressionBridge {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn compress(&self, input: Buffers) -> Result<Buffers, Error> {
        let flat = input.coalesce(&self.pool);
        drop(input);
        let mut out = Buffers::default();
        let result = (|| {
            let mut writer = Writer::new(&mut out, Arc::clone(&self.pool));
            self.inner.compress_block(&mut writer, &flat)?;
            writer.flush()
        })();
        result?;
        Ok(out)
    }

    fn decompress(&self, input: Buffers) -> Result<Buffers, Error> {
        let mut reader = input.into_reader();
        let data = self.inner.decompress_block(&mut reader)?;
        Ok(Buffers::from(Buffer::from_vec(data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A pool that tracks gets and puts.
    #[derive(Default)]
    struct CountingPool {
        gets: AtomicUsize,
        puts: AtomicUsize,
    }

    impl CountingPool {
        fn outstanding(&self) -> usize {
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

    /// zstd streaming compression.
    struct ZstdCompression;

    impl<W: Write> FinishWrite for zstd::stream::write::Encoder<'_, W> {
        fn finish(self: Box<Self>) -> io::Result<()> {
            zstd::stream::write::Encoder::finish(*self).map(|_| ())
        }
    }

    impl StreamCompression for ZstdCompression {
        fn name(&self) -> &'static str {
            "zstd"
        }

        fn compress<'a>(&self, sink: Box<dyn Write + 'a>) -> io::Result<Box<dyn FinishWrite + 'a>> {
            Ok(Box::new(zstd::stream::write::Encoder::new(sink, 0)?))
        }

        fn decompress<'a>(&self, source: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
            Ok(Box::new(zstd::stream::read::Decoder::new(source)?))
        }
    }

    /// Errors once more than `limit` bytes have been written through it.
    struct TruncatingCompression {
        limit: usize,
    }

    struct TruncatingWriter<'a> {
        sink: Box<dyn Write + 'a>,
        left: usize,
    }

    impl Write for TruncatingWriter<'_> {
        fn write(&mut self, src: &[u8]) -> io::Result<usize> {
            if self.left == 0 {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "limit reached"));
            }
            let n = src.len().min(self.left);
            self.sink.write_all(&src[..n])?;
            self.left -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.sink.flush()
        }
    }

    impl FinishWrite for TruncatingWriter<'_> {
        fn finish(mut self: Box<Self>) -> io::Result<()> {
            self.flush()
        }
    }

    impl StreamCompression for TruncatingCompression {
        fn name(&self) -> &'static str {
            "truncating"
        }

        fn compress<'a>(&self, sink: Box<dyn Write + 'a>) -> io::Result<Box<dyn FinishWrite + 'a>> {
            Ok(Box::new(TruncatingWriter {
                sink,
                left: self.limit,
            }))
        }

        fn decompress<'a>(&self, source: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
            Ok(source)
        }
    }

    /// Reverses the payload, whole-block.
    struct ReverseCompression;

    impl BlockCompression for ReverseCompression {
        fn name(&self) -> &'static str {
            "reverse"
        }

        fn compress_block(&self, sink: &mut dyn Write, data: &[u8]) -> io::Result<()> {
            let reversed: Vec<u8> = data.iter().rev().copied().collect();
            sink.write_all(&reversed)
        }

        fn decompress_block(&self, source: &mut dyn Read) -> io::Result<Vec<u8>> {
            let mut data = Vec::new();
            source.read_to_end(&mut data)?;
            data.reverse();
            Ok(data)
        }
    }

    fn split_input(payload: &[u8], chunk: usize) -> Buffers {
        payload
            .chunks(chunk)
            .map(|part| Buffer::from_vec(part.to_vec()))
            .collect()
    }

    #[test]
    fn test_zstd_stream_round_trip() {
        let pool = Arc::new(CountingPool::default());
        let compressor =
            StreamCompressionBridge::new(Arc::new(ZstdCompression), pool.clone());
        assert_eq!(compressor.name(), "zstd");

        let payload = vec![0x42u8; 64 * 1024];
        let compressed = compressor.compress(split_input(&payload, 1000)).unwrap();
        assert!(compressed.len() < payload.len());

        let decompressed = compressor.decompress(compressed).unwrap();
        assert_eq!(decompressed.materialize(), payload);

        drop(decompressed);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_stream_bridge_error_frees_everything() {
        let pool = Arc::new(CountingPool::default());
        let compressor = StreamCompressionBridge::new(
            Arc::new(TruncatingCompression { limit: 10 }),
            pool.clone(),
        );

        let releases = Arc::new(AtomicUsize::new(0));
        let input: Buffers = [&b"0123456789"[..], b"abcdef", b"ghij"]
            .into_iter()
            .map(|chunk| {
                let releases = Arc::clone(&releases);
                Buffer::new(chunk.to_vec(), move |_| {
                    releases.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        let err = compressor.compress(input).unwrap_err();
        assert!(matches!(err, Error::Io(_)));

        // Partial output went back to the pool and every input member was
        // freed, consumed or not.
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(releases.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_block_bridge_round_trip() {
        let pool = Arc::new(CountingPool::default());
        let compressor = BlockCompressionBridge::new(Arc::new(ReverseCompression), pool.clone());
        assert_eq!(compressor.name(), "reverse");

        let compressed = compressor.compress(split_input(b"abcdef", 2)).unwrap();
        assert_eq!(compressed.materialize(), b"fedcba");

        let decompressed = compressor.decompress(compressed).unwrap();
        assert_eq!(decompressed.materialize(), b"abcdef");

        drop(decompressed);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_stream_bridge_empty_input() {
        let pool: Arc<dyn BufferPool> = Arc::new(CountingPool::default());
        let compressor = StreamCompressionBridge::new(Arc::new(ZstdCompression), pool);

        let compressed = compressor.compress(Buffers::default()).unwrap();
        let decompressed = compressor.decompress(compressed).unwrap();
        assert!(decompressed.is_empty());
    }
}
