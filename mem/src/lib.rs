//! Manage ownership of wire-format message bytes without copying.
//!
//! # Overview
//!
//! A message received from or destined for the wire rarely lives in one
//! allocation: framing splits it, compression streams it, and pooling demands
//! every allocation find its way back. This crate provides the primitives for
//! passing such messages around by reference instead of by copy:
//!
//! - [`Buffer`]: a reference-counted owned byte region with a release callback
//!   that runs exactly once, when the last handle drops.
//! - [`Buffers`]: an ordered sequence of buffers holding one logical message,
//!   with [`Reader`]/[`Writer`] adapters for sequential I/O.
//! - [`BufferPool`]: the allocation-reuse contract, with [`NoPool`] (plain
//!   heap) and [`TieredPool`] (size-classed recycling) implementations.
//!
//! Sharing is explicit: cloning a [`Buffer`] bumps a shared count, and
//! splitting one produces views over the same allocation. Whichever handle
//! drops last triggers the release, regardless of order.
//!
//! # Example
//!
//! ```
//! use conduit_mem::{Buffer, Buffers, TieredPool};
//! use std::{io::Read, sync::Arc};
//!
//! let pool: Arc<dyn conduit_mem::BufferPool> = Arc::new(TieredPool::default());
//!
//! // Assemble a message from framed fragments without copying them.
//! let mut message = Buffers::default();
//! message.push(Buffer::copied(b"hello ", &pool));
//! message.push(Buffer::copied(b"world", &pool));
//! assert_eq!(message.len(), 11);
//!
//! // Flatten for a consumer that needs contiguous bytes.
//! let flat = message.coalesce(&pool);
//! assert_eq!(&flat[..], b"hello world");
//!
//! // Or stream it; fully consumed fragments return to the pool eagerly.
//! let mut out = Vec::new();
//! message.into_reader().read_to_end(&mut out).unwrap();
//! assert_eq!(out, b"hello world");
//! # drop(flat);
//! ```

mod buffer;
pub use buffer::Buffer;
mod buffers;
pub use buffers::{Buffers, Reader, Writer};
mod error;
pub use error::Error;
mod pool;
pub use pool::{default_pool, BufferPool, NoPool, PoolConfig, TieredPool};
