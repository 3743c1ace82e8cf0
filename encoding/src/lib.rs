//! Pluggable message serialization and compression over shared buffer
//! sequences.
//!
//! # Overview
//!
//! A transport frames messages; codecs and compressors decide what the bytes
//! mean. This crate defines the contracts between the two, built on
//! [`conduit_mem`] sequences so implementations can reference framed bytes
//! instead of copying them:
//!
//! - [`Codec`] serializes messages to and from [`conduit_mem::Buffers`];
//!   [`BlockCodec`] is the legacy contiguous-allocation surface, adapted via
//!   [`BlockCodecBridge`].
//! - [`Compressor`] transforms sequences in both directions;
//!   [`StreamCompression`] and [`BlockCompression`] are the legacy streaming
//!   and whole-block surfaces, adapted via their bridges.
//! - [`registry`] holds process-wide registrations looked up by
//!   case-insensitive name on every message.
//!
//! # Example
//!
//! ```
//! use conduit_encoding::{BlockCodec, BlockCodecBridge, Codec, Error, Message};
//! use conduit_mem::{default_pool, Buffers};
//! use std::sync::Arc;
//!
//! // A codec for `String` messages: plain UTF-8 bytes on the wire.
//! struct Utf8Codec;
//!
//! impl BlockCodec for Utf8Codec {
//!     fn name(&self) -> &'static str {
//!         "utf8"
//!     }
//!
//!     fn marshal(&self, message: &dyn Message) -> Result<Vec<u8>, Error> {
//!         let text = message
//!             .as_any()
//!             .downcast_ref::<String>()
//!             .ok_or(Error::UnsupportedMessage("String"))?;
//!         Ok(text.clone().into_bytes())
//!     }
//!
//!     fn unmarshal(&self, data: &[u8], message: &mut dyn Message) -> Result<(), Error> {
//!         let out = message
//!             .as_any_mut()
//!             .downcast_mut::<String>()
//!             .ok_or(Error::UnsupportedMessage("String"))?;
//!         *out = String::from_utf8(data.to_vec()).map_err(|err| Error::Codec(err.into()))?;
//!         Ok(())
//!     }
//! }
//!
//! // Adapt it to the sequence surface and round-trip a message.
//! let codec = BlockCodecBridge::new(Arc::new(Utf8Codec), default_pool());
//! let out = codec.marshal(&"hello".to_string()).unwrap();
//!
//! let mut message = String::new();
//! codec.unmarshal(out.len(), out, &mut message).unwrap();
//! assert_eq!(message, "hello");
//! ```

mod codec;
pub use codec::{BlockCodec, BlockCodecBridge, Codec, Message};
mod compressor;
pub use compressor::{
    BlockCompression, BlockCompressionBridge, Compressor, FinishWrite, StreamCompression,
    StreamCompressionBridge,
};
mod error;
pub use error::Error;
pub mod registry;
