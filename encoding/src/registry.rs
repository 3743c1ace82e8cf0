//! Process-wide codec and compressor registries.
//!
//! Registration happens once at process startup (typically from constructors
//! of transport features); lookups happen on every message. Names are
//! case-insensitive. Legacy implementations are bridged to the sequence
//! surfaces once, at registration time, so lookups never pay for adaptation.

use crate::{
    BlockCodec, BlockCodecBridge, BlockCompression, BlockCompressionBridge, Codec, Compressor,
    StreamCompression, StreamCompressionBridge,
};
use conduit_mem::default_pool;
use std::{
    collections::HashMap,
    sync::{Arc, LazyLock, RwLock},
};
use tracing::debug;

static CODECS: LazyLock<RwLock<HashMap<String, Arc<dyn Codec>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));
static LEGACY_CODECS: LazyLock<RwLock<HashMap<String, Arc<dyn Codec>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));
static COMPRESSORS: LazyLock<RwLock<HashMap<String, Arc<dyn Compressor>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));
static LEGACY_COMPRESSORS: LazyLock<RwLock<HashMap<String, Arc<dyn Compressor>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Normalizes a registration name.
///
/// # Panics
///
/// Panics if the name is empty. Registration runs at startup; an unnameable
/// entry is a programming error, not a runtime condition.
fn key(name: &str) -> String {
    assert!(!name.is_empty(), "cannot register under an empty name");
    name.to_lowercase()
}

/// Registers a sequence codec, replacing any previous entry under the same
/// name.
pub fn register_codec(codec: Arc<dyn Codec>) {
    let name = key(codec.name());
    debug!(%name, "registered codec");
    CODECS.write().expect("registry poisoned").insert(name, codec);
}

/// Registers a legacy single-block codec, bridged to the sequence surface
/// through the default pool.
///
/// Sequence codecs registered under the same name take priority at lookup.
pub fn register_block_codec(codec: Arc<dyn BlockCodec>) {
    let name = key(codec.name());
    debug!(%name, "registered block codec");
    let bridged = Arc::new(BlockCodecBridge::new(codec, default_pool()));
    LEGACY_CODECS
        .write()
        .expect("registry poisoned")
        .insert(name, bridged);
}

/// Looks up a codec by name, preferring sequence registrations over bridged
/// legacy ones.
pub fn codec(name: &str) -> Option<Arc<dyn Codec>> {
    let name = name.to_lowercase();
    if let Some(found) = CODECS.read().expect("registry poisoned").get(&name) {
        return Some(Arc::clone(found));
    }
    LEGACY_CODECS
        .read()
        .expect("registry poisoned")
        .get(&name)
        .map(Arc::clone)
}

/// Registers a sequence compressor, replacing any previous entry under the
/// same name.
pub fn register_compressor(compressor: Arc<dyn Compressor>) {
    let name = key(compressor.name());
    debug!(%name, "registered compressor");
    COMPRESSORS
        .write()
        .expect("registry poisoned")
        .insert(name, compressor);
}

/// Registers a legacy streaming compressor, bridged to the sequence surface
/// through the default pool.
///
/// Sequence compressors registered under the same name take priority at
/// lookup.
pub fn register_stream_compression(compression: Arc<dyn StreamCompression>) {
    let name = key(compression.name());
    debug!(%name, "registered stream compression");
    let bridged = Arc::new(StreamCompressionBridge::new(compression, default_pool()));
    LEGACY_COMPRESSORS
        .write()
        .expect("registry poisoned")
        .insert(name, bridged);
}

/// Registers a legacy whole-block compressor, bridged to the sequence
/// surface through the default pool.
///
/// Sequence compressors registered under the same name take priority at
/// lookup.
pub fn register_block_compression(compression: Arc<dyn BlockCompression>) {
    let name = key(compression.name());
    debug!(%name, "registered block compression");
    let bridged = Arc::new(BlockCompressionBridge::new(compression, default_pool()));
    LEGACY_COMPRESSORS
        .write()
        .expect("registry poisoned")
        .insert(name, bridged);
}

/// Looks up a compressor by name, preferring sequence registrations over
/// bridged legacy ones.
pub fn compressor(name: &str) -> Option<Arc<dyn Compressor>> {
    let name = name.to_lowercase();
    if let Some(found) = COMPRESSORS.read().expect("registry poisoned").get(&name) {
        return Some(Arc::clone(found));
    }
    LEGACY_COMPRESSORS
        .read()
        .expect("registry poisoned")
        .get(&name)
        .map(Arc::clone)
}

/// Returns the names of all registered compressors, sorted, for capability
/// advertisement.
pub fn registered_compressor_names() -> Vec<String> {
    let mut names: Vec<String> = COMPRESSORS
        .read()
        .expect("registry poisoned")
        .keys()
        .cloned()
        .collect();
    for name in LEGACY_COMPRESSORS.read().expect("registry poisoned").keys() {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    names.sort();
    names
}
