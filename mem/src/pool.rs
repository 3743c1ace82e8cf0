//! Reusable allocations for message bytes.
//!
//! Provides the [`BufferPool`] contract used throughout the workspace plus two
//! implementations: [`NoPool`], which defers to the global allocator, and
//! [`TieredPool`], which recycles allocations through power-of-two size
//! classes.
//!
//! # Thread Safety
//!
//! Pools are `Send + Sync` and shared behind `Arc`. [`TieredPool`] allocation
//! and return are lock-free, using atomic counters and a lock-free queue
//! ([`crossbeam_queue::ArrayQueue`]).
//!
//! # Size Classes
//!
//! [`TieredPool`] allocations are organized into power-of-two size classes
//! from `min_size` to `max_size`. For example, with `min_size = 256` and
//! `max_size = 2048`:
//! - Class 0: 256 bytes
//! - Class 1: 512 bytes
//! - Class 2: 1024 bytes
//! - Class 3: 2048 bytes
//!
//! Requests are rounded up to the next size class. Requests larger than
//! `max_size` fall back to an untracked heap allocation.

use crossbeam_queue::ArrayQueue;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, LazyLock,
};
use tracing::trace;

/// A source of reusable byte allocations.
///
/// `get` returns an allocation with `len() == size`, zeroed or carrying stale
/// pooled contents the caller is expected to overwrite. `put` offers an
/// allocation back for reuse; implementations are free to drop it. Both must
/// tolerate any allocation being `put`, including ones they never produced.
pub trait BufferPool: Send + Sync {
    /// Returns an allocation of exactly `size` readable bytes.
    fn get(&self, size: usize) -> Vec<u8>;

    /// Offers an allocation back for reuse.
    fn put(&self, data: Vec<u8>);
}

/// A pool that allocates fresh and never retains: `get` is a plain heap
/// allocation and `put` drops.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPool;

impl BufferPool for NoPool {
    fn get(&self, size: usize) -> Vec<u8> {
        vec![0; size]
    }

    fn put(&self, _: Vec<u8>) {}
}

/// Configuration for a [`TieredPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Minimum allocation size. Must be a power of two.
    pub min_size: usize,
    /// Maximum allocation size. Must be a power of two and >= min_size.
    pub max_size: usize,
    /// Maximum number of retained allocations per size class.
    pub max_per_class: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 256,
            max_size: 64 * 1024,
            max_per_class: 1024,
        }
    }
}

impl PoolConfig {
    /// Validates the configuration, panicking on invalid values.
    ///
    /// # Panics
    ///
    /// - `min_size` is not a power of two
    /// - `max_size` is not a power of two
    /// - `max_size < min_size`
    fn validate(&self) {
        assert!(
            self.min_size.is_power_of_two(),
            "min_size must be a power of two"
        );
        assert!(
            self.max_size.is_power_of_two(),
            "max_size must be a power of two"
        );
        assert!(
            self.max_size >= self.min_size,
            "max_size must be >= min_size"
        );
    }

    /// Returns the number of size classes.
    fn num_classes(&self) -> usize {
        // Classes are: min_size, min_size*2, min_size*4, ..., max_size
        (self.max_size / self.min_size).trailing_zeros() as usize + 1
    }

    /// Returns the size class index for a given size.
    /// Returns None if size > max_size.
    fn class_index(&self, size: usize) -> Option<usize> {
        if size > self.max_size {
            return None;
        }
        if size <= self.min_size {
            return Some(0);
        }
        // Find the smallest power-of-two class that fits
        let size_class = size.next_power_of_two();
        Some((size_class / self.min_size).trailing_zeros() as usize)
    }

    /// Returns the allocation size for a given class index.
    const fn class_size(&self, index: usize) -> usize {
        self.min_size << index
    }
}

/// Label for pool metrics, identifying the size class.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct SizeClassLabel {
    size_class: u64,
}

/// Metrics for a [`TieredPool`].
struct PoolMetrics {
    /// Number of allocations currently out of the pool.
    allocated: Family<SizeClassLabel, Gauge>,
    /// Number of allocations available for reuse.
    available: Family<SizeClassLabel, Gauge>,
    /// Total number of allocations served.
    allocations_total: Family<SizeClassLabel, Counter>,
    /// Total number of requests exceeding max allocation size.
    oversized_total: Counter,
}

impl PoolMetrics {
    fn new() -> Self {
        Self {
            allocated: Family::default(),
            available: Family::default(),
            allocations_total: Family::default(),
            oversized_total: Counter::default(),
        }
    }
}

/// Per-size-class state.
struct SizeClass {
    /// The allocation size for this class.
    size: usize,
    /// Allocations available for reuse.
    freelist: ArrayQueue<Vec<u8>>,
    /// Number of allocations currently out of the pool.
    outstanding: AtomicUsize,
}

impl SizeClass {
    fn new(size: usize, max_retained: usize) -> Self {
        Self {
            size,
            freelist: ArrayQueue::new(max_retained),
            outstanding: AtomicUsize::new(0),
        }
    }
}

/// A pool of reusable allocations organized into power-of-two size classes.
///
/// Requests round up to the smallest class that fits; oversized requests fall
/// back to fresh untracked heap allocations. Returned allocations are matched
/// to a class by capacity and retained up to `max_per_class`, beyond which
/// they are dropped. Allocations the pool never produced are tolerated on
/// `put` and silently dropped.
pub struct TieredPool {
    config: PoolConfig,
    classes: Vec<SizeClass>,
    metrics: PoolMetrics,
}

impl std::fmt::Debug for TieredPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredPool")
            .field("config", &self.config)
            .field("num_classes", &self.classes.len())
            .finish()
    }
}

impl Default for TieredPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl TieredPool {
    /// Creates a pool with the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn new(config: PoolConfig) -> Self {
        config.validate();

        let classes = (0..config.num_classes())
            .map(|i| SizeClass::new(config.class_size(i), config.max_per_class))
            .collect();

        Self {
            config,
            classes,
            metrics: PoolMetrics::new(),
        }
    }

    /// Registers the pool's metrics with a prometheus registry.
    pub fn register_metrics(&self, registry: &mut Registry) {
        registry.register(
            "buffer_pool_allocated",
            "Number of allocations currently out of the pool",
            self.metrics.allocated.clone(),
        );
        registry.register(
            "buffer_pool_available",
            "Number of allocations available for reuse",
            self.metrics.available.clone(),
        );
        registry.register(
            "buffer_pool_allocations_total",
            "Total number of allocations served from the pool",
            self.metrics.allocations_total.clone(),
        );
        registry.register(
            "buffer_pool_oversized_total",
            "Total number of allocation requests exceeding max allocation size",
            self.metrics.oversized_total.clone(),
        );
    }

    /// Returns the pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Returns the number of tracked allocations currently out of the pool.
    pub fn outstanding(&self) -> usize {
        self.classes
            .iter()
            .map(|class| class.outstanding.load(Ordering::Relaxed))
            .sum()
    }

    /// Returns the class index an allocation of this capacity belongs to,
    /// or None if the capacity is below the smallest class.
    fn return_class(&self, capacity: usize) -> Option<usize> {
        if capacity < self.config.min_size {
            return None;
        }
        // Capacity may exceed the class size (Vec over-allocation, foreign
        // allocations): file under the largest class that fits within it.
        let index = (capacity / self.config.min_size).ilog2() as usize;
        Some(index.min(self.classes.len() - 1))
    }
}

impl BufferPool for TieredPool {
    fn get(&self, size: usize) -> Vec<u8> {
        let Some(class_index) = self.config.class_index(size) else {
            // Oversized: fresh untracked allocation, dropped on put.
            self.metrics.oversized_total.inc();
            trace!(size, max_size = self.config.max_size, "oversized request");
            return vec![0; size];
        };

        let class = &self.classes[class_index];
        let label = SizeClassLabel {
            size_class: class.size as u64,
        };

        let mut data = match class.freelist.pop() {
            Some(data) => {
                self.metrics.available.get_or_create(&label).dec();
                data
            }
            None => Vec::with_capacity(class.size),
        };
        data.clear();
        data.resize(size, 0);

        class.outstanding.fetch_add(1, Ordering::Relaxed);
        self.metrics.allocations_total.get_or_create(&label).inc();
        self.metrics.allocated.get_or_create(&label).inc();
        data
    }

    fn put(&self, data: Vec<u8>) {
        let Some(class_index) = self.return_class(data.capacity()) else {
            return;
        };
        let class = &self.classes[class_index];

        // Only decrement for allocations this pool handed out. Foreign
        // allocations (and oversized fallbacks) were never counted.
        if class
            .outstanding
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1))
            .is_err()
        {
            return;
        }
        let label = SizeClassLabel {
            size_class: class.size as u64,
        };
        self.metrics.allocated.get_or_create(&label).dec();

        // Freelist full: allocation is dropped.
        if class.freelist.push(data).is_ok() {
            self.metrics.available.get_or_create(&label).inc();
        }
    }
}

static DEFAULT_POOL: LazyLock<Arc<dyn BufferPool>> =
    LazyLock::new(|| Arc::new(TieredPool::default()));

/// Returns the process-wide default pool, shared by callers that don't carry
/// their own.
pub fn default_pool() -> Arc<dyn BufferPool> {
    Arc::clone(&DEFAULT_POOL)
}
