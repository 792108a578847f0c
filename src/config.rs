//! Graph-wide policy knobs.
//!
//! Constructed once at graph creation and never mutated afterwards; retuning
//! policy requires a new [`crate::graph::RenderGraph`] instance. These are
//! the "policy knobs, not fundamental to correctness" the design calls out:
//! changing them can only affect performance, never the compiled graph's
//! observable behaviour.

/// Intra-batch pass reordering strategy (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReorderStrategy {
    /// Stably group compute passes before graphics passes (or vice versa)
    /// within every batch. Favoured by devices that prefer fewer queue-type
    /// context switches overall.
    #[default]
    GroupByKind,
    /// Alternate which kind starts each batch, carrying a running flag
    /// across batch boundaries. Favoured by vendors that signal a
    /// preference for alternation.
    AlternateKind,
}

/// Graph-wide configuration.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Run transient-pool cleanup every N resets. The source's literal
    /// default (`kPeriodicCleanupEvery`).
    pub cleanup_interval_frames: u32,
    /// Segregated-list size classes for the transient pool's GPU memory
    /// allocator, in bytes. Must be sorted ascending.
    pub memory_classes: Vec<u64>,
    /// Override for the number of recording worker threads to use; `None`
    /// defers to `JobManager::thread_count`.
    pub worker_count_override: Option<u32>,
    /// Intra-batch reorder strategy (§4.7).
    pub reorder_strategy: ReorderStrategy,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_frames: 16,
            memory_classes: vec![
                256 * 1024,
                1024 * 1024,
                4 * 1024 * 1024,
                8 * 1024 * 1024,
                16 * 1024 * 1024,
                32 * 1024 * 1024,
                128 * 1024 * 1024,
                256 * 1024 * 1024,
            ],
            worker_count_override: None,
            reorder_strategy: ReorderStrategy::GroupByKind,
        }
    }
}

impl GraphConfig {
    /// Smallest memory class able to hold `size` bytes, or the largest class
    /// if `size` exceeds every class (the allocator still attempts the
    /// allocation at the largest class's granularity).
    #[must_use]
    pub fn class_for(&self, size: u64) -> u64 {
        self.memory_classes
            .iter()
            .copied()
            .find(|&class| class >= size)
            .unwrap_or_else(|| *self.memory_classes.last().unwrap_or(&size))
    }
}
