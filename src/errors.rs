//! Error types.
//!
//! All public APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, RenderGraphError>`.
//!
//! Builder-contract violations (duplicate imports, overlapping buffer ranges,
//! transient hash collisions, missing depth-stencil aspect) are *not*
//! represented here — those are reported via `debug_assert!`/`assert!` at the
//! call site, since the graph compiler is structurally infallible given a
//! validly constructed builder. This enum covers only the failure surfaces
//! that genuinely originate outside the graph: the device layer and the job
//! manager.

use thiserror::Error;

/// The render graph's error type.
#[derive(Error, Debug)]
pub enum RenderGraphError {
    // ========================================================================
    // Device Errors
    // ========================================================================
    /// Command-buffer allocation failed.
    #[error("failed to allocate command buffer: {0}")]
    CommandBufferAllocFailed(String),

    /// Timestamp query allocation failed.
    #[error("failed to allocate timestamp query: {0}")]
    QueryAllocFailed(String),

    /// Queue submission failed.
    #[error("queue submit failed: {0}")]
    SubmitFailed(String),

    // ========================================================================
    // Resource Exhaustion
    // ========================================================================
    /// The transient pool's segregated-list allocator could not satisfy a
    /// texture memory request.
    #[error("transient pool exhausted: requested {requested} bytes, class cap {class_cap} bytes")]
    TransientPoolExhausted {
        /// Requested allocation size in bytes.
        requested: u64,
        /// Largest configured memory class, in bytes.
        class_cap: u64,
    },

    // ========================================================================
    // Job Manager Errors
    // ========================================================================
    /// A recording task panicked or was otherwise dropped before completion.
    #[error("recording task failed: {0}")]
    TaskJoinError(String),
}

/// Alias for `Result<T, RenderGraphError>`.
pub type Result<T> = std::result::Result<T, RenderGraphError>;
