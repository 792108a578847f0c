#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Per-frame GPU render graph.
//!
//! Builds a dependency graph of passes over textures, buffer ranges and
//! acceleration structures, partitions it into batches that may run
//! concurrently on the GPU, computes the minimal set of barriers between
//! batches, and records/submits the resulting command buffers across a pool
//! of worker threads with correct swapchain-acquire / present synchronisation.
//!
//! The graph never talks to a concrete graphics API directly: host
//! environments implement [`device::GraphDevice`] and [`device::JobManager`].

pub mod analyser;
pub mod attachment;
pub mod barriers;
pub mod batcher;
pub mod builder;
pub mod config;
pub mod device;
pub mod errors;
pub mod graph;
pub mod handle;
#[cfg(feature = "rdg_inspector")]
mod inspector;
pub mod job_pool;
pub mod recorder;
pub mod registry;
pub mod reorder;
pub mod subresource;
pub mod transient_pool;
pub mod usage;

#[cfg(test)]
pub mod testing;

pub use builder::{GraphicsRenderPassTargetDesc, PassBuilder, PassKind, RenderGraphBuilder};
pub use config::{GraphConfig, ReorderStrategy};
pub use device::{GraphDevice, JobManager};
pub use errors::{Result, RenderGraphError};
pub use graph::{RenderGraph, RenderGraphStatistics, RenderPassWorkContext};
pub use handle::{AccelerationStructureHandle, BufferHandle, RenderTargetHandle};
pub use job_pool::ThreadPoolJobManager;
pub use subresource::{DepthStencilAspect, SubResource};
pub use usage::{AccelerationStructureUsage, BufferUsage, TextureUsage};
