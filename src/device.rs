//! The device abstraction the render graph is compiled against.
//!
//! The graph core never names a concrete graphics API. A host environment
//! implements [`GraphDevice`] (texture/buffer/AS creation, barriers,
//! renderpasses, timestamp queries, submission) and [`JobManager`] (worker
//! thread dispatch), and the graph is generic over both. This generalizes the
//! teacher's direct `wgpu::Device`/`wgpu::Queue` calls and its
//! `CoreThreadJobManager` singleton into a trait boundary, per the
//! specification's API-independence requirement.

use smallvec::SmallVec;

use crate::errors::Result;
use crate::subresource::{DepthStencilAspect, SubResource};
use crate::usage::{AccelerationStructureUsage, BufferUsage, TextureUsage};

/// Maximum simultaneous colour attachments a graphics pass may declare.
pub const MAX_COLOR_RENDER_TARGETS: usize = 8;

/// Texture creation parameters as seen by the render graph. Anything
/// backend-specific (tiling, sharing mode, …) lives in the host's own
/// descriptor type and is threaded through opaquely via `backend_desc`.
#[derive(Debug, Clone)]
pub struct TextureDesc<B> {
    pub width: u32,
    pub height: u32,
    pub depth_or_layer_count: u32,
    pub mip_level_count: u32,
    pub is_cube: bool,
    pub depth_stencil_aspect: DepthStencilAspect,
    pub label: &'static str,
    /// Backend-specific remainder of the descriptor (format, sample count,
    /// etc.) — opaque to the graph, hashed by the caller into the content
    /// hash passed to `new_render_target`.
    pub backend_desc: B,
}

/// Load operation for a render-pass attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

/// Store operation for a render-pass attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Store,
    DontCare,
}

/// Clear colour/depth/stencil value, backend-opaque beyond a plain `f32`/`u32`
/// quad so the graph never depends on a concrete pixel-format type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValue {
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: u32,
}

impl Default for ClearValue {
    fn default() -> Self {
        Self { color: [0.0; 4], depth: 1.0, stencil: 0 }
    }
}

/// A resolved colour attachment, ready for `GraphDevice::begin_render_pass`.
#[derive(Debug, Clone)]
pub struct ColorAttachment<T> {
    pub texture: T,
    pub subresource: SubResource,
    pub usage: TextureUsage,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear_value: ClearValue,
}

/// A resolved depth/stencil attachment.
#[derive(Debug, Clone)]
pub struct DepthStencilAttachment<T> {
    pub texture: T,
    pub subresource: SubResource,
    pub usage: TextureUsage,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub clear_value: ClearValue,
}

/// A resolved variable-rate-shading attachment.
#[derive(Debug, Clone)]
pub struct ShadingRateAttachment<T> {
    pub texture: T,
    pub subresource: SubResource,
    pub texel_size_x: u8,
    pub texel_size_y: u8,
}

/// Fully resolved render-pass begin info, passed to
/// `GraphDevice::begin_render_pass`.
#[derive(Debug, Clone)]
pub struct RenderPassInfo<T> {
    pub color_attachments: SmallVec<[ColorAttachment<T>; MAX_COLOR_RENDER_TARGETS]>,
    pub depth_stencil: Option<DepthStencilAttachment<T>>,
    pub shading_rate: Option<ShadingRateAttachment<T>>,
}

/// A merged texture state transition.
#[derive(Debug, Clone)]
pub struct TextureBarrierInfo<T> {
    pub texture: T,
    pub subresource: SubResource,
    pub previous_usage: TextureUsage,
    pub next_usage: TextureUsage,
}

/// A merged buffer state transition.
#[derive(Debug, Clone)]
pub struct BufferBarrierInfo<B> {
    pub buffer: B,
    pub offset: u64,
    pub range: u64,
    pub previous_usage: BufferUsage,
    pub next_usage: BufferUsage,
}

/// A merged acceleration-structure state transition.
#[derive(Debug, Clone)]
pub struct AccelerationStructureBarrierInfo<A> {
    pub acceleration_structure: A,
    pub previous_usage: AccelerationStructureUsage,
    pub next_usage: AccelerationStructureUsage,
}

/// The graphics-device surface the render graph is compiled against.
///
/// Every associated type is cheaply `Clone`-able (a handle/reference, not an
/// owning resource) except `CommandBuffer`, which is consumed by
/// `end_recording`.
///
/// `GraphDevice` itself must be cheaply `Clone` (typically a thin handle
/// wrapping an `Arc`-backed API device/queue pair, mirroring `wgpu::Device`'s
/// own clone semantics). The builder keeps an owned clone for the frame
/// instead of borrowing it, so `RenderGraph::compile` can take `&mut self`
/// without fighting the borrow checker over a `&self.device` living inside
/// the builder it is consuming.
pub trait GraphDevice: Clone {
    type Texture: Clone + Send + Sync;
    type Buffer: Clone + Send + Sync;
    type AccelerationStructure: Clone + Send + Sync;
    type CommandBuffer: Send;
    type Fence: Clone;
    type TimestampQuery: Send;
    /// Backend-specific remainder of a texture descriptor (format, sample
    /// count, …), opaque to the graph.
    type TextureBackendDesc: Clone;

    /// Create a texture bound to a fresh allocation of at least
    /// `size_class_bytes` bytes — the transient pool's segregated-list class
    /// that covers `texture_memory_requirement(desc)`, not the raw
    /// requirement itself, so the backing allocator can actually recycle
    /// same-class allocations across distinct descriptors.
    fn create_texture(&self, desc: &TextureDesc<Self::TextureBackendDesc>, usage: TextureUsage, size_class_bytes: u64) -> Result<Self::Texture>;

    /// Memory requirement, in bytes, for a texture created from `desc`.
    fn texture_memory_requirement(&self, desc: &TextureDesc<Self::TextureBackendDesc>) -> u64;

    /// Stable identity for the texture's lifetime, used as the cross-frame
    /// "imported texture last usage" table key.
    fn texture_uuid(&self, texture: &Self::Texture) -> u64;
    fn texture_mip_count(&self, texture: &Self::Texture) -> u32;
    fn texture_layer_count(&self, texture: &Self::Texture) -> u32;
    fn texture_is_cube(&self, texture: &Self::Texture) -> bool;
    fn texture_depth_stencil_aspect(&self, texture: &Self::Texture) -> DepthStencilAspect;

    /// Stable identity for the buffer's lifetime, used to scope the imported
    /// buffer range overlap check to ranges within the same underlying
    /// buffer object.
    fn buffer_uuid(&self, buffer: &Self::Buffer) -> u64;

    /// Allocate a command buffer flagged for general work.
    fn new_command_buffer(&self, name: &str) -> Result<Self::CommandBuffer>;
    fn push_debug_marker(&self, cmdb: &mut Self::CommandBuffer, name: &str, color: [f32; 3]);
    fn pop_debug_marker(&self, cmdb: &mut Self::CommandBuffer);

    fn set_pipeline_barrier(
        &self,
        cmdb: &mut Self::CommandBuffer,
        textures: &[TextureBarrierInfo<Self::Texture>],
        buffers: &[BufferBarrierInfo<Self::Buffer>],
        acceleration_structures: &[AccelerationStructureBarrierInfo<Self::AccelerationStructure>],
    );

    fn begin_render_pass(&self, cmdb: &mut Self::CommandBuffer, info: &RenderPassInfo<Self::Texture>);
    fn end_render_pass(&self, cmdb: &mut Self::CommandBuffer);

    fn new_timestamp_query(&self) -> Result<Self::TimestampQuery>;
    fn write_timestamp(&self, cmdb: &mut Self::CommandBuffer, query: &Self::TimestampQuery);
    /// Read back a completed timestamp query, in seconds since an
    /// unspecified but fixed epoch. `None` if not yet available.
    fn timestamp_query_result(&self, query: &Self::TimestampQuery) -> Option<f64>;

    /// Finish recording; the command buffer becomes submittable.
    fn end_recording(&self, cmdb: Self::CommandBuffer) -> Result<Self::CommandBuffer>;

    /// Submit a contiguous run of command buffers.
    ///
    /// `wait_acquire` / `signal_present` request that this submission wait
    /// on the swapchain-acquire semaphore / signal the present semaphore;
    /// `signal_fence`, if present, is signalled once the submission
    /// retires; `is_last_of_frame` flags the final submission of the frame.
    fn submit(
        &self,
        cmdbs: Vec<Self::CommandBuffer>,
        wait_acquire: bool,
        signal_present: bool,
        signal_fence: Option<&Self::Fence>,
        is_last_of_frame: bool,
    ) -> Result<()>;

    /// Current GPU memory used / pool capacity, in bytes, for statistics.
    fn memory_stats(&self) -> (u64, u64) {
        (0, 0)
    }
}

/// The worker-thread pool the recorder dispatches recording tasks onto.
///
/// Mirrors the teacher's `CoreThreadJobManager` (`threadCount`, `dispatchTask`,
/// `waitForAllTasksToFinish`) generalized to a trait. The two source calls
/// are collapsed into one blocking `dispatch_tasks`: every task the recorder
/// hands out borrows frame-local data (the resource registry, resolved
/// textures), so the trait takes them as a batch scoped to the call rather
/// than as `'static` closures threaded through a separate wait call — an
/// implementation runs them via `std::thread::scope` or equivalent and only
/// returns once every one has completed.
pub trait JobManager {
    /// Number of worker threads available for recording tasks.
    fn thread_count(&self) -> u32;

    /// Run every task to completion, in parallel where workers are
    /// available, blocking until all have finished. May run the tasks
    /// sequentially on the calling thread if no workers are available (as
    /// the single-threaded / mock implementations do).
    fn dispatch_tasks<'a>(&self, tasks: Vec<Box<dyn FnOnce() + Send + 'a>>);
}
