//! Minimal `GraphDevice`/`JobManager` mocks, for this crate's own unit tests.
//!
//! A real backend turns every operation into GPU API calls; these mocks turn
//! them into counters and a log of what was asked for, so a test can assert
//! on the shape of what the graph compiled/recorded without a GPU.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::{
    AccelerationStructureBarrierInfo, BufferBarrierInfo, GraphDevice, JobManager, RenderPassInfo, TextureBarrierInfo, TextureDesc,
};
use crate::errors::Result;
use crate::subresource::DepthStencilAspect;
use crate::usage::TextureUsage;

/// The backend-specific remainder of a texture descriptor in tests: just
/// enough to derive a plausible memory requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MockFormat {
    pub bytes_per_texel: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct MockTexture {
    pub id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct MockBuffer {
    pub id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct MockAccelerationStructure {
    pub id: u32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct MockFence;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MockTimestampQuery {
    pub id: u32,
}

/// Records what was asked of it rather than encoding any real command
/// buffer.
pub(crate) struct MockCommandBuffer {
    pub label: String,
    pub barrier_count: u32,
    pub pass_count: u32,
}

#[derive(Default)]
struct TextureInfo {
    mip_count: u32,
    layer_count: u32,
    is_cube: bool,
    aspect: DepthStencilAspect,
}

#[derive(Default)]
struct MockDeviceInner {
    next_texture_id: u32,
    next_timestamp_id: u32,
    textures: HashMap<u32, TextureInfo>,
    /// `(command buffer count, wait_acquire, signal_present, is_last_of_frame)`
    /// for every `submit` call, in order.
    submissions: Vec<(usize, bool, bool, bool)>,
}

/// A `GraphDevice` that fabricates unique texture/timestamp ids and logs
/// submissions instead of talking to any GPU.
#[derive(Clone)]
pub(crate) struct MockDevice {
    inner: Arc<Mutex<MockDeviceInner>>,
}

impl MockDevice {
    pub(crate) fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(MockDeviceInner::default())) }
    }

    pub(crate) fn submissions(&self) -> Vec<(usize, bool, bool, bool)> {
        self.inner.lock().submissions.clone()
    }
}

impl GraphDevice for MockDevice {
    type Texture = MockTexture;
    type Buffer = MockBuffer;
    type AccelerationStructure = MockAccelerationStructure;
    type CommandBuffer = MockCommandBuffer;
    type Fence = MockFence;
    type TimestampQuery = MockTimestampQuery;
    type TextureBackendDesc = MockFormat;

    fn create_texture(&self, desc: &TextureDesc<MockFormat>, _usage: TextureUsage, _size_class_bytes: u64) -> Result<MockTexture> {
        let mut inner = self.inner.lock();
        let id = inner.next_texture_id;
        inner.next_texture_id += 1;
        inner.textures.insert(
            id,
            TextureInfo { mip_count: desc.mip_level_count, layer_count: desc.depth_or_layer_count, is_cube: desc.is_cube, aspect: desc.depth_stencil_aspect },
        );
        Ok(MockTexture { id })
    }

    fn texture_memory_requirement(&self, desc: &TextureDesc<MockFormat>) -> u64 {
        u64::from(desc.width) * u64::from(desc.height) * u64::from(desc.depth_or_layer_count) * u64::from(desc.backend_desc.bytes_per_texel)
    }

    fn texture_uuid(&self, texture: &MockTexture) -> u64 {
        u64::from(texture.id)
    }

    fn buffer_uuid(&self, buffer: &MockBuffer) -> u64 {
        u64::from(buffer.id)
    }

    fn texture_mip_count(&self, texture: &MockTexture) -> u32 {
        self.inner.lock().textures.get(&texture.id).map_or(1, |t| t.mip_count)
    }

    fn texture_layer_count(&self, texture: &MockTexture) -> u32 {
        self.inner.lock().textures.get(&texture.id).map_or(1, |t| t.layer_count)
    }

    fn texture_is_cube(&self, texture: &MockTexture) -> bool {
        self.inner.lock().textures.get(&texture.id).is_some_and(|t| t.is_cube)
    }

    fn texture_depth_stencil_aspect(&self, texture: &MockTexture) -> DepthStencilAspect {
        self.inner.lock().textures.get(&texture.id).map_or(DepthStencilAspect::empty(), |t| t.aspect)
    }

    fn new_command_buffer(&self, name: &str) -> Result<MockCommandBuffer> {
        Ok(MockCommandBuffer { label: name.to_string(), barrier_count: 0, pass_count: 0 })
    }

    fn push_debug_marker(&self, _cmdb: &mut MockCommandBuffer, _name: &str, _color: [f32; 3]) {}
    fn pop_debug_marker(&self, _cmdb: &mut MockCommandBuffer) {}

    fn set_pipeline_barrier(
        &self,
        cmdb: &mut MockCommandBuffer,
        _textures: &[TextureBarrierInfo<MockTexture>],
        _buffers: &[BufferBarrierInfo<MockBuffer>],
        _acceleration_structures: &[AccelerationStructureBarrierInfo<MockAccelerationStructure>],
    ) {
        cmdb.barrier_count += 1;
    }

    fn begin_render_pass(&self, cmdb: &mut MockCommandBuffer, _info: &RenderPassInfo<MockTexture>) {
        cmdb.pass_count += 1;
    }

    fn end_render_pass(&self, _cmdb: &mut MockCommandBuffer) {}

    fn new_timestamp_query(&self) -> Result<MockTimestampQuery> {
        let mut inner = self.inner.lock();
        let id = inner.next_timestamp_id;
        inner.next_timestamp_id += 1;
        Ok(MockTimestampQuery { id })
    }

    fn write_timestamp(&self, _cmdb: &mut MockCommandBuffer, _query: &MockTimestampQuery) {}

    fn timestamp_query_result(&self, query: &MockTimestampQuery) -> Option<f64> {
        Some(f64::from(query.id) * 0.001)
    }

    fn end_recording(&self, cmdb: MockCommandBuffer) -> Result<MockCommandBuffer> {
        Ok(cmdb)
    }

    fn submit(&self, cmdbs: Vec<MockCommandBuffer>, wait_acquire: bool, signal_present: bool, _signal_fence: Option<&MockFence>, is_last_of_frame: bool) -> Result<()> {
        self.inner.lock().submissions.push((cmdbs.len(), wait_acquire, signal_present, is_last_of_frame));
        Ok(())
    }
}

/// Runs every recording task on its own scoped OS thread, as a real
/// multi-threaded `JobManager` would, but without the channel plumbing
/// `job_pool::ThreadPoolJobManager` uses for a long-lived worker pool.
pub(crate) struct MockJobManager {
    thread_count: u32,
}

impl MockJobManager {
    pub(crate) fn new(thread_count: u32) -> Self {
        Self { thread_count }
    }
}

impl JobManager for MockJobManager {
    fn thread_count(&self) -> u32 {
        self.thread_count
    }

    fn dispatch_tasks<'a>(&self, tasks: Vec<Box<dyn FnOnce() + Send + 'a>>) {
        std::thread::scope(|scope| {
            for task in tasks {
                scope.spawn(task);
            }
        });
    }
}
