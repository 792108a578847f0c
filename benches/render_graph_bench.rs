//! Micro-benchmark for one frame's `compile` → `record_and_submit` → `reset`
//! cycle, across a range of pass counts and worker thread counts.
//!
//! Hand-rolled rather than `criterion`-driven (`harness = false` in
//! Cargo.toml): this is a shape-of-the-curve check run by hand, not a
//! regression gate wired into CI, so a plain loop over `std::time::Instant`
//! is enough.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rendergraph::device::{
    AccelerationStructureBarrierInfo, BufferBarrierInfo, GraphDevice, RenderPassInfo, TextureBarrierInfo, TextureDesc,
};
use rendergraph::job_pool::ThreadPoolJobManager;
use rendergraph::{DepthStencilAspect, GraphConfig, PassKind, RenderGraph, RenderGraphBuilder, SubResource, TextureUsage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BenchFormat {
    bytes_per_texel: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BenchTexture {
    id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BenchBuffer {
    id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BenchAccelerationStructure {
    id: u32,
}

#[derive(Debug, Clone, Copy)]
struct BenchFence;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BenchTimestampQuery {
    id: u32,
}

struct BenchCommandBuffer;

#[derive(Default)]
struct BenchDeviceInner {
    next_texture_id: u32,
    next_timestamp_id: u32,
    texture_dims: HashMap<u32, (u32, u32, bool)>,
}

/// Allocates fake handles and does no real GPU work, so the benchmark
/// measures the graph's own scheduling cost rather than any driver.
#[derive(Clone)]
struct BenchDevice {
    inner: Arc<Mutex<BenchDeviceInner>>,
}

impl BenchDevice {
    fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(BenchDeviceInner::default())) }
    }
}

impl GraphDevice for BenchDevice {
    type Texture = BenchTexture;
    type Buffer = BenchBuffer;
    type AccelerationStructure = BenchAccelerationStructure;
    type CommandBuffer = BenchCommandBuffer;
    type Fence = BenchFence;
    type TimestampQuery = BenchTimestampQuery;
    type TextureBackendDesc = BenchFormat;

    fn create_texture(&self, desc: &TextureDesc<BenchFormat>, _usage: TextureUsage, _size_class_bytes: u64) -> rendergraph::Result<BenchTexture> {
        let mut inner = self.inner.lock();
        let id = inner.next_texture_id;
        inner.next_texture_id += 1;
        inner.texture_dims.insert(id, (desc.mip_level_count, desc.depth_or_layer_count, desc.is_cube));
        Ok(BenchTexture { id })
    }

    fn texture_memory_requirement(&self, desc: &TextureDesc<BenchFormat>) -> u64 {
        u64::from(desc.width) * u64::from(desc.height) * u64::from(desc.backend_desc.bytes_per_texel)
    }

    fn texture_uuid(&self, texture: &BenchTexture) -> u64 {
        u64::from(texture.id)
    }

    fn buffer_uuid(&self, buffer: &BenchBuffer) -> u64 {
        u64::from(buffer.id)
    }

    fn texture_mip_count(&self, texture: &BenchTexture) -> u32 {
        self.inner.lock().texture_dims.get(&texture.id).map_or(1, |d| d.0)
    }

    fn texture_layer_count(&self, texture: &BenchTexture) -> u32 {
        self.inner.lock().texture_dims.get(&texture.id).map_or(1, |d| d.1)
    }

    fn texture_is_cube(&self, texture: &BenchTexture) -> bool {
        self.inner.lock().texture_dims.get(&texture.id).is_some_and(|d| d.2)
    }

    fn texture_depth_stencil_aspect(&self, _texture: &BenchTexture) -> DepthStencilAspect {
        DepthStencilAspect::empty()
    }

    fn new_command_buffer(&self, _name: &str) -> rendergraph::Result<BenchCommandBuffer> {
        Ok(BenchCommandBuffer)
    }

    fn push_debug_marker(&self, _cmdb: &mut BenchCommandBuffer, _name: &str, _color: [f32; 3]) {}
    fn pop_debug_marker(&self, _cmdb: &mut BenchCommandBuffer) {}

    fn set_pipeline_barrier(
        &self,
        _cmdb: &mut BenchCommandBuffer,
        _textures: &[TextureBarrierInfo<BenchTexture>],
        _buffers: &[BufferBarrierInfo<BenchBuffer>],
        _acceleration_structures: &[AccelerationStructureBarrierInfo<BenchAccelerationStructure>],
    ) {
    }

    fn begin_render_pass(&self, _cmdb: &mut BenchCommandBuffer, _info: &RenderPassInfo<BenchTexture>) {}
    fn end_render_pass(&self, _cmdb: &mut BenchCommandBuffer) {}

    fn new_timestamp_query(&self) -> rendergraph::Result<BenchTimestampQuery> {
        let mut inner = self.inner.lock();
        let id = inner.next_timestamp_id;
        inner.next_timestamp_id += 1;
        Ok(BenchTimestampQuery { id })
    }

    fn write_timestamp(&self, _cmdb: &mut BenchCommandBuffer, _query: &BenchTimestampQuery) {}
    fn timestamp_query_result(&self, _query: &BenchTimestampQuery) -> Option<f64> {
        None
    }

    fn end_recording(&self, cmdb: BenchCommandBuffer) -> rendergraph::Result<BenchCommandBuffer> {
        Ok(cmdb)
    }

    fn submit(&self, _cmdbs: Vec<BenchCommandBuffer>, _wait_acquire: bool, _signal_present: bool, _signal_fence: Option<&BenchFence>, _is_last_of_frame: bool) -> rendergraph::Result<()> {
        Ok(())
    }
}

fn bench_desc() -> TextureDesc<BenchFormat> {
    TextureDesc {
        width: 1920,
        height: 1080,
        depth_or_layer_count: 1,
        mip_level_count: 1,
        is_cube: false,
        depth_stencil_aspect: DepthStencilAspect::empty(),
        label: "bench",
        backend_desc: BenchFormat { bytes_per_texel: 4 },
    }
}

/// Builds a frame with `pass_count` passes chained pairwise (pass `i` reads
/// pass `i - 1`'s output), the worst case for batching: every pass lands in
/// its own batch.
fn build_linear_chain(graph: &RenderGraph<BenchDevice, ThreadPoolJobManager>, pass_count: u32) -> RenderGraphBuilder<BenchDevice> {
    let mut builder = graph.new_frame();
    let rts: Vec<_> = (0..pass_count).map(|i| builder.new_render_target(format!("rt{i}"), bench_desc(), u64::from(i) + 1)).collect();

    for i in 0..pass_count as usize {
        let mut pass = builder.new_pass(format!("pass{i}"), PassKind::Graphics);
        if i > 0 {
            pass.new_texture_dependency(rts[i - 1], TextureUsage::SAMPLED_FRAGMENT, SubResource::all());
        }
        pass.new_texture_dependency(rts[i], TextureUsage::FRAMEBUFFER_WRITE, SubResource::all());
    }
    builder
}

/// Builds a frame with `pass_count` passes that all write disjoint render
/// targets and declare no dependency on each other, the best case: one
/// single batch covering every pass.
fn build_fully_parallel(graph: &RenderGraph<BenchDevice, ThreadPoolJobManager>, pass_count: u32) -> RenderGraphBuilder<BenchDevice> {
    let mut builder = graph.new_frame();
    let rts: Vec<_> = (0..pass_count).map(|i| builder.new_render_target(format!("rt{i}"), bench_desc(), u64::from(i) + 1)).collect();

    for (i, &rt) in rts.iter().enumerate() {
        builder.new_pass(format!("pass{i}"), PassKind::Compute).new_texture_dependency(rt, TextureUsage::UAV_COMPUTE_WRITE, SubResource::all());
    }
    builder
}

fn run_frame(graph: &mut RenderGraph<BenchDevice, ThreadPoolJobManager>, scratch: &bumpalo::Bump, builder: RenderGraphBuilder<BenchDevice>) -> Duration {
    let start = Instant::now();
    graph.compile(builder, scratch).expect("compile");
    graph.record_and_submit(None).expect("record_and_submit");
    graph.reset();
    start.elapsed()
}

fn bench_shape(label: &str, pass_counts: &[u32], worker_count: u32, build: fn(&RenderGraph<BenchDevice, ThreadPoolJobManager>, u32) -> RenderGraphBuilder<BenchDevice>) {
    println!("-- {label}, {worker_count} workers --");
    for &pass_count in pass_counts {
        let device = BenchDevice::new();
        let jobs = ThreadPoolJobManager::new(worker_count);
        let mut graph = RenderGraph::new(device, jobs, GraphConfig::default());
        let scratch = bumpalo::Bump::new();

        const WARMUP: u32 = 3;
        const ITERS: u32 = 20;
        for _ in 0..WARMUP {
            let builder = build(&graph, pass_count);
            run_frame(&mut graph, &scratch, builder);
        }

        let mut total = Duration::ZERO;
        for _ in 0..ITERS {
            let builder = build(&graph, pass_count);
            total += run_frame(&mut graph, &scratch, builder);
        }
        let avg = total / ITERS;
        println!("  passes={pass_count:>5}  avg frame={avg:>10.1?}");
    }
}

fn main() {
    env_logger::init();

    let pass_counts = [8, 64, 512, 2048];

    bench_shape("linear chain (worst-case batching)", &pass_counts, 1, build_linear_chain);
    bench_shape("linear chain (worst-case batching)", &pass_counts, 8, build_linear_chain);
    bench_shape("fully parallel (single batch)", &pass_counts, 1, build_fully_parallel);
    bench_shape("fully parallel (single batch)", &pass_counts, 8, build_fully_parallel);
}
