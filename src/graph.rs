//! The render graph itself: owns the device, the job manager, the transient
//! pool and the cross-frame imported-texture-usage table, and drives a
//! builder through `compile` → `record_and_submit` → `reset` each frame.
//!
//! Mirrors the source `RenderGraph` class: `compile` runs the dependency
//! analyser, batcher, attachment resolver and barrier scheduler on the
//! building thread; `record_and_submit` fans the compiled batches out to
//! worker threads and submits the result; `reset` returns transient textures
//! to the pool and writes back every imported texture's final usage so the
//! next frame that imports it sees the right prior state.

use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use rustc_hash::FxHashMap;

use crate::analyser;
use crate::attachment;
use crate::barriers::{AsBarrierAccumulator, BufferBarrierAccumulator, TextureBarrierAccumulator};
use crate::batcher;
use crate::builder::{PassKind, RenderGraphBuilder};
use crate::config::GraphConfig;
use crate::device::{AccelerationStructureBarrierInfo, BufferBarrierInfo, GraphDevice, JobManager, RenderPassInfo, TextureBarrierInfo};
use crate::errors::Result;
use crate::handle::{AccelerationStructureHandle, BufferHandle, RenderTargetHandle};
use crate::recorder;
use crate::registry::RtStorage;
use crate::reorder;
use crate::transient_pool::TransientResourcePool;
use crate::usage::TextureUsage;

pub use crate::builder::RenderPassWorkContext;

/// `(mip, face, layer, depth_stencil_aspect_bits)`, the same key the barrier
/// scheduler accumulates against.
type SurfaceKey = (u32, u32, u32, u8);

/// Per-frame timing and memory figures, readable any time after
/// `record_and_submit` until the next `compile`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderGraphStatistics {
    /// Wall-clock GPU time the frame's command buffers took, in seconds, if
    /// `gather_statistics` was enabled for the frame and both timestamp
    /// queries have resolved.
    pub gpu_time: Option<f64>,
    /// CPU time, in seconds since the graph was created, at which `compile`
    /// started.
    pub cpu_start_time: f64,
    pub gpu_memory_used: u64,
    pub gpu_memory_pool_capacity: u64,
}

/// Everything produced by `compile` that `record_and_submit` and `reset`
/// need. Lives only between `compile` and the matching `reset`.
struct CompiledFrame<D: GraphDevice> {
    builder: RenderGraphBuilder<D>,
    batches: Vec<Vec<usize>>,
    batch_texture_barriers: Vec<Vec<TextureBarrierInfo<D::Texture>>>,
    batch_buffer_barriers: Vec<Vec<BufferBarrierInfo<D::Buffer>>>,
    batch_as_barriers: Vec<Vec<AccelerationStructureBarrierInfo<D::AccelerationStructure>>>,
    renderpass_infos: Vec<Option<RenderPassInfo<D::Texture>>>,
    resolved_textures: Vec<Option<D::Texture>>,
    transient_acquired: Vec<(u64, D::Texture)>,
    /// `(texture_uuid, final_usage)` for every imported render target,
    /// written back into the cross-frame table on `reset`.
    imported_final_usage: Vec<(u64, TextureUsage)>,
    gather_statistics: bool,
}

/// Owns the device, job manager, transient resource pool and cross-frame
/// bookkeeping, and drives one frame at a time through `compile` →
/// `record_and_submit` → `reset`.
pub struct RenderGraph<D: GraphDevice, J: JobManager> {
    device: D,
    jobs: J,
    config: GraphConfig,
    pool: TransientResourcePool<D>,
    /// Last known usage of every imported texture whose usage was declared
    /// undefined at import time, keyed by `GraphDevice::texture_uuid`.
    imported_last_usage: FxHashMap<u64, TextureUsage>,
    created_at: std::time::Instant,
    statistics: RenderGraphStatistics,
    frame: Option<CompiledFrame<D>>,
}

impl<D, J> RenderGraph<D, J>
where
    D: GraphDevice + Sync,
    J: JobManager,
{
    #[must_use]
    pub fn new(device: D, jobs: J, config: GraphConfig) -> Self {
        Self {
            device,
            jobs,
            config,
            pool: TransientResourcePool::new(),
            imported_last_usage: FxHashMap::default(),
            created_at: std::time::Instant::now(),
            statistics: RenderGraphStatistics::default(),
            frame: None,
        }
    }

    /// Starts a new frame's builder, cloning the owned device handle into it.
    #[must_use]
    pub fn new_frame(&self) -> RenderGraphBuilder<D> {
        RenderGraphBuilder::new(self.device.clone())
    }

    /// Resolves every declared resource, runs the dependency analyser and
    /// batcher, reorders each batch, and schedules the minimal set of
    /// barriers between batches.
    ///
    /// `scratch` is a caller-owned arena, reset once per frame by the caller
    /// after `reset()`; `compile` uses it for per-batch staging buffers that
    /// would otherwise be a fresh heap allocation every batch.
    pub fn compile(&mut self, mut builder: RenderGraphBuilder<D>, scratch: &Bump) -> Result<()> {
        let cpu_start_time = self.created_at.elapsed().as_secs_f64();
        let gather_statistics = builder.gather_statistics;

        let resolved = self.resolve_render_targets(&builder)?;
        let ResolvedTargets { resolved_textures, rt_dims, texture_initial_usage, transient_acquired, imported_uuids } = resolved;

        let preds = analyser::analyse_dependencies(&builder);
        let mut batches_raw = batcher::build_batches(&preds);

        let mut alternate_state: Option<PassKind> = None;
        for batch in &mut batches_raw {
            reorder::reorder_batch(&mut batch.passes, self.config.reorder_strategy, |p| builder.passes[p].kind, &mut alternate_state);
        }
        let batches: Vec<Vec<usize>> = batches_raw.into_iter().map(|b| b.passes).collect();

        let mut texture_current_usage: FxHashMap<u32, FxHashMap<SurfaceKey, TextureUsage>> = FxHashMap::default();
        let mut buffer_current_usage: Vec<_> = builder.buffers.iter().map(|b| b.initial_usage).collect();
        let mut as_current_usage: Vec<_> = builder.as_entries.iter().map(|a| a.initial_usage).collect();

        let mut batch_texture_barriers = Vec::with_capacity(batches.len());
        let mut batch_buffer_barriers = Vec::with_capacity(batches.len());
        let mut batch_as_barriers = Vec::with_capacity(batches.len());

        let mut touched_rts: BumpVec<'_, u32> = BumpVec::new_in(scratch);
        let mut touched_buffers: BumpVec<'_, u32> = BumpVec::new_in(scratch);
        let mut touched_as: BumpVec<'_, u32> = BumpVec::new_in(scratch);

        for batch in &batches {
            touched_rts.clear();
            touched_buffers.clear();
            touched_as.clear();

            let mut tex_accs: FxHashMap<u32, TextureBarrierAccumulator> = FxHashMap::default();
            let mut buf_accs: FxHashMap<u32, BufferBarrierAccumulator> = FxHashMap::default();
            let mut as_accs: FxHashMap<u32, AsBarrierAccumulator> = FxHashMap::default();

            for &pass in batch {
                let record = &builder.passes[pass];
                for dep in &record.texture_deps {
                    let idx = dep.rt.index();
                    if !tex_accs.contains_key(&idx) {
                        touched_rts.push(idx);
                    }
                    let (mip_count, layer_count, is_cube) = rt_dims[idx as usize];
                    tex_accs.entry(idx).or_insert_with(TextureBarrierAccumulator::new).accumulate(mip_count, layer_count, is_cube, dep.subresource, dep.usage);
                }
                for dep in &record.buffer_deps {
                    let idx = dep.buffer.index();
                    if !buf_accs.contains_key(&idx) {
                        touched_buffers.push(idx);
                    }
                    buf_accs.entry(idx).or_insert_with(BufferBarrierAccumulator::new).accumulate(dep.usage);
                }
                for dep in &record.as_deps {
                    let idx = dep.acceleration_structure.index();
                    if !as_accs.contains_key(&idx) {
                        touched_as.push(idx);
                    }
                    as_accs.entry(idx).or_insert_with(AsBarrierAccumulator::new).accumulate(dep.usage);
                }
            }

            let mut texture_barriers = Vec::new();
            for &rt_idx in &touched_rts {
                let acc = tex_accs.remove(&rt_idx).expect("touched index always inserted alongside its accumulator");
                let texture = resolved_textures[rt_idx as usize].clone().expect("render target resolved before barrier scheduling");
                let initial = texture_initial_usage[rt_idx as usize];
                let current = texture_current_usage.entry(rt_idx).or_default();
                let barriers = acc.finish(&texture, |key| current.get(&key).copied().unwrap_or(initial));
                for b in &barriers {
                    let key: SurfaceKey = (b.subresource.mip, b.subresource.face, b.subresource.layer, b.subresource.depth_stencil_aspect.bits());
                    current.insert(key, b.next_usage);
                }
                texture_barriers.extend(barriers);
            }

            let mut buffer_barriers: Vec<(u32, BufferBarrierInfo<D::Buffer>)> = Vec::new();
            for &buf_idx in &touched_buffers {
                let acc = buf_accs.remove(&buf_idx).expect("touched index always inserted alongside its accumulator");
                let entry = &builder.buffers[buf_idx as usize];
                if let Some(barrier) = acc.finish(&entry.buffer, entry.offset, entry.range, buffer_current_usage[buf_idx as usize]) {
                    buffer_current_usage[buf_idx as usize] = barrier.next_usage;
                    buffer_barriers.push((buf_idx, barrier));
                }
            }
            // Sorted by buffer identity (registry index, a stable proxy for
            // it) so a device backend sees a deterministic barrier order.
            buffer_barriers.sort_by_key(|(idx, _)| *idx);

            let mut as_barriers = Vec::new();
            for &as_idx in &touched_as {
                let acc = as_accs.remove(&as_idx).expect("touched index always inserted alongside its accumulator");
                let entry = &builder.as_entries[as_idx as usize];
                if let Some(barrier) = acc.finish(&entry.acceleration_structure, as_current_usage[as_idx as usize]) {
                    as_current_usage[as_idx as usize] = barrier.next_usage;
                    as_barriers.push(barrier);
                }
            }

            batch_texture_barriers.push(texture_barriers);
            batch_buffer_barriers.push(buffer_barriers.into_iter().map(|(_, b)| b).collect());
            batch_as_barriers.push(as_barriers);
        }

        let mut pass_batch = vec![0usize; builder.pass_count()];
        for (batch_idx, batch) in batches.iter().enumerate() {
            for &pass in batch {
                pass_batch[pass] = batch_idx;
            }
        }

        let renderpass_infos: Vec<Option<RenderPassInfo<D::Texture>>> = builder
            .passes
            .iter()
            .enumerate()
            .map(|(pass_idx, p)| {
                if p.kind != PassKind::Graphics {
                    return None;
                }
                p.graphics_target_desc.as_ref().map(|desc| {
                    let batch = &batches[pass_batch[pass_idx]];
                    attachment::resolve_render_pass_info::<D::Texture>(
                        desc,
                        |rt| resolved_textures[rt.index() as usize].clone().expect("render target resolved for this frame"),
                        |rt, subresource| batch_scoped_usage(&builder, batch, rt, subresource),
                    )
                })
            })
            .collect();

        let imported_final_usage = imported_uuids
            .into_iter()
            .map(|(uuid, rt_idx)| {
                let final_usage = final_usage_for(&texture_current_usage, rt_idx, texture_initial_usage[rt_idx as usize]);
                (uuid, final_usage)
            })
            .collect();

        self.frame = Some(CompiledFrame {
            builder,
            batches,
            batch_texture_barriers,
            batch_buffer_barriers,
            batch_as_barriers,
            renderpass_infos,
            resolved_textures,
            transient_acquired,
            imported_final_usage,
            gather_statistics,
        });
        self.statistics.cpu_start_time = cpu_start_time;
        Ok(())
    }

    /// Resolves every render target declared on `builder` to a concrete
    /// device texture, acquiring transient ones from the pool.
    fn resolve_render_targets(&mut self, builder: &RenderGraphBuilder<D>) -> Result<ResolvedTargets<D>> {
        let rt_count = builder.render_targets.len();
        let mut resolved_textures = Vec::with_capacity(rt_count);
        let mut rt_dims = Vec::with_capacity(rt_count);
        let mut texture_initial_usage = Vec::with_capacity(rt_count);
        let mut transient_acquired = Vec::new();
        let mut imported_uuids = Vec::new();

        for (idx, rt) in builder.render_targets.iter().enumerate() {
            match &rt.storage {
                RtStorage::Imported { texture, last_known_usage, undefined_usage } => {
                    let uuid = self.device.texture_uuid(texture);
                    let initial = if *undefined_usage {
                        self.imported_last_usage.get(&uuid).copied().unwrap_or(TextureUsage::empty())
                    } else {
                        *last_known_usage
                    };
                    rt_dims.push((self.device.texture_mip_count(texture), self.device.texture_layer_count(texture), self.device.texture_is_cube(texture)));
                    texture_initial_usage.push(initial);
                    imported_uuids.push((uuid, idx as u32));
                    resolved_textures.push(Some(texture.clone()));
                }
                RtStorage::Transient { desc, hash } => {
                    let key = crate::transient_pool::pool_key(*hash, rt.usage_derived_by_deps);
                    let texture = self.pool.acquire(&self.device, key, desc, rt.usage_derived_by_deps, &self.config)?;
                    rt_dims.push((desc.mip_level_count, desc.depth_or_layer_count, desc.is_cube));
                    texture_initial_usage.push(TextureUsage::empty());
                    transient_acquired.push((key, texture.clone()));
                    resolved_textures.push(Some(texture));
                }
            }
        }

        Ok(ResolvedTargets { resolved_textures, rt_dims, texture_initial_usage, transient_acquired, imported_uuids })
    }

    /// Records every batch across worker threads and submits the resulting
    /// command buffers, splitting into two submissions if a group after the
    /// first wrote the swapchain. `frame_fence`, if given, is signalled once
    /// the frame's final submission retires.
    pub fn record_and_submit(&mut self, frame_fence: Option<&D::Fence>) -> Result<()>
    where
        D::CommandBuffer: Send,
    {
        let frame = self.frame.as_mut().expect("record_and_submit called without a compiled frame");

        let outcome = recorder::record_and_submit(
            &self.device,
            &self.jobs,
            &mut frame.builder,
            &frame.batches,
            &frame.batch_texture_barriers,
            &frame.batch_buffer_barriers,
            &frame.batch_as_barriers,
            &frame.renderpass_infos,
            &frame.resolved_textures,
            self.config.worker_count_override,
            frame.gather_statistics,
            frame_fence,
        )?;

        let (gpu_mem_used, gpu_mem_capacity) = self.device.memory_stats();
        self.statistics.gpu_memory_used = gpu_mem_used;
        self.statistics.gpu_memory_pool_capacity = gpu_mem_capacity;
        self.statistics.gpu_time = match (outcome.pre_timestamp, outcome.post_timestamp) {
            (Some(pre), Some(post)) => {
                let pre = self.device.timestamp_query_result(&pre);
                let post = self.device.timestamp_query_result(&post);
                pre.zip(post).map(|(p, q)| q - p)
            }
            _ => None,
        };

        Ok(())
    }

    /// Returns this frame's transient textures to the pool, writes back
    /// every imported texture's final usage for the next frame that imports
    /// it, and runs periodic pool cleanup. Must be called once per frame,
    /// after `record_and_submit`, before the next `compile`.
    pub fn reset(&mut self) {
        let frame = self.frame.take().expect("reset called without a compiled frame");

        self.pool.release_frame(frame.transient_acquired, &self.config);

        for (uuid, usage) in frame.imported_final_usage {
            self.imported_last_usage.insert(uuid, usage);
        }
    }

    /// Resolves `handle` to its concrete device texture. Valid only between
    /// `compile` and the matching `reset`.
    #[must_use]
    pub fn get_texture(&self, handle: RenderTargetHandle) -> &D::Texture {
        self.frame
            .as_ref()
            .expect("get_texture called outside a compiled frame")
            .resolved_textures[handle.index() as usize]
            .as_ref()
            .expect("render target resolved at compile time")
    }

    /// Resolves `handle` to its concrete device buffer. Valid only between
    /// `compile` and the matching `reset`.
    #[must_use]
    pub fn get_buffer(&self, handle: BufferHandle) -> &D::Buffer {
        &self.frame.as_ref().expect("get_buffer called outside a compiled frame").builder.buffers[handle.index() as usize].buffer
    }

    /// Resolves `handle` to its concrete device acceleration structure. Valid
    /// only between `compile` and the matching `reset`.
    #[must_use]
    pub fn get_acceleration_structure(&self, handle: AccelerationStructureHandle) -> &D::AccelerationStructure {
        &self.frame.as_ref().expect("get_acceleration_structure called outside a compiled frame").builder.as_entries[handle.index() as usize].acceleration_structure
    }

    #[must_use]
    pub fn statistics(&self) -> RenderGraphStatistics {
        self.statistics
    }

    #[must_use]
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Renders the last compiled frame as a Graphviz `dot` digraph: one
    /// colour-coded cluster per batch, pass nodes labelled by name and kind,
    /// and a barrier node between consecutive batches for every resource
    /// whose usage changed, labelled with its name, sub-resource and
    /// usage-before -> usage-after. Debug tooling, not wired into any
    /// scheduling decision.
    #[cfg(feature = "rdg_inspector")]
    #[must_use]
    pub fn dump_dot(&self) -> String {
        let frame = self.frame.as_ref().expect("dump_dot called outside a compiled frame");

        let mut texture_names_by_uuid: FxHashMap<u64, String> = FxHashMap::default();
        for (idx, rt) in frame.builder.render_targets.iter().enumerate() {
            if let Some(texture) = &frame.resolved_textures[idx] {
                texture_names_by_uuid.insert(self.device.texture_uuid(texture), rt.name.clone());
            }
        }

        let passes: Vec<crate::inspector::PassNode> = frame
            .builder
            .passes
            .iter()
            .map(|p| crate::inspector::PassNode { name: p.name.clone(), kind: format!("{:?}", p.kind) })
            .collect();

        let barriers: Vec<Vec<crate::inspector::BarrierLabel>> = frame
            .batch_texture_barriers
            .iter()
            .zip(&frame.batch_buffer_barriers)
            .zip(&frame.batch_as_barriers)
            .map(|((tex, buf), acc)| {
                let mut labels = Vec::with_capacity(tex.len() + buf.len() + acc.len());
                for b in tex {
                    let name = texture_names_by_uuid.get(&self.device.texture_uuid(&b.texture)).cloned().unwrap_or_else(|| "texture".to_string());
                    labels.push(crate::inspector::BarrierLabel {
                        resource_name: name,
                        subresource: format!("mip={} face={} layer={}", b.subresource.mip, b.subresource.face, b.subresource.layer),
                        before: format!("{:?}", b.previous_usage),
                        after: format!("{:?}", b.next_usage),
                    });
                }
                for b in buf {
                    let name = frame
                        .builder
                        .buffers
                        .iter()
                        .find(|entry| entry.offset == b.offset && entry.range == b.range)
                        .map_or_else(|| "buffer".to_string(), |entry| entry.name.clone());
                    labels.push(crate::inspector::BarrierLabel {
                        resource_name: name,
                        subresource: format!("offset={} range={}", b.offset, b.range),
                        before: format!("{:?}", b.previous_usage),
                        after: format!("{:?}", b.next_usage),
                    });
                }
                for b in acc {
                    labels.push(crate::inspector::BarrierLabel {
                        resource_name: "acceleration_structure".to_string(),
                        subresource: String::new(),
                        before: format!("{:?}", b.previous_usage),
                        after: format!("{:?}", b.next_usage),
                    });
                }
                labels
            })
            .collect();

        crate::inspector::render_dot(&passes, &frame.batches, &barriers)
    }
}

struct ResolvedTargets<D: GraphDevice> {
    resolved_textures: Vec<Option<D::Texture>>,
    rt_dims: Vec<(u32, u32, bool)>,
    texture_initial_usage: Vec<TextureUsage>,
    transient_acquired: Vec<(u64, D::Texture)>,
    /// `(texture_uuid, render_target_index)` for every imported target.
    imported_uuids: Vec<(u64, u32)>,
}

/// The usage a graphics-pass attachment sees within its own batch (spec
/// §4.5): the union of every texture dependency, from any pass in `batch`,
/// that names `rt` with a sub-resource overlapping `subresource`. Deliberately
/// scoped to the one batch rather than `usage_derived_by_deps` (the frame-wide
/// union used to size a transient's creation flags), since a render target
/// reused with a different usage in a later batch must not leak into an
/// earlier batch's attachment description.
fn batch_scoped_usage<D: GraphDevice>(builder: &RenderGraphBuilder<D>, batch: &[usize], rt: RenderTargetHandle, subresource: crate::subresource::SubResource) -> TextureUsage {
    let mut usage = TextureUsage::empty();
    for &pass in batch {
        for dep in &builder.passes[pass].texture_deps {
            if dep.rt == rt && dep.subresource.overlaps_with(subresource) {
                usage |= dep.usage;
            }
        }
    }
    usage
}

/// An imported render target's usage after every batch has run: the union of
/// every surface's last recorded usage, falling back to its initial usage if
/// no pass touched it at all this frame.
fn final_usage_for(texture_current_usage: &FxHashMap<u32, FxHashMap<SurfaceKey, TextureUsage>>, rt_idx: u32, initial: TextureUsage) -> TextureUsage {
    texture_current_usage
        .get(&rt_idx)
        .map(|surfaces| surfaces.values().copied().fold(TextureUsage::empty(), |acc, u| acc | u))
        .filter(|u| !u.is_empty())
        .unwrap_or(initial)
}
