//! Command Buffer Recorder: partitions a compiled frame's batches into
//! worker-thread groups, records each group's command buffer in parallel,
//! and submits them in an order that keeps the swapchain-acquire wait and
//! present signal on the right submission.
//!
//! Mirrors `RenderGraph::recordAndSubmitCommandBuffers`: batches are split
//! into `G = min(workerThreadCount, batchCount)` contiguous groups, each
//! recorded on its own worker into its own command buffer, and an atomic
//! "first group that wrote to the swapchain" min-reducer decides whether one
//! submission suffices or the groups must be submitted in two halves so the
//! acquire-wait lands on the half that actually touches the swapchain. If
//! statistics gathering is enabled, group 0 writes a pre-frame timestamp
//! before its first barrier and the last group writes a post-frame
//! timestamp after its last pass.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::builder::{RenderGraphBuilder, RenderPassWorkContext};
use crate::device::{AccelerationStructureBarrierInfo, BufferBarrierInfo, GraphDevice, JobManager, RenderPassInfo, TextureBarrierInfo};
use crate::errors::Result;
use crate::registry::{AsEntry, BufferEntry, RtEntry};

const NO_GROUP: u32 = u32::MAX;

/// A contiguous run of batch indices assigned to one worker.
struct Group {
    batch_range: std::ops::Range<usize>,
}

/// Splits `batch_count` batches into `min(worker_count, batch_count)`
/// contiguous, near-equal-sized groups. Mirrors the source's
/// `splitThreadedProblem`.
fn split_threaded_problem(batch_count: usize, worker_count: usize) -> Vec<Group> {
    if batch_count == 0 {
        return Vec::new();
    }
    let group_count = worker_count.clamp(1, batch_count);
    let base = batch_count / group_count;
    let remainder = batch_count % group_count;

    let mut groups = Vec::with_capacity(group_count);
    let mut start = 0;
    for g in 0..group_count {
        let size = base + usize::from(g < remainder);
        groups.push(Group { batch_range: start..start + size });
        start += size;
    }
    groups
}

type WorkFn<D> = Box<dyn FnOnce(&mut RenderPassWorkContext<'_, D>) + Send>;

/// What one worker's `record_group` produced: its finished command buffer,
/// whether it wrote the swapchain, and its half of the statistics
/// timestamps, if any.
struct GroupOutcome<D: GraphDevice> {
    cmdb: D::CommandBuffer,
    wrote_swapchain: bool,
    pre_timestamp: Option<D::TimestampQuery>,
    post_timestamp: Option<D::TimestampQuery>,
}

/// Timestamp queries recorded this frame, for `RenderGraph::record_and_submit`
/// to read back into `RenderGraphStatistics::gpu_time`.
pub(crate) struct RecordOutcome<D: GraphDevice> {
    pub pre_timestamp: Option<D::TimestampQuery>,
    pub post_timestamp: Option<D::TimestampQuery>,
}

/// Records and submits every batch of a compiled frame.
///
/// `batches` are lists of pass indices (already barrier-scheduled and
/// reordered); `batch_*_barriers[b]` is the merged barrier set batch `b`
/// needs; `renderpass_infos[pass]` is the precomputed attachment info for
/// every graphics pass, indexed by global pass index; `resolved_textures`
/// is the concrete device texture backing each render target for this frame.
#[allow(clippy::too_many_arguments)]
pub(crate) fn record_and_submit<D, J>(
    device: &D,
    jobs: &J,
    builder: &mut RenderGraphBuilder<D>,
    batches: &[Vec<usize>],
    batch_texture_barriers: &[Vec<TextureBarrierInfo<D::Texture>>],
    batch_buffer_barriers: &[Vec<BufferBarrierInfo<D::Buffer>>],
    batch_as_barriers: &[Vec<AccelerationStructureBarrierInfo<D::AccelerationStructure>>],
    renderpass_infos: &[Option<RenderPassInfo<D::Texture>>],
    resolved_textures: &[Option<D::Texture>],
    worker_count_override: Option<u32>,
    gather_statistics: bool,
    frame_fence: Option<&D::Fence>,
) -> Result<RecordOutcome<D>>
where
    D: GraphDevice + Sync,
    D::CommandBuffer: Send,
    J: JobManager,
{
    let worker_count = worker_count_override.unwrap_or_else(|| jobs.thread_count()).max(1) as usize;
    let groups = split_threaded_problem(batches.len(), worker_count);
    let group_count = groups.len() as u32;

    let swapchain_writers: Vec<bool> = builder.passes.iter().map(|p| p.writes_to_swapchain).collect();

    // Work closures can only be taken once. Index them by global pass index
    // first, then hand each group only the entries for the passes its own
    // batches actually contain, keyed by that same pass index — batching and
    // the §4.7 intra-batch reorder both change a pass's position relative to
    // its declaration order, so a sequential drain in either order would
    // assign closures to the wrong pass.
    let mut work_by_pass: Vec<Option<WorkFn<D>>> = builder.passes.iter_mut().map(|p| p.work.take()).collect();
    let mut group_work: Vec<FxHashMap<usize, WorkFn<D>>> = Vec::with_capacity(groups.len());
    for group in &groups {
        let mut work_for_group = FxHashMap::default();
        for &pass in batches[group.batch_range.clone()].iter().flatten() {
            if let Some(work_fn) = work_by_pass[pass].take() {
                work_for_group.insert(pass, work_fn);
            }
        }
        group_work.push(work_for_group);
    }

    let render_targets = &builder.render_targets;
    let buffers = &builder.buffers;
    let as_entries = &builder.as_entries;
    let swapchain_writers = &swapchain_writers;

    let first_swapchain_group = AtomicU32::new(NO_GROUP);
    let results: Mutex<Vec<Option<GroupOutcome<D>>>> = Mutex::new((0..groups.len()).map(|_| None).collect());
    let results = &results;
    let first_swapchain_group = &first_swapchain_group;

    let tasks: Vec<Box<dyn FnOnce() + Send + '_>> = groups
        .iter()
        .enumerate()
        .zip(group_work)
        .map(|((group_idx, group), work)| -> Box<dyn FnOnce() + Send + '_> {
            let batches_slice = &batches[group.batch_range.clone()];
            let texture_barriers_slice = &batch_texture_barriers[group.batch_range.clone()];
            let buffer_barriers_slice = &batch_buffer_barriers[group.batch_range.clone()];
            let as_barriers_slice = &batch_as_barriers[group.batch_range.clone()];
            let group_idx = group_idx as u32;

            Box::new(move || {
                let recorded = record_group(
                    device,
                    group_idx,
                    group_count,
                    gather_statistics,
                    batches_slice,
                    texture_barriers_slice,
                    buffer_barriers_slice,
                    as_barriers_slice,
                    renderpass_infos,
                    work,
                    swapchain_writers,
                    render_targets,
                    buffers,
                    as_entries,
                    resolved_textures,
                    first_swapchain_group,
                    group.batch_range.clone(),
                );
                results.lock()[group_idx as usize] = Some(recorded);
            })
        })
        .collect();

    jobs.dispatch_tasks(tasks);

    let recorded: Vec<GroupOutcome<D>> = results.into_inner().into_iter().map(|g| g.expect("every group must have recorded")).collect();

    let mut pre_timestamp = None;
    let mut post_timestamp = None;
    let mut cmdbs = Vec::with_capacity(recorded.len());
    for g in recorded {
        if g.pre_timestamp.is_some() {
            pre_timestamp = g.pre_timestamp;
        }
        if g.post_timestamp.is_some() {
            post_timestamp = g.post_timestamp;
        }
        cmdbs.push((g.cmdb, g.wrote_swapchain));
    }

    submit_recorded_groups(device, cmdbs, first_swapchain_group.load(Ordering::Acquire), frame_fence)?;

    Ok(RecordOutcome { pre_timestamp, post_timestamp })
}

#[allow(clippy::too_many_arguments)]
fn record_group<D: GraphDevice>(
    device: &D,
    group_idx: u32,
    group_count: u32,
    gather_statistics: bool,
    batches: &[Vec<usize>],
    texture_barriers: &[Vec<TextureBarrierInfo<D::Texture>>],
    buffer_barriers: &[Vec<BufferBarrierInfo<D::Buffer>>],
    as_barriers: &[Vec<AccelerationStructureBarrierInfo<D::AccelerationStructure>>],
    renderpass_infos: &[Option<RenderPassInfo<D::Texture>>],
    mut work: FxHashMap<usize, WorkFn<D>>,
    swapchain_writers: &[bool],
    render_targets: &[RtEntry<D>],
    buffers: &[BufferEntry<D>],
    as_entries: &[AsEntry<D>],
    resolved_textures: &[Option<D::Texture>],
    first_swapchain_group: &AtomicU32,
    batch_range: std::ops::Range<usize>,
) -> GroupOutcome<D> {
    let mut cmdb = device.new_command_buffer(&format!("rdg-group-{group_idx}")).expect("command buffer allocation");

    let includes_swapchain_write = batches.iter().flatten().any(|&pass| swapchain_writers[pass]);
    log::debug!(
        "recording group {group_idx}: batches [{}, {}), writes swapchain: {includes_swapchain_write}",
        batch_range.start, batch_range.end
    );

    let pre_timestamp = if gather_statistics && group_idx == 0 {
        let query = device.new_timestamp_query().expect("timestamp query allocation");
        device.write_timestamp(&mut cmdb, &query);
        Some(query)
    } else {
        None
    };

    let mut wrote_swapchain = false;

    for (local_batch_idx, batch) in batches.iter().enumerate() {
        let tex = &texture_barriers[local_batch_idx];
        let buf = &buffer_barriers[local_batch_idx];
        let acc = &as_barriers[local_batch_idx];
        if !tex.is_empty() || !buf.is_empty() || !acc.is_empty() {
            device.set_pipeline_barrier(&mut cmdb, tex, buf, acc);
        }

        for &pass in batch {
            device.push_debug_marker(&mut cmdb, "pass", [0.5, 0.5, 0.5]);

            let renderpass_info = renderpass_infos[pass].as_ref();
            if let Some(info) = renderpass_info {
                device.begin_render_pass(&mut cmdb, info);
            }

            if let Some(work_fn) = work.remove(&pass) {
                let mut ctx = RenderPassWorkContext { cmdb: &mut cmdb, render_targets, buffers, as_entries, resolved_textures };
                work_fn(&mut ctx);
            }

            if renderpass_info.is_some() {
                device.end_render_pass(&mut cmdb);
            }

            device.pop_debug_marker(&mut cmdb);

            if swapchain_writers[pass] {
                wrote_swapchain = true;
                first_swapchain_group.fetch_min(group_idx, Ordering::AcqRel);
            }
        }
    }

    let post_timestamp = if gather_statistics && group_idx + 1 == group_count {
        let query = device.new_timestamp_query().expect("timestamp query allocation");
        device.write_timestamp(&mut cmdb, &query);
        Some(query)
    } else {
        None
    };

    let cmdb = device.end_recording(cmdb).expect("end recording");
    GroupOutcome { cmdb, wrote_swapchain, pre_timestamp, post_timestamp }
}

/// Chooses a single- or two-submission split so the acquire-wait semaphore
/// is only attached to the submission containing the swapchain-writing
/// group, and the present-signal is attached to the final submission.
/// `frame_fence`, if given, is attached to whichever submission is last.
///
/// Mirrors the source's closing logic: if no group wrote the swapchain, or
/// the very first group did, a single submission covers everything; if a
/// later group wrote it, everything before that group submits first (no
/// acquire wait needed, since nothing before the swapchain write touches
/// it), then the swapchain-writing group onward submits with the acquire
/// wait.
fn submit_recorded_groups<D: GraphDevice>(
    device: &D,
    recorded: Vec<(D::CommandBuffer, bool)>,
    first_swapchain_group: u32,
    frame_fence: Option<&D::Fence>,
) -> Result<()> {
    if recorded.is_empty() {
        return Ok(());
    }

    let group_count = recorded.len();
    let mut buffers: Vec<D::CommandBuffer> = recorded.into_iter().map(|(cmdb, _)| cmdb).collect();

    if first_swapchain_group == NO_GROUP || first_swapchain_group == 0 {
        device.submit(buffers, first_swapchain_group == 0, true, frame_fence, true)?;
        return Ok(());
    }

    let split = first_swapchain_group as usize;
    let second_half = buffers.split_off(split);
    device.submit(buffers, false, false, None, false)?;
    let is_last = split + second_half.len() == group_count;
    device.submit(second_half, true, true, frame_fence, is_last)?;
    Ok(())
}
