//! Barrier Scheduler: computes the minimal set of merged state-transition
//! barriers a batch needs, given the usage each of its passes declared.
//!
//! Mirrors `RenderGraph::setTextureBarrier`/`setBatchBarriers`: rather than
//! emitting one barrier per `(pass, dependency)` pair, every pass in a batch
//! contributes its usage into a single running "current usage" per
//! sub-resource, and exactly one barrier is emitted per sub-resource per
//! batch, from whatever usage it held entering the batch to the union of
//! every usage declared on it within the batch.

use rustc_hash::FxHashMap;

use crate::device::{AccelerationStructureBarrierInfo, BufferBarrierInfo, TextureBarrierInfo};
use crate::subresource::SubResource;
use crate::usage::{AccelerationStructureUsage, BufferUsage, TextureUsage};

/// One (resource, subresource) key a texture barrier accumulates against.
/// Plain `(mip, face, layer, aspect-bits)`, hashable, not `SubResource`
/// itself since "all surfaces" must be expanded to concrete keys before
/// accumulation — two passes that both declare "all surfaces" usage must
/// merge into a single barrier per concrete surface, not one "all surfaces"
/// barrier, so that a third pass touching only one surface still sees the
/// right prior usage (spec testable property 6).
pub(crate) type TextureBarrierKey = (u32, u32, u32, u8);

fn key_for(sub: SubResource) -> TextureBarrierKey {
    (sub.mip, sub.face, sub.layer, sub.depth_stencil_aspect.bits())
}

/// Accumulates per-surface current/next usage across every pass of a batch
/// for one texture, then (on `finish`) emits the merged barriers actually
/// needed: a barrier is skipped when the prior and accumulated usage are
/// bit-for-bit identical and contain no write bit, mirroring the source's
/// `skipBarrier` test exactly (open question 1, resolved literally).
pub(crate) struct TextureBarrierAccumulator {
    // keyed by concrete surface index expansion
    next_usage: FxHashMap<TextureBarrierKey, TextureUsage>,
}

impl TextureBarrierAccumulator {
    pub(crate) fn new() -> Self {
        Self { next_usage: FxHashMap::default() }
    }

    pub(crate) fn accumulate(&mut self, mip_count: u32, layer_count: u32, is_cube: bool, subresource: SubResource, usage: TextureUsage) {
        crate::subresource::iterate_surfs_or_vols(mip_count, layer_count, is_cube, subresource, |_idx, surf| {
            let key = key_for(surf);
            *self.next_usage.entry(key).or_insert(TextureUsage::empty()) |= usage;
        });
    }

    /// Emits one [`TextureBarrierInfo`] per surface whose usage actually
    /// changes, looking up each surface's prior usage via `prior_usage_of`
    /// (keyed the same way: `(mip, face, layer, aspect_bits)`). Surfaces not
    /// touched this batch are left untouched: no entry, no barrier.
    pub(crate) fn finish<T: Clone>(self, texture: &T, prior_usage_of: impl Fn(TextureBarrierKey) -> TextureUsage) -> Vec<TextureBarrierInfo<T>> {
        let mut out = Vec::with_capacity(self.next_usage.len());
        for (key, next) in self.next_usage {
            let prior = prior_usage_of(key);
            let skip_barrier = prior == next && !next.is_write();
            if skip_barrier {
                continue;
            }
            log::trace!("texture barrier: surface (mip={}, face={}, layer={}) {:?} -> {:?}", key.0, key.1, key.2, prior, next);
            out.push(TextureBarrierInfo {
                texture: texture.clone(),
                subresource: SubResource::surface(key.0, key.1, key.2, crate::subresource::DepthStencilAspect::from_bits_retain(key.3)),
                previous_usage: prior,
                next_usage: next,
            });
        }
        out
    }
}

/// As [`TextureBarrierAccumulator`] but for a single buffer range (buffers
/// have no sub-resources, so there is exactly one accumulated usage).
pub(crate) struct BufferBarrierAccumulator {
    next_usage: BufferUsage,
    touched: bool,
}

impl BufferBarrierAccumulator {
    pub(crate) fn new() -> Self {
        Self { next_usage: BufferUsage::empty(), touched: false }
    }

    pub(crate) fn accumulate(&mut self, usage: BufferUsage) {
        self.next_usage |= usage;
        self.touched = true;
    }

    pub(crate) fn finish<B: Clone>(self, buffer: &B, offset: u64, range: u64, prior_usage: BufferUsage) -> Option<BufferBarrierInfo<B>> {
        if !self.touched {
            return None;
        }
        let skip_barrier = prior_usage == self.next_usage && !self.next_usage.is_write();
        if skip_barrier {
            return None;
        }
        log::trace!("buffer barrier: offset={} range={} {:?} -> {:?}", offset, range, prior_usage, self.next_usage);
        Some(BufferBarrierInfo { buffer: buffer.clone(), offset, range, previous_usage: prior_usage, next_usage: self.next_usage })
    }
}

/// As [`BufferBarrierAccumulator`] but for an acceleration structure.
pub(crate) struct AsBarrierAccumulator {
    next_usage: AccelerationStructureUsage,
    touched: bool,
}

impl AsBarrierAccumulator {
    pub(crate) fn new() -> Self {
        Self { next_usage: AccelerationStructureUsage::empty(), touched: false }
    }

    pub(crate) fn accumulate(&mut self, usage: AccelerationStructureUsage) {
        self.next_usage |= usage;
        self.touched = true;
    }

    pub(crate) fn finish<A: Clone>(self, acceleration_structure: &A, prior_usage: AccelerationStructureUsage) -> Option<AccelerationStructureBarrierInfo<A>> {
        if !self.touched {
            return None;
        }
        let skip_barrier = prior_usage == self.next_usage && !self.next_usage.is_write();
        if skip_barrier {
            return None;
        }
        log::trace!("acceleration structure barrier: {:?} -> {:?}", prior_usage, self.next_usage);
        Some(AccelerationStructureBarrierInfo { acceleration_structure: acceleration_structure.clone(), previous_usage: prior_usage, next_usage: self.next_usage })
    }
}
