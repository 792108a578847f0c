//! Resource Registry: interns render targets, buffer ranges and acceleration
//! structures for a single frame's builder, assigning stable handles and
//! accumulating per-resource dependency history.

use crate::builder::RenderGraphBuilder;
use crate::device::{GraphDevice, TextureDesc};
use crate::handle::{AccelerationStructureHandle, BufferHandle, PassIndex, RenderTargetHandle};
use crate::subresource::{DepthStencilAspect, SubResource};
use crate::usage::{AccelerationStructureUsage, BufferUsage, TextureUsage};

/// Either an externally-owned texture the graph borrows for the frame, or a
/// descriptor for a texture the transient pool will materialise once its
/// derived usage is known.
pub(crate) enum RtStorage<D: GraphDevice> {
    Imported {
        texture: D::Texture,
        last_known_usage: TextureUsage,
        /// Set by `import_render_target_undefined`: prior usage must be
        /// recovered from the cross-frame imported-texture table rather
        /// than taken from `last_known_usage`.
        undefined_usage: bool,
    },
    Transient {
        desc: TextureDesc<D::TextureBackendDesc>,
        /// Content hash of `desc`, unique within the frame.
        hash: u64,
    },
}

impl<D: GraphDevice> RtStorage<D> {
    /// The full depth-stencil aspect mask of the underlying texture, or
    /// empty if it is a colour texture. Imported textures ask the device;
    /// transients carry it on their own descriptor (spec §4.1: "record ...
    /// whether the texture is depth/stencil so that later dependency
    /// registration can fill in a missing aspect bit").
    pub(crate) fn depth_stencil_aspect(&self, device: &D) -> DepthStencilAspect {
        match self {
            RtStorage::Imported { texture, .. } => device.texture_depth_stencil_aspect(texture),
            RtStorage::Transient { desc, .. } => desc.depth_stencil_aspect,
        }
    }
}

pub(crate) struct RtEntry<D: GraphDevice> {
    pub name: String,
    pub storage: RtStorage<D>,
    /// Union of every usage declared by a dependency naming this resource.
    pub usage_derived_by_deps: TextureUsage,
    // Dependency history, structure-of-arrays, in pass-declaration order.
    pub dependent_passes: Vec<PassIndex>,
    pub dependency_usages: Vec<TextureUsage>,
    pub dependency_subresources: Vec<SubResource>,
}

pub(crate) struct BufferEntry<D: GraphDevice> {
    pub name: String,
    pub buffer: D::Buffer,
    pub offset: u64,
    pub range: u64,
    /// Usage the buffer was in when imported, before any pass in this frame
    /// touched it. The barrier scheduler's prior-usage seed for batch 0.
    pub initial_usage: BufferUsage,
    /// Union of every usage declared by a dependency naming this resource.
    pub usage: BufferUsage,
    pub dependent_passes: Vec<PassIndex>,
    pub dependency_usages: Vec<BufferUsage>,
}

pub(crate) struct AsEntry<D: GraphDevice> {
    pub name: String,
    pub acceleration_structure: D::AccelerationStructure,
    /// Usage the acceleration structure was in when imported, before any
    /// pass in this frame touched it.
    pub initial_usage: AccelerationStructureUsage,
    /// Union of every usage declared by a dependency naming this resource.
    pub usage: AccelerationStructureUsage,
    pub dependent_passes: Vec<PassIndex>,
    pub dependency_usages: Vec<AccelerationStructureUsage>,
}

fn ranges_overlap(a_offset: u64, a_range: u64, b_offset: u64, b_range: u64) -> bool {
    a_offset < b_offset + b_range && b_offset < a_offset + a_range
}

impl<D: GraphDevice> RenderGraphBuilder<D> {
    /// Registers an external texture currently in `current_usage` on the
    /// GPU.
    pub fn import_render_target(&mut self, name: impl Into<String>, texture: D::Texture, current_usage: TextureUsage) -> RenderTargetHandle {
        debug_assert!(
            !self.render_targets.iter().any(|rt| matches!(
                &rt.storage,
                RtStorage::Imported { texture: t, .. } if self.device.texture_uuid(t) == self.device.texture_uuid(&texture)
            )),
            "texture already imported this frame"
        );

        let idx = self.render_targets.len() as u32;
        self.render_targets.push(RtEntry {
            name: name.into(),
            storage: RtStorage::Imported { texture, last_known_usage: current_usage, undefined_usage: false },
            usage_derived_by_deps: TextureUsage::empty(),
            dependent_passes: Vec::new(),
            dependency_usages: Vec::new(),
            dependency_subresources: Vec::new(),
        });
        RenderTargetHandle::new(idx)
    }

    /// As [`Self::import_render_target`], but the texture's usage on entry
    /// is unknown and must be recovered from the cross-frame "imported
    /// texture last usage" table (see [`crate::graph::RenderGraph`]).
    pub fn import_render_target_undefined(&mut self, name: impl Into<String>, texture: D::Texture) -> RenderTargetHandle {
        let handle = self.import_render_target(name, texture, TextureUsage::empty());
        if let RtStorage::Imported { undefined_usage, .. } = &mut self.render_targets[handle.index() as usize].storage {
            *undefined_usage = true;
        }
        handle
    }

    /// Registers a transient render target. `content_hash` must be unique
    /// within the frame (builder contract, asserted in debug).
    pub fn new_render_target(
        &mut self,
        name: impl Into<String>,
        desc: TextureDesc<D::TextureBackendDesc>,
        content_hash: u64,
    ) -> RenderTargetHandle {
        debug_assert!(content_hash != 0, "forgot to hash the descriptor");
        debug_assert!(
            !self.render_targets.iter().any(|rt| matches!(&rt.storage, RtStorage::Transient { hash, .. } if *hash == content_hash)),
            "another transient descriptor with the same hash is already registered this frame; the pool's recycler would get confused"
        );

        let idx = self.render_targets.len() as u32;
        self.render_targets.push(RtEntry {
            name: name.into(),
            storage: RtStorage::Transient { desc, hash: content_hash },
            usage_derived_by_deps: TextureUsage::empty(),
            dependent_passes: Vec::new(),
            dependency_usages: Vec::new(),
            dependency_subresources: Vec::new(),
        });
        RenderTargetHandle::new(idx)
    }

    /// Registers an external buffer range currently in `current_usage`.
    /// Fails (debug-asserts) if the range overlaps a previously registered
    /// one.
    pub fn import_buffer(
        &mut self,
        name: impl Into<String>,
        buffer: D::Buffer,
        offset: u64,
        range: u64,
        current_usage: BufferUsage,
    ) -> BufferHandle {
        debug_assert!(
            !self
                .buffers
                .iter()
                .any(|b| self.device.buffer_uuid(&b.buffer) == self.device.buffer_uuid(&buffer) && ranges_overlap(b.offset, b.range, offset, range)),
            "buffer range already imported"
        );

        let idx = self.buffers.len() as u32;
        self.buffers.push(BufferEntry {
            name: name.into(),
            buffer,
            offset,
            range,
            initial_usage: current_usage,
            usage: BufferUsage::empty(),
            dependent_passes: Vec::new(),
            dependency_usages: Vec::new(),
        });
        BufferHandle::new(idx)
    }

    /// Registers an external acceleration structure.
    pub fn import_acceleration_structure(
        &mut self,
        name: impl Into<String>,
        acceleration_structure: D::AccelerationStructure,
        current_usage: AccelerationStructureUsage,
    ) -> AccelerationStructureHandle {
        let idx = self.as_entries.len() as u32;
        self.as_entries.push(AsEntry {
            name: name.into(),
            acceleration_structure,
            initial_usage: current_usage,
            usage: AccelerationStructureUsage::empty(),
            dependent_passes: Vec::new(),
            dependency_usages: Vec::new(),
        });
        AccelerationStructureHandle::new(idx)
    }
}
