//! The frame-local builder: passes declare their render-target/buffer/AS
//! dependencies here before [`crate::graph::RenderGraph::compile`] analyses
//! and batches them.

use smallvec::SmallVec;

use crate::device::{GraphDevice, RenderPassInfo, MAX_COLOR_RENDER_TARGETS};
use crate::handle::{AccelerationStructureHandle, BufferHandle, PassIndex, RenderTargetHandle};
use crate::registry::{AsEntry, BufferEntry, RtEntry};
use crate::subresource::SubResource;
use crate::usage::{AccelerationStructureUsage, BufferUsage, TextureUsage};

/// What kind of queue a pass's work targets. Drives the reorder strategy and
/// the barrier scheduler's pipeline-stage choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Graphics,
    Compute,
    Transfer,
}

pub(crate) struct TextureDependency {
    pub rt: RenderTargetHandle,
    pub usage: TextureUsage,
    pub subresource: SubResource,
}

pub(crate) struct BufferDependency {
    pub buffer: BufferHandle,
    pub usage: BufferUsage,
}

pub(crate) struct AsDependency {
    pub acceleration_structure: AccelerationStructureHandle,
    pub usage: AccelerationStructureUsage,
}

/// Per-attachment description supplied to [`PassBuilder::set_renderpass_info`].
/// The render target must already have been named in a prior
/// `new_texture_dependency` call with a colour/depth-stencil write usage;
/// this only carries the load/store/clear policy.
#[derive(Debug, Clone)]
pub struct AttachmentDesc {
    pub rt: RenderTargetHandle,
    pub subresource: SubResource,
    pub load_op: crate::device::LoadOp,
    pub store_op: crate::device::StoreOp,
    pub clear_value: crate::device::ClearValue,
}

/// Declares which render targets a graphics pass reads/writes as attachments,
/// and their load/store policy, distinct from the RAW/WAR/WAW usage already
/// declared via `new_texture_dependency`.
#[derive(Debug, Clone, Default)]
pub struct GraphicsRenderPassTargetDesc {
    pub color_attachments: SmallVec<[AttachmentDesc; MAX_COLOR_RENDER_TARGETS]>,
    pub depth_stencil: Option<AttachmentDesc>,
    pub stencil_load_op: Option<crate::device::LoadOp>,
    pub stencil_store_op: Option<crate::device::StoreOp>,
}

pub(crate) struct PassRecord<D: GraphDevice> {
    pub name: String,
    pub kind: PassKind,
    pub texture_deps: Vec<TextureDependency>,
    pub buffer_deps: Vec<BufferDependency>,
    pub as_deps: Vec<AsDependency>,
    pub graphics_target_desc: Option<GraphicsRenderPassTargetDesc>,
    pub writes_to_swapchain: bool,
    #[allow(clippy::type_complexity)]
    pub work: Option<Box<dyn FnOnce(&mut RenderPassWorkContext<'_, D>) + Send>>,
}

/// Passed to a pass's work closure at recording time: the already-begun (for
/// graphics passes) command buffer and a lookup from this frame's handles
/// back to concrete device resources.
pub struct RenderPassWorkContext<'a, D: GraphDevice> {
    pub cmdb: &'a mut D::CommandBuffer,
    pub(crate) render_targets: &'a [RtEntry<D>],
    pub(crate) buffers: &'a [BufferEntry<D>],
    pub(crate) as_entries: &'a [AsEntry<D>],
    pub(crate) resolved_textures: &'a [Option<D::Texture>],
}

impl<'a, D: GraphDevice> RenderPassWorkContext<'a, D> {
    /// Resolves a render-target handle declared as a dependency of the
    /// current pass to its concrete device texture (imported or pooled).
    #[must_use]
    pub fn texture(&self, rt: RenderTargetHandle) -> &D::Texture {
        self.resolved_textures[rt.index() as usize]
            .as_ref()
            .expect("render target not resolved for this pass; was it declared as a dependency?")
    }

    #[must_use]
    pub fn buffer(&self, handle: BufferHandle) -> &D::Buffer {
        &self.buffers[handle.index() as usize].buffer
    }

    #[must_use]
    pub fn acceleration_structure(&self, handle: AccelerationStructureHandle) -> &D::AccelerationStructure {
        &self.as_entries[handle.index() as usize].acceleration_structure
    }
}

/// Accumulates every pass and resource declared for one frame.
///
/// Created fresh each frame by [`crate::graph::RenderGraph::new_frame`] and
/// consumed by `compile`.
pub struct RenderGraphBuilder<D: GraphDevice> {
    pub(crate) device: D,
    pub(crate) render_targets: Vec<RtEntry<D>>,
    pub(crate) buffers: Vec<BufferEntry<D>>,
    pub(crate) as_entries: Vec<AsEntry<D>>,
    pub(crate) passes: Vec<PassRecord<D>>,
    pub(crate) gather_statistics: bool,
}

impl<D: GraphDevice> RenderGraphBuilder<D> {
    pub(crate) fn new(device: D) -> Self {
        Self {
            device,
            render_targets: Vec::new(),
            buffers: Vec::new(),
            as_entries: Vec::new(),
            passes: Vec::new(),
            gather_statistics: false,
        }
    }

    /// Enables per-pass CPU/GPU timing (spec §7 statistics). Adds a
    /// timestamp-query pair around every pass; costs a little recording
    /// overhead, so it's opt-in per frame.
    pub fn gather_statistics(&mut self, enabled: bool) -> &mut Self {
        self.gather_statistics = enabled;
        self
    }

    /// Registers a new pass and returns a builder for its dependencies and
    /// work closure. Passes are batched in an order consistent with
    /// declaration order but not necessarily equal to it (spec testable
    /// property 1/2).
    pub fn new_pass(&mut self, name: impl Into<String>, kind: PassKind) -> PassBuilder<'_, D> {
        let index = PassIndex(self.passes.len() as u32);
        self.passes.push(PassRecord {
            name: name.into(),
            kind,
            texture_deps: Vec::new(),
            buffer_deps: Vec::new(),
            as_deps: Vec::new(),
            graphics_target_desc: None,
            writes_to_swapchain: false,
            work: None,
        });
        PassBuilder { builder: self, index }
    }

    pub(crate) fn pass_count(&self) -> usize {
        self.passes.len()
    }
}

/// Fluent handle returned by [`RenderGraphBuilder::new_pass`].
pub struct PassBuilder<'b, D: GraphDevice> {
    builder: &'b mut RenderGraphBuilder<D>,
    index: PassIndex,
}

impl<'b, D: GraphDevice> PassBuilder<'b, D> {
    #[must_use]
    pub fn index(&self) -> PassIndex {
        self.index
    }

    fn record_mut(&mut self) -> &mut PassRecord<D> {
        &mut self.builder.passes[self.index.as_usize()]
    }

    /// Declares that this pass accesses `rt`'s `subresource` with `usage`.
    /// Feeds both the dependency analyser's RAW/WAR/WAW scan and the derived
    /// usage the transient pool creates the texture with.
    ///
    /// If `subresource` omits a depth-stencil aspect and `rt` names a
    /// depth/stencil resource, the full aspect mask is auto-filled (spec
    /// §4.2). Conversely, naming an aspect on a resource that is not
    /// depth/stencil is a builder contract violation (spec §4.11, §7).
    pub fn new_texture_dependency(&mut self, rt: RenderTargetHandle, usage: TextureUsage, mut subresource: SubResource) -> &mut Self {
        let idx = self.index;
        let full_aspect = self.builder.render_targets[rt.index() as usize].storage.depth_stencil_aspect(&self.builder.device);
        if subresource.depth_stencil_aspect.is_empty() {
            subresource.depth_stencil_aspect = full_aspect;
        } else {
            debug_assert!(
                !full_aspect.is_empty(),
                "depth-stencil aspect named on a render target that is not a depth/stencil resource"
            );
        }

        let entry = &mut self.builder.render_targets[rt.index() as usize];
        entry.usage_derived_by_deps |= usage;
        entry.dependent_passes.push(idx);
        entry.dependency_usages.push(usage);
        entry.dependency_subresources.push(subresource);

        self.record_mut().texture_deps.push(TextureDependency { rt, usage, subresource });
        self
    }

    /// Declares that this pass accesses `buffer` with `usage`.
    pub fn new_buffer_dependency(&mut self, buffer: BufferHandle, usage: BufferUsage) -> &mut Self {
        let idx = self.index;
        let entry = &mut self.builder.buffers[buffer.index() as usize];
        entry.usage |= usage;
        entry.dependent_passes.push(idx);
        entry.dependency_usages.push(usage);

        self.record_mut().buffer_deps.push(BufferDependency { buffer, usage });
        self
    }

    /// Declares that this pass accesses `acceleration_structure` with `usage`.
    pub fn new_acceleration_structure_dependency(
        &mut self,
        acceleration_structure: AccelerationStructureHandle,
        usage: AccelerationStructureUsage,
    ) -> &mut Self {
        let idx = self.index;
        let entry = &mut self.builder.as_entries[acceleration_structure.index() as usize];
        entry.usage |= usage;
        entry.dependent_passes.push(idx);
        entry.dependency_usages.push(usage);

        self.record_mut().as_deps.push(AsDependency { acceleration_structure, usage });
        self
    }

    /// Supplies the attachment load/store policy for a [`PassKind::Graphics`]
    /// pass. Every render target named here must already have an associated
    /// `new_texture_dependency` call with a colour or depth/stencil write
    /// usage.
    pub fn set_renderpass_info(&mut self, desc: GraphicsRenderPassTargetDesc) -> &mut Self {
        debug_assert_eq!(self.record_mut().kind, PassKind::Graphics, "only graphics passes have renderpass info");
        self.record_mut().graphics_target_desc = Some(desc);
        self
    }

    /// Marks this pass as writing the swapchain image, which the recorder
    /// uses to place the acquire/present semaphores and split submissions
    /// (spec §6).
    pub fn writes_to_swapchain(&mut self, writes: bool) -> &mut Self {
        self.record_mut().writes_to_swapchain = writes;
        self
    }

    /// Supplies the work closure executed during recording, once the pass's
    /// renderpass (if any) has been begun and its barriers have been
    /// emitted.
    pub fn set_work<F>(&mut self, work: F) -> &mut Self
    where
        F: FnOnce(&mut RenderPassWorkContext<'_, D>) + Send + 'static,
    {
        self.record_mut().work = Some(Box::new(work));
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::device::TextureDesc;
    use crate::subresource::{DepthStencilAspect, SubResource};
    use crate::testing::{MockDevice, MockFormat};
    use crate::usage::TextureUsage;

    use super::{PassKind, RenderGraphBuilder};

    fn desc(aspect: DepthStencilAspect) -> TextureDesc<MockFormat> {
        TextureDesc {
            width: 64,
            height: 64,
            depth_or_layer_count: 1,
            mip_level_count: 1,
            is_cube: false,
            depth_stencil_aspect: aspect,
            label: "ds",
            backend_desc: MockFormat { bytes_per_texel: 4 },
        }
    }

    #[test]
    fn omitted_aspect_is_auto_filled_for_depth_stencil_resource() {
        let mut builder = RenderGraphBuilder::new(MockDevice::new());
        let ds = builder.new_render_target("depth", desc(DepthStencilAspect::DEPTH | DepthStencilAspect::STENCIL), 1);
        builder.new_pass("prepass", PassKind::Graphics).new_texture_dependency(ds, TextureUsage::FRAMEBUFFER_WRITE, SubResource::all());

        let stored = &builder.render_targets[ds.index() as usize].dependency_subresources[0];
        assert_eq!(stored.depth_stencil_aspect, DepthStencilAspect::DEPTH | DepthStencilAspect::STENCIL);
    }

    #[test]
    fn explicit_aspect_on_depth_stencil_resource_is_kept_as_declared() {
        let mut builder = RenderGraphBuilder::new(MockDevice::new());
        let ds = builder.new_render_target("depth", desc(DepthStencilAspect::DEPTH | DepthStencilAspect::STENCIL), 1);
        builder.new_pass("prepass", PassKind::Graphics).new_texture_dependency(
            ds,
            TextureUsage::FRAMEBUFFER_WRITE,
            SubResource::surface(0, 0, 0, DepthStencilAspect::DEPTH),
        );

        let stored = &builder.render_targets[ds.index() as usize].dependency_subresources[0];
        assert_eq!(stored.depth_stencil_aspect, DepthStencilAspect::DEPTH);
    }

    #[test]
    #[should_panic(expected = "not a depth/stencil resource")]
    fn naming_an_aspect_on_a_colour_resource_is_a_contract_violation() {
        let mut builder = RenderGraphBuilder::new(MockDevice::new());
        let color = builder.new_render_target("color", desc(DepthStencilAspect::empty()), 1);
        builder.new_pass("pass", PassKind::Graphics).new_texture_dependency(
            color,
            TextureUsage::FRAMEBUFFER_WRITE,
            SubResource::surface(0, 0, 0, DepthStencilAspect::DEPTH),
        );
    }
}
