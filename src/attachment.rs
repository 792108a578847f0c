//! Graphics-pass attachment resolution: turns a pass's
//! [`crate::builder::GraphicsRenderPassTargetDesc`] plus its resolved device
//! textures into a [`RenderPassInfo`] ready for `GraphDevice::begin_render_pass`.

use smallvec::SmallVec;

use crate::builder::{AttachmentDesc, GraphicsRenderPassTargetDesc};
use crate::device::{ColorAttachment, DepthStencilAttachment, RenderPassInfo, MAX_COLOR_RENDER_TARGETS};
use crate::handle::RenderTargetHandle;
use crate::subresource::SubResource;
use crate::usage::TextureUsage;

/// Resolves `desc` against a resolver that maps a render-target handle to
/// its concrete device texture, and a usage resolver that, given the handle
/// and the attachment's sub-resource, returns the usage that attachment sees
/// within the pass's batch.
///
/// Mirrors `RenderGraph::initGraphicsPasses`/`getCrntUsage`: the usage baked
/// into each attachment is the union of every dependency inside the pass's
/// own batch that names the same handle with an overlapping sub-resource
/// (spec §4.5), not a frame-wide derived usage, so a render target reused
/// with a different usage in a later batch doesn't leak into an earlier
/// batch's attachment description.
pub(crate) fn resolve_render_pass_info<T: Clone>(
    desc: &GraphicsRenderPassTargetDesc,
    texture_of: impl Fn(RenderTargetHandle) -> T,
    usage_of: impl Fn(RenderTargetHandle, SubResource) -> TextureUsage,
) -> RenderPassInfo<T> {
    let color_attachments: SmallVec<[ColorAttachment<T>; MAX_COLOR_RENDER_TARGETS]> =
        desc.color_attachments.iter().map(|a| build_attachment(a, &texture_of, &usage_of)).collect();

    let depth_stencil = desc.depth_stencil.as_ref().map(|a| {
        let common = build_attachment(a, &texture_of, &usage_of);
        DepthStencilAttachment {
            texture: common.texture,
            subresource: common.subresource,
            usage: common.usage,
            load_op: common.load_op,
            store_op: common.store_op,
            stencil_load_op: desc.stencil_load_op.unwrap_or(a.load_op),
            stencil_store_op: desc.stencil_store_op.unwrap_or(a.store_op),
            clear_value: common.clear_value,
        }
    });

    RenderPassInfo { color_attachments, depth_stencil, shading_rate: None }
}

fn build_attachment<T: Clone>(
    a: &AttachmentDesc,
    texture_of: &impl Fn(RenderTargetHandle) -> T,
    usage_of: &impl Fn(RenderTargetHandle, SubResource) -> TextureUsage,
) -> ColorAttachment<T> {
    ColorAttachment {
        texture: texture_of(a.rt),
        subresource: a.subresource,
        usage: usage_of(a.rt, a.subresource),
        load_op: a.load_op,
        store_op: a.store_op,
        clear_value: a.clear_value,
    }
}
