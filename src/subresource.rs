//! Texture sub-resource naming and overlap testing.

use bitflags::bitflags;

bitflags! {
    /// Which aspect(s) of a depth/stencil texture a dependency touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DepthStencilAspect: u8 {
        const DEPTH   = 1 << 0;
        const STENCIL = 1 << 1;
    }
}

/// Names a region of a texture: either every surface/volume, or one specific
/// `(mip, face, layer)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubResource {
    pub all_surfaces_or_volumes: bool,
    pub mip: u32,
    pub face: u32,
    pub layer: u32,
    pub depth_stencil_aspect: DepthStencilAspect,
}

impl SubResource {
    /// A dependency spanning every surface/volume of the texture.
    #[must_use]
    pub fn all() -> Self {
        Self {
            all_surfaces_or_volumes: true,
            mip: 0,
            face: 0,
            layer: 0,
            depth_stencil_aspect: DepthStencilAspect::empty(),
        }
    }

    /// A dependency naming one specific surface/volume.
    #[must_use]
    pub fn surface(mip: u32, face: u32, layer: u32, aspect: DepthStencilAspect) -> Self {
        Self {
            all_surfaces_or_volumes: false,
            mip,
            face,
            layer,
            depth_stencil_aspect: aspect,
        }
    }

    /// Two sub-resources overlap if either spans "all", or they name the
    /// same `(mip, face, layer)` triple. Depth-stencil aspect only
    /// participates insofar as the surface identity above already captures
    /// it (a depth-only dependency and a stencil-only dependency on the
    /// *same* surface still overlap, since the underlying transition is
    /// per-surface, not per-aspect).
    #[must_use]
    pub fn overlaps_with(self, other: Self) -> bool {
        if self.all_surfaces_or_volumes || other.all_surfaces_or_volumes {
            return true;
        }
        self.mip == other.mip && self.face == other.face && self.layer == other.layer
    }

    /// Linear index of this surface/volume within a texture that has
    /// `layer_count` array layers and `face_count` faces per layer (6 for
    /// cube, 1 otherwise). Only meaningful for a non-"all" sub-resource.
    #[must_use]
    pub fn surf_or_vol_index(self, layer_count: u32, face_count: u32) -> usize {
        ((face_count * layer_count) * self.mip + face_count * self.layer + self.face) as usize
    }
}

/// Total surface/volume count for a texture shaped `mips × layers ×
/// (6 if cube else 1)`.
#[must_use]
pub fn surf_or_vol_count(mip_count: u32, layer_count: u32, is_cube: bool) -> usize {
    (mip_count * layer_count * if is_cube { 6 } else { 1 }) as usize
}

/// Calls `func` once per surface/volume named by `subresource`, in
/// `(mip, face, layer)` enumeration order. Mirrors the "all surfaces"
/// expansion used by both the dependency analyser and the barrier
/// scheduler so that an "all" dependency produces exactly the barriers that
/// enumerating every concrete surface would (spec testable property 6).
pub fn iterate_surfs_or_vols<F: FnMut(usize, SubResource)>(
    mip_count: u32,
    layer_count: u32,
    is_cube: bool,
    subresource: SubResource,
    mut func: F,
) {
    let face_count = if is_cube { 6 } else { 1 };

    if subresource.all_surfaces_or_volumes {
        for mip in 0..mip_count {
            for layer in 0..layer_count {
                for face in 0..face_count {
                    let idx = ((face_count * layer_count) * mip + face_count * layer + face) as usize;
                    func(idx, SubResource::surface(mip, face, layer, subresource.depth_stencil_aspect));
                }
            }
        }
    } else {
        let idx = subresource.surf_or_vol_index(layer_count, face_count);
        func(idx, subresource);
    }
}
