//! Usage bitmask taxonomy for textures, buffers and acceleration structures.
//!
//! The core only ever needs two operations on these masks: read/write
//! classification (via the `*_READ`/`*_WRITE` group masks below) and
//! set-union, so each usage type is a thin [`bitflags`] newtype rather than a
//! hand-rolled bit-twiddling enum.

use bitflags::bitflags;

bitflags! {
    /// How a pass uses a texture (or one of its sub-resources) at a given
    /// point in the frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureUsage: u32 {
        const SAMPLED_GEOMETRY      = 1 << 0;
        const SAMPLED_FRAGMENT      = 1 << 1;
        const SAMPLED_COMPUTE       = 1 << 2;
        const SAMPLED_TRACE_RAYS    = 1 << 3;
        const UAV_GEOMETRY_READ     = 1 << 4;
        const UAV_GEOMETRY_WRITE    = 1 << 5;
        const UAV_FRAGMENT_READ     = 1 << 6;
        const UAV_FRAGMENT_WRITE    = 1 << 7;
        const UAV_COMPUTE_READ      = 1 << 8;
        const UAV_COMPUTE_WRITE     = 1 << 9;
        const UAV_TRACE_RAYS_READ   = 1 << 10;
        const UAV_TRACE_RAYS_WRITE  = 1 << 11;
        const FRAMEBUFFER_READ      = 1 << 12;
        const FRAMEBUFFER_WRITE     = 1 << 13;
        const TRANSFER_DESTINATION  = 1 << 14;
        const GENERATE_MIPMAPS      = 1 << 15;
        const PRESENT               = 1 << 16;
        const FRAMEBUFFER_SHADING_RATE = 1 << 17;

        const ALL_READ = Self::SAMPLED_GEOMETRY.bits()
            | Self::SAMPLED_FRAGMENT.bits()
            | Self::SAMPLED_COMPUTE.bits()
            | Self::SAMPLED_TRACE_RAYS.bits()
            | Self::UAV_GEOMETRY_READ.bits()
            | Self::UAV_FRAGMENT_READ.bits()
            | Self::UAV_COMPUTE_READ.bits()
            | Self::UAV_TRACE_RAYS_READ.bits()
            | Self::FRAMEBUFFER_READ.bits()
            | Self::FRAMEBUFFER_SHADING_RATE.bits();

        const ALL_WRITE = Self::UAV_GEOMETRY_WRITE.bits()
            | Self::UAV_FRAGMENT_WRITE.bits()
            | Self::UAV_COMPUTE_WRITE.bits()
            | Self::UAV_TRACE_RAYS_WRITE.bits()
            | Self::FRAMEBUFFER_WRITE.bits()
            | Self::TRANSFER_DESTINATION.bits()
            | Self::GENERATE_MIPMAPS.bits()
            | Self::PRESENT.bits();
    }

    /// How a pass uses a buffer range.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        const CONSTANT_GEOMETRY        = 1 << 0;
        const CONSTANT_PIXEL           = 1 << 1;
        const CONSTANT_COMPUTE         = 1 << 2;
        const CONSTANT_DISPATCH_RAYS   = 1 << 3;
        const STORAGE_GEOMETRY_READ    = 1 << 4;
        const STORAGE_GEOMETRY_WRITE   = 1 << 5;
        const STORAGE_FRAGMENT_READ    = 1 << 6;
        const STORAGE_FRAGMENT_WRITE   = 1 << 7;
        const STORAGE_COMPUTE_READ     = 1 << 8;
        const STORAGE_COMPUTE_WRITE    = 1 << 9;
        const STORAGE_TRACE_RAYS_READ  = 1 << 10;
        const STORAGE_TRACE_RAYS_WRITE = 1 << 11;
        const INDEX                    = 1 << 12;
        const VERTEX                   = 1 << 13;
        const INDIRECT_COMPUTE         = 1 << 14;
        const INDIRECT_DRAW            = 1 << 15;
        const INDIRECT_DISPATCH_RAYS   = 1 << 16;
        const TRANSFER_SOURCE          = 1 << 17;
        const TRANSFER_DESTINATION     = 1 << 18;
        const ACCELERATION_STRUCTURE_BUILD = 1 << 19;

        const ALL_READ = Self::CONSTANT_GEOMETRY.bits()
            | Self::CONSTANT_PIXEL.bits()
            | Self::CONSTANT_COMPUTE.bits()
            | Self::CONSTANT_DISPATCH_RAYS.bits()
            | Self::STORAGE_GEOMETRY_READ.bits()
            | Self::STORAGE_FRAGMENT_READ.bits()
            | Self::STORAGE_COMPUTE_READ.bits()
            | Self::STORAGE_TRACE_RAYS_READ.bits()
            | Self::INDEX.bits()
            | Self::VERTEX.bits()
            | Self::INDIRECT_COMPUTE.bits()
            | Self::INDIRECT_DRAW.bits()
            | Self::INDIRECT_DISPATCH_RAYS.bits()
            | Self::TRANSFER_SOURCE.bits();

        const ALL_WRITE = Self::STORAGE_GEOMETRY_WRITE.bits()
            | Self::STORAGE_FRAGMENT_WRITE.bits()
            | Self::STORAGE_COMPUTE_WRITE.bits()
            | Self::STORAGE_TRACE_RAYS_WRITE.bits()
            | Self::TRANSFER_DESTINATION.bits()
            | Self::ACCELERATION_STRUCTURE_BUILD.bits();
    }

    /// How a pass uses an acceleration structure.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccelerationStructureUsage: u32 {
        const BUILD            = 1 << 0;
        const ATTACH           = 1 << 1;
        const GEOMETRY_READ    = 1 << 2;
        const FRAGMENT_READ    = 1 << 3;
        const COMPUTE_READ     = 1 << 4;
        const TRACE_RAYS_READ  = 1 << 5;

        const ALL_READ = Self::ATTACH.bits()
            | Self::GEOMETRY_READ.bits()
            | Self::FRAGMENT_READ.bits()
            | Self::COMPUTE_READ.bits()
            | Self::TRACE_RAYS_READ.bits();

        const ALL_WRITE = Self::BUILD.bits();
    }
}

impl TextureUsage {
    /// `true` if any bit of this mask is a read usage.
    #[must_use]
    pub fn is_read(self) -> bool {
        self.intersects(Self::ALL_READ)
    }

    /// `true` if any bit of this mask is a write usage.
    #[must_use]
    pub fn is_write(self) -> bool {
        self.intersects(Self::ALL_WRITE)
    }
}

impl BufferUsage {
    #[must_use]
    pub fn is_read(self) -> bool {
        self.intersects(Self::ALL_READ)
    }

    #[must_use]
    pub fn is_write(self) -> bool {
        self.intersects(Self::ALL_WRITE)
    }
}

impl AccelerationStructureUsage {
    #[must_use]
    pub fn is_read(self) -> bool {
        self.intersects(Self::ALL_READ)
    }

    #[must_use]
    pub fn is_write(self) -> bool {
        self.intersects(Self::ALL_WRITE)
    }
}

/// Conflict test shared by all three usage taxonomies: `(read_i ∧ write_j) ∨
/// (write_i ∧ read_j) ∨ (write_i ∧ write_j)`.
#[must_use]
pub fn accesses_conflict(crnt_is_read: bool, crnt_is_write: bool, prev_is_read: bool, prev_is_write: bool) -> bool {
    (crnt_is_read && prev_is_write) || (crnt_is_write && prev_is_read) || (crnt_is_write && prev_is_write)
}
