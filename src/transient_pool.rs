//! Transient Resource Pool: recycles GPU textures across frames, keyed by
//! the content hash of their descriptor.
//!
//! Mirrors `RenderGraph::getOrCreateRenderTarget`/`periodicCleanup`: a
//! texture created for one frame's transient render target is handed back
//! to the pool at `reset` instead of destroyed, and a later frame asking for
//! the same descriptor (same hash) gets it back instead of allocating fresh
//! GPU memory. Since a pool that only ever grows wastes memory once a
//! frame's peak transient footprint drops (e.g. after a quality setting
//! change), every `cleanup_interval_frames` resets the pool is trimmed back
//! down to the highest concurrent-in-use count it saw over that window.

use rustc_hash::FxHashMap;
use xxhash_rust::xxh3::xxh3_64;

use crate::config::GraphConfig;
use crate::device::{GraphDevice, TextureDesc};
use crate::errors::Result;
use crate::usage::TextureUsage;

/// Combines a descriptor's content hash with its derived-usage mask so two
/// identical descriptors requested with different usage flags land in
/// separate pool slots instead of colliding and handing back a texture
/// created with the wrong usage flags (spec §4.8).
#[must_use]
pub(crate) fn pool_key(content_hash: u64, usage: TextureUsage) -> u64 {
    let mut buf = [0u8; 12];
    buf[..8].copy_from_slice(&content_hash.to_le_bytes());
    buf[8..].copy_from_slice(&usage.bits().to_le_bytes());
    xxh3_64(&buf)
}

pub(crate) struct TransientResourcePool<D: GraphDevice> {
    free: FxHashMap<u64, Vec<D::Texture>>,
    acquired_this_frame: FxHashMap<u64, usize>,
    peak_concurrent: FxHashMap<u64, usize>,
    frames_since_cleanup: u32,
}

impl<D: GraphDevice> TransientResourcePool<D> {
    pub(crate) fn new() -> Self {
        Self {
            free: FxHashMap::default(),
            acquired_this_frame: FxHashMap::default(),
            peak_concurrent: FxHashMap::default(),
            frames_since_cleanup: 0,
        }
    }

    /// Pops a recycled texture matching `key` (the descriptor's content hash
    /// combined with its derived usage via [`pool_key`]) if one is free,
    /// otherwise allocates a fresh one from the segregated-list class that
    /// covers `desc`'s memory requirement.
    pub(crate) fn acquire(
        &mut self,
        device: &D,
        key: u64,
        desc: &TextureDesc<D::TextureBackendDesc>,
        usage: TextureUsage,
        config: &GraphConfig,
    ) -> Result<D::Texture> {
        let hash = key;
        let concurrent = self.acquired_this_frame.entry(hash).or_insert(0);
        *concurrent += 1;

        if let Some(list) = self.free.get_mut(&hash) {
            if let Some(texture) = list.pop() {
                return Ok(texture);
            }
        }
        let requirement = device.texture_memory_requirement(desc);
        let size_class = config.class_for(requirement);
        log::debug!("transient pool slot {:016x} missed, allocating {} bytes (class {} bytes)", hash, requirement, size_class);
        device.create_texture(desc, usage, size_class)
    }

    /// Returns every texture acquired this frame to the free list, records
    /// this frame's peak concurrent usage per hash, and runs periodic
    /// cleanup if the interval has elapsed.
    pub(crate) fn release_frame(&mut self, acquired: impl IntoIterator<Item = (u64, D::Texture)>, config: &GraphConfig) {
        for (hash, texture) in acquired {
            self.free.entry(hash).or_default().push(texture);
        }

        for (hash, count) in self.acquired_this_frame.drain() {
            let peak = self.peak_concurrent.entry(hash).or_insert(0);
            *peak = (*peak).max(count);
        }

        self.frames_since_cleanup += 1;
        if self.frames_since_cleanup >= config.cleanup_interval_frames {
            self.cleanup();
        }
    }

    fn cleanup(&mut self) {
        let mut freed = 0usize;
        for (hash, list) in &mut self.free {
            let keep = self.peak_concurrent.get(hash).copied().unwrap_or(0);
            if list.len() > keep {
                freed += list.len() - keep;
                list.truncate(keep);
            }
        }
        if freed > 0 {
            log::info!("periodic cleanup freed {freed} idle transient texture(s)");
        }
        self.peak_concurrent.clear();
        self.frames_since_cleanup = 0;
    }

    /// Current total pooled texture count, across every hash. For
    /// statistics / tests only.
    #[must_use]
    pub(crate) fn pooled_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct CountingDevice {
        created: std::cell::Cell<u32>,
    }

    impl GraphDevice for CountingDevice {
        type Texture = u32;
        type Buffer = ();
        type AccelerationStructure = ();
        type CommandBuffer = ();
        type Fence = ();
        type TimestampQuery = ();
        type TextureBackendDesc = ();

        fn create_texture(&self, _desc: &TextureDesc<()>, _usage: TextureUsage, _size_class_bytes: u64) -> Result<Self::Texture> {
            let n = self.created.get();
            self.created.set(n + 1);
            Ok(n)
        }
        fn texture_memory_requirement(&self, _desc: &TextureDesc<()>) -> u64 {
            0
        }
        fn texture_uuid(&self, texture: &Self::Texture) -> u64 {
            u64::from(*texture)
        }
        fn buffer_uuid(&self, _buffer: &Self::Buffer) -> u64 {
            0
        }
        fn texture_mip_count(&self, _texture: &Self::Texture) -> u32 {
            1
        }
        fn texture_layer_count(&self, _texture: &Self::Texture) -> u32 {
            1
        }
        fn texture_is_cube(&self, _texture: &Self::Texture) -> bool {
            false
        }
        fn texture_depth_stencil_aspect(&self, _texture: &Self::Texture) -> crate::subresource::DepthStencilAspect {
            crate::subresource::DepthStencilAspect::empty()
        }
        fn new_command_buffer(&self, _name: &str) -> Result<Self::CommandBuffer> {
            Ok(())
        }
        fn push_debug_marker(&self, _cmdb: &mut Self::CommandBuffer, _name: &str, _color: [f32; 3]) {}
        fn pop_debug_marker(&self, _cmdb: &mut Self::CommandBuffer) {}
        fn set_pipeline_barrier(
            &self,
            _cmdb: &mut Self::CommandBuffer,
            _textures: &[crate::device::TextureBarrierInfo<Self::Texture>],
            _buffers: &[crate::device::BufferBarrierInfo<Self::Buffer>],
            _acceleration_structures: &[crate::device::AccelerationStructureBarrierInfo<Self::AccelerationStructure>],
        ) {
        }
        fn begin_render_pass(&self, _cmdb: &mut Self::CommandBuffer, _info: &crate::device::RenderPassInfo<Self::Texture>) {}
        fn end_render_pass(&self, _cmdb: &mut Self::CommandBuffer) {}
        fn new_timestamp_query(&self) -> Result<Self::TimestampQuery> {
            Ok(())
        }
        fn write_timestamp(&self, _cmdb: &mut Self::CommandBuffer, _query: &Self::TimestampQuery) {}
        fn timestamp_query_result(&self, _query: &Self::TimestampQuery) -> Option<f64> {
            None
        }
        fn end_recording(&self, cmdb: Self::CommandBuffer) -> Result<Self::CommandBuffer> {
            Ok(cmdb)
        }
        fn submit(
            &self,
            _cmdbs: Vec<Self::CommandBuffer>,
            _wait_acquire: bool,
            _signal_present: bool,
            _signal_fence: Option<&Self::Fence>,
            _is_last_of_frame: bool,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn desc() -> TextureDesc<()> {
        TextureDesc {
            width: 1920,
            height: 1080,
            depth_or_layer_count: 1,
            mip_level_count: 1,
            is_cube: false,
            depth_stencil_aspect: crate::subresource::DepthStencilAspect::empty(),
            label: "test",
            backend_desc: (),
        }
    }

    #[test]
    fn recycles_texture_released_last_frame() {
        let device = CountingDevice { created: std::cell::Cell::new(0) };
        let mut pool: TransientResourcePool<CountingDevice> = TransientResourcePool::new();
        let config = GraphConfig::default();

        let tex = pool.acquire(&device, 42, &desc(), TextureUsage::FRAMEBUFFER_WRITE, &config).unwrap();
        pool.release_frame([(42, tex)], &config);
        assert_eq!(device.created.get(), 1);

        let _tex2 = pool.acquire(&device, 42, &desc(), TextureUsage::FRAMEBUFFER_WRITE, &config).unwrap();
        assert_eq!(device.created.get(), 1, "second acquire should recycle, not create");
    }

    #[test]
    fn cleanup_trims_to_peak_concurrent_usage() {
        let device = CountingDevice { created: std::cell::Cell::new(0) };
        let mut pool: TransientResourcePool<CountingDevice> = TransientResourcePool::new();
        let mut config = GraphConfig::default();
        config.cleanup_interval_frames = 1;

        // frame 1: needs two concurrently
        let a = pool.acquire(&device, 7, &desc(), TextureUsage::FRAMEBUFFER_WRITE, &config).unwrap();
        let b = pool.acquire(&device, 7, &desc(), TextureUsage::FRAMEBUFFER_WRITE, &config).unwrap();
        pool.release_frame([(7, a), (7, b)], &config);
        assert_eq!(pool.pooled_count(), 2);

        // frame 2: only needs one, cleanup should shrink the idle spare
        let c = pool.acquire(&device, 7, &desc(), TextureUsage::FRAMEBUFFER_WRITE, &config).unwrap();
        pool.release_frame([(7, c)], &config);
        assert_eq!(pool.pooled_count(), 1);
    }

    #[test]
    fn pool_key_distinguishes_same_descriptor_different_usage() {
        // Two render targets with the same content hash but different derived
        // usages must never collide in the pool, or one would hand back a
        // texture created with the wrong usage flags (spec §4.8).
        let key_write = pool_key(42, TextureUsage::FRAMEBUFFER_WRITE);
        let key_sampled = pool_key(42, TextureUsage::SAMPLED_FRAGMENT);
        assert_ne!(key_write, key_sampled);
    }

    #[test]
    fn same_hash_different_usage_allocates_separate_textures() {
        let device = CountingDevice { created: std::cell::Cell::new(0) };
        let mut pool: TransientResourcePool<CountingDevice> = TransientResourcePool::new();
        let config = GraphConfig::default();

        let key_a = pool_key(5, TextureUsage::FRAMEBUFFER_WRITE);
        let key_b = pool_key(5, TextureUsage::UAV_COMPUTE_WRITE);

        pool.acquire(&device, key_a, &desc(), TextureUsage::FRAMEBUFFER_WRITE, &config).unwrap();
        pool.acquire(&device, key_b, &desc(), TextureUsage::UAV_COMPUTE_WRITE, &config).unwrap();
        assert_eq!(device.created.get(), 2, "distinct usage must not recycle across the other usage's slot");
    }
}
