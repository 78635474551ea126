//! Growable descriptor set allocator.
//!
//! The allocator hands out descriptor sets from a list of pools. When a pool
//! runs out of space it is parked on the `full` list and allocation retries
//! once on another pool, creating one if necessary. Each new pool is 1.5x the
//! size of the previous one, up to [`MAX_SETS_PER_POOL`].
//!
//! Sets are never freed individually. [`DescriptorAllocator::clear_pools`]
//! resets every pool at once, which is how per-frame allocators recycle
//! their sets after the frame's fence signals.
//!
//! Pool management goes through [`DescriptorPoolBackend`] so the growth
//! policy can be exercised without a GPU. [`DevicePools`] is the Vulkan
//! backend.

use std::fmt::Debug;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Upper bound on the number of sets in a single pool.
pub const MAX_SETS_PER_POOL: u32 = 4096;

/// Descriptors of one type to reserve per set in a pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolSizeRatio {
    pub ty: vk::DescriptorType,
    pub ratio: f32,
}

impl PoolSizeRatio {
    pub const fn new(ty: vk::DescriptorType, ratio: f32) -> Self {
        Self { ty, ratio }
    }
}

/// Ratio table shared by the global and per-frame allocators.
pub const STANDARD_RATIOS: [PoolSizeRatio; 4] = [
    PoolSizeRatio::new(vk::DescriptorType::STORAGE_IMAGE, 3.0),
    PoolSizeRatio::new(vk::DescriptorType::STORAGE_BUFFER, 3.0),
    PoolSizeRatio::new(vk::DescriptorType::UNIFORM_BUFFER, 3.0),
    PoolSizeRatio::new(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 4.0),
];

/// Pool sizes for a pool of `max_sets` sets.
pub fn pool_sizes(max_sets: u32, ratios: &[PoolSizeRatio]) -> Vec<vk::DescriptorPoolSize> {
    ratios
        .iter()
        .map(|r| {
            vk::DescriptorPoolSize::default()
                .ty(r.ty)
                .descriptor_count((r.ratio * max_sets as f32) as u32)
        })
        .collect()
}

/// Size of the pool created after one of `sets` sets.
pub fn next_pool_size(sets: u32) -> u32 {
    ((sets as f32 * 1.5) as u32).clamp(1, MAX_SETS_PER_POOL)
}

/// Creates, allocates from, resets and destroys descriptor pools.
pub trait DescriptorPoolBackend {
    type Pool: Copy + Eq + Debug;

    fn create_pool(&mut self, max_sets: u32, ratios: &[PoolSizeRatio]) -> RhiResult<Self::Pool>;

    /// Allocates one set. Exhaustion is reported as
    /// `ERROR_OUT_OF_POOL_MEMORY` or `ERROR_FRAGMENTED_POOL`.
    fn allocate_set(
        &mut self,
        pool: Self::Pool,
        layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet, vk::Result>;

    fn reset_pool(&mut self, pool: Self::Pool) -> RhiResult<()>;

    fn destroy_pool(&mut self, pool: Self::Pool);
}

/// Vulkan descriptor pools on a logical device.
pub struct DevicePools {
    device: Arc<Device>,
}

impl DevicePools {
    pub fn new(device: Arc<Device>) -> Self {
        Self { device }
    }
}

impl DescriptorPoolBackend for DevicePools {
    type Pool = vk::DescriptorPool;

    fn create_pool(&mut self, max_sets: u32, ratios: &[PoolSizeRatio]) -> RhiResult<Self::Pool> {
        let sizes = pool_sizes(max_sets, ratios);
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&sizes);

        let pool = unsafe {
            self.device
                .handle()
                .create_descriptor_pool(&create_info, None)?
        };
        Ok(pool)
    }

    fn allocate_set(
        &mut self,
        pool: Self::Pool,
        layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet, vk::Result> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);

        let sets = unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info)? };
        sets.first().copied().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn reset_pool(&mut self, pool: Self::Pool) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())?;
        }
        Ok(())
    }

    fn destroy_pool(&mut self, pool: Self::Pool) {
        unsafe {
            self.device.handle().destroy_descriptor_pool(pool, None);
        }
    }
}

/// Descriptor set allocator that grows by adding pools.
pub struct DescriptorAllocator<B: DescriptorPoolBackend = DevicePools> {
    backend: B,
    ratios: Vec<PoolSizeRatio>,
    ready: Vec<B::Pool>,
    full: Vec<B::Pool>,
    sets_per_pool: u32,
}

impl DescriptorAllocator<DevicePools> {
    /// Creates a Vulkan-backed allocator with one pool of `max_sets` sets.
    pub fn new(device: Arc<Device>, max_sets: u32, ratios: &[PoolSizeRatio]) -> RhiResult<Self> {
        Self::init(DevicePools::new(device), max_sets, ratios)
    }
}

impl<B: DescriptorPoolBackend> DescriptorAllocator<B> {
    /// Creates the first pool with `max_sets` sets and schedules the next
    /// pool at 1.5x that size.
    ///
    /// # Errors
    ///
    /// Returns an error if the first pool cannot be created.
    pub fn init(mut backend: B, max_sets: u32, ratios: &[PoolSizeRatio]) -> RhiResult<Self> {
        let first = backend.create_pool(max_sets, ratios)?;
        debug!("Descriptor allocator initialized with a {}-set pool", max_sets);

        Ok(Self {
            backend,
            ratios: ratios.to_vec(),
            ready: vec![first],
            full: Vec::new(),
            sets_per_pool: next_pool_size(max_sets),
        })
    }

    /// Allocates one descriptor set with `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::DescriptorPoolExhausted`] if a fresh pool is also
    /// exhausted, or the Vulkan error for any other failure.
    pub fn allocate(&mut self, layout: vk::DescriptorSetLayout) -> RhiResult<vk::DescriptorSet> {
        let pool = self.get_pool()?;

        let pool = match self.backend.allocate_set(pool, layout) {
            Ok(set) => {
                self.ready.push(pool);
                return Ok(set);
            }
            Err(e) if is_exhausted(e) => {
                self.full.push(pool);
                self.get_pool()?
            }
            Err(e) => {
                self.ready.push(pool);
                return Err(e.into());
            }
        };

        match self.backend.allocate_set(pool, layout) {
            Ok(set) => {
                self.ready.push(pool);
                Ok(set)
            }
            Err(e) if is_exhausted(e) => {
                warn!("Descriptor allocation failed on a fresh pool: {:?}", e);
                self.full.push(pool);
                Err(RhiError::DescriptorPoolExhausted(e))
            }
            Err(e) => {
                self.ready.push(pool);
                Err(e.into())
            }
        }
    }

    /// Resets every pool and makes all of them available again.
    ///
    /// Every set previously handed out becomes invalid.
    pub fn clear_pools(&mut self) -> RhiResult<()> {
        for &pool in self.ready.iter().chain(self.full.iter()) {
            self.backend.reset_pool(pool)?;
        }
        self.ready.append(&mut self.full);
        Ok(())
    }

    /// Destroys every pool.
    pub fn destroy_pools(&mut self) {
        for pool in self.ready.drain(..).chain(self.full.drain(..)) {
            self.backend.destroy_pool(pool);
        }
    }

    /// Pools currently owned, ready and full.
    pub fn pool_count(&self) -> usize {
        self.ready.len() + self.full.len()
    }

    pub fn full_pool_count(&self) -> usize {
        self.full.len()
    }

    /// Size of the next pool to be created.
    pub fn sets_per_pool(&self) -> u32 {
        self.sets_per_pool
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn get_pool(&mut self) -> RhiResult<B::Pool> {
        if let Some(pool) = self.ready.pop() {
            return Ok(pool);
        }

        let pool = self.backend.create_pool(self.sets_per_pool, &self.ratios)?;
        debug!("Created descriptor pool with {} sets", self.sets_per_pool);
        self.sets_per_pool = next_pool_size(self.sets_per_pool);
        Ok(pool)
    }
}

impl<B: DescriptorPoolBackend> Drop for DescriptorAllocator<B> {
    fn drop(&mut self) {
        self.destroy_pools();
    }
}

fn is_exhausted(result: vk::Result) -> bool {
    matches!(
        result,
        vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL
    )
}
