//! Texture samplers.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Sampler wrapper with a single filter for magnification and minification.
pub struct Sampler {
    device: Arc<Device>,
    sampler: vk::Sampler,
    filter: vk::Filter,
}

impl Sampler {
    /// Creates a sampler using `filter` for both directions.
    pub fn new(device: Arc<Device>, filter: vk::Filter) -> RhiResult<Self> {
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter)
            .min_filter(filter);

        let sampler = unsafe { device.handle().create_sampler(&create_info, None)? };
        debug!("Created {:?} sampler", filter);

        Ok(Self {
            device,
            sampler,
            filter,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }

    #[inline]
    pub fn filter(&self) -> vk::Filter {
        self.filter
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
        debug!("Destroyed {:?} sampler", self.filter);
    }
}
