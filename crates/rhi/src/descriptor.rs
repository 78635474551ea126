//! Descriptor set layouts and descriptor writes.
//!
//! - [`DescriptorLayoutBuilder`] collects bindings and builds a [`DescriptorSetLayout`]
//! - [`DescriptorWriter`] batches buffer and image writes into one update call
//!
//! Descriptor sets themselves come from
//! [`DescriptorAllocator`](crate::descriptor_allocator::DescriptorAllocator).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use frame_rhi::device::Device;
//! use frame_rhi::descriptor::{DescriptorLayoutBuilder, DescriptorWriter};
//!
//! # fn example(device: Arc<Device>, set: vk::DescriptorSet, ubo: vk::Buffer) -> Result<(), frame_rhi::RhiError> {
//! let layout = DescriptorLayoutBuilder::new()
//!     .add_binding(0, vk::DescriptorType::UNIFORM_BUFFER)
//!     .build(device.clone(), vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)?;
//!
//! let mut writer = DescriptorWriter::new();
//! writer.write_buffer(0, ubo, 256, 0, vk::DescriptorType::UNIFORM_BUFFER);
//! writer.update_set(&device, set);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Descriptor set layout wrapper.
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Creates a layout from raw bindings.
    ///
    /// # Errors
    ///
    /// Returns an error if layout creation fails.
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);

        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };

        debug!(
            "Created descriptor set layout with {} binding(s)",
            bindings.len()
        );

        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
        debug!("Destroyed descriptor set layout");
    }
}

/// Collects single-descriptor bindings for a layout.
#[derive(Default)]
pub struct DescriptorLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding<'static>>,
}

impl DescriptorLayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one descriptor of `ty` at `binding`.
    pub fn add_binding(mut self, binding: u32, ty: vk::DescriptorType) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding)
                .descriptor_type(ty)
                .descriptor_count(1),
        );
        self
    }

    /// Bindings added so far, without stage flags.
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding<'static>] {
        &self.bindings
    }

    /// Builds the layout, making every binding visible to `stages`.
    pub fn build(
        mut self,
        device: Arc<Device>,
        stages: vk::ShaderStageFlags,
    ) -> RhiResult<DescriptorSetLayout> {
        for binding in &mut self.bindings {
            binding.stage_flags |= stages;
        }
        DescriptorSetLayout::new(device, &self.bindings)
    }
}

enum PendingInfo {
    Image(usize),
    Buffer(usize),
}

struct PendingWrite {
    binding: u32,
    ty: vk::DescriptorType,
    info: PendingInfo,
}

/// Accumulates descriptor writes and applies them in a single
/// `vkUpdateDescriptorSets` call.
#[derive(Default)]
pub struct DescriptorWriter {
    image_infos: Vec<vk::DescriptorImageInfo>,
    buffer_infos: Vec<vk::DescriptorBufferInfo>,
    writes: Vec<PendingWrite>,
}

impl DescriptorWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_image(
        &mut self,
        binding: u32,
        view: vk::ImageView,
        sampler: vk::Sampler,
        layout: vk::ImageLayout,
        ty: vk::DescriptorType,
    ) -> &mut Self {
        self.image_infos.push(
            vk::DescriptorImageInfo::default()
                .sampler(sampler)
                .image_view(view)
                .image_layout(layout),
        );
        self.writes.push(PendingWrite {
            binding,
            ty,
            info: PendingInfo::Image(self.image_infos.len() - 1),
        });
        self
    }

    pub fn write_buffer(
        &mut self,
        binding: u32,
        buffer: vk::Buffer,
        size: vk::DeviceSize,
        offset: vk::DeviceSize,
        ty: vk::DescriptorType,
    ) -> &mut Self {
        self.buffer_infos.push(
            vk::DescriptorBufferInfo::default()
                .buffer(buffer)
                .offset(offset)
                .range(size),
        );
        self.writes.push(PendingWrite {
            binding,
            ty,
            info: PendingInfo::Buffer(self.buffer_infos.len() - 1),
        });
        self
    }

    /// Number of writes queued.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn clear(&mut self) {
        self.image_infos.clear();
        self.buffer_infos.clear();
        self.writes.clear();
    }

    /// Applies every queued write to `set`.
    pub fn update_set(&self, device: &Device, set: vk::DescriptorSet) {
        if self.writes.is_empty() {
            return;
        }

        let writes: Vec<vk::WriteDescriptorSet> = self
            .writes
            .iter()
            .map(|pending| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(pending.binding)
                    .dst_array_element(0)
                    .descriptor_type(pending.ty);
                match pending.info {
                    PendingInfo::Image(i) => {
                        write.image_info(std::slice::from_ref(&self.image_infos[i]))
                    }
                    PendingInfo::Buffer(i) => {
                        write.buffer_info(std::slice::from_ref(&self.buffer_infos[i]))
                    }
                }
            })
            .collect();

        unsafe {
            device.handle().update_descriptor_sets(&writes, &[]);
        }
    }
}
