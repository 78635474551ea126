//! Command recording seam.
//!
//! Pass and draw-list code records through [`CommandRecorder`] rather than a
//! concrete command buffer. The Vulkan implementation forwards to
//! [`CommandBuffer`]; [`CommandLog`] keeps the calls in memory so recorded
//! sequences can be inspected without a device.

use ash::vk;

use frame_rhi::command::CommandBuffer;
use frame_rhi::rendering::RenderingConfig;

/// The subset of command-buffer recording used by the frame.
pub trait CommandRecorder {
    fn transition_image(
        &mut self,
        image: vk::Image,
        current: vk::ImageLayout,
        new: vk::ImageLayout,
    );

    fn begin_rendering(&mut self, config: &RenderingConfig);

    fn end_rendering(&mut self);

    fn bind_pipeline(&mut self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline);

    fn bind_descriptor_sets(
        &mut self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    );

    /// Binds a `UINT32` index buffer at offset 0.
    fn bind_index_buffer(&mut self, buffer: vk::Buffer);

    fn set_viewport(&mut self, viewport: &vk::Viewport);

    fn set_scissor(&mut self, scissor: &vk::Rect2D);

    /// Pushes `data` at offset 0.
    fn push_constants(
        &mut self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        data: &[u8],
    );

    /// One instance, no vertex offset.
    fn draw_indexed(&mut self, index_count: u32, first_index: u32);

    fn dispatch(&mut self, x: u32, y: u32, z: u32);

    fn blit_image(
        &mut self,
        src: vk::Image,
        dst: vk::Image,
        src_size: vk::Extent2D,
        dst_size: vk::Extent2D,
    );

    /// Handle handed to code outside the renderer, such as a UI overlay.
    fn raw(&self) -> vk::CommandBuffer;
}

impl CommandRecorder for CommandBuffer {
    fn transition_image(
        &mut self,
        image: vk::Image,
        current: vk::ImageLayout,
        new: vk::ImageLayout,
    ) {
        CommandBuffer::transition_image(self, image, current, new);
    }

    fn begin_rendering(&mut self, config: &RenderingConfig) {
        let bundle = config.build();
        CommandBuffer::begin_rendering(self, &bundle.info());
    }

    fn end_rendering(&mut self) {
        CommandBuffer::end_rendering(self);
    }

    fn bind_pipeline(&mut self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        CommandBuffer::bind_pipeline(self, bind_point, pipeline);
    }

    fn bind_descriptor_sets(
        &mut self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) {
        CommandBuffer::bind_descriptor_sets(self, bind_point, layout, first_set, sets);
    }

    fn bind_index_buffer(&mut self, buffer: vk::Buffer) {
        CommandBuffer::bind_index_buffer(self, buffer, 0);
    }

    fn set_viewport(&mut self, viewport: &vk::Viewport) {
        CommandBuffer::set_viewport(self, viewport);
    }

    fn set_scissor(&mut self, scissor: &vk::Rect2D) {
        CommandBuffer::set_scissor(self, scissor);
    }

    fn push_constants(
        &mut self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        data: &[u8],
    ) {
        CommandBuffer::push_constants(self, layout, stages, data);
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32) {
        CommandBuffer::draw_indexed(self, index_count, 1, first_index, 0, 0);
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        CommandBuffer::dispatch(self, x, y, z);
    }

    fn blit_image(
        &mut self,
        src: vk::Image,
        dst: vk::Image,
        src_size: vk::Extent2D,
        dst_size: vk::Extent2D,
    ) {
        CommandBuffer::blit_image(self, src, dst, src_size, dst_size);
    }

    fn raw(&self) -> vk::CommandBuffer {
        self.handle()
    }
}

// =============================================================================
// In-memory recorder
// =============================================================================

/// A command captured by [`CommandLog`].
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedCommand {
    Transition {
        image: vk::Image,
        from: vk::ImageLayout,
        to: vk::ImageLayout,
    },
    BeginRendering {
        color: Option<vk::ImageView>,
        depth: Option<vk::ImageView>,
        extent: vk::Extent2D,
    },
    EndRendering,
    BindPipeline(vk::PipelineBindPoint, vk::Pipeline),
    BindDescriptorSets {
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: Vec<vk::DescriptorSet>,
    },
    BindIndexBuffer(vk::Buffer),
    SetViewport { width: f32, height: f32 },
    SetScissor(vk::Extent2D),
    PushConstants {
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        data: Vec<u8>,
    },
    DrawIndexed { index_count: u32, first_index: u32 },
    Dispatch(u32, u32, u32),
    Blit {
        src: vk::Image,
        dst: vk::Image,
        src_size: vk::Extent2D,
        dst_size: vk::Extent2D,
    },
}

/// Recorder that appends every call to a list instead of a GPU command buffer.
#[derive(Debug, Default)]
pub struct CommandLog {
    pub commands: Vec<RecordedCommand>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded transitions in order, as `(image, from, to)`.
    pub fn transitions(&self) -> Vec<(vk::Image, vk::ImageLayout, vk::ImageLayout)> {
        self.commands
            .iter()
            .filter_map(|c| match *c {
                RecordedCommand::Transition { image, from, to } => Some((image, from, to)),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded commands matching `pred`.
    pub fn count(&self, pred: impl Fn(&RecordedCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }
}

impl CommandRecorder for CommandLog {
    fn transition_image(
        &mut self,
        image: vk::Image,
        current: vk::ImageLayout,
        new: vk::ImageLayout,
    ) {
        self.commands.push(RecordedCommand::Transition {
            image,
            from: current,
            to: new,
        });
    }

    fn begin_rendering(&mut self, config: &RenderingConfig) {
        self.commands.push(RecordedCommand::BeginRendering {
            color: config.color_attachments.first().map(|a| a.image_view()),
            depth: config.depth_attachment.map(|a| a.image_view()),
            extent: config.render_area.extent,
        });
    }

    fn end_rendering(&mut self) {
        self.commands.push(RecordedCommand::EndRendering);
    }

    fn bind_pipeline(&mut self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        self.commands
            .push(RecordedCommand::BindPipeline(bind_point, pipeline));
    }

    fn bind_descriptor_sets(
        &mut self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) {
        self.commands.push(RecordedCommand::BindDescriptorSets {
            bind_point,
            layout,
            first_set,
            sets: sets.to_vec(),
        });
    }

    fn bind_index_buffer(&mut self, buffer: vk::Buffer) {
        self.commands.push(RecordedCommand::BindIndexBuffer(buffer));
    }

    fn set_viewport(&mut self, viewport: &vk::Viewport) {
        self.commands.push(RecordedCommand::SetViewport {
            width: viewport.width,
            height: viewport.height,
        });
    }

    fn set_scissor(&mut self, scissor: &vk::Rect2D) {
        self.commands.push(RecordedCommand::SetScissor(scissor.extent));
    }

    fn push_constants(
        &mut self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        data: &[u8],
    ) {
        self.commands.push(RecordedCommand::PushConstants {
            layout,
            stages,
            data: data.to_vec(),
        });
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32) {
        self.commands.push(RecordedCommand::DrawIndexed {
            index_count,
            first_index,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.commands.push(RecordedCommand::Dispatch(x, y, z));
    }

    fn blit_image(
        &mut self,
        src: vk::Image,
        dst: vk::Image,
        src_size: vk::Extent2D,
        dst_size: vk::Extent2D,
    ) {
        self.commands.push(RecordedCommand::Blit {
            src,
            dst,
            src_size,
            dst_size,
        });
    }

    fn raw(&self) -> vk::CommandBuffer {
        vk::CommandBuffer::null()
    }
}
