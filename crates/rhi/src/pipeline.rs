//! Graphics and compute pipeline creation.
//!
//! Graphics pipelines target dynamic rendering, pull vertices through buffer
//! device addresses (no vertex input state), and keep viewport and scissor
//! dynamic. Compute pipelines are a single shader stage on a layout.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use frame_rhi::device::Device;
//! use frame_rhi::image::{DEPTH_FORMAT, DRAW_IMAGE_FORMAT};
//! use frame_rhi::pipeline::{Blending, GraphicsPipelineBuilder, PipelineLayout};
//! use frame_rhi::shader::Shader;
//!
//! # fn example(device: Arc<Device>, vs: &Shader, fs: &Shader) -> Result<(), frame_rhi::RhiError> {
//! let layout = PipelineLayout::new(device.clone(), &[], &[])?;
//! let pipeline = GraphicsPipelineBuilder::new(vs, fs)
//!     .color_attachment_format(DRAW_IMAGE_FORMAT)
//!     .depth_attachment_format(DEPTH_FORMAT)
//!     .depth_test(true, vk::CompareOp::GREATER_OR_EQUAL)
//!     .blending(Blending::Additive)
//!     .build(device, &layout)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::Shader;

/// Vulkan pipeline layout wrapper.
pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Creates a pipeline layout.
    ///
    /// # Errors
    ///
    /// Returns an error if pipeline layout creation fails.
    pub fn new(
        device: Arc<Device>,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(descriptor_set_layouts)
            .push_constant_ranges(push_constant_ranges);

        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };

        debug!(
            "Created pipeline layout with {} set layout(s) and {} push constant range(s)",
            descriptor_set_layouts.len(),
            push_constant_ranges.len()
        );

        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
        debug!("Pipeline layout destroyed");
    }
}

/// Push constant range covering `T` for `stages`, starting at offset 0.
pub fn push_constant_range<T>(stages: vk::ShaderStageFlags) -> vk::PushConstantRange {
    vk::PushConstantRange {
        stage_flags: stages,
        offset: 0,
        size: std::mem::size_of::<T>() as u32,
    }
}

/// Graphics or compute pipeline.
pub struct Pipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
    bind_point: vk::PipelineBindPoint,
}

impl Pipeline {
    /// Creates a compute pipeline from a compute shader.
    pub fn compute(
        device: Arc<Device>,
        shader: &Shader,
        layout: &PipelineLayout,
    ) -> RhiResult<Self> {
        let create_info = vk::ComputePipelineCreateInfo::default()
            .layout(layout.handle())
            .stage(shader.stage_create_info());

        let pipelines = unsafe {
            device
                .handle()
                .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, result)| result)?
        };
        let pipeline = single_pipeline(pipelines)?;

        debug!("Compute pipeline created");

        Ok(Self {
            device,
            pipeline,
            bind_point: vk::PipelineBindPoint::COMPUTE,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    #[inline]
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        self.bind_point
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        debug!("{:?} pipeline destroyed", self.bind_point);
    }
}

fn single_pipeline(pipelines: Vec<vk::Pipeline>) -> RhiResult<vk::Pipeline> {
    pipelines
        .into_iter()
        .next()
        .ok_or_else(|| RhiError::PipelineError("Driver returned no pipeline".to_string()))
}

/// Color blend mode of the single color attachment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Blending {
    #[default]
    Disabled,
    /// `src * src_alpha + dst`
    Additive,
    /// `src * src_alpha + dst * (1 - src_alpha)`
    AlphaBlend,
}

impl Blending {
    pub fn to_vk(self) -> vk::PipelineColorBlendAttachmentState {
        let state = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA);

        let dst_color = match self {
            Blending::Disabled => return state.blend_enable(false),
            Blending::Additive => vk::BlendFactor::ONE,
            Blending::AlphaBlend => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        };

        state
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(dst_color)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
    }
}

/// Depth test configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthTest {
    pub write: bool,
    pub compare_op: vk::CompareOp,
}

/// Builder for graphics pipelines with one color attachment.
pub struct GraphicsPipelineBuilder<'a> {
    vertex_shader: &'a Shader,
    fragment_shader: &'a Shader,
    topology: vk::PrimitiveTopology,
    polygon_mode: vk::PolygonMode,
    cull_mode: vk::CullModeFlags,
    front_face: vk::FrontFace,
    depth_test: Option<DepthTest>,
    blending: Blending,
    color_format: vk::Format,
    depth_format: vk::Format,
}

impl<'a> GraphicsPipelineBuilder<'a> {
    /// Triangle list, filled, no culling, no depth test, no blending.
    pub fn new(vertex_shader: &'a Shader, fragment_shader: &'a Shader) -> Self {
        Self {
            vertex_shader,
            fragment_shader,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::CLOCKWISE,
            depth_test: None,
            blending: Blending::Disabled,
            color_format: vk::Format::UNDEFINED,
            depth_format: vk::Format::UNDEFINED,
        }
    }

    pub fn topology(mut self, topology: vk::PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn polygon_mode(mut self, mode: vk::PolygonMode) -> Self {
        self.polygon_mode = mode;
        self
    }

    pub fn cull_mode(mut self, cull_mode: vk::CullModeFlags, front_face: vk::FrontFace) -> Self {
        self.cull_mode = cull_mode;
        self.front_face = front_face;
        self
    }

    /// Enables depth testing with `compare_op`, writing depth if `write`.
    pub fn depth_test(mut self, write: bool, compare_op: vk::CompareOp) -> Self {
        self.depth_test = Some(DepthTest { write, compare_op });
        self
    }

    pub fn blending(mut self, blending: Blending) -> Self {
        self.blending = blending;
        self
    }

    pub fn color_attachment_format(mut self, format: vk::Format) -> Self {
        self.color_format = format;
        self
    }

    pub fn depth_attachment_format(mut self, format: vk::Format) -> Self {
        self.depth_format = format;
        self
    }

    fn depth_stencil_state(&self) -> vk::PipelineDepthStencilStateCreateInfo<'static> {
        let state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0);

        match self.depth_test {
            Some(test) => state
                .depth_test_enable(true)
                .depth_write_enable(test.write)
                .depth_compare_op(test.compare_op),
            None => state
                .depth_test_enable(false)
                .depth_write_enable(false)
                .depth_compare_op(vk::CompareOp::NEVER),
        }
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::PipelineError`] if no color format was set, or a
    /// Vulkan error if creation fails.
    pub fn build(self, device: Arc<Device>, layout: &PipelineLayout) -> RhiResult<Pipeline> {
        if self.color_format == vk::Format::UNDEFINED {
            return Err(RhiError::PipelineError(
                "A color attachment format is required".to_string(),
            ));
        }

        let shader_stages = [
            self.vertex_shader.stage_create_info(),
            self.fragment_shader.stage_create_info(),
        ];

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default();

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(self.topology)
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(self.polygon_mode)
            .line_width(1.0)
            .cull_mode(self.cull_mode)
            .front_face(self.front_face);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .min_sample_shading(1.0);

        let depth_stencil_state = self.depth_stencil_state();

        let blend_attachments = [self.blending.to_vk()];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats = [self.color_format];
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(self.depth_format);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .push_next(&mut rendering_info);

        let pipelines = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|(_, result)| result)?
        };
        let pipeline = single_pipeline(pipelines)?;

        info!(
            "Graphics pipeline created ({:?} blending, depth {:?})",
            self.blending, self.depth_test
        );

        Ok(Pipeline {
            device,
            pipeline,
            bind_point: vk::PipelineBindPoint::GRAPHICS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_blending_writes_all_channels() {
        let state = Blending::Disabled.to_vk();
        assert_eq!(state.blend_enable, vk::FALSE);
        assert_eq!(state.color_write_mask, vk::ColorComponentFlags::RGBA);
    }

    #[test]
    fn test_additive_blending_keeps_destination() {
        let state = Blending::Additive.to_vk();
        assert_eq!(state.blend_enable, vk::TRUE);
        assert_eq!(state.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(state.dst_color_blend_factor, vk::BlendFactor::ONE);
    }

    #[test]
    fn test_alpha_blending_weights_destination() {
        let state = Blending::AlphaBlend.to_vk();
        assert_eq!(
            state.dst_color_blend_factor,
            vk::BlendFactor::ONE_MINUS_SRC_ALPHA
        );
        assert_eq!(state.alpha_blend_op, vk::BlendOp::ADD);
    }

    #[test]
    fn test_push_constant_range_spans_type() {
        let range = push_constant_range::<[f32; 16]>(vk::ShaderStageFlags::VERTEX);
        assert_eq!(range.offset, 0);
        assert_eq!(range.size, 64);
        assert_eq!(range.stage_flags, vk::ShaderStageFlags::VERTEX);
    }
}
