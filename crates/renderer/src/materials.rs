//! Mesh pipelines and the material instances that use them.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use frame_rhi::descriptor::DescriptorWriter;
use frame_rhi::descriptor_allocator::DescriptorAllocator;
use frame_rhi::device::Device;
use frame_rhi::image::{DEPTH_FORMAT, DRAW_IMAGE_FORMAT};
use frame_rhi::pipeline::{
    Blending, GraphicsPipelineBuilder, Pipeline, PipelineLayout, push_constant_range,
};
use frame_rhi::shader::{Shader, ShaderStage};
use frame_scene::{MaterialId, MaterialInstance, MaterialPass, MaterialPipeline};

use crate::draw_list::GpuDrawPushConstants;
use crate::error::RendererResult;

const MESH_VERTEX_SHADER: &str = "mesh.vert.spv";
const MESH_FRAGMENT_SHADER: &str = "mesh.frag.spv";

/// Blending and depth write used for a pass.
///
/// Transparent surfaces add onto what is behind them and leave depth
/// untouched; everything else is opaque.
pub fn pass_state(pass: MaterialPass) -> (Blending, bool) {
    match pass {
        MaterialPass::Transparent => (Blending::Additive, false),
        MaterialPass::MainColor | MaterialPass::Other => (Blending::Disabled, true),
    }
}

/// Owns the mesh pipelines and hands out [`MaterialInstance`]s.
pub struct MaterialFactory {
    opaque: Pipeline,
    transparent: Pipeline,
    layout: PipelineLayout,
    material_layout: vk::DescriptorSetLayout,
    next_id: u32,
}

impl MaterialFactory {
    /// Builds the opaque and transparent mesh pipelines.
    ///
    /// Set 0 is the per-frame scene data, set 1 the material's texture.
    ///
    /// # Errors
    ///
    /// Returns an error if a shader cannot be loaded or a pipeline cannot
    /// be created.
    pub fn new(
        device: &Arc<Device>,
        scene_layout: vk::DescriptorSetLayout,
        material_layout: vk::DescriptorSetLayout,
        shader_dir: &Path,
    ) -> RendererResult<Self> {
        let vertex = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join(MESH_VERTEX_SHADER),
            ShaderStage::Vertex,
        )?;
        let fragment = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join(MESH_FRAGMENT_SHADER),
            ShaderStage::Fragment,
        )?;

        let layout = PipelineLayout::new(
            device.clone(),
            &[scene_layout, material_layout],
            &[push_constant_range::<GpuDrawPushConstants>(
                vk::ShaderStageFlags::VERTEX,
            )],
        )?;

        let build = |pass: MaterialPass| {
            let (blending, write_depth) = pass_state(pass);
            GraphicsPipelineBuilder::new(&vertex, &fragment)
                .cull_mode(vk::CullModeFlags::NONE, vk::FrontFace::CLOCKWISE)
                .depth_test(write_depth, vk::CompareOp::GREATER_OR_EQUAL)
                .blending(blending)
                .color_attachment_format(DRAW_IMAGE_FORMAT)
                .depth_attachment_format(DEPTH_FORMAT)
                .build(device.clone(), &layout)
        };

        let opaque = build(MaterialPass::MainColor)?;
        let transparent = build(MaterialPass::Transparent)?;

        info!("Mesh pipelines created");

        Ok(Self {
            opaque,
            transparent,
            layout,
            material_layout,
            next_id: 1,
        })
    }

    pub fn pipeline_for(&self, pass: MaterialPass) -> MaterialPipeline {
        let pipeline = match pass {
            MaterialPass::Transparent => &self.transparent,
            MaterialPass::MainColor | MaterialPass::Other => &self.opaque,
        };
        MaterialPipeline {
            pipeline: pipeline.handle(),
            layout: self.layout.handle(),
        }
    }

    /// Allocates and writes a material set sampling `image` and returns a
    /// new instance with its own id.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor set cannot be allocated.
    pub fn write_material(
        &mut self,
        device: &Device,
        pass: MaterialPass,
        image: vk::ImageView,
        sampler: vk::Sampler,
        descriptors: &mut DescriptorAllocator,
    ) -> RendererResult<Arc<MaterialInstance>> {
        let material_set = descriptors.allocate(self.material_layout)?;

        let mut writer = DescriptorWriter::new();
        writer.write_image(
            0,
            image,
            sampler,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        );
        writer.update_set(device, material_set);

        let id = MaterialId(self.next_id);
        self.next_id += 1;
        debug!("Material {:?} written for {:?} pass", id, pass);

        Ok(Arc::new(MaterialInstance {
            id,
            pass,
            pipeline: self.pipeline_for(pass),
            material_set,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparent_blends_without_depth_write() {
        assert_eq!(pass_state(MaterialPass::Transparent), (Blending::Additive, false));
        assert_eq!(pass_state(MaterialPass::MainColor), (Blending::Disabled, true));
        assert_eq!(pass_state(MaterialPass::Other), (Blending::Disabled, true));
    }
}
