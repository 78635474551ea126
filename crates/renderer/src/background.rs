//! Procedural background drawn by compute shaders.
//!
//! Every effect shares one pipeline layout: the draw image as a storage
//! image at set 0 and four vec4 of push constants the shader interprets
//! freely.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use tracing::info;

use frame_rhi::device::Device;
use frame_rhi::pipeline::{Pipeline, PipelineLayout, push_constant_range};
use frame_rhi::shader::{Shader, ShaderStage};

use crate::error::RendererResult;
use crate::recorder::CommandRecorder;

/// Local workgroup size of the effect shaders in x and y.
pub const WORKGROUP_SIZE: u32 = 16;

/// Effect parameters pushed to the compute shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ComputePushConstants {
    pub data1: [f32; 4],
    pub data2: [f32; 4],
    pub data3: [f32; 4],
    pub data4: [f32; 4],
}

/// A named effect and its editable parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectParams {
    pub name: &'static str,
    /// SPIR-V file name under the shader directory.
    pub shader: &'static str,
    pub data: ComputePushConstants,
}

/// Gradient, sky and grid, in selection order.
pub fn default_effects() -> Vec<EffectParams> {
    vec![
        EffectParams {
            name: "gradient",
            shader: "gradient_color.spv",
            data: ComputePushConstants {
                data1: [1.0, 0.0, 0.0, 1.0],
                data2: [0.0, 0.0, 1.0, 1.0],
                ..Default::default()
            },
        },
        EffectParams {
            name: "sky",
            shader: "sky.spv",
            data: ComputePushConstants {
                data1: [0.1, 0.2, 0.4, 0.97],
                ..Default::default()
            },
        },
        EffectParams {
            name: "grid",
            shader: "grid.spv",
            data: ComputePushConstants {
                data1: [1.0, 1.0, 1.0, 1.0],
                data2: [0.0, 0.0, 0.0, 1.0],
                data3: [0.0, 0.0, 0.0, 1.0],
                ..Default::default()
            },
        },
    ]
}

/// Workgroups covering `extent`.
pub fn dispatch_size(extent: vk::Extent2D) -> (u32, u32) {
    (
        extent.width.div_ceil(WORKGROUP_SIZE),
        extent.height.div_ceil(WORKGROUP_SIZE),
    )
}

/// `params` with the cursor's workgroup cell written to `data3.xy`.
pub fn with_cursor(params: &ComputePushConstants, mouse: Vec2) -> ComputePushConstants {
    let mut data = *params;
    let cell = (mouse / WORKGROUP_SIZE as f32).floor();
    data.data3[0] = cell.x;
    data.data3[1] = cell.y;
    data
}

/// Binds an effect and dispatches it over `extent`.
pub fn record_dispatch<R: CommandRecorder>(
    cmd: &mut R,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    draw_image_set: vk::DescriptorSet,
    extent: vk::Extent2D,
    push: &ComputePushConstants,
) {
    cmd.bind_pipeline(vk::PipelineBindPoint::COMPUTE, pipeline);
    cmd.bind_descriptor_sets(vk::PipelineBindPoint::COMPUTE, layout, 0, &[draw_image_set]);
    cmd.push_constants(layout, vk::ShaderStageFlags::COMPUTE, bytemuck::bytes_of(push));

    let (x, y) = dispatch_size(extent);
    cmd.dispatch(x, y, 1);
}

struct ComputeEffect {
    params: EffectParams,
    pipeline: Pipeline,
}

/// The loaded background effects.
pub struct BackgroundEffects {
    // Pipelines are declared before the layout they were built with.
    effects: Vec<ComputeEffect>,
    layout: PipelineLayout,
}

impl BackgroundEffects {
    /// Builds a pipeline for each of [`default_effects`].
    ///
    /// # Errors
    ///
    /// Returns an error if a shader file is missing or invalid, or pipeline
    /// creation fails. Pipelines built before the failure are destroyed.
    pub fn new(
        device: &Arc<Device>,
        draw_image_layout: vk::DescriptorSetLayout,
        shader_dir: &Path,
    ) -> RendererResult<Self> {
        let layout = PipelineLayout::new(
            device.clone(),
            &[draw_image_layout],
            &[push_constant_range::<ComputePushConstants>(
                vk::ShaderStageFlags::COMPUTE,
            )],
        )?;

        let mut effects = Vec::new();
        for params in default_effects() {
            let shader = Shader::from_spirv_file(
                device.clone(),
                &shader_dir.join(params.shader),
                ShaderStage::Compute,
            )?;
            let pipeline = Pipeline::compute(device.clone(), &shader, &layout)?;
            effects.push(ComputeEffect { params, pipeline });
        }

        info!("Loaded {} background effects", effects.len());

        Ok(Self { effects, layout })
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Clamps `index` to an existing effect.
    pub fn clamp_index(&self, index: usize) -> usize {
        index.min(self.effects.len().saturating_sub(1))
    }

    pub fn params(&self, index: usize) -> Option<&EffectParams> {
        self.effects.get(index).map(|e| &e.params)
    }

    /// Parameters of effect `index`, editable between frames.
    pub fn params_mut(&mut self, index: usize) -> Option<&mut EffectParams> {
        self.effects.get_mut(index).map(|e| &mut e.params)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.effects.iter().map(|e| e.params.name)
    }

    /// Records effect `index` (clamped) over `extent` of the draw image.
    pub fn record<R: CommandRecorder>(
        &self,
        cmd: &mut R,
        index: usize,
        draw_image_set: vk::DescriptorSet,
        extent: vk::Extent2D,
        mouse: Vec2,
    ) {
        let Some(effect) = self.effects.get(self.clamp_index(index)) else {
            return;
        };

        record_dispatch(
            cmd,
            effect.pipeline.handle(),
            self.layout.handle(),
            draw_image_set,
            extent,
            &with_cursor(&effect.params.data, mouse),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::{CommandLog, RecordedCommand};
    use ash::vk::Handle;

    #[test]
    fn test_push_constants_are_four_vec4() {
        assert_eq!(std::mem::size_of::<ComputePushConstants>(), 64);
    }

    #[test]
    fn test_default_effects() {
        let effects = default_effects();
        let names: Vec<_> = effects.iter().map(|e| e.name).collect();
        assert_eq!(names, ["gradient", "sky", "grid"]);
        assert_eq!(effects[0].data.data2, [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(effects[1].data.data1, [0.1, 0.2, 0.4, 0.97]);
        assert_eq!(effects[2].data.data3, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_dispatch_size_rounds_up() {
        let size = |width, height| dispatch_size(vk::Extent2D { width, height });
        assert_eq!(size(1700, 900), (107, 57));
        assert_eq!(size(16, 16), (1, 1));
        assert_eq!(size(17, 1), (2, 1));
        assert_eq!(size(0, 0), (0, 0));
    }

    #[test]
    fn test_cursor_cell_goes_to_data3() {
        let params = default_effects()[2].data;
        let pushed = with_cursor(&params, Vec2::new(40.0, 15.9));
        assert_eq!(pushed.data3, [2.0, 0.0, 0.0, 1.0]);
        assert_eq!(pushed.data1, params.data1);
    }

    #[test]
    fn test_record_dispatch_sequence() {
        let pipeline = vk::Pipeline::from_raw(1);
        let layout = vk::PipelineLayout::from_raw(2);
        let set = vk::DescriptorSet::from_raw(3);
        let push = ComputePushConstants::default();

        let mut log = CommandLog::new();
        record_dispatch(
            &mut log,
            pipeline,
            layout,
            set,
            vk::Extent2D {
                width: 100,
                height: 50,
            },
            &push,
        );

        assert_eq!(
            log.commands,
            vec![
                RecordedCommand::BindPipeline(vk::PipelineBindPoint::COMPUTE, pipeline),
                RecordedCommand::BindDescriptorSets {
                    bind_point: vk::PipelineBindPoint::COMPUTE,
                    layout,
                    first_set: 0,
                    sets: vec![set],
                },
                RecordedCommand::PushConstants {
                    layout,
                    stages: vk::ShaderStageFlags::COMPUTE,
                    data: vec![0; 64],
                },
                RecordedCommand::Dispatch(7, 4, 1),
            ]
        );
    }
}
