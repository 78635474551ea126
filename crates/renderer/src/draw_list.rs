//! Per-frame draw list: culling, sorting and minimal-rebind submission.
//!
//! Opaque items are frustum culled and sorted by material, then index
//! buffer, so consecutive draws share as much bound state as possible.
//! Transparent items keep traversal order and are drawn after every
//! opaque item.

use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use frame_scene::{DrawContext, MaterialInstance, RenderObject};

use crate::recorder::CommandRecorder;

/// Per-draw push constants read by the mesh vertex shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuDrawPushConstants {
    pub world_matrix: [[f32; 4]; 4],
    /// Device address of the mesh's vertex buffer.
    pub vertex_buffer: vk::DeviceAddress,
}

impl GpuDrawPushConstants {
    pub fn new(world_matrix: Mat4, vertex_buffer: vk::DeviceAddress) -> Self {
        Self {
            world_matrix: world_matrix.to_cols_array_2d(),
            vertex_buffer,
        }
    }
}

/// Counters from recording one draw list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub draw_calls: u32,
    pub triangles: u32,
}

/// Whether any part of `object`'s bounds may fall inside the clip volume.
///
/// Projects the eight corners of the local-space box and tests their
/// screen-space bounding box against `[-1, 1]` in x and y and `[0, 1]` in z.
pub fn is_visible(object: &RenderObject, view_proj: &Mat4) -> bool {
    let matrix = *view_proj * object.transform;
    let bounds = &object.bounds;

    let mut min = Vec3::splat(1.5);
    let mut max = Vec3::splat(-1.5);

    for corner in bounds.corners() {
        let clip = matrix * corner.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        min = min.min(ndc);
        max = max.max(ndc);
    }

    !(min.z > 1.0 || max.z < 0.0 || min.x > 1.0 || max.x < -1.0 || min.y > 1.0 || max.y < -1.0)
}

/// Culled, sorted order of a frame's opaque surfaces.
#[derive(Debug, Default)]
pub struct DrawList {
    opaque_order: Vec<usize>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Culls and sorts the opaque surfaces of `ctx`.
    pub fn prepare(&mut self, ctx: &DrawContext, view_proj: &Mat4) {
        let opaque = &ctx.opaque_surfaces;

        self.opaque_order.clear();
        self.opaque_order.extend(
            opaque
                .iter()
                .enumerate()
                .filter(|(_, object)| is_visible(object, view_proj))
                .map(|(index, _)| index),
        );

        // Stable: equal keys keep traversal order.
        self.opaque_order.sort_by_key(|&index| {
            let object = &opaque[index];
            (object.material.id, object.index_buffer.as_raw())
        });
    }

    /// Indices into `opaque_surfaces`, in submission order.
    pub fn opaque_order(&self) -> &[usize] {
        &self.opaque_order
    }

    /// Records the prepared opaque items, then every transparent item.
    ///
    /// `scene_set` is bound at set 0 whenever the pipeline changes; each
    /// material's own set goes to set 1.
    pub fn record<R: CommandRecorder>(
        &self,
        cmd: &mut R,
        ctx: &DrawContext,
        scene_set: vk::DescriptorSet,
        extent: vk::Extent2D,
    ) -> DrawStats {
        let mut state = BindState::default();
        let mut stats = DrawStats::default();

        let opaque = self
            .opaque_order
            .iter()
            .map(|&index| &ctx.opaque_surfaces[index]);

        for object in opaque.chain(ctx.transparent_surfaces.iter()) {
            state.draw(cmd, object, scene_set, extent);
            stats.draw_calls += 1;
            stats.triangles += object.triangle_count();
        }

        stats
    }
}

/// State bound by the previous draw.
#[derive(Default)]
struct BindState {
    material: Option<Arc<MaterialInstance>>,
    pipeline: Option<vk::Pipeline>,
    index_buffer: Option<vk::Buffer>,
}

impl BindState {
    fn draw<R: CommandRecorder>(
        &mut self,
        cmd: &mut R,
        object: &RenderObject,
        scene_set: vk::DescriptorSet,
        extent: vk::Extent2D,
    ) {
        let material = &object.material;
        let layout = material.pipeline.layout;

        let same_material = self
            .material
            .as_ref()
            .is_some_and(|last| Arc::ptr_eq(last, material));

        if !same_material {
            if self.pipeline != Some(material.pipeline.pipeline) {
                cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, material.pipeline.pipeline);
                cmd.bind_descriptor_sets(vk::PipelineBindPoint::GRAPHICS, layout, 0, &[scene_set]);
                cmd.set_viewport(&viewport(extent));
                cmd.set_scissor(&vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                });
                self.pipeline = Some(material.pipeline.pipeline);
            }

            cmd.bind_descriptor_sets(
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                1,
                &[material.material_set],
            );
            self.material = Some(Arc::clone(material));
        }

        if self.index_buffer != Some(object.index_buffer) {
            cmd.bind_index_buffer(object.index_buffer);
            self.index_buffer = Some(object.index_buffer);
        }

        let push = GpuDrawPushConstants::new(object.transform, object.vertex_buffer_address);
        cmd.push_constants(layout, vk::ShaderStageFlags::VERTEX, bytemuck::bytes_of(&push));
        cmd.draw_indexed(object.index_count, object.first_index);
    }
}

fn viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}
