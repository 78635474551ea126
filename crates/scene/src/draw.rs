//! Per-frame draw items and the traversal contract.

use std::sync::Arc;

use frame_rhi::vk;
use glam::Mat4;

use crate::bounds::Bounds;
use crate::material::{MaterialInstance, MaterialPass};
use crate::mesh::{GeoSurface, MeshAsset};

/// One indexed draw, produced by traversal and consumed the same frame.
#[derive(Clone, Debug)]
pub struct RenderObject {
    pub index_count: u32,
    pub first_index: u32,
    /// Non-owning; the mesh keeps the buffer alive.
    pub index_buffer: vk::Buffer,
    pub material: Arc<MaterialInstance>,
    pub bounds: Bounds,
    pub transform: Mat4,
    pub vertex_buffer_address: vk::DeviceAddress,
}

impl RenderObject {
    pub fn from_surface(mesh: &MeshAsset, surface: &GeoSurface, transform: Mat4) -> Self {
        Self {
            index_count: surface.count,
            first_index: surface.start_index,
            index_buffer: mesh.index_buffer(),
            material: Arc::clone(&surface.material),
            bounds: surface.bounds,
            transform,
            vertex_buffer_address: mesh.vertex_buffer_address(),
        }
    }

    #[inline]
    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }
}

/// Draw items for one frame, split by pass.
#[derive(Debug, Default)]
pub struct DrawContext {
    pub opaque_surfaces: Vec<RenderObject>,
    pub transparent_surfaces: Vec<RenderObject>,
}

impl DrawContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `object` by its material pass. Anything not transparent is
    /// drawn with the opaque items.
    pub fn push(&mut self, object: RenderObject) {
        match object.material.pass {
            MaterialPass::Transparent => self.transparent_surfaces.push(object),
            MaterialPass::MainColor | MaterialPass::Other => self.opaque_surfaces.push(object),
        }
    }

    pub fn clear(&mut self) {
        self.opaque_surfaces.clear();
        self.transparent_surfaces.clear();
    }

    pub fn len(&self) -> usize {
        self.opaque_surfaces.len() + self.transparent_surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Anything that can append draw items for the current frame.
pub trait Renderable {
    /// Appends this object's draws to `ctx`, with every transform
    /// premultiplied by `top`.
    fn draw(&mut self, top: &Mat4, ctx: &mut DrawContext);
}
