//! GPU-resident meshes and their surfaces.

use std::sync::Arc;

use frame_rhi::buffer::Buffer;
use frame_rhi::vk;

use crate::bounds::Bounds;
use crate::material::MaterialInstance;

/// Index and vertex buffers of an uploaded mesh.
pub struct GpuMeshBuffers {
    pub index_buffer: Buffer,
    pub vertex_buffer: Buffer,
    pub vertex_buffer_address: vk::DeviceAddress,
}

/// A range of a mesh's index buffer drawn with one material.
#[derive(Clone, Debug)]
pub struct GeoSurface {
    pub start_index: u32,
    pub count: u32,
    pub bounds: Bounds,
    pub material: Arc<MaterialInstance>,
}

/// Named mesh made of one or more surfaces sharing its buffers.
pub struct MeshAsset {
    pub name: String,
    pub surfaces: Vec<GeoSurface>,
    index_buffer: vk::Buffer,
    vertex_buffer_address: vk::DeviceAddress,
    // Keeps the buffers alive for as long as the mesh is.
    _buffers: Option<GpuMeshBuffers>,
}

impl MeshAsset {
    /// Mesh owning its uploaded buffers.
    pub fn new(name: impl Into<String>, surfaces: Vec<GeoSurface>, buffers: GpuMeshBuffers) -> Self {
        Self {
            name: name.into(),
            surfaces,
            index_buffer: buffers.index_buffer.handle(),
            vertex_buffer_address: buffers.vertex_buffer_address,
            _buffers: Some(buffers),
        }
    }

    /// Mesh over buffers owned elsewhere, which must outlive it.
    pub fn from_handles(
        name: impl Into<String>,
        surfaces: Vec<GeoSurface>,
        index_buffer: vk::Buffer,
        vertex_buffer_address: vk::DeviceAddress,
    ) -> Self {
        Self {
            name: name.into(),
            surfaces,
            index_buffer,
            vertex_buffer_address,
            _buffers: None,
        }
    }

    #[inline]
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer
    }

    #[inline]
    pub fn vertex_buffer_address(&self) -> vk::DeviceAddress {
        self.vertex_buffer_address
    }

    pub fn index_count(&self) -> u32 {
        self.surfaces.iter().map(|s| s.count).sum()
    }
}

impl std::fmt::Debug for MeshAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshAsset")
            .field("name", &self.name)
            .field("surfaces", &self.surfaces.len())
            .field("index_buffer", &self.index_buffer)
            .finish()
    }
}
