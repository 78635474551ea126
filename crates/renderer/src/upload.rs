//! Staging uploads into GPU-only memory.
//!
//! Both helpers block on [`ImmediateSubmit`] and drop their staging buffer
//! before returning.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use frame_rhi::buffer::{Buffer, BufferUsage};
use frame_rhi::device::Device;
use frame_rhi::image::AllocatedImage;
use frame_rhi::vertex::Vertex;
use frame_scene::GpuMeshBuffers;

use crate::error::{RendererError, RendererResult};
use crate::immediate::ImmediateSubmit;

/// Bytes per texel of the formats accepted by [`create_image_with_data`].
pub const TEXEL_SIZE: u64 = 4;

/// Copy regions for one staging buffer holding the vertices followed by
/// the indices: `(vertex copy, index copy)`.
pub fn staging_regions(vertex_bytes: u64, index_bytes: u64) -> (vk::BufferCopy, vk::BufferCopy) {
    let vertex_copy = vk::BufferCopy {
        src_offset: 0,
        dst_offset: 0,
        size: vertex_bytes,
    };
    let index_copy = vk::BufferCopy {
        src_offset: vertex_bytes,
        dst_offset: 0,
        size: index_bytes,
    };
    (vertex_copy, index_copy)
}

/// Uploads a mesh into GPU-only vertex and index buffers.
///
/// The vertex buffer is read in the shader through its device address.
///
/// # Errors
///
/// Returns [`RendererError::Asset`] for an empty mesh, or any error from
/// allocation or the submission.
pub fn upload_mesh(
    device: &Arc<Device>,
    immediate: &ImmediateSubmit,
    indices: &[u32],
    vertices: &[Vertex],
) -> RendererResult<GpuMeshBuffers> {
    if indices.is_empty() || vertices.is_empty() {
        return Err(RendererError::Asset(format!(
            "mesh needs vertices and indices, got {} and {}",
            vertices.len(),
            indices.len()
        )));
    }

    let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
    let index_bytes: &[u8] = bytemuck::cast_slice(indices);

    let vertex_buffer = Buffer::new(
        device.clone(),
        BufferUsage::MeshVertex,
        vertex_bytes.len() as vk::DeviceSize,
    )?;
    let index_buffer = Buffer::new(
        device.clone(),
        BufferUsage::MeshIndex,
        index_bytes.len() as vk::DeviceSize,
    )?;
    let vertex_buffer_address = vertex_buffer.device_address();

    let staging = Buffer::new(
        device.clone(),
        BufferUsage::Staging,
        (vertex_bytes.len() + index_bytes.len()) as vk::DeviceSize,
    )?;
    staging.write_data(0, vertex_bytes)?;
    staging.write_data(vertex_bytes.len() as vk::DeviceSize, index_bytes)?;

    let (vertex_copy, index_copy) =
        staging_regions(vertex_bytes.len() as u64, index_bytes.len() as u64);

    immediate.run(|cmd| {
        cmd.copy_buffer(staging.handle(), vertex_buffer.handle(), &[vertex_copy]);
        cmd.copy_buffer(staging.handle(), index_buffer.handle(), &[index_copy]);
    })?;

    debug!(
        "Uploaded mesh: {} vertices, {} indices",
        vertices.len(),
        indices.len()
    );

    Ok(GpuMeshBuffers {
        index_buffer,
        vertex_buffer,
        vertex_buffer_address,
    })
}

/// Creates a sampled image and fills it with tightly packed texels.
///
/// The image ends in `SHADER_READ_ONLY_OPTIMAL`.
///
/// # Errors
///
/// Returns [`RendererError::Asset`] if `data` does not match `extent`, or
/// any error from allocation or the submission.
pub fn create_image_with_data(
    device: &Arc<Device>,
    immediate: &ImmediateSubmit,
    name: &str,
    data: &[u8],
    extent: vk::Extent3D,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
) -> RendererResult<AllocatedImage> {
    let expected = u64::from(extent.width)
        * u64::from(extent.height)
        * u64::from(extent.depth)
        * TEXEL_SIZE;
    if data.len() as u64 != expected {
        return Err(RendererError::Asset(format!(
            "image '{}' expects {} bytes, got {}",
            name,
            expected,
            data.len()
        )));
    }

    let staging = Buffer::new_with_data(device.clone(), BufferUsage::Staging, data)?;
    let image = AllocatedImage::new(
        device.clone(),
        name,
        extent,
        format,
        usage | vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::TRANSFER_SRC,
    )?;

    immediate.run(|cmd| {
        cmd.transition_image(
            image.handle(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        cmd.copy_buffer_to_image(staging.handle(), image.handle(), extent);
        cmd.transition_image(
            image.handle(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
    })?;

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_follow_vertices_in_staging() {
        let vertex_bytes = 4 * std::mem::size_of::<Vertex>() as u64;
        let index_bytes = 6 * 4;
        let (vertices, indices) = staging_regions(vertex_bytes, index_bytes);

        assert_eq!((vertices.src_offset, vertices.dst_offset), (0, 0));
        assert_eq!(vertices.size, 192);
        assert_eq!(indices.src_offset, 192);
        assert_eq!(indices.dst_offset, 0);
        assert_eq!(indices.size, 24);
    }
}
