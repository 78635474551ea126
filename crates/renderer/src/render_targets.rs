//! Offscreen images the frame renders into before the blit.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use frame_rhi::device::Device;
use frame_rhi::image::{AllocatedImage, DEPTH_FORMAT, DRAW_IMAGE_FORMAT, draw_image_usage};
use frame_rhi::RhiResult;

/// HDR color target and its matching depth buffer.
pub struct RenderTargets {
    pub draw_image: AllocatedImage,
    pub depth_image: AllocatedImage,
}

impl RenderTargets {
    /// # Errors
    ///
    /// Returns an error if either image cannot be created.
    pub fn new(device: &Arc<Device>, extent: vk::Extent2D) -> RhiResult<Self> {
        let extent3d = vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        };

        let draw_image = AllocatedImage::new(
            device.clone(),
            "draw image",
            extent3d,
            DRAW_IMAGE_FORMAT,
            draw_image_usage(),
        )?;
        let depth_image = AllocatedImage::new(
            device.clone(),
            "depth image",
            extent3d,
            DEPTH_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;

        debug!("Render targets created at {}x{}", extent.width, extent.height);

        Ok(Self {
            draw_image,
            depth_image,
        })
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.draw_image.extent_2d()
    }
}

/// Region of the draw image rendered this frame: the smaller of the
/// swapchain and draw image, scaled by `render_scale`.
pub fn draw_extent(
    swapchain: vk::Extent2D,
    draw_image: vk::Extent2D,
    render_scale: f32,
) -> vk::Extent2D {
    let scale = |a: u32, b: u32| (a.min(b) as f32 * render_scale) as u32;
    vk::Extent2D {
        width: scale(swapchain.width, draw_image.width),
        height: scale(swapchain.height, draw_image.height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn test_full_scale_uses_smaller_image() {
        assert_eq!(draw_extent(extent(1700, 900), extent(1700, 900), 1.0), extent(1700, 900));
        assert_eq!(draw_extent(extent(800, 1000), extent(1700, 900), 1.0), extent(800, 900));
    }

    #[test]
    fn test_scale_truncates() {
        assert_eq!(draw_extent(extent(1700, 900), extent(1700, 900), 0.5), extent(850, 450));
        assert_eq!(draw_extent(extent(101, 101), extent(200, 200), 0.3), extent(30, 30));
    }
}
