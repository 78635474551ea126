//! Hook for UI drawn over the final image.

use ash::vk;

/// Records UI draws into the frame's command buffer.
///
/// Called inside dynamic rendering on the swapchain image, which is in
/// `COLOR_ATTACHMENT_OPTIMAL` and already holds the scene.
pub trait UiOverlay {
    fn record(&mut self, cmd: vk::CommandBuffer, target: vk::ImageView, extent: vk::Extent2D);
}

/// Overlay that draws nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOverlay;

impl UiOverlay for NoOverlay {
    fn record(&mut self, _cmd: vk::CommandBuffer, _target: vk::ImageView, _extent: vk::Extent2D) {}
}
