//! Dynamic rendering helpers (Vulkan 1.3).
//!
//! - [`ColorAttachment`] - a color target, loaded or cleared
//! - [`DepthAttachment`] - a depth target, cleared to a reversed-Z far value by default
//! - [`RenderingConfig`] - render area plus attachments, built into a
//!   [`RenderingInfoBundle`] that owns the attachment infos
//!
//! # Example
//!
//! ```no_run
//! use ash::vk;
//! use frame_rhi::command::CommandBuffer;
//! use frame_rhi::rendering::{ColorAttachment, DepthAttachment, RenderingConfig};
//!
//! # fn example(color: vk::ImageView, depth: vk::ImageView, cmd: &CommandBuffer) {
//! let bundle = RenderingConfig::new(vk::Extent2D { width: 800, height: 600 })
//!     .with_color_attachment(ColorAttachment::new(color))
//!     .with_depth_attachment(DepthAttachment::new(depth))
//!     .build();
//!
//! cmd.begin_rendering(&bundle.info());
//! // ... draw commands ...
//! cmd.end_rendering();
//! # }
//! ```

use ash::vk;

/// Color attachment for dynamic rendering.
///
/// Defaults to loading the existing contents, since every color pass in the
/// frame draws over what the previous pass produced.
#[derive(Clone, Copy, Debug)]
pub struct ColorAttachment {
    image_view: vk::ImageView,
    layout: vk::ImageLayout,
    clear: Option<[f32; 4]>,
}

impl ColorAttachment {
    pub fn new(image_view: vk::ImageView) -> Self {
        Self {
            image_view,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            clear: None,
        }
    }

    /// Clears to `color` instead of loading.
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear = Some(color);
        self
    }

    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }

    pub fn load_op(&self) -> vk::AttachmentLoadOp {
        if self.clear.is_some() {
            vk::AttachmentLoadOp::CLEAR
        } else {
            vk::AttachmentLoadOp::LOAD
        }
    }

    pub fn to_rendering_attachment_info(&self) -> vk::RenderingAttachmentInfo<'static> {
        let mut info = vk::RenderingAttachmentInfo::default()
            .image_view(self.image_view)
            .image_layout(self.layout)
            .load_op(self.load_op())
            .store_op(vk::AttachmentStoreOp::STORE);

        if let Some(float32) = self.clear {
            info = info.clear_value(vk::ClearValue {
                color: vk::ClearColorValue { float32 },
            });
        }

        info
    }
}

/// Depth attachment for dynamic rendering.
#[derive(Clone, Copy, Debug)]
pub struct DepthAttachment {
    image_view: vk::ImageView,
    clear_depth: f32,
}

impl DepthAttachment {
    /// Cleared to 0.0, the far plane under reversed-Z.
    pub fn new(image_view: vk::ImageView) -> Self {
        Self {
            image_view,
            clear_depth: 0.0,
        }
    }

    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }

    pub fn clear_depth(&self) -> f32 {
        self.clear_depth
    }

    pub fn to_rendering_attachment_info(&self) -> vk::RenderingAttachmentInfo<'static> {
        vk::RenderingAttachmentInfo::default()
            .image_view(self.image_view)
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: self.clear_depth,
                    stencil: 0,
                },
            })
    }
}

/// Render area and attachments for one `vkCmdBeginRendering`.
#[derive(Clone, Debug)]
pub struct RenderingConfig {
    pub render_area: vk::Rect2D,
    pub color_attachments: Vec<ColorAttachment>,
    pub depth_attachment: Option<DepthAttachment>,
}

impl RenderingConfig {
    pub fn new(extent: vk::Extent2D) -> Self {
        Self {
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            color_attachments: Vec::new(),
            depth_attachment: None,
        }
    }

    pub fn with_color_attachment(mut self, attachment: ColorAttachment) -> Self {
        self.color_attachments.push(attachment);
        self
    }

    pub fn with_depth_attachment(mut self, attachment: DepthAttachment) -> Self {
        self.depth_attachment = Some(attachment);
        self
    }

    pub fn build(&self) -> RenderingInfoBundle {
        RenderingInfoBundle {
            color_attachments: self
                .color_attachments
                .iter()
                .map(ColorAttachment::to_rendering_attachment_info)
                .collect(),
            depth_attachment: self
                .depth_attachment
                .as_ref()
                .map(DepthAttachment::to_rendering_attachment_info),
            render_area: self.render_area,
        }
    }
}

/// Owns the attachment infos a `vk::RenderingInfo` points at.
pub struct RenderingInfoBundle {
    color_attachments: Vec<vk::RenderingAttachmentInfo<'static>>,
    depth_attachment: Option<vk::RenderingAttachmentInfo<'static>>,
    render_area: vk::Rect2D,
}

impl RenderingInfoBundle {
    /// `VkRenderingInfo` borrowing this bundle's attachments.
    pub fn info(&self) -> vk::RenderingInfo<'_> {
        let mut info = vk::RenderingInfo::default()
            .render_area(self.render_area)
            .layer_count(1)
            .color_attachments(&self.color_attachments);

        if let Some(ref depth) = self.depth_attachment {
            info = info.depth_attachment(depth);
        }

        info
    }

    pub fn render_area(&self) -> vk::Rect2D {
        self.render_area
    }
}
