//! Fixed pass sequence for one frame.
//!
//! ```text
//! draw image:  UNDEFINED -> GENERAL            background (compute)
//!              GENERAL -> COLOR_ATTACHMENT     geometry (opaque, transparent)
//! depth image: UNDEFINED -> DEPTH_ATTACHMENT
//! draw image:  COLOR_ATTACHMENT -> TRANSFER_SRC
//! swapchain:   UNDEFINED -> TRANSFER_DST       blit draw extent -> swapchain extent
//!              TRANSFER_DST -> COLOR_ATTACHMENT overlay
//!              COLOR_ATTACHMENT -> PRESENT_SRC
//! ```
//!
//! The sequencer owns the barriers and attachment setup; what each pass
//! records is supplied through [`PassRecorder`].

use ash::vk;

use frame_rhi::rendering::{ColorAttachment, DepthAttachment, RenderingConfig};

use crate::recorder::CommandRecorder;

/// Passes in recording order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pass {
    Background,
    Geometry,
    Blit,
    Overlay,
}

pub const PASS_ORDER: [Pass; 4] = [Pass::Background, Pass::Geometry, Pass::Blit, Pass::Overlay];

/// Images and extents the frame renders into.
#[derive(Clone, Copy, Debug)]
pub struct FrameTargets {
    pub draw_image: vk::Image,
    pub draw_view: vk::ImageView,
    pub depth_image: vk::Image,
    pub depth_view: vk::ImageView,
    /// Region of the draw image rendered this frame.
    pub draw_extent: vk::Extent2D,
    pub swapchain_image: vk::Image,
    pub swapchain_view: vk::ImageView,
    pub swapchain_extent: vk::Extent2D,
}

/// Contents of the passes that record more than barriers.
pub trait PassRecorder<R: CommandRecorder> {
    /// Draw image in `GENERAL`.
    fn background(&mut self, cmd: &mut R, targets: &FrameTargets);

    /// Inside dynamic rendering on the draw and depth images.
    fn geometry(&mut self, cmd: &mut R, targets: &FrameTargets);

    /// Inside dynamic rendering on the swapchain image.
    fn overlay(&mut self, cmd: &mut R, targets: &FrameTargets);
}

/// Records every pass of a frame in [`PASS_ORDER`], leaving the swapchain
/// image ready to present.
pub fn record_frame<R, P>(cmd: &mut R, targets: &FrameTargets, passes: &mut P)
where
    R: CommandRecorder,
    P: PassRecorder<R>,
{
    for pass in PASS_ORDER {
        match pass {
            Pass::Background => {
                cmd.transition_image(
                    targets.draw_image,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::GENERAL,
                );
                passes.background(cmd, targets);
            }
            Pass::Geometry => {
                cmd.transition_image(
                    targets.draw_image,
                    vk::ImageLayout::GENERAL,
                    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                );
                cmd.transition_image(
                    targets.depth_image,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
                );

                let rendering = RenderingConfig::new(targets.draw_extent)
                    .with_color_attachment(ColorAttachment::new(targets.draw_view))
                    .with_depth_attachment(DepthAttachment::new(targets.depth_view));
                cmd.begin_rendering(&rendering);
                passes.geometry(cmd, targets);
                cmd.end_rendering();
            }
            Pass::Blit => {
                cmd.transition_image(
                    targets.draw_image,
                    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                );
                cmd.transition_image(
                    targets.swapchain_image,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                );
                cmd.blit_image(
                    targets.draw_image,
                    targets.swapchain_image,
                    targets.draw_extent,
                    targets.swapchain_extent,
                );
            }
            Pass::Overlay => {
                cmd.transition_image(
                    targets.swapchain_image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                );

                let rendering = RenderingConfig::new(targets.swapchain_extent)
                    .with_color_attachment(ColorAttachment::new(targets.swapchain_view));
                cmd.begin_rendering(&rendering);
                passes.overlay(cmd, targets);
                cmd.end_rendering();

                cmd.transition_image(
                    targets.swapchain_image,
                    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                    vk::ImageLayout::PRESENT_SRC_KHR,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::{CommandLog, RecordedCommand};
    use ash::vk::Handle;

    struct Markers;

    // Each pass leaves a dispatch whose x identifies it.
    impl PassRecorder<CommandLog> for Markers {
        fn background(&mut self, cmd: &mut CommandLog, _targets: &FrameTargets) {
            cmd.dispatch(1, 0, 0);
        }

        fn geometry(&mut self, cmd: &mut CommandLog, _targets: &FrameTargets) {
            cmd.dispatch(2, 0, 0);
        }

        fn overlay(&mut self, cmd: &mut CommandLog, _targets: &FrameTargets) {
            cmd.dispatch(3, 0, 0);
        }
    }

    fn targets() -> FrameTargets {
        FrameTargets {
            draw_image: vk::Image::from_raw(1),
            draw_view: vk::ImageView::from_raw(2),
            depth_image: vk::Image::from_raw(3),
            depth_view: vk::ImageView::from_raw(4),
            draw_extent: vk::Extent2D {
                width: 850,
                height: 450,
            },
            swapchain_image: vk::Image::from_raw(5),
            swapchain_view: vk::ImageView::from_raw(6),
            swapchain_extent: vk::Extent2D {
                width: 1700,
                height: 900,
            },
        }
    }

    #[test]
    fn test_exact_transition_sequence() {
        let t = targets();
        let mut log = CommandLog::new();
        record_frame(&mut log, &t, &mut Markers);

        use vk::ImageLayout as L;
        assert_eq!(
            log.transitions(),
            vec![
                (t.draw_image, L::UNDEFINED, L::GENERAL),
                (t.draw_image, L::GENERAL, L::COLOR_ATTACHMENT_OPTIMAL),
                (t.depth_image, L::UNDEFINED, L::DEPTH_ATTACHMENT_OPTIMAL),
                (t.draw_image, L::COLOR_ATTACHMENT_OPTIMAL, L::TRANSFER_SRC_OPTIMAL),
                (t.swapchain_image, L::UNDEFINED, L::TRANSFER_DST_OPTIMAL),
                (t.swapchain_image, L::TRANSFER_DST_OPTIMAL, L::COLOR_ATTACHMENT_OPTIMAL),
                (t.swapchain_image, L::COLOR_ATTACHMENT_OPTIMAL, L::PRESENT_SRC_KHR),
            ]
        );
    }

    #[test]
    fn test_passes_run_inside_their_attachments() {
        let t = targets();
        let mut log = CommandLog::new();
        record_frame(&mut log, &t, &mut Markers);

        let position = |wanted: &RecordedCommand| {
            log.commands
                .iter()
                .position(|c| c == wanted)
                .unwrap_or_else(|| panic!("missing {wanted:?}"))
        };

        let background = position(&RecordedCommand::Dispatch(1, 0, 0));
        let geometry = position(&RecordedCommand::Dispatch(2, 0, 0));
        let overlay = position(&RecordedCommand::Dispatch(3, 0, 0));
        let blit = position(&RecordedCommand::Blit {
            src: t.draw_image,
            dst: t.swapchain_image,
            src_size: t.draw_extent,
            dst_size: t.swapchain_extent,
        });
        assert!(background < geometry && geometry < blit && blit < overlay);

        assert_eq!(
            log.commands[geometry - 1],
            RecordedCommand::BeginRendering {
                color: Some(t.draw_view),
                depth: Some(t.depth_view),
                extent: t.draw_extent,
            }
        );
        assert_eq!(log.commands[geometry + 1], RecordedCommand::EndRendering);

        assert_eq!(
            log.commands[overlay - 1],
            RecordedCommand::BeginRendering {
                color: Some(t.swapchain_view),
                depth: None,
                extent: t.swapchain_extent,
            }
        );
        assert_eq!(log.commands[overlay + 1], RecordedCommand::EndRendering);
    }
}
