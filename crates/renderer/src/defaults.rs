//! Built-in textures and samplers.
//!
//! Every material needs an image to sample, so the renderer keeps a few
//! solid colors and a checkerboard that makes missing textures obvious.

use std::sync::Arc;

use ash::vk;
use glam::Vec4;
use tracing::info;

use frame_rhi::device::Device;
use frame_rhi::image::AllocatedImage;
use frame_rhi::sampler::Sampler;

use crate::error::RendererResult;
use crate::immediate::ImmediateSubmit;
use crate::upload::create_image_with_data;

/// Texels per side of the checkerboard.
pub const CHECKERBOARD_SIZE: u32 = 16;

const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Packs a color into RGBA8, red in the lowest byte.
pub fn pack_unorm4x8(color: Vec4) -> u32 {
    let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
    to_byte(color.x) | to_byte(color.y) << 8 | to_byte(color.z) << 16 | to_byte(color.w) << 24
}

/// Magenta and black squares alternating every texel.
pub fn checkerboard_pixels() -> Vec<u32> {
    let magenta = pack_unorm4x8(Vec4::new(1.0, 0.0, 1.0, 1.0));
    let black = pack_unorm4x8(Vec4::ZERO);

    (0..CHECKERBOARD_SIZE)
        .flat_map(|y| {
            (0..CHECKERBOARD_SIZE).map(move |x| if (x % 2) ^ (y % 2) == 1 { magenta } else { black })
        })
        .collect()
}

/// Default images and samplers owned by the renderer.
pub struct DefaultTextures {
    pub white: AllocatedImage,
    pub grey: AllocatedImage,
    pub black: AllocatedImage,
    /// Stand-in for textures that failed to load.
    pub checkerboard: AllocatedImage,
    pub linear_sampler: Sampler,
    pub nearest_sampler: Sampler,
}

impl DefaultTextures {
    /// Uploads the default images and creates both samplers.
    ///
    /// # Errors
    ///
    /// Returns an error if any upload or sampler creation fails.
    pub fn new(device: &Arc<Device>, immediate: &ImmediateSubmit) -> RendererResult<Self> {
        let solid = |name: &str, color: Vec4| {
            let texel = pack_unorm4x8(color);
            create_image_with_data(
                device,
                immediate,
                name,
                bytemuck::bytes_of(&texel),
                vk::Extent3D {
                    width: 1,
                    height: 1,
                    depth: 1,
                },
                TEXTURE_FORMAT,
                vk::ImageUsageFlags::SAMPLED,
            )
        };

        let white = solid("white", Vec4::ONE)?;
        let grey = solid("grey", Vec4::new(0.66, 0.66, 0.66, 1.0))?;
        let black = solid("black", Vec4::new(0.0, 0.0, 0.0, 0.0))?;

        let pixels = checkerboard_pixels();
        let checkerboard = create_image_with_data(
            device,
            immediate,
            "checkerboard",
            bytemuck::cast_slice(&pixels),
            vk::Extent3D {
                width: CHECKERBOARD_SIZE,
                height: CHECKERBOARD_SIZE,
                depth: 1,
            },
            TEXTURE_FORMAT,
            vk::ImageUsageFlags::SAMPLED,
        )?;

        let nearest_sampler = Sampler::new(device.clone(), vk::Filter::NEAREST)?;
        let linear_sampler = Sampler::new(device.clone(), vk::Filter::LINEAR)?;

        info!("Default textures and samplers created");

        Ok(Self {
            white,
            grey,
            black,
            checkerboard,
            linear_sampler,
            nearest_sampler,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_puts_red_in_low_byte() {
        assert_eq!(pack_unorm4x8(Vec4::new(1.0, 0.0, 0.0, 0.0)), 0x0000_00ff);
        assert_eq!(pack_unorm4x8(Vec4::new(0.0, 0.0, 0.0, 1.0)), 0xff00_0000);
        assert_eq!(pack_unorm4x8(Vec4::new(2.0, -1.0, 0.5, 1.0)), 0xff80_00ff);
    }

    #[test]
    fn test_checkerboard_alternates() {
        let pixels = checkerboard_pixels();
        let magenta = pack_unorm4x8(Vec4::new(1.0, 0.0, 1.0, 1.0));
        let size = CHECKERBOARD_SIZE as usize;

        assert_eq!(pixels.len(), size * size);
        assert_eq!(pixels[0], 0);
        assert_eq!(pixels[1], magenta);
        assert_eq!(pixels[size], magenta);
        assert_eq!(pixels[size + 1], 0);
    }
}
