//! Per-frame scene uniforms.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

/// Uniform block bound at set 0, binding 0 of the mesh pipelines.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuSceneData {
    pub view: Mat4,
    pub proj: Mat4,
    pub view_proj: Mat4,
    pub ambient_color: Vec4,
    /// `w` is the sun power.
    pub sunlight_direction: Vec4,
    pub sunlight_color: Vec4,
}

impl GpuSceneData {
    /// Camera matrices with the default lighting.
    pub fn new(view: Mat4, proj: Mat4) -> Self {
        Self {
            view,
            proj,
            view_proj: proj * view,
            ambient_color: Vec4::splat(0.1),
            sunlight_direction: Vec4::new(0.0, 1.0, 0.5, 1.0),
            sunlight_color: Vec4::ONE,
        }
    }
}

impl Default for GpuSceneData {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_matches_std140() {
        assert_eq!(std::mem::size_of::<GpuSceneData>(), 3 * 64 + 3 * 16);
        assert_eq!(std::mem::offset_of!(GpuSceneData, ambient_color), 192);
    }

    #[test]
    fn test_view_proj_is_proj_times_view() {
        let view = Mat4::from_translation(glam::Vec3::new(0.0, 0.0, -5.0));
        let proj = Mat4::from_scale(glam::Vec3::new(2.0, 1.0, 1.0));
        assert_eq!(GpuSceneData::new(view, proj).view_proj, proj * view);
    }
}
