//! Mesh vertex layout.
//!
//! Vertices are read by the vertex shader through a buffer device address
//! rather than fixed-function vertex input, so the layout only has to match
//! the shader's std430 struct: UV components are packed into the padding
//! after `position` and `normal`.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

/// Vertex as stored in a mesh vertex buffer (48 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub uv_x: f32,
    pub normal: Vec3,
    pub uv_y: f32,
    pub color: Vec4,
}

impl Vertex {
    #[inline]
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2, color: Vec4) -> Self {
        Self {
            position,
            uv_x: uv.x,
            normal,
            uv_y: uv.y,
            color,
        }
    }

    /// White vertex facing +Z with zero UVs.
    #[inline]
    pub fn at(position: Vec3) -> Self {
        Self::new(position, Vec3::Z, Vec2::ZERO, Vec4::ONE)
    }

    #[inline]
    pub fn uv(&self) -> Vec2 {
        Vec2::new(self.uv_x, self.uv_y)
    }

    #[inline]
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::offset_of;

    #[test]
    fn test_vertex_layout_matches_std430() {
        assert_eq!(Vertex::size(), 48);
        assert_eq!(offset_of!(Vertex, position), 0);
        assert_eq!(offset_of!(Vertex, uv_x), 12);
        assert_eq!(offset_of!(Vertex, normal), 16);
        assert_eq!(offset_of!(Vertex, uv_y), 28);
        assert_eq!(offset_of!(Vertex, color), 32);
    }

    #[test]
    fn test_vertex_uv_is_split_across_padding() {
        let vertex = Vertex::new(Vec3::ONE, Vec3::Y, Vec2::new(0.25, 0.75), Vec4::ONE);
        assert_eq!(vertex.uv_x, 0.25);
        assert_eq!(vertex.uv_y, 0.75);
        assert_eq!(vertex.uv(), Vec2::new(0.25, 0.75));
        assert_eq!(bytemuck::bytes_of(&vertex).len(), 48);
    }
}
