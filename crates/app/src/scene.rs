//! Procedural default scene.

use std::sync::Arc;

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use frame_renderer::{Renderer, RendererResult};
use frame_rhi::vertex::Vertex;
use frame_scene::{
    Bounds, GeoSurface, MaterialInstance, MaterialPass, MeshAsset, NodeKind, SceneGraph,
};

/// CPU-side mesh data before upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn bounds(&self) -> Bounds {
        Bounds::from_points(self.vertices.iter().map(|v| v.position))
    }

    /// Appends a face with corners in counter-clockwise order seen from
    /// `normal`.
    fn push_face(&mut self, corners: [Vec3; 4], normal: Vec3, color: Vec4) {
        const UVS: [Vec2; 4] = [
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
        ];

        let base = self.vertices.len() as u32;
        self.vertices.extend(
            corners
                .iter()
                .zip(UVS)
                .map(|(&p, uv)| Vertex::new(p, normal, uv, color)),
        );
        self.indices
            .extend([0, 1, 2, 2, 3, 0].iter().map(|i| base + i));
    }
}

/// Unit quad in the XY plane facing +Z: 4 vertices, 6 indices.
pub fn quad(color: Vec4) -> MeshData {
    let mut mesh = MeshData::default();
    mesh.push_face(
        [
            Vec3::new(-0.5, -0.5, 0.0),
            Vec3::new(0.5, -0.5, 0.0),
            Vec3::new(0.5, 0.5, 0.0),
            Vec3::new(-0.5, 0.5, 0.0),
        ],
        Vec3::Z,
        color,
    );
    mesh
}

/// Unit cube with flat-shaded faces: 24 vertices, 36 indices.
pub fn cube(color: Vec4) -> MeshData {
    let mut mesh = MeshData::default();
    for normal in [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z] {
        // Rotate the +Z face onto each axis.
        let rotation = Quat::from_rotation_arc(Vec3::Z, normal);
        let corners = quad(color)
            .vertices
            .iter()
            .map(|v| rotation * v.position + normal * 0.5)
            .collect::<Vec<_>>();
        mesh.push_face([corners[0], corners[1], corners[2], corners[3]], normal, color);
    }
    mesh
}

fn upload(
    renderer: &Renderer,
    name: &str,
    data: &MeshData,
    material: Arc<MaterialInstance>,
) -> RendererResult<Arc<MeshAsset>> {
    let buffers = renderer.upload_mesh(&data.indices, &data.vertices)?;
    let surface = GeoSurface {
        start_index: 0,
        count: data.indices.len() as u32,
        bounds: data.bounds(),
        material,
    };
    Ok(Arc::new(MeshAsset::new(name, vec![surface], buffers)))
}

/// Uploads the default meshes and arranges them in a three-level hierarchy:
/// a cube at the root, an opaque quad beside it and a transparent quad in
/// front of that.
///
/// # Errors
///
/// Returns an error if a mesh upload or material allocation fails.
pub fn build_default_scene(renderer: &mut Renderer) -> RendererResult<SceneGraph> {
    let defaults = renderer.default_textures();
    let (checker_view, nearest) = (
        defaults.checkerboard.view(),
        defaults.nearest_sampler.handle(),
    );
    let glass = renderer.create_material(MaterialPass::Transparent, checker_view, nearest)?;
    let opaque = renderer.default_material();

    let cube_mesh = upload(
        renderer,
        "cube",
        &cube(Vec4::new(0.8, 0.3, 0.2, 1.0)),
        Arc::clone(&opaque),
    )?;
    let quad_mesh = upload(renderer, "quad", &quad(Vec4::new(0.2, 0.6, 0.9, 1.0)), opaque)?;
    let glass_mesh = upload(renderer, "glass", &quad(Vec4::new(1.0, 1.0, 1.0, 0.4)), glass)?;

    let mut graph = SceneGraph::new();
    let root = graph.add_root(NodeKind::Mesh(cube_mesh), Mat4::IDENTITY);
    let middle = graph.add_child(
        root,
        NodeKind::Mesh(quad_mesh),
        Mat4::from_translation(Vec3::new(1.5, 0.0, 0.0)),
    );
    graph.add_child(
        middle,
        NodeKind::Mesh(glass_mesh),
        Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Quat::IDENTITY,
            Vec3::new(0.0, 0.0, 0.5),
        ),
    );

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_counts() {
        let mesh = quad(Vec4::ONE);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 2, 3, 0]);
    }

    #[test]
    fn test_cube_counts_and_bounds() {
        let mesh = cube(Vec4::ONE);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));

        let bounds = mesh.bounds();
        assert!(bounds.origin.abs_diff_eq(Vec3::ZERO, 1e-5));
        assert!(bounds.extents.abs_diff_eq(Vec3::splat(0.5), 1e-5));
    }

    #[test]
    fn test_cube_faces_point_outward() {
        let mesh = cube(Vec4::ONE);
        for v in &mesh.vertices {
            assert!((v.position.dot(v.normal) - 0.5).abs() < 1e-5);
        }
    }
}
