//! Arena-backed scene graph.
//!
//! Nodes live in one vector and refer to each other by [`NodeId`]. A node's
//! children are the ids in its child list; the parent link is a plain id and
//! never keeps anything alive.
//!
//! World transforms are recomputed from the roots on every [`Renderable::draw`]
//! (or an explicit [`SceneGraph::refresh_transforms`]), so edits to local
//! transforms take effect on the next walk.
//!
//! # Example
//!
//! ```
//! use frame_scene::graph::{NodeKind, SceneGraph};
//! use glam::{Mat4, Vec3};
//!
//! let mut scene = SceneGraph::new();
//! let root = scene.add_root(NodeKind::Empty, Mat4::from_translation(Vec3::X));
//! let child = scene.add_child(root, NodeKind::Empty, Mat4::from_translation(Vec3::Y));
//! scene.refresh_transforms();
//!
//! assert_eq!(scene.world_transform(child), Mat4::from_translation(Vec3::new(1.0, 1.0, 0.0)));
//! assert_eq!(scene.parent(child), Some(root));
//! ```

use std::sync::Arc;

use glam::Mat4;

use crate::draw::{DrawContext, RenderObject, Renderable};
use crate::mesh::MeshAsset;

/// Index of a node in its [`SceneGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// What a node contributes to the draw list.
#[derive(Clone, Debug, Default)]
pub enum NodeKind {
    /// Transform only.
    #[default]
    Empty,
    Mesh(Arc<MeshAsset>),
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    local_transform: Mat4,
    world_transform: Mat4,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Tree of transform nodes.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, kind: NodeKind, local_transform: Mat4, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let world_transform = match parent {
            Some(parent) => self.nodes[parent.0].world_transform * local_transform,
            None => local_transform,
        };
        self.nodes.push(Node {
            kind,
            local_transform,
            world_transform,
            parent,
            children: Vec::new(),
        });
        id
    }

    /// Adds a top-level node.
    pub fn add_root(&mut self, kind: NodeKind, local_transform: Mat4) -> NodeId {
        let id = self.insert(kind, local_transform, None);
        self.roots.push(id);
        id
    }

    /// Adds a node under `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` does not belong to this graph.
    pub fn add_child(&mut self, parent: NodeId, kind: NodeKind, local_transform: Mat4) -> NodeId {
        let id = self.insert(kind, local_transform, Some(parent));
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn set_local_transform(&mut self, id: NodeId, local_transform: Mat4) {
        self.nodes[id.0].local_transform = local_transform;
    }

    pub fn local_transform(&self, id: NodeId) -> Mat4 {
        self.nodes[id.0].local_transform
    }

    /// World transform as of the last walk.
    pub fn world_transform(&self, id: NodeId) -> Mat4 {
        self.nodes[id.0].world_transform
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Recomputes every world transform top-down from the roots.
    pub fn refresh_transforms(&mut self) {
        let mut stack: Vec<(NodeId, Mat4)> =
            self.roots.iter().rev().map(|&id| (id, Mat4::IDENTITY)).collect();

        while let Some((id, parent_world)) = stack.pop() {
            let node = &mut self.nodes[id.0];
            node.world_transform = parent_world * node.local_transform;
            let world = node.world_transform;
            stack.extend(node.children.iter().rev().map(|&child| (child, world)));
        }
    }

    /// Depth-first, children in insertion order.
    fn visit(&self, id: NodeId, top: &Mat4, ctx: &mut DrawContext) {
        let node = &self.nodes[id.0];
        if let NodeKind::Mesh(mesh) = &node.kind {
            let transform = *top * node.world_transform;
            for surface in &mesh.surfaces {
                ctx.push(RenderObject::from_surface(mesh, surface, transform));
            }
        }

        for &child in &node.children {
            self.visit(child, top, ctx);
        }
    }
}

impl Renderable for SceneGraph {
    fn draw(&mut self, top: &Mat4, ctx: &mut DrawContext) {
        self.refresh_transforms();
        for &root in &self.roots {
            self.visit(root, top, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::Bounds;
    use crate::material::{MaterialId, MaterialInstance, MaterialPass, MaterialPipeline};
    use crate::mesh::GeoSurface;
    use frame_rhi::vk;
    use frame_rhi::vk::Handle;
    use glam::{Quat, Vec3};

    fn material(id: u32, pass: MaterialPass) -> Arc<MaterialInstance> {
        Arc::new(MaterialInstance {
            id: MaterialId(id),
            pass,
            pipeline: MaterialPipeline {
                pipeline: vk::Pipeline::null(),
                layout: vk::PipelineLayout::null(),
            },
            material_set: vk::DescriptorSet::null(),
        })
    }

    fn mesh(name: &str, pass: MaterialPass) -> Arc<MeshAsset> {
        let surface = GeoSurface {
            start_index: 0,
            count: 6,
            bounds: Bounds::new(Vec3::ZERO, Vec3::ONE),
            material: material(1, pass),
        };
        Arc::new(MeshAsset::from_handles(
            name,
            vec![surface],
            vk::Buffer::from_raw(7),
            0x1000,
        ))
    }

    #[test]
    fn test_three_level_propagation_is_exact() {
        let t1 = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Quat::from_rotation_y(0.3),
            Vec3::new(1.0, 2.0, 3.0),
        );
        let t2 = Mat4::from_rotation_x(1.1) * Mat4::from_translation(Vec3::new(-4.0, 0.5, 0.0));
        let t3 = Mat4::from_scale(Vec3::new(0.5, 3.0, 1.0));

        let mut scene = SceneGraph::new();
        let root = scene.add_root(NodeKind::Empty, t1);
        let middle = scene.add_child(root, NodeKind::Empty, t2);
        let leaf = scene.add_child(middle, NodeKind::Empty, t3);
        scene.refresh_transforms();

        assert_eq!(scene.world_transform(leaf), t1 * t2 * t3);
        assert_eq!(scene.world_transform(middle), t1 * t2);
        assert_eq!(scene.parent(leaf), Some(middle));
        assert_eq!(scene.children(root), &[middle]);
    }

    #[test]
    fn test_edits_apply_on_next_walk() {
        let mut scene = SceneGraph::new();
        let root = scene.add_root(NodeKind::Empty, Mat4::IDENTITY);
        let child = scene.add_child(root, NodeKind::Empty, Mat4::from_translation(Vec3::Z));

        scene.set_local_transform(root, Mat4::from_translation(Vec3::X));
        assert_eq!(scene.world_transform(child), Mat4::from_translation(Vec3::Z));

        let mut ctx = DrawContext::new();
        scene.draw(&Mat4::IDENTITY, &mut ctx);
        assert_eq!(
            scene.world_transform(child),
            Mat4::from_translation(Vec3::new(1.0, 0.0, 1.0))
        );
    }

    #[test]
    fn test_draw_routes_surfaces_by_pass() {
        let mut scene = SceneGraph::new();
        let root = scene.add_root(
            NodeKind::Mesh(mesh("opaque", MaterialPass::MainColor)),
            Mat4::from_translation(Vec3::X),
        );
        scene.add_child(
            root,
            NodeKind::Mesh(mesh("glass", MaterialPass::Transparent)),
            Mat4::from_translation(Vec3::Y),
        );
        scene.add_root(NodeKind::Mesh(mesh("other", MaterialPass::Other)), Mat4::IDENTITY);

        let top = Mat4::from_translation(Vec3::Z);
        let mut ctx = DrawContext::new();
        scene.draw(&top, &mut ctx);

        assert_eq!(ctx.opaque_surfaces.len(), 2);
        assert_eq!(ctx.transparent_surfaces.len(), 1);
        assert_eq!(
            ctx.transparent_surfaces[0].transform,
            top * Mat4::from_translation(Vec3::new(1.0, 1.0, 0.0))
        );
        assert_eq!(ctx.opaque_surfaces[0].index_buffer, vk::Buffer::from_raw(7));
        assert_eq!(ctx.opaque_surfaces[0].vertex_buffer_address, 0x1000);
        assert_eq!(ctx.opaque_surfaces[0].triangle_count(), 2);
    }

    #[test]
    fn test_empty_graph_draws_nothing() {
        let mut scene = SceneGraph::new();
        let mut ctx = DrawContext::new();
        scene.draw(&Mat4::IDENTITY, &mut ctx);
        assert!(ctx.is_empty());
        assert!(scene.is_empty());
    }
}
