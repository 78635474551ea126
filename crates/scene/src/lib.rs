//! Scene description consumed by the renderer.
//!
//! This crate provides:
//! - An arena scene graph whose nodes are empty or carry a mesh
//! - Materials, meshes and the per-frame draw items traversal produces
//! - A first-person camera and reversed-Z projection

pub mod bounds;
pub mod camera;
pub mod draw;
pub mod graph;
pub mod material;
pub mod mesh;

pub use bounds::Bounds;
pub use camera::{Camera, CameraKey};
pub use draw::{DrawContext, RenderObject, Renderable};
pub use graph::{NodeId, NodeKind, SceneGraph};
pub use material::{MaterialId, MaterialInstance, MaterialPass, MaterialPipeline};
pub use mesh::{GeoSurface, GpuMeshBuffers, MeshAsset};
