//! Frame execution for the Vulkan renderer.
//!
//! This crate orchestrates the rendering process:
//! - A ring of two frame slots, each with its own fence, command buffer,
//!   deletion queue and descriptor allocator
//! - A fixed pass sequence: background compute, geometry, blit, overlay
//! - A draw list that culls, sorts and records with minimal rebinding
//! - Blocking uploads of meshes and textures
//!
//! Recording goes through [`CommandRecorder`], so the pass sequence and the
//! draw list can be checked against a [`CommandLog`] without a GPU.

pub mod background;
pub mod defaults;
pub mod deletion_queue;
pub mod draw_list;
mod error;
pub mod frame;
pub mod immediate;
pub mod materials;
pub mod overlay;
pub mod recorder;
pub mod render_graph;
pub mod render_targets;
mod renderer;
pub mod scene_data;
pub mod stats;
pub mod upload;

pub use deletion_queue::{DeletionQueue, GpuResource, Release};
pub use draw_list::{DrawList, DrawStats, GpuDrawPushConstants};
pub use error::{RendererError, RendererResult};
pub use frame::{FRAMES_IN_FLIGHT, FrameRing};
pub use overlay::{NoOverlay, UiOverlay};
pub use recorder::{CommandLog, CommandRecorder, RecordedCommand};
pub use render_graph::{FrameTargets, Pass, PassRecorder, record_frame};
pub use renderer::Renderer;
pub use stats::EngineStats;
