//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate provides a safe abstraction over Vulkan using the `ash` crate.
//! It handles:
//! - Instance, device and swapchain creation
//! - Command buffer recording and synchronization primitives
//! - Buffer and image management through `gpu-allocator`
//! - Descriptor layouts, writes and the growable descriptor allocator
//! - Graphics and compute pipeline creation

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod descriptor_allocator;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod rendering;
pub mod sampler;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
