//! Platform layer for the frame renderer.
//!
//! This crate provides:
//! - Window management via winit
//! - Vulkan surface creation and the instance extensions it needs
//! - Keyboard and mouse state accumulated from window events

mod input;
mod window;

pub use input::{InputState, KeyCode, MouseButton};
pub use window::{Surface, Window, get_required_extensions};

pub use winit::event::WindowEvent;
pub use winit::event_loop::EventLoop;
