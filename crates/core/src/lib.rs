//! Core utilities shared by the frame renderer crates.
//!
//! This crate provides foundational types used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Timer utilities
//! - Configuration loading and runtime render settings

pub mod config;
mod error;
mod logging;
mod timer;

pub use config::{RenderSettings, RendererConfig};
pub use error::{Error, Result};
pub use logging::{DEFAULT_FILTER, init_logging, init_logging_with};
pub use timer::Timer;
