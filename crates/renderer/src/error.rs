//! Renderer error types.

use thiserror::Error;

use frame_rhi::RhiError;

/// Errors surfaced by the frame renderer.
#[derive(Error, Debug)]
pub enum RendererError {
    #[error(transparent)]
    Rhi(#[from] RhiError),

    /// A frame slot's fence did not signal within the frame timeout.
    #[error("Timed out waiting for the fence of frame {frame}")]
    FenceTimeout { frame: u64 },

    /// An immediate submission did not complete in time.
    #[error("Immediate submission did not complete within {timeout_ns} ns")]
    UploadTimeout { timeout_ns: u64 },

    /// Window or surface failure from the platform layer.
    #[error(transparent)]
    Platform(#[from] frame_core::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid asset data handed to the renderer.
    #[error("Asset error: {0}")]
    Asset(String),
}

/// Result type alias for renderer operations.
pub type RendererResult<T> = std::result::Result<T, RendererError>;
