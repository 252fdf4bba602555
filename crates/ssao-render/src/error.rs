//! Rendering error types.

use ssao_core::SsaoError;
use thiserror::Error;

/// Errors that can occur while creating or running the occlusion passes.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// Shader source could not be assembled.
    #[error("shader compilation failed: {0}")]
    ShaderCompilationFailed(String),

    /// A frame input does not meet the effect's requirements.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The device reported a validation error.
    #[error("validation error: {0}")]
    Validation(String),

    /// Error from the core model.
    #[error(transparent)]
    Core(#[from] SsaoError),
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
