//! Rendering backend for ssao-rs.
//!
//! This crate provides the wgpu side of the ambient occlusion effect:
//! - WGSL pass shaders and their assembly per variant
//! - Pipelines cached per device and shader variant
//! - Render targets, uniform upload and pass recording
//! - GPU timestamp timing and the cursor debug overlay

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Texture sizes and pass counts fit comfortably in f32/u32
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::too_many_arguments)]

pub mod debug_overlay;
pub mod effect;
pub mod error;
pub mod pipelines;
pub mod shader;
pub mod targets;
pub mod timer;

pub use debug_overlay::DebugOverlay;
pub use effect::{
    AmbientOcclusionEffect, EffectInputs, FrameReport, FrameStatus, LinearDepthInput,
    RenderedFrame,
};
pub use error::{RenderError, RenderResult};
pub use pipelines::{
    GpuPipeline, ShaderVariant, SsaoPipelines, LINEAR_DEPTH_FORMAT, OCCLUSION_FORMAT,
};
pub use shader::ShaderBuilder;
pub use targets::{RenderTarget, WgpuTargetAllocator};
pub use timer::GpuTimer;
