//! Core model for ssao-rs.
//!
//! This crate holds everything about the screen-space ambient occlusion effect
//! that does not need a GPU device:
//! - [`AmbientOcclusionConfig`] and its persistence
//! - the [`ParameterModel`] deriving GPU parameter blocks from a configuration
//! - Gaussian blur kernels and the low-discrepancy rotation sequence
//! - render-target lifecycle, the pipeline cache and the per-frame [`FramePlan`]

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Configuration structs legitimately have many boolean flags
#![allow(clippy::struct_excessive_bools)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Pixel sizes and sample counts are small; f32 conversions are intended
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

pub mod config;
pub mod error;
pub mod kernel;
pub mod params;
pub mod pipeline_cache;
pub mod plan;
pub mod sequence;
pub mod state;
pub mod targets;
pub mod timing;
pub mod uniforms;
pub mod viewport;

pub use config::{AmbientOcclusionConfig, DebugOcclusionConfig, EstimatorMode, SplitMode};
pub use error::{Result, SsaoError};
pub use params::{
    ConfigChanges, ParameterBlock, ParameterModel, RecomputeStats, MAX_BLUR_RADIUS, MAX_SPLITS,
};
pub use pipeline_cache::{PassKind, PipelineCache, PipelineState};
pub use plan::{DepthSource, FramePlan, FrameSetup, PassDesc, TargetSlot};
pub use state::ConfigHandle;
pub use targets::{
    RenderTargetManager, SourceDepthId, TargetAllocator, TargetDesc, TargetFilter, TargetFormat,
};
pub use timing::{FrameTimings, MovingAverage, TimingReport};
pub use uniforms::{
    AoParameters, BlurParameters, DebugParameters, FrameParameters, FrameTransform,
    BLUR_TAP_CAPACITY,
};
pub use viewport::Viewport;

// Re-export glam types for convenience
pub use glam::{Mat4, UVec2, Vec2, Vec4};
