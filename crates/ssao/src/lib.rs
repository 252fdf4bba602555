//! ssao-rs: screen-space ambient occlusion for wgpu renderers.
//!
//! The effect estimates per-pixel occlusion from a linear depth buffer, then
//! smooths it with an edge-aware bilateral blur. It runs at a configurable
//! resolution level and can split the occlusion pass into four interleaved
//! quadrants.
//!
//! # Quick Start
//!
//! ```no_run
//! use ssao::*;
//!
//! fn main() -> RenderResult<()> {
//!     init_logger();
//!     let context = HeadlessContext::new()?;
//!
//!     let size = UVec2::new(320, 240);
//!     let depth = DepthImage::filled(size, 5.0)?;
//!     let projection = Mat4::perspective_rh(1.0, 320.0 / 240.0, 0.1, 100.0);
//!     let transform = FrameTransform::new(projection, size, 0.1, 100.0);
//!
//!     let config = AmbientOcclusionConfig::default().with_radius(0.5);
//!     let occlusion = render_occlusion(&context, &config, &depth, &transform)?;
//!     println!("mean visibility {}", occlusion.mean());
//!     Ok(())
//! }
//! ```
//!
//! # Integration
//!
//! A renderer owns one [`AmbientOcclusion`] per view and calls
//! [`AmbientOcclusion::render`] every frame with the frame's
//! [`EffectInputs`]. The final occlusion is left in the occlusion target of
//! [`AmbientOcclusionEffect::targets`].

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

mod headless;
mod renderer;

pub use headless::{
    render_occlusion, render_occlusion_in, DepthImage, HeadlessContext, OcclusionImage,
};
pub use renderer::AmbientOcclusion;

// Re-export core types
pub use ssao_core::{
    config::{AmbientOcclusionConfig, DebugOcclusionConfig, EstimatorMode, SplitMode},
    error::{Result, SsaoError},
    params::{ConfigChanges, ParameterModel},
    plan::{FramePlan, FrameSetup, PassDesc},
    state::ConfigHandle,
    targets::SourceDepthId,
    timing::TimingReport,
    uniforms::FrameTransform,
    viewport::Viewport,
    Mat4, PassKind, UVec2, Vec2, Vec4,
};

// Re-export render types
pub use ssao_render::{
    AmbientOcclusionEffect, DebugOverlay, EffectInputs, FrameReport, FrameStatus,
    LinearDepthInput, RenderError, RenderResult, SsaoPipelines, LINEAR_DEPTH_FORMAT,
    OCCLUSION_FORMAT,
};

/// Initializes `env_logger` once. Later calls are no-ops.
pub fn init_logger() {
    let _ = env_logger::try_init();
}
