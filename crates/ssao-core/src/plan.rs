//! Per-frame pass plan.
//!
//! [`FramePlan::build`] turns the frame inputs and the active configuration
//! into the ordered list of passes the GPU executor records. The plan is pure
//! data, so pass order, viewports and target routing can be checked without
//! a device.

use glam::{UVec2, Vec4};

use crate::config::SplitMode;
use crate::pipeline_cache::PassKind;
use crate::viewport::Viewport;

/// Clear value of the occlusion target: fully unoccluded.
pub const OCCLUSION_CLEAR_VALUE: f64 = 1.0;

/// A texture a pass reads from or renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetSlot {
    Occlusion,
    OcclusionBlurred,
    Normal,
    /// The mip chain of the linear depth texture the occlusion pass samples.
    OcclusionDepthMips,
}

/// Which linear-depth texture a pass samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthSource {
    Full,
    Half,
}

/// Everything the plan depends on for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSetup {
    /// Region of the source frame the effect covers.
    pub source_viewport: Viewport,
    /// Size of the full-resolution linear depth texture.
    pub source_size: UVec2,
    pub resolution_level: u32,
    pub split: SplitMode,
}

/// One render pass of the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassDesc {
    pub kind: PassKind,
    pub viewport: Viewport,
    pub target: TargetSlot,
    /// Clear value applied to the whole target before drawing.
    pub clear: Option<f64>,
    pub depth: DepthSource,
    /// Occlusion-valued texture the pass reads, if any.
    pub input: Option<TargetSlot>,
    /// Split whose frame parameters the pass binds.
    pub split: usize,
}

impl PassDesc {
    fn new(kind: PassKind, viewport: Viewport, target: TargetSlot, depth: DepthSource) -> Self {
        Self {
            kind,
            viewport,
            target,
            clear: None,
            depth,
            input: None,
            split: 0,
        }
    }
}

/// The ordered passes of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    pub occlusion_viewport: Viewport,
    pub occlusion_depth: DepthSource,
    pub normal_level: Option<u32>,
    pub passes: Vec<PassDesc>,
}

impl FramePlan {
    /// Builds the pass list for a frame.
    ///
    /// An empty source viewport or source size yields a plan without passes.
    pub fn build(setup: &FrameSetup) -> Self {
        let level = setup.resolution_level.min(31);
        let occlusion_depth = if level > 0 {
            DepthSource::Half
        } else {
            DepthSource::Full
        };
        let occlusion_viewport = setup.source_viewport.downscaled(level);
        let normal_level = setup.split.builds_normals().then_some(level);

        let mut plan = Self {
            occlusion_viewport,
            occlusion_depth,
            normal_level,
            passes: Vec::new(),
        };
        if setup.source_viewport.is_empty()
            || setup.source_size.cmpeq(UVec2::ZERO).any()
            || occlusion_viewport.is_empty()
        {
            return plan;
        }

        plan.passes.push(PassDesc::new(
            PassKind::MipGeneration,
            occlusion_viewport,
            TargetSlot::OcclusionDepthMips,
            occlusion_depth,
        ));

        if setup.split.builds_normals() {
            plan.passes.push(PassDesc::new(
                PassKind::BuildNormals,
                occlusion_viewport,
                TargetSlot::Normal,
                occlusion_depth,
            ));
        }

        match setup.split {
            SplitMode::Single => {
                let mut pass = PassDesc::new(
                    PassKind::Occlusion,
                    occlusion_viewport,
                    TargetSlot::Occlusion,
                    occlusion_depth,
                );
                pass.clear = Some(OCCLUSION_CLEAR_VALUE);
                plan.passes.push(pass);
            }
            SplitMode::Quad => {
                for (split, quadrant) in occlusion_viewport.quadrants().into_iter().enumerate() {
                    let mut pass = PassDesc::new(
                        PassKind::Occlusion,
                        quadrant,
                        TargetSlot::OcclusionBlurred,
                        occlusion_depth,
                    );
                    pass.input = Some(TargetSlot::Normal);
                    pass.split = split;
                    if split == 0 {
                        pass.clear = Some(OCCLUSION_CLEAR_VALUE);
                    }
                    plan.passes.push(pass);
                }

                let mut gather = PassDesc::new(
                    PassKind::Gather,
                    occlusion_viewport,
                    TargetSlot::Occlusion,
                    occlusion_depth,
                );
                gather.input = Some(TargetSlot::OcclusionBlurred);
                plan.passes.push(gather);
            }
        }

        let mut horizontal = PassDesc::new(
            PassKind::HorizontalBlur,
            setup.source_viewport.with_downscaled_height(level),
            TargetSlot::OcclusionBlurred,
            DepthSource::Full,
        );
        horizontal.input = Some(TargetSlot::Occlusion);
        plan.passes.push(horizontal);

        let mut vertical = PassDesc::new(
            PassKind::VerticalBlur,
            setup.source_viewport,
            TargetSlot::Occlusion,
            DepthSource::Full,
        );
        vertical.input = Some(TargetSlot::OcclusionBlurred);
        plan.passes.push(vertical);

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Passes of the given kind, in order.
    pub fn passes_of(&self, kind: PassKind) -> impl Iterator<Item = &PassDesc> {
        self.passes.iter().filter(move |pass| pass.kind == kind)
    }
}

/// Normalized rectangle of the occlusion viewport inside the depth texture
/// the occlusion pass sampled, as `(s, t, width, height)`.
pub fn debug_texcoord_rect(occlusion_viewport: Viewport, depth_size: UVec2) -> Vec4 {
    occlusion_viewport.normalized_in(depth_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(split: SplitMode, level: u32) -> FrameSetup {
        FrameSetup {
            source_viewport: Viewport::new(0, 0, 1920, 1080),
            source_size: UVec2::new(1920, 1080),
            resolution_level: level,
            split,
        }
    }

    fn kinds(plan: &FramePlan) -> Vec<PassKind> {
        plan.passes.iter().map(|p| p.kind).collect()
    }

    #[test]
    fn test_single_split_plan() {
        let plan = FramePlan::build(&setup(SplitMode::Single, 0));
        assert_eq!(
            kinds(&plan),
            vec![
                PassKind::MipGeneration,
                PassKind::Occlusion,
                PassKind::HorizontalBlur,
                PassKind::VerticalBlur,
            ]
        );
        assert_eq!(plan.occlusion_depth, DepthSource::Full);
        assert_eq!(plan.normal_level, None);

        let occlusion = &plan.passes[1];
        assert_eq!(occlusion.viewport, Viewport::new(0, 0, 1920, 1080));
        assert_eq!(occlusion.target, TargetSlot::Occlusion);
        assert_eq!(occlusion.clear, Some(OCCLUSION_CLEAR_VALUE));

        let h = &plan.passes[2];
        assert_eq!(h.viewport, Viewport::new(0, 0, 1920, 1080));
        assert_eq!(h.input, Some(TargetSlot::Occlusion));
        assert_eq!(h.target, TargetSlot::OcclusionBlurred);
        let v = &plan.passes[3];
        assert_eq!(v.input, Some(TargetSlot::OcclusionBlurred));
        assert_eq!(v.target, TargetSlot::Occlusion);
    }

    #[test]
    fn test_quad_split_plan() {
        let plan = FramePlan::build(&setup(SplitMode::Quad, 1));
        assert_eq!(
            kinds(&plan),
            vec![
                PassKind::MipGeneration,
                PassKind::BuildNormals,
                PassKind::Occlusion,
                PassKind::Occlusion,
                PassKind::Occlusion,
                PassKind::Occlusion,
                PassKind::Gather,
                PassKind::HorizontalBlur,
                PassKind::VerticalBlur,
            ]
        );
        assert_eq!(plan.occlusion_viewport, Viewport::new(0, 0, 960, 540));
        assert_eq!(plan.occlusion_depth, DepthSource::Half);
        assert_eq!(plan.normal_level, Some(1));

        let quads: Vec<_> = plan.passes_of(PassKind::Occlusion).collect();
        assert_eq!(quads[0].viewport, Viewport::new(0, 0, 480, 270));
        assert_eq!(quads[1].viewport, Viewport::new(480, 0, 480, 270));
        assert_eq!(quads[2].viewport, Viewport::new(480, 270, 480, 270));
        assert_eq!(quads[3].viewport, Viewport::new(0, 270, 480, 270));
        for (i, quad) in quads.iter().enumerate() {
            assert_eq!(quad.split, i);
            assert_eq!(quad.target, TargetSlot::OcclusionBlurred);
            assert_eq!(quad.clear.is_some(), i == 0);
        }

        let gather = plan.passes_of(PassKind::Gather).next().unwrap();
        assert_eq!(gather.viewport, plan.occlusion_viewport);
        assert_eq!(gather.input, Some(TargetSlot::OcclusionBlurred));
        assert_eq!(gather.target, TargetSlot::Occlusion);

        let h = plan.passes_of(PassKind::HorizontalBlur).next().unwrap();
        assert_eq!(h.viewport, Viewport::new(0, 0, 1920, 540));
        assert_eq!(h.depth, DepthSource::Full);
    }

    #[test]
    fn test_odd_quadrants_tile_occlusion_viewport() {
        let setup = FrameSetup {
            source_viewport: Viewport::new(0, 0, 1023, 767),
            source_size: UVec2::new(1023, 767),
            resolution_level: 0,
            split: SplitMode::Quad,
        };
        let plan = FramePlan::build(&setup);
        let area: u64 = plan
            .passes_of(PassKind::Occlusion)
            .map(|p| p.viewport.area())
            .sum();
        assert_eq!(area, plan.occlusion_viewport.area());
    }

    #[test]
    fn test_offset_viewport_blur_rows_follow_occlusion() {
        let setup = FrameSetup {
            source_viewport: Viewport::new(64, 32, 512, 256),
            source_size: UVec2::new(1024, 512),
            resolution_level: 2,
            split: SplitMode::Single,
        };
        let plan = FramePlan::build(&setup);
        assert_eq!(plan.occlusion_viewport, Viewport::new(16, 8, 128, 64));

        let h = plan.passes_of(PassKind::HorizontalBlur).next().unwrap();
        assert_eq!(h.viewport, Viewport::new(64, 8, 512, 64));
        assert_eq!(h.viewport.y, plan.occlusion_viewport.y);
        assert_eq!(h.viewport.height, plan.occlusion_viewport.height);

        let v = plan.passes_of(PassKind::VerticalBlur).next().unwrap();
        assert_eq!(v.viewport, setup.source_viewport);
    }

    #[test]
    fn test_empty_viewport_has_no_passes() {
        let mut empty = setup(SplitMode::Quad, 2);
        empty.source_viewport = Viewport::new(0, 0, 0, 1080);
        assert!(FramePlan::build(&empty).is_empty());

        let mut tiny = setup(SplitMode::Single, 3);
        tiny.source_viewport = Viewport::new(0, 0, 4, 4);
        assert!(FramePlan::build(&tiny).is_empty());
    }

    #[test]
    fn test_debug_rect() {
        let rect = debug_texcoord_rect(Viewport::new(0, 0, 480, 270), UVec2::new(960, 540));
        assert_eq!(rect, Vec4::new(0.0, 0.0, 0.5, 0.5));
    }
}
