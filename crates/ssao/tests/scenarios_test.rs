//! End-to-end frame scenarios without a GPU.
//!
//! Each frame goes through the same steps the wgpu effect takes: configure,
//! track the depth input, build the pass plan, write per-frame parameters and
//! resolve the render targets. Targets are plain descriptors here.

use std::cell::Cell;

use ssao::*;
use ssao_core::sequence;
use ssao_core::{RenderTargetManager, TargetAllocator, TargetDesc};

const ESTIMATORS: [EstimatorMode; 2] = [EstimatorMode::HorizonBased, EstimatorMode::DistanceBased];

#[derive(Default)]
struct DescAllocator {
    created: Cell<u32>,
}

impl TargetAllocator for DescAllocator {
    type Target = TargetDesc;

    fn create_target(&self, desc: &TargetDesc) -> TargetDesc {
        self.created.set(self.created.get() + 1);
        *desc
    }
}

struct Harness {
    model: ParameterModel,
    targets: RenderTargetManager<TargetDesc>,
    allocator: DescAllocator,
    size: UVec2,
}

impl Harness {
    fn new(size: UVec2) -> Self {
        Self {
            model: ParameterModel::new(),
            targets: RenderTargetManager::new(),
            allocator: DescAllocator::default(),
            size,
        }
    }

    fn frame(&mut self, config: &AmbientOcclusionConfig, frame_index: u32) -> FramePlan {
        self.model.configure(config);
        if self.targets.update_linear_depth(SourceDepthId(7), self.size) {
            self.model.set_source_frame_size(self.size);
        }
        let plan = FramePlan::build(&FrameSetup {
            source_viewport: Viewport::from_size(self.size),
            source_size: self.size,
            resolution_level: config.resolution_level,
            split: config.split,
        });
        self.model.prepare_frame(frame_index, plan.occlusion_viewport);
        let targets = self.targets.frame_targets(&self.allocator, plan.normal_level);
        assert!(targets.occlusion.is_some());
        assert!(targets.occlusion_blurred.is_some());
        assert_eq!(targets.normal.is_some(), plan.normal_level.is_some());
        plan
    }
}

fn scenario_config(estimator: EstimatorMode, split: SplitMode) -> AmbientOcclusionConfig {
    AmbientOcclusionConfig::for_estimator(estimator)
        .with_resolution_level(0)
        .with_num_samples(16)
        .with_blur(4, 2.5)
        .with_split(split)
}

fn position(plan: &FramePlan, kind: PassKind) -> Option<usize> {
    plan.passes.iter().position(|pass| pass.kind == kind)
}

#[test]
fn test_single_split_frame() {
    for estimator in ESTIMATORS {
        let mut harness = Harness::new(UVec2::new(1280, 720));
        let plan = harness.frame(&scenario_config(estimator, SplitMode::Single), 0);

        let occlusion: Vec<_> = plan.passes_of(PassKind::Occlusion).collect();
        assert_eq!(occlusion.len(), 1, "{estimator:?}");
        assert_eq!(occlusion[0].viewport, plan.occlusion_viewport);
        assert_eq!(plan.occlusion_viewport, Viewport::new(0, 0, 1280, 720));
        assert_eq!(plan.passes_of(PassKind::HorizontalBlur).count(), 1);
        assert_eq!(plan.passes_of(PassKind::VerticalBlur).count(), 1);
        assert_eq!(plan.passes_of(PassKind::Gather).count(), 0);
        assert_eq!(plan.passes_of(PassKind::BuildNormals).count(), 0);

        let ao = harness.model.ao_parameters();
        assert_eq!(ao.num_samples(), 16);
        assert_eq!(ao.blur_radius(), 4);
        assert!((ssao_core::kernel::symmetric_sum(ao.active_taps()) - 1.0).abs() < 1e-5);
        assert_eq!(harness.model.frame_parameters().len(), 1);
        assert!(harness.targets.get_normal().is_none());
    }
}

#[test]
fn test_quad_split_frame() {
    for estimator in ESTIMATORS {
        let mut harness = Harness::new(UVec2::new(1280, 720));
        let plan = harness.frame(&scenario_config(estimator, SplitMode::Quad), 0);

        assert_eq!(plan.passes_of(PassKind::BuildNormals).count(), 1);
        assert_eq!(plan.passes_of(PassKind::Gather).count(), 1);

        let quadrants: Vec<Viewport> = plan
            .passes_of(PassKind::Occlusion)
            .map(|pass| pass.viewport)
            .collect();
        assert_eq!(quadrants.len(), 4, "{estimator:?}");
        let area: u64 = quadrants.iter().map(Viewport::area).sum();
        assert_eq!(area, plan.occlusion_viewport.area());
        for (i, a) in quadrants.iter().enumerate() {
            assert!(plan.occlusion_viewport.contains(a));
            for b in &quadrants[i + 1..] {
                assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
            }
        }

        let normals = position(&plan, PassKind::BuildNormals).unwrap();
        let first_occlusion = position(&plan, PassKind::Occlusion).unwrap();
        let gather = position(&plan, PassKind::Gather).unwrap();
        let hblur = position(&plan, PassKind::HorizontalBlur).unwrap();
        let vblur = position(&plan, PassKind::VerticalBlur).unwrap();
        assert!(normals < first_occlusion);
        assert!(plan.passes[first_occlusion..gather]
            .iter()
            .all(|pass| pass.kind == PassKind::Occlusion));
        assert!(gather < hblur && hblur < vblur);

        assert_eq!(harness.model.frame_parameters().len(), 4);
        assert_eq!(
            harness.targets.normal_desc().map(|desc| desc.size),
            Some(UVec2::new(1280, 720))
        );
    }
}

#[test]
fn test_sample_count_change_stays_in_bounds() {
    for estimator in ESTIMATORS {
        for split in [SplitMode::Single, SplitMode::Quad] {
            let mut harness = Harness::new(UVec2::new(640, 480));
            let config = scenario_config(estimator, split);
            harness.frame(&config, 0);
            assert_eq!(harness.model.sample_angles().len(), 16);

            let config = config.with_num_samples(11);
            for frame_index in 0..32 {
                harness.frame(&config, frame_index);
                let angles = harness.model.sample_angles();
                assert_eq!(angles.len(), 11);

                let split_count = split.split_count();
                for (i, frame) in harness.model.frame_parameters().iter().enumerate() {
                    let index = sequence::rotation_index(i, frame_index, split_count, angles.len())
                        .unwrap();
                    assert!(index < angles.len());
                    assert_eq!(frame.angle_info[0], angles[index]);
                }
            }
        }
    }
}

#[test]
fn test_normal_buffer_reallocates_on_level_change() {
    for estimator in ESTIMATORS {
        let size = UVec2::new(1920, 1080);
        let mut harness = Harness::new(size);
        let config = AmbientOcclusionConfig::for_estimator(estimator)
            .with_split(SplitMode::Quad)
            .with_resolution_level(2);

        harness.frame(&config, 0);
        assert_eq!(harness.targets.normal_level(), Some(2));
        assert_eq!(
            harness.targets.normal_desc().map(|desc| desc.size),
            Some(size >> 2)
        );
        let created = harness.allocator.created.get();

        // same level again reuses everything
        harness.frame(&config, 0);
        assert_eq!(harness.allocator.created.get(), created);

        harness.frame(&config.with_resolution_level(3), 0);
        assert_eq!(harness.targets.normal_level(), Some(3));
        assert_eq!(
            harness.targets.normal_desc().map(|desc| desc.size),
            Some(size >> 3)
        );
        assert_eq!(harness.allocator.created.get(), created + 1);
    }
}

#[test]
fn test_depth_source_change_resets_targets() {
    let mut harness = Harness::new(UVec2::new(800, 600));
    let config = AmbientOcclusionConfig::default().with_split(SplitMode::Single);
    harness.frame(&config, 0);
    let created = harness.allocator.created.get();

    harness.size = UVec2::new(1024, 768);
    harness.frame(&config, 0);
    assert_eq!(harness.allocator.created.get(), created + 2);
    assert_eq!(harness.model.source_frame_size(), UVec2::new(1024, 768));
    assert_eq!(
        harness.targets.occlusion_desc().map(|desc| desc.size),
        Some(UVec2::new(1024, 768))
    );
}

#[test]
fn test_config_handle_applies_at_frame_boundary() {
    let handle = ConfigHandle::new(AmbientOcclusionConfig::default());
    let mut seen = 0;
    let mut model = ParameterModel::new();

    let config = handle.snapshot_if_changed(&mut seen).unwrap();
    model.configure(&config);
    assert!(handle.snapshot_if_changed(&mut seen).is_none());

    let editor = handle.clone();
    std::thread::spawn(move || editor.update(|c| c.num_samples = 9))
        .join()
        .unwrap();

    let config = handle.snapshot_if_changed(&mut seen).unwrap();
    let changes = model.configure(&config);
    assert!(changes.samples);
    assert!(!changes.blur);
    assert_eq!(model.sample_angles().len(), 9);
}

#[test]
fn test_config_round_trips_through_json() {
    let dir = std::env::temp_dir().join(format!("ssao-rs-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("ssao.json");

    let config = AmbientOcclusionConfig::for_estimator(EstimatorMode::DistanceBased)
        .with_split(SplitMode::Quad)
        .with_blur(6, 3.0);
    config.save(&path).unwrap();
    let loaded = AmbientOcclusionConfig::load(&path).unwrap();
    assert_eq!(loaded, config);

    std::fs::remove_dir_all(&dir).unwrap();
}
