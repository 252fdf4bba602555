//! Parameter model: derives the GPU parameter blocks from a configuration.
//!
//! Every field of [`AmbientOcclusionConfig`] is compared against the last
//! applied value, and only the fields that changed are written. Derived data
//! (blur kernel, blur scales, rotation table) is rebuilt at most once per
//! [`ParameterModel::configure`] call, after all comparisons.

use glam::UVec2;

use crate::config::{AmbientOcclusionConfig, EstimatorMode, SplitMode};
use crate::kernel;
use crate::sequence;
use crate::uniforms::{AoParameters, BlurParameters, FrameParameters, BLUR_TAP_CAPACITY};
use crate::viewport::Viewport;

/// Largest number of occlusion splits.
pub const MAX_SPLITS: usize = 4;

/// Largest blur radius the filter taps can hold.
pub const MAX_BLUR_RADIUS: u32 = (BLUR_TAP_CAPACITY - 2) as u32;

/// A parameter block with an edit version.
///
/// Writers go through [`ParameterBlock::edit`], which bumps the version; the
/// GPU side re-uploads a block only when its version differs from the one it
/// last uploaded.
#[derive(Debug, Clone, Default)]
pub struct ParameterBlock<T> {
    value: T,
    version: u64,
}

impl<T> ParameterBlock<T> {
    pub fn new(value: T) -> Self {
        Self { value, version: 1 }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn edit(&mut self) -> &mut T {
        self.version += 1;
        &mut self.value
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

impl<T: PartialEq> ParameterBlock<T> {
    /// Replaces the value, bumping the version only if it actually changed.
    pub fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        *self.edit() = value;
        true
    }
}

impl<T> std::ops::Deref for ParameterBlock<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// Which groups of parameters a [`ParameterModel::configure`] call touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ConfigChanges {
    pub resolution: bool,
    pub radius: bool,
    pub dithering: bool,
    pub samples: bool,
    pub blur: bool,
    pub split: bool,
    pub enabled: bool,
}

impl ConfigChanges {
    pub fn any(&self) -> bool {
        self.resolution
            || self.radius
            || self.dithering
            || self.samples
            || self.blur
            || self.split
            || self.enabled
    }
}

/// Counters of derived recomputations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecomputeStats {
    pub gaussian: u32,
    pub blur_scales: u32,
    pub sample_sequence: u32,
}

impl RecomputeStats {
    pub fn total(&self) -> u32 {
        self.gaussian + self.blur_scales + self.sample_sequence
    }
}

/// Owns the effect's parameter blocks and keeps them in sync with the configuration.
#[derive(Debug, Clone)]
pub struct ParameterModel {
    applied: Option<AmbientOcclusionConfig>,
    ao: ParameterBlock<AoParameters>,
    /// One block per possible split; only the first `split_count` are active.
    frames: [ParameterBlock<FrameParameters>; MAX_SPLITS],
    split_count: usize,
    hblur: ParameterBlock<BlurParameters>,
    vblur: ParameterBlock<BlurParameters>,
    sample_angles: Vec<f32>,
    source_frame_size: UVec2,
    blur_scales_dirty: bool,
    stats: RecomputeStats,
}

impl Default for ParameterModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterModel {
    /// Creates a model holding default parameters. Nothing is applied until
    /// the first [`configure`](Self::configure).
    pub fn new() -> Self {
        Self {
            applied: None,
            ao: ParameterBlock::new(AoParameters::default()),
            frames: std::array::from_fn(|_| ParameterBlock::new(FrameParameters::default())),
            split_count: 1,
            hblur: ParameterBlock::new(BlurParameters::default()),
            vblur: ParameterBlock::new(BlurParameters::default()),
            sample_angles: Vec::new(),
            source_frame_size: UVec2::ZERO,
            blur_scales_dirty: true,
            stats: RecomputeStats::default(),
        }
    }

    /// Applies a configuration, writing only the fields that changed.
    #[allow(clippy::too_many_lines, clippy::float_cmp)]
    pub fn configure(&mut self, config: &AmbientOcclusionConfig) -> ConfigChanges {
        let previous = self.applied.take();
        let mut changes = ConfigChanges::default();
        let mut update_gaussian = false;

        macro_rules! changed {
            ($field:ident) => {
                previous.as_ref().map_or(true, |p| p.$field != config.$field)
            };
        }

        if changed!(enabled) {
            changes.enabled = true;
        }

        if changed!(radius) || changed!(estimator) {
            let radius = config.radius;
            let current = &mut self.ao.edit().radius_info;
            current[0] = radius;
            current[1] = radius * radius;
            current[2] = config.estimator.falloff_term(radius);
            changes.radius = true;
        }

        if changed!(obscurance_level) {
            self.ao.edit().radius_info[3] = config.obscurance_level;
            changes.radius = true;
        }

        if changed!(falloff_angle) {
            let angle = config.falloff_angle;
            let current = &mut self.ao.edit().dithering_info;
            current[2] = angle;
            current[1] = if angle < 1.0 { 1.0 / (1.0 - angle) } else { 0.0 };
            changes.dithering = true;
        }

        if changed!(edge_sharpness) {
            self.ao.edit().blur_info[0] = config.edge_sharpness;
            changes.blur = true;
        }

        if changed!(blur_deviation) {
            self.ao.edit().blur_info[2] = config.blur_deviation;
            update_gaussian = true;
            changes.blur = true;
        }

        if changed!(num_spiral_turns) {
            self.ao.edit().sample_info[2] = config.num_spiral_turns;
            changes.samples = true;
        }

        if changed!(num_samples) {
            let n = config.num_samples;
            let current = &mut self.ao.edit().sample_info;
            current[0] = n as f32;
            current[1] = if n > 0 { 1.0 / n as f32 } else { 0.0 };
            self.sample_angles = sequence::sample_rotation_angles(n);
            self.stats.sample_sequence += 1;
            changes.samples = true;
        }

        if changed!(fetch_mips_enabled) {
            self.ao.edit().sample_info[3] = f32::from(u8::from(config.fetch_mips_enabled));
            changes.samples = true;
        }

        if changed!(perspective_scale) {
            self.ao.edit().resolution_info[2] = config.perspective_scale;
            changes.resolution = true;
        }

        if changed!(split) {
            self.split_count = config.split.split_count().min(MAX_SPLITS);
            changes.split = true;
        }

        if changed!(resolution_level) || changed!(split) {
            let level = config.resolution_level;
            let current = &mut self.ao.edit().resolution_info;
            current[0] = level as f32;
            current[1] = if level > 0 { 1.0 } else { 0.0 };
            self.blur_scales_dirty = true;
            self.reset_pixel_offsets(config.split);
            changes.resolution = true;
        }

        if changed!(blur_radius) {
            self.ao.edit().blur_info[1] = config.blur_radius.min(MAX_BLUR_RADIUS) as f32;
            update_gaussian = true;
            changes.blur = true;
        }

        if changed!(dithering_enabled) {
            self.ao.edit().dithering_info[0] = f32::from(u8::from(config.dithering_enabled));
            changes.dithering = true;
        }

        if changed!(bordering_enabled) {
            self.ao.edit().dithering_info[3] = f32::from(u8::from(config.bordering_enabled));
            changes.dithering = true;
        }

        self.applied = Some(config.clone());

        if update_gaussian {
            self.update_gaussian_distribution();
        }
        if self.blur_scales_dirty {
            self.update_blur_parameters();
        }

        changes
    }

    fn reset_pixel_offsets(&mut self, split: SplitMode) {
        for (frame, offset) in self.frames[..self.split_count]
            .iter_mut()
            .zip(split.pixel_offsets())
        {
            let offsets = [offset[0], offset[1], 0, 0];
            if frame.pixel_offsets != offsets {
                frame.edit().pixel_offsets = offsets;
            }
        }
    }

    fn update_gaussian_distribution(&mut self) {
        let radius = i32::try_from(self.ao.blur_radius()).unwrap_or(i32::MAX);
        let deviation = self.ao.blur_deviation();
        kernel::eval_sampling_into(&mut self.ao.edit().blur_filter_taps, radius, deviation);
        self.stats.gaussian += 1;
    }

    /// Records the size of the source depth buffer and rebuilds the blur
    /// scales if it changed.
    pub fn set_source_frame_size(&mut self, size: UVec2) {
        if self.source_frame_size != size {
            self.source_frame_size = size;
            self.blur_scales_dirty = true;
        }
        if self.blur_scales_dirty {
            self.update_blur_parameters();
        }
    }

    /// Rebuilds both blur direction blocks. Stays dirty while the frame size is unknown.
    fn update_blur_parameters(&mut self) {
        let size = self.source_frame_size;
        if size.x == 0 || size.y == 0 {
            return;
        }
        let level = self.ao.resolution_level().min(31);
        let scale = (1u32 << level) as f32;
        let inv_scale = 0.5f32.powi(level as i32);
        let (w, h) = (size.x as f32, size.y as f32);

        // horizontal pass: full-resolution columns, occlusion-resolution rows
        self.hblur.set(BlurParameters {
            scale_height: [1.0 / w, scale / w, (size.y >> level) as f32, 0.0],
            texcoord_scale: [inv_scale, 1.0, 1.0, scale],
        });
        // vertical pass runs after the upscale, so its height stays unscaled
        self.vblur.set(BlurParameters {
            scale_height: [1.0 / h, scale / h, h, 0.0],
            texcoord_scale: [1.0, inv_scale, 1.0, 1.0],
        });
        self.blur_scales_dirty = false;
        self.stats.blur_scales += 1;
    }

    /// Writes the per-split rotation angles and occlusion viewport for a frame.
    pub fn prepare_frame(&mut self, frame_index: u32, occlusion_viewport: Viewport) {
        let split_count = self.split_count;
        let len = self.sample_angles.len();
        let viewport = occlusion_viewport.to_vec4().to_array();
        let angles = &self.sample_angles;
        for (split, frame) in self.frames[..split_count].iter_mut().enumerate() {
            let angle = sequence::rotation_index(split, frame_index, split_count, len)
                .map_or(0.0, |index| angles[index]);
            if frame.angle_info[0] != angle {
                frame.edit().angle_info[0] = angle;
            }
            if frame.occlusion_viewport != viewport {
                frame.edit().occlusion_viewport = viewport;
            }
        }
    }

    /// The last applied configuration, if any.
    pub fn applied(&self) -> Option<&AmbientOcclusionConfig> {
        self.applied.as_ref()
    }

    pub fn estimator(&self) -> EstimatorMode {
        self.applied
            .as_ref()
            .map_or_else(EstimatorMode::default, |c| c.estimator)
    }

    pub fn split(&self) -> SplitMode {
        self.applied
            .as_ref()
            .map_or_else(SplitMode::default, |c| c.split)
    }

    pub fn ao_parameters(&self) -> &ParameterBlock<AoParameters> {
        &self.ao
    }

    /// The frame blocks of the active splits.
    pub fn frame_parameters(&self) -> &[ParameterBlock<FrameParameters>] {
        &self.frames[..self.split_count]
    }

    pub fn hblur_parameters(&self) -> &ParameterBlock<BlurParameters> {
        &self.hblur
    }

    pub fn vblur_parameters(&self) -> &ParameterBlock<BlurParameters> {
        &self.vblur
    }

    /// The full rotation-angle table.
    pub fn sample_angles(&self) -> &[f32] {
        &self.sample_angles
    }

    pub fn source_frame_size(&self) -> UVec2 {
        self.source_frame_size
    }

    pub fn recompute_stats(&self) -> RecomputeStats {
        self.stats
    }

    /// Total number of derived recomputations so far.
    pub fn recompute_count(&self) -> u32 {
        self.stats.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::symmetric_sum;

    fn configured(config: &AmbientOcclusionConfig) -> ParameterModel {
        let mut model = ParameterModel::new();
        model.configure(config);
        model
    }

    #[test]
    fn test_parameter_block_versions() {
        let mut block = ParameterBlock::new(1u32);
        assert_eq!(block.version(), 1);
        assert!(!block.set(1));
        assert_eq!(block.version(), 1);
        assert!(block.set(2));
        assert_eq!(block.version(), 2);
        *block.edit() = 3;
        assert_eq!(*block.get(), 3);
        assert_eq!(block.version(), 3);
    }

    #[test]
    fn test_first_configure_writes_everything() {
        let config = AmbientOcclusionConfig::default();
        let mut model = ParameterModel::new();
        let changes = model.configure(&config);
        assert!(changes.radius && changes.blur && changes.samples && changes.resolution);

        let ao = model.ao_parameters();
        assert_eq!(ao.radius(), 0.3);
        assert!((ao.radius_info[1] - 0.09).abs() < 1e-6);
        assert_eq!(ao.radius_info[2], 10.0);
        assert_eq!(ao.num_samples(), 3);
        assert_eq!(ao.resolution_level(), 2);
        assert!(ao.is_half_resolution());
        assert!((symmetric_sum(ao.active_taps()) - 1.0).abs() < 1e-5);
        assert_eq!(model.sample_angles().len(), 3);
    }

    #[test]
    fn test_configure_is_idempotent() {
        let config = AmbientOcclusionConfig::default()
            .with_resolution_level(0)
            .with_num_samples(16)
            .with_blur(4, 2.5);
        let mut model = ParameterModel::new();
        model.set_source_frame_size(UVec2::new(640, 480));
        model.configure(&config);
        let count = model.recompute_count();
        let version = model.ao_parameters().version();

        let changes = model.configure(&config);
        assert!(!changes.any());
        assert_eq!(model.recompute_count(), count);
        assert_eq!(model.ao_parameters().version(), version);
    }

    #[test]
    fn test_recompute_happens_once_per_call() {
        let mut model = configured(&AmbientOcclusionConfig::default());
        let before = model.recompute_stats();
        let config = AmbientOcclusionConfig::default().with_blur(6, 3.0);
        model.configure(&config);
        let after = model.recompute_stats();
        assert_eq!(after.gaussian, before.gaussian + 1);
        assert_eq!(after.sample_sequence, before.sample_sequence);
    }

    #[test]
    fn test_distance_based_radius_term() {
        let config = AmbientOcclusionConfig::for_estimator(EstimatorMode::DistanceBased);
        let model = configured(&config);
        let term = model.ao_parameters().radius_info[2];
        assert!((term - 640.0).abs() < 1e-3);

        let mut model = configured(&AmbientOcclusionConfig::default().with_radius(0.5));
        assert_eq!(model.ao_parameters().radius_info[2], 10.0);
        let mut switched = AmbientOcclusionConfig::default().with_radius(0.5);
        switched.estimator = EstimatorMode::DistanceBased;
        model.configure(&switched);
        assert!((model.ao_parameters().radius_info[2] - 640.0).abs() < 1e-3);
    }

    #[test]
    fn test_falloff_normalization() {
        let mut config = AmbientOcclusionConfig::default();
        config.falloff_angle = 0.5;
        let model = configured(&config);
        assert_eq!(model.ao_parameters().dithering_info[1], 2.0);

        config.falloff_angle = 1.0;
        let model = configured(&config);
        assert_eq!(model.ao_parameters().dithering_info[1], 0.0);
    }

    #[test]
    fn test_pixel_offsets_follow_split_mode() {
        let mut model = configured(&AmbientOcclusionConfig::default());
        let offsets: Vec<[i32; 2]> = model
            .frame_parameters()
            .iter()
            .map(|f| [f.pixel_offsets[0], f.pixel_offsets[1]])
            .collect();
        assert_eq!(offsets, vec![[0, 0], [1, 0], [1, 1], [0, 1]]);

        model.configure(&AmbientOcclusionConfig::default().with_split(SplitMode::Single));
        assert_eq!(model.frame_parameters().len(), 1);
        assert_eq!(model.frame_parameters()[0].pixel_offsets, [0, 0, 0, 0]);
    }

    #[test]
    fn test_blur_scales_wait_for_frame_size() {
        let mut model = configured(&AmbientOcclusionConfig::default().with_resolution_level(1));
        assert_eq!(model.recompute_stats().blur_scales, 0);

        model.set_source_frame_size(UVec2::new(800, 600));
        assert_eq!(model.recompute_stats().blur_scales, 1);
        let h = model.hblur_parameters();
        assert_eq!(h.scale_height, [1.0 / 800.0, 2.0 / 800.0, 300.0, 0.0]);
        assert_eq!(h.texcoord_scale, [0.5, 1.0, 1.0, 2.0]);
        let v = model.vblur_parameters();
        assert_eq!(v.scale_height, [1.0 / 600.0, 2.0 / 600.0, 600.0, 0.0]);
        assert_eq!(v.texcoord_scale, [1.0, 0.5, 1.0, 1.0]);

        // same size again: nothing to do
        model.set_source_frame_size(UVec2::new(800, 600));
        assert_eq!(model.recompute_stats().blur_scales, 1);
    }

    #[test]
    fn test_prepare_frame_uses_rotation_table() {
        let config = AmbientOcclusionConfig::default().with_num_samples(16);
        let mut model = configured(&config);
        model.prepare_frame(1, Viewport::new(0, 0, 320, 240));
        let angles = model.sample_angles().to_vec();
        for (split, frame) in model.frame_parameters().iter().enumerate() {
            assert_eq!(frame.angle_info[0], angles[split + 4]);
            assert_eq!(frame.occlusion_viewport, [0.0, 0.0, 320.0, 240.0]);
        }

        let versions: Vec<u64> = model.frame_parameters().iter().map(|f| f.version()).collect();
        model.prepare_frame(1, Viewport::new(0, 0, 320, 240));
        let again: Vec<u64> = model.frame_parameters().iter().map(|f| f.version()).collect();
        assert_eq!(versions, again);
    }

    #[test]
    fn test_oversized_blur_radius_is_clamped() {
        let mut model = configured(&AmbientOcclusionConfig::default());
        model.configure(&AmbientOcclusionConfig::default().with_blur(20, 2.5));
        let ao = model.ao_parameters();
        assert_eq!(ao.blur_radius(), MAX_BLUR_RADIUS);
        assert_eq!(ao.active_taps().len(), MAX_BLUR_RADIUS as usize + 1);
        assert!((symmetric_sum(ao.active_taps()) - 1.0).abs() < 1e-5);
    }

    /// Mirrors the GPU side: one uploaded (version, value) per buffer slot.
    fn upload(model: &ParameterModel, uploaded: &mut [(u64, FrameParameters); MAX_SPLITS]) {
        for (block, slot) in model.frame_parameters().iter().zip(uploaded.iter_mut()) {
            if block.version() != slot.0 {
                *slot = (block.version(), *block.get());
            }
        }
    }

    #[test]
    fn test_split_round_trip_never_reuses_a_version() {
        let quad = AmbientOcclusionConfig::default()
            .with_split(SplitMode::Quad)
            .with_num_samples(16);
        let single = quad.clone().with_split(SplitMode::Single);
        let mut model = ParameterModel::new();
        let mut uploaded = [(0, FrameParameters::default()); MAX_SPLITS];

        let frames = [
            (&quad, Viewport::new(0, 0, 160, 120)),
            (&single, Viewport::new(0, 0, 320, 240)),
            (&quad, Viewport::new(0, 0, 320, 240)),
            (&single, Viewport::new(0, 0, 640, 480)),
            (&quad, Viewport::new(0, 0, 160, 120)),
        ];
        for (config, viewport) in frames {
            model.configure(config);
            model.prepare_frame(0, viewport);
            upload(&model, &mut uploaded);

            assert_eq!(model.frame_parameters().len(), config.split.split_count());
            for (block, (_, value)) in model.frame_parameters().iter().zip(&uploaded) {
                assert_eq!(block.get(), value, "{:?} {viewport:?}", config.split);
                assert_eq!(value.occlusion_viewport, viewport.to_vec4().to_array());
            }
        }
    }
}
