//! Ambient occlusion configuration.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SsaoError};
use crate::uniforms::BLUR_TAP_CAPACITY;

/// Occlusion estimator used by the occlusion pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EstimatorMode {
    /// Horizon/angle based obscurance. Uses a flat falloff term.
    #[default]
    HorizonBased,
    /// Distance based obscurance. The falloff term is normalized by `radius^6`.
    DistanceBased,
}

impl EstimatorMode {
    /// Exponent applied to the radius by the distance based estimator.
    pub const RADIUS_POWER: f64 = 6.0;

    /// Scale of the falloff-shaping term before radius normalization.
    pub const FALLOFF_TERM: f32 = 10.0;

    /// Computes the falloff-shaping term stored next to the radius.
    pub fn falloff_term(self, radius: f32) -> f32 {
        match self {
            Self::HorizonBased => Self::FALLOFF_TERM,
            Self::DistanceBased => {
                let denom = f64::from(radius).powf(Self::RADIUS_POWER);
                if denom > 0.0 && denom.is_finite() {
                    Self::FALLOFF_TERM * (1.0 / denom) as f32
                } else {
                    0.0
                }
            }
        }
    }

    /// Whether the depth mip chain keeps the nearest sample instead of averaging.
    pub fn uses_nearest_depth_mips(self) -> bool {
        matches!(self, Self::HorizonBased)
    }

    /// Default radius for this estimator.
    pub fn default_radius(self) -> f32 {
        match self {
            Self::HorizonBased => 0.3,
            Self::DistanceBased => 0.5,
        }
    }

    /// Default falloff angle for this estimator.
    pub fn default_falloff_angle(self) -> f32 {
        match self {
            Self::HorizonBased => 0.3,
            Self::DistanceBased => 0.01,
        }
    }

    /// Default sample count for this estimator.
    pub fn default_num_samples(self) -> u32 {
        match self {
            Self::HorizonBased => 3,
            Self::DistanceBased => 16,
        }
    }
}

/// How the occlusion pass is distributed over the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SplitMode {
    /// One pass over the full occlusion viewport.
    Single,
    /// Four interleaved quadrant passes, recombined by a gather pass.
    #[default]
    Quad,
}

impl SplitMode {
    /// Number of sub-viewport splits.
    pub fn split_count(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Quad => 4,
        }
    }

    /// Pixel offsets used for interleaved sampling, one per split.
    pub fn pixel_offsets(self) -> &'static [[i32; 2]] {
        match self {
            Self::Single => &[[0, 0]],
            Self::Quad => &[[0, 0], [1, 0], [1, 1], [0, 1]],
        }
    }

    /// Whether normals are rebuilt into their own buffer before the occlusion pass.
    pub fn builds_normals(self) -> bool {
        matches!(self, Self::Quad)
    }
}

/// Ambient occlusion configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientOcclusionConfig {
    /// Whether the effect runs at all.
    pub enabled: bool,
    /// Occlusion estimator.
    pub estimator: EstimatorMode,
    /// Split rendering mode.
    pub split: SplitMode,
    /// Sampling radius in view-space units.
    pub radius: f32,
    /// Scale applied to the projected radius.
    pub perspective_scale: f32,
    /// Strength of the obscurance.
    pub obscurance_level: f32,
    /// Angle below which occluders are ignored.
    pub falloff_angle: f32,
    /// Depth sensitivity of the bilateral blur (higher = sharper edges).
    pub edge_sharpness: f32,
    /// Standard deviation of the blur kernel, in taps.
    pub blur_deviation: f32,
    /// Number of spiral turns of the sampling pattern.
    pub num_spiral_turns: f32,
    /// Samples per pixel.
    pub num_samples: u32,
    /// Downscale exponent of the occlusion resolution.
    pub resolution_level: u32,
    /// Blur radius in taps.
    pub blur_radius: u32,
    /// Per-pixel rotation of the sampling pattern.
    pub dithering_enabled: bool,
    /// Fade occlusion out near the screen border.
    pub bordering_enabled: bool,
    /// Fetch depth from mips for distant samples.
    pub fetch_mips_enabled: bool,
    /// Rotate the sampling pattern from frame to frame.
    pub temporal_rotation: bool,
}

impl Default for AmbientOcclusionConfig {
    fn default() -> Self {
        Self::for_estimator(EstimatorMode::default())
    }
}

impl AmbientOcclusionConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with the defaults of the given estimator.
    pub fn for_estimator(estimator: EstimatorMode) -> Self {
        Self {
            enabled: true,
            estimator,
            split: SplitMode::default(),
            radius: estimator.default_radius(),
            perspective_scale: 1.0,
            obscurance_level: 0.5,
            falloff_angle: estimator.default_falloff_angle(),
            edge_sharpness: 1.0,
            blur_deviation: 2.5,
            num_spiral_turns: 7.0,
            num_samples: estimator.default_num_samples(),
            resolution_level: 2,
            blur_radius: 4,
            dithering_enabled: true,
            bordering_enabled: true,
            fetch_mips_enabled: true,
            temporal_rotation: false,
        }
    }

    /// Sets the split mode.
    pub fn with_split(mut self, split: SplitMode) -> Self {
        self.split = split;
        self
    }

    /// Sets the sampling radius.
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    /// Sets the sample count.
    pub fn with_num_samples(mut self, num_samples: u32) -> Self {
        self.num_samples = num_samples;
        self
    }

    /// Sets the resolution level.
    pub fn with_resolution_level(mut self, level: u32) -> Self {
        self.resolution_level = level;
        self
    }

    /// Sets the blur radius and deviation.
    pub fn with_blur(mut self, radius: u32, deviation: f32) -> Self {
        self.blur_radius = radius;
        self.blur_deviation = deviation;
        self
    }

    /// Enables or disables temporal rotation of the sampling pattern.
    pub fn with_temporal_rotation(mut self, enabled: bool) -> Self {
        self.temporal_rotation = enabled;
        self
    }

    /// Checks the invariants the parameter model relies on.
    pub fn validate(&self) -> Result<()> {
        let floats = [
            ("radius", self.radius),
            ("perspective_scale", self.perspective_scale),
            ("obscurance_level", self.obscurance_level),
            ("falloff_angle", self.falloff_angle),
            ("edge_sharpness", self.edge_sharpness),
            ("blur_deviation", self.blur_deviation),
            ("num_spiral_turns", self.num_spiral_turns),
        ];
        for (name, value) in floats {
            if !value.is_finite() {
                return Err(SsaoError::InvalidConfig(format!("{name} must be finite")));
            }
        }
        if self.num_samples == 0 {
            return Err(SsaoError::InvalidConfig(
                "num_samples must be greater than zero".into(),
            ));
        }
        if self.blur_radius as usize + 2 > BLUR_TAP_CAPACITY {
            return Err(SsaoError::InvalidConfig(format!(
                "blur_radius {} exceeds the {} available filter taps",
                self.blur_radius, BLUR_TAP_CAPACITY
            )));
        }
        Ok(())
    }

    /// Serializes the configuration to pretty JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// Loads a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Configuration of the occlusion debug overlay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugOcclusionConfig {
    /// Whether the overlay is drawn.
    pub show_cursor_pixel: bool,
    /// Cursor position in normalized texture coordinates.
    pub debug_cursor_texcoord: Vec2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_horizon_based() {
        let config = AmbientOcclusionConfig::default();
        assert_eq!(config.estimator, EstimatorMode::HorizonBased);
        assert_eq!(config.radius, 0.3);
        assert_eq!(config.num_samples, 3);
        assert_eq!(config.resolution_level, 2);
        assert_eq!(config.blur_radius, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_distance_based_defaults() {
        let config = AmbientOcclusionConfig::for_estimator(EstimatorMode::DistanceBased);
        assert_eq!(config.radius, 0.5);
        assert_eq!(config.falloff_angle, 0.01);
        assert_eq!(config.num_samples, 16);
    }

    #[test]
    fn test_falloff_term() {
        assert_eq!(EstimatorMode::HorizonBased.falloff_term(0.5), 10.0);
        let term = EstimatorMode::DistanceBased.falloff_term(0.5);
        assert!((term - 640.0).abs() < 1e-3);
        assert_eq!(EstimatorMode::DistanceBased.falloff_term(0.0), 0.0);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = AmbientOcclusionConfig::new().with_num_samples(0);
        assert!(config.validate().is_err());

        let config = AmbientOcclusionConfig::new().with_radius(f32::NAN);
        assert!(config.validate().is_err());

        let config = AmbientOcclusionConfig::new().with_blur(15, 2.0);
        assert!(config.validate().is_err());

        let config = AmbientOcclusionConfig::new().with_blur(14, 2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip_with_missing_fields() {
        let config = AmbientOcclusionConfig::new()
            .with_split(SplitMode::Single)
            .with_blur(6, 3.0);
        let json = config.to_json_string().unwrap();
        assert_eq!(AmbientOcclusionConfig::from_json_str(&json).unwrap(), config);

        let partial = AmbientOcclusionConfig::from_json_str(r#"{ "num_samples": 11 }"#).unwrap();
        assert_eq!(partial.num_samples, 11);
        assert_eq!(partial.blur_radius, 4);
    }

    #[test]
    fn test_json_rejects_invalid_config() {
        assert!(AmbientOcclusionConfig::from_json_str(r#"{ "num_samples": 0 }"#).is_err());
        assert!(AmbientOcclusionConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join("ssao_config_test.json");
        let config = AmbientOcclusionConfig::for_estimator(EstimatorMode::DistanceBased);
        config.save(&path).unwrap();
        let loaded = AmbientOcclusionConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_split_offsets() {
        assert_eq!(SplitMode::Single.pixel_offsets(), &[[0, 0]]);
        assert_eq!(
            SplitMode::Quad.pixel_offsets(),
            &[[0, 0], [1, 0], [1, 1], [0, 1]]
        );
        assert_eq!(SplitMode::Quad.split_count(), 4);
        assert!(!SplitMode::Single.builds_normals());
    }
}
