//! GPU-visible parameter blocks.
//!
//! All blocks are `#[repr(C)]` and laid out as arrays of `vec4<f32>` so they
//! match the WGSL uniform declarations in the render crate without padding rules.

use glam::{Mat4, UVec2};

/// Number of blur filter taps stored in [`AoParameters`].
pub const BLUR_TAP_CAPACITY: usize = 16;

/// Effect-wide occlusion parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AoParameters {
    /// x: resolution level, y: half-resolution depth flag, z: perspective scale.
    pub resolution_info: [f32; 4],
    /// x: radius, y: radius², z: falloff-shaping term, w: obscurance level.
    pub radius_info: [f32; 4],
    /// x: dithering, y: falloff normalization, z: falloff angle, w: bordering.
    pub dithering_info: [f32; 4],
    /// x: sample count, y: inverse sample count, z: spiral turns, w: mip fetch.
    pub sample_info: [f32; 4],
    /// x: edge sharpness, y: blur radius, z: blur deviation.
    pub blur_info: [f32; 4],
    /// One side of the symmetric blur kernel, center first.
    pub blur_filter_taps: [f32; BLUR_TAP_CAPACITY],
}

impl Default for AoParameters {
    fn default() -> Self {
        let mut blur_filter_taps = [0.0; BLUR_TAP_CAPACITY];
        blur_filter_taps[0] = 1.0;
        Self {
            resolution_info: [0.0, 0.0, 1.0, 0.0],
            radius_info: [0.5, 0.25, 10.0, 1.0],
            dithering_info: [0.0, 0.0, 0.01, 1.0],
            sample_info: [11.0, 1.0 / 11.0, 7.0, 1.0],
            blur_info: [1.0, 3.0, 2.0, 0.0],
            blur_filter_taps,
        }
    }
}

impl AoParameters {
    pub fn resolution_level(&self) -> u32 {
        self.resolution_info[0].max(0.0) as u32
    }

    pub fn is_half_resolution(&self) -> bool {
        self.resolution_info[1] > 0.0
    }

    pub fn perspective_scale(&self) -> f32 {
        self.resolution_info[2]
    }

    pub fn radius(&self) -> f32 {
        self.radius_info[0]
    }

    pub fn obscurance_level(&self) -> f32 {
        self.radius_info[3]
    }

    pub fn falloff_angle(&self) -> f32 {
        self.dithering_info[2]
    }

    pub fn is_dithering_enabled(&self) -> bool {
        self.dithering_info[0] != 0.0
    }

    pub fn is_bordering_enabled(&self) -> bool {
        self.dithering_info[3] != 0.0
    }

    pub fn num_samples(&self) -> u32 {
        self.sample_info[0].max(0.0) as u32
    }

    pub fn num_spiral_turns(&self) -> f32 {
        self.sample_info[2]
    }

    pub fn is_fetch_mips_enabled(&self) -> bool {
        self.sample_info[3] != 0.0
    }

    pub fn edge_sharpness(&self) -> f32 {
        self.blur_info[0]
    }

    pub fn blur_radius(&self) -> u32 {
        self.blur_info[1].max(0.0) as u32
    }

    pub fn blur_deviation(&self) -> f32 {
        self.blur_info[2]
    }

    /// The blur taps actually used by the current radius (center first).
    pub fn active_taps(&self) -> &[f32] {
        let count = (self.blur_radius() as usize + 1).min(BLUR_TAP_CAPACITY);
        &self.blur_filter_taps[..count]
    }
}

/// Per-split frame parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameParameters {
    /// xy: pixel offset of this split inside each 2x2 interleave cell.
    pub pixel_offsets: [i32; 4],
    /// x: rotation angle of the sampling pattern.
    pub angle_info: [f32; 4],
    /// Occlusion viewport (x, y, width, height) in occlusion-buffer pixels.
    pub occlusion_viewport: [f32; 4],
}

/// Parameters of one bilateral blur direction.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BlurParameters {
    /// x: one texel along the blur axis, y: one occlusion texel, z: height of the pass.
    pub scale_height: [f32; 4],
    /// Scale from an output pixel to the input occlusion texel (xy) and to
    /// the full-resolution depth pixel (zw).
    pub texcoord_scale: [f32; 4],
}

/// Parameters of the debug overlay pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DebugParameters {
    /// xy: cursor texcoord inside the source viewport, zw: unused.
    pub pixel_info: [f32; 4],
    /// Normalized rectangle (s, t, width, height) of the occlusion viewport.
    pub texcoord_rect: [f32; 4],
}

/// Camera data needed to reconstruct view-space positions from linear depth.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameTransform {
    pub projection: [[f32; 4]; 4],
    pub inv_projection: [[f32; 4]; 4],
    /// xy: source size in pixels, zw: inverse size.
    pub pixel_info: [f32; 4],
    /// x: near plane, y: far plane.
    pub depth_info: [f32; 4],
}

impl Default for FrameTransform {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, UVec2::ONE, 0.1, 100.0)
    }
}

impl FrameTransform {
    /// Builds the frame transform for a projection and a source size.
    pub fn new(projection: Mat4, size: UVec2, near: f32, far: f32) -> Self {
        let size = size.max(UVec2::ONE).as_vec2();
        Self {
            projection: projection.to_cols_array_2d(),
            inv_projection: projection.inverse().to_cols_array_2d(),
            pixel_info: [size.x, size.y, 1.0 / size.x, 1.0 / size.y],
            depth_info: [near, far, 0.0, 0.0],
        }
    }
}
