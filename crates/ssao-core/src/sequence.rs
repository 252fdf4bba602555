//! Low-discrepancy rotation angles for the sampling pattern.

use std::f32::consts::PI;

/// Base of the radical inverse used for rotation angles.
pub const ROTATION_BASE: u32 = 3;

/// Van der Corput radical inverse of `index` in the given base.
pub fn radical_inverse(mut index: u32, base: u32) -> f32 {
    let inv_base = 1.0 / base as f32;
    let mut f = 1.0f32;
    let mut r = 0.0f32;
    while index > 0 {
        f *= inv_base;
        r += f * (index % base) as f32;
        index /= base;
    }
    r
}

/// Generates `n` rotation angles in `[0, π / n)`.
///
/// Indices start at 1 so the first angle is not zero.
pub fn sample_rotation_angles(n: u32) -> Vec<f32> {
    if n == 0 {
        return Vec::new();
    }
    let scale = PI / n as f32;
    (1..=n)
        .map(|index| radical_inverse(index, ROTATION_BASE) * scale)
        .collect()
}

/// Number of consecutive table entries each frame advances by.
pub fn samples_per_split(len: usize, split_count: usize) -> usize {
    len / split_count.max(1)
}

/// Index into the angle table for a split at a given frame.
///
/// Returns `None` for an empty table; otherwise the index is always in bounds.
pub fn rotation_index(split: usize, frame: u32, split_count: usize, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let stride = samples_per_split(len, split_count);
    Some((split + stride * frame as usize) % len)
}

/// Next frame index when temporal rotation is enabled.
pub fn next_frame_index(frame: u32, len: usize, split_count: usize) -> u32 {
    let cycle = samples_per_split(len, split_count).max(1);
    ((frame as usize + 1) % cycle) as u32
}
