//! Discrete Gaussian blur kernels.
//!
//! A kernel is stored one-sided, center tap first. Each tap is the integral of
//! the normal distribution over a unit-wide bin around its offset, and the last
//! tap integrates the whole remaining tail, so the symmetrized kernel
//! `taps[0] + 2 * (taps[1] + .. + taps[radius])` sums to one.

use std::f64::consts::SQRT_2;

/// How far past the last bin the tail integral is taken, in deviations.
const TAIL_EXTENT: f32 = 1000.0;

/// Integral of the centered normal distribution from 0 to `x`.
pub fn integral(x: f32, deviation: f32) -> f64 {
    0.5 * libm::erf(f64::from(x) / (f64::from(deviation) * SQRT_2))
}

/// Integral of the centered normal distribution over `[x0, x1]`.
pub fn range_integral(x0: f32, x1: f32, deviation: f32) -> f64 {
    integral(x1, deviation) - integral(x0, deviation)
}

/// Evaluates the one-sided taps of a Gaussian kernel of the given radius.
///
/// Returns `radius + 1` weights. A radius of zero or less yields `[1.0]`, and a
/// non-positive deviation concentrates all weight on the center tap.
pub fn eval_sampling(radius: i32, deviation: f32) -> Vec<f32> {
    let Ok(radius) = usize::try_from(radius) else {
        return vec![1.0];
    };
    let mut taps = vec![0.0f32; radius + 1];
    if radius == 0 || !(deviation > 0.0 && deviation.is_finite()) {
        taps[0] = 1.0;
        return taps;
    }

    let half_width = 0.5f32;
    for (i, tap) in taps.iter_mut().take(radius).enumerate() {
        let x = i as f32;
        *tap = range_integral(x - half_width, x + half_width, deviation) as f32;
    }

    // last tap goes to infinity
    let last_x0 = radius as f32 - half_width;
    let large_enough = last_x0 + TAIL_EXTENT * deviation;
    taps[radius] = range_integral(last_x0, large_enough, deviation) as f32;

    taps
}

/// Evaluates a kernel into a fixed-capacity destination.
///
/// The destination must hold at least `radius + 2` entries; otherwise nothing
/// is written and `false` is returned. Entries past the kernel are zeroed.
pub fn eval_sampling_into(dst: &mut [f32], radius: i32, deviation: f32) -> bool {
    let taps = eval_sampling(radius, deviation);
    if dst.len() < taps.len() + 1 {
        log::warn!(
            "blur kernel of radius {radius} does not fit in {} taps, keeping previous weights",
            dst.len()
        );
        return false;
    }
    dst[..taps.len()].copy_from_slice(&taps);
    dst[taps.len()..].fill(0.0);
    true
}

/// Sums a one-sided kernel as if mirrored around its center tap.
pub fn symmetric_sum(taps: &[f32]) -> f64 {
    let Some((center, sides)) = taps.split_first() else {
        return 0.0;
    };
    f64::from(*center) + 2.0 * sides.iter().map(|t| f64::from(*t)).sum::<f64>()
}
