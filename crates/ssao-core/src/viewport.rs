//! Pixel viewports and their split into interleaved quadrants.

use glam::{UVec2, Vec4};
use serde::{Deserialize, Serialize};

/// An axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A viewport covering a whole surface of the given size.
    pub fn from_size(size: UVec2) -> Self {
        Self::new(0, 0, size.x, size.y)
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Downscales origin and size by `2^level`.
    #[must_use]
    pub fn downscaled(&self, level: u32) -> Self {
        let level = level.min(31);
        Self::new(
            self.x >> level,
            self.y >> level,
            self.width >> level,
            self.height >> level,
        )
    }

    /// Keeps the columns and downscales the rows (origin and height) by `2^level`.
    #[must_use]
    pub fn with_downscaled_height(&self, level: u32) -> Self {
        let level = level.min(31);
        Self {
            y: self.y >> level,
            height: self.height >> level,
            ..*self
        }
    }

    /// Whether two viewports share at least one pixel.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    /// Whether `other` lies entirely inside this viewport.
    pub fn contains(&self, other: &Self) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }

    /// Splits the viewport into the four interleaved-sampling quadrants.
    ///
    /// Quadrant `i` holds the pixels whose position parity matches split `i`'s
    /// pixel offset: `(0,0)` at the origin, `(1,0)` to its right, `(1,1)` below
    /// that, `(0,1)` back at the left edge. Even columns/rows get the rounded-up
    /// half, so the quadrants tile the viewport exactly for any size.
    pub fn quadrants(&self) -> [Self; 4] {
        let even_w = self.width - self.width / 2;
        let odd_w = self.width / 2;
        let even_h = self.height - self.height / 2;
        let odd_h = self.height / 2;
        [
            Self::new(self.x, self.y, even_w, even_h),
            Self::new(self.x + even_w, self.y, odd_w, even_h),
            Self::new(self.x + even_w, self.y + even_h, odd_w, odd_h),
            Self::new(self.x, self.y + even_h, even_w, odd_h),
        ]
    }

    /// The viewport as `(x, y, width, height)` floats.
    pub fn to_vec4(&self) -> Vec4 {
        Vec4::new(
            self.x as f32,
            self.y as f32,
            self.width as f32,
            self.height as f32,
        )
    }

    /// The viewport normalized against a surface size, as `(s, t, width, height)`.
    pub fn normalized_in(&self, size: UVec2) -> Vec4 {
        let size = size.max(UVec2::ONE).as_vec2();
        Vec4::new(
            self.x as f32 / size.x,
            self.y as f32 / size.y,
            self.width as f32 / size.x,
            self.height as f32 / size.y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_downscale() {
        let vp = Viewport::new(8, 4, 1920, 1080);
        assert_eq!(vp.downscaled(1), Viewport::new(4, 2, 960, 540));
        assert_eq!(vp.downscaled(0), vp);
        assert_eq!(vp.with_downscaled_height(2), Viewport::new(8, 1, 1920, 270));
    }

    #[test]
    fn test_even_quadrants() {
        let q = Viewport::new(0, 0, 640, 360).quadrants();
        assert_eq!(q[0], Viewport::new(0, 0, 320, 180));
        assert_eq!(q[1], Viewport::new(320, 0, 320, 180));
        assert_eq!(q[2], Viewport::new(320, 180, 320, 180));
        assert_eq!(q[3], Viewport::new(0, 180, 320, 180));
    }

    #[test]
    fn test_normalized() {
        let rect = Viewport::new(10, 20, 100, 50).normalized_in(UVec2::new(200, 100));
        assert_eq!(rect, Vec4::new(0.05, 0.2, 0.5, 0.5));
    }

    proptest! {
        #[test]
        fn prop_quadrants_tile_exactly(x in 0u32..64, y in 0u32..64, w in 1u32..2000, h in 1u32..2000) {
            let vp = Viewport::new(x, y, w, h);
            let quads = vp.quadrants();
            let total: u64 = quads.iter().map(Viewport::area).sum();
            prop_assert_eq!(total, vp.area());
            for (i, a) in quads.iter().enumerate() {
                prop_assert!(vp.contains(a));
                for b in &quads[i + 1..] {
                    prop_assert!(a.is_empty() || b.is_empty() || !a.overlaps(b));
                }
            }
        }
    }
}
