//! Math type re-exports and bounding boxes.

pub use glam::{IVec3, Mat3, Mat4, UVec2, UVec3, UVec4, Vec2, Vec3, Vec3A, Vec4};

use bytemuck::{Pod, Zeroable};
use gpu_objects::{GpuBox1, GpuBox3};
use std::fmt;

/// 3D bounding box with single precision.
#[derive(Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Box3 {
    pub min: Vec3,
    pub max: Vec3,
}

impl Box3 {
    /// Empty bounding box (inverted, will expand on first point).
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    /// Box around a sphere.
    #[inline]
    pub fn from_sphere(center: Vec3, radius: f32) -> Self {
        Self {
            min: center - Vec3::splat(radius),
            max: center + Vec3::splat(radius),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    pub fn expand_by_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn expand_by_box(&mut self, other: &Self) {
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Bounds of the eight transformed corners.
    pub fn transformed(&self, m: &Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        let mut out = Self::EMPTY;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.expand_by_point(m.transform_point3(corner));
        }
        out
    }

    /// `[min.xyz, max.xyz]`, the layout of custom-primitive bounds buffers.
    #[inline]
    pub fn to_array6(&self) -> [f32; 6] {
        [self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z]
    }

    #[inline]
    pub fn from_array6(a: [f32; 6]) -> Self {
        Self::new(Vec3::new(a[0], a[1], a[2]), Vec3::new(a[3], a[4], a[5]))
    }

    #[inline]
    pub fn to_gpu(&self) -> GpuBox3 {
        GpuBox3::from((self.min, self.max))
    }
}

impl Default for Box3 {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for Box3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Box3({:?} - {:?})", self.min, self.max)
    }
}

/// Closed scalar interval, used for value ranges.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Box1 {
    pub lower: f32,
    pub upper: f32,
}

impl Box1 {
    pub const UNIT: Self = Self { lower: 0.0, upper: 1.0 };

    pub const EMPTY: Self = Self {
        lower: f32::INFINITY,
        upper: f32::NEG_INFINITY,
    };

    #[inline]
    pub const fn new(lower: f32, upper: f32) -> Self {
        Self { lower, upper }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lower > self.upper
    }

    #[inline]
    pub fn extend(&mut self, v: f32) {
        self.lower = self.lower.min(v);
        self.upper = self.upper.max(v);
    }

    #[inline]
    pub fn span(&self) -> f32 {
        self.upper - self.lower
    }

    /// Value at normalized position `t` in `[0, 1]`.
    #[inline]
    pub fn lerp(&self, t: f32) -> f32 {
        self.lower + t * (self.upper - self.lower)
    }

    /// Normalized position of `v`, clamped to `[0, 1]`. Degenerate ranges map to 0.
    #[inline]
    pub fn normalize(&self, v: f32) -> f32 {
        let span = self.span();
        if span.abs() <= f32::EPSILON {
            0.0
        } else {
            ((v - self.lower) / span).clamp(0.0, 1.0)
        }
    }

    #[inline]
    pub fn to_array(&self) -> [f32; 2] {
        [self.lower, self.upper]
    }

    #[inline]
    pub fn to_gpu(&self) -> GpuBox1 {
        GpuBox1 {
            lower: self.lower,
            upper: self.upper,
        }
    }
}

impl Default for Box1 {
    fn default() -> Self {
        Self::UNIT
    }
}

impl From<Vec2> for Box1 {
    fn from(v: Vec2) -> Self {
        Self::new(v.x, v.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box3_expand() {
        let mut b = Box3::EMPTY;
        assert!(b.is_empty());
        b.expand_by_point(Vec3::new(1.0, 2.0, 3.0));
        b.expand_by_point(Vec3::new(-1.0, 0.0, 5.0));
        assert_eq!(b.min, Vec3::new(-1.0, 0.0, 3.0));
        assert_eq!(b.max, Vec3::new(1.0, 2.0, 5.0));
        assert_eq!(Box3::from_array6(b.to_array6()), b);
    }

    #[test]
    fn test_box3_transformed() {
        let b = Box3::new(Vec3::ZERO, Vec3::ONE);
        let t = b.transformed(&Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)));
        assert_eq!(t.min, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(t.max, Vec3::new(3.0, 1.0, 1.0));
    }

    #[test]
    fn test_box1_normalize() {
        let r = Box1::new(10.0, 20.0);
        assert_eq!(r.normalize(15.0), 0.5);
        assert_eq!(r.normalize(30.0), 1.0);
        assert_eq!(r.lerp(0.25), 12.5);
        assert_eq!(Box1::new(1.0, 1.0).normalize(5.0), 0.0);
    }
}
