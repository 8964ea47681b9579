//! Axis-Aligned Bounding Boxes
//!
//! The shadow pipeline folds node bounds into a running view-space box and
//! clips cascade frusta against it, so the corner ordering here is load
//! bearing: [`Aabb::corners`] uses the canonical bit ordering (bit 0 = +x,
//! bit 1 = +y, bit 2 = +z) that the cascade tightening step pairs with
//! frustum-slice corners.

use glam::{Mat4, Vec3};

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// An inverted box that any merge will overwrite.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        }
    }

    /// True while no point has been merged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn merge_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn merge(&mut self, other: &Aabb) {
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// The 8 corners in canonical bit order: bit 0 selects max x,
    /// bit 1 max y, bit 2 max z.
    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        let mut out = [Vec3::ZERO; 8];
        for (i, c) in out.iter_mut().enumerate() {
            *c = Vec3::new(
                if i & 1 != 0 { self.max.x } else { self.min.x },
                if i & 2 != 0 { self.max.y } else { self.min.y },
                if i & 4 != 0 { self.max.z } else { self.min.z },
            );
        }
        out
    }

    /// Transforms all 8 corners and refits an axis-aligned box around them.
    #[must_use]
    pub fn transformed(&self, m: &Mat4) -> Aabb {
        let mut out = Aabb::empty();
        for c in self.corners() {
            out.merge_point(m.transform_point3(c));
        }
        out
    }
}
