// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Geometric primitives for bake-time visibility sampling.
//!
//! The bake pass casts rays between surface patches; this module holds
//! the ray type, the ray/triangle intersection routine, and the
//! axis-aligned bounding box used to bound scenes.

use super::Vec3;

// Degenerate-determinant threshold for the intersection test.
const DET_EPSILON: f32 = 1e-8;

/// A half-line with an origin and a (not necessarily unit) direction.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Starting point of the ray.
    pub origin: Vec3,
    /// Direction of travel.
    pub dir: Vec3,
}

impl Ray {
    /// Creates a new ray.
    #[inline]
    pub const fn new(origin: Vec3, dir: Vec3) -> Self {
        Self { origin, dir }
    }

    /// Returns the point at parameter `t` along the ray.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }
}

/// Ray/triangle intersection (Möller–Trumbore).
///
/// Returns the ray parameter `t` of the hit if it lies in
/// `(t_min, t_max)`, or `None` for a miss, a parallel ray, or a
/// degenerate triangle.
#[inline]
pub fn intersect_triangle(ray: &Ray, v0: Vec3, v1: Vec3, v2: Vec3, t_min: f32, t_max: f32) -> Option<f32> {
    let e1 = v1 - v0;
    let e2 = v2 - v0;
    let pvec = ray.dir.cross(e2);
    let det = e1.dot(pvec);
    if det.abs() < DET_EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = ray.origin - v0;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(e1);
    let v = ray.dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(qvec) * inv_det;
    if t <= t_min || t >= t_max {
        return None;
    }
    Some(t)
}

/// Represents an Axis-Aligned Bounding Box (AABB).
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Aabb {
    /// The corner of the box with the smallest coordinates on all axes.
    pub min: Vec3,
    /// The corner of the box with the largest coordinates on all axes.
    pub max: Vec3,
}

impl Aabb {
    /// An invalid `Aabb`, neutral under [`Aabb::merged_with_point`].
    pub const INVALID: Self = Self {
        min: Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
        max: Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
    };

    /// Creates an `Aabb` that tightly encloses a set of points.
    ///
    /// Returns `None` if the input slice is empty.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut aabb = Self::INVALID;
        for p in points {
            aabb = aabb.merged_with_point(*p);
        }
        Some(aabb)
    }

    /// Creates a new `Aabb` that encompasses this box and a point.
    #[inline]
    pub fn merged_with_point(&self, point: Vec3) -> Self {
        Self {
            min: Vec3::new(
                self.min.x.min(point.x),
                self.min.y.min(point.y),
                self.min.z.min(point.z),
            ),
            max: Vec3::new(
                self.max.x.max(point.x),
                self.max.y.max(point.y),
                self.max.z.max(point.z),
            ),
        }
    }

    /// Checks if the `Aabb` is valid (i.e., `min <= max` on all axes).
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// The diagonal length of the box. Used to derive scene-scale ray
    /// offsets during baking.
    #[inline]
    pub fn diagonal(&self) -> f32 {
        if self.is_valid() {
            (self.max - self.min).length()
        } else {
            0.0
        }
    }
}

impl Default for Aabb {
    /// Returns the default `Aabb`, which is `Aabb::INVALID`.
    #[inline]
    fn default() -> Self {
        Self::INVALID
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::approx_eq;

    #[test]
    fn ray_hits_facing_triangle() {
        let v0 = Vec3::new(-1.0, -1.0, 2.0);
        let v1 = Vec3::new(1.0, -1.0, 2.0);
        let v2 = Vec3::new(0.0, 1.0, 2.0);
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0));
        let t = intersect_triangle(&ray, v0, v1, v2, 1e-4, f32::MAX).expect("must hit");
        assert!(approx_eq(t, 2.0));
    }

    #[test]
    fn ray_misses_triangle_outside_edges() {
        let v0 = Vec3::new(-1.0, -1.0, 2.0);
        let v1 = Vec3::new(1.0, -1.0, 2.0);
        let v2 = Vec3::new(0.0, 1.0, 2.0);
        let ray = Ray::new(Vec3::new(5.0, 5.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(intersect_triangle(&ray, v0, v1, v2, 1e-4, f32::MAX).is_none());
    }

    #[test]
    fn parallel_ray_is_rejected() {
        let v0 = Vec3::new(-1.0, -1.0, 2.0);
        let v1 = Vec3::new(1.0, -1.0, 2.0);
        let v2 = Vec3::new(0.0, 1.0, 2.0);
        let ray = Ray::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        assert!(intersect_triangle(&ray, v0, v1, v2, 1e-4, f32::MAX).is_none());
    }

    #[test]
    fn aabb_from_points_and_diagonal() {
        assert!(Aabb::from_points(&[]).is_none());
        let aabb = Aabb::from_points(&[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 2.0, 2.0),
            Vec3::new(-1.0, 0.5, 0.0),
        ])
        .unwrap();
        assert_eq!(aabb.min, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 2.0, 2.0));
        assert!(aabb.is_valid());
        // The box spans (2, 2, 2), so the diagonal is sqrt(12).
        assert!(approx_eq(aabb.diagonal(), 12.0f32.sqrt()));
        assert!(!Aabb::INVALID.is_valid());
        assert_eq!(Aabb::INVALID.diagonal(), 0.0);
    }
}
