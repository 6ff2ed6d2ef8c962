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

//! Indexed triangle-mesh geometry consumed by the solver and the baker.

use std::hash::{BuildHasher, Hasher};

use crate::math::{Aabb, Vec3};

// Fixed seeds so the content hash is stable across processes. The hash
// gates baked-file reuse, so it must not vary run to run.
const HASH_SEEDS: (u64, u64, u64, u64) = (
    0x4c75_6d65_6e00_0001,
    0x9e37_79b9_7f4a_7c15,
    0x6a09_e667_f3bc_c908,
    0xbb67_ae85_84ca_a73b,
);

/// An indexed triangle mesh.
///
/// This is the solver's entire view of scene geometry: vertex
/// positions plus index triples. Indices are validated once at
/// construction so per-triangle accessors can index without checks.
#[derive(Debug, Clone)]
pub struct TriangleMesh {
    positions: Vec<Vec3>,
    indices: Vec<[u32; 3]>,
}

impl TriangleMesh {
    /// Creates a mesh from vertex positions and triangle index triples.
    ///
    /// Returns `None` if any index is out of range.
    pub fn new(positions: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Option<Self> {
        let n = positions.len() as u32;
        if indices.iter().any(|tri| tri.iter().any(|&i| i >= n)) {
            log::warn!(
                "TriangleMesh rejected: index out of range ({} vertices)",
                n
            );
            return None;
        }
        Some(Self { positions, indices })
    }

    /// Number of triangles in the mesh.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// Number of vertices in the mesh.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// The index triple of triangle `t`.
    #[inline]
    pub fn triangle_indices(&self, t: usize) -> [u32; 3] {
        self.indices[t]
    }

    /// The three corner positions of triangle `t`.
    #[inline]
    pub fn triangle(&self, t: usize) -> [Vec3; 3] {
        let [a, b, c] = self.indices[t];
        [
            self.positions[a as usize],
            self.positions[b as usize],
            self.positions[c as usize],
        ]
    }

    /// Surface area of triangle `t`.
    pub fn area(&self, t: usize) -> f32 {
        let [a, b, c] = self.triangle(t);
        (b - a).cross(c - a).length() * 0.5
    }

    /// Unit geometric normal of triangle `t`, or `Vec3::ZERO` for a
    /// degenerate triangle.
    pub fn normal(&self, t: usize) -> Vec3 {
        let [a, b, c] = self.triangle(t);
        (b - a).cross(c - a).normalize()
    }

    /// Centroid of triangle `t`.
    pub fn centroid(&self, t: usize) -> Vec3 {
        let [a, b, c] = self.triangle(t);
        (a + b + c) * (1.0 / 3.0)
    }

    /// Sum of all triangle areas.
    pub fn total_area(&self) -> f32 {
        (0..self.triangle_count()).map(|t| self.area(t)).sum()
    }

    /// Bounding box of all vertices.
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&self.positions).unwrap_or(Aabb::INVALID)
    }

    /// A deterministic 64-bit hash of the mesh content.
    ///
    /// Used as the compatibility gate for baked solver files: a bake
    /// for a since-edited mesh hashes differently and is rejected at
    /// load time. Stable across processes (fixed hasher seeds).
    pub fn content_hash(&self) -> u64 {
        let state = ahash::RandomState::with_seeds(
            HASH_SEEDS.0,
            HASH_SEEDS.1,
            HASH_SEEDS.2,
            HASH_SEEDS.3,
        );
        let mut hasher = state.build_hasher();
        hasher.write_u64(self.positions.len() as u64);
        for p in &self.positions {
            hasher.write_u32(p.x.to_bits());
            hasher.write_u32(p.y.to_bits());
            hasher.write_u32(p.z.to_bits());
        }
        hasher.write_u64(self.indices.len() as u64);
        for tri in &self.indices {
            hasher.write_u32(tri[0]);
            hasher.write_u32(tri[1]);
            hasher.write_u32(tri[2]);
        }
        hasher.finish()
    }
}
