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

//! Offline baking of the packed solver dataset.
//!
//! For each triangle a ray budget proportional to its area share is
//! cast from cosine-weighted hemisphere directions; nearest hits
//! accumulate directed transfer weights, misses accumulate per-patch
//! sky coupling. Shared vertices are welded by position and given
//! area-proportional smoothing weights. The whole pass is
//! deterministic for fixed [`BakeParams`]: every triangle gets its own
//! counter-seeded generator, so thread scheduling cannot change the
//! result.

use ahash::AHashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use lumen_core::math::{intersect_triangle, LinearRgb, Ray, Vec3};
use lumen_core::{AbortToken, TriangleMesh};

use crate::error::{SolverError, SolverResult};
use crate::packed::array::PackedArrayBuilder;
use crate::packed::file::{PackedSolverFile, TransferRecord, TriangleHeader};
use crate::packed::sky::{sky_patch_index, IntensityTable, SkyFactor, SKY_PATCH_COUNT};
use crate::packed::smoothing::{SmoothingRecord, TriangleIVertices, VertexHeader};

// Every triangle with non-zero area casts at least this many rays,
// however small its area share.
const MIN_RAYS_PER_TRIANGLE: u32 = 8;

/// Tunable parameters of the bake pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BakeParams {
    /// Average ray budget per triangle; the actual per-triangle count
    /// is proportional to its surface-area share of the scene.
    pub rays_per_triangle: u32,
    /// Seed of the deterministic sampling sequence.
    pub seed: u64,
}

impl Default for BakeParams {
    fn default() -> Self {
        Self {
            rays_per_triangle: 128,
            seed: 0x4c75_6d65_6e42_616b,
        }
    }
}

/// Bakes the full solver dataset for `mesh`.
///
/// Cancellation through `abort` yields [`SolverError::Aborted`]: a
/// partially accumulated dataset is useless, unlike an interrupted
/// runtime improve step.
pub fn build(
    mesh: &TriangleMesh,
    params: &BakeParams,
    abort: &AbortToken,
) -> SolverResult<PackedSolverFile> {
    let n = mesh.triangle_count();
    let total_area = mesh.total_area();
    let total_rays = params.rays_per_triangle as u64 * n as u64;
    // Self-intersection offset scaled to the scene, not to any fixed
    // world unit.
    let surface_offset = (mesh.bounds().diagonal() * 1e-4).max(1e-6);
    let intensity_table = IntensityTable::build(1.0);

    log::info!(
        "baking {} triangles, ~{} rays total",
        n,
        total_rays
    );

    let baked: Vec<TriangleBake> = (0..n)
        .into_par_iter()
        .map(|t| {
            if abort.is_aborted() {
                return TriangleBake::default();
            }
            let rays = ray_budget(mesh, t, total_rays, total_area);
            bake_triangle(mesh, t, rays, surface_offset, params.seed)
        })
        .collect();

    if abort.is_aborted() {
        log::info!("bake aborted");
        return Err(SolverError::Aborted);
    }

    let record_count: usize = baked.iter().map(|b| b.transfers.len()).sum();
    let mut transfers =
        PackedArrayBuilder::<TriangleHeader, TransferRecord>::new(n, record_count);
    for bake in &baked {
        let mut factors = [LinearRgb::ZERO; SKY_PATCH_COUNT];
        for (factor, &scalar) in factors.iter_mut().zip(bake.sky.iter()) {
            // Rays carry no spectral filter here, so the coupling hue
            // is neutral; the compressed form stays general.
            *factor = LinearRgb::splat(scalar / 3.0);
        }
        transfers.begin_outer(SkyFactor::compress(&factors, &intensity_table))?;
        for &(destination, weight) in &bake.transfers {
            transfers.push_record(TransferRecord {
                weight,
                destination,
            })?;
        }
    }

    let (smoothing, triangle_ivertices) = build_smoothing(mesh)?;

    PackedSolverFile::from_parts(
        transfers.finish()?,
        smoothing,
        triangle_ivertices,
        intensity_table,
    )
}

fn ray_budget(mesh: &TriangleMesh, t: usize, total_rays: u64, total_area: f32) -> u32 {
    let area = mesh.area(t);
    if area <= 0.0 || total_area <= 0.0 {
        return 0;
    }
    let share = (total_rays as f64 * (area / total_area) as f64).round() as u32;
    share.max(MIN_RAYS_PER_TRIANGLE)
}

#[derive(Debug, Default)]
struct TriangleBake {
    // Destination-sorted (index, weight) pairs.
    transfers: Vec<(u32, f32)>,
    // Scalar sky coupling per patch, each in [0, 1].
    sky: [f32; SKY_PATCH_COUNT],
}

fn bake_triangle(
    mesh: &TriangleMesh,
    t: usize,
    rays: u32,
    surface_offset: f32,
    seed: u64,
) -> TriangleBake {
    if rays == 0 {
        return TriangleBake::default();
    }
    let [a, b, c] = mesh.triangle(t);
    let normal = mesh.normal(t);
    if normal == Vec3::ZERO {
        return TriangleBake::default();
    }
    let (tangent, bitangent) = orthonormal_basis(normal);
    let mut rng = Pcg32::new(splitmix64(seed ^ t as u64), t as u64);

    let mut hit_counts: AHashMap<u32, u32> = AHashMap::new();
    let mut sky_counts = [0u32; SKY_PATCH_COUNT];

    for _ in 0..rays {
        // Uniform point on the triangle.
        let su = rng.next_f32().sqrt();
        let r2 = rng.next_f32();
        let point = a * (1.0 - su) + b * (su * (1.0 - r2)) + c * (su * r2);

        // Cosine-weighted hemisphere direction around the normal.
        let phi = std::f32::consts::TAU * rng.next_f32();
        let r4 = rng.next_f32();
        let sin_theta = r4.sqrt();
        let cos_theta = (1.0 - r4).sqrt();
        let dir = tangent * (sin_theta * phi.cos())
            + bitangent * (sin_theta * phi.sin())
            + normal * cos_theta;

        let ray = Ray::new(point + normal * surface_offset, dir);
        match nearest_hit(mesh, t, &ray) {
            Some(destination) => *hit_counts.entry(destination).or_insert(0) += 1,
            None => sky_counts[sky_patch_index(dir)] += 1,
        }
    }

    let inv_rays = 1.0 / rays as f32;
    let mut transfers: Vec<(u32, f32)> = hit_counts
        .into_iter()
        .map(|(destination, count)| (destination, count as f32 * inv_rays))
        .collect();
    transfers.sort_unstable_by_key(|&(destination, _)| destination);

    let mut sky = [0.0f32; SKY_PATCH_COUNT];
    for (factor, &count) in sky.iter_mut().zip(sky_counts.iter()) {
        *factor = count as f32 * inv_rays;
    }

    TriangleBake { transfers, sky }
}

fn nearest_hit(mesh: &TriangleMesh, source: usize, ray: &Ray) -> Option<u32> {
    let mut best_t = f32::MAX;
    let mut best = None;
    for candidate in 0..mesh.triangle_count() {
        if candidate == source {
            continue;
        }
        let [v0, v1, v2] = mesh.triangle(candidate);
        if let Some(hit) = intersect_triangle(ray, v0, v1, v2, 0.0, best_t) {
            best_t = hit;
            best = Some(candidate as u32);
        }
    }
    best
}

fn orthonormal_basis(normal: Vec3) -> (Vec3, Vec3) {
    let helper = if normal.y.abs() < 0.9 {
        Vec3::Y
    } else {
        Vec3::new(1.0, 0.0, 0.0)
    };
    let tangent = helper.cross(normal).normalize();
    let bitangent = normal.cross(tangent);
    (tangent, bitangent)
}

type SmoothingParts = (
    crate::packed::array::PackedArray<VertexHeader, SmoothingRecord>,
    Vec<TriangleIVertices>,
);

// Welds vertices by exact position and assigns area-proportional blend
// weights, so per-vertex radiance is continuous across triangle fans.
fn build_smoothing(mesh: &TriangleMesh) -> SolverResult<SmoothingParts> {
    let n = mesh.triangle_count();
    let mut ivertex_ids: AHashMap<[u32; 3], u32> = AHashMap::new();
    let mut ivertex_triangles: Vec<Vec<u32>> = Vec::new();
    let mut triangle_ivertices = Vec::with_capacity(n);

    for t in 0..n {
        let corners = mesh.triangle(t);
        let mut triple = [0u32; 3];
        for (corner, position) in corners.iter().enumerate() {
            let key = [
                position.x.to_bits(),
                position.y.to_bits(),
                position.z.to_bits(),
            ];
            let next_id = ivertex_triangles.len() as u32;
            let id = *ivertex_ids.entry(key).or_insert(next_id);
            if id == next_id {
                ivertex_triangles.push(Vec::new());
            }
            let owners = &mut ivertex_triangles[id as usize];
            if owners.last() != Some(&(t as u32)) {
                owners.push(t as u32);
            }
            triple[corner] = id;
        }
        triangle_ivertices.push(TriangleIVertices { ivertex: triple });
    }

    let record_count: usize = ivertex_triangles.iter().map(|o| o.len()).sum();
    let mut builder =
        PackedArrayBuilder::<VertexHeader, SmoothingRecord>::new(ivertex_triangles.len(), record_count);
    for owners in &ivertex_triangles {
        builder.begin_outer(())?;
        let total_area: f32 = owners.iter().map(|&t| mesh.area(t as usize)).sum();
        for &triangle in owners {
            let weight = if total_area > 0.0 {
                mesh.area(triangle as usize) / total_area
            } else {
                1.0 / owners.len() as f32
            };
            builder.push_record(SmoothingRecord { triangle, weight })?;
        }
    }

    Ok((builder.finish()?, triangle_ivertices))
}

// Minimal PCG32 generator; fast and statistically sufficient for
// visibility sampling without pulling a dependency into the bake path.
struct Pcg32 {
    state: u64,
    inc: u64,
}

impl Pcg32 {
    fn new(seed: u64, stream: u64) -> Self {
        let mut rng = Self {
            state: 0,
            inc: (stream << 1) | 1,
        };
        rng.step();
        rng.state = rng.state.wrapping_add(seed);
        rng.step();
        rng
    }

    #[inline]
    fn step(&mut self) {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(self.inc);
    }

    #[inline]
    fn next_u32(&mut self) -> u32 {
        let old = self.state;
        self.step();
        let xorshifted = (((old >> 18) ^ old) >> 27) as u32;
        let rot = (old >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    #[inline]
    fn next_f32(&mut self) -> f32 {
        const SCALE: f32 = 1.0 / (1u32 << 24) as f32;
        (self.next_u32() >> 8) as f32 * SCALE
    }
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facing_quads() -> TriangleMesh {
        // Two unit quads one apart, facing each other.
        TriangleMesh::new(
            vec![
                // Lower quad, normal +y.
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(0.0, 0.0, 1.0),
                // Upper quad, normal -y.
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(0.0, 1.0, 1.0),
            ],
            vec![[0, 2, 1], [0, 3, 2], [4, 5, 6], [4, 6, 7]],
        )
        .unwrap()
    }

    #[test]
    fn pcg_sequences_are_deterministic() {
        let mut a = Pcg32::new(42, 7);
        let mut b = Pcg32::new(42, 7);
        for _ in 0..32 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
        let f = Pcg32::new(42, 7).next_f32();
        assert!((0.0..1.0).contains(&f));
    }

    #[test]
    fn facing_quads_transfer_energy_to_each_other() {
        let mesh = facing_quads();
        let params = BakeParams {
            rays_per_triangle: 256,
            ..BakeParams::default()
        };
        let file = build(&mesh, &params, &AbortToken::new()).unwrap();

        // Every lower triangle must see at least one upper triangle.
        for t in 0..2 {
            let records = file.transfer_records(t);
            assert!(!records.is_empty(), "triangle {t} saw nothing");
            assert!(records.iter().all(|r| r.destination >= 2));
            assert!(records.iter().all(|r| r.weight > 0.0 && r.weight <= 1.0));
        }
    }

    #[test]
    fn bake_is_deterministic_for_fixed_params() {
        let mesh = facing_quads();
        let params = BakeParams::default();
        let first = build(&mesh, &params, &AbortToken::new()).unwrap();
        let second = build(&mesh, &params, &AbortToken::new()).unwrap();
        for t in 0..mesh.triangle_count() {
            assert_eq!(first.transfer_records(t), second.transfer_records(t));
            assert_eq!(first.sky_factor(t), second.sky_factor(t));
        }
    }

    #[test]
    fn open_scene_accumulates_sky_coupling() {
        // A single floor quad under an open sky.
        let mesh = TriangleMesh::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .unwrap();
        let file = build(&mesh, &BakeParams::default(), &AbortToken::new()).unwrap();
        let table = file.intensity_table();
        let total: f32 = (0..SKY_PATCH_COUNT)
            .map(|p| file.sky_factor(0).decompress(p, table).sum())
            .sum();
        assert!(total > 0.5, "open floor should couple strongly to the sky");
    }

    #[test]
    fn aborted_bake_returns_no_dataset() {
        let mesh = facing_quads();
        let abort = AbortToken::new();
        abort.request_abort();
        assert!(matches!(
            build(&mesh, &BakeParams::default(), &abort),
            Err(SolverError::Aborted)
        ));
    }

    #[test]
    fn smoothing_weights_sum_to_one() {
        let mesh = facing_quads();
        let file = build(&mesh, &BakeParams::default(), &AbortToken::new()).unwrap();
        for iv in 0..file.ivertex_count() {
            let records = file.smoothing_records(iv);
            assert!(!records.is_empty());
            let sum: f32 = records.iter().map(|r| r.weight).sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }
}
