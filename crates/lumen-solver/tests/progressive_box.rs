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

//! End-to-end behavior on a baked closed-box scene.

use std::sync::Arc;

use lumen_core::math::{LinearRgb, Vec3};
use lumen_core::{AbortToken, TriangleMesh};
use lumen_solver::bake::{build, BakeParams};
use lumen_solver::{
    AdaptiveScheduler, PackedSolver, PackedSolverFile, Rgb8, ScaleTable, SchedulerTuning,
    SolverFileCache, SKY_PATCH_COUNT,
};

/// Unit box with all faces wound so the normals point inward.
fn closed_box() -> TriangleMesh {
    let corners = [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(0.0, 0.0, 1.0),
        Vec3::new(1.0, 0.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(0.0, 1.0, 1.0),
    ];
    let faces: [[u32; 4]; 6] = [
        [0, 1, 5, 4], // floor
        [3, 7, 6, 2], // ceiling
        [0, 4, 7, 3], // x = 0
        [1, 2, 6, 5], // x = 1
        [0, 3, 2, 1], // z = 0
        [4, 5, 6, 7], // z = 1
    ];
    let center = Vec3::new(0.5, 0.5, 0.5);

    let mut indices = Vec::new();
    for [a, b, c, d] in faces {
        for tri in [[a, b, c], [a, c, d]] {
            let (v0, v1, v2) = (
                corners[tri[0] as usize],
                corners[tri[1] as usize],
                corners[tri[2] as usize],
            );
            let normal = (v1 - v0).cross(v2 - v0);
            let centroid = (v0 + v1 + v2) * (1.0 / 3.0);
            if normal.dot(center - centroid) >= 0.0 {
                indices.push(tri);
            } else {
                indices.push([tri[0], tri[2], tri[1]]);
            }
        }
    }
    TriangleMesh::new(corners.to_vec(), indices).unwrap()
}

fn baked_box() -> (TriangleMesh, Arc<PackedSolverFile>) {
    let mesh = closed_box();
    let params = BakeParams {
        rays_per_triangle: 256,
        ..BakeParams::default()
    };
    let file = Arc::new(build(&mesh, &params, &AbortToken::new()).unwrap());
    (mesh, file)
}

// Floor triangles (0 and 1) lit, everything else dark.
fn floor_lit_direct(triangles: usize) -> Vec<Rgb8> {
    let mut direct = vec![Rgb8::BLACK; triangles];
    direct[0] = Rgb8::new(255, 255, 255);
    direct[1] = Rgb8::new(255, 255, 255);
    direct
}

#[test]
fn closed_box_has_no_sky_coupling() {
    let (_mesh, file) = baked_box();
    let table = file.intensity_table();
    for t in 0..file.triangle_count() {
        // A handful of seam-grazing rays may slip between adjacent
        // triangles numerically; anything beyond that is a real leak.
        let total: f32 = (0..SKY_PATCH_COUNT)
            .map(|patch| file.sky_factor(t).decompress(patch, table).sum())
            .sum();
        assert!(total < 0.05, "triangle {t} leaked {total} to the sky");
    }
}

#[test]
fn one_shot_conserves_flux_through_the_records() {
    let (mesh, file) = baked_box();
    let reflectance = vec![LinearRgb::splat(0.5); mesh.triangle_count()];
    let mut solver = PackedSolver::create(&mesh, &reflectance, file.clone()).unwrap();

    solver.illumination_reset(
        &floor_lit_direct(mesh.triangle_count()),
        &ScaleTable::identity(),
        true,
    );

    let before: Vec<LinearRgb> = (0..mesh.triangle_count())
        .map(|t| solver.unshot_energy(t))
        .collect();
    // The brightest candidate is one of the lit floor triangles.
    let source_flux = before[0];
    let weight_sum: f32 = file.transfer_records(0).iter().map(|r| r.weight).sum();

    let mut budget = 1;
    let shots = solver.illumination_improve(|| {
        if budget == 0 {
            return true;
        }
        budget -= 1;
        false
    });
    assert_eq!(shots, 1);

    // Find which floor triangle actually shot.
    let source = if solver.unshot_energy(0) == LinearRgb::ZERO {
        0
    } else {
        1
    };
    let exiting = source_flux * 0.5;
    let received: f32 = (0..mesh.triangle_count())
        .filter(|&t| t != source)
        .map(|t| (solver.unshot_energy(t) - before[t]).sum())
        .sum();
    let expected = if source == 0 {
        exiting.sum() * weight_sum
    } else {
        let w: f32 = file.transfer_records(1).iter().map(|r| r.weight).sum();
        exiting.sum() * w
    };
    assert!(
        (received - expected).abs() < 1e-4,
        "received {received}, expected {expected}"
    );
}

#[test]
fn improvement_brightens_the_ceiling_and_stays_non_negative() {
    let (mesh, file) = baked_box();
    let n = mesh.triangle_count();
    let reflectance = vec![LinearRgb::splat(0.6); n];
    let mut solver = PackedSolver::create(&mesh, &reflectance, file).unwrap();

    solver.illumination_reset(&floor_lit_direct(n), &ScaleTable::identity(), true);
    let unshot_after_reset = solver.total_unshot_energy();

    let mut shots_left = 64;
    solver.illumination_improve(|| {
        if shots_left == 0 {
            return true;
        }
        shots_left -= 1;
        false
    });

    // Energy drained: each shot converts unshot flux through a < 1
    // reflectance.
    assert!(solver.total_unshot_energy() < unshot_after_reset);

    // The ceiling (triangles 2 and 3) is unlit directly and can only
    // have received bounced energy.
    let ceiling = solver.shot_energy(2) + solver.unshot_energy(2);
    assert!(ceiling.sum() > 0.0, "no bounced energy reached the ceiling");

    for t in 0..n {
        let exitance = solver.triangle_exitance(t);
        assert!(
            exitance.is_non_negative(),
            "negative exitance on triangle {t}: {exitance:?}"
        );
    }

    // Smoothed per-vertex irradiance is finite and non-negative too.
    solver.vertex_irradiance_update();
    for t in 0..n {
        for corner in 0..3 {
            let v = solver.vertex_irradiance(t, corner);
            assert!(v.is_finite() && v.is_non_negative());
        }
    }
}

#[test]
fn cache_scheduler_pipeline_runs_through_a_saved_file() {
    let (mesh, file) = baked_box();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("box.bake");
    file.save(&path, mesh.content_hash()).unwrap();

    let mut cache = SolverFileCache::new();
    let shared = cache.get_or_load(&path, mesh.content_hash()).unwrap();

    let n = mesh.triangle_count();
    let reflectance = vec![LinearRgb::splat(0.5); n];
    let mut solver = PackedSolver::create(&mesh, &reflectance, shared).unwrap();
    let mut scheduler = AdaptiveScheduler::new(SchedulerTuning::default());

    scheduler.set_direct_illumination(floor_lit_direct(n), ScaleTable::identity());
    let abort = AbortToken::new();

    let before = scheduler.solution_version();
    scheduler.calculate(&mut solver, &abort);
    assert!(scheduler.solution_version() > before);
    assert!(solver.shot_energy(0).sum() > 0.0);

    // A second frame without input changes must not reset the version
    // counter or crash on an already-drained solver.
    scheduler.calculate(&mut solver, &abort);
    assert!(scheduler.solution_version() > before);

    // Aborted frames still return cleanly.
    abort.request_abort();
    let shots = scheduler.calculate(&mut solver, &abort);
    assert_eq!(shots, 0);
}
