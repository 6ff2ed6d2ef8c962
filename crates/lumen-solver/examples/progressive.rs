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

//! Bakes a closed box, then runs the adaptive scheduler for a few
//! simulated frames and prints how the solution converges.
//!
//! Run with `RUST_LOG=info cargo run --example progressive`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use lumen_core::math::{LinearRgb, Vec3};
use lumen_core::{AbortToken, TriangleMesh};
use lumen_solver::bake::{build, BakeParams};
use lumen_solver::{
    AdaptiveScheduler, PackedSolver, Rgb8, ScaleTable, SchedulerTuning, SolverFileCache,
};

const FRAMES: usize = 30;

fn main() -> Result<()> {
    env_logger::init();

    let mesh = box_scene();
    let n = mesh.triangle_count();
    let scene_hash = mesh.content_hash();

    // Bake, persist, then reload through the cache the way a real
    // application would on its second run.
    let baked = build(&mesh, &BakeParams::default(), &AbortToken::new())
        .context("baking the box scene")?;
    let dir = tempfile::tempdir().context("creating a scratch directory")?;
    let path = dir.path().join("box.bake");
    baked.save(&path, scene_hash).context("saving the bake")?;

    let mut cache = SolverFileCache::new();
    let file = cache
        .get_or_load(&path, scene_hash)
        .context("loading the bake back")?;

    let reflectance = vec![LinearRgb::splat(0.6); n];
    let mut solver = PackedSolver::create(&mesh, &reflectance, Arc::clone(&file))
        .ok_or_else(|| anyhow!("baked file does not match the scene"))?;

    // Light the floor, leave everything else to bounced energy.
    let mut direct = vec![Rgb8::BLACK; n];
    direct[0] = Rgb8::new(255, 255, 255);
    direct[1] = Rgb8::new(255, 255, 255);

    let mut scheduler = AdaptiveScheduler::new(SchedulerTuning::default());
    scheduler.set_direct_illumination(direct, ScaleTable::identity());

    let abort = AbortToken::new();
    let mut last_version = scheduler.solution_version();
    for frame in 0..FRAMES {
        let shots = scheduler.calculate(&mut solver, &abort);

        let version = scheduler.solution_version();
        if version != last_version {
            last_version = version;
            solver.vertex_irradiance_update();
            let ceiling = solver.triangle_exitance(2);
            println!(
                "frame {frame:>3}: {shots:>5} shots, unshot {:>10.6}, \
                 ceiling exitance ({:.4}, {:.4}, {:.4}), version {version}",
                solver.total_unshot_energy(),
                ceiling.r,
                ceiling.g,
                ceiling.b
            );
        }

        // Stand in for rendering and input handling.
        std::thread::sleep(Duration::from_millis(16));
    }

    println!(
        "done: {:.6} unshot flux left after {FRAMES} frames",
        solver.total_unshot_energy()
    );
    Ok(())
}

/// Unit box with inward-facing triangles.
fn box_scene() -> TriangleMesh {
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
        [0, 1, 5, 4],
        [3, 7, 6, 2],
        [0, 4, 7, 3],
        [1, 2, 6, 5],
        [0, 3, 2, 1],
        [4, 5, 6, 7],
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
    TriangleMesh::new(corners.to_vec(), indices).expect("static scene indices are valid")
}
