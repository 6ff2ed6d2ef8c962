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

//! Frame-level budgeting of progressive improvement.
//!
//! Called once per frame, the scheduler measures how long the caller
//! spent outside (`user_step`) versus inside (`calc_step`) the last
//! call, adapts the wall-clock budget handed to
//! [`PackedSolver::illumination_improve`], applies pending input
//! changes as resets, and batches result publication behind a growing
//! re-read period so consumers do not re-upload on every single shot.

use serde::{Deserialize, Serialize};

use lumen_core::math::LinearRgb;
use lumen_core::{AbortToken, Stopwatch};

use crate::solver::{PackedSolver, Rgb8, ScaleTable};

// Budget multipliers: aggressive recovery after a calculation spike,
// gentle convergence toward a 1:1 user/calc ratio otherwise.
const SHRINK_HARD: f32 = 0.4;
const SHRINK_SOFT: f32 = 0.8;
const GROW: f32 = 1.2;
const HARD_RATIO: f32 = 4.0;

/// Tunable scheduler parameters, all in seconds except the fraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerTuning {
    /// Improve budget used while no interaction timing is available
    /// (first frame, or a zero-length measured step).
    pub improve_static: f32,
    /// Lower clamp of the adapted improve budget.
    pub improve_min: f32,
    /// Upper clamp of the adapted improve budget.
    pub improve_max: f32,
    /// Floor of the budget as a fraction of the whole frame, so
    /// improvement never starves entirely.
    pub frame_fraction: f32,
    /// Forced minimum budget on the first frame after a reset, so that
    /// frame is not visibly too dark.
    pub post_reset_min: f32,
    /// Initial and post-change result re-read period.
    pub read_period_min: f32,
    /// Cap of the multiplicatively growing re-read period.
    pub read_period_max: f32,
}

impl Default for SchedulerTuning {
    fn default() -> Self {
        Self {
            improve_static: 0.050,
            improve_min: 0.002,
            improve_max: 0.050,
            frame_fraction: 0.10,
            post_reset_min: 0.010,
            read_period_min: 0.250,
            read_period_max: 4.0,
        }
    }
}

/// Per-frame driver of a [`PackedSolver`].
///
/// Owns the pending input changes (materials, direct illumination) and
/// the published solution version; the solver itself stays a pure
/// state machine.
#[derive(Debug)]
pub struct AdaptiveScheduler {
    tuning: SchedulerTuning,
    budget: f32,
    user_watch: Option<Stopwatch>,
    last_calc_step: f32,

    pending_materials: Option<Vec<LinearRgb>>,
    direct: Option<(Vec<Rgb8>, ScaleTable)>,
    materials_dirty: bool,
    direct_dirty: bool,

    results_dirty: bool,
    read_watch: Stopwatch,
    read_period: f32,
    solution_version: u32,
}

impl AdaptiveScheduler {
    /// Creates a scheduler with the given tuning.
    pub fn new(tuning: SchedulerTuning) -> Self {
        Self {
            budget: tuning.improve_static,
            read_period: tuning.read_period_min,
            tuning,
            user_watch: None,
            last_calc_step: 0.0,
            pending_materials: None,
            direct: None,
            materials_dirty: false,
            direct_dirty: false,
            results_dirty: false,
            read_watch: Stopwatch::new(),
            solution_version: 0,
        }
    }

    /// Queues new per-triangle reflectance. Applied on the next
    /// [`AdaptiveScheduler::calculate`] as a strong reset, since
    /// already-distributed energy carries the old factors.
    pub fn set_materials(&mut self, reflectance: Vec<LinearRgb>) {
        self.pending_materials = Some(reflectance);
        self.materials_dirty = true;
    }

    /// Queues new direct illumination samples. Applied on the next
    /// [`AdaptiveScheduler::calculate`] as a full illumination reset.
    pub fn set_direct_illumination(&mut self, samples: Vec<Rgb8>, scale: ScaleTable) {
        self.direct = Some((samples, scale));
        self.direct_dirty = true;
    }

    /// Monotonic counter consumers compare against to decide whether
    /// to re-read solver results.
    #[inline]
    pub fn solution_version(&self) -> u32 {
        self.solution_version
    }

    /// The improve budget the next frame will start from, in seconds.
    #[inline]
    pub fn improve_budget(&self) -> f32 {
        self.budget
    }

    /// Runs one frame of solver work; call exactly once per frame.
    /// Returns the number of shots performed.
    ///
    /// A set abort flag makes this a cheap no-op frame; cancellation
    /// here is a normal early return, never an error.
    pub fn calculate(&mut self, solver: &mut PackedSolver, abort: &AbortToken) -> usize {
        let user_step = self
            .user_watch
            .as_ref()
            .map(Stopwatch::elapsed_secs_f32)
            .unwrap_or(0.0);
        let calc_watch = Stopwatch::new();

        self.budget = adapt_budget(self.budget, user_step, self.last_calc_step, &self.tuning);

        let did_reset = self.apply_pending(solver);
        if did_reset {
            self.budget = self.budget.max(self.tuning.post_reset_min);
            self.read_period = self.tuning.read_period_min;
            self.publish();
        }

        let deadline = self.budget;
        let improve_watch = Stopwatch::new();
        let shots = solver
            .illumination_improve(|| abort.is_aborted() || improve_watch.elapsed_secs_f32() >= deadline);
        if shots > 0 {
            self.results_dirty = true;
        }

        if self.results_dirty && self.read_watch.elapsed_secs_f32() >= self.read_period {
            self.publish();
            // The scene stayed static for a whole period; re-read even
            // less often.
            self.read_period = (self.read_period * 2.0).min(self.tuning.read_period_max);
        }

        self.last_calc_step = calc_watch.elapsed_secs_f32();
        self.user_watch = Some(Stopwatch::new());
        shots
    }

    // Applies queued material/illumination changes. Returns whether a
    // reset happened.
    fn apply_pending(&mut self, solver: &mut PackedSolver) -> bool {
        if !self.materials_dirty && !self.direct_dirty {
            return false;
        }
        if let Some(reflectance) = self.pending_materials.take() {
            solver.set_reflectance(&reflectance);
        }
        let Some((samples, scale)) = self.direct.as_ref() else {
            // Materials changed before any illumination arrived; the
            // reset waits for the first samples.
            return false;
        };
        // Always the full rewrite: the incremental variant cannot
        // decay already-broadcast energy, so a dimmed or extinguished
        // light would otherwise keep its stale bounce light forever.
        // Callers that want the incremental path drive the solver
        // directly.
        solver.illumination_reset(samples, scale, true);
        self.materials_dirty = false;
        self.direct_dirty = false;
        true
    }

    fn publish(&mut self) {
        self.solution_version = self.solution_version.wrapping_add(1);
        self.results_dirty = false;
        self.read_watch.restart();
    }
}

/// One step of the budget feedback loop.
///
/// Zero or missing measurements fall back to the static budget;
/// otherwise the budget shrinks by [`SHRINK_HARD`] after a calculation
/// spike, converges by [`SHRINK_SOFT`]/[`GROW`] toward a 1:1 ratio, is
/// clamped to the interactive range and floored at a fraction of the
/// whole frame.
fn adapt_budget(budget: f32, user_step: f32, calc_step: f32, tuning: &SchedulerTuning) -> f32 {
    if user_step <= 0.0 || calc_step <= 0.0 {
        return tuning.improve_static;
    }
    let ratio = calc_step / user_step;
    let scaled = if ratio > HARD_RATIO {
        budget * SHRINK_HARD
    } else if ratio > 1.0 {
        budget * SHRINK_SOFT
    } else {
        budget * GROW
    };
    scaled
        .clamp(tuning.improve_min, tuning.improve_max)
        .max(tuning.frame_fraction * (user_step + calc_step))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use lumen_core::math::Vec3;
    use lumen_core::TriangleMesh;

    use crate::packed::array::PackedArrayBuilder;
    use crate::packed::file::{PackedSolverFile, TransferRecord, TriangleHeader};
    use crate::packed::sky::{IntensityTable, SkyFactor};
    use crate::packed::smoothing::{SmoothingRecord, TriangleIVertices, VertexHeader};

    fn tuning() -> SchedulerTuning {
        SchedulerTuning::default()
    }

    #[test]
    fn missing_measurements_fall_back_to_the_static_budget() {
        let t = tuning();
        assert_eq!(adapt_budget(0.003, 0.0, 0.016, &t), t.improve_static);
        assert_eq!(adapt_budget(0.003, 0.016, 0.0, &t), t.improve_static);
    }

    #[test]
    fn spikes_shrink_hard_and_mild_overruns_shrink_soft() {
        let t = SchedulerTuning {
            improve_min: 0.0001,
            frame_fraction: 0.0,
            ..tuning()
        };
        let hard = adapt_budget(0.010, 0.010, 0.100, &t);
        assert!((hard - 0.004).abs() < 1e-6);
        let soft = adapt_budget(0.010, 0.010, 0.015, &t);
        assert!((soft - 0.008).abs() < 1e-6);
        let grown = adapt_budget(0.010, 0.016, 0.016, &t);
        assert!((grown - 0.012).abs() < 1e-6);
    }

    #[test]
    fn budget_converges_instead_of_oscillating() {
        let t = tuning();
        let mut budget = t.improve_static;
        for _ in 0..100 {
            budget = adapt_budget(budget, 0.016, 0.016, &t);
            assert!(budget >= t.improve_min);
            assert!(budget <= t.improve_max.max(t.frame_fraction * 0.032));
        }
        // A 1:1 ratio grows until the clamp and then holds.
        let settled = adapt_budget(budget, 0.016, 0.016, &t);
        assert_eq!(settled, budget);
    }

    #[test]
    fn frame_fraction_floors_the_budget() {
        let t = SchedulerTuning {
            frame_fraction: 0.25,
            ..tuning()
        };
        // Heavy shrink would land below the floor; the floor wins.
        let floored = adapt_budget(t.improve_min, 0.040, 0.200, &t);
        assert!((floored - 0.25 * 0.240).abs() < 1e-6);
    }

    fn single_triangle_fixture() -> (TriangleMesh, PackedSolver) {
        let mesh = TriangleMesh::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();

        let mut transfers = PackedArrayBuilder::<TriangleHeader, TransferRecord>::new(1, 0);
        transfers.begin_outer(SkyFactor::default()).unwrap();
        let mut smoothing = PackedArrayBuilder::<VertexHeader, SmoothingRecord>::new(3, 3);
        for _ in 0..3 {
            smoothing.begin_outer(()).unwrap();
            smoothing
                .push_record(SmoothingRecord {
                    triangle: 0,
                    weight: 1.0,
                })
                .unwrap();
        }
        let file = Arc::new(
            PackedSolverFile::from_parts(
                transfers.finish().unwrap(),
                smoothing.finish().unwrap(),
                vec![TriangleIVertices { ivertex: [0, 1, 2] }],
                IntensityTable::build(1.0),
            )
            .unwrap(),
        );
        let solver = PackedSolver::create(&mesh, &[LinearRgb::splat(0.5)], file).unwrap();
        (mesh, solver)
    }

    #[test]
    fn queued_illumination_resets_and_publishes() {
        let (_mesh, mut solver) = single_triangle_fixture();
        let mut scheduler = AdaptiveScheduler::new(tuning());
        assert_eq!(scheduler.solution_version(), 0);

        scheduler.set_direct_illumination(vec![Rgb8::new(255, 255, 255)], ScaleTable::identity());
        scheduler.calculate(&mut solver, &AbortToken::new());

        // The reset bumped the version and seeded energy, which the
        // improve pass then broadcast (a lone triangle keeps it shot).
        assert_eq!(scheduler.solution_version(), 1);
        assert!(solver.shot_energy(0).sum() > 0.0);

        // No new inputs and nothing left to shoot: no further bump.
        scheduler.calculate(&mut solver, &AbortToken::new());
        assert_eq!(scheduler.solution_version(), 1);
    }

    #[test]
    fn materials_alone_wait_for_illumination() {
        let (_mesh, mut solver) = single_triangle_fixture();
        let mut scheduler = AdaptiveScheduler::new(tuning());

        scheduler.set_materials(vec![LinearRgb::splat(0.25)]);
        scheduler.calculate(&mut solver, &AbortToken::new());
        assert_eq!(scheduler.solution_version(), 0);

        // Once samples arrive the pending materials force a strong
        // reset in the same frame.
        scheduler.set_direct_illumination(vec![Rgb8::new(255, 255, 255)], ScaleTable::identity());
        scheduler.calculate(&mut solver, &AbortToken::new());
        assert_eq!(scheduler.solution_version(), 1);
    }

    #[test]
    fn post_reset_budget_is_floored() {
        let (_mesh, mut solver) = single_triangle_fixture();
        let t = SchedulerTuning {
            improve_static: 0.0005,
            improve_min: 0.0001,
            post_reset_min: 0.020,
            frame_fraction: 0.0,
            ..tuning()
        };
        let mut scheduler = AdaptiveScheduler::new(t);
        scheduler.set_direct_illumination(vec![Rgb8::new(10, 10, 10)], ScaleTable::identity());
        scheduler.calculate(&mut solver, &AbortToken::new());
        assert!(scheduler.improve_budget() >= 0.020);
    }

    #[test]
    fn lights_off_darkens_a_converged_scene() {
        let (_mesh, mut solver) = single_triangle_fixture();
        let mut scheduler = AdaptiveScheduler::new(tuning());
        let abort = AbortToken::new();

        scheduler.set_direct_illumination(vec![Rgb8::new(255, 255, 255)], ScaleTable::identity());
        for _ in 0..5 {
            scheduler.calculate(&mut solver, &abort);
        }
        let lit = solver.triangle_exitance(0).sum();
        assert!(lit > 0.0);

        // Turning the light off must not leave stale bounce light
        // behind: the reset rewrites the baseline in full.
        scheduler.set_direct_illumination(vec![Rgb8::BLACK], ScaleTable::identity());
        for _ in 0..5 {
            scheduler.calculate(&mut solver, &abort);
        }
        let dark = solver.triangle_exitance(0).sum();
        assert!(
            dark < lit * 0.01,
            "exitance stayed at {dark} after the light went out (lit {lit})"
        );
    }

    #[test]
    fn aborted_frame_performs_no_shots() {
        let (_mesh, mut solver) = single_triangle_fixture();
        let mut scheduler = AdaptiveScheduler::new(tuning());
        scheduler.set_direct_illumination(vec![Rgb8::new(255, 255, 255)], ScaleTable::identity());

        let abort = AbortToken::new();
        abort.request_abort();
        let shots = scheduler.calculate(&mut solver, &abort);
        assert_eq!(shots, 0);
        // The reset still applied; the energy just stays unshot.
        assert!(solver.unshot_energy(0).sum() > 0.0);
    }
}
