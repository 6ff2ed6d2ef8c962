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

//! # Lumen Solver
//!
//! The computational heart of the Lumen GI SDK: a packed
//! progressive-radiosity solver and the adaptive scheduler that drives
//! it frame by frame.
//!
//! The pipeline, leaves first:
//! - [`packed::PackedArray`]: one-allocation two-level storage for
//!   variable-length per-triangle record runs.
//! - [`packed::PackedSolverFile`]: the immutable baked dataset
//!   (transfer records, sky factors, vertex smoothing) with binary
//!   load/save and a version + scene-hash compatibility gate.
//! - [`selector::TopKSelector`]: bounded top-K cache yielding the
//!   triangles holding the most unshot energy.
//! - [`solver::PackedSolver`]: live radiometric state and the
//!   Southwell-style energy-shooting iteration.
//! - [`scheduler::AdaptiveScheduler`]: per-frame budgeting of solver
//!   time against interactive frame rate, plus reset dirty-tracking.

pub mod bake;
pub mod cache;
pub mod error;
pub mod packed;
pub mod scheduler;
pub mod selector;
pub mod solver;

pub use bake::BakeParams;
pub use cache::SolverFileCache;
pub use error::{SolverError, SolverResult};
pub use packed::{PackedSolverFile, SkyFactor, TransferRecord, FORMAT_VERSION, SKY_PATCH_COUNT};
pub use scheduler::{AdaptiveScheduler, SchedulerTuning};
pub use selector::TopKSelector;
pub use solver::{PackedSolver, Rgb8, ScaleTable};
