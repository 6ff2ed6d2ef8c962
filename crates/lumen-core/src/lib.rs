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

//! # Lumen Core
//!
//! Foundational crate for the Lumen global-illumination SDK: math
//! primitives, triangle-mesh geometry, and small runtime utilities
//! shared by the solver and its callers.

#![warn(missing_docs)]

pub mod math;
pub mod mesh;
pub mod utils;

pub use math::{LinearRgb, Vec3};
pub use mesh::TriangleMesh;
pub use utils::abort::AbortToken;
pub use utils::timer::Stopwatch;
