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

//! Packed, immutable solver data: the two-level record container, the
//! compressed sky coupling, vertex smoothing maps, and the baked-file
//! binary format that binds them together.

pub mod array;
pub mod file;
pub mod sky;
pub mod smoothing;

pub use array::{PackedArray, PackedArrayBuilder, PackedHeader};
pub use file::{PackedSolverFile, TransferRecord, TriangleHeader, FORMAT_VERSION};
pub use sky::{IntensityTable, SkyFactor, SKY_PATCH_COUNT};
pub use smoothing::{SmoothingRecord, TriangleIVertices, VertexHeader};
