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

//! Vertex smoothing maps.
//!
//! Radiosity results are inherently per-triangle; static objects want
//! continuous per-vertex values. Each shared vertex ("ivertex") owns a
//! list of contributing triangles with blend weights summing toward 1,
//! and each triangle corner points back at its ivertex.

use crate::packed::array::PackedHeader;

/// Outer-row header of the ivertex smoothing table: just the range
/// offset, no extra payload.
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct VertexHeader {
    record_offset: u32,
}

impl PackedHeader for VertexHeader {
    type Payload = ();

    fn with_offset(record_offset: u32, _payload: ()) -> Self {
        Self { record_offset }
    }

    fn record_offset(&self) -> u32 {
        self.record_offset
    }
}

/// One triangle's contribution to an ivertex.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct SmoothingRecord {
    /// Index of the contributing triangle.
    pub triangle: u32,
    /// Blend weight; weights across one ivertex sum toward 1.
    pub weight: f32,
}

/// The three ivertex indices of one triangle's corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct TriangleIVertices {
    /// One ivertex index per corner, in index-triple order.
    pub ivertex: [u32; 3],
}
