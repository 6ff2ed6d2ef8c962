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

//! The immutable baked solver dataset and its binary durability.
//!
//! On-disk layout, in order: [`FileHeader`], the 256-entry intensity
//! table as raw `f32`s, then the three raw sections (transfer records,
//! ivertex smoothing index, per-triangle ivertex triples). The version
//! field is written as invalid first and only overwritten with the
//! real version after every section landed, so a crash mid-write is
//! observable as "no valid file" rather than silent corruption.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use lumen_core::TriangleMesh;

use crate::error::{SolverError, SolverResult};
use crate::packed::array::{PackedArray, PackedHeader};
use crate::packed::sky::{IntensityTable, SkyFactor};
use crate::packed::smoothing::{SmoothingRecord, TriangleIVertices, VertexHeader};

/// Version tag of the current on-disk structure layout.
pub const FORMAT_VERSION: u32 = 3;

// Placeholder written before the sections land; a file carrying it was
// interrupted mid-save and must never load.
const VERSION_INVALID: u32 = 0;

/// Fixed header at the front of a baked solver file. 24 bytes.
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
struct FileHeader {
    version: u32,
    transfer_bytes: u32,
    smoothing_index_bytes: u32,
    smoothing_triangle_bytes: u32,
    scene_hash: u64,
}

/// A directed triangle-to-triangle energy transfer.
///
/// `weight` is the fraction of exiting flux arriving at the
/// destination; it may exceed 1.0 in the presence of specular
/// multiple-bounce paths, but is always non-negative.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct TransferRecord {
    /// Transfer strength.
    pub weight: f32,
    /// Index of the receiving triangle.
    pub destination: u32,
}

/// Per-source-triangle header: transfer-range offset plus the
/// compressed sky coupling. 20 bytes.
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct TriangleHeader {
    transfer_offset: u32,
    /// Compressed sky-to-triangle coupling.
    pub sky: SkyFactor,
}

impl PackedHeader for TriangleHeader {
    type Payload = SkyFactor;

    fn with_offset(record_offset: u32, payload: SkyFactor) -> Self {
        Self {
            transfer_offset: record_offset,
            sky: payload,
        }
    }

    fn record_offset(&self) -> u32 {
        self.transfer_offset
    }
}

/// The immutable precomputed dataset a [`crate::solver::PackedSolver`]
/// runs on: built offline by [`crate::bake`], loaded read-only for the
/// life of a solver instance, safely shared by reference.
#[derive(Debug, Clone)]
pub struct PackedSolverFile {
    transfers: PackedArray<TriangleHeader, TransferRecord>,
    smoothing: PackedArray<VertexHeader, SmoothingRecord>,
    triangle_ivertices: Vec<TriangleIVertices>,
    intensity_table: IntensityTable,
}

impl PackedSolverFile {
    /// Assembles a dataset from freshly baked parts, validating every
    /// cross-reference so runtime reads need no bounds checks.
    pub fn from_parts(
        transfers: PackedArray<TriangleHeader, TransferRecord>,
        smoothing: PackedArray<VertexHeader, SmoothingRecord>,
        triangle_ivertices: Vec<TriangleIVertices>,
        intensity_table: IntensityTable,
    ) -> SolverResult<Self> {
        let triangles = transfers.outer_count();
        let ivertices = smoothing.outer_count();

        if triangle_ivertices.len() != triangles {
            return Err(SolverError::MalformedSection("smoothing triangle"));
        }
        for t in 0..triangles {
            for record in transfers.records(t) {
                if record.destination as usize >= triangles || record.weight < 0.0 {
                    return Err(SolverError::MalformedSection("transfer"));
                }
            }
        }
        for iv in 0..ivertices {
            for record in smoothing.records(iv) {
                if record.triangle as usize >= triangles {
                    return Err(SolverError::MalformedSection("smoothing index"));
                }
            }
        }
        for triple in &triangle_ivertices {
            if triple.ivertex.iter().any(|&iv| iv as usize >= ivertices) {
                return Err(SolverError::MalformedSection("smoothing triangle"));
            }
        }

        Ok(Self {
            transfers,
            smoothing,
            triangle_ivertices,
            intensity_table,
        })
    }

    /// Number of source triangles the dataset was baked for.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.transfers.outer_count()
    }

    /// Number of smoothed shared vertices.
    #[inline]
    pub fn ivertex_count(&self) -> usize {
        self.smoothing.outer_count()
    }

    /// The transfer records of source triangle `t`.
    #[inline]
    pub fn transfer_records(&self, t: usize) -> &[TransferRecord] {
        self.transfers.records(t)
    }

    /// The compressed sky coupling of triangle `t`.
    #[inline]
    pub fn sky_factor(&self, t: usize) -> &SkyFactor {
        &self.transfers.header(t).sky
    }

    /// The smoothing records of ivertex `iv`.
    #[inline]
    pub fn smoothing_records(&self, iv: usize) -> &[SmoothingRecord] {
        self.smoothing.records(iv)
    }

    /// The ivertex index of triangle `t`'s corner `corner`.
    #[inline]
    pub fn ivertex_of_corner(&self, t: usize, corner: usize) -> u32 {
        self.triangle_ivertices[t].ivertex[corner]
    }

    /// The shared intensity lookup table.
    #[inline]
    pub fn intensity_table(&self) -> &IntensityTable {
        &self.intensity_table
    }

    /// Triangle-count check against a live mesh, the second guard
    /// before a solver is constructed from a loaded file.
    pub fn ensure_compatible(&self, mesh: &TriangleMesh) -> SolverResult<()> {
        if self.triangle_count() != mesh.triangle_count() {
            return Err(SolverError::TriangleCountMismatch {
                file: self.triangle_count(),
                mesh: mesh.triangle_count(),
            });
        }
        Ok(())
    }

    /// Boolean form of [`PackedSolverFile::ensure_compatible`].
    pub fn is_compatible(&self, mesh: &TriangleMesh) -> bool {
        self.ensure_compatible(mesh).is_ok()
    }

    /// Writes the dataset to `path`, stamped with the scene hash.
    pub fn save(&self, path: &Path, scene_hash: u64) -> SolverResult<()> {
        let transfer_bytes = self.transfers.to_bytes();
        let smoothing_bytes = self.smoothing.to_bytes();
        let triangle_bytes: &[u8] = bytemuck::cast_slice(&self.triangle_ivertices);

        let mut header = FileHeader {
            version: VERSION_INVALID,
            transfer_bytes: transfer_bytes.len() as u32,
            smoothing_index_bytes: smoothing_bytes.len() as u32,
            smoothing_triangle_bytes: triangle_bytes.len() as u32,
            scene_hash,
        };

        let mut file = File::create(path)?;
        file.write_all(bytemuck::bytes_of(&header))?;
        file.write_all(bytemuck::cast_slice(self.intensity_table.entries()))?;
        file.write_all(&transfer_bytes)?;
        file.write_all(&smoothing_bytes)?;
        file.write_all(triangle_bytes)?;
        file.flush()?;

        // All sections landed; only now make the file valid.
        header.version = FORMAT_VERSION;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(bytemuck::bytes_of(&header))?;
        file.sync_all()?;

        log::info!(
            "saved baked solver file: {} triangles, {} ivertices, hash {:#018x}",
            self.triangle_count(),
            self.ivertex_count(),
            scene_hash
        );
        Ok(())
    }

    /// Loads a dataset, enforcing the compatibility gate: the version
    /// tag must equal [`FORMAT_VERSION`] and the stored scene hash must
    /// equal `expected_hash`. A stale bake for a since-edited scene is
    /// rejected, never accepted silently.
    pub fn load(path: &Path, expected_hash: u64) -> SolverResult<Self> {
        let mut file = File::open(path)?;

        let mut header_buf = [0u8; std::mem::size_of::<FileHeader>()];
        file.read_exact(&mut header_buf)?;
        let header: FileHeader = bytemuck::pod_read_unaligned(&header_buf);

        if header.version != FORMAT_VERSION {
            return Err(SolverError::IncompatibleVersion {
                found: header.version,
            });
        }
        if header.scene_hash != expected_hash {
            return Err(SolverError::SceneHashMismatch {
                found: header.scene_hash,
                expected: expected_hash,
            });
        }

        // Section lengths come from an untrusted header; check them
        // against the real file size before allocating buffers.
        let fixed_len = (std::mem::size_of::<FileHeader>() + 256 * std::mem::size_of::<f32>()) as u64;
        let expected_len = fixed_len
            + header.transfer_bytes as u64
            + header.smoothing_index_bytes as u64
            + header.smoothing_triangle_bytes as u64;
        if file.metadata()?.len() != expected_len {
            return Err(SolverError::MalformedSection("file length"));
        }

        let mut table_buf = [0u8; 256 * std::mem::size_of::<f32>()];
        file.read_exact(&mut table_buf)?;
        let mut entries = [0.0f32; 256];
        bytemuck::cast_slice_mut::<f32, u8>(&mut entries).copy_from_slice(&table_buf);
        let intensity_table = IntensityTable::from_entries(entries)
            .ok_or(SolverError::MalformedSection("intensity table"))?;

        let mut read_section = |len: u32| -> SolverResult<Vec<u8>> {
            let mut buf = vec![0u8; len as usize];
            file.read_exact(&mut buf)?;
            Ok(buf)
        };
        let transfer_buf = read_section(header.transfer_bytes)?;
        let smoothing_buf = read_section(header.smoothing_index_bytes)?;
        let triangle_buf = read_section(header.smoothing_triangle_bytes)?;

        let transfers = PackedArray::from_bytes("transfer", &transfer_buf)?;
        let smoothing = PackedArray::from_bytes("smoothing index", &smoothing_buf)?;
        if triangle_buf.len() % std::mem::size_of::<TriangleIVertices>() != 0 {
            return Err(SolverError::MalformedSection("smoothing triangle"));
        }
        let triangle_ivertices: Vec<TriangleIVertices> =
            bytemuck::pod_collect_to_vec(&triangle_buf);

        let loaded = Self::from_parts(transfers, smoothing, triangle_ivertices, intensity_table)?;
        log::info!(
            "loaded baked solver file: {} triangles, {} transfer records",
            loaded.triangle_count(),
            loaded.transfers.record_count()
        );
        Ok(loaded)
    }

    /// The `Option`-returning convenience gate: any failure is logged
    /// and swallowed so callers can fall back to re-baking.
    pub fn load_compatible(path: &Path, expected_hash: u64) -> Option<Self> {
        match Self::load(path, expected_hash) {
            Ok(loaded) => Some(loaded),
            Err(err) => {
                log::warn!("baked solver file rejected ({}): {err}", path.display());
                None
            }
        }
    }
}
