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

//! The progressive-shooting radiosity solver.
//!
//! Each triangle carries three energy slots: `to_diffuse` (received,
//! not yet broadcast), `diffused` (already broadcast) and `direct`
//! (the baseline seeded by the last reset). One improve step takes the
//! triangle with the most unshot flux, converts it through its
//! reflectance and distributes it along the baked transfer records.
//! Shooting is inherently sequential (each shot feeds the ranking of
//! the next); only the bulk per-triangle passes run in parallel.

use std::sync::Arc;

use rayon::prelude::*;

use lumen_core::math::LinearRgb;
use lumen_core::TriangleMesh;

use crate::packed::file::PackedSolverFile;
use crate::packed::sky::SKY_PATCH_COUNT;
use crate::selector::TopKSelector;

/// An 8-bit RGB illumination sample, decoded through a [`ScaleTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Rgb8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb8 {
    /// The all-zero (black) sample.
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };

    /// Creates a sample from raw channel bytes.
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Maps 8-bit illumination channels to physical units.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleTable {
    entries: [f32; 256],
}

impl ScaleTable {
    /// The linear table: byte `i` decodes to `i / 255`.
    pub fn identity() -> Self {
        let mut entries = [0.0f32; 256];
        for (i, entry) in entries.iter_mut().enumerate() {
            *entry = i as f32 / 255.0;
        }
        Self { entries }
    }

    /// Creates a table from explicit per-byte values.
    pub fn from_entries(entries: [f32; 256]) -> Self {
        Self { entries }
    }

    /// Decodes one sample into linear RGB.
    #[inline]
    pub fn decode(&self, sample: Rgb8) -> LinearRgb {
        LinearRgb::new(
            self.entries[sample.r as usize],
            self.entries[sample.g as usize],
            self.entries[sample.b as usize],
        )
    }
}

impl Default for ScaleTable {
    fn default() -> Self {
        Self::identity()
    }
}

/// Live per-triangle energy state.
#[derive(Debug, Clone, Copy, Default)]
struct TriangleState {
    /// Received flux not yet broadcast.
    to_diffuse: LinearRgb,
    /// Flux already broadcast along the transfer records.
    diffused: LinearRgb,
    /// Baseline seeded by the last reset, kept for incremental resets
    /// and for separating indirect from direct light.
    direct: LinearRgb,
}

/// A progressive radiosity solver bound to one mesh and one baked
/// dataset.
///
/// Owns all mutable triangle state exclusively; the baked file is
/// shared read-only. Not internally synchronized.
#[derive(Debug)]
pub struct PackedSolver {
    file: Arc<PackedSolverFile>,
    reflectance: Vec<LinearRgb>,
    area_inverse: Vec<f32>,
    tri: Vec<TriangleState>,
    selector: TopKSelector,
    vertex_irradiance: Vec<LinearRgb>,
    vertex_dirty: bool,
}

impl PackedSolver {
    /// Binds a solver to `mesh` with per-triangle `reflectance`.
    ///
    /// Returns `None` when the dataset was baked for a different
    /// triangle count or the reflectance slice does not cover the
    /// mesh; both are logged, neither is a crash.
    pub fn create(
        mesh: &TriangleMesh,
        reflectance: &[LinearRgb],
        file: Arc<PackedSolverFile>,
    ) -> Option<Self> {
        if let Err(err) = file.ensure_compatible(mesh) {
            log::warn!("solver not created: {err}");
            return None;
        }
        if reflectance.len() != mesh.triangle_count() {
            log::warn!(
                "reflectance covers {} triangles, mesh has {}",
                reflectance.len(),
                mesh.triangle_count()
            );
            return None;
        }

        let n = mesh.triangle_count();
        let area_inverse = (0..n)
            .map(|t| {
                let area = mesh.area(t);
                if area > 0.0 {
                    1.0 / area
                } else {
                    0.0
                }
            })
            .collect();

        Some(Self {
            vertex_irradiance: vec![LinearRgb::ZERO; file.ivertex_count()],
            file,
            reflectance: reflectance.to_vec(),
            area_inverse,
            tri: vec![TriangleState::default(); n],
            selector: TopKSelector::default(),
            vertex_dirty: true,
        })
    }

    /// Number of triangles under simulation.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.tri.len()
    }

    /// Replaces the per-triangle reflectance. Returns `false` (and
    /// changes nothing) when the slice does not cover the mesh.
    ///
    /// Already-distributed energy keeps the old factors baked in, so
    /// callers follow this with a strong reset.
    pub fn set_reflectance(&mut self, reflectance: &[LinearRgb]) -> bool {
        if reflectance.len() != self.tri.len() {
            log::warn!(
                "reflectance covers {} triangles, solver has {}",
                reflectance.len(),
                self.tri.len()
            );
            return false;
        }
        self.reflectance.clear();
        self.reflectance.extend_from_slice(reflectance);
        true
    }

    /// Re-seeds the baseline direct energy from 8-bit illumination
    /// samples decoded through `scale`.
    ///
    /// `strong` rewrites every triangle (unshot = baseline, shot = 0).
    /// The incremental variant touches only triangles whose decoded
    /// value changed, adjusting unshot by the delta while keeping shot
    /// energy; negative transients are clamped per channel.
    pub fn illumination_reset(&mut self, direct: &[Rgb8], scale: &ScaleTable, strong: bool) {
        if direct.len() != self.tri.len() {
            log::warn!(
                "direct illumination covers {} triangles, solver has {}",
                direct.len(),
                self.tri.len()
            );
            return;
        }

        if strong {
            self.tri
                .par_iter_mut()
                .zip(direct.par_iter())
                .for_each(|(state, &sample)| {
                    let baseline = scale.decode(sample);
                    *state = TriangleState {
                        to_diffuse: baseline,
                        diffused: LinearRgb::ZERO,
                        direct: baseline,
                    };
                });
        } else {
            self.tri
                .par_iter_mut()
                .zip(direct.par_iter())
                .for_each(|(state, &sample)| {
                    let baseline = scale.decode(sample);
                    if baseline == state.direct {
                        return;
                    }
                    let adjusted = state.to_diffuse + baseline - state.direct;
                    state.to_diffuse = LinearRgb::new(
                        adjusted.r.max(0.0),
                        adjusted.g.max(0.0),
                        adjusted.b.max(0.0),
                    );
                    state.direct = baseline;
                });
        }

        self.selector.invalidate();
        self.vertex_dirty = true;
    }

    /// Runs progressive shooting steps until `end()` reports the
    /// deadline or no unshot energy remains. Returns the number of
    /// shots performed.
    ///
    /// `end` is polled before every shot, so a call with an
    /// already-expired deadline performs zero shots and mutates
    /// nothing.
    pub fn illumination_improve(&mut self, mut end: impl FnMut() -> bool) -> usize {
        let mut shots = 0;
        while !end() {
            let Some(source) = self.next_candidate() else {
                break;
            };
            self.shoot(source);
            shots += 1;
        }
        if shots > 0 {
            self.vertex_dirty = true;
        }
        shots
    }

    fn next_candidate(&mut self) -> Option<usize> {
        loop {
            // Cached entries may have gone cold since the last scan.
            while let Some(index) = self.selector.pop() {
                if self.tri[index as usize].to_diffuse.sum() > 0.0 {
                    return Some(index as usize);
                }
            }
            let tri = &self.tri;
            self.selector.refresh(
                tri.iter()
                    .enumerate()
                    .map(|(i, state)| (i as u32, state.to_diffuse.sum())),
            );
            if self.selector.remaining() == 0 {
                return None;
            }
        }
    }

    fn shoot(&mut self, source: usize) {
        let reflectance = self.reflectance[source];
        let state = &mut self.tri[source];
        let exiting = state.to_diffuse * reflectance;
        state.diffused += state.to_diffuse;
        state.to_diffuse = LinearRgb::ZERO;

        let file = Arc::clone(&self.file);
        for record in file.transfer_records(source) {
            self.tri[record.destination as usize].to_diffuse += exiting * record.weight;
        }
    }

    /// Instantaneous radiant exitance of triangle `t`, for direct
    /// consumption by non-smoothed objects.
    #[inline]
    pub fn triangle_exitance(&self, t: usize) -> LinearRgb {
        let state = &self.tri[t];
        (state.diffused + state.to_diffuse) * self.reflectance[t] * self.area_inverse[t]
    }

    /// Unshot flux of triangle `t`. Diagnostic view of the live state.
    #[inline]
    pub fn unshot_energy(&self, t: usize) -> LinearRgb {
        self.tri[t].to_diffuse
    }

    /// Already-broadcast flux of triangle `t`.
    #[inline]
    pub fn shot_energy(&self, t: usize) -> LinearRgb {
        self.tri[t].diffused
    }

    /// Total unshot flux summed over the scene, a convergence measure.
    pub fn total_unshot_energy(&self) -> f32 {
        self.tri.iter().map(|s| s.to_diffuse.sum()).sum()
    }

    /// Recomputes per-vertex indirect irradiance if any reset or shot
    /// happened since the last call. Parallel over ivertices; each
    /// worker writes only its own slot.
    pub fn vertex_irradiance_update(&mut self) {
        if !self.vertex_dirty {
            return;
        }
        let file = &self.file;
        let tri = &self.tri;
        let area_inverse = &self.area_inverse;
        self.vertex_irradiance
            .par_iter_mut()
            .enumerate()
            .for_each(|(iv, out)| {
                let mut acc = LinearRgb::ZERO;
                for record in file.smoothing_records(iv) {
                    let t = record.triangle as usize;
                    let state = &tri[t];
                    let indirect = state.diffused + state.to_diffuse - state.direct;
                    acc += indirect * (area_inverse[t] * record.weight);
                }
                *out = acc;
            });
        self.vertex_dirty = false;
    }

    /// Smoothed indirect irradiance at `corner` of triangle `t`.
    ///
    /// Stable between calls to [`PackedSolver::vertex_irradiance_update`],
    /// so callers may cache values across frames.
    #[inline]
    pub fn vertex_irradiance(&self, t: usize, corner: usize) -> LinearRgb {
        self.vertex_irradiance[self.file.ivertex_of_corner(t, corner) as usize]
    }

    /// Irradiance arriving at triangle `t` from the sky, given the
    /// current per-patch sky radiance.
    pub fn sky_irradiance(&self, t: usize, sky: &[LinearRgb; SKY_PATCH_COUNT]) -> LinearRgb {
        self.file
            .sky_factor(t)
            .irradiance(sky, self.file.intensity_table())
    }
}
