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

//! Compressed sky-to-triangle coupling.
//!
//! Each triangle stores a 16-byte [`SkyFactor`]: an RGB "hue" in two
//! bytes (the third channel is implied by the 255-complement) plus one
//! byte per coarse sky patch indexing a shared 256-entry non-linear
//! [`IntensityTable`]. Decompression is deterministic and monotonic in
//! the table, so identical inputs always reconstruct identical values.

use lumen_core::math::{LinearRgb, Vec3};

/// Number of coarse sky patches: one zenith cap, four upper-ring
/// quadrants, eight horizon-band sectors.
pub const SKY_PATCH_COUNT: usize = 13;

// Elevation (y component of a unit direction) separating the zenith
// cap from the upper ring, and the upper ring from the horizon band.
const ZENITH_ELEVATION: f32 = 0.8;
const RING_ELEVATION: f32 = 0.3;

/// Maps a unit direction to its coarse sky-patch index in
/// `0..SKY_PATCH_COUNT`. Total and deterministic for any finite input.
pub fn sky_patch_index(dir: Vec3) -> usize {
    if dir.y >= ZENITH_ELEVATION {
        return 0;
    }
    if dir.y >= RING_ELEVATION {
        let quadrant = match (dir.x >= 0.0, dir.z >= 0.0) {
            (true, true) => 0,
            (false, true) => 1,
            (false, false) => 2,
            (true, false) => 3,
        };
        return 1 + quadrant;
    }
    let azimuth = dir.z.atan2(dir.x) + std::f32::consts::PI;
    let sector = ((azimuth / (std::f32::consts::PI / 4.0)) as usize).min(7);
    5 + sector
}

/// The shared 256-entry non-linear intensity lookup table.
///
/// Entries are non-decreasing; entry 0 is exactly `0.0`. The curve is
/// quadratic so small couplings, which dominate indoor scenes, get
/// most of the index range.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityTable {
    entries: [f32; 256],
}

impl IntensityTable {
    /// Builds the table spanning `[0, max_intensity]`.
    pub fn build(max_intensity: f32) -> Self {
        let mut entries = [0.0f32; 256];
        for (i, entry) in entries.iter_mut().enumerate() {
            let t = i as f32 / 255.0;
            *entry = max_intensity * t * t;
        }
        Self { entries }
    }

    /// Constructs a table from raw entries (the load path). Returns
    /// `None` if the entries are not monotonically non-decreasing.
    pub fn from_entries(entries: [f32; 256]) -> Option<Self> {
        if entries.windows(2).any(|w| w[1] < w[0]) {
            return None;
        }
        Some(Self { entries })
    }

    /// The raw entries, for serialization.
    #[inline]
    pub fn entries(&self) -> &[f32; 256] {
        &self.entries
    }

    /// The decompressed value of index `idx`.
    #[inline]
    pub fn value(&self, idx: u8) -> f32 {
        self.entries[idx as usize]
    }

    /// The index whose entry is nearest to `v` (binary search over the
    /// monotonic entries; ties resolve to the lower index).
    pub fn quantize(&self, v: f32) -> u8 {
        let upper = self.entries.partition_point(|&e| e < v);
        if upper == 0 {
            return 0;
        }
        if upper >= self.entries.len() {
            return 255;
        }
        let below = upper - 1;
        if v - self.entries[below] <= self.entries[upper] - v {
            below as u8
        } else {
            upper as u8
        }
    }
}

/// Per-triangle compressed sky coupling. 16 bytes.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    bytemuck::Pod,
    bytemuck::Zeroable,
)]
#[repr(C)]
pub struct SkyFactor {
    /// Red and green hue bytes; blue is `255 - hue[0] - hue[1]`
    /// (saturating).
    pub hue: [u8; 2],
    /// One table index per sky patch.
    pub patches: [u8; SKY_PATCH_COUNT],
    /// Reserved padding byte, always zero.
    pub reserved: u8,
}

impl SkyFactor {
    /// The neutral hue: equal thirds.
    pub const NEUTRAL_HUE: [u8; 2] = [85, 85];

    /// Compresses per-patch RGB coupling factors against the shared
    /// table. The hue is derived from the summed factor color; the
    /// stored per-patch intensity is the factor's channel sum.
    pub fn compress(factors: &[LinearRgb; SKY_PATCH_COUNT], table: &IntensityTable) -> Self {
        let total: LinearRgb = factors
            .iter()
            .fold(LinearRgb::ZERO, |acc, &f| acc + f);
        let sum = total.sum();
        let hue = if sum > 0.0 {
            let r = ((total.r / sum) * 255.0).round() as u32;
            let g = ((total.g / sum) * 255.0).round() as u32;
            let r = r.min(255);
            let g = g.min(255 - r);
            [r as u8, g as u8]
        } else {
            Self::NEUTRAL_HUE
        };

        let mut patches = [0u8; SKY_PATCH_COUNT];
        for (slot, factor) in patches.iter_mut().zip(factors.iter()) {
            *slot = table.quantize(factor.sum());
        }

        Self {
            hue,
            patches,
            reserved: 0,
        }
    }

    /// The hue as channel fractions summing to 1.
    #[inline]
    pub fn hue_fractions(&self) -> LinearRgb {
        let r = self.hue[0] as f32;
        let g = self.hue[1] as f32;
        let b = (255u16.saturating_sub(self.hue[0] as u16 + self.hue[1] as u16)) as f32;
        LinearRgb::new(r / 255.0, g / 255.0, b / 255.0)
    }

    /// Decompresses the RGB coupling factor of one sky patch.
    #[inline]
    pub fn decompress(&self, patch: usize, table: &IntensityTable) -> LinearRgb {
        self.hue_fractions() * table.value(self.patches[patch])
    }

    /// Irradiance arriving at the triangle from the given per-patch
    /// sky radiances.
    pub fn irradiance(
        &self,
        sky: &[LinearRgb; SKY_PATCH_COUNT],
        table: &IntensityTable,
    ) -> LinearRgb {
        let mut acc = LinearRgb::ZERO;
        for (patch, radiance) in sky.iter().enumerate() {
            acc += self.decompress(patch, table) * *radiance;
        }
        acc
    }
}
