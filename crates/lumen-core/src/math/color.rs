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

//! Defines the `LinearRgb` color type and associated operations.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Sub};

/// A radiometric quantity in **linear RGB** space using `f32` components.
///
/// This is the standard representation for flux, irradiance, and
/// exitance within Lumen. Components are High Dynamic Range: values
/// routinely exceed `1.0` and carry physical units, so there is no
/// alpha channel and no gamma encoding anywhere in the solver.
///
/// `#[repr(C)]` ensures a consistent memory layout for packed storage.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    bytemuck::Pod,
    bytemuck::Zeroable,
    Serialize,
    Deserialize,
)]
#[repr(C)]
pub struct LinearRgb {
    /// The red component in linear space.
    pub r: f32,
    /// The green component in linear space.
    pub g: f32,
    /// The blue component in linear space.
    pub b: f32,
}

impl LinearRgb {
    /// Zero energy in all channels.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    /// Unit energy in all channels.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    /// Creates a new `LinearRgb` with explicit channel values.
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Creates a new `LinearRgb` with all channels set to `v`.
    #[inline]
    pub const fn splat(v: f32) -> Self {
        Self { r: v, g: v, b: v }
    }

    /// Sum of the three channels. Used as a scalar "importance" measure.
    #[inline]
    pub fn sum(&self) -> f32 {
        self.r + self.g + self.b
    }

    /// Largest of the three channels.
    #[inline]
    pub fn max_component(&self) -> f32 {
        self.r.max(self.g).max(self.b)
    }

    /// Returns `true` if all channels are finite numbers.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite()
    }

    /// Returns `true` if all channels are `>= 0.0`.
    #[inline]
    pub fn is_non_negative(&self) -> bool {
        self.r >= 0.0 && self.g >= 0.0 && self.b >= 0.0
    }
}

impl Add for LinearRgb {
    type Output = Self;
    /// Adds energies channel-wise.
    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            r: self.r + rhs.r,
            g: self.g + rhs.g,
            b: self.b + rhs.b,
        }
    }
}

impl AddAssign for LinearRgb {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for LinearRgb {
    type Output = Self;
    /// Subtracts energies channel-wise.
    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            r: self.r - rhs.r,
            g: self.g - rhs.g,
            b: self.b - rhs.b,
        }
    }
}

impl Mul for LinearRgb {
    type Output = Self;
    /// Modulates one quantity by another channel-wise (e.g. flux by
    /// reflectance).
    #[inline]
    fn mul(self, rhs: Self) -> Self::Output {
        Self {
            r: self.r * rhs.r,
            g: self.g * rhs.g,
            b: self.b * rhs.b,
        }
    }
}

impl Mul<f32> for LinearRgb {
    type Output = Self;
    /// Scales all channels by a scalar.
    #[inline]
    fn mul(self, rhs: f32) -> Self::Output {
        Self {
            r: self.r * rhs,
            g: self.g * rhs,
            b: self.b * rhs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_arithmetic() {
        let a = LinearRgb::new(1.0, 2.0, 3.0);
        let b = LinearRgb::new(0.5, 0.5, 0.5);
        assert_eq!(a + b, LinearRgb::new(1.5, 2.5, 3.5));
        assert_eq!(a - b, LinearRgb::new(0.5, 1.5, 2.5));
        assert_eq!(a * b, LinearRgb::new(0.5, 1.0, 1.5));
        assert_eq!(a * 2.0, LinearRgb::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn scalar_reductions() {
        let c = LinearRgb::new(0.25, 0.5, 1.0);
        assert_eq!(c.sum(), 1.75);
        assert_eq!(c.max_component(), 1.0);
        assert!(c.is_non_negative());
        assert!(!(c - LinearRgb::WHITE).is_non_negative());
    }
}
