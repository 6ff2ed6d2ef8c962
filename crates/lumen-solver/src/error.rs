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

//! The error taxonomy of the solver crate.
//!
//! Incompatibility of a baked file (version, scene hash, triangle
//! count) is an ordinary error the caller recovers from by re-baking;
//! it must never crash. Builder-contract violations are programmer
//! errors surfaced as checked errors instead of undefined behavior.
//! Cooperative cancellation is only an error during baking, where a
//! partial dataset has no value.

use thiserror::Error;

/// Errors produced by baking, loading, and constructing solvers.
#[derive(Debug, Error)]
pub enum SolverError {
    /// An underlying I/O operation failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The baked file carries an unknown or invalid format version.
    /// A version of zero means a writer crashed mid-save.
    #[error("baked file version {found} is not supported")]
    IncompatibleVersion {
        /// The version tag found in the file.
        found: u32,
    },

    /// The baked file was produced from a different scene.
    #[error("scene hash mismatch: file {found:#018x}, current scene {expected:#018x}")]
    SceneHashMismatch {
        /// The hash stored in the file.
        found: u64,
        /// The hash of the scene the caller wants to illuminate.
        expected: u64,
    },

    /// The baked file describes a different number of triangles than
    /// the live mesh.
    #[error("triangle count mismatch: file has {file}, mesh has {mesh}")]
    TriangleCountMismatch {
        /// Triangle count recorded in the baked file.
        file: usize,
        /// Triangle count of the live mesh.
        mesh: usize,
    },

    /// A section of the baked file is truncated or internally
    /// inconsistent.
    #[error("malformed {0} section in baked file")]
    MalformedSection(&'static str),

    /// A packed-array builder was driven out of its declared sequence.
    #[error("packed array builder contract violated: {0}")]
    BuilderContract(&'static str),

    /// The operation observed the abort flag before completing.
    #[error("operation aborted before completion")]
    Aborted,
}

/// Convenience alias used throughout the crate.
pub type SolverResult<T> = Result<T, SolverError>;
