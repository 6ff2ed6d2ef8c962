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

//! Sharing of loaded baked datasets between solver instances.
//!
//! Several solvers over the same scene want one loaded
//! [`PackedSolverFile`], not one copy each. The cache is an explicit
//! value the caller owns and passes around; entries are weak, so a
//! dataset's lifetime is governed by its solvers, never by the cache.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use ahash::AHashMap;

use crate::error::SolverResult;
use crate::packed::file::PackedSolverFile;

/// A path-keyed cache of weakly held baked datasets.
#[derive(Debug, Default)]
pub struct SolverFileCache {
    entries: AHashMap<PathBuf, Weak<PackedSolverFile>>,
}

impl SolverFileCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the dataset at `path`, loading it only if no live
    /// handle exists yet. The compatibility gates of
    /// [`PackedSolverFile::load`] apply on the load path; a cached hit
    /// was already validated against the same `scene_hash` key.
    pub fn get_or_load(
        &mut self,
        path: &Path,
        scene_hash: u64,
    ) -> SolverResult<Arc<PackedSolverFile>> {
        if let Some(live) = self.entries.get(path).and_then(Weak::upgrade) {
            log::debug!("solver file cache hit: {}", path.display());
            return Ok(live);
        }
        let loaded = Arc::new(PackedSolverFile::load(path, scene_hash)?);
        self.entries
            .insert(path.to_path_buf(), Arc::downgrade(&loaded));
        Ok(loaded)
    }

    /// Drops entries whose last strong handle is gone.
    pub fn prune(&mut self) {
        self.entries.retain(|_, weak| weak.strong_count() > 0);
    }

    /// Forgets `path`, forcing the next `get_or_load` to hit the disk.
    pub fn evict(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    /// Number of entries, live or dead.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
