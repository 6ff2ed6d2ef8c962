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

//! Amortized best-candidate selection.
//!
//! Progressive shooting wants the brightest triangle every step, but a
//! full scan per step is O(N) and the ranking only drifts slowly. The
//! selector keeps a small descending cache of the top candidates from
//! the last full scan and hands them out one by one; only when the
//! cache runs dry does the caller pay for another scan.

/// Default number of candidates retained per refresh.
pub const DEFAULT_CAPACITY: usize = 200;

/// A fixed-capacity descending cache of `(index, quality)` candidates.
#[derive(Debug, Clone)]
pub struct TopKSelector {
    // Sorted descending by quality; `cursor` marks the next entry to
    // hand out.
    entries: Vec<(u32, f32)>,
    cursor: usize,
    capacity: usize,
}

impl Default for TopKSelector {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl TopKSelector {
    /// Creates an empty selector retaining at most `capacity`
    /// candidates per refresh.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Rebuilds the cache from a full candidate scan.
    ///
    /// Zero and negative qualities never enter the cache; a candidate
    /// only displaces a retained one when strictly better, so ties
    /// keep the earlier arrival.
    pub fn refresh(&mut self, candidates: impl IntoIterator<Item = (u32, f32)>) {
        self.entries.clear();
        self.cursor = 0;
        for (index, quality) in candidates {
            self.offer(index, quality);
        }
    }

    fn offer(&mut self, index: u32, quality: f32) {
        if quality <= 0.0 {
            return;
        }
        // Common case: cache full and the candidate no better than the
        // current tail.
        if self.entries.len() == self.capacity {
            let (_, tail) = self.entries[self.capacity - 1];
            if quality <= tail {
                return;
            }
            self.entries.pop();
        }
        let at = self
            .entries
            .partition_point(|&(_, retained)| retained >= quality);
        self.entries.insert(at, (index, quality));
    }

    /// Hands out the next-best cached candidate, or `None` when the
    /// cache is exhausted and a refresh is due.
    pub fn pop(&mut self) -> Option<u32> {
        let (index, _) = *self.entries.get(self.cursor)?;
        self.cursor += 1;
        Some(index)
    }

    /// Number of candidates still available without a refresh.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.entries.len() - self.cursor
    }

    /// Drops all cached candidates, forcing the next consumer to
    /// refresh. Called when live state changes wholesale.
    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}
