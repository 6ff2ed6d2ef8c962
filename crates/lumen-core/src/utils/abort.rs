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

//! Cooperative cancellation for long-running solver work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable cancellation flag polled by long-running operations.
///
/// The caller keeps one clone and hands another to a bake or improve
/// call, possibly running on a different thread. Once
/// [`AbortToken::request_abort`] is observed, the current unit of work
/// completes and control returns; no partial-state rollback happens.
/// Observing an abort is a normal early return, not an error, except
/// during baking where a partial dataset is useless.
#[derive(Debug, Clone, Default)]
pub struct AbortToken {
    flag: Arc<AtomicBool>,
}

impl AbortToken {
    /// Creates a token in the "not aborted" state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    #[inline]
    pub fn request_abort(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once cancellation has been requested.
    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Clears the flag so the token can be reused for the next
    /// long-running operation.
    #[inline]
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_is_visible_through_clones() {
        let token = AbortToken::new();
        let observer = token.clone();
        assert!(!observer.is_aborted());
        token.request_abort();
        assert!(observer.is_aborted());
        token.reset();
        assert!(!observer.is_aborted());
    }
}
