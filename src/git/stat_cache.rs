//! git::stat_cache
//!
//! Memoization of working-copy state probes.
//!
//! # Design
//!
//! Probing "which tag is checked out" or "which branch am I on" costs a
//! subprocess each time, and the same working copy is asked many times per
//! pipeline run. The cache stores one slot per (directory, [`StatKind`]).
//!
//! Each slot is an `Arc<tokio::sync::OnceCell<String>>`. The map lock is
//! held only long enough to fetch or insert the slot; the probe itself runs
//! inside `OnceCell::get_or_try_init`, so a second caller asking for a key
//! that is already being probed waits on the same cell instead of starting
//! another subprocess.
//!
//! Cache invalidation:
//! - [`StatCache::clear`] drops every kind for one directory
//! - A failed probe leaves its slot empty; the next caller probes again
//! - Callers already waiting on a cleared slot still receive its value;
//!   callers arriving after the clear get a fresh slot
//!
//! # Example
//!
//! ```
//! use shallowmirror::git::stat_cache::{StatCache, StatKind};
//! use std::path::Path;
//!
//! # tokio_test_block_on(async {
//! let cache = StatCache::new();
//! let dir = Path::new("/cache/repo");
//!
//! let tag = cache
//!     .memoize(dir, StatKind::Tag, || async { Ok::<_, std::io::Error>("v1.0".to_string()) })
//!     .await
//!     .unwrap();
//! assert_eq!(tag, "v1.0");
//!
//! cache.clear(dir);
//! assert!(cache.is_empty());
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OnceCell;
use tracing::trace;

/// The kinds of working-copy state that are memoized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKind {
    /// Output of `git describe --tags --always`
    Tag,
    /// Output of `git branch --show-current`
    Branch,
    /// Local branch names, one per line
    LocalBranches,
}

impl StatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatKind::Tag => "tag",
            StatKind::Branch => "branch",
            StatKind::LocalBranches => "local-branches",
        }
    }
}

impl std::fmt::Display for StatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

type Slot = Arc<OnceCell<String>>;

/// Process-wide, concurrency-safe cache of working-copy probes.
#[derive(Debug, Default)]
pub struct StatCache {
    slots: Mutex<HashMap<(PathBuf, StatKind), Slot>>,
}

impl StatCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<(PathBuf, StatKind), Slot>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the cached value for (dir, kind), running `probe` only if no
    /// value is cached or in flight.
    ///
    /// # Errors
    ///
    /// Returns the probe's error. Errors are not cached.
    pub async fn memoize<F, Fut, E>(&self, dir: &Path, kind: StatKind, probe: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        let slot = {
            let mut slots = self.slots();
            slots
                .entry((dir.to_path_buf(), kind))
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let value = slot
            .get_or_try_init(|| async {
                trace!(dir = %dir.display(), %kind, "stat cache miss, probing");
                probe().await
            })
            .await?;
        Ok(value.clone())
    }

    /// Drop every cached kind for a directory.
    pub fn clear(&self, dir: &Path) {
        let mut slots = self.slots();
        slots.retain(|(slot_dir, _), _| slot_dir != dir);
        trace!(dir = %dir.display(), "stat cache cleared");
    }

    /// Look at a resolved value without probing.
    pub fn peek(&self, dir: &Path, kind: StatKind) -> Option<String> {
        let slots = self.slots();
        slots
            .get(&(dir.to_path_buf(), kind))
            .and_then(|slot| slot.get().cloned())
    }

    /// Number of slots currently held (resolved or in flight).
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
