//! Run-scoped temporary directory bookkeeping.
//!
//! Archives are expanded into temporary directories during the walk, and
//! compressed exports are staged in temporary directories before packing. The
//! node tree keeps paths into these directories, so they must outlive parsing
//! and export; the allocator owns all of them until [`TempDirAllocator::cleanup`]
//! is called or the allocator is dropped, whichever comes first.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};
use tempfile::TempDir;

use crate::error::Result;

/// Prefix of every directory created by the allocator.
pub const TEMP_DIR_PREFIX: &str = "mex_";

/// Tracks temporary directories created during a run and disposes of them together.
#[derive(Debug, Default)]
pub struct TempDirAllocator {
    dirs: Mutex<Vec<TempDir>>,
}

impl TempDirAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh, empty directory under the system temp directory and
    /// registers it for disposal.
    pub fn temp_dir(&self) -> Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir()?;
        let path = dir.path().to_path_buf();

        debug!("allocated temp dir {}", path.display());
        self.lock().push(dir);

        Ok(path)
    }

    /// Number of directories currently held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Paths of the directories currently held, in allocation order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().iter().map(|dir| dir.path().to_path_buf()).collect()
    }

    /// Removes every directory allocated so far. Removal is best-effort: a
    /// directory that cannot be deleted is logged and forgotten.
    pub fn cleanup(&self) {
        let dirs = std::mem::take(&mut *self.lock());

        for dir in dirs {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!("failed to remove temp dir {}: {}", path.display(), e);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TempDir>> {
        // append/take only, a poisoned list is still consistent
        self.dirs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
