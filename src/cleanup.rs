use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// Scratch directory owned by a single acquisition attempt.
///
/// The directory is removed recursively when the guard is dropped, whether
/// the attempt succeeded, failed or bailed out early. Removal errors are
/// logged and swallowed.
pub struct ScratchDir<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
}

impl<'a, R: Runtime> ScratchDir<'a, R> {
    /// Create a fresh, empty directory at `path`, clearing leftovers from a crashed run.
    pub fn create(runtime: &'a R, path: PathBuf) -> Result<Self> {
        if runtime.exists(&path) {
            debug!("Removing stale scratch directory {:?}", path);
            runtime.remove_dir_all(&path)?;
        }
        runtime
            .create_dir_all(&path)
            .with_context(|| format!("Failed to create scratch directory {:?}", path))?;
        Ok(Self { runtime, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<R: Runtime> Drop for ScratchDir<'_, R> {
    fn drop(&mut self) {
        debug!("Cleaning up: {:?}", self.path);
        if let Err(e) = self.runtime.remove_dir_all(&self.path) {
            debug!("Failed to remove scratch directory {:?}: {}", self.path, e);
        }
    }
}
