//! Executables that live inside a zip package store cannot be run in place;
//! they are copied to a cache file once and run from there.

use anyhow::{Result, anyhow};
use log::debug;
use std::path::{Path, PathBuf};

use super::write_executable;
use crate::acquire::pnp;
use crate::archive::zip::{self, ZipLocation};
use crate::config::Config;
use crate::platform::PlatformEntry;
use crate::runtime::Runtime;

/// Return a real filesystem path for `path`, extracting it from its zip store if needed.
///
/// The extracted copy is keyed by package, version and file name, and is
/// reused when already present.
#[tracing::instrument(skip(runtime, config, entry))]
pub fn materialize<R: Runtime>(
    runtime: &R,
    config: &Config,
    entry: &PlatformEntry,
    path: &Path,
) -> Result<PathBuf> {
    let Some(location) = ZipLocation::parse(path) else {
        return Ok(path.to_path_buf());
    };

    let cache_dir = cache_dir(runtime, config, &location.archive)?;
    let target = cache_dir.join(format!(
        "pnpapi-{}-{}-{}",
        entry.package.replacen('/', "-", 1),
        config.version,
        entry.binary_file_name()
    ));

    if runtime.is_file(&target) {
        debug!("Using cached copy {:?}", target);
        return Ok(target);
    }

    runtime.create_dir_all(&cache_dir)?;
    let bytes = zip::read_member(runtime, &location)?;
    write_executable(runtime, &target, &bytes)?;
    debug!("Extracted {} from {:?} to {:?}", location.member, location.archive, target);
    Ok(target)
}

fn cache_dir<R: Runtime>(runtime: &R, config: &Config, archive: &Path) -> Result<PathBuf> {
    if let Some(root) = pnp::find_root(runtime, archive) {
        return Ok(root.join("node_modules").join(".cache").join(&config.product));
    }
    runtime
        .cache_dir()
        .map(|dir| dir.join(&config.product))
        .ok_or_else(|| anyhow!("No cache directory available to extract {:?}", archive))
}
