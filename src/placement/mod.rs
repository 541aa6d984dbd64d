//! Putting the executable at the stable path callers invoke.
//!
//! The stable path always starts life as a launcher script. Where the host
//! allows it, the script is swapped for a hard link to the real executable so
//! each invocation saves a process spawn. Every write lands under a temporary
//! name first and is renamed into place, so a concurrent reader sees either
//! the old file or the new one.

pub mod script;
pub mod vfs;

use anyhow::{Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::acquire::{Provenance, ResolvedBinary};
use crate::config::Config;
use crate::runtime::Runtime;

pub const EXECUTABLE_MODE: u32 = 0o755;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementKind {
    HardLink,
    LauncherScript,
}

/// The file at the stable path after placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placed {
    pub path: PathBuf,
    pub kind: PlacementKind,
}

#[tracing::instrument(skip(runtime, config))]
pub fn place<R: Runtime>(runtime: &R, config: &Config, resolved: &ResolvedBinary) -> Result<Placed> {
    let stable = config.stable_path();
    if let Some(parent) = stable.parent() {
        runtime.create_dir_all(parent)?;
    }

    if can_hard_link(config, resolved) {
        match hard_link_swap(runtime, config, &resolved.path, &stable) {
            Ok(()) => {
                info!("Linked {:?} to {:?}", stable, resolved.path);
                return Ok(Placed {
                    path: stable,
                    kind: PlacementKind::HardLink,
                });
            }
            Err(e) => debug!("Hard link failed, using a launcher script: {:#}", e),
        }
    }

    write_executable(runtime, &stable, script::render(&resolved.path).as_bytes())?;
    info!("Wrote launcher script {:?} for {:?}", stable, resolved.path);
    Ok(Placed {
        path: stable,
        kind: PlacementKind::LauncherScript,
    })
}

/// Hard links are only attempted on Unix, never for a user-supplied
/// executable, and not under package managers that relocate package files.
pub fn can_hard_link(config: &Config, resolved: &ResolvedBinary) -> bool {
    cfg!(unix)
        && resolved.provenance != Provenance::UserOverride
        && !config.package_manager.restricts_hard_links()
}

fn hard_link_swap<R: Runtime>(runtime: &R, config: &Config, source: &Path, stable: &Path) -> Result<()> {
    let temp = config.package_dir.join(format!("bin-{}", config.product));
    if runtime.exists(&temp) {
        runtime.remove_file(&temp)?;
    }

    let result = runtime
        .hard_link(source, &temp)
        .and_then(|()| runtime.set_permissions(&temp, EXECUTABLE_MODE))
        .and_then(|()| runtime.rename(&temp, stable));

    // Renaming onto another link of the same file leaves the temporary name behind
    if runtime.exists(&temp)
        && let Err(e) = runtime.remove_file(&temp)
    {
        debug!("Failed to remove {:?}: {:#}", temp, e);
    }
    result
}

/// Write `contents` to `path` as an executable, atomically replacing any existing file.
pub fn write_executable<R: Runtime>(runtime: &R, path: &Path, contents: &[u8]) -> Result<()> {
    let temp = temp_sibling(path);
    let result = runtime
        .write(&temp, contents)
        .and_then(|()| runtime.set_permissions(&temp, EXECUTABLE_MODE))
        .and_then(|()| runtime.rename(&temp, path))
        .with_context(|| format!("Failed to write {:?}", path));

    if result.is_err() && runtime.exists(&temp) {
        let _ = runtime.remove_file(&temp);
    }
    result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp-{}", name, std::process::id()))
}
