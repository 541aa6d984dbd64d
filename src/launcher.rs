//! `run`: locate the executable the same way the installer does and hand over to it.

use anyhow::{Context, Result};
use log::debug;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

use crate::acquire::local;
use crate::config::Config;
use crate::error::LaunchError;
use crate::placement::vfs;
use crate::platform::{PlatformEntry, PlatformKey, PlatformTable};
use crate::runtime::Runtime;

/// Run the platform executable with `args` and inherited stdio, returning the exit code to use.
#[tracing::instrument(skip(runtime, config))]
pub async fn run<R: Runtime>(
    runtime: &R,
    config: &Config,
    key: &PlatformKey,
    args: &[OsString],
) -> Result<i32> {
    let binary = locate(runtime, config, key)?;
    debug!("Launching {:?} with {:?}", binary, args);

    let status = Command::new(&binary)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .with_context(|| format!("Failed to run {:?}", binary))?;

    Ok(exit_code(status))
}

/// Where the executable for `key` is, in the order override, installed package, downloaded copy.
pub fn locate<R: Runtime>(runtime: &R, config: &Config, key: &PlatformKey) -> Result<PathBuf> {
    if let Some(path) = &config.binary_override {
        debug!("Using {} override {:?}", Config::override_var(&config.product), path);
        return Ok(path.clone());
    }

    let table = PlatformTable::for_product(&config.product);
    let entry = table.resolve(key)?;

    if let Some(found) = local::find_installed(runtime, config, entry) {
        return vfs::materialize(runtime, config, entry, &found);
    }

    let downloaded = config.downloaded_binary_path(&entry.package, &entry.subpath);
    if runtime.is_file(&downloaded) {
        return Ok(downloaded);
    }

    Err(LaunchError::BinaryNotFound {
        package: entry.package.clone(),
        product: config.product.clone(),
        hint: missing_binary_hint(runtime, config, &table, entry),
    }
    .into())
}

fn missing_binary_hint<R: Runtime>(
    runtime: &R,
    config: &Config,
    table: &PlatformTable,
    entry: &PlatformEntry,
) -> String {
    match local::foreign_platform_package(runtime, config, table, entry) {
        Some(other) if is_rosetta_pair(entry, other) => format!(
            "You installed {product} for {other_key} but this process runs as {key}. \
             This usually means node_modules was installed by the arm64 build of Node \
             and is now used by the x64 build under Rosetta 2 (or the other way round). \
             Reinstall with the same Node architecture you run {product} with.",
            product = config.product,
            other_key = other.key,
            key = entry.key
        ),
        Some(other) => format!(
            "You installed {product} for another platform than the one you're currently using: \
             \"{other}\" is present instead of \"{package}\". \
             This can happen when node_modules is copied between machines. \
             Delete node_modules and reinstall on this machine.",
            product = config.product,
            other = other.package,
            package = entry.package
        ),
        None => format!(
            "If you are installing with the \"--no-optional\" or \"--omit=optional\" flags, \
             don't: the executable for {} ships as an optional dependency.",
            entry.key
        ),
    }
}

fn is_rosetta_pair(wanted: &PlatformEntry, other: &PlatformEntry) -> bool {
    wanted.key.os == "macos" && other.key.os == "macos"
}

/// Exit code for a finished child; a signal-terminated child maps to `128 + signal`.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
