//! Stage 1: the platform package is already installed next to us.

use anyhow::{Result, anyhow};
use log::debug;
use std::path::PathBuf;

use super::pnp;
use crate::archive::zip::{self, ZipLocation};
use crate::config::Config;
use crate::platform::{PlatformEntry, PlatformTable};
use crate::runtime::Runtime;

/// Where `entry`'s executable sits if the package manager installed it, if anywhere.
///
/// Looks in every `node_modules` from the installer package upwards, then
/// asks the Plug'n'Play resolution data. A Plug'n'Play result may point
/// inside a zip store.
#[tracing::instrument(skip(runtime, config))]
pub fn find_installed<R: Runtime>(
    runtime: &R,
    config: &Config,
    entry: &PlatformEntry,
) -> Option<PathBuf> {
    let found = config.package_dir.ancestors().find_map(|dir| {
        let candidate = dir
            .join("node_modules")
            .join(&entry.package)
            .join(&entry.subpath);
        runtime.is_file(&candidate).then_some(candidate)
    });
    if found.is_some() {
        debug!("Found {} in node_modules: {:?}", entry.package, found);
        return found;
    }

    find_in_pnp(runtime, config, entry)
}

fn find_in_pnp<R: Runtime>(runtime: &R, config: &Config, entry: &PlatformEntry) -> Option<PathBuf> {
    let root = pnp::find_root(runtime, &config.package_dir)?;
    let location = match pnp::package_location(runtime, &root, &entry.package, &config.version) {
        Ok(location) => location?,
        Err(e) => {
            debug!("{:#}", e);
            return None;
        }
    };

    let candidate = location.join(&entry.subpath);
    let present = match ZipLocation::parse(&candidate) {
        Some(zip_location) => zip::contains_member(runtime, &zip_location),
        None => runtime.is_file(&candidate),
    };
    debug!("Plug'n'Play candidate {:?} present: {}", candidate, present);
    present.then_some(candidate)
}

/// Stage 1 proper: [`find_installed`] or an explanation of why the package is missing.
pub fn resolve<R: Runtime>(runtime: &R, config: &Config, entry: &PlatformEntry) -> Result<PathBuf> {
    find_installed(runtime, config, entry).ok_or_else(|| {
        anyhow!(
            "The package \"{}\" could not be found, and is needed by {}.\n\
             If you are installing with the \"--no-optional\" or \"--omit=optional\" flags, \
             the optional dependency that carries the {} executable was skipped. \
             Don't use them when installing {}.",
            entry.package,
            config.product,
            entry.key,
            config.product
        )
    })
}

/// A platform package for some other host that is installed in place of ours.
///
/// This happens when `node_modules` is copied between machines, or when the
/// x64 build of Node runs on Apple Silicon under Rosetta 2.
pub fn foreign_platform_package<'t, R: Runtime>(
    runtime: &R,
    config: &Config,
    table: &'t PlatformTable,
    wanted: &PlatformEntry,
) -> Option<&'t PlatformEntry> {
    table
        .entries()
        .filter(|other| other.package != wanted.package)
        .find(|other| find_installed(runtime, config, other).is_some())
}
