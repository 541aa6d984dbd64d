//! Stage 2: have the package manager install the platform package into a scratch directory.

use anyhow::{Context, Result, bail};
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::cleanup::ScratchDir;
use crate::config::Config;
use crate::package_manager::PackageManager;
use crate::placement::{self, EXECUTABLE_MODE};
use crate::platform::PlatformEntry;
use crate::runtime::Runtime;

const SCRATCH_DIR: &str = "npm-install";

/// Throwaway manifest so the install does not walk up into the enclosing project.
#[derive(Debug, Serialize)]
struct InstallManifest {
    name: String,
    private: bool,
    dependencies: BTreeMap<String, String>,
}

#[tracing::instrument(skip(runtime, package_manager, config))]
pub async fn install<R: Runtime, P: PackageManager>(
    runtime: &R,
    package_manager: &P,
    config: &Config,
    entry: &PlatformEntry,
) -> Result<PathBuf> {
    let scratch = ScratchDir::create(runtime, config.package_dir.join(SCRATCH_DIR))?;

    let manifest = InstallManifest {
        name: format!("{}-platform-install", config.product),
        private: true,
        dependencies: BTreeMap::from([(entry.package.clone(), config.version.clone())]),
    };
    let manifest_json = serde_json::to_vec_pretty(&manifest)?;
    runtime.write(&scratch.path().join("package.json"), &manifest_json)?;

    let spec = format!("{}@{}", entry.package, config.version);
    info!("Installing {} with {}", spec, config.npm_program);
    package_manager.install(scratch.path(), &spec).await?;

    let installed = scratch
        .path()
        .join("node_modules")
        .join(&entry.package)
        .join(&entry.subpath);
    if !runtime.is_file(&installed) {
        bail!(
            "{} was installed but {:?} is missing from it",
            spec,
            entry.subpath
        );
    }

    let target = config.downloaded_binary_path(&entry.package, &entry.subpath);
    if let Err(e) = runtime.rename(&installed, &target) {
        // The scratch directory may sit on a different filesystem from the package
        debug!("Rename failed ({:#}), copying instead", e);
        let bytes = runtime.read(&installed)?;
        placement::write_executable(runtime, &target, &bytes)?;
    }
    runtime
        .set_permissions(&target, EXECUTABLE_MODE)
        .with_context(|| format!("Failed to make {:?} executable", target))?;

    debug!("Moved {:?} to {:?}", installed, target);
    Ok(target)
}
