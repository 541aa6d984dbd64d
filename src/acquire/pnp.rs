//! Package lookup for Yarn Plug'n'Play installs, where there is no `node_modules`.
//!
//! Only the JSON form of the resolution data (`.pnp.data.json`, written when
//! `pnpEnableInlining` is off) can be read; `.pnp.cjs` still marks the project root.

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

pub const DATA_FILE: &str = ".pnp.data.json";
const LOADER_FILES: &[&str] = &[".pnp.cjs", ".pnp.js"];

#[derive(Debug, Deserialize)]
struct PnpData {
    #[serde(rename = "packageRegistryData")]
    package_registry_data: Vec<(Option<String>, Vec<(Option<String>, PackageInformation)>)>,
}

#[derive(Debug, Deserialize)]
struct PackageInformation {
    #[serde(rename = "packageLocation")]
    package_location: String,
}

/// Nearest ancestor of `start` that holds Plug'n'Play resolution data or loader.
pub fn find_root<R: Runtime>(runtime: &R, start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| {
            std::iter::once(DATA_FILE)
                .chain(LOADER_FILES.iter().copied())
                .any(|name| runtime.is_file(&dir.join(name)))
        })
        .map(Path::to_path_buf)
}

/// Absolute location of `package` at `version` according to the project's
/// `.pnp.data.json`. Other registered versions of the package are ignored.
#[tracing::instrument(skip(runtime))]
pub fn package_location<R: Runtime>(
    runtime: &R,
    root: &Path,
    package: &str,
    version: &str,
) -> Result<Option<PathBuf>> {
    let data_path = root.join(DATA_FILE);
    if !runtime.is_file(&data_path) {
        return Ok(None);
    }

    let data: PnpData = serde_json::from_str(&runtime.read_to_string(&data_path)?)
        .with_context(|| format!("Failed to parse {:?}", data_path))?;

    let location = data
        .package_registry_data
        .into_iter()
        .filter(|(name, _)| name.as_deref() == Some(package))
        .flat_map(|(_, references)| references)
        .find(|(reference, _)| reference.as_deref().and_then(npm_version) == Some(version))
        .map(|(_, info)| info.package_location);

    debug!("Plug'n'Play location of {}@{}: {:?}", package, version, location);
    Ok(location.map(|location| root.join(location)))
}

/// Registry version in a reference such as `npm:1.2.3` or `virtual:<hash>#npm:1.2.3`.
fn npm_version(reference: &str) -> Option<&str> {
    reference.rsplit_once("npm:").map(|(_, version)| version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use tempfile::tempdir;

    const DATA: &str = r#"{
        "__info": ["This file is automatically generated."],
        "dependencyTreeRoots": [{"name": "app", "reference": "workspace:."}],
        "packageRegistryData": [
            [null, [[null, {"packageLocation": "./", "packageDependencies": []}]]],
            ["@tool/linux-64", [
                ["npm:1.1.0", {
                    "packageLocation": "./.yarn/cache/@tool-linux-64-npm-1.1.0-def.zip/node_modules/@tool/linux-64/",
                    "packageDependencies": [["@tool/linux-64", "npm:1.1.0"]],
                    "linkType": "HARD"
                }],
                ["npm:1.2.3", {
                    "packageLocation": "./.yarn/cache/@tool-linux-64-npm-1.2.3-abc.zip/node_modules/@tool/linux-64/",
                    "packageDependencies": [["@tool/linux-64", "npm:1.2.3"]],
                    "linkType": "HARD"
                }]
            ]]
        ]
    }"#;

    #[test]
    fn test_find_root_from_nested_dir() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".pnp.cjs"), "").unwrap();
        let nested = dir.path().join(".yarn/unplugged/tool-npm-1.2.3/node_modules/tool");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_root(&RealRuntime, &nested), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_find_root_none() {
        let dir = tempdir().unwrap();
        // tempdir's ancestors could in theory hold a PnP project; the tempdir itself must not
        let found = find_root(&RealRuntime, dir.path());
        assert_ne!(found.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_package_location() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(DATA_FILE), DATA).unwrap();

        let location = package_location(&RealRuntime, dir.path(), "@tool/linux-64", "1.2.3")
            .unwrap()
            .unwrap();
        assert_eq!(
            location,
            dir.path()
                .join("./.yarn/cache/@tool-linux-64-npm-1.2.3-abc.zip/node_modules/@tool/linux-64/")
        );

        assert!(
            package_location(&RealRuntime, dir.path(), "@tool/darwin-64", "1.2.3")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_package_location_picks_requested_version() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(DATA_FILE), DATA).unwrap();

        let older = package_location(&RealRuntime, dir.path(), "@tool/linux-64", "1.1.0")
            .unwrap()
            .unwrap();
        assert!(older.to_string_lossy().contains("npm-1.1.0-def.zip"), "{:?}", older);

        assert!(
            package_location(&RealRuntime, dir.path(), "@tool/linux-64", "2.0.0")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_npm_version_of_reference() {
        assert_eq!(npm_version("npm:1.2.3"), Some("1.2.3"));
        assert_eq!(npm_version("virtual:0a1b2c#npm:1.2.3"), Some("1.2.3"));
        assert_eq!(npm_version("workspace:."), None);
    }

    #[test]
    fn test_package_location_without_data_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".pnp.cjs"), "").unwrap();

        assert!(
            package_location(&RealRuntime, dir.path(), "@tool/linux-64", "1.2.3")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_package_location_invalid_data() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(DATA_FILE), "{}").unwrap();

        assert!(package_location(&RealRuntime, dir.path(), "@tool/linux-64", "1.2.3").is_err());
    }
}
