use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::package_manager::{NpmCli, PackageManagerInfo};
use crate::runtime::Runtime;

pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";
pub const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 300;

/// Values supplied on the command line (or their environment fallbacks).
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    pub package_dir: Option<PathBuf>,
    pub registry: Option<String>,
    pub npm: Option<String>,
    pub stage_timeout: Option<Duration>,
}

/// The installer's own `package.json`.
#[derive(Debug, Deserialize)]
struct Manifest {
    name: String,
    version: String,
    #[serde(default)]
    bugs: Option<Bugs>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Bugs {
    Url(String),
    Object { url: Option<String> },
}

/// Everything the installer and launcher need, read once at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    /// Product and binary name, e.g. `minify-selectors`.
    pub product: String,
    /// Declared version; the installed binary must report exactly this.
    pub version: String,
    /// Root of the installer package.
    pub package_dir: PathBuf,
    pub registry: String,
    pub npm_program: String,
    pub bugs_url: Option<String>,
    /// Validated `<PRODUCT>_BINARY_PATH`.
    pub binary_override: Option<PathBuf>,
    pub package_manager: PackageManagerInfo,
    pub stage_timeout: Duration,
}

impl Config {
    #[tracing::instrument(skip(runtime, options))]
    pub fn load<R: Runtime>(runtime: &R, options: ConfigOptions) -> Result<Self> {
        let package_dir = match options.package_dir {
            Some(dir) => dir,
            None => default_package_dir(runtime)?,
        };

        let manifest_path = package_dir.join("package.json");
        let manifest: Manifest = serde_json::from_str(&runtime.read_to_string(&manifest_path)?)
            .with_context(|| format!("Failed to parse {:?}", manifest_path))?;

        let product = manifest
            .name
            .rsplit_once('/')
            .map(|(_, name)| name.to_string())
            .unwrap_or(manifest.name);
        debug!("Loaded {} {} from {:?}", product, manifest.version, manifest_path);

        let binary_override = read_override(runtime, &product);
        let package_manager = PackageManagerInfo::detect(
            runtime.env_var("npm_config_user_agent").ok().as_deref(),
            runtime.env_var("npm_config_node_linker").ok().as_deref(),
        );
        debug!("Package manager: {:?}", package_manager);

        let bugs_url = manifest.bugs.and_then(|bugs| match bugs {
            Bugs::Url(url) => Some(url),
            Bugs::Object { url } => url,
        });

        Ok(Self {
            version: manifest.version,
            package_dir,
            registry: options
                .registry
                .unwrap_or_else(|| DEFAULT_REGISTRY.to_string())
                .trim_end_matches('/')
                .to_string(),
            npm_program: options
                .npm
                .unwrap_or_else(|| NpmCli::default_program().to_string()),
            bugs_url,
            binary_override,
            package_manager,
            stage_timeout: options
                .stage_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_STAGE_TIMEOUT_SECS)),
            product,
        })
    }

    /// `MINIFY_SELECTORS_BINARY_PATH` for product `minify-selectors`.
    pub fn override_var(product: &str) -> String {
        format!("{}_BINARY_PATH", product.to_uppercase().replace('-', "_"))
    }

    /// Where stages 2 and 3 put the executable they obtain.
    pub fn downloaded_binary_path(&self, package: &str, subpath: &str) -> PathBuf {
        let file_name = Path::new(subpath)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| subpath.to_string());
        self.package_dir.join(format!(
            "downloaded-{}-{}",
            package.replacen('/', "-", 1),
            file_name
        ))
    }

    /// Path every caller invokes, whichever stage produced the binary.
    /// Windows only ever gets a launcher script, so it carries a `.cmd` suffix there.
    pub fn stable_path(&self) -> PathBuf {
        let bin = self.package_dir.join("bin");
        if cfg!(windows) {
            bin.join(format!("{}.cmd", self.product))
        } else {
            bin.join(&self.product)
        }
    }

    pub fn user_agent(&self) -> String {
        format!("{}-installer/{} platbin/{}", self.product, self.version, env!("CARGO_PKG_VERSION"))
    }
}

/// The package `platbin` was installed into: the nearest ancestor of the
/// executable holding a `package.json`. Falls back to the working directory,
/// which is the package root while a lifecycle hook runs.
fn default_package_dir<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    if let Ok(exe) = runtime.current_exe()
        && let Some(dir) = exe
            .ancestors()
            .skip(1)
            .find(|dir| runtime.is_file(&dir.join("package.json")))
    {
        debug!("Package directory {:?} found from {:?}", dir, exe);
        return Ok(dir.to_path_buf());
    }
    runtime.current_dir()
}

fn read_override<R: Runtime>(runtime: &R, product: &str) -> Option<PathBuf> {
    let var = Config::override_var(product);
    let value = runtime.env_var(&var).ok().filter(|v| !v.is_empty())?;

    // A global install of this launcher would point back at itself
    if value == format!("/usr/bin/{}", product) {
        debug!("Ignoring {}={}", var, value);
        return None;
    }

    let path = PathBuf::from(&value);
    if !runtime.is_file(&path) {
        warn!("Ignoring bad configuration: {}={}", var, value);
        return None;
    }
    Some(path)
}
