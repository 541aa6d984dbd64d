//! `install`: the post-install hook end to end.

use anyhow::Result;
use log::info;

use crate::acquire::{Acquirer, Provenance, ResolvedBinary};
use crate::config::Config;
use crate::http::HttpClient;
use crate::package_manager::PackageManager;
use crate::placement::{self, Placed, vfs};
use crate::platform::{PlatformKey, PlatformTable};
use crate::runtime::Runtime;
use crate::verify;

/// Obtain the executable for `key`, place it at the stable path and check its version.
///
/// A valid user override short-circuits acquisition entirely.
#[tracing::instrument(skip(runtime, package_manager, http, config))]
pub async fn install<R: Runtime, P: PackageManager>(
    runtime: &R,
    package_manager: &P,
    http: &HttpClient,
    config: &Config,
    key: &PlatformKey,
) -> Result<Placed> {
    let resolved = match &config.binary_override {
        Some(path) => {
            info!(
                "Using {:?} from {}",
                path,
                Config::override_var(&config.product)
            );
            ResolvedBinary {
                path: path.clone(),
                provenance: Provenance::UserOverride,
            }
        }
        None => {
            let table = PlatformTable::for_product(&config.product);
            let entry = match table.resolve(key) {
                Ok(entry) => entry,
                Err(e) => return Err(with_bug_report_hint(e.into(), config)),
            };

            let acquired = Acquirer::new(runtime, package_manager, http, config)
                .acquire(entry)
                .await?;
            ResolvedBinary {
                path: vfs::materialize(runtime, config, entry, &acquired.path)?,
                ..acquired
            }
        }
    };

    let placed = placement::place(runtime, config, &resolved)?;
    verify::verify(&placed, &config.version).await?;
    info!(
        "Installed {} {} at {:?} ({:?}, {:?})",
        config.product, config.version, placed.path, resolved.provenance, placed.kind
    );
    Ok(placed)
}

fn with_bug_report_hint(error: anyhow::Error, config: &Config) -> anyhow::Error {
    match &config.bugs_url {
        Some(url) => error.context(format!(
            "{} does not support this platform yet. Please feel free to open an issue at {}",
            config.product, url
        )),
        None => error,
    }
}
