//! The acquisition chain: find or fetch the platform executable.
//!
//! Stages run strictly in order and the first success wins:
//!
//! 1. `local` - the package manager already installed the platform package
//! 2. `npm` - install it ourselves into a scratch directory
//! 3. `download` - fetch the registry tarball and extract the executable
//!
//! Every stage runs under the configured timeout. A failed stage is logged
//! and recorded; only when all three fail does acquisition fail.

pub mod download;
pub mod local;
pub mod npm;
pub mod pnp;

use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use std::path::PathBuf;

use crate::config::Config;
use crate::error::{AcquisitionError, StageFailure, StageName};
use crate::http::HttpClient;
use crate::package_manager::PackageManager;
use crate::platform::PlatformEntry;
use crate::runtime::Runtime;

const STAGES: [StageName; 3] = [StageName::Local, StageName::PackageManager, StageName::Download];

/// How the executable was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    LocallyResolved,
    PackageManagerInstalled,
    DirectDownloaded,
    UserOverride,
}

impl From<StageName> for Provenance {
    fn from(stage: StageName) -> Self {
        match stage {
            StageName::Local => Provenance::LocallyResolved,
            StageName::PackageManager => Provenance::PackageManagerInstalled,
            StageName::Download => Provenance::DirectDownloaded,
        }
    }
}

/// An executable on disk (or inside a zip store) and how it got there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBinary {
    pub path: PathBuf,
    pub provenance: Provenance,
}

pub struct Acquirer<'a, R: Runtime, P: PackageManager> {
    runtime: &'a R,
    package_manager: &'a P,
    http: &'a HttpClient,
    config: &'a Config,
}

impl<'a, R: Runtime, P: PackageManager> Acquirer<'a, R, P> {
    pub fn new(runtime: &'a R, package_manager: &'a P, http: &'a HttpClient, config: &'a Config) -> Self {
        Self {
            runtime,
            package_manager,
            http,
            config,
        }
    }

    #[tracing::instrument(skip(self), fields(package = %entry.package))]
    pub async fn acquire(&self, entry: &PlatformEntry) -> Result<ResolvedBinary, AcquisitionError> {
        let mut failures = Vec::new();
        let mut last_error = None;

        for stage in STAGES {
            debug!("Trying {} for {}", stage, entry.package);
            let attempt = tokio::time::timeout(self.config.stage_timeout, self.run_stage(stage, entry))
                .await
                .unwrap_or_else(|_| {
                    Err(anyhow!(
                        "timed out after {} seconds",
                        self.config.stage_timeout.as_secs_f64()
                    ))
                });

            match attempt {
                Ok(path) => {
                    info!("Acquired {} by {}: {:?}", entry.package, stage, path);
                    return Ok(ResolvedBinary {
                        path,
                        provenance: stage.into(),
                    });
                }
                Err(e) => {
                    warn!(
                        "Failed to install package \"{}\" for {} by {}: {:#}",
                        entry.package, entry.key, stage, e
                    );
                    failures.push(StageFailure {
                        stage,
                        message: format!("{:#}", e),
                    });
                    last_error = Some(e);
                }
            }
        }

        Err(AcquisitionError::AllStagesFailed {
            package: entry.package.clone(),
            failures,
            last: last_error.unwrap_or_else(|| anyhow!("no acquisition stage ran")),
        })
    }

    async fn run_stage(&self, stage: StageName, entry: &PlatformEntry) -> Result<PathBuf> {
        match stage {
            StageName::Local => local::resolve(self.runtime, self.config, entry),
            StageName::PackageManager => {
                npm::install(self.runtime, self.package_manager, self.config, entry).await
            }
            StageName::Download => {
                download::download(self.runtime, self.http, self.config, entry).await
            }
        }
    }
}
