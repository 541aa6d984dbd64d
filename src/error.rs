//! Error taxonomy for platform resolution, acquisition, placement and launch.
//!
//! Glue code propagates with `anyhow`; these types stay reachable through
//! `anyhow::Error::downcast_ref` so callers and tests can match on them.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The host is not in the supported platform table.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Unsupported platform: {os} {arch}\nCurrently supported platforms are:\n\n{supported}")]
    Unsupported {
        os: String,
        arch: String,
        /// Human-readable table of supported platforms.
        supported: String,
    },
}

/// Failures of the tar.gz member reader and the zip store reader.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Invalid gzip data in archive: {0}")]
    InvalidGzip(String),

    #[error("Could not find \"{path}\" in archive")]
    MemberNotFound { path: String },

    #[error("Malformed tar header at offset {offset}: {reason}")]
    MalformedHeader { offset: usize, reason: String },

    #[error("Unsupported tar entry \"{name}\" (type '{kind}') at offset {offset}")]
    UnsupportedEntry {
        offset: usize,
        name: String,
        kind: char,
    },

    #[error("Failed to read zip store {}: {message}", .path.display())]
    Zip { path: PathBuf, message: String },
}

/// Which acquisition stage produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageName {
    Local,
    PackageManager,
    Download,
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageName::Local => "local resolution",
            StageName::PackageManager => "package manager install",
            StageName::Download => "direct download",
        };
        f.write_str(name)
    }
}

/// One failed stage of the acquisition chain, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct StageFailure {
    pub stage: StageName,
    pub message: String,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.message)
    }
}

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Failed to install package \"{package}\"{}", format_failures(.failures))]
    AllStagesFailed {
        package: String,
        failures: Vec<StageFailure>,
        #[source]
        last: anyhow::Error,
    },
}

fn format_failures(failures: &[StageFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("\n  - {}", failure))
        .collect()
}

/// Post-install check failures. The install is broken even though a file was placed.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Expected version \"{expected}\" but got \"{actual}\"")]
    VersionMismatch { expected: String, actual: String },

    #[error("Failed to run {} --version: {reason}", .path.display())]
    ExecutionFailed { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("The package \"{package}\" could not be found, and is needed by {product}.\n{hint}")]
    BinaryNotFound {
        package: String,
        product: String,
        hint: String,
    },
}
