//! Post-install check: the placed executable runs and reports the declared version.

use log::debug;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::VerifyError;
use crate::placement::{Placed, PlacementKind, script};

/// Run `<placed> --version` and compare the second whitespace-separated
/// token of its output against `expected`.
#[tracing::instrument]
pub async fn verify(placed: &Placed, expected: &str) -> Result<(), VerifyError> {
    let mut command = match placed.kind {
        PlacementKind::HardLink => Command::new(&placed.path),
        PlacementKind::LauncherScript => {
            let (program, args) = script::interpreter();
            let mut command = Command::new(program);
            command.args(args).arg(&placed.path);
            command
        }
    };

    let output = command
        .arg("--version")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| VerifyError::ExecutionFailed {
            path: placed.path.clone(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(VerifyError::ExecutionFailed {
            path: placed.path.clone(),
            reason: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let actual = reported_version(&stdout).unwrap_or_default();
    debug!("{:?} reports version {:?}", placed.path, actual);

    if actual != expected {
        return Err(VerifyError::VersionMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

/// `tool 1.2.3\n` reports `1.2.3`.
pub fn reported_version(stdout: &str) -> Option<&str> {
    stdout.split_whitespace().nth(1)
}
