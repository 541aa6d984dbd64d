//! The host package manager: who is running us, and how to ask it for one package.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::debug;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Package manager family, as reported by `npm_config_user_agent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManagerKind {
    Npm,
    Yarn,
    Pnpm,
    Unknown,
}

/// Package manager driving the current install, detected from its environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManagerInfo {
    pub kind: PackageManagerKind,
    /// `npm_config_node_linker`, when set
    pub node_linker: Option<String>,
}

impl PackageManagerInfo {
    pub fn detect(user_agent: Option<&str>, node_linker: Option<&str>) -> Self {
        let kind = match user_agent {
            Some(ua) if ua.starts_with("yarn/") || ua.contains(" yarn/") => {
                PackageManagerKind::Yarn
            }
            Some(ua) if ua.starts_with("pnpm/") || ua.contains(" pnpm/") => {
                PackageManagerKind::Pnpm
            }
            Some(ua) if ua.starts_with("npm/") => PackageManagerKind::Npm,
            _ => PackageManagerKind::Unknown,
        };
        Self {
            kind,
            node_linker: node_linker.map(str::to_string),
        }
    }

    /// Whether the linker mode forbids swapping the launcher for a hard link.
    ///
    /// Yarn may relocate or zip the package after the hook runs; pnpm's
    /// isolated linker shares package files through its content store.
    pub fn restricts_hard_links(&self) -> bool {
        match self.kind {
            PackageManagerKind::Yarn => true,
            PackageManagerKind::Pnpm => self.node_linker.as_deref() != Some("hoisted"),
            PackageManagerKind::Npm | PackageManagerKind::Unknown => false,
        }
    }
}

/// Installs a single package into an isolated directory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Install `spec` (`name@version`) into `dir`, which already holds a manifest.
    async fn install(&self, dir: &Path, spec: &str) -> Result<()>;
}

/// `npm install` run as a subprocess.
pub struct NpmCli {
    program: String,
}

impl NpmCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn default_program() -> &'static str {
        if cfg!(windows) { "npm.cmd" } else { "npm" }
    }
}

#[async_trait]
impl PackageManager for NpmCli {
    #[tracing::instrument(skip(self))]
    async fn install(&self, dir: &Path, spec: &str) -> Result<()> {
        debug!("Running {} install {} in {:?}", self.program, spec, dir);
        let output = Command::new(&self.program)
            .args([
                "install",
                "--loglevel=error",
                "--prefer-offline",
                "--no-audit",
                "--progress=false",
                spec,
            ])
            .current_dir(dir)
            .env_remove("npm_config_global")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {:?}", self.program))?;

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            bail!(
                "{} install exited with code {}: {}",
                self.program,
                code,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}
