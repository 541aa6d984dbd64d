//! Environment and system information operations.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn env_var_impl(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn current_dir_impl(&self) -> Result<PathBuf> {
        env::current_dir().context("Failed to determine the current directory")
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn current_exe_impl(&self) -> Result<PathBuf> {
        env::current_exe().context("Failed to locate the running executable")
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn cache_dir_impl(&self) -> Option<PathBuf> {
        dirs::cache_dir()
    }
}
