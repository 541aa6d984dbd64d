//! Stage 3: fetch the platform package tarball from the registry ourselves.

use anyhow::Result;
use log::{debug, info, warn};
use std::path::PathBuf;

use crate::archive;
use crate::config::Config;
use crate::http::HttpClient;
use crate::placement;
use crate::platform::PlatformEntry;
use crate::runtime::Runtime;

/// `{registry}/{package}/-/{unscoped}-{version}.tgz`
pub fn tarball_url(registry: &str, entry: &PlatformEntry, version: &str) -> String {
    format!(
        "{}/{}/-/{}-{}.tgz",
        registry.trim_end_matches('/'),
        entry.package,
        entry.short_name(),
        version
    )
}

#[tracing::instrument(skip(runtime, http, config))]
pub async fn download<R: Runtime>(
    runtime: &R,
    http: &HttpClient,
    config: &Config,
    entry: &PlatformEntry,
) -> Result<PathBuf> {
    let url = tarball_url(&config.registry, entry, &config.version);
    info!("Trying to download {:?}", url);

    let tarball = http.fetch_bytes(&url).await?;
    debug!("Downloaded {} bytes from {}", tarball.len(), url);

    let binary = archive::extract_member(&tarball, &entry.member_path())?;
    if !is_native_executable(&binary, &entry.key.os) {
        warn!(
            "{} from {} does not look like a {} executable",
            entry.member_path(),
            url,
            entry.key.os
        );
    }

    let target = config.downloaded_binary_path(&entry.package, &entry.subpath);
    placement::write_executable(runtime, &target, &binary)?;
    Ok(target)
}

/// Whether `bytes` parse as an executable format native to `os`.
fn is_native_executable(bytes: &[u8], os: &str) -> bool {
    match goblin::Object::parse(bytes) {
        Ok(goblin::Object::Elf(_)) => os == "linux",
        Ok(goblin::Object::Mach(_)) => os == "macos",
        Ok(goblin::Object::PE(_)) => os == "windows",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArchiveError;
    use crate::http::NonRetryableError;
    use crate::platform::{PlatformKey, PlatformTable};
    use crate::runtime::RealRuntime;
    use crate::test_utils::{tar_gz, test_config};
    use mockito::Server;
    use std::fs;
    use tempfile::tempdir;

    fn client() -> HttpClient {
        HttpClient::with_user_agent("platbin-test").unwrap()
    }

    fn entry(os: &str, arch: &str) -> PlatformEntry {
        PlatformTable::for_product("tool")
            .resolve(&PlatformKey::new(os, arch))
            .unwrap()
            .clone()
    }

    #[test]
    fn test_tarball_url() {
        assert_eq!(
            tarball_url("https://registry.npmjs.org", &entry("linux", "x64"), "1.2.3"),
            "https://registry.npmjs.org/@tool/linux-64/-/linux-64-1.2.3.tgz"
        );
        assert_eq!(
            tarball_url("http://localhost:4873/", &entry("windows", "x32"), "0.1.0-beta.1"),
            "http://localhost:4873/@tool/windows-32/-/windows-32-0.1.0-beta.1.tgz"
        );
    }

    #[test]
    fn test_is_native_executable_rejects_text() {
        assert!(!is_native_executable(b"#!/bin/sh\necho hi\n", "linux"));
        assert!(!is_native_executable(b"", "macos"));
    }

    #[tokio::test]
    async fn test_download_extracts_binary() {
        let mut server = Server::new_async().await;
        let tarball = tar_gz(&[
            ("package/package.json", b"{}".as_slice()),
            ("package/bin/tool", b"#!/bin/sh\necho tool 1.2.3\n".as_slice()),
        ]);
        let mock = server
            .mock("GET", "/@tool/linux-64/-/linux-64-1.2.3.tgz")
            .with_status(200)
            .with_body(tarball)
            .expect(1)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path(), "1.2.3");
        config.registry = server.url();

        let target = download(&RealRuntime, &client(), &config, &entry("linux", "x64"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(target, dir.path().join("downloaded-@tool-linux-64-tool"));
        assert_eq!(fs::read(&target).unwrap(), b"#!/bin/sh\necho tool 1.2.3\n");
    }

    #[tokio::test]
    async fn test_download_not_found_writes_nothing() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/@tool/linux-64/-/linux-64-1.2.3.tgz")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path(), "1.2.3");
        config.registry = server.url();

        let err = download(&RealRuntime, &client(), &config, &entry("linux", "x64"))
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(err.downcast_ref::<NonRetryableError>().is_some());
        assert!(!dir.path().join("downloaded-@tool-linux-64-tool").exists());
    }

    #[tokio::test]
    async fn test_download_missing_member() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/@tool/linux-64/-/linux-64-1.2.3.tgz")
            .with_status(200)
            .with_body(tar_gz(&[("package/README.md", b"readme".as_slice())]))
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path(), "1.2.3");
        config.registry = server.url();

        let err = download(&RealRuntime, &client(), &config, &entry("linux", "x64"))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ArchiveError>(),
            Some(ArchiveError::MemberNotFound { .. })
        ));
    }
}
