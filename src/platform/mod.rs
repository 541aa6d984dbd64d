//! Platform detection and platform-package lookup
//!
//! Maps the host (OS family, CPU architecture) to the platform-specific
//! sub-package that carries the prebuilt executable for it.

mod table;

use log::debug;
use std::collections::HashMap;
use std::fmt;

use crate::error::PlatformError;

/// (OS family, CPU architecture) pair, e.g. `windows x64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlatformKey {
    pub os: String,
    pub arch: String,
}

impl PlatformKey {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Detect the platform this process is running on.
    pub fn current() -> Self {
        Self::from_consts(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Normalise Rust target names (`x86_64`, `aarch64`, `x86`) to the
    /// package naming used by the registry (`x64`, `arm64`, `x32`).
    pub fn from_consts(os: &str, arch: &str) -> Self {
        let arch = match arch {
            "x86_64" => "x64",
            "aarch64" => "arm64",
            "x86" => "x32",
            other => other,
        };
        Self::new(os, arch)
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.os, self.arch)
    }
}

/// Everything needed to locate or fetch the executable for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformEntry {
    pub key: PlatformKey,
    /// Scoped registry package, e.g. `@minify-selectors/linux-64`.
    pub package: String,
    /// Path of the executable relative to the package root, e.g. `bin/minify-selectors`.
    pub subpath: String,
    pub exe: bool,
}

impl PlatformEntry {
    /// Package name without its scope, as used in registry tarball file names.
    pub fn short_name(&self) -> &str {
        self.package
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.package)
    }

    /// Path of the executable inside the registry tarball.
    pub fn member_path(&self) -> String {
        format!("package/{}", self.subpath)
    }

    /// File name of the executable.
    pub fn binary_file_name(&self) -> &str {
        self.subpath
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.subpath)
    }
}

/// Fixed table of supported platforms for one product.
#[derive(Debug, Clone)]
pub struct PlatformTable {
    scope: String,
    entries: HashMap<PlatformKey, PlatformEntry>,
}

impl PlatformTable {
    pub fn for_product(product: &str) -> Self {
        let scope = format!("@{}", product);
        let entries = table::SUPPORTED
            .iter()
            .map(|(os, arch, suffix)| {
                let key = PlatformKey::new(*os, *arch);
                let exe = *os == "windows";
                let subpath = if exe {
                    format!("bin/{}.exe", product)
                } else {
                    format!("bin/{}", product)
                };
                let entry = PlatformEntry {
                    key: key.clone(),
                    package: format!("{}/{}", scope, suffix),
                    subpath,
                    exe,
                };
                (key, entry)
            })
            .collect();

        Self { scope, entries }
    }

    /// Look up the entry for `key`, failing fast on unsupported hosts.
    pub fn resolve(&self, key: &PlatformKey) -> Result<&PlatformEntry, PlatformError> {
        debug!("Resolving platform package for {}", key);
        self.entries
            .get(key)
            .ok_or_else(|| PlatformError::Unsupported {
                os: key.os.clone(),
                arch: key.arch.clone(),
                supported: self.describe(),
            })
    }

    /// Human-readable table of supported platforms.
    pub fn describe(&self) -> String {
        table::render(&self.scope)
    }

    pub fn entries(&self) -> impl Iterator<Item = &PlatformEntry> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_supported_key_resolves_to_its_entry() {
        let table = PlatformTable::for_product("minify-selectors");
        let expected = [
            ("windows", "x64", "@minify-selectors/windows-64", true),
            ("windows", "x32", "@minify-selectors/windows-32", true),
            ("linux", "x64", "@minify-selectors/linux-64", false),
            ("linux", "arm64", "@minify-selectors/linux-arm64", false),
            ("linux", "x32", "@minify-selectors/linux-32", false),
            ("macos", "x64", "@minify-selectors/darwin-64", false),
            ("macos", "arm64", "@minify-selectors/darwin-arm64", false),
        ];

        for (os, arch, package, exe) in expected {
            let entry = table.resolve(&PlatformKey::new(os, arch)).unwrap();
            assert_eq!(entry.package, package);
            assert_eq!(entry.exe, exe);
            let subpath = if exe {
                "bin/minify-selectors.exe"
            } else {
                "bin/minify-selectors"
            };
            assert_eq!(entry.subpath, subpath);
        }
        assert_eq!(table.entries().count(), expected.len());
    }

    #[test]
    fn test_unsupported_keys_fail() {
        let table = PlatformTable::for_product("tool");

        for (os, arch) in [
            ("windows", "arm64"),
            ("freebsd", "x64"),
            ("linux", "riscv64"),
            ("Linux", "x64"),
        ] {
            let err = table.resolve(&PlatformKey::new(os, arch)).unwrap_err();
            let PlatformError::Unsupported {
                os: got_os,
                arch: got_arch,
                supported,
            } = err;
            assert_eq!(got_os, os);
            assert_eq!(got_arch, arch);
            assert!(supported.contains("@tool/linux-64"));
        }
    }

    #[test]
    fn test_from_consts_normalises_arch() {
        assert_eq!(
            PlatformKey::from_consts("linux", "x86_64"),
            PlatformKey::new("linux", "x64")
        );
        assert_eq!(
            PlatformKey::from_consts("macos", "aarch64"),
            PlatformKey::new("macos", "arm64")
        );
        assert_eq!(
            PlatformKey::from_consts("windows", "x86"),
            PlatformKey::new("windows", "x32")
        );
        assert_eq!(
            PlatformKey::from_consts("linux", "riscv64"),
            PlatformKey::new("linux", "riscv64")
        );
    }

    #[test]
    fn test_current_platform_detect() {
        let key = PlatformKey::current();
        assert!(!key.os.is_empty());
        assert!(!key.arch.is_empty());

        #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
        assert_eq!(key, PlatformKey::new("linux", "x64"));

        #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
        assert_eq!(key, PlatformKey::new("macos", "arm64"));
    }

    #[test]
    fn test_entry_names() {
        let table = PlatformTable::for_product("tool");
        let entry = table.resolve(&PlatformKey::new("windows", "x64")).unwrap();
        assert_eq!(entry.short_name(), "windows-64");
        assert_eq!(entry.member_path(), "package/bin/tool.exe");
        assert_eq!(entry.binary_file_name(), "tool.exe");
    }
}
