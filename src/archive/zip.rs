//! Reading single members out of zip-backed package stores (Yarn Plug'n'Play caches).

use log::debug;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use ::zip::ZipArchive;
use ::zip::result::ZipError;

use crate::error::ArchiveError;
use crate::runtime::Runtime;

/// A path that points inside a `.zip` store: the archive on disk and the member within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipLocation {
    pub archive: PathBuf,
    pub member: String,
}

impl ZipLocation {
    /// Split `path` at its first component ending in `.zip`.
    ///
    /// Returns `None` for ordinary filesystem paths.
    pub fn parse(path: &Path) -> Option<Self> {
        let mut archive = PathBuf::new();
        let mut components = path.components();

        for component in components.by_ref() {
            archive.push(component.as_os_str());
            if let Component::Normal(name) = component
                && name.to_string_lossy().to_lowercase().ends_with(".zip")
            {
                let member: Vec<String> = components
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                if member.is_empty() {
                    return None;
                }
                return Some(Self {
                    archive,
                    member: member.join("/"),
                });
            }
        }

        None
    }
}

/// Read the bytes of `location.member` from its zip store.
#[tracing::instrument(skip(runtime))]
pub fn read_member<R: Runtime>(
    runtime: &R,
    location: &ZipLocation,
) -> Result<Vec<u8>, ArchiveError> {
    let mut archive = open(runtime, &location.archive)?;
    let mut entry = archive.by_name(&location.member).map_err(|e| match e {
        ZipError::FileNotFound => ArchiveError::MemberNotFound {
            path: location.member.clone(),
        },
        other => zip_error(&location.archive, other),
    })?;

    let mut contents = Vec::new();
    entry
        .read_to_end(&mut contents)
        .map_err(|e| zip_error(&location.archive, e))?;
    debug!(
        "Read {} bytes of {} from {:?}",
        contents.len(),
        location.member,
        location.archive
    );
    Ok(contents)
}

/// Whether the zip store exists and holds `location.member`.
pub fn contains_member<R: Runtime>(runtime: &R, location: &ZipLocation) -> bool {
    if !runtime.is_file(&location.archive) {
        return false;
    }
    match open(runtime, &location.archive) {
        Ok(archive) => archive.index_for_name(&location.member).is_some(),
        Err(e) => {
            debug!("{}", e);
            false
        }
    }
}

fn open<R: Runtime>(runtime: &R, path: &Path) -> Result<ZipArchive<Cursor<Vec<u8>>>, ArchiveError> {
    // ZipArchive needs Read + Seek, so the store is read into memory
    let bytes = runtime.read(path).map_err(|e| zip_error(path, e))?;
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| zip_error(path, e))
}

fn zip_error(path: &Path, e: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::Zip {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
