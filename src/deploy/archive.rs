//! Web application archives (`.tar`, `.tar.gz`, `.tgz`).

use std::fs;
use std::io::Read;
use std::path::{Component, Path};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};

use crate::error::{Result, RunnerError};

const ARCHIVE_SUFFIXES: [&str; 3] = [".tar.gz", ".tgz", ".tar"];

/// App name of an archive file, or `None` when `path` is not an archive.
pub fn archive_stem(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    ARCHIVE_SUFFIXES.iter().find_map(|suffix| {
        let stem = name.strip_suffix(suffix)?;
        (!stem.is_empty()).then_some(stem)
    })
}

/// Unpack `archive` into `dest`, replacing anything already there.
///
/// Callers deploying a new version pass a fresh `dest`.
///
/// Only regular files and directories with relative paths are accepted.
pub fn extract(archive: &Path, dest: &Path) -> Result<()> {
    let failed = |reason: String| RunnerError::Deployment {
        app: archive.to_path_buf(),
        reason,
    };

    if dest.exists() {
        fs::remove_dir_all(dest)?;
    }
    fs::create_dir_all(dest)?;

    let file = fs::File::open(archive)?;
    let reader: Box<dyn Read> = match archive.file_name().and_then(|n| n.to_str()) {
        Some(name) if name.ends_with(".tar") => Box::new(file),
        _ => Box::new(GzDecoder::new(file)),
    };

    let mut tar = Archive::new(reader);
    let mut files = 0usize;
    for entry in tar.entries().map_err(|e| failed(e.to_string()))? {
        let mut entry = entry.map_err(|e| failed(e.to_string()))?;
        let entry_type = entry.header().entry_type();
        match entry_type {
            EntryType::Directory | EntryType::Regular => {}
            other => {
                return Err(failed(format!("unsupported entry type {:?}", other)));
            }
        }

        let path = entry.path().map_err(|e| failed(e.to_string()))?.into_owned();
        validate_relative_path(&path).map_err(failed)?;

        let dest_path = dest.join(&path);
        if entry_type == EntryType::Directory {
            fs::create_dir_all(&dest_path)?;
        } else {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }
            entry.unpack(&dest_path)?;
            files += 1;
        }
    }

    tracing::debug!(
        archive = %archive.display(),
        dest = %dest.display(),
        files,
        "Archive extracted"
    );
    Ok(())
}

fn validate_relative_path(path: &Path) -> std::result::Result<(), String> {
    if path.as_os_str().is_empty() {
        return Err("empty entry path".to_string());
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(format!("entry '{}' escapes the archive root", path.display())),
        }
    }
    Ok(())
}
