//! Unpacking downloaded assets into the versioned tool directory.
//!
//! Everything is unpacked into a hidden sibling staging directory first and
//! moved into place only once the expected binary is present, so a failed
//! download never leaves a partial tree behind.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use sage_core::tools::{ArchiveKind, ToolDescriptor};
use tar::Archive;
use tracing::debug;

use crate::error::{FetchError, Result};

/// Unpack `data` for `descriptor` into `dest`, replacing it.
pub(crate) fn unpack(data: &[u8], descriptor: &ToolDescriptor, dest: &Path) -> Result<()> {
    let staging = staging_dir(dest);
    if staging.exists() {
        std::fs::remove_dir_all(&staging).map_err(FetchError::io("clean", &staging))?;
    }
    std::fs::create_dir_all(&staging).map_err(FetchError::io("create", &staging))?;

    if let Err(e) = stage(data, descriptor, &staging) {
        let _ = std::fs::remove_dir_all(&staging);
        return Err(e);
    }

    if dest.exists() {
        std::fs::remove_dir_all(dest).map_err(FetchError::io("replace", dest))?;
    }
    std::fs::rename(&staging, dest).map_err(FetchError::io("move into place", dest))?;
    debug!(dest = %dest.display(), "Unpacked tool");
    Ok(())
}

fn staging_dir(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("extract");
    dest.with_file_name(format!(".{name}.tmp"))
}

fn stage(data: &[u8], descriptor: &ToolDescriptor, staging: &Path) -> Result<()> {
    match descriptor.archive {
        ArchiveKind::Raw => {
            let name = descriptor
                .rename_from
                .as_deref()
                .unwrap_or(&descriptor.binary_name);
            let path = staging.join(name);
            std::fs::write(&path, data).map_err(FetchError::io("write", &path))?;
        }
        ArchiveKind::Zip => unzip(data, staging)?,
        ArchiveKind::TarGz => untar_gz(data, staging)?,
    }

    if let Some(from) = &descriptor.rename_from {
        let source = staging.join(from);
        if !source.exists() {
            return Err(FetchError::EntryNotFound(from.clone()));
        }
        let target = staging.join(&descriptor.binary_name);
        if source != target {
            std::fs::rename(&source, &target).map_err(FetchError::io("rename", &source))?;
        }
    }

    let expected = descriptor
        .archive_path
        .as_deref()
        .unwrap_or(&descriptor.binary_name);
    if staging.join(expected).is_file() {
        Ok(())
    } else {
        Err(FetchError::EntryNotFound(expected.to_string()))
    }
}

fn unzip(data: &[u8], staging: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| FetchError::Archive(format!("failed to open zip: {e}")))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| FetchError::Archive(format!("failed to read zip entry: {e}")))?;

        let Some(relative) = file.enclosed_name() else {
            continue;
        };
        let outpath = staging.join(relative);

        if file.is_dir() {
            std::fs::create_dir_all(&outpath).map_err(FetchError::io("create", &outpath))?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).map_err(FetchError::io("create", parent))?;
        }
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| FetchError::Archive(format!("failed to read zip entry: {e}")))?;
        std::fs::write(&outpath, &content).map_err(FetchError::io("write", &outpath))?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))
                .map_err(FetchError::io("chmod", &outpath))?;
        }
    }
    Ok(())
}

fn untar_gz(data: &[u8], staging: &Path) -> Result<()> {
    let mut archive = Archive::new(GzDecoder::new(Cursor::new(data)));
    archive
        .unpack(staging)
        .map_err(|e| FetchError::Archive(format!("failed to extract tar.gz: {e}")))
}
