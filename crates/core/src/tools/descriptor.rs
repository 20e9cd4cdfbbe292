//! Tool descriptors and preparation results.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::Platform;

/// How a downloaded asset is unpacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    /// The body is the binary itself.
    Raw,
    /// A zip archive.
    Zip,
    /// A gzip-compressed tarball.
    TarGz,
}

impl ArchiveKind {
    /// Infer the archive kind from a URL's file extension.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        if lower.ends_with(".zip") {
            Self::Zip
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Self::TarGz
        } else {
            Self::Raw
        }
    }
}

/// Everything needed to fetch one pinned tool for one platform.
///
/// Built by a [`Tool`](super::Tool) from its URL table; immutable once
/// handed to an acquirer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, also the cache directory name.
    pub name: String,
    /// Pinned version.
    pub version: String,
    /// Platform the URL was computed for.
    pub platform: Platform,
    /// Download URL.
    pub url: String,
    /// How to unpack the download.
    pub archive: ArchiveKind,
    /// Location of the binary inside the unpacked tree, if not at the top.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<String>,
    /// Unpacked file to rename to `binary_name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename_from: Option<String>,
    /// Final binary file name, also the symlink name.
    pub binary_name: String,
}

impl ToolDescriptor {
    /// Create a descriptor; the archive kind is inferred from the URL and the
    /// binary is named after the tool.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        platform: Platform,
        url: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let url = url.into();
        Self {
            archive: ArchiveKind::from_url(&url),
            binary_name: name.clone(),
            name,
            version: version.into(),
            platform,
            url,
            archive_path: None,
            rename_from: None,
        }
    }

    /// Override the archive kind.
    #[must_use]
    pub fn with_archive(mut self, archive: ArchiveKind) -> Self {
        self.archive = archive;
        self
    }

    /// Set the binary location inside the unpacked tree.
    #[must_use]
    pub fn with_archive_path(mut self, path: impl Into<String>) -> Self {
        self.archive_path = Some(path.into());
        self
    }

    /// Rename the unpacked file `from` to the binary name.
    #[must_use]
    pub fn with_rename_from(mut self, from: impl Into<String>) -> Self {
        self.rename_from = Some(from.into());
        self
    }

    /// Use a binary name different from the tool name.
    #[must_use]
    pub fn with_binary_name(mut self, binary_name: impl Into<String>) -> Self {
        self.binary_name = binary_name.into();
        self
    }

    /// Point the descriptor at another URL, keeping everything else.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// `<tools>/<name>/<version>`
    #[must_use]
    pub fn destination_dir(&self, tools_dir: &Path) -> PathBuf {
        tools_dir.join(&self.name).join(&self.version)
    }

    /// The versioned binary the symlink points at.
    #[must_use]
    pub fn binary_path(&self, tools_dir: &Path) -> PathBuf {
        let dest = self.destination_dir(tools_dir);
        match &self.archive_path {
            Some(path) => dest.join(path),
            None => dest.join(&self.binary_name),
        }
    }

    /// `<tools>/bin/<binary_name>`
    #[must_use]
    pub fn symlink_path(&self, tools_dir: &Path) -> PathBuf {
        tools_dir.join("bin").join(&self.binary_name)
    }
}

/// Result of preparing a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedTool {
    /// Tool name.
    pub name: String,
    /// Pinned version.
    pub version: String,
    /// Versioned binary path.
    pub binary_path: PathBuf,
    /// Stable symlink path.
    pub symlink_path: PathBuf,
    /// SHA-256 of the binary, lowercase hex.
    pub sha256: String,
    /// Whether this preparation hit the network.
    pub downloaded: bool,
}
