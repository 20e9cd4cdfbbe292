//! Repository and tools-cache path layout.
//!
//! Every command runs from the repository root and every tool lives under
//! the tools cache inside it:
//!
//! | Path | Purpose |
//! |------|---------|
//! | `<root>/.tools/<name>/<version>/` | Versioned tool artifacts |
//! | `<root>/.tools/bin/<name>` | Stable symlink to the pinned version |
//!
//! Environment overrides for CI and testing:
//! - `SAGE_REPO_ROOT` - Skip `.git` discovery and use this root
//! - `SAGE_TOOLS_DIR` - Place the tools cache somewhere else

use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Name of the tools cache directory under the repository root.
pub const TOOLS_DIR_NAME: &str = ".tools";

/// Environment variable overriding repository root discovery.
pub const REPO_ROOT_ENV: &str = "SAGE_REPO_ROOT";

/// Environment variable overriding the tools cache location.
pub const TOOLS_DIR_ENV: &str = "SAGE_TOOLS_DIR";

/// Resolved path layout for one sage run.
///
/// Built once per process and handed to the session and the tool fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    repo_root: PathBuf,
    work_dir: PathBuf,
    tools_dir: PathBuf,
}

impl Paths {
    /// Create a layout from an explicit repository root and working directory.
    ///
    /// The tools cache defaults to `<repo_root>/.tools`.
    #[must_use]
    pub fn new(repo_root: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        let tools_dir = repo_root.join(TOOLS_DIR_NAME);
        Self {
            repo_root,
            work_dir: work_dir.into(),
            tools_dir,
        }
    }

    /// Discover the layout from the current directory and environment.
    ///
    /// Resolution order for the root:
    /// 1. `SAGE_REPO_ROOT` environment variable
    /// 2. Nearest ancestor of the current directory containing `.git`
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory is unreadable or no
    /// repository root can be found.
    pub fn discover() -> Result<Self> {
        let work_dir = std::env::current_dir()
            .map_err(|e| Error::io(e, None, "read current directory"))?;
        Self::discover_from(&work_dir)
    }

    /// Discover the layout as if invoked from `work_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if no repository root can be found.
    pub fn discover_from(work_dir: &Path) -> Result<Self> {
        let repo_root = match env_override(REPO_ROOT_ENV) {
            Some(root) => root,
            None => find_repo_root(work_dir)?,
        };
        let mut paths = Self::new(repo_root, work_dir);
        if let Some(tools_dir) = env_override(TOOLS_DIR_ENV) {
            paths.tools_dir = tools_dir;
        }
        Ok(paths)
    }

    /// Use a different tools cache directory.
    #[must_use]
    pub fn with_tools_dir(mut self, tools_dir: impl Into<PathBuf>) -> Self {
        self.tools_dir = tools_dir.into();
        self
    }

    /// The repository root; every command runs here.
    #[must_use]
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// The directory sage was invoked from.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// The tools cache root.
    #[must_use]
    pub fn tools_dir(&self) -> &Path {
        &self.tools_dir
    }

    /// Directory holding the stable tool symlinks, prepended to `PATH`.
    #[must_use]
    pub fn bin_dir(&self) -> PathBuf {
        self.tools_dir.join("bin")
    }

    /// Join a path onto the repository root.
    #[must_use]
    pub fn from_repo_root(&self, path: impl AsRef<Path>) -> PathBuf {
        self.repo_root.join(path)
    }

    /// Join path segments onto the tools cache root,
    /// e.g. `from_tools_dir(["convco", "0.3.7"])`.
    #[must_use]
    pub fn from_tools_dir<I, S>(&self, segments: I) -> PathBuf
    where
        I: IntoIterator<Item = S>,
        S: AsRef<Path>,
    {
        segments
            .into_iter()
            .fold(self.tools_dir.clone(), |acc, segment| acc.join(segment))
    }

    /// Path of a stable symlink in the bin directory.
    #[must_use]
    pub fn from_bin_dir(&self, name: impl AsRef<Path>) -> PathBuf {
        self.bin_dir().join(name)
    }

    /// Offset of the working directory from the repository root.
    ///
    /// Returns an empty path when invoked from the root itself, and `None`
    /// when the working directory lies outside the repository.
    #[must_use]
    pub fn work_dir_offset(&self) -> Option<PathBuf> {
        let offset = self.work_dir.strip_prefix(&self.repo_root).ok()?;
        Some(
            offset
                .components()
                .filter(|c| !matches!(c, Component::CurDir))
                .collect(),
        )
    }
}

/// Find the repository root by walking up from `start` until a directory
/// containing `.git` is found.
///
/// # Errors
///
/// Returns an error if no ancestor contains `.git`.
pub fn find_repo_root(start: &Path) -> Result<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return Ok(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => {
                return Err(Error::configuration_with_help(
                    format!("No git repository found above {}", start.display()),
                    format!("Run sage inside a git checkout or set {REPO_ROOT_ENV}"),
                ));
            }
        }
    }
}

fn env_override(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
