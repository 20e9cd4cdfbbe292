//! Error types for fetch operations.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Errors that can occur while fetching a tool.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read.
    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("download of {url} failed (HTTP {status})")]
    Status {
        /// The requested URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The archive could not be read.
    #[error("failed to extract archive: {0}")]
    Archive(String),

    /// An expected entry is missing after unpacking.
    #[error("'{0}' not found in archive")]
    EntryNotFound(String),

    /// A filesystem operation failed.
    #[error("failed to {operation} {}: {source}", path.display())]
    Io {
        /// What was being attempted.
        operation: &'static str,
        /// The path involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The blocking extraction task did not complete.
    #[error("extraction task failed: {0}")]
    Join(String),
}

impl FetchError {
    /// Build a closure that wraps an I/O error with context.
    pub fn io(operation: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self::Io {
            operation,
            path,
            source,
        }
    }

    /// Convert into the shared error type, naming the tool.
    #[must_use]
    pub fn into_tool_error(self, tool: &str) -> sage_core::Error {
        match &self {
            Self::Status { status: 401 | 403, .. } => sage_core::Error::tool_acquisition_with_help(
                tool,
                self.to_string(),
                "Set GITHUB_TOKEN or GH_TOKEN to authenticate release downloads",
            ),
            _ => sage_core::Error::tool_acquisition(tool, self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_names_tool_and_code() {
        let err = FetchError::Status {
            url: "https://example.com/convco-ubuntu.zip".into(),
            status: 404,
        }
        .into_tool_error("convco");
        let display = err.to_string();
        assert!(display.starts_with("Unable to prepare convco"));
        assert!(display.contains("HTTP 404"));
    }

    #[test]
    fn test_forbidden_suggests_token() {
        let err = FetchError::Status {
            url: "https://example.com/a".into(),
            status: 403,
        }
        .into_tool_error("sops");
        match err {
            sage_core::Error::ToolAcquisition { help, .. } => {
                assert!(help.unwrap().contains("GITHUB_TOKEN"));
            }
            other => panic!("expected acquisition error, got {other:?}"),
        }
    }

    #[test]
    fn test_io_context() {
        let err = FetchError::io("chmod", Path::new("/tmp/x"))(std::io::Error::other("nope"));
        assert_eq!(err.to_string(), "failed to chmod /tmp/x: nope");
    }
}
