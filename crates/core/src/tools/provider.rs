//! The seams between tool definitions and tool acquisition.
//!
//! A [`Tool`] is a parameter table: given a platform it produces a
//! [`ToolDescriptor`]. An [`Acquirer`] turns descriptors into binaries on
//! disk. Keeping the two apart lets the task graph prepare tools without
//! depending on an HTTP client.

use async_trait::async_trait;

use super::{Platform, PreparedTool, ToolDescriptor};
use crate::Result;

/// Something that can make a tool binary available locally.
///
/// # Example
///
/// ```ignore
/// pub struct UrlFetcher { /* ... */ }
///
/// #[async_trait]
/// impl Acquirer for UrlFetcher {
///     async fn prepare(&self, descriptor: &ToolDescriptor) -> Result<PreparedTool> { /* ... */ }
///     fn is_prepared(&self, descriptor: &ToolDescriptor) -> bool { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait Acquirer: Send + Sync {
    /// Ensure the binary described by `descriptor` exists and the stable
    /// symlink points at it.
    ///
    /// Skips the download when the versioned binary is already present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolAcquisition`](crate::Error::ToolAcquisition)
    /// naming the tool if any step fails.
    async fn prepare(&self, descriptor: &ToolDescriptor) -> Result<PreparedTool>;

    /// Check whether the versioned binary is already on disk.
    fn is_prepared(&self, descriptor: &ToolDescriptor) -> bool;
}

/// A pinned third-party tool.
pub trait Tool: Send + Sync {
    /// Tool name, used for the cache directory and the `prepare:` task.
    fn name(&self) -> &'static str;

    /// Pinned version.
    fn version(&self) -> &'static str;

    /// Human-readable description for `sage tools list`.
    fn description(&self) -> &'static str;

    /// Compute the download descriptor for a platform.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Platform`](crate::Error::Platform) naming the
    /// offending OS or architecture when the tool ships no asset for it.
    fn descriptor(&self, platform: &Platform) -> Result<ToolDescriptor>;
}
