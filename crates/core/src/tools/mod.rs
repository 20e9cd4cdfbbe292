//! Pinned third-party tools.
//!
//! The tool system consists of:
//!
//! - [`Tool`] - A parameter table producing a [`ToolDescriptor`] per platform
//! - [`Acquirer`] - Turns descriptors into binaries on disk
//! - [`ToolCatalog`] - Collection of tools looked up by name
//! - [`Platform`], [`Os`], [`Arch`] - Platform identification types
//!
//! Targets never call an acquirer directly. They ask for a [`command`],
//! which first runs the tool's `prepare:<name>` task through the session so
//! the download happens at most once per run.

mod descriptor;
mod platform;
mod provider;
mod registry;

pub use descriptor::{ArchiveKind, PreparedTool, ToolDescriptor};
pub use platform::{Arch, Os, Platform};
pub use provider::{Acquirer, Tool};
pub use registry::ToolCatalog;

use std::ffi::OsStr;
use std::sync::Arc;

use tracing::info;

use crate::exec::Command;
use crate::{Result, Session, Task};

/// Identifier of a tool's preparation task.
#[must_use]
pub fn prepare_task_id(name: &str) -> String {
    format!("prepare:{name}")
}

/// The run-once task that prepares `tool` for the session's platform.
pub fn prepare_task(tool: Arc<dyn Tool>) -> Task {
    let description = format!("Prepare {} {}", tool.name(), tool.version());
    Task::new(prepare_task_id(tool.name()), move |session: Session| {
        let tool = Arc::clone(&tool);
        async move { prepare(&session, tool.as_ref()).await.map(|_| ()) }
    })
    .with_description(description)
}

/// Prepare `tool` immediately, bypassing the memo table.
///
/// # Errors
///
/// Returns a platform error before any network access if the tool has no
/// asset for the session's platform, or the acquirer's failure.
pub async fn prepare(session: &Session, tool: &dyn Tool) -> Result<PreparedTool> {
    let platform = session.platform()?;
    let descriptor = tool.descriptor(&platform)?;
    let prepared = session.acquirer()?.prepare(&descriptor).await?;
    info!(
        tool = %prepared.name,
        version = %prepared.version,
        downloaded = prepared.downloaded,
        "Tool ready"
    );
    Ok(prepared)
}

/// Build a command running `tool`, preparing it first.
///
/// # Errors
///
/// Returns the preparation failure wrapped with the `prepare:` task name.
pub async fn command<I, S>(session: &Session, tool: Arc<dyn Tool>, args: I) -> Result<Command>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    session.deps(&[prepare_task(Arc::clone(&tool))]).await?;
    let descriptor = tool.descriptor(&session.platform()?)?;
    let program = descriptor.symlink_path(session.paths().tools_dir());
    Ok(Command::new(session, program).args(args))
}
