//! `sage tools list` and `sage tools prepare`.

use crate::cli::CliError;
use sage_core::Session;
use sage_core::tools::{Tool, ToolCatalog, prepare_task};
use serde::Serialize;
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// A pinned tool as shown by `sage tools list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Pinned version.
    pub version: String,
    /// What the tool does.
    pub description: String,
    /// Release asset for the current platform.
    pub url: Option<String>,
    /// Why the tool cannot be prepared here, if it cannot.
    pub unsupported: Option<String>,
    /// Whether the pinned binary is already on disk.
    pub prepared: bool,
}

/// A tool made available by `sage tools prepare`.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedInfo {
    /// Tool name.
    pub name: String,
    /// Pinned version.
    pub version: String,
    /// Stable symlink on `PATH` during runs.
    pub path: PathBuf,
}

/// Describe every catalog tool for the session's platform.
///
/// # Errors
///
/// Returns an error if the host platform itself is unsupported.
pub fn execute_list(session: &Session, catalog: &ToolCatalog) -> Result<Vec<ToolInfo>, CliError> {
    let platform = session.platform()?;
    let tools_dir = session.paths().tools_dir();
    Ok(catalog
        .iter()
        .map(|tool| {
            let mut info = ToolInfo {
                name: tool.name().to_string(),
                version: tool.version().to_string(),
                description: tool.description().to_string(),
                url: None,
                unsupported: None,
                prepared: false,
            };
            match tool.descriptor(&platform) {
                Ok(descriptor) => {
                    info.prepared = descriptor.binary_path(tools_dir).is_file();
                    info.url = Some(descriptor.url);
                }
                Err(err) => info.unsupported = Some(err.to_string()),
            }
            info
        })
        .collect())
}

/// Prepare the named tools concurrently, or every tool available on this
/// platform when `names` is empty.
///
/// # Errors
///
/// Returns a configuration error for unknown names before any download,
/// otherwise the preparation failures.
pub async fn execute_prepare(
    session: &Session,
    catalog: &ToolCatalog,
    names: &[String],
) -> Result<Vec<PreparedInfo>, CliError> {
    let platform = session.platform()?;
    let selected: Vec<Arc<dyn Tool>> = if names.is_empty() {
        catalog
            .iter()
            .filter(|tool| match tool.descriptor(&platform) {
                Ok(_) => true,
                Err(err) => {
                    debug!(tool = tool.name(), %err, "Skipping tool");
                    false
                }
            })
            .cloned()
            .collect()
    } else {
        names
            .iter()
            .map(|name| {
                catalog.get(name).cloned().ok_or_else(|| {
                    CliError::config_with_help(
                        format!("unknown tool '{name}'"),
                        format!("Available tools: {}", catalog.names().join(", ")),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    let tasks: Vec<_> = selected.iter().cloned().map(prepare_task).collect();
    session.deps(&tasks).await?;

    let mut prepared = Vec::with_capacity(selected.len());
    for tool in &selected {
        let descriptor = tool.descriptor(&platform)?;
        prepared.push(PreparedInfo {
            name: tool.name().to_string(),
            version: tool.version().to_string(),
            path: descriptor.symlink_path(session.paths().tools_dir()),
        });
    }
    Ok(prepared)
}

/// Table of tools with their availability.
#[must_use]
pub fn render_list(tools: &[ToolInfo]) -> String {
    let width = tools.iter().map(|t| t.name.len()).max().unwrap_or(0);
    let mut out = String::new();
    for tool in tools {
        let status = match (&tool.unsupported, tool.prepared) {
            (Some(reason), _) => reason.as_str(),
            (None, true) => "prepared",
            (None, false) => "not prepared",
        };
        let _ = writeln!(
            out,
            "{:width$}  {:10}  {}  ({status})",
            tool.name, tool.version, tool.description
        );
    }
    out
}

/// One line per prepared tool.
#[must_use]
pub fn render_prepared(prepared: &[PreparedInfo]) -> String {
    let mut out = String::new();
    for tool in prepared {
        let _ = writeln!(out, "{} {} -> {}", tool.name, tool.version, tool.path.display());
    }
    out
}
