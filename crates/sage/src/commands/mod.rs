//! Command implementations for the sage CLI.

pub mod list;
pub mod run;
pub mod tools;

use crate::cli::{CliError, Commands, ToolsCommands};
use sage_core::tools::ToolCatalog;
use sage_core::{Paths, Session, TaskRegistry};
use sage_tools_url::UrlFetcher;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a command needs: the session plus the known targets and tools.
pub struct Context {
    /// The run-scoped session.
    pub session: Session,
    /// Targets runnable by name.
    pub targets: TaskRegistry,
    /// Pinned tools.
    pub tools: ToolCatalog,
}

impl Context {
    /// Discover paths from the current directory and wire up the URL fetcher.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no repository root is found.
    pub fn discover(force_refetch: bool, cancel: CancellationToken) -> Result<Self, CliError> {
        let paths = Paths::discover()?;
        let fetcher = UrlFetcher::new(paths.tools_dir())?.with_force_refetch(force_refetch);
        let session = Session::builder(paths)
            .acquirer(Arc::new(fetcher))
            .cancellation(cancel)
            .build();
        Ok(Self {
            session,
            targets: crate::targets::registry(),
            tools: sage_tools_catalog::catalog(),
        })
    }
}

/// Result of a successful command, rendered as text or wrapped in a JSON envelope.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    /// Targets that ran to completion.
    Ran(run::RunReport),
    /// Known targets.
    Targets(Vec<list::TargetInfo>),
    /// Pinned tools for the current platform.
    Tools(Vec<tools::ToolInfo>),
    /// Tools prepared on disk.
    Prepared(Vec<tools::PreparedInfo>),
}

impl Outcome {
    /// Human-readable rendering; empty when there is nothing to print.
    #[must_use]
    pub fn render_text(&self) -> String {
        match self {
            Self::Ran(_) => String::new(),
            Self::Targets(targets) => list::render(targets),
            Self::Tools(tools) => tools::render_list(tools),
            Self::Prepared(prepared) => tools::render_prepared(prepared),
        }
    }
}

/// Dispatch a parsed subcommand.
///
/// # Errors
///
/// Returns the command's failure mapped to a [`CliError`].
pub async fn execute(command: &Commands, ctx: &Context) -> Result<Outcome, CliError> {
    match command {
        Commands::Run { targets } => run::execute(&ctx.session, &ctx.targets, targets)
            .await
            .map(Outcome::Ran),
        Commands::List => Ok(Outcome::Targets(list::execute(&ctx.targets))),
        Commands::Tools { subcommand } => match subcommand {
            ToolsCommands::List => Ok(Outcome::Tools(tools::execute_list(
                &ctx.session,
                &ctx.tools,
            )?)),
            ToolsCommands::Prepare { names } => {
                tools::execute_prepare(&ctx.session, &ctx.tools, names)
                    .await
                    .map(Outcome::Prepared)
            }
        },
    }
}
