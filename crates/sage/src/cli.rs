use crate::tracing::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand};
use miette::{Diagnostic, Report};
use serde::Serialize;
use std::io::{self, Write};
use thiserror::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// CLI, configuration or unknown-target error exit code
pub const EXIT_CLI: i32 = 2;
/// Target or tool failure exit code
pub const EXIT_TASK: i32 = 3;
/// Exit code for SIGINT (128 + signal number 2)
pub const EXIT_SIGINT: i32 = 130;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// CLI or configuration error (exit code 2)
    #[error("Configuration error: {message}")]
    #[diagnostic(code(sage::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// A target or one of its dependencies failed (exit code 3)
    #[error("{message}")]
    #[diagnostic(code(sage::cli::task))]
    Task {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Other unexpected error (exit code 3)
    #[error("Unexpected error: {message}")]
    #[diagnostic(code(sage::cli::other))]
    Other {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// The run was interrupted (exit code 130)
    #[error("Interrupted")]
    #[diagnostic(code(sage::cli::interrupted))]
    Interrupted,
}

impl CliError {
    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new task failure
    #[must_use]
    pub fn task(message: impl Into<String>, help: Option<String>) -> Self {
        Self::Task {
            message: message.into(),
            help,
        }
    }

    /// Create a new other error
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            help: None,
        }
    }
}

/// Help text from the innermost error that carries one.
fn innermost_help(err: &sage_core::Error) -> Option<String> {
    use sage_core::Error;
    match err {
        Error::Task { cause, .. } => innermost_help(cause),
        Error::Aggregate { errors } => errors.iter().find_map(innermost_help),
        Error::Configuration { help, .. }
        | Error::ToolAcquisition { help, .. }
        | Error::UnknownTask { help, .. }
        | Error::Verification { help, .. } => help.clone(),
        Error::Execution { .. } => Some("Check the command output above for details".to_string()),
        _ => None,
    }
}

/// Convert `sage_core::Error` to the appropriate `CliError` variant.
///
/// - Configuration and unknown targets -> Config (exit code 2)
/// - Cancellation -> Interrupted (exit code 130)
/// - Failures inside the task graph -> Task (exit code 3)
/// - Anything else -> Other (exit code 3)
impl From<sage_core::Error> for CliError {
    fn from(err: sage_core::Error) -> Self {
        use sage_core::Error;
        if err.is_cancelled() {
            return Self::Interrupted;
        }
        match err {
            Error::Configuration { message, help } => Self::Config { message, help },
            Error::UnknownTask { ref name, ref help } => Self::Config {
                message: format!("unknown target '{name}'"),
                help: help.clone(),
            },
            Error::Task { .. }
            | Error::Aggregate { .. }
            | Error::CycleDetected { .. }
            | Error::Execution { .. }
            | Error::Panicked { .. }
            | Error::Verification { .. } => {
                let help = innermost_help(&err);
                Self::task(err.to_string(), help)
            }
            Error::Io { .. }
            | Error::Platform { .. }
            | Error::ToolAcquisition { .. }
            | Error::UnexpectedOutput { .. }
            | Error::Timeout { .. }
            | Error::Cancelled => Self::other(err.to_string()),
        }
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Task { .. } | CliError::Other { .. } => EXIT_TASK,
        CliError::Interrupted => EXIT_SIGINT,
    }
}

/// Render error appropriately based on JSON flag
#[allow(clippy::print_stdout, clippy::print_stderr)]
pub fn render_error(err: &CliError, json_mode: bool) {
    if json_mode {
        let error_envelope = ErrorEnvelope::new(serde_json::json!({
            "code": match err {
                CliError::Config { .. } => "config",
                CliError::Task { .. } => "task",
                CliError::Other { .. } => "other",
                CliError::Interrupted => "interrupted",
            },
            "message": err.to_string()
        }));

        match serde_json::to_string(&error_envelope) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error serializing error response"),
        }
    } else {
        let report = Report::new(err.clone());
        eprintln!("{report:?}");
        let _ = io::stderr().flush();
    }
}

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct OkEnvelope<T> {
    /// Status indicator - always "ok" for success
    pub status: &'static str,
    /// The actual data payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Create a new success envelope
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope<E> {
    /// Status indicator - always "error" for failures
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Create a new error envelope
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Run build targets with pinned, self-installing tools.
#[derive(Parser, Debug)]
#[command(name = "sage")]
#[command(about = "Run build targets with pinned, self-installing tools")]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        global = true,
        help = "Set logging level",
        default_value = "info",
        value_enum
    )]
    pub level: LogLevel,

    /// Log output format.
    #[arg(
        long,
        global = true,
        env = "SAGE_LOG_FORMAT",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    /// Emit JSON envelopes on stdout and JSON logs on stderr.
    #[arg(long, global = true, help = "Emit JSON envelope regardless of format")]
    pub json: bool,

    /// Download tools again even when the pinned version is present.
    #[arg(long, global = true, env = "SAGE_FORCE_REFETCH")]
    pub force_refetch: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run build targets in the order given.
    Run {
        /// Targets to run.
        #[arg(default_value = "default")]
        targets: Vec<String>,
    },
    /// List available build targets.
    List,
    /// Inspect and prepare pinned tools.
    Tools {
        /// Tools subcommand.
        #[command(subcommand)]
        subcommand: ToolsCommands,
    },
}

/// `sage tools` subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ToolsCommands {
    /// List pinned tools and their download URL for this platform.
    List,
    /// Download and install tools ahead of time.
    Prepare {
        /// Tools to prepare; all tools when omitted.
        names: Vec<String>,
    },
}

/// Parse command line arguments
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
