//! Error types shared by every sage crate.

use miette::Diagnostic;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Main error type for sage operations.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Invalid configuration or environment (missing repository root, bad override).
    #[error("Configuration error: {message}")]
    #[diagnostic(code(sage::config))]
    Configuration {
        /// The error message.
        message: String,
        /// Optional help text.
        #[help]
        help: Option<String>,
    },

    /// The host OS or architecture is not covered by a tool's download table.
    #[error("Unsupported platform: {message}")]
    #[diagnostic(
        code(sage::tools::platform),
        help("Only the platforms listed by the tool's release assets are supported")
    )]
    Platform {
        /// The error message, naming the unsupported value.
        message: String,
    },

    /// Downloading, unpacking or installing a tool failed.
    #[error("Unable to prepare {tool}: {message}")]
    #[diagnostic(code(sage::tools::acquisition))]
    ToolAcquisition {
        /// Name of the tool being prepared.
        tool: String,
        /// The error message.
        message: String,
        /// Optional help text.
        #[help]
        help: Option<String>,
    },

    /// A filesystem or process I/O operation failed.
    #[error("I/O {operation} failed{}: {source}", path.as_ref().map_or(String::new(), |p| format!(" on {}", p.display())))]
    #[diagnostic(code(sage::io))]
    Io {
        /// The underlying I/O error.
        source: std::io::Error,
        /// Path involved, if any.
        path: Option<Box<Path>>,
        /// What was being attempted.
        operation: String,
    },

    /// An external command exited unsuccessfully.
    #[error("{program} exited with {}", code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}")))]
    #[diagnostic(code(sage::exec), help("Check the command output above for details"))]
    Execution {
        /// The program that was run.
        program: String,
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
    },

    /// A task body panicked; the panic is recorded as the task's failure.
    #[error("Task body panicked: {message}")]
    #[diagnostic(code(sage::task::panic))]
    Panicked {
        /// The panic payload, when it was a string.
        message: String,
    },

    /// A task body returned an error.
    #[error("Task '{task}' failed: {cause}")]
    #[diagnostic(code(sage::task))]
    Task {
        /// Identifier of the failing task.
        task: String,
        /// The error returned by the task, shared with every requester.
        cause: Arc<Error>,
    },

    /// Several parallel dependencies failed.
    #[error("{} dependencies failed: {}", errors.len(), errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    #[diagnostic(code(sage::task::aggregate))]
    Aggregate {
        /// The failures, in declared dependency order.
        errors: Vec<Error>,
    },

    /// A task requested itself through its own dependency chain.
    #[error("Dependency cycle detected: {chain}")]
    #[diagnostic(code(sage::task::cycle))]
    CycleDetected {
        /// The chain of task identifiers forming the cycle.
        chain: String,
    },

    /// A task name could not be resolved in the registry.
    #[error("Unknown task '{name}'")]
    #[diagnostic(code(sage::task::unknown))]
    UnknownTask {
        /// The requested name.
        name: String,
        /// Optional help text listing what is available.
        #[help]
        help: Option<String>,
    },

    /// A repository check failed (e.g. the build left uncommitted changes).
    #[error("Verification failed: {message}")]
    #[diagnostic(code(sage::verify))]
    Verification {
        /// What was found.
        message: String,
        /// Optional help text.
        #[help]
        help: Option<String>,
    },

    /// A tool produced output sage could not interpret.
    #[error("Unexpected output from {tool}: {output:?}")]
    #[diagnostic(code(sage::tools::output))]
    UnexpectedOutput {
        /// The tool that was run.
        tool: String,
        /// The output that failed to parse.
        output: String,
    },

    /// A bounded wait elapsed.
    #[error("Timed out after {seconds} seconds waiting for {what}")]
    #[diagnostic(code(sage::timeout))]
    Timeout {
        /// What was being waited on.
        what: String,
        /// The bound that elapsed.
        seconds: u64,
    },

    /// The session was cancelled.
    #[error("Operation cancelled")]
    #[diagnostic(code(sage::cancelled))]
    Cancelled,
}

impl Error {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            help: None,
        }
    }

    /// Create a configuration error with help text.
    #[must_use]
    pub fn configuration_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create an unsupported-platform error.
    #[must_use]
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
        }
    }

    /// Create a tool acquisition error.
    #[must_use]
    pub fn tool_acquisition(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolAcquisition {
            tool: tool.into(),
            message: message.into(),
            help: None,
        }
    }

    /// Create a tool acquisition error with help text.
    #[must_use]
    pub fn tool_acquisition_with_help(
        tool: impl Into<String>,
        message: impl Into<String>,
        help: impl Into<String>,
    ) -> Self {
        Self::ToolAcquisition {
            tool: tool.into(),
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create an I/O error with context.
    #[must_use]
    pub fn io(source: std::io::Error, path: Option<&Path>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.map(Into::into),
            operation: operation.into(),
        }
    }

    /// Create an execution error.
    #[must_use]
    pub fn execution(program: impl Into<String>, code: Option<i32>) -> Self {
        Self::Execution {
            program: program.into(),
            code,
        }
    }

    /// Create a panic error.
    #[must_use]
    pub fn panicked(message: impl Into<String>) -> Self {
        Self::Panicked {
            message: message.into(),
        }
    }

    /// Wrap a task's shared failure with the task's identifier.
    #[must_use]
    pub fn task(task: impl Into<String>, cause: Arc<Self>) -> Self {
        Self::Task {
            task: task.into(),
            cause,
        }
    }

    /// Create a verification error with help text.
    #[must_use]
    pub fn verification(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Verification {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create an unexpected-output error.
    #[must_use]
    pub fn unexpected_output(tool: impl Into<String>, output: impl Into<String>) -> Self {
        Self::UnexpectedOutput {
            tool: tool.into(),
            output: output.into(),
        }
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout(what: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            what: what.into(),
            seconds,
        }
    }

    /// Collapse a list of failures: none is success, one is returned as-is,
    /// several become [`Error::Aggregate`].
    ///
    /// # Errors
    ///
    /// Returns an error whenever `errors` is non-empty.
    pub fn collapse(mut errors: Vec<Self>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Aggregate { errors }),
        }
    }

    /// Whether this error was produced by cancellation, directly or through
    /// a failed dependency.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Task { cause, .. } => cause.is_cancelled(),
            Self::Aggregate { errors } => errors.iter().all(Self::is_cancelled),
            _ => false,
        }
    }

    /// Whether this error originates in a task body rather than wrapping a
    /// dependency's failure.
    #[must_use]
    pub fn is_origin(&self) -> bool {
        !matches!(self, Self::Task { .. } | Self::Aggregate { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            path: None,
            operation: "operation".to_string(),
        }
    }
}

/// Result type alias for sage operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display_includes_path() {
        let err = Error::io(
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            Some(Path::new("/tmp/tool")),
            "chmod",
        );
        let display = err.to_string();
        assert!(display.contains("chmod"));
        assert!(display.contains("/tmp/tool"));
        assert!(display.contains("denied"));
    }

    #[test]
    fn test_execution_display() {
        assert_eq!(
            Error::execution("convco", Some(1)).to_string(),
            "convco exited with code 1"
        );
        assert_eq!(
            Error::execution("convco", None).to_string(),
            "convco exited with a signal"
        );
    }

    #[test]
    fn test_task_wraps_cause() {
        let err = Error::task("lint", Arc::new(Error::execution("golangci-lint", Some(2))));
        assert_eq!(
            err.to_string(),
            "Task 'lint' failed: golangci-lint exited with code 2"
        );
        assert!(!err.is_origin());
    }

    #[test]
    fn test_collapse() {
        assert!(Error::collapse(vec![]).is_ok());

        let single = Error::collapse(vec![Error::Cancelled]).unwrap_err();
        assert!(matches!(single, Error::Cancelled));

        let many = Error::collapse(vec![
            Error::configuration("a"),
            Error::configuration("b"),
        ])
        .unwrap_err();
        match many {
            Error::Aggregate { errors } => assert_eq!(errors.len(), 2),
            other => panic!("expected aggregate, got {other:?}"),
        }
    }

    #[test]
    fn test_is_cancelled_through_wrappers() {
        let err = Error::task("a", Arc::new(Error::task("b", Arc::new(Error::Cancelled))));
        assert!(err.is_cancelled());
        assert!(!Error::configuration("x").is_cancelled());
    }
}
