//! Core types for sage.
//!
//! sage wraps third-party developer tools (linters, formatters, commit checkers)
//! behind a uniform invocation layer. This crate holds the pieces every tool
//! and target shares:
//!
//! - [`Error`] / [`Result`] - the error taxonomy surfaced to the CLI
//! - [`Paths`] - repository root, working directory and tools cache layout
//! - [`tasks`] - the run-once task graph ([`Session::deps`], [`Session::serial_deps`])
//! - [`exec`] - external commands and the CI-aware log writer
//! - [`tools`] - platform detection, tool descriptors and the acquisition seam
//! - [`net`] - reachability polling for services started by targets

pub mod error;
pub mod exec;
pub mod net;
pub mod paths;
pub mod tasks;
pub mod tools;

pub use error::{Error, Result};
pub use paths::Paths;
pub use tasks::{Session, SessionBuilder, Task, TaskId, TaskRegistry, TaskState};
