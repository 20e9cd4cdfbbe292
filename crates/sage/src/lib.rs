//! sage command-line interface.
//!
//! `sage run [TARGET]...` runs build targets through the run-once task graph
//! in [`sage_core`]; tools are fetched on first use into the repository's
//! `.tools` directory. The binary in `main.rs` only wires signal handling,
//! tracing and exit codes around [`commands::execute`].

pub mod cli;
pub mod commands;
pub mod targets;
pub mod tracing;
