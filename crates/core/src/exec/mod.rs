//! External commands and their output handling.

mod command;
mod log_writer;

pub use command::{Command, Sink};
pub use log_writer::LogWriter;
