//! External process invocation with sage's conventions applied.

use std::ffi::{OsStr, OsString};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::LogWriter;
use crate::{Error, Paths, Result, Session};

/// Where a child's output stream goes.
pub enum Sink {
    /// Through a [`LogWriter`] onto the parent's stdout or stderr.
    Log,
    /// Discarded.
    Null,
    /// Raw bytes into a caller-supplied writer.
    Writer(Box<dyn Write + Send>),
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Log => f.write_str("Log"),
            Self::Null => f.write_str("Null"),
            Self::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl Sink {
    fn stdio(&self) -> Stdio {
        match self {
            Self::Null => Stdio::null(),
            Self::Log | Self::Writer(_) => Stdio::piped(),
        }
    }

    fn into_writer(self, stream: Stream, prefix: &str, paths: &Paths) -> Option<Box<dyn Write + Send>> {
        match self {
            Self::Null => None,
            Self::Writer(writer) => Some(writer),
            Self::Log => Some(match stream {
                Stream::Stdout => Box::new(LogWriter::new(io::stdout(), prefix, paths)),
                Stream::Stderr => Box::new(LogWriter::new(io::stderr(), prefix, paths)),
            }),
        }
    }
}

/// An external command bound to a session.
///
/// Runs from the repository root with the tools bin directory first on
/// `PATH`, and streams both output pipes through [`LogWriter`]s prefixed
/// with the current task name. Everything can be adjusted before running.
#[derive(Debug)]
#[must_use]
pub struct Command {
    program: OsString,
    args: Vec<OsString>,
    current_dir: PathBuf,
    envs: Vec<(OsString, OsString)>,
    stdout: Sink,
    stderr: Sink,
    prefix: String,
    paths: Paths,
    cancel: CancellationToken,
}

impl Command {
    /// Create a command for `program` with the session's conventions.
    pub fn new(session: &Session, program: impl AsRef<OsStr>) -> Self {
        let paths = session.paths().clone();
        let mut envs = Vec::new();
        match prepend_path(&paths.bin_dir()) {
            Some(path) => envs.push((OsString::from("PATH"), path)),
            None => warn!(bin_dir = %paths.bin_dir().display(), "Tools bin directory cannot be placed on PATH"),
        }
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            current_dir: paths.repo_root().to_path_buf(),
            envs,
            stdout: Sink::Log,
            stderr: Sink::Log,
            prefix: session.log_prefix(),
            paths,
            cancel: session.cancellation_token().clone(),
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Run somewhere other than the repository root.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = dir.into();
        self
    }

    /// Set an environment variable; later values win.
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Redirect stdout.
    pub fn stdout(mut self, sink: Sink) -> Self {
        self.stdout = sink;
        self
    }

    /// Redirect stderr.
    pub fn stderr(mut self, sink: Sink) -> Self {
        self.stderr = sink;
        self
    }

    /// The program to run.
    #[must_use]
    pub fn get_program(&self) -> &OsStr {
        &self.program
    }

    /// The arguments.
    #[must_use]
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// The working directory.
    #[must_use]
    pub fn get_current_dir(&self) -> &Path {
        &self.current_dir
    }

    /// The effective value of an explicitly set environment variable.
    #[must_use]
    pub fn get_env(&self, key: impl AsRef<OsStr>) -> Option<&OsStr> {
        self.envs
            .iter()
            .rev()
            .find(|(k, _)| k == key.as_ref())
            .map(|(_, v)| v.as_os_str())
    }

    /// Run to completion, streaming output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Execution`] on a non-zero exit, [`Error::Cancelled`]
    /// if the session is cancelled first, or an I/O error if the program
    /// cannot be started.
    pub async fn run(self) -> Result<()> {
        self.execute(false).await.map(|_| ())
    }

    /// Run to completion and return stdout, trimmed.
    ///
    /// Stderr is still streamed.
    ///
    /// # Errors
    ///
    /// As for [`Command::run`].
    pub async fn output(self) -> Result<String> {
        let captured = self.execute(true).await?;
        Ok(String::from_utf8_lossy(&captured).trim().to_string())
    }

    /// Run with all output discarded and report whether it succeeded.
    pub async fn status_quiet(self) -> bool {
        self.stdout(Sink::Null)
            .stderr(Sink::Null)
            .execute(false)
            .await
            .is_ok()
    }

    fn program_name(&self) -> String {
        Path::new(&self.program).file_name().map_or_else(
            || self.program.to_string_lossy().into_owned(),
            |name| name.to_string_lossy().into_owned(),
        )
    }

    async fn execute(self, capture: bool) -> Result<Vec<u8>> {
        let program = self.program_name();
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.current_dir)
            .stdin(Stdio::null())
            .stdout(if capture { Stdio::piped() } else { self.stdout.stdio() })
            .stderr(self.stderr.stdio())
            .kill_on_drop(true);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }

        debug!(program = %program, args = ?self.args, dir = %self.current_dir.display(), "Running command");
        let mut child = cmd
            .spawn()
            .map_err(|e| Error::io(e, Some(Path::new(&self.program)), format!("spawn {program}")))?;

        let mut pumps = Vec::new();
        let mut capture_handle = None;
        if let Some(pipe) = child.stdout.take() {
            if capture {
                capture_handle = Some(tokio::spawn(read_all(pipe)));
            } else if let Some(writer) = self.stdout.into_writer(Stream::Stdout, &self.prefix, &self.paths) {
                pumps.push(tokio::spawn(pump(pipe, writer, program.clone())));
            }
        }
        if let Some(pipe) = child.stderr.take()
            && let Some(writer) = self.stderr.into_writer(Stream::Stderr, &self.prefix, &self.paths)
        {
            pumps.push(tokio::spawn(pump(pipe, writer, program.clone())));
        }

        let waited = tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            status = child.wait() => Some(status),
        };
        let Some(status) = waited else {
            debug!(program = %program, "Cancelled, killing child");
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(Error::Cancelled);
        };
        let status = status.map_err(|e| Error::io(e, None, format!("wait for {program}")))?;

        for pump in pumps {
            if let Err(e) = pump.await {
                warn!(program = %program, error = %e, "Output stream task failed");
            }
        }
        let captured = match capture_handle {
            Some(handle) => join_stream(handle, &program).await?.unwrap_or_default(),
            None => Vec::new(),
        };

        if status.success() {
            Ok(captured)
        } else {
            Err(Error::execution(program, status.code()))
        }
    }
}

/// Prepend `bin_dir` to the inherited `PATH`.
fn prepend_path(bin_dir: &Path) -> Option<OsString> {
    let inherited = std::env::var_os("PATH");
    let entries = std::iter::once(bin_dir.to_path_buf())
        .chain(inherited.iter().flat_map(std::env::split_paths));
    std::env::join_paths(entries).ok()
}

/// Copy a child's pipe into `writer` line by line.
///
/// Output problems never fail the command: after a write error (a closed
/// `| head`, a full disk) the rest of the pipe is drained and discarded so
/// the child cannot block, and the exit status alone decides success.
async fn pump<R: AsyncRead + Unpin>(pipe: R, mut writer: Box<dyn Write + Send>, program: String) {
    let mut segments = BufReader::new(pipe).split(b'\n');
    let mut writable = true;
    loop {
        let mut segment = match segments.next_segment().await {
            Ok(Some(segment)) => segment,
            Ok(None) => break,
            Err(e) => {
                warn!(program = %program, error = %e, "Failed to read command output");
                return;
            }
        };
        if !writable {
            continue;
        }
        segment.push(b'\n');
        if let Err(e) = writer.write_all(&segment) {
            warn!(program = %program, error = %e, "Failed to write command output, discarding the rest");
            writable = false;
        }
    }
    if writable && let Err(e) = writer.flush() {
        warn!(program = %program, error = %e, "Failed to flush command output");
    }
}

async fn read_all<R: AsyncRead + Unpin>(mut pipe: R) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf).await?;
    Ok(buf)
}

async fn join_stream<T>(handle: JoinHandle<io::Result<T>>, program: &str) -> Result<Option<T>> {
    match handle.await {
        Ok(Ok(value)) => Ok(Some(value)),
        Ok(Err(e)) => Err(Error::io(e, None, format!("stream output of {program}"))),
        Err(e) => {
            warn!(program = %program, error = %e, "Output stream task failed");
            Ok(None)
        }
    }
}
