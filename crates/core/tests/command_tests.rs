//! Tests for external command execution
#![cfg(unix)]

use sage_core::exec::{Command, Sink};
use sage_core::{Error, Paths, Session};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn session_in(root: &TempDir) -> Session {
    Session::new(Paths::new(root.path(), root.path()))
}

#[tokio::test]
async fn test_runs_from_repo_root() {
    let root = TempDir::new().unwrap();
    let out = SharedBuffer::default();

    Command::new(&session_in(&root), "pwd")
        .stdout(Sink::Writer(Box::new(out.clone())))
        .run()
        .await
        .unwrap();

    let printed = std::path::PathBuf::from(out.contents().trim());
    assert_eq!(
        printed.canonicalize().unwrap(),
        root.path().canonicalize().unwrap()
    );
}

#[tokio::test]
async fn test_tools_bin_is_first_on_path() {
    let root = TempDir::new().unwrap();
    let bin = root.path().join(".tools").join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    let script = bin.join("hello-tool");
    std::fs::write(&script, "#!/bin/sh\necho from-tools-bin\n").unwrap();
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    let output = Command::new(&session_in(&root), "hello-tool")
        .output()
        .await
        .unwrap();
    assert_eq!(output, "from-tools-bin");
}

#[tokio::test]
async fn test_output_is_trimmed() {
    let root = TempDir::new().unwrap();
    let output = Command::new(&session_in(&root), "sh")
        .args(["-c", "printf '  abc123\\n\\n'"])
        .output()
        .await
        .unwrap();
    assert_eq!(output, "abc123");
}

#[tokio::test]
async fn test_nonzero_exit_is_an_execution_error() {
    let root = TempDir::new().unwrap();
    let err = Command::new(&session_in(&root), "sh")
        .args(["-c", "exit 3"])
        .stderr(Sink::Null)
        .run()
        .await
        .unwrap_err();
    match err {
        Error::Execution { program, code } => {
            assert_eq!(program, "sh");
            assert_eq!(code, Some(3));
        }
        other => panic!("expected execution error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_program_is_an_io_error() {
    let root = TempDir::new().unwrap();
    let err = Command::new(&session_in(&root), "definitely-not-a-real-program-sage")
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}

#[tokio::test]
async fn test_status_quiet() {
    let root = TempDir::new().unwrap();
    let s = session_in(&root);
    assert!(Command::new(&s, "true").status_quiet().await);
    assert!(!Command::new(&s, "false").status_quiet().await);
}

#[tokio::test]
async fn test_env_and_stderr_writer() {
    let root = TempDir::new().unwrap();
    let err = SharedBuffer::default();

    Command::new(&session_in(&root), "sh")
        .args(["-c", "echo \"$GREETING\" 1>&2"])
        .env("GREETING", "hej")
        .stderr(Sink::Writer(Box::new(err.clone())))
        .run()
        .await
        .unwrap();
    assert_eq!(err.contents(), "hej\n");
}

#[tokio::test]
async fn test_cancellation_kills_the_child() {
    let root = TempDir::new().unwrap();
    let s = session_in(&root);
    let canceller = s.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        Command::new(&s, "sleep").arg("30").run(),
    )
    .await
    .expect("cancellation should stop the child")
    .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
    }
}

#[tokio::test]
async fn test_closed_output_does_not_fail_a_successful_command() {
    let root = TempDir::new().unwrap();
    // More output than a pipe buffer holds, so the child blocks unless drained.
    let script = "i=0; while [ $i -lt 20000 ]; do echo line-$i; echo err-$i >&2; i=$((i+1)); done";

    tokio::time::timeout(
        Duration::from_secs(30),
        Command::new(&session_in(&root), "sh")
            .args(["-c", script])
            .stdout(Sink::Writer(Box::new(BrokenPipe)))
            .stderr(Sink::Writer(Box::new(BrokenPipe)))
            .run(),
    )
    .await
    .expect("output must keep draining after the writer closes")
    .unwrap();
}

#[tokio::test]
async fn test_closed_output_keeps_the_exit_status() {
    let root = TempDir::new().unwrap();
    let err = Command::new(&session_in(&root), "sh")
        .args(["-c", "echo partial; exit 4"])
        .stdout(Sink::Writer(Box::new(BrokenPipe)))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Execution { code: Some(4), .. }));
}
