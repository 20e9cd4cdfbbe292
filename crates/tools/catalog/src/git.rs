//! git helpers. git itself is expected on `PATH`.

use std::ffi::OsStr;

use sage_core::exec::Command;
use sage_core::{Error, Result, Session, Task};
use tracing::debug;

const DIRTY_SUFFIX: &str = "-dirty";

/// A git command run from the repository root.
pub fn command<I, S>(session: &Session, args: I) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Command::new(session, "git").args(args)
}

/// Fail if the build left tracked changes behind.
///
/// # Errors
///
/// Returns [`Error::Verification`] carrying the diff when tracked files
/// differ from the index.
pub async fn verify_no_diff(session: &Session) -> Result<()> {
    let status = porcelain_status(session).await?;
    if status.is_empty() {
        return Ok(());
    }
    let diff = command(session, ["diff", "--patch"]).output().await?;
    if diff.is_empty() {
        debug!(%status, "Only untracked changes present");
        return Ok(());
    }
    Err(Error::verification(
        format!("staging area is dirty:\n{diff}"),
        "Add all files created by the build to .gitignore",
    ))
}

/// Task wrapping [`verify_no_diff`].
#[must_use]
pub fn verify_no_diff_task() -> Task {
    Task::new("git-verify-no-diff", |session: Session| async move {
        verify_no_diff(&session).await
    })
    .with_description("Verify that the build left no tracked changes")
}

/// Full SHA of `HEAD`, suffixed with `-dirty` when the tree has changes.
///
/// # Errors
///
/// Returns the git failure.
pub async fn sha(session: &Session) -> Result<String> {
    revision(session, &["rev-parse", "--verify", "HEAD"]).await
}

/// Abbreviated SHA of `HEAD`, suffixed with `-dirty` when the tree has changes.
///
/// # Errors
///
/// Returns the git failure.
pub async fn short_sha(session: &Session) -> Result<String> {
    revision(session, &["rev-parse", "--verify", "--short", "HEAD"]).await
}

async fn revision(session: &Session, args: &[&str]) -> Result<String> {
    let mut revision = command(session, args).output().await?;
    if !porcelain_status(session).await?.is_empty() {
        revision.push_str(DIRTY_SUFFIX);
    }
    Ok(revision)
}

async fn porcelain_status(session: &Session) -> Result<String> {
    command(session, ["status", "--porcelain"]).output().await
}
