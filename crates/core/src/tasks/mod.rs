//! Run-once task graph.
//!
//! A [`Task`] is a named async body taking a [`Session`]. Bodies declare
//! their prerequisites by awaiting [`Session::deps`] (parallel) or
//! [`Session::serial_deps`] (ordered); the session guarantees each task
//! body runs at most once and every requester sees the same outcome.
//!
//! ```ignore
//! let fmt = Task::new("cargo-fmt", |s: Session| async move {
//!     Command::new(&s, "cargo").args(["fmt", "--check"]).run().await
//! });
//! let default = Task::new("default", move |s: Session| {
//!     let fmt = fmt.clone();
//!     async move { s.deps(&[fmt]).await }
//! });
//! session.run(&default).await?;
//! ```

mod registry;
mod session;

pub use registry::TaskRegistry;
pub use session::{Session, SessionBuilder, TaskState};

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;

use crate::Result;

/// Stable task identifier, the memoization key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(Arc<str>);

impl TaskId {
    /// Create an identifier.
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

type TaskBody = dyn Fn(Session) -> BoxFuture<'static, Result<()>> + Send + Sync;

/// A named, shareable async task.
///
/// Cloning is cheap; clones share the body and the identifier.
#[derive(Clone)]
pub struct Task {
    id: TaskId,
    description: Option<Arc<str>>,
    body: Arc<TaskBody>,
}

impl Task {
    /// Create a task from an async closure.
    pub fn new<F, Fut>(id: impl Into<TaskId>, body: F) -> Self
    where
        F: Fn(Session) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            id: id.into(),
            description: None,
            body: Arc::new(move |session| body(session).boxed()),
        }
    }

    /// Attach a one-line description shown by `sage list`.
    #[must_use]
    pub fn with_description(mut self, description: impl AsRef<str>) -> Self {
        self.description = Some(Arc::from(description.as_ref()));
        self
    }

    /// The task identifier.
    #[must_use]
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// The description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub(crate) fn invoke(&self, session: Session) -> BoxFuture<'static, Result<()>> {
        (self.body)(session)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_conversions() {
        let a = TaskId::from("prepare:convco");
        let b = TaskId::from(String::from("prepare:convco"));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "prepare:convco");
        assert_eq!(a.to_string(), "prepare:convco");
    }

    #[test]
    fn test_task_clone_shares_identity() {
        let task = Task::new("lint", |_s: Session| async { Ok(()) }).with_description("Run linters");
        let clone = task.clone();
        assert_eq!(clone.id(), task.id());
        assert_eq!(clone.description(), Some("Run linters"));
        assert!(Arc::ptr_eq(&task.body, &clone.body));
    }

    #[test]
    fn test_task_debug_omits_body() {
        let task = Task::new("lint", |_s: Session| async { Ok(()) });
        let debug = format!("{task:?}");
        assert!(debug.contains("lint"));
        assert!(debug.contains(".."));
    }
}
