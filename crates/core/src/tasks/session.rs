//! The run-scoped session: memo table, cancellation and task context.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use tokio::sync::OnceCell;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info_span};

use super::{Task, TaskId};
use crate::tools::{Acquirer, Platform};
use crate::{Error, Paths, Result};

/// Name used for log prefixes outside any task.
const ROOT_NAME: &str = "sage";

type Outcome = std::result::Result<(), Arc<Error>>;

/// Observable state of a task within a session.
#[derive(Debug, Clone)]
pub enum TaskState {
    /// Never requested.
    Pending,
    /// Body currently executing.
    Running,
    /// Body returned successfully.
    Completed,
    /// Body returned an error; every requester receives it.
    Failed(Arc<Error>),
}

#[derive(Default)]
struct Slot {
    started: AtomicBool,
    cell: OnceCell<Outcome>,
}

struct Shared {
    paths: Paths,
    platform: Option<Platform>,
    acquirer: Option<Arc<dyn Acquirer>>,
    cancel: CancellationToken,
    slots: Mutex<HashMap<TaskId, Arc<Slot>>>,
    /// Wait-for edges: (waiting task, task it awaits).
    waits: Mutex<Vec<(TaskId, TaskId)>>,
}

/// Removes its wait-for edge once the waiter stops waiting.
struct WaitEdge {
    shared: Arc<Shared>,
    edge: (TaskId, TaskId),
}

impl Drop for WaitEdge {
    fn drop(&mut self) {
        let mut waits = self
            .shared
            .waits
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = waits.iter().position(|edge| *edge == self.edge) {
            waits.swap_remove(pos);
        }
    }
}

/// Run-scoped context passed to every task body.
///
/// Clones share the memo table and cancellation token; each clone also
/// knows the chain of tasks that led to it, which names log output and
/// detects dependency cycles.
///
/// Every wait on another task is recorded as a wait-for edge. A request that
/// would close a loop of edges, whether along one requester chain or across
/// parallel siblings, fails with [`Error::CycleDetected`] instead of waiting.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
    chain: Arc<[TaskId]>,
}

/// Builder for [`Session`].
#[must_use]
pub struct SessionBuilder {
    paths: Paths,
    platform: Option<Platform>,
    acquirer: Option<Arc<dyn Acquirer>>,
    cancel: Option<CancellationToken>,
}

impl SessionBuilder {
    /// Pin the platform used for tool descriptors instead of detecting it.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Set the tool acquirer used by preparation tasks.
    pub fn acquirer(mut self, acquirer: Arc<dyn Acquirer>) -> Self {
        self.acquirer = Some(acquirer);
        self
    }

    /// Share an existing cancellation token.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Build the session.
    pub fn build(self) -> Session {
        Session {
            shared: Arc::new(Shared {
                paths: self.paths,
                platform: self.platform,
                acquirer: self.acquirer,
                cancel: self.cancel.unwrap_or_default(),
                slots: Mutex::new(HashMap::new()),
                waits: Mutex::new(Vec::new()),
            }),
            chain: Arc::from([]),
        }
    }
}

impl Session {
    /// Start building a session over a path layout.
    pub fn builder(paths: Paths) -> SessionBuilder {
        SessionBuilder {
            paths,
            platform: None,
            acquirer: None,
            cancel: None,
        }
    }

    /// Create a session with defaults: detected platform, no acquirer.
    #[must_use]
    pub fn new(paths: Paths) -> Self {
        Self::builder(paths).build()
    }

    /// The path layout.
    #[must_use]
    pub fn paths(&self) -> &Paths {
        &self.shared.paths
    }

    /// The platform tools are prepared for.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Platform`] if the host is not supported and no
    /// platform was pinned.
    pub fn platform(&self) -> Result<Platform> {
        match self.shared.platform {
            Some(platform) => Ok(platform),
            None => Platform::current(),
        }
    }

    /// The tool acquirer.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the session was built without one.
    pub fn acquirer(&self) -> Result<&Arc<dyn Acquirer>> {
        self.shared.acquirer.as_ref().ok_or_else(|| {
            Error::configuration("No tool acquirer configured for this session")
        })
    }

    /// Name of the task this session handle belongs to.
    #[must_use]
    pub fn task_name(&self) -> &str {
        self.chain.last().map_or(ROOT_NAME, TaskId::as_str)
    }

    /// Prefix for log lines emitted on behalf of the current task.
    #[must_use]
    pub fn log_prefix(&self) -> String {
        format!("[{}] ", self.task_name())
    }

    /// Cancel the session; pending waits return [`Error::Cancelled`].
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
    }

    /// Whether the session has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// The session's cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.shared.cancel
    }

    /// Run a single root task.
    ///
    /// # Errors
    ///
    /// Returns the task's failure wrapped with its identifier.
    pub async fn run(&self, task: &Task) -> Result<()> {
        self.resolve(task).await
    }

    /// Run tasks concurrently and wait for all of them.
    ///
    /// A failing task does not cancel its siblings.
    ///
    /// # Errors
    ///
    /// Returns the single failure, or [`Error::Aggregate`] listing every
    /// failure in declared order.
    pub async fn deps(&self, tasks: &[Task]) -> Result<()> {
        let mut join_set = JoinSet::new();
        for (index, task) in tasks.iter().enumerate() {
            let session = self.clone();
            let task = task.clone();
            join_set.spawn(async move { (index, session.resolve(&task).await) });
        }

        let mut failures = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((index, Err(err))) => failures.push((index, err)),
                Err(e) => failures.push((usize::MAX, Error::panicked(e.to_string()))),
            }
        }
        failures.sort_by_key(|(index, _)| *index);
        Error::collapse(failures.into_iter().map(|(_, err)| err).collect())
    }

    /// Run tasks one at a time in declared order.
    ///
    /// # Errors
    ///
    /// Returns the first failure; later tasks never start.
    pub async fn serial_deps(&self, tasks: &[Task]) -> Result<()> {
        for task in tasks {
            self.resolve(task).await?;
        }
        Ok(())
    }

    /// Report a task's state in this session.
    #[must_use]
    pub fn outcome(&self, id: &TaskId) -> TaskState {
        let slot = self
            .shared
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned();
        match slot {
            None => TaskState::Pending,
            Some(slot) => match slot.cell.get() {
                Some(Ok(())) => TaskState::Completed,
                Some(Err(err)) => TaskState::Failed(Arc::clone(err)),
                None if slot.started.load(Ordering::SeqCst) => TaskState::Running,
                None => TaskState::Pending,
            },
        }
    }

    async fn resolve(&self, task: &Task) -> Result<()> {
        let id = task.id().clone();
        if self.chain.contains(&id) {
            let chain = self
                .chain
                .iter()
                .chain(std::iter::once(&id))
                .map(TaskId::as_str)
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(Error::CycleDetected { chain });
        }

        let slot = self.slot(&id);
        if let Some(outcome) = slot.cell.get() {
            return outcome
                .clone()
                .map_err(|cause| Error::task(id.as_str(), cause));
        }
        let _edge = self.wait_on(&id)?;

        let child = self.enter(id.clone());
        let cancel = self.shared.cancel.clone();
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            outcome = slot.cell.get_or_init(|| child.execute(task, &slot)) => outcome.clone(),
        };
        outcome.map_err(|cause| Error::task(id.as_str(), cause))
    }

    async fn execute(&self, task: &Task, slot: &Slot) -> Outcome {
        slot.started.store(true, Ordering::SeqCst);
        let id = task.id();
        debug!(task = %id, "Starting task");

        // A panicking body fails the task like any other error, so the cell
        // is still initialised and the body never runs a second time.
        let result = AssertUnwindSafe(
            task.invoke(self.clone())
                .instrument(info_span!("task", task = %id)),
        )
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(Error::panicked(panic_message(payload.as_ref()))));

        match result {
            Ok(()) => {
                debug!(task = %id, "Task completed");
                Ok(())
            }
            Err(err) => {
                // Wrapped dependency failures were already logged where they originated.
                if err.is_origin() && !err.is_cancelled() {
                    error!(task = %id, error = %err, "Task failed");
                }
                Err(Arc::new(err))
            }
        }
    }

    /// Record that the current task waits on `id`.
    ///
    /// Fails if `id` is already waiting, directly or transitively, on the
    /// current task.
    fn wait_on(&self, id: &TaskId) -> Result<Option<WaitEdge>> {
        let Some(waiter) = self.chain.last() else {
            return Ok(None);
        };
        let mut waits = self
            .shared
            .waits
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(path) = wait_path(&waits, id, waiter) {
            let chain = std::iter::once(waiter)
                .chain(&path)
                .map(TaskId::as_str)
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(Error::CycleDetected { chain });
        }
        let edge = (waiter.clone(), id.clone());
        waits.push(edge.clone());
        Ok(Some(WaitEdge {
            shared: Arc::clone(&self.shared),
            edge,
        }))
    }

    fn slot(&self, id: &TaskId) -> Arc<Slot> {
        let mut slots = self
            .shared
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(id.clone()).or_default())
    }

    fn enter(&self, id: TaskId) -> Self {
        let chain: Vec<TaskId> = self.chain.iter().cloned().chain(std::iter::once(id)).collect();
        Self {
            shared: Arc::clone(&self.shared),
            chain: chain.into(),
        }
    }
}

/// Follow wait-for edges from `from`; returns the path if it reaches `to`.
fn wait_path(edges: &[(TaskId, TaskId)], from: &TaskId, to: &TaskId) -> Option<Vec<TaskId>> {
    let mut seen = HashSet::new();
    let mut stack = vec![vec![from.clone()]];
    while let Some(path) = stack.pop() {
        let Some(last) = path.last() else {
            continue;
        };
        if last == to {
            return Some(path);
        }
        if !seen.insert(last.clone()) {
            continue;
        }
        for (waiter, awaited) in edges {
            if waiter == last {
                let mut next = path.clone();
                next.push(awaited.clone());
                stack.push(next);
            }
        }
    }
    None
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("paths", &self.shared.paths)
            .field("task", &self.task_name())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(Paths::new("/repo", "/repo"))
    }

    #[tokio::test]
    async fn test_task_name_follows_chain() {
        let root = session();
        assert_eq!(root.task_name(), "sage");
        assert_eq!(root.log_prefix(), "[sage] ");

        let task = Task::new("lint", |s: Session| async move {
            assert_eq!(s.task_name(), "lint");
            assert_eq!(s.log_prefix(), "[lint] ");
            Ok(())
        });
        root.run(&task).await.unwrap();
    }

    #[tokio::test]
    async fn test_outcome_reports_terminal_states() {
        let s = session();
        let ok = Task::new("ok", |_s: Session| async { Ok(()) });
        let bad = Task::new("bad", |_s: Session| async { Err(Error::execution("false", Some(1))) });

        assert!(matches!(s.outcome(ok.id()), TaskState::Pending));
        s.run(&ok).await.unwrap();
        assert!(s.run(&bad).await.is_err());

        assert!(matches!(s.outcome(ok.id()), TaskState::Completed));
        match s.outcome(bad.id()) {
            TaskState::Failed(err) => assert!(matches!(*err, Error::Execution { .. })),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_acquirer_missing_is_configuration_error() {
        let err = session().acquirer().err().unwrap();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_self_dependency_is_a_cycle() {
        fn looping() -> Task {
            Task::new("loop", |s: Session| async move { s.deps(&[looping()]).await })
        }

        let err = session().run(&looping()).await.unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("loop -> loop"), "{rendered}");
    }

    #[test]
    fn test_wait_path_follows_edges() {
        let edges: Vec<(TaskId, TaskId)> = vec![
            ("a".into(), "b".into()),
            ("b".into(), "c".into()),
            ("x".into(), "a".into()),
        ];
        let path = wait_path(&edges, &"a".into(), &"c".into()).unwrap();
        let names: Vec<&str> = path.iter().map(TaskId::as_str).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(wait_path(&edges, &"c".into(), &"a".into()).is_none());
    }

    #[test]
    fn test_panic_message_reads_string_payloads() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("bang")), "bang");
        assert_eq!(panic_message(&42_u8), "non-string panic payload");
    }
}
