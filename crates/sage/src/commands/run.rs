//! `sage run`: resolve target names and run them in order.

use crate::cli::CliError;
use sage_core::{Session, Task, TaskRegistry};
use serde::Serialize;
use std::time::Instant;
use tracing::info;

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Targets run, in order.
    pub targets: Vec<String>,
    /// Wall-clock duration of the whole run.
    pub duration_ms: u64,
}

/// Run `names` one after another.
///
/// Every name is resolved before anything runs, so a typo fails fast.
///
/// # Errors
///
/// Returns a configuration error for unknown names, otherwise the first
/// failing target.
pub async fn execute(
    session: &Session,
    registry: &TaskRegistry,
    names: &[String],
) -> Result<RunReport, CliError> {
    let tasks = names
        .iter()
        .map(|name| registry.resolve(name))
        .collect::<sage_core::Result<Vec<Task>>>()?;

    let started = Instant::now();
    session.serial_deps(&tasks).await?;
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(targets = ?names, duration_ms, "Targets completed");

    Ok(RunReport {
        targets: names.to_vec(),
        duration_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{EXIT_CLI, EXIT_TASK, exit_code_for};
    use sage_core::{Error, Paths, TaskState};
    use std::sync::{Arc, Mutex};

    fn recording(id: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Task {
        let log = Arc::clone(log);
        Task::new(id, move |_session: Session| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(id);
                Ok(())
            }
        })
    }

    fn session() -> Session {
        Session::new(Paths::new("/repo", "/repo"))
    }

    #[tokio::test]
    async fn test_targets_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = TaskRegistry::new();
        registry.register(recording("b", &log));
        registry.register(recording("a", &log));

        let report = execute(&session(), &registry, &["b".into(), "a".into()])
            .await
            .unwrap();
        assert_eq!(report.targets, vec!["b", "a"]);
        assert_eq!(*log.lock().unwrap(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_unknown_target_runs_nothing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = TaskRegistry::new();
        registry.register(recording("a", &log));

        let session = session();
        let err = execute(&session, &registry, &["a".into(), "nope".into()])
            .await
            .unwrap_err();
        assert_eq!(exit_code_for(&err), EXIT_CLI);
        assert!(log.lock().unwrap().is_empty());
        assert!(matches!(session.outcome(&"a".into()), TaskState::Pending));
    }

    #[tokio::test]
    async fn test_failing_target_stops_the_run() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = TaskRegistry::new();
        registry.register(Task::new("broken", |_session: Session| async {
            Err(Error::execution("cargo", Some(101)))
        }));
        registry.register(recording("after", &log));

        let err = execute(&session(), &registry, &["broken".into(), "after".into()])
            .await
            .unwrap_err();
        assert_eq!(exit_code_for(&err), EXIT_TASK);
        assert!(err.to_string().contains("cargo exited with code 101"));
        assert!(log.lock().unwrap().is_empty());
    }
}
