//! Name-to-task lookup for the CLI.

use std::collections::BTreeMap;

use super::{Task, TaskId};
use crate::{Error, Result};

/// Registry of runnable tasks keyed by identifier.
#[derive(Debug, Default, Clone)]
pub struct TaskRegistry {
    tasks: BTreeMap<TaskId, Task>,
}

impl TaskRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task.
    ///
    /// If a task with the same identifier already exists, it will be replaced.
    pub fn register(&mut self, task: Task) {
        self.tasks.insert(task.id().clone(), task);
    }

    /// Get a task by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(&TaskId::from(name))
    }

    /// Resolve a task by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTask`] listing the registered names.
    pub fn resolve(&self, name: &str) -> Result<Task> {
        self.get(name).cloned().ok_or_else(|| Error::UnknownTask {
            name: name.to_string(),
            help: Some(format!("Available tasks: {}", self.names().join(", "))),
        })
    }

    /// Iterate over all tasks in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Get the number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Get all task names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tasks.keys().map(TaskId::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Session;

    fn noop(id: &str) -> Task {
        Task::new(id, |_s: Session| async { Ok(()) })
    }

    #[test]
    fn test_registry_register_and_resolve() {
        let mut registry = TaskRegistry::new();
        assert!(registry.is_empty());
        registry.register(noop("default"));
        registry.register(noop("convco-check"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["convco-check", "default"]);
        assert_eq!(registry.resolve("default").unwrap().id().as_str(), "default");
    }

    #[test]
    fn test_registry_unknown_task_lists_names() {
        let mut registry = TaskRegistry::new();
        registry.register(noop("default"));

        match registry.resolve("deploy").unwrap_err() {
            Error::UnknownTask { name, help } => {
                assert_eq!(name, "deploy");
                assert!(help.unwrap().contains("default"));
            }
            other => panic!("expected unknown task, got {other:?}"),
        }
    }
}
