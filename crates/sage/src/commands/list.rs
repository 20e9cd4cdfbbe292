//! `sage list`

use sage_core::TaskRegistry;
use serde::Serialize;
use std::fmt::Write;

/// A target as shown by `sage list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetInfo {
    /// Target name.
    pub name: String,
    /// One-line description, if any.
    pub description: Option<String>,
}

/// Collect every registered target, sorted by name.
#[must_use]
pub fn execute(registry: &TaskRegistry) -> Vec<TargetInfo> {
    registry
        .iter()
        .map(|task| TargetInfo {
            name: task.id().to_string(),
            description: task.description().map(str::to_string),
        })
        .collect()
}

/// Two aligned columns: name and description.
#[must_use]
pub fn render(targets: &[TargetInfo]) -> String {
    let width = targets.iter().map(|t| t.name.len()).max().unwrap_or(0);
    let mut out = String::new();
    for target in targets {
        let description = target.description.as_deref().unwrap_or("");
        let _ = writeln!(out, "{:width$}  {description}", target.name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sage_core::{Session, Task};

    #[test]
    fn test_lists_sorted_with_descriptions() {
        let mut registry = TaskRegistry::new();
        registry.register(
            Task::new("zeta", |_s: Session| async { Ok(()) }).with_description("last"),
        );
        registry.register(Task::new("alpha", |_s: Session| async { Ok(()) }));

        let targets = execute(&registry);
        assert_eq!(
            targets,
            vec![
                TargetInfo {
                    name: "alpha".into(),
                    description: None
                },
                TargetInfo {
                    name: "zeta".into(),
                    description: Some("last".into())
                },
            ]
        );
        assert_eq!(render(&targets), "alpha  \nzeta   last\n");
    }
}
