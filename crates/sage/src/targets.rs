//! Build targets for this repository.
//!
//! `default` checks commit messages, formatting, lints and tests in
//! parallel, then verifies the build left no tracked changes.

use sage_core::exec::Command;
use sage_core::tools::prepare_task;
use sage_core::{Session, Task, TaskRegistry};
use sage_tools_catalog::{catalog, convco, git};

/// Commit range checked by `convco-check`.
const CONVCO_RANGE: &str = "origin/master..HEAD";

/// Every target `sage run` and `sage list` know about, including the
/// `prepare:<tool>` task of each catalog tool.
#[must_use]
pub fn registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry.register(default());
    registry.register(convco_check());
    registry.register(cargo_fmt());
    registry.register(cargo_clippy());
    registry.register(cargo_test());
    registry.register(git::verify_no_diff_task());
    for tool in catalog().iter() {
        registry.register(prepare_task(tool.clone()));
    }
    registry
}

/// The default target.
#[must_use]
pub fn default() -> Task {
    Task::new("default", |session: Session| async move {
        session
            .deps(&[convco_check(), cargo_fmt(), cargo_clippy(), cargo_test()])
            .await?;
        session.serial_deps(&[git::verify_no_diff_task()]).await
    })
    .with_description("Check commits, format, lint and test, then verify a clean tree")
}

/// Check that commits since master follow Conventional Commits.
#[must_use]
pub fn convco_check() -> Task {
    Task::new("convco-check", |session: Session| async move {
        convco::command(&session, ["check", CONVCO_RANGE])
            .await?
            .run()
            .await
    })
    .with_description("Check commit messages with convco")
}

/// Check Rust formatting.
#[must_use]
pub fn cargo_fmt() -> Task {
    cargo_task(
        "cargo-fmt",
        &["fmt", "--all", "--", "--check"],
        "Check formatting with rustfmt",
    )
}

/// Lint with clippy, denying warnings.
#[must_use]
pub fn cargo_clippy() -> Task {
    cargo_task(
        "cargo-clippy",
        &[
            "clippy",
            "--workspace",
            "--all-targets",
            "--",
            "-D",
            "warnings",
        ],
        "Lint with clippy",
    )
}

/// Run the workspace tests.
#[must_use]
pub fn cargo_test() -> Task {
    cargo_task("cargo-test", &["test", "--workspace"], "Run workspace tests")
}

fn cargo_task(id: &str, args: &'static [&'static str], description: &str) -> Task {
    Task::new(id, move |session: Session| async move {
        Command::new(&session, "cargo").args(args).run().await
    })
    .with_description(description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names() {
        let registry = registry();
        let names = registry.names();
        for expected in [
            "default",
            "convco-check",
            "cargo-fmt",
            "cargo-clippy",
            "cargo-test",
            "git-verify-no-diff",
            "prepare:convco",
            "prepare:sops",
            "prepare:balena-cli",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn test_every_target_is_described() {
        for task in registry().iter() {
            assert!(task.description().is_some(), "{} has no description", task.id());
        }
    }
}
