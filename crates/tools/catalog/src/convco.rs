//! convco, the conventional commits checker.

use std::ffi::OsStr;
use std::sync::Arc;

use sage_core::exec::Command;
use sage_core::tools::{self, Os, Platform, Tool, ToolDescriptor};
use sage_core::{Error, Result, Session, Task};

const NAME: &str = "convco";
const VERSION: &str = "0.3.7";
const URL_TEMPLATE: &str =
    "https://github.com/convco/convco/releases/download/v{version}/convco-{os}.zip";

/// The convco tool definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct Convco;

impl Tool for Convco {
    fn name(&self) -> &'static str {
        NAME
    }

    fn version(&self) -> &'static str {
        VERSION
    }

    fn description(&self) -> &'static str {
        "Conventional commits checker and changelog generator"
    }

    fn descriptor(&self, platform: &Platform) -> Result<ToolDescriptor> {
        // Releases are labelled by CI runner image rather than OS.
        let os = match platform.os {
            Os::Linux => "ubuntu",
            Os::Darwin => "macos",
            Os::Windows => {
                return Err(Error::platform(format!("unsupported OS: {}", platform.os)));
            }
        };
        Ok(ToolDescriptor::new(
            NAME,
            VERSION,
            *platform,
            crate::expand_template(URL_TEMPLATE, VERSION, os, ""),
        ))
    }
}

/// Task preparing convco.
#[must_use]
pub fn prepare_task() -> Task {
    tools::prepare_task(Arc::new(Convco))
}

/// Prepare convco and build a command running it.
///
/// # Errors
///
/// Returns the preparation failure.
pub async fn command<I, S>(session: &Session, args: I) -> Result<Command>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    tools::command(session, Arc::new(Convco), args).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sage_core::tools::{ArchiveKind, Arch};

    #[test]
    fn test_urls_per_platform() {
        let cases = [
            (Os::Linux, Arch::Amd64, "convco-ubuntu.zip"),
            (Os::Linux, Arch::Arm64, "convco-ubuntu.zip"),
            (Os::Darwin, Arch::Amd64, "convco-macos.zip"),
            (Os::Darwin, Arch::Arm64, "convco-macos.zip"),
        ];
        for (os, arch, asset) in cases {
            let d = Convco.descriptor(&Platform::new(os, arch)).unwrap();
            assert_eq!(
                d.url,
                format!("https://github.com/convco/convco/releases/download/v0.3.7/{asset}")
            );
            assert_eq!(d.archive, ArchiveKind::Zip);
            assert_eq!(d.binary_name, "convco");
        }
    }

    #[test]
    fn test_windows_is_unsupported() {
        let err = Convco
            .descriptor(&Platform::new(Os::Windows, Arch::Amd64))
            .unwrap_err();
        assert!(matches!(err, Error::Platform { ref message } if message == "unsupported OS: windows"));
    }

    #[test]
    fn test_prepare_task_id() {
        assert_eq!(prepare_task().id().as_str(), "prepare:convco");
    }
}
