//! sops, the secrets editor.

use std::ffi::OsStr;
use std::sync::Arc;

use sage_core::exec::Command;
use sage_core::tools::{self, ArchiveKind, Os, Platform, Tool, ToolDescriptor};
use sage_core::{Result, Session, Task};

const NAME: &str = "sops";
const VERSION: &str = "3.7.1";
const URL_TEMPLATE: &str =
    "https://github.com/mozilla/sops/releases/download/v{version}/sops-v{version}.{os}";

/// The sops tool definition. Released as a bare binary per OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sops;

impl Tool for Sops {
    fn name(&self) -> &'static str {
        NAME
    }

    fn version(&self) -> &'static str {
        VERSION
    }

    fn description(&self) -> &'static str {
        "Editor of encrypted files"
    }

    fn descriptor(&self, platform: &Platform) -> Result<ToolDescriptor> {
        let os = crate::os_label(platform.os, &[Os::Linux, Os::Darwin])?;
        let asset = format!("sops-v{VERSION}.{os}");
        Ok(ToolDescriptor::new(
            NAME,
            VERSION,
            *platform,
            crate::expand_template(URL_TEMPLATE, VERSION, &os, ""),
        )
        .with_archive(ArchiveKind::Raw)
        .with_rename_from(asset))
    }
}

/// Task preparing sops.
#[must_use]
pub fn prepare_task() -> Task {
    tools::prepare_task(Arc::new(Sops))
}

/// Prepare sops and build a command running it.
///
/// # Errors
///
/// Returns the preparation failure.
pub async fn command<I, S>(session: &Session, args: I) -> Result<Command>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    tools::command(session, Arc::new(Sops), args).await
}
