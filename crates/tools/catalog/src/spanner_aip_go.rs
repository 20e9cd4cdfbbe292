//! spanner-aip-go, the Cloud Spanner code generator.

use std::ffi::OsStr;
use std::sync::Arc;

use sage_core::exec::Command;
use sage_core::tools::{self, Os, Platform, Tool, ToolDescriptor};
use sage_core::{Result, Session, Task};

const NAME: &str = "spanner-aip-go";
const VERSION: &str = "0.40.0";
const URL_TEMPLATE: &str = "https://github.com/einride/spanner-aip-go/releases/download/v{version}/spanner-aip-go_{version}_{os}_{arch}.tar.gz";

/// The spanner-aip-go tool definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpannerAipGo;

impl Tool for SpannerAipGo {
    fn name(&self) -> &'static str {
        NAME
    }

    fn version(&self) -> &'static str {
        VERSION
    }

    fn description(&self) -> &'static str {
        "Generates Go code for Cloud Spanner schemas"
    }

    fn descriptor(&self, platform: &Platform) -> Result<ToolDescriptor> {
        let os = crate::os_label(platform.os, &[Os::Linux, Os::Darwin])?;
        Ok(ToolDescriptor::new(
            NAME,
            VERSION,
            *platform,
            crate::expand_template(URL_TEMPLATE, VERSION, &os, platform.arch.x86_64_alias()),
        ))
    }
}

/// Task preparing spanner-aip-go.
#[must_use]
pub fn prepare_task() -> Task {
    tools::prepare_task(Arc::new(SpannerAipGo))
}

/// Prepare spanner-aip-go and build a command running it.
///
/// # Errors
///
/// Returns the preparation failure.
pub async fn command<I, S>(session: &Session, args: I) -> Result<Command>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    tools::command(session, Arc::new(SpannerAipGo), args).await
}
