//! google-cloud-proto-scrubber, which strips Google Cloud annotations from protos.

use std::ffi::OsStr;
use std::sync::Arc;

use sage_core::exec::Command;
use sage_core::tools::{self, Os, Platform, Tool, ToolDescriptor};
use sage_core::{Result, Session, Task};

const NAME: &str = "google-cloud-proto-scrubber";
const VERSION: &str = "1.1.0";
const URL_TEMPLATE: &str = "https://github.com/einride/google-cloud-proto-scrubber/releases/download/v{version}/google-cloud-proto-scrubber_{version}_{os}_{arch}.tar.gz";

/// The google-cloud-proto-scrubber tool definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtoScrubber;

impl Tool for ProtoScrubber {
    fn name(&self) -> &'static str {
        NAME
    }

    fn version(&self) -> &'static str {
        VERSION
    }

    fn description(&self) -> &'static str {
        "Scrubs Google Cloud annotations from protobuf descriptors"
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

/// Task preparing google-cloud-proto-scrubber.
#[must_use]
pub fn prepare_task() -> Task {
    tools::prepare_task(Arc::new(ProtoScrubber))
}

/// Prepare google-cloud-proto-scrubber and build a command running it.
///
/// # Errors
///
/// Returns the preparation failure.
pub async fn command<I, S>(session: &Session, args: I) -> Result<Command>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    tools::command(session, Arc::new(ProtoScrubber), args).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sage_core::tools::{Arch, ArchiveKind};

    #[test]
    fn test_urls_per_platform() {
        let base = "https://github.com/einride/google-cloud-proto-scrubber/releases/download/v1.1.0";
        let cases = [
            (Os::Linux, Arch::Amd64, "linux_x86_64"),
            (Os::Linux, Arch::Arm64, "linux_arm64"),
            (Os::Darwin, Arch::Amd64, "darwin_x86_64"),
            (Os::Darwin, Arch::Arm64, "darwin_arm64"),
        ];
        for (os, arch, suffix) in cases {
            let d = ProtoScrubber.descriptor(&Platform::new(os, arch)).unwrap();
            assert_eq!(
                d.url,
                format!("{base}/google-cloud-proto-scrubber_1.1.0_{suffix}.tar.gz")
            );
            assert_eq!(d.archive, ArchiveKind::TarGz);
        }
    }

    #[test]
    fn test_windows_is_unsupported() {
        assert!(
            ProtoScrubber
                .descriptor(&Platform::new(Os::Windows, Arch::Amd64))
                .is_err()
        );
    }
}
