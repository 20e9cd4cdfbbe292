//! Pinned tool definitions for sage.
//!
//! Each module is a parameter table for one tool: the pinned version, the
//! release URL template and the per-platform labels that fill it in. Every
//! tool exposes a `prepare_task()` for dependency lists and a `command()`
//! that prepares the tool and returns a ready-to-run
//! [`Command`](sage_core::exec::Command).
//!
//! ```ignore
//! let cmd = sage_tools_catalog::convco::command(&session, ["check", "origin/master..HEAD"]).await?;
//! cmd.run().await?;
//! ```

pub mod balena;
pub mod convco;
pub mod git;
pub mod protoscrubber;
pub mod sops;
pub mod spanner_aip_go;

use sage_core::tools::{Os, ToolCatalog};
use sage_core::{Error, Result};

/// Every downloadable tool in this crate.
#[must_use]
pub fn catalog() -> ToolCatalog {
    let mut catalog = ToolCatalog::new();
    catalog.register(balena::BalenaCli);
    catalog.register(convco::Convco);
    catalog.register(protoscrubber::ProtoScrubber);
    catalog.register(sops::Sops);
    catalog.register(spanner_aip_go::SpannerAipGo);
    catalog
}

/// Fill `{version}`, `{os}` and `{arch}` placeholders.
pub(crate) fn expand_template(template: &str, version: &str, os: &str, arch: &str) -> String {
    template
        .replace("{version}", version)
        .replace("{os}", os)
        .replace("{arch}", arch)
}

/// Label `os` using the Go spelling, rejecting anything outside `supported`.
pub(crate) fn os_label(os: Os, supported: &[Os]) -> Result<String> {
    if supported.contains(&os) {
        Ok(os.to_string())
    } else {
        Err(Error::platform(format!("unsupported OS: {os}")))
    }
}
