//! balena-cli, the balenaCloud command line.

use std::ffi::OsStr;
use std::sync::Arc;

use sage_core::exec::Command;
use sage_core::tools::{self, Arch, Os, Platform, Tool, ToolDescriptor};
use sage_core::{Error, Result, Session, Task};
use serde::Serialize;

const NAME: &str = "balena-cli";
const BINARY: &str = "balena";
const VERSION: &str = "v13.1.11";
const URL_TEMPLATE: &str = "https://github.com/balena-io/balena-cli/releases/download/{version}/balena-cli-{version}-{os}-{arch}-standalone.zip";

/// The balena-cli tool definition.
///
/// The standalone zip unpacks into a `balena-cli/` directory holding the
/// `balena` launcher next to its bundled runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalenaCli;

impl Tool for BalenaCli {
    fn name(&self) -> &'static str {
        NAME
    }

    fn version(&self) -> &'static str {
        VERSION
    }

    fn description(&self) -> &'static str {
        "balenaCloud command line interface"
    }

    fn descriptor(&self, platform: &Platform) -> Result<ToolDescriptor> {
        let os = crate::os_label(platform.os, &[Os::Linux, Os::Darwin, Os::Windows])?;
        if platform.arch != Arch::Amd64 {
            return Err(Error::platform(format!(
                "unsupported architecture: {} (only x64 builds are published)",
                platform.arch
            )));
        }
        Ok(ToolDescriptor::new(
            NAME,
            VERSION,
            *platform,
            crate::expand_template(URL_TEMPLATE, VERSION, &os, "x64"),
        )
        .with_archive_path(format!("{NAME}/{BINARY}"))
        .with_binary_name(BINARY))
    }
}

/// Account details reported by `balena whoami`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhoamiInfo {
    /// Account username.
    pub username: String,
    /// Account email.
    pub email: String,
    /// balenaCloud URL.
    pub url: String,
}

impl WhoamiInfo {
    /// Parse `balena whoami` output:
    ///
    /// ```text
    /// == ACCOUNT INFORMATION
    /// USERNAME: <username>
    /// EMAIL:    <email>
    /// URL:      balena-cloud.com
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedOutput`] unless exactly three lines follow
    /// the header.
    pub fn parse(output: &str) -> Result<Self> {
        let lines: Vec<&str> = output.trim().lines().skip(1).collect();
        let [username, email, url] = lines.as_slice() else {
            return Err(Error::unexpected_output(BINARY, output));
        };
        Ok(Self {
            username: value_of(username),
            email: value_of(email),
            url: value_of(url),
        })
    }
}

/// Everything after the first `:`, trimmed.
fn value_of(line: &str) -> String {
    line.split_once(':')
        .map_or(line, |(_, value)| value)
        .trim()
        .to_string()
}

/// Task preparing balena-cli.
#[must_use]
pub fn prepare_task() -> Task {
    tools::prepare_task(Arc::new(BalenaCli))
}

/// Prepare balena-cli and build a command running it.
///
/// # Errors
///
/// Returns the preparation failure.
pub async fn command<I, S>(session: &Session, args: I) -> Result<Command>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    tools::command(session, Arc::new(BalenaCli), args).await
}

/// Report the logged-in balenaCloud account.
///
/// # Errors
///
/// Returns the command failure or [`Error::UnexpectedOutput`].
pub async fn whoami(session: &Session) -> Result<WhoamiInfo> {
    let output = command(session, ["whoami"]).await?.output().await?;
    WhoamiInfo::parse(&output)
}
