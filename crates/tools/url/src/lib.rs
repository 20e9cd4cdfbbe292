//! Release-URL tool fetcher for sage.
//!
//! Downloads a pinned tool from its release URL into
//! `<tools>/<name>/<version>/`, then:
//! - unpacks raw binaries, zip archives or gzip tarballs
//! - renames the extracted entry if the release names it differently
//! - marks the binary executable
//! - points `<tools>/bin/<binary>` at it
//!
//! Preparation is skipped when the versioned binary already exists, so
//! repeated runs never touch the network.

mod error;
mod extract;
mod install;

pub use error::FetchError;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;
use sage_core::tools::{Acquirer, PreparedTool, ToolDescriptor};
use sage_core::{Error, Result};
use tracing::{debug, info};

/// Tool acquirer that downloads release assets over HTTPS.
#[derive(Debug, Clone)]
pub struct UrlFetcher {
    client: Client,
    tools_dir: PathBuf,
    force_refetch: bool,
}

impl UrlFetcher {
    /// Create a fetcher writing into `tools_dir`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be
    /// initialised (TLS backend failure).
    pub fn new(tools_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("sage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            tools_dir: tools_dir.into(),
            force_refetch: false,
        })
    }

    /// Download even when the versioned binary already exists.
    #[must_use]
    pub fn with_force_refetch(mut self, force: bool) -> Self {
        self.force_refetch = force;
        self
    }

    /// The tools cache root.
    #[must_use]
    pub fn tools_dir(&self) -> &Path {
        &self.tools_dir
    }

    async fn download(&self, url: &str) -> error::Result<Vec<u8>> {
        debug!(%url, "Downloading release asset");

        let mut request = self.client.get(url);
        if let Some(token) = auth_token() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn fetch(&self, descriptor: &ToolDescriptor) -> error::Result<()> {
        info!(
            tool = %descriptor.name,
            version = %descriptor.version,
            url = %descriptor.url,
            "Downloading tool"
        );
        let data = self.download(&descriptor.url).await?;

        let dest = descriptor.destination_dir(&self.tools_dir);
        let owned = descriptor.clone();
        tokio::task::spawn_blocking(move || extract::unpack(&data, &owned, &dest))
            .await
            .map_err(|e| FetchError::Join(e.to_string()))?
    }

    async fn install(&self, descriptor: &ToolDescriptor, downloaded: bool) -> error::Result<PreparedTool> {
        let binary_path = descriptor.binary_path(&self.tools_dir);
        let symlink_path = descriptor.symlink_path(&self.tools_dir);

        install::make_executable(&binary_path)?;
        install::replace_symlink(&binary_path, &symlink_path)?;
        let sha256 = install::sha256_file(&binary_path).await?;

        debug!(
            tool = %descriptor.name,
            binary = %binary_path.display(),
            %sha256,
            "Tool installed"
        );
        Ok(PreparedTool {
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            binary_path,
            symlink_path,
            sha256,
            downloaded,
        })
    }
}

#[async_trait]
impl Acquirer for UrlFetcher {
    async fn prepare(&self, descriptor: &ToolDescriptor) -> Result<PreparedTool> {
        let downloaded = if self.is_prepared(descriptor) && !self.force_refetch {
            debug!(tool = %descriptor.name, version = %descriptor.version, "Tool already present");
            false
        } else {
            self.fetch(descriptor)
                .await
                .map_err(|e| e.into_tool_error(&descriptor.name))?;
            true
        };

        self.install(descriptor, downloaded)
            .await
            .map_err(|e| e.into_tool_error(&descriptor.name))
    }

    fn is_prepared(&self, descriptor: &ToolDescriptor) -> bool {
        descriptor.binary_path(&self.tools_dir).is_file()
    }
}

/// Bearer token for release downloads, if configured.
fn auth_token() -> Option<String> {
    ["GITHUB_TOKEN", "GH_TOKEN"]
        .into_iter()
        .find_map(|key| std::env::var(key).ok().filter(|token| !token.is_empty()))
}
