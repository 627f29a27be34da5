//! Collaborators outside the scheduling core.
//!
//! The editor connection ([`WorkspaceHost`]) and configuration file reads
//! ([`ConfigFileReader`]) are traits so the core can run against an LSP
//! client or against in-process fakes.

use std::path::PathBuf;

use parking_lot::RwLock;
use thiserror::Error;
use tower_lsp::Client;
use tower_lsp::lsp_types::{ConfigurationItem, Diagnostic, Url, WorkspaceFolder};
use tracing::debug;

use spellgate_config::{Settings, load_settings_files};

/// Errors reported by the editor side.
#[derive(Debug, Error)]
pub enum HostError {
    /// The request could not be delivered or was rejected.
    #[error("Host request failed: {0}")]
    Request(String),

    /// The response had an unexpected shape.
    #[error("Failed to decode host response: {0}")]
    Decode(String),
}

impl HostError {
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

/// Editor-side operations used by the core.
#[tower_lsp::async_trait]
pub trait WorkspaceHost: Send + Sync + 'static {
    /// Current workspace folders.
    async fn workspace_folders(&self) -> Result<Vec<WorkspaceFolder>, HostError>;

    /// Host settings for `section`, scoped to `scope` when given.
    async fn configuration(
        &self,
        scope: Option<&Url>,
        section: &str,
    ) -> Result<serde_json::Value, HostError>;

    /// Publishes diagnostics for one document.
    async fn publish_diagnostics(&self, uri: Url, diagnostics: Vec<Diagnostic>, version: Option<i32>);

    /// Folders announced in `initialize`, used when the host cannot list them later.
    fn set_initial_folders(&self, _folders: Vec<WorkspaceFolder>) {}
}

/// Reads configuration files and merges them in order.
#[tower_lsp::async_trait]
pub trait ConfigFileReader: Send + Sync + 'static {
    /// Missing files are skipped, never merged.
    async fn read_files(&self, paths: Vec<PathBuf>) -> Settings;
}

/// [`WorkspaceHost`] backed by the LSP client connection.
pub struct ClientHost {
    client: Client,
    initial_folders: RwLock<Vec<WorkspaceFolder>>,
}

impl ClientHost {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            initial_folders: RwLock::new(Vec::new()),
        }
    }
}

#[tower_lsp::async_trait]
impl WorkspaceHost for ClientHost {
    async fn workspace_folders(&self) -> Result<Vec<WorkspaceFolder>, HostError> {
        match self.client.workspace_folders().await {
            Ok(Some(folders)) => Ok(folders),
            Ok(None) => Ok(self.initial_folders.read().clone()),
            Err(e) => {
                debug!("workspace/workspaceFolders failed, using initial folders: {}", e);
                Ok(self.initial_folders.read().clone())
            }
        }
    }

    async fn configuration(
        &self,
        scope: Option<&Url>,
        section: &str,
    ) -> Result<serde_json::Value, HostError> {
        let item = ConfigurationItem {
            scope_uri: scope.cloned(),
            section: Some(section.to_string()),
        };

        let values = self
            .client
            .configuration(vec![item])
            .await
            .map_err(|e| HostError::request(e.to_string()))?;

        Ok(values.into_iter().next().unwrap_or(serde_json::Value::Null))
    }

    async fn publish_diagnostics(&self, uri: Url, diagnostics: Vec<Diagnostic>, version: Option<i32>) {
        self.client
            .publish_diagnostics(uri, diagnostics, version)
            .await;
    }

    fn set_initial_folders(&self, folders: Vec<WorkspaceFolder>) {
        *self.initial_folders.write() = folders;
    }
}

/// [`ConfigFileReader`] that reads from the local file system.
///
/// Parsing is offloaded to `spawn_blocking` to keep file I/O off the
/// async runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsConfigReader;

#[tower_lsp::async_trait]
impl ConfigFileReader for FsConfigReader {
    async fn read_files(&self, paths: Vec<PathBuf>) -> Settings {
        tokio::task::spawn_blocking(move || load_settings_files(&paths))
            .await
            .unwrap_or_else(|e| {
                debug!("Config read task failed: {}", e);
                Settings::new()
            })
    }
}
