//! Workspace change handlers.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::*;
use tracing::{debug, info};

use crate::state::BackendState;

/// Method name of the configuration file registration notification.
pub const REGISTER_CONFIG_FILE_METHOD: &str = "spellgate/registerConfigurationFile";

/// Parameters of `spellgate/registerConfigurationFile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterConfigFileParams {
    /// File path or `file:` URI.
    pub path: String,
}

impl RegisterConfigFileParams {
    fn to_path(&self) -> PathBuf {
        Url::parse(&self.path)
            .ok()
            .filter(|uri| uri.scheme() == "file")
            .and_then(|uri| uri.to_file_path().ok())
            .unwrap_or_else(|| PathBuf::from(&self.path))
    }
}

/// Handles the `workspace/didChangeWatchedFiles` notification.
pub async fn handle_did_change_watched_files(
    state: &BackendState,
    params: DidChangeWatchedFilesParams,
) {
    debug!("Watched files changed: {:?}", params.changes);

    if state.reloader.affects_settings(&params.changes) {
        info!("Configuration file changed, reloading...");
        state.reloader.request_reset();
    }
}

/// Handles the `workspace/didChangeConfiguration` notification.
pub async fn handle_did_change_configuration(
    state: &BackendState,
    _params: DidChangeConfigurationParams,
) {
    debug!("Host configuration changed");
    state.reloader.request_reset();
}

/// Handles the `workspace/didChangeWorkspaceFolders` notification.
pub async fn handle_did_change_workspace_folders(
    state: &BackendState,
    params: DidChangeWorkspaceFoldersParams,
) {
    debug!(
        "Workspace folders changed: {} added, {} removed",
        params.event.added.len(),
        params.event.removed.len()
    );
    state.reloader.request_reset();
}

/// Handles the `spellgate/registerConfigurationFile` notification.
pub async fn handle_register_config_file(state: &BackendState, params: RegisterConfigFileParams) {
    state.reloader.register_config_file(&params.to_path());
}
