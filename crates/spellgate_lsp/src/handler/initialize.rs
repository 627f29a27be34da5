//! Initialize and shutdown handlers.

use tower_lsp::Client;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tracing::{debug, error, info};

use spellgate_config::CONFIG_FILES;

use crate::state::BackendState;

/// Registration id of the config file watcher.
const WATCHER_REGISTRATION_ID: &str = "spellgate-config-watcher";

/// Handles the `initialize` LSP request.
pub async fn handle_initialize(
    state: &BackendState,
    params: InitializeParams,
) -> Result<InitializeResult> {
    info!("SpellGate LSP server initializing...");

    let folders = initial_folders(&params);
    debug!("Initial workspace folders: {:?}", folders);
    state.host.set_initial_folders(folders);

    let can_watch = params
        .capabilities
        .workspace
        .as_ref()
        .and_then(|w| w.did_change_watched_files.as_ref())
        .and_then(|c| c.dynamic_registration)
        .unwrap_or(false);
    state.set_watch_registration(can_watch);

    Ok(InitializeResult {
        capabilities: ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Options(
                TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::FULL),
                    will_save: Some(true),
                    save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                        include_text: Some(false),
                    })),
                    ..Default::default()
                },
            )),
            workspace: Some(WorkspaceServerCapabilities {
                workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                    supported: Some(true),
                    change_notifications: Some(OneOf::Left(true)),
                }),
                file_operations: None,
            }),
            ..Default::default()
        },
        server_info: Some(ServerInfo {
            name: "spellgate-lsp".to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }),
    })
}

/// Handles the `initialized` LSP notification.
pub async fn handle_initialized(state: &BackendState, client: &Client) {
    if state.watch_registration() {
        let options = DidChangeWatchedFilesRegistrationOptions {
            watchers: CONFIG_FILES
                .iter()
                .map(|name| FileSystemWatcher {
                    glob_pattern: GlobPattern::String(format!("**/{}", name)),
                    kind: None,
                })
                .collect(),
        };

        match serde_json::to_value(options) {
            Ok(register_options) => {
                let registration = Registration {
                    id: WATCHER_REGISTRATION_ID.to_string(),
                    method: "workspace/didChangeWatchedFiles".to_string(),
                    register_options: Some(register_options),
                };
                if let Err(e) = client.register_capability(vec![registration]).await {
                    error!("Failed to register config file watcher: {}", e);
                }
            }
            Err(e) => error!("Failed to encode watcher options: {}", e),
        }
    }

    client
        .log_message(MessageType::INFO, "SpellGate LSP server initialized!")
        .await;
}

/// Handles the `shutdown` LSP request.
pub async fn handle_shutdown(state: &BackendState) -> Result<()> {
    info!("SpellGate LSP server shutting down...");
    state.reloader.cancel();
    state.scheduler.shutdown();
    Ok(())
}

/// Folders announced by the client, falling back to the root URI.
fn initial_folders(params: &InitializeParams) -> Vec<WorkspaceFolder> {
    if let Some(folders) = params.workspace_folders.as_ref().filter(|f| !f.is_empty()) {
        return folders.clone();
    }

    #[allow(deprecated)]
    let root_uri = params.root_uri.clone();

    root_uri
        .map(|uri| {
            let name = uri
                .path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
                .unwrap_or("root")
                .to_string();
            vec![WorkspaceFolder { uri, name }]
        })
        .unwrap_or_default()
}
