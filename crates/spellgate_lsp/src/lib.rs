//! SpellGate LSP Server
//!
//! Decides when each open document is analysed and with which settings, and
//! publishes the results back to the editor.
//!
//! - [`scheduler`] runs one debounced pipeline per document and lets only one
//!   analyzer call run at a time.
//! - [`resolver`] merges defaults, registered config files, folder config files
//!   and host settings into effective settings, behind resettable caches.
//! - [`Backend`] wires both to the LSP notifications.

pub mod analyzer;
pub mod config;
pub mod debounce;
pub mod document;
pub mod folders;
pub mod gate;
pub mod host;
pub mod resolver;
pub mod scheduler;

mod handler;
mod state;

use std::sync::Arc;

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, ClientSocket, LanguageServer, LspService, Server};
use tracing::info;

pub use analyzer::{AnalyzeError, Analyzer, FlagWordsAnalyzer};
pub use document::{DocumentSnapshot, DocumentStore};
pub use handler::{REGISTER_CONFIG_FILE_METHOD, RegisterConfigFileParams};
pub use host::{ClientHost, ConfigFileReader, FsConfigReader, HostError, WorkspaceHost};
pub use resolver::{FolderSettings, SETTINGS_SECTION, SettingsResolver};
pub use scheduler::{
    BusyPolicy, DEFAULT_ANALYZER_TIMEOUT, PipelineState, SchedulerOptions, ValidationScheduler,
};
pub use state::{BackendState, ServerOptions, SharedState};

/// The LSP backend for SpellGate.
#[derive(Clone)]
pub struct Backend {
    /// LSP client for sending notifications.
    client: Client,
    /// Shared state
    state: SharedState,
}

impl Backend {
    /// Creates a backend talking to `client` with default options.
    pub fn new(client: Client) -> Self {
        Self::with_options(client, ServerOptions::default())
    }

    /// Creates a backend with the default collaborators.
    pub fn with_options(client: Client, options: ServerOptions) -> Self {
        let host = Arc::new(ClientHost::new(client.clone()));
        Self::with_parts(
            client,
            host,
            Arc::new(FsConfigReader),
            Arc::new(FlagWordsAnalyzer),
            options,
        )
    }

    /// Creates a backend with explicit collaborators.
    pub fn with_parts(
        client: Client,
        host: Arc<dyn WorkspaceHost>,
        reader: Arc<dyn ConfigFileReader>,
        analyzer: Arc<dyn Analyzer>,
        options: ServerOptions,
    ) -> Self {
        Self {
            client,
            state: Arc::new(BackendState::new(host, reader, analyzer, options)),
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn scheduler(&self) -> &ValidationScheduler {
        &self.state.scheduler
    }

    pub fn resolver(&self) -> &Arc<SettingsResolver> {
        &self.state.resolver
    }

    /// Handles the `spellgate/registerConfigurationFile` notification.
    pub async fn register_configuration_file(&self, params: RegisterConfigFileParams) {
        handler::handle_register_config_file(&self.state, params).await;
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        handler::handle_initialize(&self.state, params).await
    }

    async fn initialized(&self, _: InitializedParams) {
        handler::handle_initialized(&self.state, &self.client).await;
    }

    async fn shutdown(&self) -> Result<()> {
        handler::handle_shutdown(&self.state).await
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        handler::handle_did_open(&self.state, params).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        handler::handle_did_change(&self.state, params).await;
    }

    async fn will_save(&self, params: WillSaveTextDocumentParams) {
        handler::handle_will_save(&self.state, params).await;
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        handler::handle_did_save(&self.state, params).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        handler::handle_did_close(&self.state, params).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        handler::handle_did_change_configuration(&self.state, params).await;
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        handler::handle_did_change_workspace_folders(&self.state, params).await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        handler::handle_did_change_watched_files(&self.state, params).await;
    }
}

/// Builds the service with the custom notifications registered.
pub fn build_service<F>(init: F) -> (LspService<Backend>, ClientSocket)
where
    F: FnOnce(Client) -> Backend,
{
    LspService::build(init)
        .custom_method(
            REGISTER_CONFIG_FILE_METHOD,
            Backend::register_configuration_file,
        )
        .finish()
}

/// Starts the LSP server with default options.
///
/// This function does not return unless an error occurs or the server shuts down.
pub async fn run() {
    run_with_options(ServerOptions::default()).await;
}

/// Starts the LSP server on stdio.
pub async fn run_with_options(options: ServerOptions) {
    info!("SpellGate LSP server starting...");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = build_service(move |client| Backend::with_options(client, options));
    Server::new(stdin, stdout, socket).serve(service).await;
}
