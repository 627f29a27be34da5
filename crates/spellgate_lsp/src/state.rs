//! LSP Backend state management.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use spellgate_config::Settings;

use crate::analyzer::Analyzer;
use crate::config::ConfigReloader;
use crate::document::DocumentStore;
use crate::host::{ConfigFileReader, WorkspaceHost};
use crate::resolver::SettingsResolver;
use crate::scheduler::{SchedulerOptions, ValidationScheduler};

/// Options fixed at server start.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub scheduler: SchedulerOptions,
    /// Lowest-priority settings layer.
    pub defaults: Settings,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            scheduler: SchedulerOptions::default(),
            defaults: Settings::defaults(),
        }
    }
}

/// Shared backend state.
pub struct BackendState {
    pub host: Arc<dyn WorkspaceHost>,
    pub documents: Arc<DocumentStore>,
    pub resolver: Arc<SettingsResolver>,
    pub scheduler: ValidationScheduler,
    pub reloader: ConfigReloader,
    /// Whether the client can register file watchers dynamically.
    watch_registration: AtomicBool,
}

impl fmt::Debug for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendState")
            .field("documents", &self.documents.len())
            .field("pipelines", &self.scheduler.pipeline_count())
            .field("epoch", &self.resolver.epoch())
            .finish()
    }
}

impl BackendState {
    pub fn new(
        host: Arc<dyn WorkspaceHost>,
        reader: Arc<dyn ConfigFileReader>,
        analyzer: Arc<dyn Analyzer>,
        options: ServerOptions,
    ) -> Self {
        let documents = Arc::new(DocumentStore::new());
        let resolver = Arc::new(SettingsResolver::new(
            host.clone(),
            reader,
            options.defaults,
        ));
        let scheduler = ValidationScheduler::new(
            resolver.clone(),
            analyzer,
            host.clone(),
            options.scheduler,
        );
        let reloader = ConfigReloader::new(resolver.clone(), documents.clone(), scheduler.clone());

        Self {
            host,
            documents,
            resolver,
            scheduler,
            reloader,
            watch_registration: AtomicBool::new(false),
        }
    }

    pub fn set_watch_registration(&self, supported: bool) {
        self.watch_registration.store(supported, Ordering::Relaxed);
    }

    pub fn watch_registration(&self) -> bool {
        self.watch_registration.load(Ordering::Relaxed)
    }
}

/// Type alias for shared state.
pub type SharedState = Arc<BackendState>;
