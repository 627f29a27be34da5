//! Configuration change propagation.
//!
//! A change notification never touches the caches directly. It asks for a
//! reset, and bursts of requests collapse into one reset. Every reset then asks
//! for one revalidation sweep over the open documents, collapsed the same way.

use std::path::Path;
use std::sync::Arc;

use tower_lsp::lsp_types::FileEvent;
use tracing::{debug, info};

use spellgate_config::is_config_file;

use crate::debounce::{Debouncer, REVALIDATE_DEBOUNCE_MS, RESET_DEBOUNCE_MS};
use crate::document::DocumentStore;
use crate::resolver::SettingsResolver;
use crate::scheduler::ValidationScheduler;

/// Resets the settings caches and revalidates open documents on change.
pub struct ConfigReloader {
    resolver: Arc<SettingsResolver>,
    documents: Arc<DocumentStore>,
    scheduler: ValidationScheduler,
    reset: Debouncer,
    revalidate: Arc<Debouncer>,
}

impl ConfigReloader {
    pub fn new(
        resolver: Arc<SettingsResolver>,
        documents: Arc<DocumentStore>,
        scheduler: ValidationScheduler,
    ) -> Self {
        Self {
            resolver,
            documents,
            scheduler,
            reset: Debouncer::from_millis(RESET_DEBOUNCE_MS),
            revalidate: Arc::new(Debouncer::from_millis(REVALIDATE_DEBOUNCE_MS)),
        }
    }

    /// Schedules a cache reset followed by a revalidation sweep.
    pub fn request_reset(&self) {
        let resolver = self.resolver.clone();
        let documents = self.documents.clone();
        let scheduler = self.scheduler.clone();
        let revalidate = self.revalidate.clone();

        self.reset.call(move || async move {
            let epoch = resolver.reset_all();
            info!("Configuration changed, settings caches reset (epoch {})", epoch);

            revalidate.call(move || async move {
                let open = documents.all();
                debug!("Revalidating {} open documents", open.len());
                for document in open {
                    scheduler.enqueue_if_open(document, &documents);
                }
            });
        });
    }

    /// Adds `path` to the imported configuration files.
    ///
    /// Returns true and requests a reset only when the set changed.
    pub fn register_config_file(&self, path: &Path) -> bool {
        if !self.resolver.register_config_file(path) {
            debug!("Configuration file already registered: {}", path.display());
            return false;
        }
        info!("Registered configuration file: {}", path.display());
        self.request_reset();
        true
    }

    /// Whether any of `changes` touches a configuration file.
    ///
    /// Both well-known config names and registered import paths count.
    pub fn affects_settings(&self, changes: &[FileEvent]) -> bool {
        let imported = self.resolver.imported_paths();
        changes.iter().any(|change| match change.uri.to_file_path() {
            Ok(path) => is_config_file(&path) || imported.contains(&path),
            Err(_) => false,
        })
    }

    /// Whether a reset or a sweep is still scheduled.
    pub fn is_pending(&self) -> bool {
        self.reset.is_pending() || self.revalidate.is_pending()
    }

    /// Drops any scheduled reset and sweep.
    pub fn cancel(&self) {
        self.reset.cancel();
        self.revalidate.cancel();
    }
}
