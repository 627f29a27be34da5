//! Effective settings resolution.
//!
//! Merge order, lowest priority first:
//!
//! 1. built-in defaults
//! 2. imported settings (configuration files registered at runtime)
//! 3. folder settings (host settings merged over the folder's config files)
//! 4. `overrides` whose `filename` globs match the document path
//!
//! Every intermediate value lives in a cache owned by one [`CacheRegistry`],
//! so [`SettingsResolver::reset_all`] invalidates all of them together.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tower_lsp::lsp_types::{Url, WorkspaceFolder};
use tracing::debug;

use spellgate_config::{
    AsyncCache, CacheRegistry, LazyValue, PathExcluder, Settings, config_candidates,
};

use crate::folders::{FolderResolver, document_path};
use crate::host::{ConfigFileReader, HostError, WorkspaceHost};

/// Host configuration section holding SpellGate settings.
pub const SETTINGS_SECTION: &str = "spellgate";

/// Merged settings for one workspace folder.
#[derive(Debug, Clone)]
pub struct FolderSettings {
    pub uri: Url,
    pub settings: Arc<Settings>,
    /// Matcher for default excludes plus this folder's `ignorePaths`.
    pub excluder: Arc<PathExcluder>,
}

impl FolderSettings {
    /// Whether `uri` matches this folder's exclusion globs.
    pub fn is_excluded(&self, uri: &Url) -> bool {
        self.excluder.is_excluded(&document_path(uri, &self.uri))
    }
}

/// Produces [`Settings`] for document URIs.
pub struct SettingsResolver {
    registry: Arc<CacheRegistry>,
    host: Arc<dyn WorkspaceHost>,
    reader: Arc<dyn ConfigFileReader>,
    folders: FolderResolver,
    defaults: Arc<Settings>,
    imported_paths: RwLock<BTreeSet<PathBuf>>,
    host_settings: Arc<AsyncCache<Url, Arc<Settings>>>,
    folder_settings: Arc<AsyncCache<Url, FolderSettings>>,
    effective: Arc<AsyncCache<Url, Arc<Settings>>>,
    imported: Arc<LazyValue<Arc<Settings>>>,
    root: Arc<LazyValue<Arc<Settings>>>,
}

impl SettingsResolver {
    pub fn new(
        host: Arc<dyn WorkspaceHost>,
        reader: Arc<dyn ConfigFileReader>,
        defaults: Settings,
    ) -> Self {
        let registry = Arc::new(CacheRegistry::new());
        Self {
            folders: FolderResolver::new(host.clone(), &registry),
            host_settings: registry.cache("host-settings"),
            folder_settings: registry.cache("folder-settings"),
            effective: registry.cache("effective-settings"),
            imported: registry.lazy("imported-settings"),
            root: registry.lazy("root-settings"),
            imported_paths: RwLock::new(BTreeSet::new()),
            defaults: Arc::new(defaults),
            registry,
            host,
            reader,
        }
    }

    /// Registry owning every cache used here.
    pub fn registry(&self) -> &Arc<CacheRegistry> {
        &self.registry
    }

    /// Current cache epoch.
    pub fn epoch(&self) -> u64 {
        self.registry.epoch()
    }

    /// Clears every cache and bumps the epoch. Returns the new epoch.
    pub fn reset_all(&self) -> u64 {
        self.registry.reset_all()
    }

    pub fn folder_resolver(&self) -> &FolderResolver {
        &self.folders
    }

    /// Adds a configuration file to the imported set.
    ///
    /// Returns true when the set changed; the caller is expected to reset
    /// the caches in that case.
    pub fn register_config_file(&self, path: impl Into<PathBuf>) -> bool {
        self.imported_paths.write().insert(path.into())
    }

    /// Registered configuration files, sorted.
    pub fn imported_paths(&self) -> Vec<PathBuf> {
        self.imported_paths.read().iter().cloned().collect()
    }

    /// Effective settings for `uri`, or root settings for `None`.
    pub async fn resolve(&self, uri: Option<&Url>) -> Arc<Settings> {
        match uri {
            Some(uri) => {
                self.effective
                    .get_or_compute(uri, || self.compute_effective(uri))
                    .await
            }
            None => {
                self.root
                    .force(|| async {
                        let imported = self.imported_settings().await;
                        Arc::new(self.defaults.merge(&imported))
                    })
                    .await
            }
        }
    }

    /// Folder settings for the folder owning `uri`.
    pub async fn folder_settings_for_uri(&self, uri: &Url) -> FolderSettings {
        let folder = self.folders.find_matching_folder(uri).await;
        self.folder_settings(&folder).await
    }

    /// Folder settings for `folder`, computed once per epoch.
    pub async fn folder_settings(&self, folder: &WorkspaceFolder) -> FolderSettings {
        self.folder_settings
            .get_or_compute(&folder.uri, || self.compute_folder_settings(folder))
            .await
    }

    /// Settings merged from the registered configuration files.
    pub async fn imported_settings(&self) -> Arc<Settings> {
        self.imported
            .force(|| async {
                let paths = self.imported_paths();
                if paths.is_empty() {
                    return Arc::new(Settings::new());
                }
                debug!("Reading {} imported config files", paths.len());
                Arc::new(self.reader.read_files(paths).await)
            })
            .await
    }

    /// Host settings scoped to `scope`, computed once per epoch.
    ///
    /// Fetch or decode failures yield empty settings.
    pub async fn host_settings(&self, scope: &Url) -> Arc<Settings> {
        self.host_settings
            .get_or_compute(scope, || async {
                let value = match self.host.configuration(Some(scope), SETTINGS_SECTION).await {
                    Ok(value) => value,
                    Err(e) => {
                        debug!("Failed to fetch host settings for {}: {}", scope, e);
                        return Arc::new(Settings::new());
                    }
                };

                if value.is_null() {
                    return Arc::new(Settings::new());
                }

                match serde_json::from_value::<Settings>(value)
                    .map_err(|e| HostError::decode(e.to_string()))
                {
                    Ok(settings) => Arc::new(settings),
                    Err(e) => {
                        debug!("Ignoring malformed host settings for {}: {}", scope, e);
                        Arc::new(Settings::new())
                    }
                }
            })
            .await
    }

    async fn compute_folder_settings(&self, folder: &WorkspaceFolder) -> FolderSettings {
        debug!("Loading folder settings: {}", folder.uri);

        let folder_dir = folder.uri.to_file_path().ok();
        let files = match &folder_dir {
            Some(dir) => self.reader.read_files(config_candidates(dir)).await,
            None => Settings::new(),
        };

        let host = self.host_settings(&folder.uri).await;
        let host_imports = match &folder_dir {
            Some(dir) if !host.import.is_empty() => {
                self.reader
                    .read_files(resolve_imports(dir, &host.import))
                    .await
            }
            _ => Settings::new(),
        };

        let settings = files.merge(&host_imports).merge(&host);
        let excluder = PathExcluder::from_settings(&settings);

        FolderSettings {
            uri: folder.uri.clone(),
            settings: Arc::new(settings),
            excluder: Arc::new(excluder),
        }
    }

    async fn compute_effective(&self, uri: &Url) -> Arc<Settings> {
        let folder = self.folders.find_matching_folder(uri).await;
        let folder_settings = self.folder_settings(&folder).await;
        let imported = self.imported_settings().await;

        let merged = Settings::merge_all([
            self.defaults.as_ref(),
            imported.as_ref(),
            folder_settings.settings.as_ref(),
        ]);
        let path = document_path(uri, &folder.uri);

        Arc::new(merged.apply_overrides(&path))
    }
}

fn resolve_imports(base: &Path, entries: &[String]) -> Vec<PathBuf> {
    entries.iter().map(|entry| base.join(entry)).collect()
}
