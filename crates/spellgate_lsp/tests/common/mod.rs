#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tower_lsp::lsp_types::*;

use spellgate_config::Settings;
use spellgate_lsp::{
    AnalyzeError, Analyzer, ConfigFileReader, DocumentSnapshot, HostError, SchedulerOptions,
    SettingsResolver, ValidationScheduler, WorkspaceHost,
};

/// One `publish_diagnostics` call.
#[derive(Debug, Clone)]
pub struct Published {
    pub uri: Url,
    pub diagnostics: Vec<Diagnostic>,
    pub version: Option<i32>,
}

/// Host that serves canned settings and records published diagnostics.
#[derive(Default)]
pub struct MockHost {
    pub folders: Vec<WorkspaceFolder>,
    pub config: Mutex<HashMap<String, serde_json::Value>>,
    pub published: Mutex<Vec<Published>>,
    pub config_fetches: AtomicUsize,
    /// How long a workspace folder lookup takes.
    pub folder_delay: Duration,
}

impl MockHost {
    pub fn with_config(scope: &str, value: serde_json::Value) -> Self {
        let host = Self::default();
        host.set_config(scope, value);
        host
    }

    pub fn set_config(&self, scope: &str, value: serde_json::Value) {
        self.config.lock().unwrap().insert(scope.to_string(), value);
    }

    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_for(&self, uri: &Url) -> Vec<Published> {
        self.published()
            .into_iter()
            .filter(|p| &p.uri == uri)
            .collect()
    }
}

#[tower_lsp::async_trait]
impl WorkspaceHost for MockHost {
    async fn workspace_folders(&self) -> Result<Vec<WorkspaceFolder>, HostError> {
        if !self.folder_delay.is_zero() {
            tokio::time::sleep(self.folder_delay).await;
        }
        Ok(self.folders.clone())
    }

    async fn configuration(
        &self,
        scope: Option<&Url>,
        _section: &str,
    ) -> Result<serde_json::Value, HostError> {
        self.config_fetches.fetch_add(1, Ordering::SeqCst);
        let key = scope.map(|u| u.to_string()).unwrap_or_default();
        Ok(self
            .config
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn publish_diagnostics(&self, uri: Url, diagnostics: Vec<Diagnostic>, version: Option<i32>) {
        self.published.lock().unwrap().push(Published {
            uri,
            diagnostics,
            version,
        });
    }
}

/// Reader serving settings from memory.
#[derive(Default)]
pub struct MockReader {
    pub files: Mutex<HashMap<PathBuf, Settings>>,
}

#[tower_lsp::async_trait]
impl ConfigFileReader for MockReader {
    async fn read_files(&self, paths: Vec<PathBuf>) -> Settings {
        let files = self.files.lock().unwrap();
        paths
            .iter()
            .filter_map(|p| files.get(p))
            .fold(Settings::new(), |acc, s| acc.merge(s))
    }
}

/// One analyzer call.
#[derive(Debug, Clone)]
pub struct Call {
    pub uri: Url,
    pub version: i32,
    pub text: String,
    pub settings: Settings,
    pub started: Instant,
    pub finished: Instant,
}

/// Analyzer that sleeps, records its calls and reports one diagnostic
/// carrying the analysed text.
pub struct RecordingAnalyzer {
    pub delay: Duration,
    pub calls: Mutex<Vec<Call>>,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl RecordingAnalyzer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, uri: &Url) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| &c.uri == uri)
            .collect()
    }
}

#[tower_lsp::async_trait]
impl Analyzer for RecordingAnalyzer {
    async fn analyze(
        &self,
        document: &DocumentSnapshot,
        settings: &Settings,
    ) -> Result<Vec<Diagnostic>, AnalyzeError> {
        let started = Instant::now();
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(Call {
            uri: document.uri.clone(),
            version: document.version,
            text: document.text.clone(),
            settings: settings.clone(),
            started,
            finished: Instant::now(),
        });

        Ok(vec![Diagnostic {
            range: Range::default(),
            message: document.text.clone(),
            ..Default::default()
        }])
    }
}

/// How a [`FaultyAnalyzer`] misbehaves.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    Error,
    Panic,
    Hang,
}

pub struct FaultyAnalyzer {
    pub fault: Fault,
    pub calls: AtomicUsize,
}

impl FaultyAnalyzer {
    pub fn new(fault: Fault) -> Self {
        Self {
            fault,
            calls: AtomicUsize::new(0),
        }
    }
}

#[tower_lsp::async_trait]
impl Analyzer for FaultyAnalyzer {
    async fn analyze(
        &self,
        _document: &DocumentSnapshot,
        _settings: &Settings,
    ) -> Result<Vec<Diagnostic>, AnalyzeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            Fault::Error => Err(AnalyzeError::Failed("boom".to_string())),
            Fault::Panic => panic!("analyzer exploded"),
            Fault::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }
    }
}

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

pub fn doc(uri: &Url, version: i32, text: &str) -> DocumentSnapshot {
    DocumentSnapshot::new(uri.clone(), "markdown", version, text)
}

/// Scheduler wired to `host` and `analyzer`, with default settings.
pub fn scheduler(
    host: Arc<MockHost>,
    analyzer: Arc<dyn Analyzer>,
    options: SchedulerOptions,
) -> ValidationScheduler {
    scheduler_with_resolver(host, analyzer, options).0
}

/// Like [`scheduler`], also returning the resolver it reads settings from.
pub fn scheduler_with_resolver(
    host: Arc<MockHost>,
    analyzer: Arc<dyn Analyzer>,
    options: SchedulerOptions,
) -> (ValidationScheduler, Arc<SettingsResolver>) {
    let resolver = Arc::new(SettingsResolver::new(
        host.clone(),
        Arc::new(MockReader::default()),
        Settings::defaults(),
    ));
    let scheduler = ValidationScheduler::new(resolver.clone(), analyzer, host, options);
    (scheduler, resolver)
}

pub async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
