//! Per-document validation pipelines.
//!
//! Each tracked URI owns one pipeline task fed by an unbounded channel. The
//! task walks the states of [`PipelineState`]:
//!
//! ```text
//! Idle -> AwaitingDebounce -> AwaitingGlobalSlot -> Validating -> Idle
//! ```
//!
//! A new event while awaiting the debounce (or a free slot) restarts the
//! debounce with the newer text. Documents with a blocked scheme get a
//! `Blacklisted` pipeline that never runs anything.
//!
//! One permit of a process-wide semaphore is held for the whole analyzer call,
//! so analyzer calls never overlap. The permit lives inside the analyzer task
//! and is released when that task ends, even if the pipeline that started it
//! has been torn down.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tower_lsp::lsp_types::{Diagnostic, Url};
use tracing::{debug, error, info, warn};

use spellgate_config::Settings;

use crate::analyzer::Analyzer;
use crate::document::{DocumentSnapshot, DocumentStore};
use crate::gate;
use crate::host::WorkspaceHost;
use crate::resolver::SettingsResolver;

/// Default upper bound for one analyzer call.
pub const DEFAULT_ANALYZER_TIMEOUT: Duration = Duration::from_secs(30);

/// What a pipeline does when its debounce fires while another document is
/// being analysed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusyPolicy {
    /// Wait for the analyzer slot; newer events still restart the debounce.
    #[default]
    Wait,
    /// Drop the event. The document is revalidated on its next change.
    Drop,
}

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub busy_policy: BusyPolicy,
    /// `None` disables the timeout.
    pub analyzer_timeout: Option<Duration>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            busy_policy: BusyPolicy::default(),
            analyzer_timeout: Some(DEFAULT_ANALYZER_TIMEOUT),
        }
    }
}

/// Observable state of one pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    AwaitingDebounce,
    AwaitingGlobalSlot,
    Validating,
    Blacklisted,
}

#[derive(Debug, Clone, Copy)]
struct BlockEntry {
    version: i32,
    suppressed: bool,
}

/// URIs whose validation is suspended while a save is in progress.
#[derive(Debug, Default)]
pub struct BlockSet {
    entries: Mutex<HashMap<Url, BlockEntry>>,
}

impl BlockSet {
    /// Starts a blackout for `uri` at `version`.
    pub fn block(&self, uri: Url, version: i32) {
        self.entries.lock().insert(
            uri,
            BlockEntry {
                version,
                suppressed: false,
            },
        );
    }

    pub fn is_blocked(&self, uri: &Url) -> bool {
        self.entries.lock().contains_key(uri)
    }

    /// Records that a validation was dropped. Returns true if `uri` is blocked.
    fn suppress(&self, uri: &Url) -> bool {
        match self.entries.lock().get_mut(uri) {
            Some(entry) => {
                entry.suppressed = true;
                true
            }
            None => false,
        }
    }

    /// Ends the blackout started at or before `version`.
    ///
    /// Returns true when a validation was dropped during the blackout.
    pub fn unblock(&self, uri: &Url, version: i32) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(uri) {
            Some(entry) if entry.version <= version => {
                let suppressed = entry.suppressed;
                entries.remove(uri);
                suppressed
            }
            Some(entry) => {
                debug!(
                    "Ignoring save of {} at version {} (blackout began at {})",
                    uri, version, entry.version
                );
                false
            }
            None => false,
        }
    }

    fn remove(&self, uri: &Url) {
        self.entries.lock().remove(uri);
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }
}

enum PipelineKind {
    Blacklisted,
    Active {
        events: mpsc::UnboundedSender<DocumentSnapshot>,
        task: JoinHandle<()>,
    },
}

struct PipelineHandle {
    id: u64,
    state: Arc<Mutex<PipelineState>>,
    kind: PipelineKind,
}

impl PipelineHandle {
    fn abort(&self) {
        if let PipelineKind::Active { task, .. } = &self.kind {
            task.abort();
        }
    }
}

struct SchedulerInner {
    resolver: Arc<SettingsResolver>,
    analyzer: Arc<dyn Analyzer>,
    host: Arc<dyn WorkspaceHost>,
    options: SchedulerOptions,
    pipelines: Mutex<HashMap<Url, PipelineHandle>>,
    blocked: BlockSet,
    gate: Arc<Semaphore>,
    publish_lock: tokio::sync::Mutex<()>,
    next_id: AtomicU64,
    shut_down: AtomicBool,
}

/// Schedules validations for open documents.
#[derive(Clone)]
pub struct ValidationScheduler {
    inner: Arc<SchedulerInner>,
}

impl ValidationScheduler {
    pub fn new(
        resolver: Arc<SettingsResolver>,
        analyzer: Arc<dyn Analyzer>,
        host: Arc<dyn WorkspaceHost>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                resolver,
                analyzer,
                host,
                options,
                pipelines: Mutex::new(HashMap::new()),
                blocked: BlockSet::default(),
                gate: Arc::new(Semaphore::new(1)),
                publish_lock: tokio::sync::Mutex::new(()),
                next_id: AtomicU64::new(1),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Feeds a document event to its pipeline, creating the pipeline if needed.
    pub fn enqueue(&self, document: DocumentSnapshot) {
        self.enqueue_if(document, |_| true);
    }

    /// Like [`enqueue`](Self::enqueue), but only while `documents` still holds
    /// the URI.
    ///
    /// The store is checked under the pipeline lock. Closing removes the
    /// document from the store before it tears down the pipeline, so a close
    /// racing with this call can never leave a fresh pipeline behind.
    pub fn enqueue_if_open(&self, document: DocumentSnapshot, documents: &DocumentStore) {
        self.enqueue_if(document, |uri| documents.contains(uri));
    }

    fn enqueue_if(&self, document: DocumentSnapshot, is_open: impl FnOnce(&Url) -> bool) {
        if self.inner.shut_down.load(Ordering::SeqCst) {
            debug!("Scheduler shut down, ignoring {}", document.uri);
            return;
        }

        let mut pipelines = self.inner.pipelines.lock();
        if !is_open(&document.uri) {
            debug!("Document closed, not validating {}", document.uri);
            return;
        }
        let handle = pipelines
            .entry(document.uri.clone())
            .or_insert_with(|| spawn_pipeline(&self.inner, &document.uri));

        match &handle.kind {
            PipelineKind::Blacklisted => {
                debug!("Ignoring event for blacklisted document: {}", document.uri);
            }
            PipelineKind::Active { events, .. } => {
                if events.send(document).is_err() {
                    warn!("Validation pipeline has stopped unexpectedly");
                }
            }
        }
    }

    /// Tears down the pipeline for `uri` and clears its diagnostics.
    pub async fn close(&self, uri: &Url) {
        let removed = self.inner.pipelines.lock().remove(uri);
        if removed.is_some() {
            debug!("Disposed validation pipeline: {}", uri);
        }
        // Dropping the handle closes the channel; the task ends at its next
        // receive and a running validation is discarded by the emit guard.
        drop(removed);
        self.inner.blocked.remove(uri);

        let _guard = self.inner.publish_lock.lock().await;
        self.inner
            .host
            .publish_diagnostics(uri.clone(), Vec::new(), None)
            .await;
    }

    /// Disposes every pipeline. Later events are ignored.
    pub fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::SeqCst);
        let drained: Vec<_> = self.inner.pipelines.lock().drain().collect();
        for (_, handle) in &drained {
            handle.abort();
        }
        self.inner.blocked.clear();
        info!("Disposed {} validation pipelines", drained.len());
    }

    /// Starts a save blackout for `uri`.
    pub fn block(&self, uri: Url, version: i32) {
        debug!("Blocking validation of {} during save (version {})", uri, version);
        self.inner.blocked.block(uri, version);
    }

    /// Ends a save blackout. Returns true if a validation was dropped meanwhile.
    pub fn unblock(&self, uri: &Url, version: i32) -> bool {
        self.inner.blocked.unblock(uri, version)
    }

    pub fn is_blocked(&self, uri: &Url) -> bool {
        self.inner.blocked.is_blocked(uri)
    }

    /// Whether an analyzer call is running.
    pub fn is_busy(&self) -> bool {
        self.inner.gate.available_permits() == 0
    }

    pub fn is_tracked(&self, uri: &Url) -> bool {
        self.inner.pipelines.lock().contains_key(uri)
    }

    pub fn pipeline_count(&self) -> usize {
        self.inner.pipelines.lock().len()
    }

    pub fn pipeline_state(&self, uri: &Url) -> Option<PipelineState> {
        self.inner
            .pipelines
            .lock()
            .get(uri)
            .map(|handle| *handle.state.lock())
    }
}

fn spawn_pipeline(inner: &Arc<SchedulerInner>, uri: &Url) -> PipelineHandle {
    let id = inner.next_id.fetch_add(1, Ordering::SeqCst);

    if gate::is_scheme_blacklisted(uri) {
        debug!("Scheme '{}' is blacklisted, not validating {}", uri.scheme(), uri);
        return PipelineHandle {
            id,
            state: Arc::new(Mutex::new(PipelineState::Blacklisted)),
            kind: PipelineKind::Blacklisted,
        };
    }

    debug!("Created validation pipeline: {}", uri);
    let state = Arc::new(Mutex::new(PipelineState::Idle));
    let (tx, rx) = mpsc::unbounded_channel();
    let pipeline = Pipeline {
        id,
        uri: uri.clone(),
        inner: inner.clone(),
        state: state.clone(),
        events: rx,
    };

    PipelineHandle {
        id,
        state,
        kind: PipelineKind::Active {
            events: tx,
            task: tokio::spawn(pipeline.run()),
        },
    }
}

struct Pending {
    document: DocumentSnapshot,
    settings: Arc<Settings>,
    deadline: Instant,
}

struct Pipeline {
    id: u64,
    uri: Url,
    inner: Arc<SchedulerInner>,
    state: Arc<Mutex<PipelineState>>,
    events: mpsc::UnboundedReceiver<DocumentSnapshot>,
}

impl Pipeline {
    async fn run(mut self) {
        let mut pending: Option<Pending> = None;

        loop {
            let Some(current) = pending.take() else {
                self.set_state(PipelineState::Idle);
                match self.events.recv().await {
                    Some(document) => pending = Some(self.prepare(document).await),
                    None => break,
                }
                continue;
            };

            self.set_state(PipelineState::AwaitingDebounce);
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(document) => pending = Some(self.prepare(document).await),
                    None => break,
                },
                _ = tokio::time::sleep_until(current.deadline) => {
                    pending = self.fire(current).await;
                }
            }
        }

        debug!("Validation pipeline finished: {}", self.uri);
    }

    /// Resolves settings for a new event and computes its debounce deadline.
    async fn prepare(&self, document: DocumentSnapshot) -> Pending {
        let received = Instant::now();
        let settings = self.inner.resolver.resolve(Some(&document.uri)).await;
        let deadline = received + settings.spell_check_delay();
        Pending {
            document,
            settings,
            deadline,
        }
    }

    /// Runs a debounced event. Returns a newer event that superseded it while
    /// waiting for the analyzer slot.
    async fn fire(&mut self, current: Pending) -> Option<Pending> {
        let permit = match self.inner.gate.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) if self.inner.options.busy_policy == BusyPolicy::Drop => {
                debug!("Analyzer busy, dropping validation of {}", self.uri);
                return None;
            }
            Err(_) => {
                self.set_state(PipelineState::AwaitingGlobalSlot);
                tokio::select! {
                    permit = self.inner.gate.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return None,
                    },
                    event = self.events.recv() => {
                        return match event {
                            Some(document) => Some(self.prepare(document).await),
                            None => None,
                        };
                    }
                }
            }
        };

        if self.inner.blocked.suppress(&self.uri) {
            debug!("Save in progress, dropping validation of {}", self.uri);
            return None;
        }

        self.set_state(PipelineState::Validating);
        let Some(diagnostics) = self
            .inner
            .validate(&current.document, &current.settings, permit)
            .await
        else {
            return None;
        };
        self.inner
            .emit(self.id, &current.document, diagnostics)
            .await;

        None
    }

    fn set_state(&self, state: PipelineState) {
        *self.state.lock() = state;
    }
}

impl SchedulerInner {
    /// Runs the exclusion checks and the analyzer while holding `permit`.
    ///
    /// Returns `None` when a save blackout began before the analyzer could
    /// start; nothing is published then. Otherwise never fails: every problem
    /// becomes an empty list and a log line.
    async fn validate(
        &self,
        document: &DocumentSnapshot,
        settings: &Arc<Settings>,
        permit: OwnedSemaphorePermit,
    ) -> Option<Vec<Diagnostic>> {
        let uri = &document.uri;

        if !gate::is_scheme_allowed(uri, &settings.allowed_schemas()) {
            debug!("Scheme '{}' not allowed, skipping {}", uri.scheme(), uri);
            return Some(Vec::new());
        }
        if !settings.is_enabled() {
            debug!("Validation disabled for {}", uri);
            return Some(Vec::new());
        }

        let folder = self.resolver.folder_settings_for_uri(uri).await;
        if !gate::should_validate(document, settings, &folder) {
            debug!("Document excluded from validation: {}", uri);
            return Some(Vec::new());
        }

        // The folder lookup may have awaited host I/O; a will-save can land
        // in between.
        if self.blocked.suppress(uri) {
            debug!("Save began during settings lookup, dropping validation of {}", uri);
            drop(permit);
            return None;
        }

        info!("Validating document: {}", uri);
        let document = document.truncated(settings.check_limit_bytes());
        let analyzer = self.analyzer.clone();
        let settings = settings.clone();
        let task = tokio::spawn(async move {
            let _permit = permit;
            analyzer.analyze(&document, &settings).await
        });
        let abort = task.abort_handle();

        let outcome = match self.options.analyzer_timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    abort.abort();
                    error!("Analyzer timed out after {:?} on {}", limit, uri);
                    return Some(Vec::new());
                }
            },
            None => task.await,
        };

        let diagnostics = match outcome {
            Ok(Ok(diagnostics)) => diagnostics,
            Ok(Err(e)) => {
                error!("Analyzer failed on {}: {:?}", uri, e);
                Vec::new()
            }
            Err(e) => {
                error!("Analyzer task failed on {}: {:?}", uri, e);
                Vec::new()
            }
        };
        Some(diagnostics)
    }

    /// Publishes diagnostics unless the pipeline was closed meanwhile.
    async fn emit(&self, id: u64, document: &DocumentSnapshot, diagnostics: Vec<Diagnostic>) {
        let _guard = self.publish_lock.lock().await;

        let registered = self
            .pipelines
            .lock()
            .get(&document.uri)
            .is_some_and(|handle| handle.id == id);
        if !registered {
            debug!("Discarding diagnostics for closed document: {}", document.uri);
            return;
        }

        self.host
            .publish_diagnostics(document.uri.clone(), diagnostics, Some(document.version))
            .await;
    }
}
