//! Connection lifecycle: boot the engine, load the dataset pack, run queries.
//!
//! The workbench owns the SQL buffer and everything shown in the status line
//! and output pane. Boot and load are raced against their timeouts on a
//! worker thread; a worker that loses the race is abandoned and whatever it
//! produces later is dropped. Loads are numbered so that a load overtaken by
//! a newer one never touches the state.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use polars::prelude::DataFrame;
use tracing::{debug, info, warn};

use crate::catalog::QueryDef;
use crate::config::AppConfig;
use crate::dataset::{self, Manifest, DEFAULT_VIEW_MAP};
use crate::engine::{EngineHandle, EngineProvider};
use crate::error::{Result, WorkbenchError};
use crate::error_display::user_message_from_report;
use crate::fetch::Fetcher;
use crate::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    EngineBooting,
    EngineReady,
    DatasetLoading,
    DatasetReady,
    /// Entered only from `DatasetReady` and always returns to it.
    QueryRunning,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::EngineBooting => "engine-booting",
            Self::EngineReady => "engine-ready",
            Self::DatasetLoading => "dataset-loading",
            Self::DatasetReady => "dataset-ready",
            Self::QueryRunning => "query-running",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Working,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub kind: StatusKind,
}

impl Status {
    fn new(text: impl Into<String>, kind: StatusKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// A query result trimmed to the display limit.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub df: DataFrame,
    /// Rows the engine returned before trimming.
    pub total_rows: usize,
    pub elapsed: Duration,
}

impl QueryResult {
    pub fn rows_shown(&self) -> usize {
        self.df.height()
    }
}

/// Content of the output pane.
#[derive(Debug, Clone)]
pub enum Output {
    Empty,
    Message { text: String, is_error: bool },
    Table(QueryResult),
}

impl Output {
    fn info(text: impl Into<String>) -> Self {
        Self::Message {
            text: text.into(),
            is_error: false,
        }
    }

    fn error(context: &str, err: &WorkbenchError) -> Self {
        Self::Message {
            text: format!("ERROR ({}):\n{}", context, err),
            is_error: true,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Message { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// A step the UI is about to run on the next loop turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOp {
    Load,
    Run,
}

/// Values the workbench needs from the configuration.
#[derive(Debug, Clone)]
pub struct WorkbenchSettings {
    pub base_url: String,
    pub manifest_url: String,
    pub engine_boot_timeout: Duration,
    pub dataset_load_timeout: Duration,
    pub max_rows: usize,
    /// `(directory, view)` pairs registered on load, in order.
    pub views: Vec<(String, String)>,
}

impl WorkbenchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            base_url: config.workbench.base_url.clone(),
            manifest_url: config.workbench.manifest_url.clone(),
            engine_boot_timeout: config.timeouts.engine_boot(),
            dataset_load_timeout: config.timeouts.dataset_load(),
            max_rows: config.display.max_rows,
            views: DEFAULT_VIEW_MAP
                .iter()
                .map(|(dir, view)| (dir.to_string(), view.to_string()))
                .collect(),
        }
    }

    pub fn with_views(mut self, views: &[(&str, &str)]) -> Self {
        self.views = views
            .iter()
            .map(|(dir, view)| (dir.to_string(), view.to_string()))
            .collect();
        self
    }
}

impl Default for WorkbenchSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

struct WorkbenchState {
    phase: Phase,
    loaded: bool,
    engine_failed: bool,
    sql_buffer: String,
    buffer_revision: u64,
    pack_name: Option<String>,
    status: Status,
    output: Output,
}

pub struct Workbench {
    provider: Arc<EngineProvider>,
    fetcher: Arc<dyn Fetcher>,
    settings: WorkbenchSettings,
    mode: Mode,
    active: Vec<&'static QueryDef>,
    state: Mutex<WorkbenchState>,
    running: AtomicBool,
    generation: AtomicU64,
}

/// Run `f` on a worker thread and wait at most `timeout` for it.
/// `Ok(None)` means the worker lost the race and was abandoned.
fn race<T, F>(name: &str, timeout: Duration, f: F) -> std::io::Result<Option<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            // The receiver is gone when the race was lost
            let _ = tx.send(f());
        })?;
    Ok(rx.recv_timeout(timeout).ok())
}

impl Workbench {
    pub fn new(
        provider: Arc<EngineProvider>,
        fetcher: Arc<dyn Fetcher>,
        settings: WorkbenchSettings,
        mode: Mode,
        active: Vec<&'static QueryDef>,
    ) -> Self {
        let (status, output) = match mode {
            Mode::Explore => (Status::new("Ready.", StatusKind::Info), Output::info("Waiting…")),
            Mode::Showcase => (
                Status::new("Ready. Click a demo to start.", StatusKind::Info),
                Output::info("No demo run yet."),
            ),
        };
        Self {
            provider,
            fetcher,
            settings,
            mode,
            active,
            state: Mutex::new(WorkbenchState {
                phase: Phase::Idle,
                loaded: false,
                engine_failed: false,
                sql_buffer: String::new(),
                buffer_revision: 0,
                pack_name: None,
                status,
                output,
            }),
            running: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WorkbenchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn active_queries(&self) -> &[&'static QueryDef] {
        &self.active
    }

    pub fn settings(&self) -> &WorkbenchSettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().loaded
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> Status {
        self.lock().status.clone()
    }

    pub fn output(&self) -> Output {
        self.lock().output.clone()
    }

    pub fn sql(&self) -> String {
        self.lock().sql_buffer.clone()
    }

    /// Bumped whenever the buffer is replaced or edited.
    pub fn buffer_revision(&self) -> u64 {
        self.lock().buffer_revision
    }

    pub fn pack_name(&self) -> Option<String> {
        self.lock().pack_name.clone()
    }

    pub fn engine_bundle(&self) -> Option<String> {
        if !self.provider.is_ready() {
            return None;
        }
        self.provider.get().ok().map(|h| h.bundle.to_string())
    }

    fn set_status(&self, text: &str, kind: StatusKind) {
        self.lock().status = Status::new(text, kind);
    }

    fn not_loaded_hint(&self) -> &'static str {
        match self.mode {
            Mode::Showcase => "Click a demo card.",
            Mode::Explore => "Press Ctrl+L to load the dataset first.",
        }
    }

    fn ready_hint(&self) -> &'static str {
        match self.mode {
            Mode::Showcase => "Dataset ready. Click a demo card to run it.",
            Mode::Explore => "OK. Pick a preset (sidebar) or write custom SQL.",
        }
    }

    /// Show the "working" status for a step before it blocks the caller.
    pub fn prepare(&self, op: PendingOp) {
        match op {
            PendingOp::Load if !self.provider.is_ready() => {
                self.set_status("Booting…", StatusKind::Working)
            }
            PendingOp::Load => self.set_status("Loading demo pack…", StatusKind::Working),
            PendingOp::Run if self.is_loaded() => {
                self.set_status("Running query…", StatusKind::Working)
            }
            PendingOp::Run => {}
        }
    }

    /// Boot the engine if needed. Idempotent once the engine is up.
    ///
    /// A failed boot is remembered; call [`reset_engine`](Self::reset_engine)
    /// to try again.
    pub fn ensure_engine(&self) -> Result<EngineHandle> {
        if self.provider.is_ready() {
            return self.provider.get();
        }

        {
            let mut state = self.lock();
            state.phase = Phase::EngineBooting;
            state.status = Status::new("Booting…", StatusKind::Working);
            if self.mode == Mode::Explore {
                state.output = Output::info("Booting…");
            }
        }

        let timeout = self.settings.engine_boot_timeout;
        let provider = Arc::clone(&self.provider);
        let outcome = match race("engine-boot", timeout, move || provider.get()) {
            Ok(Some(result)) => result,
            Ok(None) => {
                warn!(timeout_secs = timeout.as_secs(), "engine boot timed out");
                Err(WorkbenchError::EngineBootTimeout {
                    secs: timeout.as_secs(),
                })
            }
            Err(e) => Err(WorkbenchError::EngineBoot(e.to_string())),
        };

        let mut state = self.lock();
        match outcome {
            Ok(handle) => {
                if state.phase == Phase::EngineBooting {
                    state.phase = Phase::EngineReady;
                }
                state.engine_failed = false;
                state.status = Status::new("Engine ready.", StatusKind::Success);
                if self.mode == Mode::Explore {
                    state.output = Output::info("Engine ready.");
                }
                Ok(handle)
            }
            Err(err) => {
                state.phase = Phase::Idle;
                state.engine_failed = true;
                state.status = Status::new(err.status_line(), StatusKind::Error);
                state.output = Output::error("engine boot", &err);
                Err(err)
            }
        }
    }

    /// True after a boot failure, until the next successful boot.
    pub fn engine_failed(&self) -> bool {
        self.lock().engine_failed
    }

    /// Forget a failed boot so the next operation boots again.
    pub fn reset_engine(&self) {
        if !self.provider.is_ready() {
            info!("engine reset requested");
            self.provider.reset();
        }
    }

    /// Load the dataset pack. On failure `loaded` and the buffer are left alone.
    pub fn load_dataset(&self) -> Result<Manifest> {
        let handle = self.ensure_engine()?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut state = self.lock();
            if state.phase != Phase::DatasetReady {
                state.phase = Phase::DatasetLoading;
            }
            state.status = Status::new("Loading demo pack…", StatusKind::Working);
            state.output = Output::info("Loading demo pack…");
        }

        let timeout = self.settings.dataset_load_timeout;
        let fetcher = Arc::clone(&self.fetcher);
        let manifest_url = self.settings.manifest_url.clone();
        let base_url = self.settings.base_url.clone();
        let views = self.settings.views.clone();
        let outcome = match race("dataset-load", timeout, move || {
            let pairs: Vec<(&str, &str)> = views
                .iter()
                .map(|(dir, view)| (dir.as_str(), view.as_str()))
                .collect();
            dataset::load_pack(&handle, fetcher.as_ref(), &manifest_url, &base_url, &pairs)
        }) {
            Ok(Some(result)) => result,
            Ok(None) => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    generation, "dataset load timed out"
                );
                Err(WorkbenchError::LoadTimeout {
                    secs: timeout.as_secs(),
                })
            }
            Err(e) => Err(WorkbenchError::ViewRegistration {
                view: "(all)".to_string(),
                message: format!("could not start the load worker: {}", e),
            }),
        };

        let current = self.generation.load(Ordering::SeqCst);
        if current != generation {
            debug!(generation, current, "discarding stale dataset load");
            return outcome;
        }

        let mut state = self.lock();
        match &outcome {
            Ok(manifest) => {
                state.loaded = true;
                state.phase = Phase::DatasetReady;
                state.pack_name = Some(manifest.pack_name.clone());
                state.status = Status::new(
                    format!("Demo pack loaded ({}).", manifest.pack_name),
                    StatusKind::Success,
                );
                state.output = Output::info(self.ready_hint());
            }
            Err(err) => {
                state.phase = if state.loaded {
                    Phase::DatasetReady
                } else {
                    Phase::EngineReady
                };
                state.status = Status::new(err.status_line(), StatusKind::Error);
                state.output = Output::error("pack load", err);
            }
        }
        outcome
    }

    /// Run the SQL buffer. `Ok(None)` when the buffer is blank.
    ///
    /// Never reaches the engine before the dataset is loaded.
    pub fn run_query(&self) -> Result<Option<QueryResult>> {
        let sql = {
            let mut state = self.lock();
            if !state.loaded {
                state.status = Status::new(
                    WorkbenchError::NotLoaded.status_line(),
                    StatusKind::Warning,
                );
                state.output = Output::info(self.not_loaded_hint());
                return Err(WorkbenchError::NotLoaded);
            }
            state.sql_buffer.trim().to_string()
        };
        if sql.is_empty() {
            return Ok(None);
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("query rejected: another query is running");
            return Err(WorkbenchError::Busy);
        }
        let result = self.execute(&sql);
        self.running.store(false, Ordering::SeqCst);
        result.map(Some)
    }

    fn execute(&self, sql: &str) -> Result<QueryResult> {
        let handle = self.provider.get()?;
        let previous = {
            let mut state = self.lock();
            let previous = state.phase;
            state.phase = Phase::QueryRunning;
            state.status = Status::new("Running query…", StatusKind::Working);
            previous
        };

        let start = Instant::now();
        let outcome = handle.connection.query(sql);
        let elapsed = start.elapsed();

        let mut state = self.lock();
        // a load that started meanwhile owns the phase now
        if state.phase == Phase::QueryRunning {
            state.phase = previous;
        }
        match outcome {
            Ok(df) => {
                let total_rows = df.height();
                let result = QueryResult {
                    df: df.head(Some(self.settings.max_rows)),
                    total_rows,
                    elapsed,
                };
                info!(
                    rows = total_rows,
                    shown = result.rows_shown(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "query finished"
                );
                state.status = Status::new(
                    format!(
                        "OK ({} rows shown, {} ms)",
                        result.rows_shown(),
                        elapsed.as_millis()
                    ),
                    StatusKind::Success,
                );
                state.output = Output::Table(result.clone());
                Ok(result)
            }
            Err(e) => {
                let err = WorkbenchError::QueryExecution(user_message_from_report(&e));
                warn!(error = %err, "query failed");
                state.status = Status::new(err.status_line(), StatusKind::Error);
                state.output = Output::error("query", &err);
                Err(err)
            }
        }
    }

    /// Copy the entry's SQL into the buffer, then optionally run it.
    pub fn apply_query(&self, entry: &QueryDef, run_now: bool) -> Result<Option<QueryResult>> {
        {
            let mut state = self.lock();
            state.sql_buffer = entry.sql.to_string();
            state.buffer_revision += 1;
        }
        debug!(query = entry.id, run_now, "query applied");
        if run_now {
            self.run_query()
        } else {
            Ok(None)
        }
    }

    /// Card behaviour: load the dataset when needed, then run the entry.
    /// A failed load stops here.
    pub fn open_featured(&self, entry: &QueryDef) -> Result<Option<QueryResult>> {
        if !self.is_loaded() {
            self.load_dataset()?;
        }
        self.apply_query(entry, true)
    }

    /// Replace the buffer with user-edited text. Showcase buffers are read-only.
    pub fn set_sql(&self, text: &str) -> Result<()> {
        if self.mode == Mode::Showcase {
            return Err(WorkbenchError::ReadOnlyBuffer);
        }
        let mut state = self.lock();
        if state.sql_buffer != text {
            state.sql_buffer = text.to_string();
            state.buffer_revision += 1;
        }
        Ok(())
    }
}
