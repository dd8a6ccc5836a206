#![allow(dead_code)]

use color_eyre::eyre::eyre;
use color_eyre::Result;
use packbench::catalog::QueryDef;
use packbench::engine::{
    Connection, DataProtocol, Engine, EngineBoot, EngineProvider, ExecutionBundle,
};
use packbench::fetch::{FetchError, Fetcher};
use packbench::source::InputSource;
use packbench::workbench::{Workbench, WorkbenchSettings};
use packbench::Mode;
use polars::prelude::*;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Shared knobs and call records of the fake engine.
#[derive(Default)]
pub struct FakeEngineState {
    pub boots: AtomicUsize,
    pub queries: Mutex<Vec<String>>,
    pub registrations: Mutex<Vec<(String, String)>>,
    pub boot_delay: Mutex<Duration>,
    pub fail_boot: Mutex<bool>,
    /// Statements containing this text fail.
    pub fail_on: Mutex<Option<String>>,
    /// Rows returned by every non-DDL query.
    pub result_rows: Mutex<usize>,
    pub query_delay: Mutex<Duration>,
}

impl FakeEngineState {
    pub fn new() -> Arc<Self> {
        let state = Self::default();
        *state.result_rows.lock().unwrap() = 3;
        Arc::new(state)
    }

    pub fn boot_count(&self) -> usize {
        self.boots.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    /// Queries other than view creation.
    pub fn user_queries(&self) -> Vec<String> {
        self.queries()
            .into_iter()
            .filter(|q| !q.starts_with("CREATE"))
            .collect()
    }

    pub fn created_views(&self) -> Vec<String> {
        self.queries()
            .iter()
            .filter_map(|q| q.strip_prefix("CREATE OR REPLACE VIEW "))
            .filter_map(|rest| rest.split_whitespace().next())
            .map(str::to_string)
            .collect()
    }

    pub fn set_result_rows(&self, rows: usize) {
        *self.result_rows.lock().unwrap() = rows;
    }

    pub fn set_fail_on(&self, needle: &str) {
        *self.fail_on.lock().unwrap() = Some(needle.to_string());
    }

    pub fn set_boot_delay(&self, delay: Duration) {
        *self.boot_delay.lock().unwrap() = delay;
    }

    pub fn set_query_delay(&self, delay: Duration) {
        *self.query_delay.lock().unwrap() = delay;
    }

    pub fn set_fail_boot(&self, fail: bool) {
        *self.fail_boot.lock().unwrap() = fail;
    }
}

pub struct FakeBoot(pub Arc<FakeEngineState>);
struct FakeEngine(Arc<FakeEngineState>);
struct FakeConnection(Arc<FakeEngineState>);

impl EngineBoot for FakeBoot {
    fn candidates(&self) -> Vec<ExecutionBundle> {
        vec![ExecutionBundle::InMemory]
    }

    fn select_bundle(&self, candidates: &[ExecutionBundle]) -> Result<ExecutionBundle> {
        candidates
            .first()
            .copied()
            .ok_or_else(|| eyre!("no bundle"))
    }

    fn instantiate(&self, _bundle: ExecutionBundle) -> Result<Arc<dyn Engine>> {
        self.0.boots.fetch_add(1, Ordering::SeqCst);
        let delay = *self.0.boot_delay.lock().unwrap();
        thread::sleep(delay);
        if *self.0.fail_boot.lock().unwrap() {
            return Err(eyre!("worker script failed to load"));
        }
        Ok(Arc::new(FakeEngine(Arc::clone(&self.0))))
    }
}

impl Engine for FakeEngine {
    fn connect(&self) -> Result<Arc<dyn Connection>> {
        Ok(Arc::new(FakeConnection(Arc::clone(&self.0))))
    }

    fn register_remote_file(
        &self,
        virtual_name: &str,
        url: &str,
        _protocol: DataProtocol,
        _cacheable: bool,
    ) -> Result<()> {
        self.0
            .registrations
            .lock()
            .unwrap()
            .push((virtual_name.to_string(), url.to_string()));
        Ok(())
    }
}

impl Connection for FakeConnection {
    fn query(&self, sql: &str) -> Result<DataFrame> {
        self.0.queries.lock().unwrap().push(sql.to_string());
        if let Some(needle) = self.0.fail_on.lock().unwrap().as_deref() {
            if sql.contains(needle) {
                return Err(eyre!("Catalog Error: {} does not exist", needle));
            }
        }
        if sql.starts_with("CREATE") {
            return Ok(DataFrame::empty());
        }
        let delay = *self.0.query_delay.lock().unwrap();
        thread::sleep(delay);
        let rows = *self.0.result_rows.lock().unwrap();
        Ok(df!("n" => (0..rows as i64).collect::<Vec<i64>>())?)
    }
}

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Status(u16),
    Transport(String),
}

/// Fetcher that serves scripted manifest replies. Each `fetch_text` takes the
/// next scripted `(delay, reply)`; when the script is empty `default` is used.
pub struct FakeFetcher {
    pub calls: AtomicUsize,
    pub script: Mutex<VecDeque<(Duration, Reply)>>,
    pub default: Mutex<Reply>,
}

pub const PACK_MANIFEST: &str = r#"{
  "pack_name": "web_demo_pack_v1",
  "files": {
    "releases_demo": { "path": "releases_demo/data.parquet", "rows": 5000, "bytes": 123456 },
    "artists_demo": { "path": "artists_demo/data.parquet" }
  }
}"#;

impl FakeFetcher {
    pub fn new(default: Reply) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(default),
        })
    }

    pub fn serving_pack() -> Arc<Self> {
        Self::new(Reply::Text(PACK_MANIFEST.to_string()))
    }

    pub fn push(&self, delay: Duration, reply: Reply) {
        self.script.lock().unwrap().push_back((delay, reply));
    }

    pub fn set_default(&self, reply: Reply) {
        *self.default.lock().unwrap() = reply;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetcher for FakeFetcher {
    fn fetch_text(&self, _source: &InputSource) -> std::result::Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let (delay, reply) =
            next.unwrap_or_else(|| (Duration::ZERO, self.default.lock().unwrap().clone()));
        thread::sleep(delay);
        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Status(status) => Err(FetchError::Status {
                status,
                message: "Not Found".to_string(),
            }),
            Reply::Transport(message) => Err(FetchError::Transport(message)),
        }
    }

    fn download(&self, url: &str, _dest: &Path) -> std::result::Result<(), FetchError> {
        Err(FetchError::Transport(format!("unexpected download of {}", url)))
    }
}

pub fn test_settings() -> WorkbenchSettings {
    WorkbenchSettings {
        base_url: "http://pack.test".to_string(),
        engine_boot_timeout: Duration::from_secs(5),
        dataset_load_timeout: Duration::from_secs(5),
        ..WorkbenchSettings::default()
    }
}

pub struct Harness {
    pub engine: Arc<FakeEngineState>,
    pub fetcher: Arc<FakeFetcher>,
    pub workbench: Arc<Workbench>,
}

pub fn harness_with(
    mode: Mode,
    settings: WorkbenchSettings,
    active: Vec<&'static QueryDef>,
) -> Harness {
    let engine = FakeEngineState::new();
    let fetcher = FakeFetcher::serving_pack();
    let provider = Arc::new(EngineProvider::new(Arc::new(FakeBoot(Arc::clone(&engine)))));
    let workbench = Arc::new(Workbench::new(
        provider,
        fetcher.clone(),
        settings,
        mode,
        active,
    ));
    Harness {
        engine,
        fetcher,
        workbench,
    }
}

pub fn harness(mode: Mode) -> Harness {
    harness_with(
        mode,
        test_settings(),
        packbench::catalog::active_queries(packbench::catalog::QUERY_PACK, mode),
    )
}

/// Write a small parquet table at `<root>/data/<pack>/<dir>/data.parquet`.
pub fn write_pack_table(root: &Path, pack: &str, dir: &str, mut df: DataFrame) {
    let table_dir = root.join("data").join(pack).join(dir);
    std::fs::create_dir_all(&table_dir).unwrap();
    let file = std::fs::File::create(table_dir.join("data.parquet")).unwrap();
    ParquetWriter::new(file).finish(&mut df).unwrap();
}

/// Write a manifest at `<root>/data/<pack>/demo_manifest.json`.
pub fn write_manifest(root: &Path, pack: &str, dirs: &[&str]) {
    let files: serde_json::Map<String, serde_json::Value> = dirs
        .iter()
        .map(|d| {
            (
                d.to_string(),
                serde_json::json!({ "path": format!("{}/data.parquet", d) }),
            )
        })
        .collect();
    let manifest = serde_json::json!({ "pack_name": pack, "files": files });
    let dir = root.join("data").join(pack);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("demo_manifest.json"),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
}
