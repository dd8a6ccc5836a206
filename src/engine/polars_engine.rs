//! Engine implementation on top of polars lazy frames and `polars-sql`.
//!
//! Remote files are downloaded on demand when a view over them is created.
//! `CREATE [OR REPLACE] VIEW v AS SELECT * FROM read_parquet('name')` is
//! handled here; every other statement goes to the SQL context.

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use polars::prelude::*;
use polars_sql::SQLContext;
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info};

use super::{Connection, DataProtocol, Engine, EngineBoot, ExecutionBundle};
use crate::cache::CacheManager;
use crate::fetch::Fetcher;

const CREATE_VIEW_PATTERN: &str = r"(?is)^\s*create\s+(?:or\s+replace\s+)?view\s+([A-Za-z_][A-Za-z0-9_]*)\s+as\s+select\s+\*\s+from\s+read_parquet\(\s*'([^']+)'\s*\)\s*;?\s*$";

/// Collects a LazyFrame into a DataFrame.
///
/// When the `streaming` feature is enabled and `use_streaming` is true, uses the Polars
/// streaming engine (batch processing, lower memory). Otherwise collects normally.
pub fn collect_lazy(
    lf: LazyFrame,
    use_streaming: bool,
) -> std::result::Result<DataFrame, PolarsError> {
    #[cfg(feature = "streaming")]
    {
        if use_streaming {
            lf.with_new_streaming(true).collect()
        } else {
            lf.collect()
        }
    }
    #[cfg(not(feature = "streaming"))]
    {
        let _ = use_streaming;
        lf.collect()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Boots [`PolarsEngine`] instances.
pub struct PolarsBoot {
    fetcher: Arc<dyn Fetcher>,
    cache: Option<CacheManager>,
    prefer_streaming: bool,
}

impl PolarsBoot {
    pub fn new(fetcher: Arc<dyn Fetcher>, cache: Option<CacheManager>, prefer_streaming: bool) -> Self {
        Self {
            fetcher,
            cache,
            prefer_streaming,
        }
    }
}

impl EngineBoot for PolarsBoot {
    fn candidates(&self) -> Vec<ExecutionBundle> {
        let mut bundles = Vec::with_capacity(2);
        if cfg!(feature = "streaming") && self.prefer_streaming {
            bundles.push(ExecutionBundle::Streaming);
        }
        bundles.push(ExecutionBundle::InMemory);
        bundles
    }

    fn select_bundle(&self, candidates: &[ExecutionBundle]) -> Result<ExecutionBundle> {
        candidates
            .first()
            .copied()
            .ok_or_else(|| eyre!("no execution bundle to select from"))
    }

    fn instantiate(&self, bundle: ExecutionBundle) -> Result<Arc<dyn Engine>> {
        let engine = PolarsEngine::new(bundle, self.fetcher.clone(), self.cache.clone())?;
        Ok(Arc::new(engine))
    }
}

#[derive(Debug, Clone)]
struct RemoteFile {
    url: String,
    protocol: DataProtocol,
    cacheable: bool,
}

struct EngineState {
    bundle: ExecutionBundle,
    fetcher: Arc<dyn Fetcher>,
    cache: Option<CacheManager>,
    create_view: Regex,
    files: Mutex<HashMap<String, RemoteFile>>,
    context: Mutex<SQLContext>,
    // non-cacheable downloads live as long as the engine
    downloads: Mutex<Vec<tempfile::TempPath>>,
}

pub struct PolarsEngine {
    state: Arc<EngineState>,
}

impl PolarsEngine {
    pub fn new(
        bundle: ExecutionBundle,
        fetcher: Arc<dyn Fetcher>,
        cache: Option<CacheManager>,
    ) -> Result<Self> {
        let create_view = Regex::new(CREATE_VIEW_PATTERN)?;
        Ok(Self {
            state: Arc::new(EngineState {
                bundle,
                fetcher,
                cache,
                create_view,
                files: Mutex::new(HashMap::new()),
                context: Mutex::new(SQLContext::new()),
                downloads: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Names of the views created so far, sorted.
    pub fn views(&self) -> Vec<String> {
        let mut names = lock(&self.state.context).get_tables();
        names.sort();
        names
    }
}

impl Engine for PolarsEngine {
    fn connect(&self) -> Result<Arc<dyn Connection>> {
        Ok(Arc::new(PolarsConnection {
            state: self.state.clone(),
        }))
    }

    fn register_remote_file(
        &self,
        virtual_name: &str,
        url: &str,
        protocol: DataProtocol,
        cacheable: bool,
    ) -> Result<()> {
        debug!(virtual_name, url, ?protocol, cacheable, "register remote file");
        lock(&self.state.files).insert(
            virtual_name.to_string(),
            RemoteFile {
                url: url.to_string(),
                protocol,
                cacheable,
            },
        );
        Ok(())
    }
}

impl EngineState {
    /// Local path holding the data for `name`, downloading it when needed.
    fn materialize(&self, name: &str) -> Result<PathBuf> {
        let file = lock(&self.files).get(name).cloned();
        let Some(file) = file else {
            // not registered: treat as a plain path
            return Ok(PathBuf::from(name));
        };
        match file.protocol {
            DataProtocol::Local => Ok(PathBuf::from(&file.url)),
            DataProtocol::Http => match (&self.cache, file.cacheable) {
                (Some(cache), true) => {
                    cache.ensure_files_dir()?;
                    let dest = cache.cached_download(&file.url);
                    let current = self.fetcher.validator(&file.url).unwrap_or_else(|e| {
                        debug!(url = %file.url, error = %e, "could not revalidate cached download");
                        None
                    });
                    let fresh = dest.exists()
                        && current.is_some()
                        && cache.stored_validator(&file.url) == current;
                    if fresh {
                        debug!(url = %file.url, path = %dest.display(), "using cached download");
                    } else {
                        self.download(&file.url, &dest)?;
                        cache.store_validator(&file.url, current.as_deref())?;
                    }
                    Ok(dest)
                }
                _ => {
                    let temp = tempfile::Builder::new()
                        .prefix("packbench-")
                        .suffix(".parquet")
                        .tempfile()?
                        .into_temp_path();
                    self.download(&file.url, &temp)?;
                    let path = temp.to_path_buf();
                    lock(&self.downloads).push(temp);
                    Ok(path)
                }
            },
        }
    }

    fn download(&self, url: &str, dest: &std::path::Path) -> Result<()> {
        let start = Instant::now();
        self.fetcher
            .download(url, dest)
            .map_err(|e| eyre!("Download of {} failed: {}", url, e))?;
        info!(
            url,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "downloaded data file"
        );
        Ok(())
    }

    fn create_view(&self, view: &str, source: &str) -> Result<()> {
        let path = self.materialize(source)?;
        let pl_path = PlPath::Local(Arc::from(path.as_path()));
        let mut lf = LazyFrame::scan_parquet(pl_path, ScanArgsParquet::default())
            .wrap_err_with(|| format!("Could not read {}", path.display()))?;
        // resolve the schema now so an unreadable file fails here, not at query time
        lf.collect_schema()
            .wrap_err_with(|| format!("Could not read {}", path.display()))?;
        lock(&self.context).register(view, lf);
        debug!(view, source, "view created");
        Ok(())
    }
}

pub struct PolarsConnection {
    state: Arc<EngineState>,
}

impl Connection for PolarsConnection {
    fn query(&self, sql: &str) -> Result<DataFrame> {
        if let Some(caps) = self.state.create_view.captures(sql) {
            self.state.create_view(&caps[1], &caps[2])?;
            return Ok(DataFrame::empty());
        }

        let statement = sql.trim().trim_end_matches(';').trim_end();
        let start = Instant::now();
        let lf = lock(&self.state.context).execute(statement)?;
        let df = collect_lazy(lf, self.state.bundle == ExecutionBundle::Streaming)?;
        debug!(
            rows = df.height(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            bundle = %self.state.bundle,
            "statement executed"
        );
        Ok(df)
    }
}
