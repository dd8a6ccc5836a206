//! Boundary between the workbench and the embedded SQL engine.
//!
//! The workbench only talks to the traits in this module. [`EngineProvider`]
//! boots an engine once per provider and hands the same [`EngineHandle`] to
//! every caller.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use polars::prelude::DataFrame;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Instant;
use tracing::{info, warn};

use crate::error::WorkbenchError;

pub mod polars_engine;

pub use polars_engine::PolarsBoot;

/// Execution strategy the engine was instantiated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionBundle {
    /// Batches are processed by the streaming engine.
    Streaming,
    /// Queries are collected fully in memory.
    InMemory,
}

impl ExecutionBundle {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::InMemory => "in-memory",
        }
    }
}

impl fmt::Display for ExecutionBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a registered remote file is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataProtocol {
    Http,
    Local,
}

/// Boot sequence of an engine: pick a bundle, then build the engine from it.
pub trait EngineBoot: Send + Sync {
    /// Bundles this build can run, in order of preference.
    fn candidates(&self) -> Vec<ExecutionBundle>;

    fn select_bundle(&self, candidates: &[ExecutionBundle]) -> Result<ExecutionBundle>;

    fn instantiate(&self, bundle: ExecutionBundle) -> Result<Arc<dyn Engine>>;
}

/// A running engine instance.
pub trait Engine: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn Connection>>;

    /// Make `url` readable under `virtual_name`. Registering an existing name
    /// replaces the previous registration.
    fn register_remote_file(
        &self,
        virtual_name: &str,
        url: &str,
        protocol: DataProtocol,
        cacheable: bool,
    ) -> Result<()>;
}

/// A session that executes SQL statements.
pub trait Connection: Send + Sync {
    /// Run one statement. DDL returns an empty frame.
    fn query(&self, sql: &str) -> Result<DataFrame>;
}

/// Engine plus its single open connection.
#[derive(Clone)]
pub struct EngineHandle {
    pub engine: Arc<dyn Engine>,
    pub connection: Arc<dyn Connection>,
    pub bundle: ExecutionBundle,
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("bundle", &self.bundle)
            .finish_non_exhaustive()
    }
}

impl EngineHandle {
    /// Same underlying engine and connection.
    pub fn same_as(&self, other: &EngineHandle) -> bool {
        Arc::ptr_eq(&self.engine, &other.engine) && Arc::ptr_eq(&self.connection, &other.connection)
    }
}

type BootCell = Arc<OnceLock<std::result::Result<EngineHandle, String>>>;

/// Boots the engine on first use and memoizes the outcome.
///
/// Concurrent callers of [`get`](Self::get) wait on the same initialization.
/// A failed boot stays failed until [`reset`](Self::reset) is called.
pub struct EngineProvider {
    boot: Arc<dyn EngineBoot>,
    cell: Mutex<BootCell>,
}

impl EngineProvider {
    pub fn new(boot: Arc<dyn EngineBoot>) -> Self {
        Self {
            boot,
            cell: Mutex::new(Arc::new(OnceLock::new())),
        }
    }

    fn current_cell(&self) -> BootCell {
        self.cell
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self) -> std::result::Result<EngineHandle, WorkbenchError> {
        let cell = self.current_cell();
        cell.get_or_init(|| self.boot_engine().map_err(|e| format!("{:#}", e)))
            .clone()
            .map_err(WorkbenchError::EngineBoot)
    }

    /// True once a boot has succeeded.
    pub fn is_ready(&self) -> bool {
        matches!(self.current_cell().get(), Some(Ok(_)))
    }

    /// Forget the memoized outcome so the next `get` boots again.
    ///
    /// Callers already waiting on the previous boot still receive its result.
    pub fn reset(&self) {
        *self.cell.lock().unwrap_or_else(PoisonError::into_inner) = Arc::new(OnceLock::new());
    }

    fn boot_engine(&self) -> Result<EngineHandle> {
        let start = Instant::now();
        let candidates = self.boot.candidates();
        if candidates.is_empty() {
            return Err(eyre!("no execution bundle is available in this build"));
        }
        let bundle = self.boot.select_bundle(&candidates)?;
        let engine = self.boot.instantiate(bundle).map_err(|e| {
            warn!(bundle = %bundle, error = %e, "engine instantiation failed");
            e
        })?;
        let connection = engine.connect()?;
        info!(
            bundle = %bundle,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "engine ready"
        );
        Ok(EngineHandle {
            engine,
            connection,
            bundle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBoot {
        instantiations: AtomicUsize,
        fail: bool,
    }

    struct NullEngine;
    struct NullConnection;

    impl Connection for NullConnection {
        fn query(&self, _sql: &str) -> Result<DataFrame> {
            Ok(DataFrame::empty())
        }
    }

    impl Engine for NullEngine {
        fn connect(&self) -> Result<Arc<dyn Connection>> {
            Ok(Arc::new(NullConnection))
        }
        fn register_remote_file(&self, _: &str, _: &str, _: DataProtocol, _: bool) -> Result<()> {
            Ok(())
        }
    }

    impl EngineBoot for CountingBoot {
        fn candidates(&self) -> Vec<ExecutionBundle> {
            vec![ExecutionBundle::InMemory]
        }
        fn select_bundle(&self, candidates: &[ExecutionBundle]) -> Result<ExecutionBundle> {
            Ok(candidates[0])
        }
        fn instantiate(&self, _bundle: ExecutionBundle) -> Result<Arc<dyn Engine>> {
            self.instantiations.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(eyre!("worker failed to start"));
            }
            Ok(Arc::new(NullEngine))
        }
    }

    fn boot(fail: bool) -> Arc<CountingBoot> {
        Arc::new(CountingBoot {
            instantiations: AtomicUsize::new(0),
            fail,
        })
    }

    #[test]
    fn test_get_memoizes_handle() {
        let b = boot(false);
        let provider = EngineProvider::new(b.clone());
        assert!(!provider.is_ready());
        let h1 = provider.get().unwrap();
        let h2 = provider.get().unwrap();
        assert!(h1.same_as(&h2));
        assert!(provider.is_ready());
        assert_eq!(b.instantiations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_is_memoized_until_reset() {
        let b = boot(true);
        let provider = EngineProvider::new(b.clone());
        let err = provider.get().unwrap_err();
        assert!(matches!(err, WorkbenchError::EngineBoot(ref m) if m.contains("worker failed")));
        assert!(provider.get().is_err());
        assert_eq!(b.instantiations.load(Ordering::SeqCst), 1);
        provider.reset();
        assert!(provider.get().is_err());
        assert_eq!(b.instantiations.load(Ordering::SeqCst), 2);
    }
}
