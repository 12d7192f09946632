//! Primary/fallback executor selection.

use super::worker::{Job, PoolError, WorkerPool};
use crate::source::SourceKind;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Which pool a unit of work was submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    Primary,
    Fallback,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::Primary => write!(f, "primary"),
            PoolKind::Fallback => write!(f, "fallback"),
        }
    }
}

/// The primary pool plus a lazily created fallback pool.
///
/// Slow (network) work always goes to the primary pool. Fast work goes to
/// the primary pool unless every primary worker is busy, in which case it
/// runs on the fallback pool so it does not queue behind slow downloads.
pub struct ExecutorPools {
    name: String,
    primary: Arc<WorkerPool>,
    fallback: Mutex<Option<Arc<WorkerPool>>>,
    fallback_threads: usize,
}

impl ExecutorPools {
    /// Starts the primary pool. The fallback pool is started on first use.
    pub fn new(
        name: impl Into<String>,
        primary_threads: usize,
        fallback_threads: usize,
    ) -> Result<Self, PoolError> {
        let name = name.into();
        let primary = WorkerPool::new(format!("{}-primary", name), primary_threads)?;
        Ok(Self {
            name,
            primary: Arc::new(primary),
            fallback: Mutex::new(None),
            fallback_threads: fallback_threads.max(1),
        })
    }

    /// Decides which pool should run work for `source`.
    pub fn choose(&self, source: SourceKind) -> PoolKind {
        if source.is_slow() {
            return PoolKind::Primary;
        }
        if self.primary.is_saturated() {
            PoolKind::Fallback
        } else {
            PoolKind::Primary
        }
    }

    /// Selects a pool for `source`, creating the fallback pool if needed.
    pub fn select(&self, source: SourceKind) -> Result<(PoolKind, Arc<WorkerPool>), PoolError> {
        match self.choose(source) {
            PoolKind::Primary => Ok((PoolKind::Primary, Arc::clone(&self.primary))),
            PoolKind::Fallback => Ok((PoolKind::Fallback, self.fallback_pool()?)),
        }
    }

    /// Selects a pool for `source` and submits `job` to it.
    pub fn submit(&self, source: SourceKind, job: Job) -> Result<PoolKind, PoolError> {
        let (kind, pool) = self.select(source)?;
        pool.execute(job)?;
        debug!(pool = %kind, source = %source, "Submitted load unit");
        Ok(kind)
    }

    fn fallback_pool(&self) -> Result<Arc<WorkerPool>, PoolError> {
        let mut fallback = self.fallback.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pool) = fallback.as_ref() {
            return Ok(Arc::clone(pool));
        }
        if self.primary.is_shutdown() {
            return Err(PoolError::Shutdown(format!("{}-fallback", self.name)));
        }

        let pool = Arc::new(WorkerPool::new(
            format!("{}-fallback", self.name),
            self.fallback_threads,
        )?);
        info!(
            threads = self.fallback_threads,
            "Primary pool saturated, started fallback pool"
        );
        *fallback = Some(Arc::clone(&pool));
        Ok(pool)
    }

    pub fn primary(&self) -> &Arc<WorkerPool> {
        &self.primary
    }

    /// The fallback pool, if it has been started.
    pub fn fallback(&self) -> Option<Arc<WorkerPool>> {
        self.fallback
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Running jobs across both pools.
    pub fn active_count(&self) -> usize {
        self.primary.active_count() + self.fallback().map_or(0, |p| p.active_count())
    }

    /// Stops both pools from accepting work.
    pub fn shutdown(&self) {
        self.primary.shutdown();
        if let Some(fallback) = self.fallback() {
            fallback.shutdown();
        }
    }

    /// Shuts down and joins both pools.
    pub fn join(&self) {
        self.primary.join();
        if let Some(fallback) = self.fallback() {
            fallback.join();
        }
    }
}
