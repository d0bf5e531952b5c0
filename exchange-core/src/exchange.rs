//! Main exchange orchestration layer
//!
//! This module ties together storage, the commit actor and metrics into the
//! high-level API used by the gateway. The engines (`enrollment`,
//! `completion`, `admin`, ...) extend [`Exchange`] with their operations.
//!
//! # Example
//!
//! ```no_run
//! use exchange_core::{Config, Exchange};
//!
//! #[tokio::main]
//! async fn main() -> exchange_core::Result<()> {
//!     let config = Config::default();
//!     let exchange = Exchange::open(config).await?;
//!
//!     // let balance = exchange.enroll(&identity, course_id).await?;
//!
//!     exchange.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_commit_actor, StoreHandle},
    metrics::Metrics,
    storage::{CommitReceipt, Storage, WriteBatch},
    Config, Error, Result,
};
use std::sync::Arc;

/// Main exchange interface
#[derive(Debug)]
pub struct Exchange {
    /// Writer handle for mutations
    pub(crate) handle: StoreHandle,

    /// Direct storage access (for reads)
    pub(crate) storage: Arc<Storage>,

    /// Metrics
    pub(crate) metrics: Metrics,

    /// Configuration
    pub(crate) config: Config,
}

impl Exchange {
    /// Open exchange with configuration
    pub async fn open(config: Config) -> Result<Self> {
        Self::open_with_metrics(config, Metrics::new().map_err(|e| Error::Config(e.to_string()))?)
            .await
    }

    /// Open exchange reporting into an existing metrics collector
    pub async fn open_with_metrics(config: Config, metrics: Metrics) -> Result<Self> {
        config.validate()?;

        let storage = Arc::new(Storage::open(&config)?);

        let snapshot_interval = if config.snapshot.enabled {
            config.snapshot.interval_commits
        } else {
            0
        };
        let handle = spawn_commit_actor(
            storage.clone(),
            config.concurrency.mailbox_capacity,
            snapshot_interval,
            metrics.clone(),
        );

        Ok(Self {
            handle,
            storage,
            metrics,
            config,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Read-only store access
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Write a snapshot immediately
    pub async fn snapshot(&self) -> Result<()> {
        self.handle.snapshot().await
    }

    /// Shutdown exchange, flushing a final snapshot
    pub async fn shutdown(&self) -> Result<()> {
        self.handle.shutdown().await
    }

    /// Run an optimistic read-validate-commit cycle
    ///
    /// `plan` reads current state, checks business rules and stages one
    /// batch. When another writer got there first the batch is rejected with
    /// `Conflict` and `plan` runs again against fresh state, so a retried
    /// plan re-evaluates every precondition.
    pub(crate) async fn commit_planned<T, F>(&self, operation: &'static str, mut plan: F) -> Result<(T, CommitReceipt)>
    where
        F: FnMut(&Storage) -> Result<(T, WriteBatch)>,
    {
        let attempts = self.config.concurrency.max_commit_retries;

        for attempt in 1..=attempts {
            let (output, batch) = plan(&self.storage)?;

            match self.handle.commit(batch).await {
                Ok(receipt) => return Ok((output, receipt)),
                Err(Error::Conflict(reason)) => {
                    tracing::debug!(operation, attempt, %reason, "Retrying after write conflict");
                }
                Err(e) => {
                    if e.is_internal() {
                        tracing::error!(operation, attempt, "Commit failed: {}", e);
                    }
                    return Err(e);
                }
            }
        }

        tracing::warn!(operation, attempts, "Giving up after repeated write conflicts");
        Err(Error::Conflict(format!(
            "{} did not commit after {} attempts",
            operation, attempts
        )))
    }
}
