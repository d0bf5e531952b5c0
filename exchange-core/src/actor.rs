//! Single-writer commit actor
//!
//! All mutations are funnelled through one Tokio task:
//! - One logical writer eliminates lost updates between version check and apply
//! - Bounded mailbox gives backpressure to request handlers
//! - Snapshots are taken by the writer every N commits and on shutdown
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │            HTTP handlers / engine calls               │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ WriteBatch
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               StoreHandle (Clone)                     │
//! │         Sends messages to actor mailbox               │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              CommitActor (Single Task)                │
//! │     version check + apply  →  Storage::apply()        │
//! │     every N commits        →  Storage::save_snapshot()│
//! └──────────────────────────────────────────────────────┘
//! ```

use crate::metrics::Metrics;
use crate::storage::{CommitReceipt, Storage, WriteBatch};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the commit actor
pub enum StoreMessage {
    /// Commit a batch atomically
    Commit {
        batch: WriteBatch,
        response: oneshot::Sender<Result<CommitReceipt>>,
    },

    /// Write a snapshot now
    Snapshot {
        response: oneshot::Sender<Result<()>>,
    },

    /// Shutdown actor
    Shutdown {
        response: oneshot::Sender<Result<()>>,
    },
}

/// Actor that owns every write to the store
pub struct CommitActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<StoreMessage>,

    /// Snapshot every N commits (0 disables periodic snapshots)
    snapshot_interval: u64,

    /// Commits since last snapshot
    commits_since_snapshot: u64,

    /// Metrics sink
    metrics: Metrics,
}

impl CommitActor {
    /// Create new actor
    pub fn new(
        storage: Arc<Storage>,
        mailbox: mpsc::Receiver<StoreMessage>,
        snapshot_interval: u64,
        metrics: Metrics,
    ) -> Self {
        Self {
            storage,
            mailbox,
            snapshot_interval,
            commits_since_snapshot: 0,
            metrics,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                StoreMessage::Commit { batch, response } => {
                    let result = self.commit(batch);
                    let _ = response.send(result);
                }

                StoreMessage::Snapshot { response } => {
                    let result = self.snapshot();
                    let _ = response.send(result);
                }

                StoreMessage::Shutdown { response } => {
                    let result = self.storage.close();
                    let _ = response.send(result);
                    return;
                }
            }
        }

        // Mailbox closed without an explicit shutdown
        if let Err(e) = self.storage.close() {
            tracing::error!("Error closing store: {}", e);
        }
    }

    fn commit(&mut self, batch: WriteBatch) -> Result<CommitReceipt> {
        let label = batch.label();
        let ops = batch.len();
        let started = Instant::now();

        let result = self.storage.apply(batch);
        self.metrics
            .commit_duration
            .observe(started.elapsed().as_secs_f64());

        match &result {
            Ok(receipt) => {
                self.metrics.commits_total.inc();
                tracing::debug!(batch = label, ops, commit_seq = receipt.commit_seq, "Commit applied");

                self.commits_since_snapshot += 1;
                if self.snapshot_interval > 0 && self.commits_since_snapshot >= self.snapshot_interval {
                    if let Err(e) = self.snapshot() {
                        tracing::error!(batch = label, "Error writing snapshot: {}", e);
                    }
                }
            }
            Err(Error::Conflict(reason)) => {
                self.metrics.conflicts_total.inc();
                tracing::debug!(batch = label, %reason, "Commit rejected on version conflict");
            }
            Err(e) if e.is_internal() => {
                tracing::error!(batch = label, ops, "Commit failed: {}", e);
            }
            Err(e) => {
                tracing::debug!(batch = label, "Commit rejected: {}", e);
            }
        }

        result
    }

    fn snapshot(&mut self) -> Result<()> {
        self.storage.save_snapshot()?;
        self.commits_since_snapshot = 0;
        Ok(())
    }
}

/// Handle for sending messages to the actor
#[derive(Clone, Debug)]
pub struct StoreHandle {
    sender: mpsc::Sender<StoreMessage>,
}

impl StoreHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<StoreMessage>) -> Self {
        Self { sender }
    }

    /// Commit a batch and wait for the outcome
    pub async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(StoreMessage::Commit { batch, response: tx })
            .await
            .map_err(|_| Error::Concurrency("Writer mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Write a snapshot immediately
    pub async fn snapshot(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(StoreMessage::Snapshot { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Writer mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Flush and stop the writer
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(StoreMessage::Shutdown { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Writer mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }
}

/// Spawn the commit actor
pub fn spawn_commit_actor(
    storage: Arc<Storage>,
    mailbox_capacity: usize,
    snapshot_interval: u64,
    metrics: Metrics,
) -> StoreHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let actor = CommitActor::new(storage, rx, snapshot_interval, metrics);

    tokio::spawn(async move {
        actor.run().await;
    });

    StoreHandle::new(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Account, AccountId, Role};
    use crate::Config;
    use chrono::Utc;

    fn account() -> Account {
        Account {
            id: AccountId::generate(),
            name: "Linus".to_string(),
            email: format!("{}@example.com", uuid::Uuid::new_v4()),
            credential_hash: String::new(),
            google_id: None,
            facebook_id: None,
            bio: None,
            credits: 5,
            role: Role::User,
            enrolled_courses: vec![],
            completed_courses: vec![],
            created_courses: vec![],
            skills_to_teach: vec![],
            skills_to_learn: vec![],
            created_at: Utc::now(),
            version: 0,
        }
    }

    fn open_storage() -> (Arc<Storage>, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Arc::new(Storage::open(&config).unwrap()), temp_dir)
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let (storage, _temp) = open_storage();
        let handle = spawn_commit_actor(storage, 16, 10, Metrics::default());

        handle.shutdown().await.unwrap();
        assert!(handle.commit(WriteBatch::new("late")).await.is_err());
    }

    #[tokio::test]
    async fn test_actor_commit() {
        let (storage, _temp) = open_storage();
        let handle = spawn_commit_actor(storage.clone(), 16, 10, Metrics::default());

        let acc = account();
        let mut batch = WriteBatch::new("insert");
        batch.put_account(acc.clone());
        let receipt = handle.commit(batch).await.unwrap();

        assert_eq!(receipt.commit_seq, 1);
        assert_eq!(storage.get_account(acc.id).unwrap().version, 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_writers_see_one_winner() {
        let (storage, _temp) = open_storage();
        let handle = spawn_commit_actor(storage.clone(), 16, 0, Metrics::default());

        let acc = account();
        let mut batch = WriteBatch::new("insert");
        batch.put_account(acc.clone());
        handle.commit(batch).await.unwrap();

        let snapshot = storage.get_account(acc.id).unwrap();
        let mut tasks = Vec::new();
        for i in 0..8 {
            let handle = handle.clone();
            let mut copy = snapshot.clone();
            copy.credits = i;
            tasks.push(tokio::spawn(async move {
                let mut batch = WriteBatch::new("race");
                batch.put_account(copy);
                handle.commit(batch).await
            }));
        }

        let mut wins = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(storage.get_account(acc.id).unwrap().version, 2);

        handle.shutdown().await.unwrap();
    }
}
