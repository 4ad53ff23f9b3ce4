//! Persistence for visitor records, member check-ins and completion messages.
//!
//! `RecordStore` is the seam between the kiosk and wherever the data lives.
//! Three backends implement it:
//! - `LocalStore`: one JSON file per collection in the data directory
//! - `MemoryStore`: in-process, for rehearsal runs and tests
//! - `RemoteStore`: a Firebase Realtime Database over its REST API
//!
//! The trait returns boxed futures so it can be shared as
//! `Arc<dyn RecordStore>` between the UI and background tasks.

pub mod error;
pub mod local;
pub mod memory;
pub mod push_id;
pub mod remote;

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::{Backend, Config};
use crate::models::{CustomMessages, LogEntry, MemberStatus, VisitorLists, VisitorRecord};

pub use error::{RemoteError, StoreError};
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use remote::RemoteStore;

/// Everything the kiosk reads, as of one load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub visitors: VisitorLists,
    pub member_status: MemberStatus,
    pub member_log: Vec<LogEntry>,
    pub messages: CustomMessages,
}

impl Snapshot {
    /// Remove the first record equal to `record`.
    pub fn remove_record(&mut self, record: &VisitorRecord) -> Result<(), StoreError> {
        if self.visitors.remove(record) {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }

    /// Flip a member's status and append the matching log entry.
    pub fn toggle_member(&mut self, name: &str, at: &str) -> LogEntry {
        let entry = self.member_status.toggle(name, at);
        self.member_log.push(entry.clone());
        entry
    }

    /// Clear visitors, member status and the log. Messages survive.
    pub fn reset(&mut self) {
        self.visitors.clear();
        self.member_status.clear();
        self.member_log.clear();
    }
}

pub trait RecordStore: Send + Sync {
    /// Short backend name for logs and the status bar.
    fn name(&self) -> &'static str;

    fn load(&self) -> BoxFuture<'_, Result<Snapshot, StoreError>>;

    /// Persist one submission. Either every record lands or none does.
    fn append_many(&self, records: Vec<VisitorRecord>) -> BoxFuture<'_, Result<(), StoreError>>;

    fn append(&self, record: VisitorRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        self.append_many(vec![record])
    }

    /// Delete the first stored record equal to `record`.
    fn remove(&self, record: VisitorRecord) -> BoxFuture<'_, Result<(), StoreError>>;

    fn reset_all(&self) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Flip a member's check-in state and log it in the same write.
    fn toggle_member(&self, name: String, at: String) -> BoxFuture<'_, Result<LogEntry, StoreError>>;

    fn save_messages(&self, messages: CustomMessages) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Whether `watch` delivers change notifications for this backend.
    fn supports_watch(&self) -> bool {
        false
    }

    /// Send a fresh snapshot through `updates` whenever the stored data
    /// changes, starting with the current contents. Runs until the
    /// subscription ends; `Ok` means the receiver went away.
    fn watch(&self, updates: mpsc::Sender<Snapshot>) -> BoxFuture<'_, Result<(), StoreError>> {
        let name = self.name();
        Box::pin(async move {
            drop(updates);
            Err(StoreError::Unavailable(format!(
                "{} store has no change notifications",
                name
            )))
        })
    }
}

/// A batch is one submission: non-empty, one category, one timestamp.
pub fn check_batch(records: &[VisitorRecord]) -> Result<(), StoreError> {
    let first = records
        .first()
        .ok_or_else(|| StoreError::InconsistentBatch("empty batch".to_string()))?;

    if records.iter().any(|r| r.category() != first.category()) {
        return Err(StoreError::InconsistentBatch("mixed categories".to_string()));
    }
    if records.iter().any(|r| r.timestamp() != first.timestamp()) {
        return Err(StoreError::InconsistentBatch("mixed timestamps".to_string()));
    }
    Ok(())
}

/// Build the backend selected in `config`.
pub fn open(config: &Config, token: Option<String>) -> Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match config.backend {
        Backend::Local => {
            let dir = config.data_dir()?;
            Arc::new(
                LocalStore::new(dir.clone())
                    .with_context(|| format!("Failed to open data directory {}", dir.display()))?,
            )
        }
        Backend::Memory => Arc::new(MemoryStore::new()),
        Backend::Remote => {
            let url = config
                .database_url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .context("backend is \"remote\" but database_url is not set")?;
            Arc::new(RemoteStore::new(url, token)?)
        }
    };
    info!(backend = store.name(), "Record store ready");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GroupVisit, StudentVisitor};

    fn student(id: &str, ts: &str) -> VisitorRecord {
        VisitorRecord::Student(StudentVisitor {
            grade: "高1".to_string(),
            class: "B".to_string(),
            student_id: id.to_string(),
            shogi_strength: "初段".to_string(),
            timestamp: ts.to_string(),
        })
    }

    #[test]
    fn test_check_batch_accepts_shared_timestamp() {
        let batch = vec![student("1", "t"), student("2", "t")];
        assert!(check_batch(&batch).is_ok());
    }

    #[test]
    fn test_check_batch_rejects_mixed_timestamps() {
        let batch = vec![student("1", "t1"), student("2", "t2")];
        assert!(matches!(
            check_batch(&batch),
            Err(StoreError::InconsistentBatch(_))
        ));
    }

    #[test]
    fn test_check_batch_rejects_mixed_categories_and_empty() {
        let batch = vec![
            student("1", "t"),
            VisitorRecord::External(GroupVisit {
                count: 1,
                shogi_strength: "特にない".to_string(),
                timestamp: "t".to_string(),
            }),
        ];
        assert!(check_batch(&batch).is_err());
        assert!(check_batch(&[]).is_err());
    }

    #[test]
    fn test_snapshot_reset_keeps_messages() {
        let mut snapshot = Snapshot::default();
        snapshot.visitors.push(student("1", "t"));
        snapshot.toggle_member("熱田 望", "t");
        snapshot
            .messages
            .set(crate::models::Category::Student, "ようこそ");

        snapshot.reset();
        assert!(snapshot.visitors.is_empty());
        assert!(snapshot.member_status.is_empty());
        assert!(snapshot.member_log.is_empty());
        assert!(snapshot.messages.is_customized(crate::models::Category::Student));
    }

    #[test]
    fn test_snapshot_remove_missing_is_not_found() {
        let mut snapshot = Snapshot::default();
        assert!(matches!(
            snapshot.remove_record(&student("1", "t")),
            Err(StoreError::NotFound)
        ));
    }
}
