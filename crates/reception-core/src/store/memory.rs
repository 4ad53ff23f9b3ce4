//! In-process backend. Nothing survives a restart.

use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::debug;

use super::{check_batch, RecordStore, Snapshot, StoreError};
use crate::models::{CustomMessages, LogEntry, VisitorRecord};

#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Snapshot>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("write failure injected".to_string()))
        } else {
            Ok(())
        }
    }
}

impl RecordStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load(&self) -> BoxFuture<'_, Result<Snapshot, StoreError>> {
        Box::pin(async move { Ok(self.data.lock().await.clone()) })
    }

    fn append_many(&self, records: Vec<VisitorRecord>) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            check_batch(&records)?;
            self.check_writable()?;
            let mut data = self.data.lock().await;
            debug!(count = records.len(), "Appending to memory store");
            for record in records {
                data.visitors.push(record);
            }
            Ok(())
        })
    }

    fn remove(&self, record: VisitorRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.check_writable()?;
            self.data.lock().await.remove_record(&record)
        })
    }

    fn reset_all(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.check_writable()?;
            self.data.lock().await.reset();
            Ok(())
        })
    }

    fn toggle_member(&self, name: String, at: String) -> BoxFuture<'_, Result<LogEntry, StoreError>> {
        Box::pin(async move {
            self.check_writable()?;
            Ok(self.data.lock().await.toggle_member(&name, &at))
        })
    }

    fn save_messages(&self, messages: CustomMessages) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.check_writable()?;
            self.data.lock().await.messages = messages;
            Ok(())
        })
    }
}
