//! JSON-file backend.
//!
//! Each collection lives in `<data_dir>/<key>.json`, using the same keys the
//! browser kiosk used for localStorage. A missing or unreadable file reads
//! as the empty default. Writes replace a whole collection through a
//! temporary file and a rename, so a reader never sees half a file.
//! Operations touching several collections stage every temporary file
//! first and put the old contents back if any rename fails.

use std::path::PathBuf;

use futures::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{check_batch, RecordStore, Snapshot, StoreError};
use crate::models::{
    Category, CustomMessages, LogEntry, MemberStatus, VisitorLists, VisitorRecord,
};

const MEMBER_STATUS_KEY: &str = "shogi_memberStatus";
const MEMBER_LOG_KEY: &str = "shogi_memberLog";
const MESSAGES_KEY: &str = "shogi_customMessages";

pub struct LocalStore {
    data_dir: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(data_dir: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }

    /// Existing JSON at `key`, or the default if absent or unparsable.
    fn read_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let path = self.path(key);
        if !path.exists() {
            return T::default();
        }

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(key, error = %e, "Failed to read collection, using empty default");
                return T::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to parse collection, using empty default");
                T::default()
            }
        }
    }

    fn tmp_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json.tmp", key))
    }

    fn write<T: Serialize + ?Sized>(&self, key: &'static str, value: &T) -> Result<(), StoreError> {
        self.write_all(vec![StagedWrite::new(key, value)?])
    }

    /// Replace several collections as one unit: either every file holds
    /// its new contents afterwards or every file holds its old contents.
    fn write_all(&self, writes: Vec<StagedWrite>) -> Result<(), StoreError> {
        for (i, write) in writes.iter().enumerate() {
            if let Err(e) = std::fs::write(self.tmp_path(write.key), &write.contents) {
                self.discard_tmp(&writes[..=i]);
                return Err(e.into());
            }
        }

        // Contents to restore if a later rename fails. `None` means the
        // collection did not exist yet.
        let mut previous = Vec::with_capacity(writes.len());
        for write in &writes {
            let path = self.path(write.key);
            previous.push(if path.is_file() {
                match std::fs::read(&path) {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        self.discard_tmp(&writes);
                        return Err(e.into());
                    }
                }
            } else {
                None
            });
        }

        for (i, write) in writes.iter().enumerate() {
            if let Err(e) = std::fs::rename(self.tmp_path(write.key), self.path(write.key)) {
                warn!(key = write.key, error = %e, "Write failed, restoring earlier collections");
                self.restore(&writes[..i], &previous[..i]);
                self.discard_tmp(&writes[i..]);
                return Err(e.into());
            }
        }

        for write in &writes {
            debug!(key = write.key, "Collection written");
        }
        Ok(())
    }

    fn restore(&self, writes: &[StagedWrite], previous: &[Option<Vec<u8>>]) {
        for (write, old) in writes.iter().zip(previous) {
            let path = self.path(write.key);
            let result = match old {
                Some(bytes) => std::fs::write(&path, bytes),
                None => std::fs::remove_file(&path),
            };
            if let Err(e) = result {
                warn!(key = write.key, error = %e, "Failed to restore collection");
            }
        }
    }

    fn discard_tmp(&self, writes: &[StagedWrite]) {
        for write in writes {
            let _ = std::fs::remove_file(self.tmp_path(write.key));
        }
    }

    fn read_visitors(&self) -> VisitorLists {
        VisitorLists {
            students: self.read_or_default(Category::Student.storage_key()),
            external: self.read_or_default(Category::External.storage_key()),
            parents: self.read_or_default(Category::Parent.storage_key()),
            alumni: self.read_or_default(Category::Alumni.storage_key()),
            teachers: self.read_or_default(Category::Teacher.storage_key()),
        }
    }

    fn write_category(&self, lists: &VisitorLists, category: Category) -> Result<(), StoreError> {
        self.write_all(vec![StagedWrite::category(lists, category)?])
    }

    fn read_snapshot(&self) -> Snapshot {
        Snapshot {
            visitors: self.read_visitors(),
            member_status: self.read_or_default(MEMBER_STATUS_KEY),
            member_log: self.read_or_default(MEMBER_LOG_KEY),
            messages: self.read_or_default(MESSAGES_KEY),
        }
    }
}

/// One collection's serialized contents, waiting to be renamed into place.
struct StagedWrite {
    key: &'static str,
    contents: String,
}

impl StagedWrite {
    fn new<T: Serialize + ?Sized>(key: &'static str, value: &T) -> Result<Self, StoreError> {
        Ok(Self {
            key,
            contents: serde_json::to_string_pretty(value)?,
        })
    }

    fn category(lists: &VisitorLists, category: Category) -> Result<Self, StoreError> {
        let key = category.storage_key();
        match category {
            Category::Student => Self::new(key, &lists.students),
            Category::External => Self::new(key, &lists.external),
            Category::Parent => Self::new(key, &lists.parents),
            Category::Alumni => Self::new(key, &lists.alumni),
            Category::Teacher => Self::new(key, &lists.teachers),
        }
    }
}

impl RecordStore for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    fn load(&self) -> BoxFuture<'_, Result<Snapshot, StoreError>> {
        Box::pin(async move { Ok(self.read_snapshot()) })
    }

    fn append_many(&self, records: Vec<VisitorRecord>) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            check_batch(&records)?;
            let category = records[0].category();

            let _guard = self.write_lock.lock().await;
            let mut lists = self.read_visitors();
            let count = records.len();
            for record in records {
                lists.push(record);
            }
            self.write_category(&lists, category)?;
            debug!(?category, count, "Appended visitor batch");
            Ok(())
        })
    }

    fn remove(&self, record: VisitorRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let mut lists = self.read_visitors();
            if !lists.remove(&record) {
                return Err(StoreError::NotFound);
            }
            self.write_category(&lists, record.category())
        })
    }

    fn reset_all(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let empty = VisitorLists::default();
            let mut writes = Category::ALL
                .iter()
                .map(|c| StagedWrite::category(&empty, *c))
                .collect::<Result<Vec<_>, _>>()?;
            writes.push(StagedWrite::new(MEMBER_STATUS_KEY, &MemberStatus::default())?);
            writes.push(StagedWrite::new(MEMBER_LOG_KEY, &Vec::<LogEntry>::new())?);
            self.write_all(writes)
        })
    }

    fn toggle_member(&self, name: String, at: String) -> BoxFuture<'_, Result<LogEntry, StoreError>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let mut snapshot = Snapshot {
                member_status: self.read_or_default(MEMBER_STATUS_KEY),
                member_log: self.read_or_default(MEMBER_LOG_KEY),
                ..Snapshot::default()
            };
            let entry = snapshot.toggle_member(&name, &at);
            self.write_all(vec![
                StagedWrite::new(MEMBER_LOG_KEY, &snapshot.member_log)?,
                StagedWrite::new(MEMBER_STATUS_KEY, &snapshot.member_status)?,
            ])?;
            Ok(entry)
        })
    }

    fn save_messages(&self, messages: CustomMessages) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            self.write(MESSAGES_KEY, &messages)
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
