use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Check-in state for one club member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberState {
    #[serde(rename = "checkedIn")]
    pub checked_in: bool,
    #[serde(rename = "lastChanged")]
    pub last_changed: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    In,
    Out,
}

impl LogKind {
    pub fn label(&self) -> &'static str {
        match self {
            LogKind::In => "出勤",
            LogKind::Out => "退勤",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub timestamp: String,
}

/// Member name to check-in state. Entries appear lazily on first toggle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberStatus(BTreeMap<String, MemberState>);

impl MemberStatus {
    pub fn is_checked_in(&self, name: &str) -> bool {
        self.0.get(name).map(|s| s.checked_in).unwrap_or(false)
    }

    pub fn get(&self, name: &str) -> Option<&MemberState> {
        self.0.get(name)
    }

    /// Flip a member's state, stamp it, and return the matching log entry.
    pub fn toggle(&mut self, name: &str, timestamp: &str) -> LogEntry {
        let checked_in = !self.is_checked_in(name);
        self.0.insert(
            name.to_string(),
            MemberState {
                checked_in,
                last_changed: timestamp.to_string(),
            },
        );
        LogEntry {
            name: name.to_string(),
            kind: if checked_in { LogKind::In } else { LogKind::Out },
            timestamp: timestamp.to_string(),
        }
    }

    pub fn checked_in_count(&self) -> usize {
        self.0.values().filter(|s| s.checked_in).count()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_creates_entry_and_logs_in() {
        let mut status = MemberStatus::default();
        assert!(!status.is_checked_in("熱田 望"));

        let entry = status.toggle("熱田 望", "2024-11-02T00:00:00.000Z");
        assert_eq!(entry.kind, LogKind::In);
        assert!(status.is_checked_in("熱田 望"));
        assert_eq!(status.len(), 1);
        assert_eq!(
            status.get("熱田 望").map(|s| s.last_changed.as_str()),
            Some("2024-11-02T00:00:00.000Z")
        );
    }

    #[test]
    fn test_toggle_twice_logs_out() {
        let mut status = MemberStatus::default();
        status.toggle("池田 大翔", "t1");
        let entry = status.toggle("池田 大翔", "t2");
        assert_eq!(entry.kind, LogKind::Out);
        assert!(!status.is_checked_in("池田 大翔"));
        assert_eq!(status.len(), 1);
        assert_eq!(status.checked_in_count(), 0);
    }

    #[test]
    fn test_log_entry_json_shape() {
        let entry = LogEntry {
            name: "下田 聖".to_string(),
            kind: LogKind::Out,
            timestamp: "t".to_string(),
        };
        let json = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(json["type"], "out");
    }

    #[test]
    fn test_status_json_is_plain_map() {
        let mut status = MemberStatus::default();
        status.toggle("槇 啓秀", "t");
        let json = serde_json::to_value(&status).expect("serialize");
        assert_eq!(json["槇 啓秀"]["checkedIn"], true);
        assert_eq!(json["槇 啓秀"]["lastChanged"], "t");
    }
}
