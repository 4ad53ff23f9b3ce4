//! Core library for the shogi club reception kiosk.
//!
//! Everything the kiosk does that is not drawing to the terminal lives
//! here: the intake wizard, record persistence, admin checks, export,
//! notifications and view routing. The TUI crate wires these together.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod export;
pub mod models;
pub mod notify;
pub mod router;
pub mod store;
pub mod summary;
pub mod wizard;

use chrono::{SecondsFormat, Utc};

/// Current time as stored in records: RFC 3339, UTC, millisecond precision.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
