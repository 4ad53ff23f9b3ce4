//! Data models for reception records.
//!
//! This module contains the structures persisted by the record stores:
//!
//! - `Category`, `VisitorRecord` and the per-category record shapes
//! - `VisitorLists`: all visitor collections side by side
//! - `MemberStatus`, `LogEntry`: club member check-in state and history
//! - `CustomMessages`: admin-edited completion screen text

pub mod member;
pub mod messages;
pub mod visitor;

pub use member::{LogEntry, LogKind, MemberState, MemberStatus};
pub use messages::{default_message, CustomMessages};
pub use visitor::{
    AlumniVisit, Category, ExtraQuestion, GroupVisit, ParentVisit, StudentVisitor, VisitorLists,
    VisitorRecord,
};
