//! Content area rendering, one module per group of views.

pub mod admin;
pub mod intake;
pub mod members;
pub mod menu;
