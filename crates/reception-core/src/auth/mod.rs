//! Access control and secrets.
//!
//! This module provides:
//! - `AdminGate`: password checks for the admin console and the reset screen
//! - `CredentialStore`: the realtime database token kept in the OS keychain

pub mod admin;
pub mod credentials;

pub use admin::{AdminError, AdminGate};
pub use credentials::CredentialStore;
