//! Terminal UI module using ratatui.
//!
//! This module provides the TUI rendering and input handling:
//!
//! - `render`: Main frame rendering and layout
//! - `input`: Keyboard event handling
//! - `styles`: Color schemes and text styling
//! - `screens`: Per-view content rendering (menu, intake, members, admin)

pub mod input;
pub mod render;
pub mod screens;
pub mod styles;
