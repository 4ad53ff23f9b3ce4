//! Top-level screen selection.
//!
//! Moving between views is plain assignment with no history. The router
//! also owns the two automatic returns to the main screen: after the
//! completion screen has been up for a while, and after the member screen
//! has seen no input for a while.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::models::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Main,
    Intake(Category),
    Members,
    Completion(Category),
    AdminLogin,
    Admin,
    AdminReset,
}

impl View {
    pub fn requires_admin(&self) -> bool {
        matches!(self, View::Admin | View::AdminReset)
    }
}

#[derive(Debug, Clone)]
pub struct Router {
    view: View,
    entered_at: Instant,
    last_input: Instant,
    completion_timeout: Duration,
    member_idle_timeout: Duration,
}

impl Router {
    pub fn new(completion_timeout: Duration, member_idle_timeout: Duration, now: Instant) -> Self {
        Self {
            view: View::Main,
            entered_at: now,
            last_input: now,
            completion_timeout,
            member_idle_timeout,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// Switch views. Admin views fall back to Main without a login.
    pub fn go(&mut self, view: View, authenticated: bool, now: Instant) -> View {
        let target = if view.requires_admin() && !authenticated {
            View::Main
        } else {
            view
        };
        if target != self.view {
            debug!(from = ?self.view, to = ?target, "View change");
        }
        self.view = target;
        self.entered_at = now;
        self.last_input = now;
        target
    }

    /// Record user input for the idle timer.
    pub fn touch(&mut self, now: Instant) {
        self.last_input = now;
    }

    /// Apply timeouts. Returns whether the view changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let expired = match self.view {
            View::Completion(_) => {
                now.saturating_duration_since(self.entered_at) >= self.completion_timeout
            }
            View::Members => {
                now.saturating_duration_since(self.last_input) >= self.member_idle_timeout
            }
            _ => false,
        };
        if expired {
            self.go(View::Main, false, now);
        }
        expired
    }
}
