//! Single-slot notification shown at the bottom of every screen.
//!
//! A new message replaces whatever is showing. Messages expire after a
//! fixed time; callers pass `now` so expiry is testable.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub text: String,
    pub shown_at: Instant,
}

#[derive(Debug, Clone)]
pub struct Notifier {
    current: Option<Notification>,
    ttl: Duration,
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        Self { current: None, ttl }
    }

    pub fn show(&mut self, level: Level, text: impl Into<String>, now: Instant) {
        self.current = Some(Notification {
            level,
            text: text.into(),
            shown_at: now,
        });
    }

    pub fn success(&mut self, text: impl Into<String>, now: Instant) {
        self.show(Level::Success, text, now);
    }

    pub fn error(&mut self, text: impl Into<String>, now: Instant) {
        self.show(Level::Error, text, now);
    }

    /// The visible notification, if it has not expired by `now`.
    pub fn current(&self, now: Instant) -> Option<&Notification> {
        self.current
            .as_ref()
            .filter(|n| now.saturating_duration_since(n.shown_at) < self.ttl)
    }

    /// Drop an expired notification. Returns whether one was dropped.
    pub fn expire(&mut self, now: Instant) -> bool {
        if self.current.is_some() && self.current(now).is_none() {
            self.current = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_replaces_old() {
        let now = Instant::now();
        let mut notifier = Notifier::new(Duration::from_secs(4));
        notifier.error("first", now);
        notifier.success("second", now);
        let current = notifier.current(now).expect("visible");
        assert_eq!(current.text, "second");
        assert_eq!(current.level, Level::Success);
    }

    #[test]
    fn test_expiry() {
        let now = Instant::now();
        let mut notifier = Notifier::new(Duration::from_secs(4));
        notifier.error("oops", now);
        assert!(notifier.current(now + Duration::from_secs(3)).is_some());
        assert!(notifier.current(now + Duration::from_secs(4)).is_none());

        assert!(!notifier.expire(now + Duration::from_secs(1)));
        assert!(notifier.expire(now + Duration::from_secs(5)));
        assert!(notifier.current(now).is_none());
    }
}
