//! Transient notifications shown in the corner of the screen.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Lifetime of info/success/warning notices
const DEFAULT_LIFETIME: Duration = Duration::from_millis(5000);

/// Errors stay up longer
const ERROR_LIFETIME: Duration = Duration::from_millis(7000);

/// Oldest notices are dropped beyond this
const MAX_NOTIFICATIONS: usize = 5;

pub const TITLE_SUCCESS: &str = "Thành công";
pub const TITLE_ERROR: &str = "Lỗi";
pub const TITLE_NOTICE: &str = "Thông báo";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    fn lifetime(&self) -> Duration {
        match self {
            NotificationKind::Error => ERROR_LIFETIME,
            _ => DEFAULT_LIFETIME,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct Notifications {
    items: VecDeque<Notification>,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: NotificationKind, title: &str, message: impl Into<String>) {
        self.push_at(kind, title, message, Instant::now());
    }

    pub fn push_at(
        &mut self,
        kind: NotificationKind,
        title: &str,
        message: impl Into<String>,
        now: Instant,
    ) {
        self.items.push_back(Notification {
            kind,
            title: title.to_string(),
            message: message.into(),
            expires_at: now + kind.lifetime(),
        });
        while self.items.len() > MAX_NOTIFICATIONS {
            self.items.pop_front();
        }
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(NotificationKind::Success, TITLE_SUCCESS, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(NotificationKind::Error, TITLE_ERROR, message);
    }

    /// Drop every notice whose lifetime has passed
    pub fn prune(&mut self, now: Instant) {
        self.items.retain(|n| n.expires_at > now);
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Notification> {
        self.items.iter()
    }

    pub fn latest(&self) -> Option<&Notification> {
        self.items.back()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_outlive_other_notices() {
        let now = Instant::now();
        let mut notes = Notifications::new();
        notes.push_at(NotificationKind::Success, TITLE_SUCCESS, "ok", now);
        notes.push_at(NotificationKind::Error, TITLE_ERROR, "boom", now);

        notes.prune(now + Duration::from_millis(5001));
        let left: Vec<&str> = notes.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(left, vec!["boom"]);

        notes.prune(now + Duration::from_millis(7001));
        assert!(notes.is_empty());
    }

    #[test]
    fn test_queue_is_bounded() {
        let now = Instant::now();
        let mut notes = Notifications::new();
        for i in 0..(MAX_NOTIFICATIONS + 2) {
            notes.push_at(NotificationKind::Info, TITLE_NOTICE, i.to_string(), now);
        }
        assert_eq!(notes.iter().count(), MAX_NOTIFICATIONS);
        assert_eq!(notes.iter().next().unwrap().message, "2");
        assert_eq!(
            notes.latest().unwrap().message,
            (MAX_NOTIFICATIONS + 1).to_string()
        );
    }

    #[test]
    fn test_iter_rev_yields_newest_first() {
        let now = Instant::now();
        let mut notes = Notifications::new();
        notes.push_at(NotificationKind::Info, TITLE_NOTICE, "cũ", now);
        notes.push_at(NotificationKind::Warning, TITLE_NOTICE, "mới", now);

        let newest_first: Vec<&str> = notes.iter().rev().map(|n| n.message.as_str()).collect();
        assert_eq!(newest_first, vec!["mới", "cũ"]);
    }

    #[test]
    fn test_helpers_set_titles() {
        let mut notes = Notifications::new();
        notes.success("Tạo thiết bị thành công!");
        assert_eq!(notes.latest().unwrap().title, "Thành công");
        notes.error("Không thể tạo thiết bị");
        assert_eq!(notes.latest().unwrap().kind, NotificationKind::Error);
        assert_eq!(notes.latest().unwrap().title, "Lỗi");
    }
}
