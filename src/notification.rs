// 🔔 Notifications - user-visible messages raised by imports and resets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// History kept in the database; older entries are pruned on insert.
pub const MAX_NOTIFICATIONS: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyKind {
    Info,
    Success,
    Warning,
}

impl NotifyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyKind::Info => "info",
            NotifyKind::Success => "success",
            NotifyKind::Warning => "warning",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(NotifyKind::Info),
            "success" => Some(NotifyKind::Success),
            "warning" => Some(NotifyKind::Warning),
            _ => None,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            NotifyKind::Info => "ℹ️",
            NotifyKind::Success => "✅",
            NotifyKind::Warning => "⚠️",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: NotifyKind,
    pub message: String,
}

impl Notification {
    pub fn new(kind: NotifyKind, message: impl Into<String>) -> Self {
        Notification {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotifyKind::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotifyKind::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NotifyKind::Warning, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_text() {
        for kind in [NotifyKind::Info, NotifyKind::Success, NotifyKind::Warning] {
            assert_eq!(NotifyKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(NotifyKind::parse("error"), None);
    }

    #[test]
    fn test_each_notification_gets_its_own_id() {
        let a = Notification::info("one");
        let b = Notification::warning("two");
        assert_ne!(a.id, b.id);
        assert_eq!(b.kind, NotifyKind::Warning);
        assert_eq!(a.message, "one");
    }
}
