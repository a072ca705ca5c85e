//! Notification records and the bounded, newest-first notification feed.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Maximum number of notifications kept in the feed by default.
pub const DEFAULT_FEED_CAPACITY: usize = 50;

/// Notification category, carried in the wire `type` field.
///
/// Unrecognised categories are kept verbatim in [`NotificationKind::Other`]
/// so that a bootstrap list containing server-added kinds still loads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    /// Informational message.
    Info,
    /// Something completed successfully.
    Success,
    /// Something needs attention.
    Warning,
    /// Something failed.
    Error,
    /// A task finished.
    TaskComplete,
    /// A task failed.
    TaskFailed,
    /// A server-wide alert.
    SystemAlert,
    /// A server-wide notification.
    SystemNotification,
    /// Any other category.
    Other(String),
}

impl NotificationKind {
    /// Returns the wire name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::TaskComplete => "task_complete",
            Self::TaskFailed => "task_failed",
            Self::SystemAlert => "system_alert",
            Self::SystemNotification => "system_notification",
            Self::Other(other) => other,
        }
    }

    /// Returns `true` if an inbound message of this kind is prepended to
    /// the feed.
    #[must_use]
    pub const fn is_feed_kind(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Human-readable title used when the server omits one.
    #[must_use]
    pub fn default_title(&self) -> &str {
        match self {
            Self::Info => "Info",
            Self::Success => "Success",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::TaskComplete => "Task Completed",
            Self::TaskFailed => "Task Failed",
            Self::SystemAlert => "System Alert",
            Self::SystemNotification => "System Notification",
            Self::Other(other) => other,
        }
    }
}

impl From<&str> for NotificationKind {
    fn from(s: &str) -> Self {
        match s {
            "info" => Self::Info,
            "success" => Self::Success,
            "warning" => Self::Warning,
            "error" => Self::Error,
            "task_complete" => Self::TaskComplete,
            "task_failed" => Self::TaskFailed,
            "system_alert" => Self::SystemAlert,
            "system_notification" => Self::SystemNotification,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for NotificationKind {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single notification record.
///
/// Field names follow the server: the body travels as `message`. Missing
/// fields get defaults so that terse server messages such as
/// `{"type": "error", "message": "..."}` still become feed entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification identifier; generated locally when absent.
    #[serde(default = "generate_id")]
    pub id: String,
    /// Category.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Short title.
    #[serde(default)]
    pub title: String,
    /// Body text.
    #[serde(default, rename = "message", alias = "body")]
    pub body: String,
    /// When the server created the notification.
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Whether the user has acknowledged it.
    #[serde(default)]
    pub read: bool,
    /// Kind-specific extra data (task id, workflow step, ...).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

impl Notification {
    /// Creates an unread notification stamped with the current time.
    #[must_use]
    pub fn new(kind: NotificationKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            kind,
            title: title.into(),
            body: body.into(),
            timestamp: Utc::now(),
            read: false,
            data: serde_json::Value::Null,
        }
    }

    /// Fills in a title from the kind when the server sent none.
    #[must_use]
    pub fn with_default_title(mut self) -> Self {
        if self.title.is_empty() {
            self.title = self.kind.default_title().to_string();
        }
        self
    }
}

fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Accepts RFC 3339, naive ISO-8601 (read as UTC) or epoch milliseconds.
/// Anything else falls back to the receive time.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(parse_timestamp).unwrap_or_else(Utc::now))
}

pub(crate) fn parse_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc())),
        serde_json::Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Newest-first notification list with a fixed maximum length.
///
/// Prepending past capacity evicts exactly the oldest entry.
#[derive(Debug, Clone)]
pub struct NotificationFeed {
    items: VecDeque<Notification>,
    capacity: usize,
}

impl NotificationFeed {
    /// Creates an empty feed. A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Prepends a notification, returning the evicted tail entry if the
    /// feed was full.
    pub fn push(&mut self, notification: Notification) -> Option<Notification> {
        self.items.push_front(notification);
        if self.items.len() > self.capacity {
            self.items.pop_back()
        } else {
            None
        }
    }

    /// Replaces the whole feed with `notifications`, kept in the given
    /// (newest-first) order and truncated to capacity.
    pub fn replace(&mut self, notifications: impl IntoIterator<Item = Notification>) {
        self.items.clear();
        self.items
            .extend(notifications.into_iter().take(self.capacity));
    }

    /// Marks the notification with `id` as read. Returns `false` if no
    /// such entry exists.
    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(entry) => {
                entry.read = true;
                true
            }
            None => false,
        }
    }

    /// Looks up a notification by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    /// Iterates newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    /// Returns an owned newest-first copy of the feed.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Notification> {
        self.items.iter().cloned().collect()
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the feed holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of entries not yet marked read.
    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    /// Maximum number of entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for NotificationFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}
