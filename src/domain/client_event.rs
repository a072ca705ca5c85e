//! Events published to observers as the client changes state.
//!
//! Every connection transition and every projection update emits a
//! [`ClientEvent`] through the [`super::EventBus`]. UI layers subscribe to
//! react without polling.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Notification;

/// Event emitted after a connection transition or projection change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// The socket reached the open phase.
    Connected {
        /// Endpoint the socket is connected to.
        endpoint: String,
        /// When the socket opened.
        timestamp: DateTime<Utc>,
    },

    /// The socket closed or failed to open.
    Disconnected {
        /// WebSocket close code, if one was received.
        code: Option<u16>,
        /// Close reason or failure description.
        reason: String,
        /// Whether the close was requested by this client.
        intentional: bool,
        /// When the close was observed.
        timestamp: DateTime<Utc>,
    },

    /// A reconnect attempt has been scheduled.
    ReconnectScheduled {
        /// One-based attempt number.
        attempt: u32,
        /// Delay before the attempt, in milliseconds.
        delay_ms: u64,
        /// When the attempt was scheduled.
        timestamp: DateTime<Utc>,
    },

    /// The retry ceiling was reached; no further automatic attempts.
    ReconnectExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// When recovery gave up.
        timestamp: DateTime<Utc>,
    },

    /// The server assigned a connection identifier.
    ConnectionEstablished {
        /// Server-side connection id.
        connection_id: String,
    },

    /// The notification feed was replaced by a server snapshot.
    NotificationsReplaced {
        /// Number of entries now in the feed.
        count: usize,
    },

    /// A notification was prepended to the feed.
    NotificationReceived {
        /// The new record.
        notification: Notification,
    },

    /// A notification was acknowledged as read.
    NotificationRead {
        /// Identifier of the acknowledged record.
        notification_id: String,
    },

    /// A task progress entry was replaced.
    TaskProgress {
        /// Task identifier.
        task_id: String,
        /// New payload.
        data: serde_json::Value,
    },

    /// A workflow progress entry was replaced.
    WorkflowProgress {
        /// Workflow identifier.
        workflow_id: String,
        /// New payload.
        data: serde_json::Value,
    },

    /// The server confirmed a subscription.
    SubscriptionConfirmed {
        /// Resource kind, e.g. `task`.
        resource_type: String,
        /// Resource identifier.
        resource_id: String,
    },

    /// A room message arrived.
    RoomMessage {
        /// Room name.
        room: String,
        /// Sender connection id, if given.
        from: Option<String>,
        /// Message content.
        content: serde_json::Value,
    },

    /// Room metadata was received.
    RoomInfo {
        /// Room name.
        room: String,
        /// Metadata as sent by the server.
        info: serde_json::Value,
    },
}

impl ClientEvent {
    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::ReconnectScheduled { .. } => "reconnect_scheduled",
            Self::ReconnectExhausted { .. } => "reconnect_exhausted",
            Self::ConnectionEstablished { .. } => "connection_established",
            Self::NotificationsReplaced { .. } => "notifications_replaced",
            Self::NotificationReceived { .. } => "notification_received",
            Self::NotificationRead { .. } => "notification_read",
            Self::TaskProgress { .. } => "task_progress",
            Self::WorkflowProgress { .. } => "workflow_progress",
            Self::SubscriptionConfirmed { .. } => "subscription_confirmed",
            Self::RoomMessage { .. } => "room_message",
            Self::RoomInfo { .. } => "room_info",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_tag_matches_event_type_str() {
        let event = ClientEvent::ReconnectScheduled {
            attempt: 1,
            delay_ms: 2000,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(json.get("event_type"), Some(&serde_json::json!(event.event_type_str())));
        assert_eq!(json.get("delay_ms"), Some(&serde_json::json!(2000)));
    }

    #[test]
    fn disconnected_event_type() {
        let event = ClientEvent::Disconnected {
            code: Some(1006),
            reason: "abnormal".to_string(),
            intentional: false,
            timestamp: Utc::now(),
        };
        assert_eq!(event.event_type_str(), "disconnected");
    }
}
