//! WebSocket message codec: outbound commands and inbound events.
//!
//! Every frame is a single JSON object with a mandatory `type`
//! discriminator. Outbound and inbound vocabularies are disjoint.
//! [`decode`] is the only place raw text is parsed. Malformed frames
//! stop here as errors, and unknown discriminators become
//! [`InboundMessage::Unknown`].

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::{Notification, NotificationKind, Topic, TopicKind};
use crate::error::ClientError;

/// WebSocket close code for a normal, client-requested closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Commands the client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Heartbeat carrying the client clock.
    Ping {
        /// Client timestamp.
        timestamp: DateTime<Utc>,
    },
    /// Start receiving updates for a task.
    SubscribeTask {
        /// Task identifier.
        task_id: String,
    },
    /// Stop receiving updates for a task.
    UnsubscribeTask {
        /// Task identifier.
        task_id: String,
    },
    /// Start receiving updates for a workflow.
    SubscribeWorkflow {
        /// Workflow identifier.
        workflow_id: String,
    },
    /// Stop receiving updates for a workflow.
    UnsubscribeWorkflow {
        /// Workflow identifier.
        workflow_id: String,
    },
    /// Join a named room.
    JoinRoom {
        /// Room name.
        room: String,
    },
    /// Leave a named room.
    LeaveRoom {
        /// Room name.
        room: String,
    },
    /// Ask for room metadata.
    GetRoomInfo {
        /// Room name.
        room: String,
    },
    /// Broadcast content to a room.
    RoomMessage {
        /// Room name.
        room: String,
        /// Arbitrary JSON content.
        content: Value,
    },
    /// Acknowledge a notification.
    MarkNotificationRead {
        /// Notification identifier.
        notification_id: String,
    },
    /// Ask the server for a fresh notification list.
    GetNotifications {
        /// Only return unread entries.
        unread_only: bool,
    },
}

impl OutboundMessage {
    /// Builds a ping stamped with the current time.
    #[must_use]
    pub fn ping() -> Self {
        Self::Ping {
            timestamp: Utc::now(),
        }
    }

    /// Builds the message that asserts `topic` to the server.
    #[must_use]
    pub fn subscribe(topic: &Topic) -> Self {
        let id = topic.id().to_string();
        match topic.kind() {
            TopicKind::Task => Self::SubscribeTask { task_id: id },
            TopicKind::Workflow => Self::SubscribeWorkflow { workflow_id: id },
            TopicKind::Room | TopicKind::Channel => Self::JoinRoom { room: id },
        }
    }

    /// Builds the message that withdraws `topic` from the server.
    #[must_use]
    pub fn unsubscribe(topic: &Topic) -> Self {
        let id = topic.id().to_string();
        match topic.kind() {
            TopicKind::Task => Self::UnsubscribeTask { task_id: id },
            TopicKind::Workflow => Self::UnsubscribeWorkflow { workflow_id: id },
            TopicKind::Room | TopicKind::Channel => Self::LeaveRoom { room: id },
        }
    }

    /// Returns the wire discriminator.
    #[must_use]
    pub const fn type_str(&self) -> &'static str {
        match self {
            Self::Ping { .. } => "ping",
            Self::SubscribeTask { .. } => "subscribe_task",
            Self::UnsubscribeTask { .. } => "unsubscribe_task",
            Self::SubscribeWorkflow { .. } => "subscribe_workflow",
            Self::UnsubscribeWorkflow { .. } => "unsubscribe_workflow",
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::GetRoomInfo { .. } => "get_room_info",
            Self::RoomMessage { .. } => "room_message",
            Self::MarkNotificationRead { .. } => "mark_notification_read",
            Self::GetNotifications { .. } => "get_notifications",
        }
    }
}

/// Serializes an outbound message to a JSON text frame.
///
/// # Errors
///
/// Returns [`ClientError::Encode`] if serialization fails.
pub fn encode(message: &OutboundMessage) -> Result<String, ClientError> {
    serde_json::to_string(message).map_err(|e| ClientError::Encode(e.to_string()))
}

/// `connection_established` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConnectionEstablished {
    /// Server-assigned connection id.
    #[serde(deserialize_with = "id_string")]
    pub connection_id: String,
    /// Server timestamp, as sent.
    #[serde(default)]
    pub timestamp: Option<Value>,
}

/// `initial_notifications` / `notifications_list` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotificationBatch {
    /// Records, newest first. Entries that do not decode are dropped
    /// individually; the rest of the batch is kept.
    #[serde(default, deserialize_with = "lenient_notifications")]
    pub notifications: Vec<Notification>,
}

/// `task_update` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskUpdate {
    /// Task identifier.
    #[serde(deserialize_with = "id_string")]
    pub task_id: String,
    /// Latest status/progress payload.
    #[serde(default)]
    pub data: Value,
}

/// `workflow_update` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkflowUpdate {
    /// Workflow identifier.
    #[serde(deserialize_with = "id_string")]
    pub workflow_id: String,
    /// Latest status/progress payload.
    #[serde(default)]
    pub data: Value,
}

/// `subscription_confirmed` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionConfirmed {
    /// Resource kind, e.g. `task` or `workflow`.
    pub resource_type: String,
    /// Resource identifier.
    #[serde(deserialize_with = "id_string")]
    pub resource_id: String,
}

/// `notification_marked_read` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotificationMarkedRead {
    /// Notification identifier.
    #[serde(deserialize_with = "id_string")]
    pub notification_id: String,
    /// Whether the server applied the acknowledgement.
    #[serde(default)]
    pub success: bool,
}

/// `pong` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Pong {
    /// Echoed or server timestamp.
    #[serde(default)]
    pub timestamp: Option<Value>,
}

/// `room_message` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoomMessage {
    /// Room name.
    pub room: String,
    /// Sender connection id.
    #[serde(default)]
    pub from: Option<String>,
    /// Message content.
    #[serde(default)]
    pub content: Value,
    /// Server timestamp.
    #[serde(default)]
    pub timestamp: Option<Value>,
}

/// `room_history` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoomHistory {
    /// Room name.
    pub room: String,
    /// Past room messages, oldest first.
    #[serde(default)]
    pub messages: Vec<Value>,
}

/// `room_info` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoomInfo {
    /// Room metadata; `null` when the room does not exist.
    #[serde(default)]
    pub room_info: Option<Value>,
}

/// `member_joined` / `member_left` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemberChange {
    /// Room name.
    #[serde(default)]
    pub room: Option<String>,
    /// Connection that joined or left.
    #[serde(default)]
    pub connection_id: Option<String>,
}

/// Messages the server sends to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Handshake acknowledgement with the server's connection id.
    ConnectionEstablished(ConnectionEstablished),
    /// Feed bootstrap sent on connect.
    InitialNotifications(NotificationBatch),
    /// Reply to `get_notifications`.
    NotificationsList(NotificationBatch),
    /// Task progress.
    TaskUpdate(TaskUpdate),
    /// Workflow progress.
    WorkflowUpdate(WorkflowUpdate),
    /// Any notification kind that is prepended to the feed.
    Notification(Notification),
    /// Subscription acknowledgement.
    SubscriptionConfirmed(SubscriptionConfirmed),
    /// Read acknowledgement round-trip.
    NotificationMarkedRead(NotificationMarkedRead),
    /// Heartbeat reply.
    Pong(Pong),
    /// Room broadcast.
    RoomMessage(RoomMessage),
    /// Room backlog sent on join.
    RoomHistory(RoomHistory),
    /// Room metadata.
    RoomInfo(RoomInfo),
    /// A connection joined a room.
    MemberJoined(MemberChange),
    /// A connection left a room.
    MemberLeft(MemberChange),
    /// A discriminator this client does not know.
    Unknown {
        /// The unrecognised `type` value.
        kind: String,
    },
}

impl InboundMessage {
    /// Returns the wire discriminator.
    #[must_use]
    pub fn type_str(&self) -> &str {
        match self {
            Self::ConnectionEstablished(_) => "connection_established",
            Self::InitialNotifications(_) => "initial_notifications",
            Self::NotificationsList(_) => "notifications_list",
            Self::TaskUpdate(_) => "task_update",
            Self::WorkflowUpdate(_) => "workflow_update",
            Self::Notification(n) => n.kind.as_str(),
            Self::SubscriptionConfirmed(_) => "subscription_confirmed",
            Self::NotificationMarkedRead(_) => "notification_marked_read",
            Self::Pong(_) => "pong",
            Self::RoomMessage(_) => "room_message",
            Self::RoomHistory(_) => "room_history",
            Self::RoomInfo(_) => "room_info",
            Self::MemberJoined(_) => "member_joined",
            Self::MemberLeft(_) => "member_left",
            Self::Unknown { kind } => kind,
        }
    }
}

/// Parses a text frame into an [`InboundMessage`].
///
/// # Errors
///
/// Returns [`ClientError::MalformedFrame`] for non-JSON text or a known
/// `type` whose fields have the wrong shape, and
/// [`ClientError::MissingType`] when there is no string `type`.
pub fn decode(text: &str) -> Result<InboundMessage, ClientError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ClientError::MalformedFrame(e.to_string()))?;
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return Err(ClientError::MissingType);
    };
    let kind = kind.to_owned();

    let message = match kind.as_str() {
        "connection_established" => InboundMessage::ConnectionEstablished(payload(value)?),
        "initial_notifications" => InboundMessage::InitialNotifications(payload(value)?),
        "notifications_list" => InboundMessage::NotificationsList(payload(value)?),
        "task_update" => InboundMessage::TaskUpdate(payload(value)?),
        "workflow_update" => InboundMessage::WorkflowUpdate(payload(value)?),
        "subscription_confirmed" => InboundMessage::SubscriptionConfirmed(payload(value)?),
        "notification_marked_read" => InboundMessage::NotificationMarkedRead(payload(value)?),
        "pong" => InboundMessage::Pong(payload(value)?),
        "room_message" => InboundMessage::RoomMessage(payload(value)?),
        "room_history" => InboundMessage::RoomHistory(payload(value)?),
        "room_info" => InboundMessage::RoomInfo(payload(value)?),
        "member_joined" => InboundMessage::MemberJoined(payload(value)?),
        "member_left" => InboundMessage::MemberLeft(payload(value)?),
        other if NotificationKind::from(other).is_feed_kind() => {
            InboundMessage::Notification(payload::<Notification>(value)?.with_default_title())
        }
        other => InboundMessage::Unknown {
            kind: other.to_owned(),
        },
    };
    Ok(message)
}

fn payload<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|e| ClientError::MalformedFrame(e.to_string()))
}

/// Accepts ids sent either as strings or as numbers.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or numeric id, got {other}"
        ))),
    }
}

/// Decodes each record on its own so one bad entry cannot sink a batch.
fn lenient_notifications<'de, D>(deserializer: D) -> Result<Vec<Notification>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(notification) => Some(notification),
            Err(err) => {
                tracing::warn!(index, error = %err, "dropping undecodable notification");
                None
            }
        })
        .collect())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encoded(message: &OutboundMessage) -> Value {
        let Ok(text) = encode(message) else {
            panic!("encode failed");
        };
        serde_json::from_str(&text).unwrap_or_default()
    }

    #[test]
    fn ping_carries_timestamp() {
        let json = encoded(&OutboundMessage::ping());
        assert_eq!(json.get("type"), Some(&json!("ping")));
        assert!(json.get("timestamp").is_some_and(Value::is_string));
    }

    #[test]
    fn subscribe_messages_per_topic_kind() {
        assert_eq!(
            encoded(&OutboundMessage::subscribe(&Topic::task("A"))),
            json!({"type": "subscribe_task", "task_id": "A"})
        );
        assert_eq!(
            encoded(&OutboundMessage::subscribe(&Topic::workflow("W"))),
            json!({"type": "subscribe_workflow", "workflow_id": "W"})
        );
        assert_eq!(
            encoded(&OutboundMessage::subscribe(&Topic::room("lab1"))),
            json!({"type": "join_room", "room": "lab1"})
        );
        assert_eq!(
            encoded(&OutboundMessage::subscribe(&Topic::channel("alerts"))),
            json!({"type": "join_room", "room": "alerts"})
        );
    }

    #[test]
    fn unsubscribe_messages_per_topic_kind() {
        assert_eq!(
            encoded(&OutboundMessage::unsubscribe(&Topic::task("A"))),
            json!({"type": "unsubscribe_task", "task_id": "A"})
        );
        assert_eq!(
            encoded(&OutboundMessage::unsubscribe(&Topic::room("lab1"))),
            json!({"type": "leave_room", "room": "lab1"})
        );
    }

    #[test]
    fn room_and_notification_commands() {
        assert_eq!(
            encoded(&OutboundMessage::RoomMessage {
                room: "lab1".to_string(),
                content: json!("hello"),
            }),
            json!({"type": "room_message", "room": "lab1", "content": "hello"})
        );
        assert_eq!(
            encoded(&OutboundMessage::MarkNotificationRead {
                notification_id: "n1".to_string(),
            }),
            json!({"type": "mark_notification_read", "notification_id": "n1"})
        );
        let msg = OutboundMessage::GetRoomInfo {
            room: "lab1".to_string(),
        };
        assert_eq!(encoded(&msg).get("type"), Some(&json!(msg.type_str())));
    }

    #[test]
    fn decode_task_update() {
        let frame = r#"{"type":"task_update","task_id":"T1","data":{"progress":40}}"#;
        let Ok(InboundMessage::TaskUpdate(update)) = decode(frame) else {
            panic!("expected task_update");
        };
        assert_eq!(update.task_id, "T1");
        assert_eq!(update.data, json!({"progress": 40}));
    }

    #[test]
    fn decode_accepts_numeric_ids() {
        let frame = r#"{"type":"workflow_update","workflow_id":17,"data":null}"#;
        let Ok(InboundMessage::WorkflowUpdate(update)) = decode(frame) else {
            panic!("expected workflow_update");
        };
        assert_eq!(update.workflow_id, "17");
    }

    #[test]
    fn decode_notification_kinds() {
        for kind in [
            "system_notification",
            "task_complete",
            "task_failed",
            "info",
            "success",
            "warning",
            "error",
        ] {
            let frame = json!({"type": kind, "id": "n", "title": "t", "message": "m"}).to_string();
            let Ok(InboundMessage::Notification(n)) = decode(&frame) else {
                panic!("`{kind}` should decode as a notification");
            };
            assert_eq!(n.kind.as_str(), kind);
        }
    }

    #[test]
    fn decode_initial_notifications() {
        let frame = json!({
            "type": "initial_notifications",
            "notifications": [
                {"id": "3", "type": "info", "title": "c", "message": ""},
                {"id": "2", "type": "warning", "title": "b", "message": ""},
            ]
        })
        .to_string();
        let Ok(InboundMessage::InitialNotifications(batch)) = decode(&frame) else {
            panic!("expected initial_notifications");
        };
        let ids: Vec<_> = batch.notifications.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["3", "2"]);
    }

    #[test]
    fn bad_batch_entries_are_skipped() {
        let frame = json!({
            "type": "initial_notifications",
            "notifications": [
                {"id": "3", "type": "info", "title": "c", "message": ""},
                {"id": "2", "type": "info", "title": null, "message": ""},
                42,
                {"id": "1", "type": "error", "title": "a", "message": ""},
            ]
        })
        .to_string();
        let Ok(InboundMessage::InitialNotifications(batch)) = decode(&frame) else {
            panic!("one bad record must not fail the frame");
        };
        let ids: Vec<_> = batch.notifications.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["3", "1"]);
    }

    #[test]
    fn null_batch_is_empty() {
        let Ok(InboundMessage::NotificationsList(batch)) =
            decode(r#"{"type":"notifications_list","notifications":null}"#)
        else {
            panic!("expected notifications_list");
        };
        assert!(batch.notifications.is_empty());
    }

    #[test]
    fn decode_marked_read_and_pong() {
        let Ok(InboundMessage::NotificationMarkedRead(ack)) = decode(
            r#"{"type":"notification_marked_read","notification_id":"n1","success":true}"#,
        ) else {
            panic!("expected notification_marked_read");
        };
        assert!(ack.success);
        assert!(matches!(
            decode(r#"{"type":"pong","timestamp":"2024-01-01T00:00:00"}"#),
            Ok(InboundMessage::Pong(_))
        ));
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let Ok(InboundMessage::Unknown { kind }) = decode(r#"{"type":"analysis_progress"}"#) else {
            panic!("expected unknown");
        };
        assert_eq!(kind, "analysis_progress");
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(matches!(decode("not json"), Err(ClientError::MalformedFrame(_))));
        assert_eq!(decode(r#"{"task_id":"x"}"#), Err(ClientError::MissingType));
        assert_eq!(decode(r#"{"type":7}"#), Err(ClientError::MissingType));
        assert!(matches!(
            decode(r#"{"type":"task_update","data":{}}"#),
            Err(ClientError::MalformedFrame(_))
        ));
    }
}
