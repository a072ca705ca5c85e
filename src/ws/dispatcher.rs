//! Inbound message dispatcher.
//!
//! Routes each decoded [`InboundMessage`] to the projection slice it
//! affects and publishes the matching [`ClientEvent`]. Unknown
//! discriminators are logged and dropped.

use std::sync::Arc;

use tokio::sync::RwLock;

use super::messages::InboundMessage;
use crate::domain::{ClientEvent, EventBus, Projection};

/// Applies inbound messages to the shared [`Projection`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    projection: Arc<RwLock<Projection>>,
    events: EventBus,
}

impl Dispatcher {
    /// Creates a dispatcher writing into `projection`.
    #[must_use]
    pub fn new(projection: Arc<RwLock<Projection>>, events: EventBus) -> Self {
        Self { projection, events }
    }

    /// Applies one message and publishes the resulting event, if any.
    pub async fn dispatch(&self, message: InboundMessage) {
        let event = {
            let mut projection = self.projection.write().await;
            route(&mut projection, message)
        };
        if let Some(event) = event {
            let _ = self.events.publish(event);
        }
    }

    /// Forgets the server-assigned connection id. Called when the socket
    /// closes, so observers never read the id of a dead connection.
    pub async fn connection_lost(&self) {
        if let Some(id) = self.projection.write().await.connection_id.take() {
            tracing::debug!(connection_id = %id, "connection id cleared");
        }
    }
}

/// The routing table. Pure so it can be exercised without a runtime.
pub fn route(projection: &mut Projection, message: InboundMessage) -> Option<ClientEvent> {
    match message {
        InboundMessage::ConnectionEstablished(payload) => {
            tracing::info!(connection_id = %payload.connection_id, "connection established");
            projection.connection_id = Some(payload.connection_id.clone());
            Some(ClientEvent::ConnectionEstablished {
                connection_id: payload.connection_id,
            })
        }
        InboundMessage::InitialNotifications(batch) | InboundMessage::NotificationsList(batch) => {
            projection.notifications.replace(
                batch
                    .notifications
                    .into_iter()
                    .map(crate::domain::Notification::with_default_title),
            );
            Some(ClientEvent::NotificationsReplaced {
                count: projection.notifications.len(),
            })
        }
        InboundMessage::TaskUpdate(update) => {
            projection.tasks.upsert(update.task_id.clone(), update.data.clone());
            Some(ClientEvent::TaskProgress {
                task_id: update.task_id,
                data: update.data,
            })
        }
        InboundMessage::WorkflowUpdate(update) => {
            projection
                .workflows
                .upsert(update.workflow_id.clone(), update.data.clone());
            Some(ClientEvent::WorkflowProgress {
                workflow_id: update.workflow_id,
                data: update.data,
            })
        }
        InboundMessage::Notification(notification) => {
            if let Some(evicted) = projection.notifications.push(notification.clone()) {
                tracing::trace!(id = %evicted.id, "notification evicted from feed");
            }
            Some(ClientEvent::NotificationReceived { notification })
        }
        InboundMessage::NotificationMarkedRead(ack) => {
            if !ack.success {
                tracing::debug!(id = %ack.notification_id, "server rejected read acknowledgement");
                return None;
            }
            if !projection.notifications.mark_read(&ack.notification_id) {
                tracing::debug!(id = %ack.notification_id, "acknowledged notification not in feed");
            }
            Some(ClientEvent::NotificationRead {
                notification_id: ack.notification_id,
            })
        }
        InboundMessage::SubscriptionConfirmed(confirmed) => {
            tracing::debug!(
                resource_type = %confirmed.resource_type,
                resource_id = %confirmed.resource_id,
                "subscription confirmed"
            );
            Some(ClientEvent::SubscriptionConfirmed {
                resource_type: confirmed.resource_type,
                resource_id: confirmed.resource_id,
            })
        }
        InboundMessage::Pong(_) => None,
        InboundMessage::RoomMessage(message) => {
            let stored = serde_json::json!({
                "from": message.from,
                "content": message.content,
                "timestamp": message.timestamp,
            });
            projection.room_mut(&message.room).push_message(stored);
            Some(ClientEvent::RoomMessage {
                room: message.room,
                from: message.from,
                content: message.content,
            })
        }
        InboundMessage::RoomHistory(history) => {
            tracing::debug!(room = %history.room, count = history.messages.len(), "room history");
            projection
                .room_mut(&history.room)
                .replace_history(history.messages);
            None
        }
        InboundMessage::RoomInfo(info) => {
            let Some(info) = info.room_info else {
                tracing::debug!("room info requested for unknown room");
                return None;
            };
            let Some(room) = info
                .get("room_name")
                .or_else(|| info.get("room"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
            else {
                tracing::debug!("room info without a room name");
                return None;
            };
            projection.room_mut(&room).info = Some(info.clone());
            Some(ClientEvent::RoomInfo { room, info })
        }
        InboundMessage::MemberJoined(change) => {
            tracing::debug!(room = ?change.room, connection = ?change.connection_id, "member joined");
            None
        }
        InboundMessage::MemberLeft(change) => {
            tracing::debug!(room = ?change.room, connection = ?change.connection_id, "member left");
            None
        }
        InboundMessage::Unknown { kind } => {
            tracing::warn!(%kind, "ignoring message with unknown type");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ws::messages::decode;

    fn apply(projection: &mut Projection, frame: serde_json::Value) -> Option<ClientEvent> {
        let Ok(message) = decode(&frame.to_string()) else {
            panic!("frame should decode: {frame}");
        };
        route(projection, message)
    }

    #[test]
    fn connection_established_records_id() {
        let mut p = Projection::default();
        let event = apply(&mut p, json!({"type": "connection_established", "connection_id": "c-9"}));
        assert_eq!(p.connection_id.as_deref(), Some("c-9"));
        assert!(matches!(event, Some(ClientEvent::ConnectionEstablished { .. })));
    }

    #[test]
    fn initial_notifications_replace_feed() {
        let mut p = Projection::default();
        apply(&mut p, json!({"type": "info", "id": "old", "message": "stale"}));
        apply(
            &mut p,
            json!({"type": "initial_notifications", "notifications": [
                {"id": "n1", "type": "info", "title": "A", "message": "a"},
                {"id": "n2", "type": "task_complete", "message": "b"}
            ]}),
        );
        let ids: Vec<_> = p.notifications.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["n1", "n2"]);
        assert!(p.notifications.get("old").is_none());
        assert_eq!(
            p.notifications.get("n2").map(|n| n.title.as_str()),
            Some("Task Completed")
        );
    }

    #[test]
    fn notification_is_prepended() {
        let mut p = Projection::default();
        apply(&mut p, json!({"type": "info", "id": "n1", "message": "first"}));
        let event = apply(&mut p, json!({"type": "warning", "id": "n2", "message": "second"}));
        let ids: Vec<_> = p.notifications.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["n2", "n1"]);
        assert!(matches!(event, Some(ClientEvent::NotificationReceived { .. })));
    }

    #[test]
    fn progress_is_last_write_wins() {
        let mut p = Projection::default();
        apply(&mut p, json!({"type": "task_update", "task_id": "A", "data": {"progress": 10}}));
        apply(&mut p, json!({"type": "task_update", "task_id": "A", "data": {"progress": 60}}));
        apply(&mut p, json!({"type": "workflow_update", "workflow_id": "W", "data": {"state": "run"}}));
        assert_eq!(p.tasks.len(), 1);
        assert_eq!(p.tasks.get("A").map(|e| &e.data), Some(&json!({"progress": 60})));
        assert_eq!(p.workflows.get("W").map(|e| &e.data), Some(&json!({"state": "run"})));
    }

    #[test]
    fn marked_read_only_on_success() {
        let mut p = Projection::default();
        apply(&mut p, json!({"type": "info", "id": "n1", "message": "x"}));
        let rejected = apply(
            &mut p,
            json!({"type": "notification_marked_read", "notification_id": "n1", "success": false}),
        );
        assert!(rejected.is_none());
        assert_eq!(p.notifications.unread_count(), 1);

        apply(
            &mut p,
            json!({"type": "notification_marked_read", "notification_id": "n1", "success": true}),
        );
        assert_eq!(p.notifications.unread_count(), 0);
    }

    #[test]
    fn rooms_are_projected() {
        let mut p = Projection::default();
        apply(
            &mut p,
            json!({"type": "room_history", "room": "lab1", "messages": [{"content": "old"}]}),
        );
        apply(
            &mut p,
            json!({"type": "room_message", "room": "lab1", "from": "c-1", "content": "hi"}),
        );
        apply(
            &mut p,
            json!({"type": "room_info", "room_info": {"room_name": "lab1", "connection_count": 2}}),
        );
        let Some(room) = p.rooms.get("lab1") else {
            panic!("room should exist");
        };
        assert_eq!(room.messages().len(), 2);
        assert_eq!(
            room.info.as_ref().and_then(|i| i.get("connection_count")),
            Some(&json!(2))
        );
    }

    #[test]
    fn unknown_and_pong_leave_projection_untouched() {
        let mut p = Projection::default();
        assert!(apply(&mut p, json!({"type": "brand_new_thing", "x": 1})).is_none());
        assert!(apply(&mut p, json!({"type": "pong", "timestamp": "t"})).is_none());
        assert!(apply(&mut p, json!({"type": "member_joined", "room": "r"})).is_none());
        assert!(p.notifications.is_empty());
        assert!(p.rooms.is_empty());
    }

    #[tokio::test]
    async fn dispatch_publishes_events() {
        let projection = Arc::new(RwLock::new(Projection::default()));
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let dispatcher = Dispatcher::new(Arc::clone(&projection), bus);

        let Ok(message) = decode(r#"{"type":"task_update","task_id":"A","data":{}}"#) else {
            panic!("frame should decode");
        };
        dispatcher.dispatch(message).await;

        let Ok(ClientEvent::TaskProgress { task_id, .. }) = rx.recv().await else {
            panic!("expected TaskProgress");
        };
        assert_eq!(task_id, "A");
        assert!(projection.read().await.tasks.get("A").is_some());
    }

    #[tokio::test]
    async fn connection_lost_clears_id_but_keeps_state() {
        let projection = Arc::new(RwLock::new(Projection::default()));
        let dispatcher = Dispatcher::new(Arc::clone(&projection), EventBus::new(8));

        for frame in [
            r#"{"type":"connection_established","connection_id":"conn-1"}"#,
            r#"{"type":"task_update","task_id":"A","data":{"progress":40}}"#,
        ] {
            let Ok(message) = decode(frame) else {
                panic!("frame should decode: {frame}");
            };
            dispatcher.dispatch(message).await;
        }
        assert_eq!(projection.read().await.connection_id.as_deref(), Some("conn-1"));

        dispatcher.connection_lost().await;
        let p = projection.read().await;
        assert!(p.connection_id.is_none());
        assert!(p.tasks.get("A").is_some());
    }
}
