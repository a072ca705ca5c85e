//! Realtime client facade.
//!
//! [`RealtimeClient`] is the single entry point for UI code. Commands are
//! forwarded to the connection driver task over an `mpsc` channel; reads
//! come from the shared projection and a `watch` channel of
//! [`ConnectionStatus`], so observing never triggers side effects.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{RwLock, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::domain::{
    ClientEvent, ConnectionStatus, EventBus, Notification, ProgressEntry, Projection, Topic,
};
use crate::error::ClientError;
use crate::ws::connection::{Command, ConnectionDriver};
use crate::ws::{ConnectionMachine, Dispatcher, Endpoint, Heartbeat, OutboundMessage};

/// Handle to one realtime connection and its projected state.
///
/// Each instance owns its own subscription registry, retry bookkeeping and
/// projection; nothing is shared between instances. Call
/// [`RealtimeClient::dispose`] to tear it down. Dropping the handle does
/// the same on a best-effort basis.
#[derive(Debug)]
pub struct RealtimeClient {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    projection: Arc<RwLock<Projection>>,
    events: EventBus,
    task: Option<JoinHandle<()>>,
}

impl RealtimeClient {
    /// Creates an idle client and spawns its driver task.
    ///
    /// Topics in `config.initial_topics` are registered up front and sent
    /// on the first open. Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let events = EventBus::new(config.event_bus_capacity);
        let projection = Arc::new(RwLock::new(Projection::new(config.notification_capacity)));
        let (status_tx, status) = watch::channel(ConnectionStatus::default());
        let (commands, command_rx) = mpsc::channel(config.command_capacity.max(1));

        let mut machine = ConnectionMachine::new(Endpoint::from_config(&config), config.reconnect);
        for topic in config.initial_topics {
            let _ = machine.subscribe(topic);
        }

        let driver = ConnectionDriver::new(
            machine,
            Dispatcher::new(Arc::clone(&projection), events.clone()),
            Heartbeat::new(config.heartbeat_interval),
            events.clone(),
            status_tx,
            config.connect_timeout,
        );
        let task = tokio::spawn(driver.run(command_rx));
        tracing::debug!(principal = %config.principal, "realtime client created");

        Self {
            commands,
            status,
            projection,
            events,
            task: Some(task),
        }
    }

    /// Starts connecting. A no-op while already connecting or open; after
    /// retry exhaustion this is the manual retry.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Disposed`] if the driver has stopped.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.command(Command::Connect).await
    }

    /// Closes the connection intentionally. No reconnect follows.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Disposed`] if the driver has stopped.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        self.command(Command::Disconnect).await
    }

    /// Sends a message if the connection is open. Best effort: nothing is
    /// queued for later delivery.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] when not open,
    /// [`ClientError::Transport`] if the write fails, and
    /// [`ClientError::Disposed`] if the driver has stopped.
    pub async fn send(&self, message: OutboundMessage) -> Result<(), ClientError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Send { message, reply }).await?;
        rx.await.map_err(|_| ClientError::Disposed)?
    }

    /// Adds a topic to the registry; sent now if open and on every later
    /// open.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Disposed`] if the driver has stopped.
    pub async fn subscribe(&self, topic: Topic) -> Result<(), ClientError> {
        self.command(Command::Subscribe(topic)).await
    }

    /// Removes a topic from the registry; withdrawn on the wire if open.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Disposed`] if the driver has stopped.
    pub async fn unsubscribe(&self, topic: Topic) -> Result<(), ClientError> {
        self.command(Command::Unsubscribe(topic)).await
    }

    /// Active topics in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Disposed`] if the driver has stopped.
    pub async fn list_subscriptions(&self) -> Result<Vec<Topic>, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::ListSubscriptions(reply)).await?;
        rx.await.map_err(|_| ClientError::Disposed)
    }

    /// Asks the server to mark a notification read. The local flag flips
    /// when the server confirms.
    ///
    /// # Errors
    ///
    /// Same as [`RealtimeClient::send`].
    pub async fn mark_notification_read(
        &self,
        notification_id: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.send(OutboundMessage::MarkNotificationRead {
            notification_id: notification_id.into(),
        })
        .await
    }

    /// Requests a fresh notification list.
    ///
    /// # Errors
    ///
    /// Same as [`RealtimeClient::send`].
    pub async fn request_notifications(&self, unread_only: bool) -> Result<(), ClientError> {
        self.send(OutboundMessage::GetNotifications { unread_only })
            .await
    }

    /// Broadcasts content to a room.
    ///
    /// # Errors
    ///
    /// Same as [`RealtimeClient::send`].
    pub async fn room_message(
        &self,
        room: impl Into<String>,
        content: Value,
    ) -> Result<(), ClientError> {
        self.send(OutboundMessage::RoomMessage {
            room: room.into(),
            content,
        })
        .await
    }

    /// Asks for room metadata; the reply lands in [`RealtimeClient::room_info`].
    ///
    /// # Errors
    ///
    /// Same as [`RealtimeClient::send`].
    pub async fn request_room_info(&self, room: impl Into<String>) -> Result<(), ClientError> {
        self.send(OutboundMessage::GetRoomInfo { room: room.into() })
            .await
    }

    /// When the last heartbeat `ping` was sent.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Disposed`] if the driver has stopped.
    pub async fn last_ping(&self) -> Result<Option<DateTime<Utc>>, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::LastPing(reply)).await?;
        rx.await.map_err(|_| ClientError::Disposed)
    }

    /// When the last `pong` arrived.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Disposed`] if the driver has stopped.
    pub async fn last_pong(&self) -> Result<Option<DateTime<Utc>>, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::LastPong(reply)).await?;
        rx.await.map_err(|_| ClientError::Disposed)
    }

    /// Stops the driver: intentional close, timers cancelled, socket
    /// closed. Resolves once the driver task has exited.
    pub async fn dispose(mut self) {
        let _ = self.commands.send(Command::Dispose).await;
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            tracing::warn!(error = %err, "driver task ended abnormally");
        }
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// A receiver that yields every status change.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// `true` only while the connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status.borrow().connected
    }

    /// Last connection error, cleared on the next successful open.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.status.borrow().last_error.clone()
    }

    /// Subscribes to client events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Notification feed, newest first.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.projection.read().await.notifications.to_vec()
    }

    /// Number of unread notifications in the feed.
    pub async fn unread_count(&self) -> usize {
        self.projection.read().await.notifications.unread_count()
    }

    /// Latest progress entry for a task.
    pub async fn task_progress(&self, task_id: &str) -> Option<ProgressEntry> {
        self.projection.read().await.tasks.get(task_id).cloned()
    }

    /// All task progress entries.
    pub async fn all_task_progress(&self) -> HashMap<String, ProgressEntry> {
        self.projection.read().await.tasks.snapshot()
    }

    /// Latest progress entry for a workflow.
    pub async fn workflow_progress(&self, workflow_id: &str) -> Option<ProgressEntry> {
        self.projection
            .read()
            .await
            .workflows
            .get(workflow_id)
            .cloned()
    }

    /// All workflow progress entries.
    pub async fn all_workflow_progress(&self) -> HashMap<String, ProgressEntry> {
        self.projection.read().await.workflows.snapshot()
    }

    /// Connection id assigned by the server for the current socket.
    pub async fn connection_id(&self) -> Option<String> {
        self.projection.read().await.connection_id.clone()
    }

    /// Messages seen in a room, oldest first.
    pub async fn room_messages(&self, room: &str) -> Vec<Value> {
        self.projection
            .read()
            .await
            .rooms
            .get(room)
            .map(|state| state.messages())
            .unwrap_or_default()
    }

    /// Last metadata received for a room.
    pub async fn room_info(&self, room: &str) -> Option<Value> {
        self.projection
            .read()
            .await
            .rooms
            .get(room)
            .and_then(|state| state.info.clone())
    }

    async fn command(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::Disposed)
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        if let Some(task) = self.task.take()
            && self.commands.try_send(Command::Dispose).is_err()
        {
            task.abort();
        }
    }
}
