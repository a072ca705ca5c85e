//! Connection driver task.
//!
//! The driver is the only owner of the socket, the timers and the
//! [`ConnectionMachine`]. One `select!` loop multiplexes facade commands,
//! the pending handshake, inbound frames, heartbeat ticks and the
//! reconnect timer, so every transition is applied serially.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Sleep};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::Utf8Bytes;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use super::dispatcher::Dispatcher;
use super::heartbeat::Heartbeat;
use super::machine::{Action, CloseEvent, ConnectionMachine};
use super::messages::{self, InboundMessage, OutboundMessage};
use crate::domain::{ClientEvent, ConnectionStatus, EventBus, Topic};
use crate::error::ClientError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingOpen = Pin<Box<dyn Future<Output = Result<WsStream, ClientError>> + Send>>;

/// Requests sent from the facade to the driver.
#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    Disconnect,
    Send {
        message: OutboundMessage,
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    Subscribe(Topic),
    Unsubscribe(Topic),
    ListSubscriptions(oneshot::Sender<Vec<Topic>>),
    LastPing(oneshot::Sender<Option<DateTime<Utc>>>),
    LastPong(oneshot::Sender<Option<DateTime<Utc>>>),
    Dispose,
}

/// Owns the socket and carries out the machine's [`Action`]s.
pub(crate) struct ConnectionDriver {
    machine: ConnectionMachine,
    dispatcher: Dispatcher,
    heartbeat: Heartbeat,
    events: EventBus,
    status_tx: watch::Sender<ConnectionStatus>,
    connect_timeout: Duration,
    transport: Option<WsStream>,
    pending_open: Option<PendingOpen>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
}

impl std::fmt::Debug for ConnectionDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDriver")
            .field("machine", &self.machine)
            .field("heartbeat", &self.heartbeat)
            .field("connect_timeout", &self.connect_timeout)
            .field("transport", &self.transport.is_some())
            .field("pending_open", &self.pending_open.is_some())
            .field("reconnect_timer", &self.reconnect_timer.is_some())
            .finish_non_exhaustive()
    }
}

impl ConnectionDriver {
    pub(crate) fn new(
        machine: ConnectionMachine,
        dispatcher: Dispatcher,
        heartbeat: Heartbeat,
        events: EventBus,
        status_tx: watch::Sender<ConnectionStatus>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            machine,
            dispatcher,
            heartbeat,
            events,
            status_tx,
            connect_timeout,
            transport: None,
            pending_open: None,
            reconnect_timer: None,
        }
    }

    /// Runs until [`Command::Dispose`] arrives or every sender is dropped.
    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Dispose) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                opened = poll_open(&mut self.pending_open) => {
                    self.pending_open = None;
                    self.on_open_result(opened).await;
                }
                frame = next_frame(&mut self.transport) => self.on_frame(frame).await,
                () = self.heartbeat.tick() => self.send_ping().await,
                () = reconnect_elapsed(&mut self.reconnect_timer) => {
                    self.reconnect_timer = None;
                    let actions = self.machine.reconnect_due();
                    self.execute(actions).await;
                }
            }
            self.publish_status();
        }

        self.shutdown().await;
        tracing::debug!("connection driver stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => {
                let actions = self.machine.connect();
                self.execute(actions).await;
            }
            Command::Disconnect => {
                let actions = self.machine.disconnect();
                self.execute(actions).await;
            }
            Command::Send { message, reply } => {
                let result = if self.machine.can_send() {
                    self.transmit(&message).await
                } else {
                    tracing::warn!(kind = message.type_str(), "cannot send while not connected");
                    Err(ClientError::NotConnected)
                };
                let _ = reply.send(result);
            }
            Command::Subscribe(topic) => {
                let actions = self.machine.subscribe(topic);
                self.execute(actions).await;
            }
            Command::Unsubscribe(topic) => {
                let actions = self.machine.unsubscribe(&topic);
                self.execute(actions).await;
            }
            Command::ListSubscriptions(reply) => {
                let _ = reply.send(self.machine.subscriptions().list_active());
            }
            Command::LastPing(reply) => {
                let _ = reply.send(self.heartbeat.last_ping());
            }
            Command::LastPong(reply) => {
                let _ = reply.send(self.heartbeat.last_pong());
            }
            // Consumed by the run loop.
            Command::Dispose => {}
        }
    }

    async fn execute(&mut self, actions: Vec<Action>) {
        let mut queue: VecDeque<Action> = actions.into();
        while let Some(action) = queue.pop_front() {
            match action {
                Action::OpenTransport(url) => {
                    self.pending_open = Some(Box::pin(open_transport(url, self.connect_timeout)));
                }
                Action::CloseTransport { code } => {
                    self.pending_open = None;
                    if let Some(mut ws) = self.transport.take() {
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: Utf8Bytes::from_static("client disconnect"),
                        };
                        if let Err(err) = ws.close(Some(frame)).await {
                            tracing::debug!(error = %err, "close handshake failed");
                        }
                    }
                    queue.extend(
                        self.machine
                            .on_close(CloseEvent::new(Some(code), "client disconnect")),
                    );
                }
                Action::Send(message) => {
                    if let Err(err) = self.transmit(&message).await {
                        tracing::warn!(error = %err, kind = message.type_str(), "send failed");
                    }
                }
                Action::StartHeartbeat => self.heartbeat.start(),
                Action::StopHeartbeat => self.heartbeat.stop(),
                Action::ScheduleReconnect(delay) => {
                    self.reconnect_timer = Some(Box::pin(time::sleep(delay)));
                }
                Action::CancelReconnect => self.reconnect_timer = None,
                Action::Emit(event) => {
                    if matches!(event, ClientEvent::Disconnected { .. }) {
                        self.dispatcher.connection_lost().await;
                    }
                    let _ = self.events.publish(event);
                }
            }
        }
    }

    async fn on_open_result(&mut self, result: Result<WsStream, ClientError>) {
        let actions = match result {
            Ok(ws) => {
                self.transport = Some(ws);
                self.machine.on_open()
            }
            Err(err) => {
                tracing::warn!(error = %err, "connection attempt failed");
                self.machine.on_close(CloseEvent::failed(err.to_string()))
            }
        };
        self.execute(actions).await;
    }

    async fn on_frame(&mut self, frame: Option<Result<Message, WsError>>) {
        let close = match frame {
            Some(Ok(Message::Text(text))) => {
                self.on_text(text.as_str()).await;
                return;
            }
            Some(Ok(Message::Binary(bytes))) => {
                tracing::debug!(len = bytes.len(), "ignoring binary frame");
                return;
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => return,
            Some(Ok(Message::Close(frame))) => {
                if let Some(mut ws) = self.transport.take() {
                    let _ = ws.close(None).await;
                }
                match frame {
                    Some(frame) => CloseEvent::new(Some(u16::from(frame.code)), frame.reason.as_str()),
                    None => CloseEvent::new(None, "server closed the connection"),
                }
            }
            Some(Err(err)) => CloseEvent::failed(err.to_string()),
            None => CloseEvent::failed("connection stream ended"),
        };
        self.transport = None;
        let actions = self.machine.on_close(close);
        self.execute(actions).await;
    }

    async fn on_text(&mut self, text: &str) {
        match messages::decode(text) {
            Ok(message) => {
                tracing::trace!(kind = message.type_str(), "frame received");
                if matches!(message, InboundMessage::Pong(_)) {
                    self.heartbeat.record_pong();
                }
                self.dispatcher.dispatch(message).await;
            }
            Err(err) => {
                tracing::warn!(error = %err, code = err.error_code(), "dropping undecodable frame");
            }
        }
    }

    async fn send_ping(&mut self) {
        if !self.machine.can_send() {
            return;
        }
        match self.transmit(&OutboundMessage::ping()).await {
            Ok(()) => self.heartbeat.record_ping(),
            Err(err) => tracing::warn!(error = %err, "heartbeat ping failed"),
        }
    }

    async fn transmit(&mut self, message: &OutboundMessage) -> Result<(), ClientError> {
        let Some(ws) = self.transport.as_mut() else {
            return Err(ClientError::NotConnected);
        };
        let text = messages::encode(message)?;
        ws.send(Message::text(text)).await?;
        tracing::debug!(kind = message.type_str(), "message sent");
        Ok(())
    }

    fn publish_status(&self) {
        let status = self.machine.status();
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    async fn shutdown(&mut self) {
        let actions = self.machine.disconnect();
        self.execute(actions).await;
        self.heartbeat.stop();
        self.reconnect_timer = None;
        self.pending_open = None;
        self.transport = None;
        self.publish_status();
    }
}

/// Performs the WebSocket handshake. Fails with a transport error once
/// `limit` elapses; a zero limit waits indefinitely.
async fn open_transport(url: Url, limit: Duration) -> Result<WsStream, ClientError> {
    let handshake = tokio_tungstenite::connect_async(url.as_str());
    let (stream, response) = if limit.is_zero() {
        handshake.await?
    } else {
        time::timeout(limit, handshake)
            .await
            .map_err(|_| ClientError::Transport("handshake timed out".to_string()))??
    };
    tracing::debug!(status = %response.status(), "websocket handshake complete");
    Ok(stream)
}

async fn poll_open(pending: &mut Option<PendingOpen>) -> Result<WsStream, ClientError> {
    match pending.as_mut() {
        Some(handshake) => handshake.await,
        None => std::future::pending().await,
    }
}

async fn next_frame(transport: &mut Option<WsStream>) -> Option<Result<Message, WsError>> {
    match transport.as_mut() {
        Some(ws) => ws.next().await,
        None => std::future::pending().await,
    }
}

async fn reconnect_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
