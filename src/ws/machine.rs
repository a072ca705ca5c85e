//! Connection state machine.
//!
//! [`ConnectionMachine`] owns every lifecycle decision: when to open a
//! socket, what to do once it opens, and whether a close leads to another
//! attempt. It performs no I/O. Each transition returns the [`Action`]s
//! the driver must carry out, in order.
//!
//! ```text
//!   Idle ──connect()──▶ Connecting ──open──▶ Open
//!    ▲                     │                   │
//!    │                  error/close          close
//!    │                     ▼                   │
//!    └──intentional/──── Closed ◀──────────────┘
//!       exhausted          │
//!                          └──retry timer──▶ Connecting
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use url::Url;

use super::endpoint::Endpoint;
use super::messages::{NORMAL_CLOSURE, OutboundMessage};
use super::policy::{ReconnectDecision, ReconnectPolicy, ReconnectState};
use super::subscription::SubscriptionRegistry;
use crate::domain::{ClientEvent, ConnectionStatus, Phase, Topic};

/// How a socket ended, as seen by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    /// Close code from the close frame, if any.
    pub code: Option<u16>,
    /// Close reason or failure description.
    pub reason: String,
}

impl CloseEvent {
    /// A close with an optional code.
    #[must_use]
    pub fn new(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// A failure without a close frame (refused, reset, bad URL, ...).
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::new(None, reason)
    }

    fn describe(&self) -> String {
        match (self.code, self.reason.is_empty()) {
            (Some(code), true) => format!("connection closed with code {code}"),
            (Some(code), false) => format!("connection closed with code {code}: {}", self.reason),
            (None, _) => self.reason.clone(),
        }
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Start a handshake with this URL.
    OpenTransport(Url),
    /// Close the live socket (or abandon the handshake) with `code`, then
    /// report the close back through [`ConnectionMachine::on_close`].
    CloseTransport {
        /// WebSocket close code to send.
        code: u16,
    },
    /// Transmit a message on the open socket.
    Send(OutboundMessage),
    /// Arm the heartbeat ticker.
    StartHeartbeat,
    /// Drop the heartbeat ticker.
    StopHeartbeat,
    /// Arm the reconnect timer.
    ScheduleReconnect(Duration),
    /// Drop the reconnect timer.
    CancelReconnect,
    /// Publish an event to observers.
    Emit(ClientEvent),
}

/// Lifecycle state for the client's single connection slot.
#[derive(Debug)]
pub struct ConnectionMachine {
    phase: Phase,
    endpoint: Endpoint,
    policy: ReconnectPolicy,
    reconnect: ReconnectState,
    subscriptions: SubscriptionRegistry,
    intentional: bool,
    reconnect_pending: bool,
    exhausted: bool,
    last_error: Option<String>,
    current_url: Option<Url>,
    attempt_started_at: Option<DateTime<Utc>>,
}

impl ConnectionMachine {
    /// Creates an idle machine.
    #[must_use]
    pub fn new(endpoint: Endpoint, policy: ReconnectPolicy) -> Self {
        Self {
            phase: Phase::Idle,
            endpoint,
            policy,
            reconnect: ReconnectState::new(),
            subscriptions: SubscriptionRegistry::new(),
            intentional: false,
            reconnect_pending: false,
            exhausted: false,
            last_error: None,
            current_url: None,
            attempt_started_at: None,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Messages may only be sent while open.
    #[must_use]
    pub fn can_send(&self) -> bool {
        self.phase == Phase::Open
    }

    /// The client-owned subscription set.
    #[must_use]
    pub const fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    /// Snapshot for observers.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            phase: self.phase,
            connected: self.phase == Phase::Open,
            reconnect_attempts: self.reconnect.attempts(),
            max_attempts_reached: self.exhausted,
            last_error: self.last_error.clone(),
            attempt_started_at: self.attempt_started_at,
        }
    }

    /// Manual connect. Ignored while connecting or open; otherwise resets
    /// retry bookkeeping (including exhaustion) and starts an attempt.
    pub fn connect(&mut self) -> Vec<Action> {
        if self.phase.is_active() {
            tracing::debug!(phase = %self.phase, "connect ignored, connection already active");
            return Vec::new();
        }
        self.reconnect.reset();
        self.exhausted = false;
        self.intentional = false;

        let mut actions = Vec::new();
        if std::mem::take(&mut self.reconnect_pending) {
            actions.push(Action::CancelReconnect);
        }
        actions.extend(self.begin_attempt());
        actions
    }

    /// Intentional close. Suppresses any retry, whatever close code the
    /// transport later reports.
    pub fn disconnect(&mut self) -> Vec<Action> {
        match self.phase {
            Phase::Idle => Vec::new(),
            Phase::Closed => {
                self.reconnect_pending = false;
                self.phase = Phase::Idle;
                tracing::info!("pending reconnect cancelled by client");
                vec![Action::CancelReconnect]
            }
            Phase::Connecting | Phase::Open => {
                self.intentional = true;
                self.phase = Phase::Closed;
                vec![
                    Action::StopHeartbeat,
                    Action::CloseTransport {
                        code: NORMAL_CLOSURE,
                    },
                ]
            }
        }
    }

    /// The handshake completed.
    pub fn on_open(&mut self) -> Vec<Action> {
        if self.phase != Phase::Connecting {
            tracing::warn!(phase = %self.phase, "ignoring open outside of connecting phase");
            return Vec::new();
        }
        self.phase = Phase::Open;
        self.reconnect.reset();
        self.last_error = None;

        let endpoint = self
            .current_url
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        tracing::info!(
            %endpoint,
            subscriptions = self.subscriptions.count(),
            "connection open"
        );

        let mut actions = vec![
            Action::StartHeartbeat,
            Action::Emit(ClientEvent::Connected {
                endpoint,
                timestamp: Utc::now(),
            }),
        ];
        actions.extend(
            self.subscriptions
                .iter()
                .map(|topic| Action::Send(OutboundMessage::subscribe(topic))),
        );
        actions
    }

    /// The socket closed, failed to open, or could not be constructed.
    pub fn on_close(&mut self, close: CloseEvent) -> Vec<Action> {
        match self.phase {
            Phase::Idle => return Vec::new(),
            Phase::Closed if !self.intentional => return Vec::new(),
            _ => {}
        }
        let was_open = self.phase == Phase::Open;
        self.phase = Phase::Closed;
        let intentional = std::mem::take(&mut self.intentional);

        let mut actions = Vec::new();
        if was_open {
            actions.push(Action::StopHeartbeat);
        }
        if !intentional {
            self.last_error = Some(close.describe());
        }
        actions.push(Action::Emit(ClientEvent::Disconnected {
            code: close.code,
            reason: close.reason.clone(),
            intentional,
            timestamp: Utc::now(),
        }));

        match self.reconnect.on_close(&self.policy, intentional) {
            ReconnectDecision::Retry { attempt, delay } => {
                self.reconnect_pending = true;
                tracing::info!(
                    attempt,
                    delay_ms = duration_ms(delay),
                    reason = %close.describe(),
                    "reconnect scheduled"
                );
                actions.push(Action::ScheduleReconnect(delay));
                actions.push(Action::Emit(ClientEvent::ReconnectScheduled {
                    attempt,
                    delay_ms: duration_ms(delay),
                    timestamp: Utc::now(),
                }));
            }
            ReconnectDecision::Intentional => {
                self.phase = Phase::Idle;
                tracing::info!("connection closed by client");
            }
            ReconnectDecision::Exhausted { attempts } => {
                self.phase = Phase::Idle;
                self.exhausted = true;
                tracing::warn!(attempts, "max reconnection attempts reached");
                actions.push(Action::Emit(ClientEvent::ReconnectExhausted {
                    attempts,
                    timestamp: Utc::now(),
                }));
            }
        }
        actions
    }

    /// The reconnect timer fired.
    pub fn reconnect_due(&mut self) -> Vec<Action> {
        if self.phase != Phase::Closed || !self.reconnect_pending {
            return Vec::new();
        }
        self.reconnect_pending = false;
        self.begin_attempt()
    }

    /// Registers a topic and asserts it immediately when open. A duplicate
    /// subscribe still goes out on the wire but leaves one registry entry.
    pub fn subscribe(&mut self, topic: Topic) -> Vec<Action> {
        let message = OutboundMessage::subscribe(&topic);
        if !self.subscriptions.subscribe(topic) {
            tracing::debug!(kind = message.type_str(), "topic already registered");
        }
        if self.can_send() {
            vec![Action::Send(message)]
        } else {
            Vec::new()
        }
    }

    /// Removes a topic so no later reconnect resurrects it, withdrawing it
    /// on the wire only when open.
    pub fn unsubscribe(&mut self, topic: &Topic) -> Vec<Action> {
        if !self.subscriptions.unsubscribe(topic) {
            tracing::debug!(%topic, "topic was not registered");
        }
        if self.can_send() {
            vec![Action::Send(OutboundMessage::unsubscribe(topic))]
        } else {
            Vec::new()
        }
    }

    fn begin_attempt(&mut self) -> Vec<Action> {
        self.phase = Phase::Connecting;
        self.attempt_started_at = Some(Utc::now());
        match self.endpoint.url() {
            Ok(url) => {
                tracing::info!(%url, attempt = self.reconnect.attempts(), "opening connection");
                self.current_url = Some(url.clone());
                vec![Action::OpenTransport(url)]
            }
            Err(err) => {
                tracing::warn!(error = %err, "cannot construct transport");
                self.on_close(CloseEvent::failed(err.to_string()))
            }
        }
    }
}

fn duration_ms(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}
