//! Connection lifecycle phase and the observable status snapshot.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle phase of the client's single connection slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No socket and no pending attempt.
    #[default]
    Idle,
    /// A socket handshake is in flight.
    Connecting,
    /// The socket is open.
    Open,
    /// The socket has closed; a reconnect may be scheduled.
    Closed,
}

impl Phase {
    /// Returns the phase as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    /// Returns `true` while a socket exists or is being opened.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the connection, published after every change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ConnectionStatus {
    /// Current lifecycle phase.
    pub phase: Phase,
    /// `true` only while the phase is [`Phase::Open`].
    pub connected: bool,
    /// Consecutive failed attempts since the last successful open.
    pub reconnect_attempts: u32,
    /// Set once the retry ceiling is hit; cleared by a manual connect.
    pub max_attempts_reached: bool,
    /// Description of the last involuntary close or failure.
    pub last_error: Option<String>,
    /// When the current (or most recent) connection attempt started.
    pub attempt_started_at: Option<DateTime<Utc>>,
}

impl ConnectionStatus {
    /// Returns `true` when automatic recovery has given up and only a
    /// manual connect can bring the link back.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.max_attempts_reached
    }

    /// Returns `true` while the client is down but still retrying.
    #[must_use]
    pub const fn is_reconnecting(&self) -> bool {
        !self.connected
            && !self.max_attempts_reached
            && self.reconnect_attempts > 0
            && matches!(self.phase, Phase::Closed | Phase::Connecting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_idle_and_disconnected() {
        let status = ConnectionStatus::default();
        assert_eq!(status.phase, Phase::Idle);
        assert!(!status.connected);
        assert!(!status.is_terminal());
        assert!(!status.is_reconnecting());
    }

    #[test]
    fn terminal_is_distinct_from_reconnecting() {
        let retrying = ConnectionStatus {
            phase: Phase::Closed,
            reconnect_attempts: 2,
            ..ConnectionStatus::default()
        };
        assert!(retrying.is_reconnecting());
        assert!(!retrying.is_terminal());

        let exhausted = ConnectionStatus {
            phase: Phase::Idle,
            reconnect_attempts: 5,
            max_attempts_reached: true,
            ..ConnectionStatus::default()
        };
        assert!(exhausted.is_terminal());
        assert!(!exhausted.is_reconnecting());
    }

    #[test]
    fn active_phases() {
        assert!(Phase::Connecting.is_active());
        assert!(Phase::Open.is_active());
        assert!(!Phase::Closed.is_active());
        assert_eq!(Phase::Open.to_string(), "open");
    }
}
