//! Heartbeat monitor.
//!
//! While a connection is open the driver awaits [`Heartbeat::tick`] and
//! sends a `ping` on every tick. The ticker is created on open and dropped
//! on close, so no timer outlives the socket that armed it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Default interval between pings.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Periodic liveness ping bound to one open connection.
#[derive(Debug)]
pub struct Heartbeat {
    period: Duration,
    ticker: Option<Interval>,
    last_ping: Option<DateTime<Utc>>,
    last_pong: Option<DateTime<Utc>>,
}

impl Heartbeat {
    /// Creates a stopped monitor. A zero period disables pinging.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            ticker: None,
            last_ping: None,
            last_pong: None,
        }
    }

    /// Arms the ticker. The first tick fires one full period from now.
    pub fn start(&mut self) {
        if self.period.is_zero() {
            return;
        }
        let mut ticker = time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    /// Drops the ticker. Safe to call when already stopped.
    pub fn stop(&mut self) {
        self.ticker = None;
    }

    /// Returns `true` while the ticker is armed.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Resolves on the next tick; never resolves while stopped.
    pub async fn tick(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Records that a ping was sent.
    pub fn record_ping(&mut self) {
        self.last_ping = Some(Utc::now());
    }

    /// Records a `pong` from the server.
    pub fn record_pong(&mut self) {
        self.last_pong = Some(Utc::now());
    }

    /// When the last ping was sent.
    #[must_use]
    pub const fn last_ping(&self) -> Option<DateTime<Utc>> {
        self.last_ping
    }

    /// When the last pong arrived.
    #[must_use]
    pub const fn last_pong(&self) -> Option<DateTime<Utc>> {
        self.last_pong
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period_while_running() {
        let mut heartbeat = Heartbeat::new(Duration::from_secs(30));
        heartbeat.start();
        let started = Instant::now();

        heartbeat.tick().await;
        assert_eq!(started.elapsed(), Duration::from_secs(30));
        heartbeat.tick().await;
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_heartbeat_never_ticks() {
        let mut heartbeat = Heartbeat::new(Duration::from_secs(1));
        heartbeat.start();
        heartbeat.stop();
        assert!(!heartbeat.is_running());

        let fired = time::timeout(Duration::from_secs(10), heartbeat.tick()).await;
        assert!(fired.is_err());
    }

    #[test]
    fn zero_period_disables() {
        let mut heartbeat = Heartbeat::new(Duration::ZERO);
        heartbeat.start();
        assert!(!heartbeat.is_running());
    }

    #[test]
    fn records_ping_and_pong() {
        let mut heartbeat = Heartbeat::new(DEFAULT_HEARTBEAT_INTERVAL);
        assert!(heartbeat.last_pong().is_none());
        heartbeat.record_ping();
        heartbeat.record_pong();
        assert!(heartbeat.last_ping().is_some());
        assert!(heartbeat.last_pong().is_some());
    }
}
