//! Reconnection policy: backoff delays and retry-ceiling bookkeeping.

use std::time::Duration;

/// Default number of automatic attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base delay between attempts.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default upper bound on a single delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// How the delay grows with the attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// `base × factor^attempt`.
    Exponential {
        /// Growth factor, normally 2.
        factor: u32,
    },
    /// `base × attempt`.
    Linear,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential { factor: 2 }
    }
}

/// Static reconnection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts allowed between two successful opens.
    pub max_attempts: u32,
    /// Delay unit.
    pub base_delay: Duration,
    /// Clamp applied to every computed delay.
    pub max_delay: Duration,
    /// Growth rule.
    pub strategy: BackoffStrategy,
}

impl ReconnectPolicy {
    /// Delay before the given one-based attempt, clamped to `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = match self.strategy {
            BackoffStrategy::Exponential { factor } => factor.saturating_pow(attempt),
            BackoffStrategy::Linear => attempt,
        };
        self.base_delay
            .checked_mul(multiplier)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            strategy: BackoffStrategy::default(),
        }
    }
}

/// What to do after a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Schedule attempt number `attempt` after `delay`.
    Retry {
        /// One-based attempt number.
        attempt: u32,
        /// Wait before the attempt.
        delay: Duration,
    },
    /// The close was requested by the client; never retry.
    Intentional,
    /// The ceiling was reached; stop until a manual connect.
    Exhausted {
        /// Attempts made before giving up.
        attempts: u32,
    },
}

/// Mutable retry bookkeeping for one client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconnectState {
    attempts: u32,
}

impl ReconnectState {
    /// Creates a fresh state with zero attempts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts made since the last successful open.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Called on every successful open and on manual connects.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Decides what follows a close. The counter never exceeds
    /// `policy.max_attempts`.
    pub fn on_close(&mut self, policy: &ReconnectPolicy, intentional: bool) -> ReconnectDecision {
        if intentional {
            return ReconnectDecision::Intentional;
        }
        if self.attempts >= policy.max_attempts {
            return ReconnectDecision::Exhausted {
                attempts: self.attempts,
            };
        }
        self.attempts += 1;
        ReconnectDecision::Retry {
            attempt: self.attempts,
            delay: policy.delay_for(self.attempts),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn policy(strategy: BackoffStrategy) -> ReconnectPolicy {
        ReconnectPolicy {
            strategy,
            ..ReconnectPolicy::default()
        }
    }

    #[test]
    fn exponential_delays() {
        let p = policy(BackoffStrategy::Exponential { factor: 2 });
        let delays: Vec<_> = (1..=5).map(|a| p.delay_for(a).as_secs()).collect();
        assert_eq!(delays, [2, 4, 8, 16, 32]);
    }

    #[test]
    fn linear_delays() {
        let p = policy(BackoffStrategy::Linear);
        let delays: Vec<_> = (1..=4).map(|a| p.delay_for(a).as_secs()).collect();
        assert_eq!(delays, [1, 2, 3, 4]);
    }

    #[test]
    fn delay_is_clamped() {
        let p = ReconnectPolicy {
            max_delay: Duration::from_secs(10),
            ..ReconnectPolicy::default()
        };
        assert_eq!(p.delay_for(4), Duration::from_secs(10));
        assert_eq!(p.delay_for(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn intentional_close_never_retries() {
        let mut state = ReconnectState::new();
        let decision = state.on_close(&ReconnectPolicy::default(), true);
        assert_eq!(decision, ReconnectDecision::Intentional);
        assert_eq!(state.attempts(), 0);
    }

    #[test]
    fn ceiling_stops_retries() {
        let p = ReconnectPolicy::default();
        let mut state = ReconnectState::new();
        for expected in 1..=p.max_attempts {
            let ReconnectDecision::Retry { attempt, .. } = state.on_close(&p, false) else {
                panic!("attempt {expected} should be allowed");
            };
            assert_eq!(attempt, expected);
        }
        assert_eq!(
            state.on_close(&p, false),
            ReconnectDecision::Exhausted { attempts: 5 }
        );
        assert_eq!(state.attempts(), p.max_attempts);
    }

    #[test]
    fn reset_restarts_backoff() {
        let p = ReconnectPolicy::default();
        let mut state = ReconnectState::new();
        state.on_close(&p, false);
        state.on_close(&p, false);
        state.reset();
        assert_eq!(
            state.on_close(&p, false),
            ReconnectDecision::Retry {
                attempt: 1,
                delay: Duration::from_secs(2)
            }
        );
    }
}
