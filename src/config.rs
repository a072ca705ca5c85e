//! Client configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Every key is prefixed with
//! `REALTIME_`; unset or unparsable numbers fall back to the defaults.

use std::time::Duration;

use crate::domain::Topic;
use crate::domain::notification::DEFAULT_FEED_CAPACITY;
use crate::error::ClientError;
use crate::ws::heartbeat::DEFAULT_HEARTBEAT_INTERVAL;
use crate::ws::policy::{BackoffStrategy, ReconnectPolicy};

/// Default handshake limit.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Top-level client configuration.
///
/// Build one with [`ClientConfig::default`] and override fields, or load
/// it once at startup via [`ClientConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Hosting origin (e.g. `https://ugene.example.org`). Its scheme picks
    /// `ws` or `wss`.
    pub base_origin: String,

    /// Fixed path prefix in front of the principal segment.
    pub path_prefix: String,

    /// Subscribing principal (user id).
    pub principal: String,

    /// Value of the `client_type` query parameter.
    pub client_type: String,

    /// Backoff and retry ceiling.
    pub reconnect: ReconnectPolicy,

    /// Heartbeat period. Zero disables pinging.
    pub heartbeat_interval: Duration,

    /// Upper bound on a single WebSocket handshake. An attempt that takes
    /// longer is failed and counts toward the retry ceiling. Zero disables
    /// the limit.
    pub connect_timeout: Duration,

    /// Maximum notifications kept in the feed.
    pub notification_capacity: usize,

    /// Capacity of the facade → driver command channel.
    pub command_capacity: usize,

    /// Capacity of the client event broadcast channel.
    pub event_bus_capacity: usize,

    /// Topics registered before the first connect.
    pub initial_topics: Vec<Topic>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_origin: "http://localhost:8000".to_string(),
            path_prefix: "/ws".to_string(),
            principal: "anonymous".to_string(),
            client_type: "web".to_string(),
            reconnect: ReconnectPolicy::default(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            notification_capacity: DEFAULT_FEED_CAPACITY,
            command_capacity: 256,
            event_bus_capacity: 1024,
            initial_topics: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidConfig`] for an unknown
    /// `REALTIME_BACKOFF` value and [`ClientError::InvalidTopic`] for a
    /// malformed `REALTIME_SUBSCRIBE` entry.
    pub fn from_env() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] but reads keys through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let defaults = Self::default();
        let string = |key: &str, default: String| lookup(key).unwrap_or(default);

        let base_delay_ms = parse_env(&lookup, "REALTIME_RECONNECT_BASE_DELAY_MS", 1000_u64);
        let max_delay_ms = parse_env(&lookup, "REALTIME_RECONNECT_MAX_DELAY_MS", 60_000_u64);
        let factor = parse_env(&lookup, "REALTIME_BACKOFF_FACTOR", 2_u32);
        let strategy = match lookup("REALTIME_BACKOFF")
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("" | "exponential") => BackoffStrategy::Exponential { factor },
            Some("linear") => BackoffStrategy::Linear,
            Some(other) => {
                return Err(ClientError::InvalidConfig(format!(
                    "REALTIME_BACKOFF must be `exponential` or `linear`, got `{other}`"
                )));
            }
        };

        let reconnect = ReconnectPolicy {
            max_attempts: parse_env(
                &lookup,
                "REALTIME_MAX_RECONNECT_ATTEMPTS",
                defaults.reconnect.max_attempts,
            ),
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
            strategy,
        };

        let initial_topics = lookup("REALTIME_SUBSCRIBE")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(str::parse)
                    .collect::<Result<Vec<Topic>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            base_origin: string("REALTIME_BASE_ORIGIN", defaults.base_origin),
            path_prefix: string("REALTIME_PATH_PREFIX", defaults.path_prefix),
            principal: string("REALTIME_PRINCIPAL", defaults.principal),
            client_type: string("REALTIME_CLIENT_TYPE", defaults.client_type),
            reconnect,
            heartbeat_interval: Duration::from_secs(parse_env(
                &lookup,
                "REALTIME_HEARTBEAT_INTERVAL_SECS",
                defaults.heartbeat_interval.as_secs(),
            )),
            connect_timeout: Duration::from_millis(parse_env(
                &lookup,
                "REALTIME_CONNECT_TIMEOUT_MS",
                u64::try_from(defaults.connect_timeout.as_millis()).unwrap_or(u64::MAX),
            )),
            notification_capacity: parse_env(
                &lookup,
                "REALTIME_NOTIFICATION_CAPACITY",
                defaults.notification_capacity,
            ),
            command_capacity: parse_env(&lookup, "REALTIME_COMMAND_CAPACITY", defaults.command_capacity),
            event_bus_capacity: parse_env(
                &lookup,
                "REALTIME_EVENT_BUS_CAPACITY",
                defaults.event_bus_capacity,
            ),
            initial_topics,
        })
    }
}

/// Parses a variable as `T`, returning `default` on missing or invalid
/// values.
fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::domain::TopicKind;

    fn load(vars: &[(&str, &str)]) -> Result<ClientConfig, ClientError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ClientConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let Ok(config) = load(&[]) else {
            panic!("empty environment should load");
        };
        assert_eq!(config.base_origin, "http://localhost:8000");
        assert_eq!(config.principal, "anonymous");
        assert_eq!(config.reconnect, ReconnectPolicy::default());
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.notification_capacity, 50);
        assert!(config.initial_topics.is_empty());
    }

    #[test]
    fn overrides_are_applied() {
        let Ok(config) = load(&[
            ("REALTIME_BASE_ORIGIN", "https://ugene.example.org"),
            ("REALTIME_PRINCIPAL", "alice"),
            ("REALTIME_MAX_RECONNECT_ATTEMPTS", "3"),
            ("REALTIME_RECONNECT_BASE_DELAY_MS", "250"),
            ("REALTIME_BACKOFF", "Linear"),
            ("REALTIME_HEARTBEAT_INTERVAL_SECS", "0"),
            ("REALTIME_SUBSCRIBE", "task:42, room:lab1,"),
        ]) else {
            panic!("valid environment should load");
        };
        assert_eq!(config.base_origin, "https://ugene.example.org");
        assert_eq!(config.principal, "alice");
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.reconnect.base_delay, Duration::from_millis(250));
        assert_eq!(config.reconnect.strategy, BackoffStrategy::Linear);
        assert!(config.heartbeat_interval.is_zero());
        let kinds: Vec<_> = config.initial_topics.iter().map(Topic::kind).collect();
        assert_eq!(kinds, [TopicKind::Task, TopicKind::Room]);
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let Ok(config) = load(&[
            ("REALTIME_MAX_RECONNECT_ATTEMPTS", "many"),
            ("REALTIME_BACKOFF_FACTOR", "-1"),
        ]) else {
            panic!("bad numbers are not fatal");
        };
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(
            config.reconnect.strategy,
            BackoffStrategy::Exponential { factor: 2 }
        );
    }

    #[test]
    fn connect_timeout_is_read_in_milliseconds() {
        let Ok(config) = load(&[("REALTIME_CONNECT_TIMEOUT_MS", "1500")]) else {
            panic!("valid timeout should load");
        };
        assert_eq!(config.connect_timeout, Duration::from_millis(1500));

        let Ok(config) = load(&[("REALTIME_CONNECT_TIMEOUT_MS", "soon")]) else {
            panic!("bad timeout is not fatal");
        };
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn unknown_backoff_is_rejected() {
        assert!(matches!(
            load(&[("REALTIME_BACKOFF", "fibonacci")]),
            Err(ClientError::InvalidConfig(_))
        ));
    }

    #[test]
    fn malformed_topic_is_rejected() {
        assert!(matches!(
            load(&[("REALTIME_SUBSCRIBE", "task:1,bogus")]),
            Err(ClientError::InvalidTopic(_))
        ));
    }
}
