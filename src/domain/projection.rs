//! Locally materialized view derived from inbound messages.
//!
//! [`Projection`] is written only by the dispatcher running on the driver
//! task. Observers get owned copies through the facade.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;

use super::notification::{DEFAULT_FEED_CAPACITY, NotificationFeed};
use super::progress::ProgressMap;

/// Messages kept per room; older ones are evicted.
pub const ROOM_HISTORY_CAPACITY: usize = 100;

/// What the client knows about one room.
#[derive(Debug, Clone, Default)]
pub struct RoomState {
    /// Latest metadata from `room_info`.
    pub info: Option<Value>,
    messages: VecDeque<Value>,
}

impl RoomState {
    /// Appends a message, evicting the oldest past capacity.
    pub fn push_message(&mut self, message: Value) {
        self.messages.push_back(message);
        while self.messages.len() > ROOM_HISTORY_CAPACITY {
            self.messages.pop_front();
        }
    }

    /// Replaces the backlog with the server's history, keeping the newest
    /// entries when the history exceeds capacity.
    pub fn replace_history(&mut self, messages: Vec<Value>) {
        let skip = messages.len().saturating_sub(ROOM_HISTORY_CAPACITY);
        self.messages = messages.into_iter().skip(skip).collect();
    }

    /// Messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<Value> {
        self.messages.iter().cloned().collect()
    }
}

/// Every piece of state derived from the inbound stream.
#[derive(Debug, Clone)]
pub struct Projection {
    /// Identifier the server assigned to the current connection.
    pub connection_id: Option<String>,
    /// Newest-first notification feed.
    pub notifications: NotificationFeed,
    /// Latest payload per task id.
    pub tasks: ProgressMap,
    /// Latest payload per workflow id.
    pub workflows: ProgressMap,
    /// Per-room state keyed by room name.
    pub rooms: HashMap<String, RoomState>,
}

impl Projection {
    /// Creates an empty projection with the given feed capacity.
    #[must_use]
    pub fn new(feed_capacity: usize) -> Self {
        Self {
            connection_id: None,
            notifications: NotificationFeed::new(feed_capacity),
            tasks: ProgressMap::new(),
            workflows: ProgressMap::new(),
            rooms: HashMap::new(),
        }
    }

    /// Returns the room entry, creating it on first use.
    pub fn room_mut(&mut self, room: &str) -> &mut RoomState {
        self.rooms.entry(room.to_string()).or_default()
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}
