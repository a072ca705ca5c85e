//! Kind-tagged subscription topics.
//!
//! A [`Topic`] names something the client wants to observe: a task, a
//! workflow, a named room or a notification channel. Topics are plain
//! values so they can live in the subscription registry independently of
//! any socket.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// What a [`Topic`] identifier refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicKind {
    /// A single analysis task.
    Task,
    /// A workflow run.
    Workflow,
    /// A generic named room.
    Room,
    /// A notification channel, joined like a room.
    Channel,
}

impl TopicKind {
    /// Returns the kind as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Workflow => "workflow",
            Self::Room => "room",
            Self::Channel => "channel",
        }
    }
}

impl fmt::Display for TopicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TopicKind {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "task" => Ok(Self::Task),
            "workflow" => Ok(Self::Workflow),
            "room" => Ok(Self::Room),
            "channel" => Ok(Self::Channel),
            other => Err(ClientError::InvalidTopic(format!("unknown topic kind `{other}`"))),
        }
    }
}

/// A subscription target: identifier plus kind.
///
/// Equality is by `(kind, id)`, which is what makes the subscription
/// registry a set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic {
    kind: TopicKind,
    id: String,
}

impl Topic {
    /// Creates a topic of the given kind.
    #[must_use]
    pub fn new(kind: TopicKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Creates a task topic.
    #[must_use]
    pub fn task(id: impl Into<String>) -> Self {
        Self::new(TopicKind::Task, id)
    }

    /// Creates a workflow topic.
    #[must_use]
    pub fn workflow(id: impl Into<String>) -> Self {
        Self::new(TopicKind::Workflow, id)
    }

    /// Creates a room topic.
    #[must_use]
    pub fn room(name: impl Into<String>) -> Self {
        Self::new(TopicKind::Room, name)
    }

    /// Creates a notification channel topic.
    #[must_use]
    pub fn channel(name: impl Into<String>) -> Self {
        Self::new(TopicKind::Channel, name)
    }

    /// Returns the topic kind.
    #[must_use]
    pub const fn kind(&self) -> TopicKind {
        self.kind
    }

    /// Returns the topic identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Parses `kind:id`, e.g. `task:42` or `room:lab1`.
impl FromStr for Topic {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((kind, id)) = s.split_once(':') else {
            return Err(ClientError::InvalidTopic(format!(
                "expected `kind:id`, got `{s}`"
            )));
        };
        let id = id.trim();
        if id.is_empty() {
            return Err(ClientError::InvalidTopic(format!("empty id in `{s}`")));
        }
        Ok(Self::new(kind.parse()?, id))
    }
}
