//! Domain layer: topics, notifications, projections and client events.
//!
//! Everything here is transport-agnostic. The `ws` layer turns frames into
//! updates on these types, and observers read them through the facade.

pub mod client_event;
pub mod event_bus;
pub mod notification;
pub mod progress;
pub mod projection;
pub mod status;
pub mod topic;

pub use client_event::ClientEvent;
pub use event_bus::EventBus;
pub use notification::{Notification, NotificationFeed, NotificationKind};
pub use progress::{ProgressEntry, ProgressMap};
pub use projection::{Projection, RoomState};
pub use status::{ConnectionStatus, Phase};
pub use topic::{Topic, TopicKind};
