//! WebSocket layer: endpoint, wire codec, lifecycle and dispatch.
//!
//! [`machine::ConnectionMachine`] decides, the crate-private driver in
//! `connection` performs the I/O, and [`dispatcher::Dispatcher`] folds
//! inbound traffic into the projection.

pub(crate) mod connection;
pub mod dispatcher;
pub mod endpoint;
pub mod heartbeat;
pub mod machine;
pub mod messages;
pub mod policy;
pub mod subscription;

pub use dispatcher::Dispatcher;
pub use endpoint::Endpoint;
pub use heartbeat::Heartbeat;
pub use machine::{Action, CloseEvent, ConnectionMachine};
pub use messages::{InboundMessage, OutboundMessage};
pub use policy::{BackoffStrategy, ReconnectDecision, ReconnectPolicy, ReconnectState};
pub use subscription::SubscriptionRegistry;
