//! Service layer: the public client facade.
//!
//! [`RealtimeClient`] wires the connection driver, the projection and the
//! [`super::domain::EventBus`] together behind one handle.

pub mod realtime_client;

pub use realtime_client::RealtimeClient;
