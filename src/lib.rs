//! # ugene-realtime
//!
//! Real-time update client for the UGENE web backend.
//!
//! Keeps one persistent WebSocket open to the backend, re-establishes it
//! with bounded backoff when it drops, replays the client's topic
//! subscriptions on every open, and folds inbound events into an
//! in-memory projection (notification feed, task and workflow progress,
//! room logs) that UI code reads without side effects.
//!
//! ## Architecture
//!
//! ```text
//! UI code
//!     │
//!     ├── RealtimeClient (service/)        commands ─┐   ▲ status (watch)
//!     │                                              │   │ events (broadcast)
//!     ├── connection driver (ws/)  ◀─────────────────┘   │
//!     │      ├── ConnectionMachine ── ReconnectPolicy    │
//!     │      ├── SubscriptionRegistry                    │
//!     │      ├── Heartbeat                               │
//!     │      └── codec (messages) ── Dispatcher ─────────┤
//!     │                                                  │
//!     └── Projection + EventBus (domain/) ───────────────┘
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;

pub use config::ClientConfig;
pub use error::ClientError;
pub use service::RealtimeClient;
