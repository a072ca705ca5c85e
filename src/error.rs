//! Client error types with numeric error codes.
//!
//! [`ClientError`] is the central error type for the real-time client. Most
//! failures never cross the facade boundary: the driver task converts them
//! into observable [`crate::domain::ConnectionStatus`] fields. The variants
//! still carry stable numeric codes so UI layers can map them.

/// Client-side error enum with numeric code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category               |
/// |-----------|------------------------|
/// | 1000–1999 | Configuration/Endpoint |
/// | 2000–2999 | Connection             |
/// | 3000–3999 | Codec                  |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The endpoint URL could not be built from the configured origin.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The origin uses a scheme that cannot carry a WebSocket.
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// A topic string was not of the form `kind:id`.
    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    /// A configuration value was present but unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The underlying socket failed to open, send or stay open.
    #[error("transport error: {0}")]
    Transport(String),

    /// A send was attempted while no connection is open.
    #[error("not connected")]
    NotConnected,

    /// The driver task has shut down; the client can no longer be used.
    #[error("client disposed")]
    Disposed,

    /// An inbound frame was not valid JSON or had the wrong shape.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// An inbound frame had no string `type` discriminator.
    #[error("frame is missing a type discriminator")]
    MissingType,

    /// An outbound message could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),
}

impl ClientError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidEndpoint(_) => 1001,
            Self::UnsupportedScheme(_) => 1002,
            Self::InvalidTopic(_) => 1003,
            Self::InvalidConfig(_) => 1004,
            Self::Transport(_) => 2001,
            Self::NotConnected => 2002,
            Self::Disposed => 2003,
            Self::MalformedFrame(_) => 3001,
            Self::MissingType => 3002,
            Self::Encode(_) => 3003,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}
