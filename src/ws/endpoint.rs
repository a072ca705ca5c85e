//! Endpoint URL construction.
//!
//! The socket URL is derived from the hosting origin: `https` origins get
//! `wss`, `http` origins get `ws`. The principal is carried both as the
//! last path segment and as the `user_id` query parameter, next to the
//! `client_type` marker.

use url::Url;

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Inputs needed to build the socket URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_origin: String,
    path_prefix: String,
    principal: String,
    client_type: String,
}

impl Endpoint {
    /// Creates an endpoint description. Nothing is validated until
    /// [`Endpoint::url`] is called.
    #[must_use]
    pub fn new(
        base_origin: impl Into<String>,
        path_prefix: impl Into<String>,
        principal: impl Into<String>,
        client_type: impl Into<String>,
    ) -> Self {
        Self {
            base_origin: base_origin.into(),
            path_prefix: path_prefix.into(),
            principal: principal.into(),
            client_type: client_type.into(),
        }
    }

    /// Takes the endpoint fields from a [`ClientConfig`].
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.base_origin.clone(),
            config.path_prefix.clone(),
            config.principal.clone(),
            config.client_type.clone(),
        )
    }

    /// Builds the socket URL.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidEndpoint`] if the origin does not
    /// parse, has no host, or the principal is empty, and
    /// [`ClientError::UnsupportedScheme`] for origins that are neither
    /// HTTP(S) nor WS(S).
    pub fn url(&self) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.base_origin)?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(ClientError::UnsupportedScheme(other.to_string())),
        };
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ClientError::InvalidEndpoint(format!(
                "origin `{}` has no host",
                self.base_origin
            )));
        }
        if self.principal.trim().is_empty() {
            return Err(ClientError::InvalidEndpoint("principal is empty".to_string()));
        }

        url.set_scheme(scheme)
            .map_err(|()| ClientError::UnsupportedScheme(scheme.to_string()))?;
        url.set_query(None);
        url.set_fragment(None);
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                ClientError::InvalidEndpoint(format!(
                    "origin `{}` cannot carry a path",
                    self.base_origin
                ))
            })?;
            segments.clear();
            for segment in self.path_prefix.split('/').filter(|s| !s.is_empty()) {
                segments.push(segment);
            }
            segments.push(&self.principal);
        }
        url.query_pairs_mut()
            .append_pair("user_id", &self.principal)
            .append_pair("client_type", &self.client_type);

        Ok(url)
    }
}
