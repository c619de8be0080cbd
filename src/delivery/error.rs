use thiserror::Error;

/// Status codes the provider uses for throttling
const TOO_MANY_REQUESTS: u16 = 429;
const INTERNAL_SERVER_ERROR: u16 = 500;

/// Maximum number of response body bytes kept on an API error
pub(crate) const MAX_ERROR_BODY: usize = 1024;

#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Provider answered with a non-success status
    #[error("provider returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// Request never produced a response (connect, TLS, timeout, ...)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("client configuration error: {0}")]
    Configuration(String),

    #[error("delivery failed: {0}")]
    Other(String),
}

impl DeliveryError {
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        let mut body = body.into();
        if body.len() > MAX_ERROR_BODY {
            let mut end = MAX_ERROR_BODY;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
        }
        Self::Api { status, body }
    }

    /// HTTP status reported by the provider, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for throttling (429) and server errors (5xx).
    ///
    /// Errors without a status are never retriable: without a response we can
    /// not tell whether the provider already accepted the message.
    pub fn is_retriable(&self) -> bool {
        matches!(self.status(), Some(status) if status == TOO_MANY_REQUESTS || status >= INTERNAL_SERVER_ERROR)
    }

    /// Short label used for logs and the dropped-notification metric
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Api { status, .. } if *status == TOO_MANY_REQUESTS => "rate_limited",
            Self::Api { status, .. } if *status >= INTERNAL_SERVER_ERROR => "server_error",
            Self::Api { .. } => "client_error",
            Self::Transport(_) => "transport",
            Self::Configuration(_) => "configuration",
            Self::Other(_) => "unclassified",
        }
    }
}
