use thiserror::Error;

/// HTTP status Twitch answers with when a gateway in front of Helix hiccups.
pub const HTTP_BAD_GATEWAY: u16 = 502;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The API could not be reached at all (DNS, refused connection, no route).
    #[error("unable to connect to Twitch: {0}")]
    Connection(String),

    /// The token endpoint rejected the client id / secret pair.
    #[error("authentication failed with status code {status_code}: {message}")]
    Authentication { status_code: u16, message: String },

    /// Any other non-2xx answer.
    #[error("{message}")]
    Request { status_code: u16, message: String },

    #[error("http error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("unexpected response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },
}

impl ApiError {
    /// Classify a transport-level reqwest error.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Transport(err)
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    pub fn authentication(status_code: u16, message: impl Into<String>) -> Self {
        Self::Authentication {
            status_code,
            message: message.into(),
        }
    }

    pub fn request(status_code: u16, message: impl Into<String>) -> Self {
        Self::Request {
            status_code,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Authentication { status_code, .. } | Self::Request { status_code, .. } => {
                Some(*status_code)
            }
            _ => None,
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    pub fn is_bad_gateway(&self) -> bool {
        matches!(
            self,
            Self::Request {
                status_code: HTTP_BAD_GATEWAY,
                ..
            }
        )
    }

    /// Whether retrying the same call later may succeed without user action.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Transport(_) => true,
            Self::Request { status_code, .. } => *status_code == 429 || *status_code >= 500,
            _ => false,
        }
    }
}
