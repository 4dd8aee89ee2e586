use serde::{Deserialize, Serialize};

/// Error body returned by the Growth backend, and the uniform shape every
/// failure is normalized into for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No HTTP response was received.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    /// The backend answered with a non-success status.
    #[error("{} (HTTP {status})", body.error)]
    Api { status: u16, body: ApiError },

    #[error("No authentication code received")]
    MissingAuthCode,

    #[error("Authorization code exchange rejected: {0}")]
    AuthExchange(String),

    #[error("Could not start sign-in: {0}")]
    LoginInit(#[source] Box<Error>),

    #[error("Sign-in callback failed: {0}")]
    Callback(#[source] Box<Error>),

    /// The refresh credential is missing, invalid or expired. The session has
    /// been signed out by the time this is observed.
    #[error("Token refresh failed: {0}")]
    RefreshFailure(String),

    #[error("Anti-forgery token rejected")]
    CsrfRejected,

    /// A payload did not match its schema.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Profile update failed: {0}")]
    ProfileUpdate(#[source] Box<Error>),

    /// The session was signed out while the operation was waiting.
    #[error("Session was signed out")]
    SignedOut,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status of the backend response, if one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::LoginInit(inner) | Self::Callback(inner) | Self::ProfileUpdate(inner) => {
                inner.status()
            }
            _ => None,
        }
    }

    /// `true` when the request never reached the backend.
    #[must_use]
    pub fn is_network(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::LoginInit(inner) | Self::Callback(inner) | Self::ProfileUpdate(inner) => {
                inner.is_network()
            }
            _ => false,
        }
    }

    /// Normalizes the failure into the `{error, details?}` shape shown to users.
    #[must_use]
    pub fn api_error(&self) -> ApiError {
        match self {
            Self::Network(msg) => ApiError::new("Network error").with_details(msg.clone()),
            Self::Timeout => ApiError::new("Request timeout"),
            Self::Api { body, .. } => body.clone(),
            other => ApiError::new(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Validation(e.to_string())
    }
}
