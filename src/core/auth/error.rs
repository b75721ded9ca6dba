//! Client-side auth error taxonomy

/// Failure of an auth operation as seen by the session manager
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Validation(String),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Unexpected error: {0}")]
    Unknown(String),

    #[error("Superseded by a newer session request")]
    Superseded,

    #[error("Session manager has shut down")]
    SessionClosed,
}

impl AuthError {
    /// Text for a user-facing notification
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Network(_) => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            AuthError::InvalidCredentials => "Invalid email or password".to_string(),
            AuthError::Validation(message) => message.clone(),
            AuthError::Unauthenticated => "Your session has expired. Please sign in again.".to_string(),
            AuthError::Unknown(_) | AuthError::Superseded | AuthError::SessionClosed => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }

    /// Outcomes produced by the manager itself rather than by the API
    pub fn is_discarded(&self) -> bool {
        matches!(self, AuthError::Superseded | AuthError::SessionClosed)
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthError::Unknown(format!("Malformed response: {err}"))
        } else {
            AuthError::Network(err.to_string())
        }
    }
}
