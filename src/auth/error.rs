// Authentication Error Types
// Failure taxonomy for the OIDC login flow. None of these surface to the
// browser as raw errors; the callback handler resolves every variant to a
// redirect.

use thiserror::Error;

use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Callback `state` absent or not matching the stored handshake.
    /// Routine, not a fault: double-submits, stale bookmarked callback URLs,
    /// and parallel login tabs all produce it. Recovered by restarting login.
    #[error("OAuth2 state missing or not matching the login attempt")]
    StateMismatch,

    /// The provider rejected the exchange or reported an error on the
    /// callback itself.
    #[error("Identity provider error: {0}")]
    Provider(String),

    /// Neither ID-token claims nor the userinfo endpoint yielded an identity.
    #[error("Identity could not be resolved from ID token or userinfo")]
    IdentityUnavailable,

    /// Identity resolution produced a record with no usable subject.
    #[error("Identity provider returned no usable user record")]
    NoUser,

    #[error("OIDC discovery failed: {0}")]
    Discovery(String),

    #[error("Invalid OIDC configuration: {0}")]
    Configuration(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Provider communication timeout")]
    Timeout,
}

// Conversion from reqwest errors
impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AuthError::Timeout
        } else {
            AuthError::Http(err.to_string())
        }
    }
}

impl AuthError {
    /// Query marker appended to the front-end login URL for terminal
    /// failures. `StateMismatch` never reaches this; the callback handler
    /// redirects it back to `/auth/login` instead.
    pub fn failure_marker(&self) -> &'static str {
        match self {
            AuthError::Provider(_) => "oauth_error",
            AuthError::IdentityUnavailable => "userinfo_failed",
            AuthError::NoUser => "no_user",
            _ => "auth_failed",
        }
    }
}
