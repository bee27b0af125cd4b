// Session cookie store
// The entire session lives in one encrypted client-side cookie. Contents are
// a tagged union, so handshake artifacts and the authenticated user are
// mutually exclusive states rather than keys in a shared bag.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use argon2::Argon2;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::auth::groups::Role;
use crate::config::SessionConfig;

/// Payload format marker, bumped on key or format rotation.
const PAYLOAD_VERSION: &str = "v1";

/// Application-scoped salt for deriving the sealing key from the configured
/// secret. Fixed so cookies stay readable across restarts.
const KEY_SALT: &[u8] = b"offering-catalog.session.v1";

/// Session sealing errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Session encryption failed: {0}")]
    Seal(String),

    #[error("Session decryption failed: {0}")]
    Unseal(String),

    #[error("Session serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid session payload format")]
    InvalidFormat,
}

/// Everything a browser session can hold.
///
/// `Handshake` exists only between login-start and the callback;
/// `Authenticated` is built from scratch on a successful callback, so nothing
/// from the handshake can survive into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionContents {
    #[default]
    Empty,
    Handshake(HandshakeState),
    Authenticated { user: SessionUser, token: TokenSet },
}

impl SessionContents {
    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            SessionContents::Authenticated { user, .. } => Some(user),
            _ => None,
        }
    }

    pub fn handshake(&self) -> Option<&HandshakeState> {
        match self {
            SessionContents::Handshake(handshake) => Some(handshake),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionContents::Authenticated { .. })
    }
}

/// Anti-forgery artifacts held between login-start and callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeState {
    pub state: String,
    pub nonce: String,
    pub pkce_verifier: String,
}

/// Authenticated user record. Rebuilt on every login, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    #[serde(rename = "sub")]
    pub subject: String,
    pub name: String,
    pub email: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    /// Provider-opaque identities blob, carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identities: Option<Value>,
    pub roles: Vec<Role>,
}

/// Access-token metadata stored alongside the user.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub token_type: String,
    /// Absolute expiry as unix seconds, absent when the provider did not
    /// report a token lifetime.
    pub expires_at: Option<i64>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Seals session contents into the browser cookie and opens them again.
///
/// AES-256-GCM over the JSON-encoded contents; the key is derived from the
/// configured secret with Argon2. Payload wire format is
/// `v1.<nonce b64>.<ciphertext b64>`.
pub struct SessionStore {
    cipher: Aes256Gcm,
    cookie_name: String,
    max_age: time::Duration,
    secure: bool,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Result<Self, SessionError> {
        let mut key = [0u8; 32];
        Argon2::default()
            .hash_password_into(config.secret.as_bytes(), KEY_SALT, &mut key)
            .map_err(|e| SessionError::KeyDerivation(e.to_string()))?;

        Ok(Self {
            cipher: Aes256Gcm::new((&key).into()),
            cookie_name: config.cookie_name.clone(),
            max_age: config.max_age(),
            secure: config.secure,
        })
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Whether the browser sent a session cookie at all, readable or not.
    pub fn cookie_present(&self, jar: &CookieJar) -> bool {
        jar.get(&self.cookie_name)
            .is_some_and(|cookie| !cookie.value().is_empty())
    }

    /// Read the session from the request cookies.
    ///
    /// An absent, expired, or unreadable cookie loads as `Empty`; a tampered
    /// cookie is indistinguishable from no session.
    pub fn load(&self, jar: &CookieJar) -> SessionContents {
        let Some(cookie) = jar.get(&self.cookie_name) else {
            return SessionContents::Empty;
        };
        match self.unseal(cookie.value()) {
            Ok(contents) => contents,
            Err(err) => {
                debug!(error = %err, "discarding unreadable session cookie");
                SessionContents::Empty
            }
        }
    }

    /// Replace the session with `contents`, rewriting the cookie.
    pub fn store(
        &self,
        jar: CookieJar,
        contents: &SessionContents,
    ) -> Result<CookieJar, SessionError> {
        let sealed = self.seal(contents)?;
        let cookie = Cookie::build((self.cookie_name.clone(), sealed))
            .path("/")
            .secure(self.secure)
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(self.max_age);
        Ok(jar.add(cookie))
    }

    /// Destroy the session, instructing the browser to delete the cookie.
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        let removal = Cookie::build((self.cookie_name.clone(), ""))
            .path("/")
            .max_age(time::Duration::ZERO);
        jar.add(removal)
    }

    /// Serialize and encrypt contents into a cookie payload string.
    pub fn seal(&self, contents: &SessionContents) -> Result<String, SessionError> {
        let plaintext = serde_json::to_vec(contents)?;

        // Random 96-bit nonce per write, carried inside the payload
        let nonce_bytes: [u8; 12] = rand::random();
        let nonce = Nonce::from(nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|e| SessionError::Seal(e.to_string()))?;

        Ok(format!(
            "{PAYLOAD_VERSION}.{}.{}",
            URL_SAFE_NO_PAD.encode(nonce_bytes),
            URL_SAFE_NO_PAD.encode(&ciphertext)
        ))
    }

    /// Decrypt and deserialize a cookie payload string.
    pub fn unseal(&self, payload: &str) -> Result<SessionContents, SessionError> {
        let mut parts = payload.splitn(3, '.');
        let (version, nonce_b64, ciphertext_b64) = match (parts.next(), parts.next(), parts.next())
        {
            (Some(version), Some(nonce), Some(ciphertext)) => (version, nonce, ciphertext),
            _ => return Err(SessionError::InvalidFormat),
        };

        if version != PAYLOAD_VERSION {
            return Err(SessionError::InvalidFormat);
        }

        let nonce_bytes = URL_SAFE_NO_PAD
            .decode(nonce_b64)
            .map_err(|_| SessionError::InvalidFormat)?;
        if nonce_bytes.len() != 12 {
            return Err(SessionError::InvalidFormat);
        }

        let ciphertext = URL_SAFE_NO_PAD
            .decode(ciphertext_b64)
            .map_err(|_| SessionError::InvalidFormat)?;

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|e| SessionError::Unseal(e.to_string()))?;

        Ok(serde_json::from_slice(&plaintext)?)
    }
}
