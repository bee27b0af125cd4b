// Request Guards
// Extractors gating protected endpoints on the session cookie. Pure session
// lookups; the identity provider is never consulted per request.

use axum::Json;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;

use crate::session::{SessionContents, SessionStore, SessionUser};

/// Required authenticated user. Rejects with a 401 JSON body when the
/// session holds no user.
pub struct CurrentUser(pub SessionUser);

/// Rejection carrying the JSON body the browser client expects.
pub struct Unauthenticated;

impl IntoResponse for Unauthenticated {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Not authenticated" })),
        )
            .into_response()
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<SessionStore>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Unauthenticated;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = Arc::<SessionStore>::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        match sessions.load(&jar) {
            SessionContents::Authenticated { user, .. } => Ok(CurrentUser(user)),
            _ => Err(Unauthenticated),
        }
    }
}

/// Authenticated user when present; never rejects.
pub struct MaybeUser(pub Option<SessionUser>);

impl<S> FromRequestParts<S> for MaybeUser
where
    Arc<SessionStore>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = Arc::<SessionStore>::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let user = match sessions.load(&jar) {
            SessionContents::Authenticated { user, .. } => Some(user),
            _ => None,
        };
        Ok(MaybeUser(user))
    }
}
