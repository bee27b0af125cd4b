// Auth Flow Controller
// Login-start, callback, logout, and status endpoints. Owns the
// state-clearing and error-redirect policy: every failure in the browser
// flow resolves to a redirect, never a raw error page.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::error::AuthError;
use super::extract::{CurrentUser, MaybeUser};
use super::groups;
use crate::AppState;
use crate::session::{SessionContents, SessionUser};

/// Query parameters the provider sends to the callback endpoint.
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Join a path onto the configured front-end origin.
fn frontend_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Terminal login failure: destroy the session and land the browser on the
/// front-end login page with an error marker it can present.
fn login_error_redirect(app: &AppState, jar: CookieJar, marker: &str) -> Response {
    let jar = app.sessions.clear(jar);
    let target = frontend_url(&app.config.frontend_url, &format!("/login?error={marker}"));
    (jar, Redirect::to(&target)).into_response()
}

/// Start the authorization-code flow, redirecting to the provider.
///
/// The session is overwritten wholesale with fresh handshake artifacts.
/// Stale `state` or PKCE values from an aborted attempt would otherwise
/// fail every subsequent legitimate callback.
async fn start_login(State(app): State<AppState>, jar: CookieJar) -> Response {
    let (auth_url, handshake) = app.provider.begin_login();

    match app
        .sessions
        .store(jar.clone(), &SessionContents::Handshake(handshake))
    {
        Ok(jar) => (jar, Redirect::to(&auth_url)).into_response(),
        Err(err) => {
            warn!(error = %err, "failed to seal handshake session");
            login_error_redirect(&app, jar, AuthError::from(err).failure_marker())
        }
    }
}

/// Complete the authorization-code flow.
///
/// The terminal outcome is always a redirect: to the front-end catalog on
/// success, back to login-start on a state mismatch, or to the front-end
/// login page with an error marker on everything else.
async fn callback(
    State(app): State<AppState>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Response {
    // Provider-reported errors short-circuit before any token work
    if let Some(error) = &params.error {
        warn!(
            error = %error,
            description = params.error_description.as_deref().unwrap_or(""),
            "provider rejected the authorization request"
        );
        return login_error_redirect(&app, jar, "oauth_error");
    }

    match complete_login(&app, &jar, &params).await {
        Ok(contents) => match app.sessions.store(jar.clone(), &contents) {
            Ok(jar) => {
                let target = frontend_url(&app.config.frontend_url, "/catalog");
                (jar, Redirect::to(&target)).into_response()
            }
            Err(err) => {
                warn!(error = %err, "failed to seal authenticated session");
                login_error_redirect(&app, jar, AuthError::from(err).failure_marker())
            }
        },
        // Routine, not terminal: double submits, stale bookmarked callback
        // URLs, or parallel login tabs. Restart the flow transparently.
        Err(AuthError::StateMismatch) => {
            info!("callback state mismatch, restarting login");
            let jar = app.sessions.clear(jar);
            (jar, Redirect::to("/auth/login")).into_response()
        }
        Err(err) => {
            warn!(error = %err, "login attempt failed");
            login_error_redirect(&app, jar, err.failure_marker())
        }
    }
}

/// Everything between the incoming callback query and the authenticated
/// session contents. Session mutations happen only after this returns, so
/// no failure can leave a half-written user behind.
async fn complete_login(
    app: &AppState,
    jar: &CookieJar,
    params: &CallbackParams,
) -> Result<SessionContents, AuthError> {
    // A callback is only meaningful mid-handshake. Anything else is a
    // stale or replayed URL.
    let session = app.sessions.load(jar);
    let Some(handshake) = session.handshake() else {
        return Err(AuthError::StateMismatch);
    };

    let callback_state = params.state.as_deref().ok_or(AuthError::StateMismatch)?;
    let code = params.code.as_deref().ok_or_else(|| {
        AuthError::Provider("authorization code missing from callback".to_string())
    })?;

    let exchange = app
        .provider
        .exchange_code(code, callback_state, handshake)
        .await?;

    let identity = app.provider.resolve_identity(&exchange).await?;
    if identity.subject.is_empty() {
        return Err(AuthError::NoUser);
    }

    // Membership lookups degrade to an empty role set, never abort login
    let roles = match &identity.email {
        Some(email) => groups::resolve_roles(app.groups.as_ref(), email).await,
        None => {
            warn!(subject = %identity.subject, "identity has no email, skipping role resolution");
            Vec::new()
        }
    };

    // The authenticated record is built from scratch; nothing from the
    // handshake phase carries over into it.
    let name = identity.display_name();
    let user = SessionUser {
        subject: identity.subject,
        name,
        email: identity.email,
        given_name: identity.given_name,
        family_name: identity.family_name,
        identities: identity.identities,
        roles,
    };

    Ok(SessionContents::Authenticated {
        user,
        token: exchange.tokens,
    })
}

/// Current user projection, 401 JSON when no session user exists.
async fn user_profile(MaybeUser(user): MaybeUser) -> Response {
    match user {
        Some(user) => Json(json!({
            "user": {
                "sub": user.subject,
                "name": user.name,
                "email": user.email,
                "given_name": user.given_name,
                "family_name": user.family_name,
                "roles": user.roles,
            },
        }))
        .into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Not authenticated" })),
        )
            .into_response(),
    }
}

/// Guarded profile endpoint returning the user and resolved roles.
async fn me(CurrentUser(user): CurrentUser) -> Json<Value> {
    let roles = user.roles.clone();
    Json(json!({
        "user": user,
        "roles": roles,
    }))
}

/// Destroy the session and hand back the provider's single-logout URL.
/// Global sign-out across other relying parties belongs to the provider.
async fn logout(State(app): State<AppState>, jar: CookieJar) -> Response {
    let jar = app.sessions.clear(jar);
    (
        jar,
        Json(json!({
            "message": "Logged out successfully",
            "logout_url": app.provider.logout_url(),
        })),
    )
        .into_response()
}

/// Guarded session check for front-end route guards.
async fn validate(CurrentUser(user): CurrentUser) -> Json<Value> {
    Json(json!({
        "valid": true,
        "user": {
            "email": user.email,
            "name": user.name,
            "roles": user.roles,
        },
    }))
}

/// Unguarded status query reporting authentication state.
async fn check(MaybeUser(user): MaybeUser) -> Json<Value> {
    match user {
        Some(user) => Json(json!({
            "authenticated": true,
            "user": {
                "email": user.email,
                "name": user.name,
                "roles": user.roles,
            },
        })),
        None => Json(json!({
            "authenticated": false,
            "user": null,
        })),
    }
}

/// Development-only view of the session phase. Never mounted unless the
/// debug flag is set in configuration.
async fn debug_session(State(app): State<AppState>, jar: CookieJar) -> Json<Value> {
    let contents = app.sessions.load(&jar);
    let phase = match &contents {
        SessionContents::Empty => "empty",
        SessionContents::Handshake(_) => "handshake",
        SessionContents::Authenticated { .. } => "authenticated",
    };

    Json(json!({
        "phase": phase,
        "cookie_present": app.sessions.cookie_present(&jar),
        "has_user": contents.user().is_some(),
        "has_token": contents.is_authenticated(),
    }))
}

/// Authentication routes, mounted under `/auth`.
pub fn router(debug_enabled: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/login", get(start_login))
        .route("/callback", get(callback))
        .route("/user", get(user_profile))
        .route("/me", get(me))
        .route("/logout", get(logout).post(logout))
        .route("/validate", get(validate))
        .route("/check", get(check));

    if debug_enabled {
        router.route("/debug/session", get(debug_session))
    } else {
        router
    }
}
