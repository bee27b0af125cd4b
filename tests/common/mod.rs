//! Shared test harness: an in-process server with a fake identity provider
//! and a fake group directory, plus cookie plumbing helpers.

// Each test binary compiles this module separately and uses a subset of it.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use offering_catalog::auth::{
    AuthError, GroupDirectory, GroupLookupError, Identity, IdentityProvider, TokenExchange,
};
use offering_catalog::catalog::CatalogRepository;
use offering_catalog::config::{
    Config, DatabaseConfig, GroupsConfig, OidcConfig, ServerConfig, SessionConfig,
};
use offering_catalog::database::Database;
use offering_catalog::session::{
    HandshakeState, SessionContents, SessionStore, SessionUser, TokenSet,
};
use offering_catalog::{AppState, start_server_with_state};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::oneshot;

/// Front-end origin used in redirect assertions.
pub const FRONTEND_URL: &str = "http://frontend.test";

const TEST_SECRET: &str = "test-secret-test-secret-test-secret!";

/// Configuration for a test server on an ephemeral port.
///
/// The database URL comes from `DATABASE_URL` when set; otherwise the pool
/// is lazy and never connects, which is fine for auth-only tests.
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        session: SessionConfig {
            secret: TEST_SECRET.to_string(),
            cookie_name: "session".to_string(),
            max_age_secs: 3600,
            secure: false,
        },
        oidc: OidcConfig {
            client_id: "catalog-test".to_string(),
            client_secret: "catalog-test-secret".to_string(),
            issuer_url: "https://login.test/oidc".to_string(),
            redirect_uri: "http://127.0.0.1/auth/callback".to_string(),
            logout_url: Some("https://login.test/logout".to_string()),
            scopes: vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
        },
        groups: GroupsConfig {
            directory_url: "http://directory.test".to_string(),
            timeout_secs: 2,
        },
        database: DatabaseConfig {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://postgres@127.0.0.1/catalog_test".to_string()),
            max_connections: 5,
            acquire_timeout_secs: 2,
        },
        frontend_url: FRONTEND_URL.to_string(),
        debug: false,
    }
}

/// What the fake provider does when the flow exchanges the code.
#[derive(Clone, Copy)]
pub enum ExchangeBehavior {
    Succeed,
    RejectGrant,
    NetworkFailure,
}

/// What the fake provider resolves the identity to.
#[derive(Clone)]
pub enum IdentityBehavior {
    Resolve(Identity),
    Unavailable,
    EmptySubject,
}

pub fn sample_identity() -> Identity {
    Identity {
        subject: "auth0|u-100".to_string(),
        name: Some("Ada Lovelace".to_string()),
        given_name: Some("Ada".to_string()),
        family_name: Some("Lovelace".to_string()),
        email: Some("ada@example.com".to_string()),
        identities: None,
    }
}

/// Scripted identity provider. Every login start yields fresh handshake
/// artifacts; the exchange validates the callback state against the
/// handshake exactly like the real client.
pub struct FakeProvider {
    exchange: ExchangeBehavior,
    identity: IdentityBehavior,
    login_counter: AtomicUsize,
    exchange_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new(exchange: ExchangeBehavior, identity: IdentityBehavior) -> Self {
        Self {
            exchange,
            identity,
            login_counter: AtomicUsize::new(0),
            exchange_calls: AtomicUsize::new(0),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(
            ExchangeBehavior::Succeed,
            IdentityBehavior::Resolve(sample_identity()),
        )
    }

    /// Number of code exchanges attempted against the provider.
    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn begin_login(&self) -> (String, HandshakeState) {
        let n = self.login_counter.fetch_add(1, Ordering::SeqCst);
        let state = format!("state-{n}");
        let handshake = HandshakeState {
            state: state.clone(),
            nonce: format!("nonce-{n}"),
            pkce_verifier: format!("pkce-{n}"),
        };
        (
            format!("https://login.test/authorize?state={state}"),
            handshake,
        )
    }

    async fn exchange_code(
        &self,
        _code: &str,
        state: &str,
        handshake: &HandshakeState,
    ) -> Result<TokenExchange, AuthError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);

        if state != handshake.state {
            return Err(AuthError::StateMismatch);
        }

        match self.exchange {
            ExchangeBehavior::Succeed => Ok(TokenExchange {
                tokens: TokenSet {
                    access_token: "fake-access-token".to_string(),
                    token_type: "Bearer".to_string(),
                    expires_at: Some(4_102_444_800),
                },
                claims: None,
            }),
            ExchangeBehavior::RejectGrant => {
                Err(AuthError::Provider("invalid_grant".to_string()))
            }
            ExchangeBehavior::NetworkFailure => {
                Err(AuthError::Http("connection reset by peer".to_string()))
            }
        }
    }

    async fn resolve_identity(&self, _exchange: &TokenExchange) -> Result<Identity, AuthError> {
        match &self.identity {
            IdentityBehavior::Resolve(identity) => Ok(identity.clone()),
            IdentityBehavior::Unavailable => Err(AuthError::IdentityUnavailable),
            IdentityBehavior::EmptySubject => Ok(Identity {
                subject: String::new(),
                ..sample_identity()
            }),
        }
    }

    fn logout_url(&self) -> Option<String> {
        Some("https://login.test/logout".to_string())
    }
}

/// In-memory group directory with per-group scripted failures.
#[derive(Default)]
pub struct FakeDirectory {
    memberships: HashSet<(String, String)>,
    failing_groups: HashSet<String>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, email: &str, group: &str) -> Self {
        self.memberships
            .insert((email.to_string(), group.to_string()));
        self
    }

    pub fn failing(mut self, group: &str) -> Self {
        self.failing_groups.insert(group.to_string());
        self
    }
}

#[async_trait]
impl GroupDirectory for FakeDirectory {
    async fn is_member(&self, email: &str, group: &str) -> Result<bool, GroupLookupError> {
        if self.failing_groups.contains(group) {
            return Err(GroupLookupError::Status(503));
        }
        Ok(self
            .memberships
            .contains(&(email.to_string(), group.to_string())))
    }
}

/// Running server plus the handles tests need: the bound port, the session
/// store for sealing and opening cookies, and the provider for call counts.
pub struct TestApp {
    pub port: u16,
    pub sessions: Arc<SessionStore>,
    pub provider: Arc<FakeProvider>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

pub async fn spawn_app(provider: FakeProvider, groups: FakeDirectory) -> anyhow::Result<TestApp> {
    spawn_app_with(provider, groups, test_config()).await
}

pub async fn spawn_app_with(
    provider: FakeProvider,
    groups: FakeDirectory,
    config: Config,
) -> anyhow::Result<TestApp> {
    let sessions = Arc::new(SessionStore::new(&config.session)?);
    let provider = Arc::new(provider);

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .connect_lazy(&config.database.url)?;
    let db = Database::from_pool(pool.clone());
    let catalog = CatalogRepository::new(pool);

    let state = AppState {
        config: Arc::new(config),
        sessions: sessions.clone(),
        provider: provider.clone(),
        groups: Arc::new(groups),
        db,
        catalog,
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let port = start_server_with_state(state, shutdown_rx).await?;

    Ok(TestApp {
        port,
        sessions,
        provider,
        shutdown_tx: Some(shutdown_tx),
    })
}

/// HTTP client that surfaces redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(5))
        .build()
        .expect("failed to build test client")
}

/// Session cookie value from a response's Set-Cookie headers, if any.
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .find_map(|raw| {
            raw.strip_prefix("session=")
                .map(|rest| rest.split(';').next().unwrap_or("").to_string())
        })
}

/// Whether the response instructs the browser to delete the session cookie.
pub fn session_cookie_cleared(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .any(|raw| {
            let Some(rest) = raw.strip_prefix("session=") else {
                return false;
            };
            rest.split(';').next().unwrap_or("").is_empty() && raw.contains("Max-Age=0")
        })
}

pub fn sample_session_user(roles: Vec<offering_catalog::auth::Role>) -> SessionUser {
    SessionUser {
        subject: "auth0|u-100".to_string(),
        name: "Ada Lovelace".to_string(),
        email: Some("ada@example.com".to_string()),
        given_name: Some("Ada".to_string()),
        family_name: Some("Lovelace".to_string()),
        identities: None,
        roles,
    }
}

/// Seal a ready-made authenticated session, bypassing the login flow.
pub fn authenticated_cookie(
    sessions: &SessionStore,
    roles: Vec<offering_catalog::auth::Role>,
) -> String {
    let contents = SessionContents::Authenticated {
        user: sample_session_user(roles),
        token: TokenSet {
            access_token: "fake-access-token".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: Some(4_102_444_800),
        },
    };
    sessions.seal(&contents).expect("seal session contents")
}
