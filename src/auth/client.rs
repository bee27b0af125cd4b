// OIDC Client
// One fixed identity provider, discovered at startup and handed to the auth
// flow as a trait object so tests can substitute a fake.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use openidconnect::core::{
    CoreAuthenticationFlow, CoreClient, CoreProviderMetadata, CoreUserInfoClaims,
};
use openidconnect::{
    AccessToken, AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce,
    OAuth2TokenResponse, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RequestTokenError,
    Scope, TokenResponse,
};
use serde_json::Value;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use super::error::AuthError;
use crate::config::OidcConfig;
use crate::session::{HandshakeState, TokenSet};

/// Identity claims resolved for a logged-in user.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub subject: String,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub email: Option<String>,
    /// Provider-opaque identities claim, carried through untouched.
    pub identities: Option<Value>,
}

impl Identity {
    /// Display name: `name` when present, otherwise given + family names.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name
            && !name.is_empty()
        {
            return name.clone();
        }
        let given = self.given_name.as_deref().unwrap_or("");
        let family = self.family_name.as_deref().unwrap_or("");
        format!("{given} {family}").trim().to_string()
    }
}

/// Result of a successful code exchange.
pub struct TokenExchange {
    pub tokens: TokenSet,
    /// Identity from locally verified ID-token claims, when the provider
    /// issued an ID token and verification succeeded.
    pub claims: Option<Identity>,
}

/// Operations the auth flow needs from the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Build the authorization URL and the handshake artifacts to persist.
    fn begin_login(&self) -> (String, HandshakeState);

    /// Validate the callback `state` against the handshake, then exchange
    /// the authorization code for tokens.
    async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        handshake: &HandshakeState,
    ) -> Result<TokenExchange, AuthError>;

    /// Resolve the identity: verified ID-token claims first, the userinfo
    /// endpoint as fallback.
    async fn resolve_identity(&self, exchange: &TokenExchange) -> Result<Identity, AuthError>;

    /// Provider single-logout URL, when configured.
    fn logout_url(&self) -> Option<String>;
}

/// openidconnect-backed provider client.
pub struct OidcProvider {
    provider_metadata: CoreProviderMetadata,
    client_id: ClientId,
    client_secret: ClientSecret,
    redirect_url: RedirectUrl,
    scopes: Vec<String>,
    logout_url: Option<String>,
    http_client: reqwest::Client,
}

impl OidcProvider {
    /// Discover the provider metadata and build the client. Runs once at
    /// startup; an unreachable provider fails startup rather than requests.
    pub async fn discover(config: &OidcConfig) -> Result<Self, AuthError> {
        let issuer_url = IssuerUrl::new(config.issuer_url.clone())
            .map_err(|e| AuthError::Configuration(format!("invalid issuer URL: {e}")))?;

        // Redirects must not be followed on OAuth endpoints
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AuthError::Configuration(format!("failed to build HTTP client: {e}")))?;

        let provider_metadata = CoreProviderMetadata::discover_async(issuer_url, &http_client)
            .await
            .map_err(|e| AuthError::Discovery(e.to_string()))?;

        Self::from_parts(provider_metadata, config, http_client)
    }

    /// Build from already-fetched metadata.
    pub fn from_parts(
        provider_metadata: CoreProviderMetadata,
        config: &OidcConfig,
        http_client: reqwest::Client,
    ) -> Result<Self, AuthError> {
        let redirect_url = RedirectUrl::new(config.redirect_uri.clone())
            .map_err(|e| AuthError::Configuration(format!("invalid redirect URI: {e}")))?;

        Ok(Self {
            provider_metadata,
            client_id: ClientId::new(config.client_id.clone()),
            client_secret: ClientSecret::new(config.client_secret.clone()),
            redirect_url,
            scopes: config.scopes.clone(),
            logout_url: config.logout_url.clone(),
            http_client,
        })
    }
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    fn begin_login(&self) -> (String, HandshakeState) {
        let client = CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(self.redirect_url.clone());

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = client
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                CsrfToken::new_random,
                Nonce::new_random,
            )
            .set_pkce_challenge(pkce_challenge);

        // "openid" is added by the library itself
        for scope in self.scopes.iter().filter(|s| s.as_str() != "openid") {
            request = request.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, csrf_token, nonce) = request.url();

        let handshake = HandshakeState {
            state: csrf_token.secret().clone(),
            nonce: nonce.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
        };

        (auth_url.to_string(), handshake)
    }

    async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        handshake: &HandshakeState,
    ) -> Result<TokenExchange, AuthError> {
        // Constant-time comparison against the session-held state
        let state_matches: bool = state.as_bytes().ct_eq(handshake.state.as_bytes()).into();
        if !state_matches {
            return Err(AuthError::StateMismatch);
        }

        let client = CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(self.redirect_url.clone());

        let token_response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .map_err(|e| AuthError::Configuration(format!("token endpoint unavailable: {e}")))?
            .set_pkce_verifier(PkceCodeVerifier::new(handshake.pkce_verifier.clone()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(response) => {
                    AuthError::Provider(response.to_string())
                }
                other => AuthError::Http(other.to_string()),
            })?;

        let token_type = serde_json::to_value(token_response.token_type())
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| "bearer".to_owned());

        let tokens = TokenSet {
            access_token: token_response.access_token().secret().clone(),
            token_type,
            expires_at: token_response
                .expires_in()
                .map(|lifetime| Utc::now().timestamp() + lifetime.as_secs() as i64),
        };

        let claims = match token_response.id_token() {
            Some(id_token) => {
                let nonce = Nonce::new(handshake.nonce.clone());
                match id_token.claims(&client.id_token_verifier(), &nonce) {
                    Ok(claims) => {
                        let identities = opaque_identities(&token_response);
                        Some(Identity {
                            subject: claims.subject().to_string(),
                            name: claims
                                .name()
                                .and_then(|n| n.get(None))
                                .map(|n| n.as_str().to_string()),
                            given_name: claims
                                .given_name()
                                .and_then(|n| n.get(None))
                                .map(|n| n.as_str().to_string()),
                            family_name: claims
                                .family_name()
                                .and_then(|n| n.get(None))
                                .map(|n| n.as_str().to_string()),
                            email: claims.email().map(|e| e.as_str().to_string()),
                            identities,
                        })
                    }
                    Err(err) => {
                        warn!(error = %err, "ID token verification failed, deferring to userinfo");
                        None
                    }
                }
            }
            None => None,
        };

        Ok(TokenExchange { tokens, claims })
    }

    async fn resolve_identity(&self, exchange: &TokenExchange) -> Result<Identity, AuthError> {
        if let Some(identity) = &exchange.claims {
            return Ok(identity.clone());
        }

        debug!("no verified ID token claims, falling back to userinfo");

        let client = CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        );

        let userinfo: CoreUserInfoClaims = client
            .user_info(
                AccessToken::new(exchange.tokens.access_token.clone()),
                None,
            )
            .map_err(|err| {
                warn!(error = %err, "userinfo endpoint not available");
                AuthError::IdentityUnavailable
            })?
            .request_async(&self.http_client)
            .await
            .map_err(|err| {
                warn!(error = %err, "userinfo request failed");
                AuthError::IdentityUnavailable
            })?;

        Ok(Identity {
            subject: userinfo.subject().to_string(),
            name: userinfo
                .name()
                .and_then(|n| n.get(None))
                .map(|n| n.as_str().to_string()),
            given_name: userinfo
                .given_name()
                .and_then(|n| n.get(None))
                .map(|n| n.as_str().to_string()),
            family_name: userinfo
                .family_name()
                .and_then(|n| n.get(None))
                .map(|n| n.as_str().to_string()),
            email: userinfo.email().map(|e| e.as_str().to_string()),
            identities: None,
        })
    }

    fn logout_url(&self) -> Option<String> {
        self.logout_url.clone()
    }
}

/// Pull the provider-opaque `identities` claim out of the raw ID token; the
/// typed claim set does not carry custom claims.
fn opaque_identities<TR: serde::Serialize>(token_response: &TR) -> Option<Value> {
    let response_json = serde_json::to_value(token_response).ok()?;
    let id_token = response_json.get("id_token")?.as_str()?;

    // JWT is base64url(header).base64url(payload).signature
    let payload_b64 = id_token.split('.').nth(1)?;
    let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let payload: Value = serde_json::from_slice(&payload).ok()?;

    payload.get("identities").cloned()
}
