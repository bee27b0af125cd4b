use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{FromRef, State};
use axum::http::{HeaderValue, Method, header};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

pub mod auth;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod session;

use auth::{GroupDirectory, HttpGroupDirectory, IdentityProvider, OidcProvider};
use catalog::CatalogRepository;
use config::Config;
use database::Database;
use session::SessionStore;

/// Shared application state handed to every handler.
///
/// The identity provider and group directory sit behind trait objects so
/// tests can swap in fakes without any network.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionStore>,
    pub provider: Arc<dyn IdentityProvider>,
    pub groups: Arc<dyn GroupDirectory>,
    pub db: Database,
    pub catalog: CatalogRepository,
}

impl AppState {
    /// Build the production state: connect and migrate the database, run
    /// OIDC discovery, and wire up the group directory client.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let db = database::init_database(&config.database, true).await?;
        let catalog = CatalogRepository::new(db.pool().clone());

        let sessions = Arc::new(SessionStore::new(&config.session)?);

        let provider: Arc<dyn IdentityProvider> = Arc::new(
            OidcProvider::discover(&config.oidc)
                .await
                .context("OIDC discovery failed")?,
        );

        let groups: Arc<dyn GroupDirectory> = Arc::new(HttpGroupDirectory::new(&config.groups)?);

        Ok(Self {
            config: Arc::new(config),
            sessions,
            provider,
            groups,
            db,
            catalog,
        })
    }
}

impl FromRef<AppState> for Arc<SessionStore> {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

/// Version block reported by `/health`, captured at compile time.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BuildVersion {
    pub cargo: String,
    pub git_commit: String,
    pub git_commit_timestamp: String,
    pub build_timestamp: String,
}

impl BuildVersion {
    pub fn current() -> Self {
        Self {
            cargo: env!("CARGO_PKG_VERSION").to_string(),
            git_commit: option_env!("VERGEN_GIT_SHA").unwrap_or("unknown").to_string(),
            git_commit_timestamp: option_env!("VERGEN_GIT_COMMIT_TIMESTAMP")
                .unwrap_or("unknown")
                .to_string(),
            build_timestamp: option_env!("VERGEN_BUILD_TIMESTAMP")
                .unwrap_or("unknown")
                .to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: BuildVersion,
    pub database: String,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Solution Offering Catalog API",
        description = "Catalog of solution offerings with OIDC-gated access",
    ),
    paths(
        health,
        catalog::routes::list_brands,
        catalog::routes::list_countries,
        catalog::routes::list_products,
        catalog::routes::list_offerings,
        catalog::routes::search_offerings,
        catalog::routes::get_offering,
        catalog::routes::list_activities,
        catalog::routes::get_activity,
        catalog::routes::get_staffing_details,
        catalog::routes::get_pricing_details,
        catalog::routes::get_total_hours_and_prices,
        catalog::routes::create_wbs,
        catalog::routes::list_wbs,
        catalog::routes::get_wbs,
        catalog::routes::update_wbs,
        catalog::routes::delete_wbs,
        catalog::routes::link_wbs,
        catalog::routes::unlink_wbs,
        catalog::routes::list_wbs_for_activity,
    ),
    components(schemas(
        HealthResponse,
        BuildVersion,
        catalog::Brand,
        catalog::Country,
        catalog::Product,
        catalog::Offering,
        catalog::Activity,
        catalog::StaffingDetail,
        catalog::PricingDetail,
        catalog::PricingBreakdownLine,
        catalog::TotalHoursAndPrices,
        catalog::Wbs,
        catalog::WbsCreate,
        catalog::WbsUpdate,
    )),
    tags(
        (name = "catalog", description = "Brand, product and offering catalog"),
        (name = "wbs", description = "WBS entries and activity associations"),
        (name = "observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

async fn root_banner() -> Json<Value> {
    Json(json!({
        "message": "Solution Offering API",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/openapi.json",
    }))
}

#[utoipa::path(
    get,
    path = "/health",
    tags = ["observability"],
    responses((status = 200, description = "Service health report", body = HealthResponse))
)]
pub async fn health(State(app): State<AppState>) -> Json<HealthResponse> {
    let database = match app.db.health_check().await {
        Ok(()) => "connected".to_string(),
        Err(err) => {
            error!(error = %err, "database unreachable during health check");
            "unavailable".to_string()
        }
    };

    let status = if database == "connected" {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        timestamp: Utc::now(),
        version: BuildVersion::current(),
        database,
    })
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Assemble the full application router.
///
/// Auth routes live under `/auth`; catalog resources sit at the root. CORS
/// is pinned to the configured front-end origin because the session cookie
/// rides on credentialed requests.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let origin = HeaderValue::from_str(&state.config.frontend_url)
        .context("frontend_url is not a valid CORS origin")?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let router = Router::new()
        .route("/", get(root_banner))
        .route("/health", get(health))
        .route("/openapi.json", get(openapi_spec))
        .nest("/auth", auth::routes::router(state.config.debug))
        .merge(catalog::routes::router())
        .layer(cors)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .with_state(state);

    Ok(router)
}

/// Start the server from configuration and return the bound port.
pub async fn start_server_with_config(
    config: Config,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<u16> {
    let state = AppState::from_config(config).await?;
    start_server_with_state(state, shutdown_rx).await
}

/// Start the server with pre-built state and return the bound port.
///
/// The server runs on a background task; dropping the shutdown sender or
/// sending on it stops accepting connections and drains in-flight requests.
pub async fn start_server_with_state(
    state: AppState,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<u16> {
    let addr = state.config.server.socket_addr()?;
    let app = build_router(state)?;

    let handle = axum_server::Handle::new();

    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        let _ = shutdown_rx.await;
        shutdown_handle.graceful_shutdown(Some(Duration::from_secs(5)));
    });

    let server = axum_server::Server::bind(addr)
        .handle(handle.clone())
        .serve(app.into_make_service());
    tokio::spawn(async move {
        if let Err(err) = server.await {
            error!(error = %err, "server exited with error");
        }
    });

    let bound = handle
        .listening()
        .await
        .ok_or_else(|| anyhow::anyhow!("server failed to bind {addr}"))?;

    info!(addr = %bound, "listening");
    Ok(bound.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_version_is_populated() {
        let version = BuildVersion::current();
        assert_eq!(version.cargo, env!("CARGO_PKG_VERSION"));
        assert!(!version.git_commit.is_empty());
        assert!(!version.build_timestamp.is_empty());
    }

    #[tokio::test]
    async fn test_root_banner_shape() {
        let Json(body) = root_banner().await;
        assert_eq!(body["message"], "Solution Offering API");
        assert_eq!(body["docs"], "/openapi.json");
        assert!(body["version"].is_string());
    }

    #[test]
    fn test_openapi_document_lists_catalog_paths() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        assert!(paths.contains_key("/brands"));
        assert!(paths.contains_key("/offerings/search/"));
        assert!(paths.contains_key("/offerings/{offering_id}"));
        assert!(paths.contains_key("/totalHoursAndPrices/{offering_id}"));
        assert!(paths.contains_key("/wbs/activity/{activity_id}/wbs/{wbs_id}"));
        assert!(paths.contains_key("/health"));
    }
}
