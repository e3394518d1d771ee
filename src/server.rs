//! # Server Configuration
//!
//! This module contains the server setup and configuration for the
//! Marketplace Connect API.

use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::crypto::{MasterKey, TokenCipher};
use crate::handlers;
use crate::marketplace::MarketplaceClient;
use crate::telemetry;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub cipher: TokenCipher,
    pub marketplace: MarketplaceClient,
}

impl AppState {
    /// Build the shared state from a loaded configuration and database pool
    pub fn new(config: Arc<AppConfig>, db: DatabaseConnection) -> anyhow::Result<Self> {
        let key_bytes = config
            .crypto_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("crypto key missing; configuration was not validated"))?;
        let cipher = TokenCipher::new(MasterKey::new(key_bytes)?);
        let marketplace = MarketplaceClient::new(config.marketplace.clone())?;

        Ok(Self {
            config,
            db,
            cipher,
            marketplace,
        })
    }

    /// State over a disconnected database, for middleware/handler tests
    #[cfg(test)]
    pub fn for_tests(config: Arc<AppConfig>) -> Self {
        Self::new(config, DatabaseConnection::default()).expect("test state builds")
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/health-check", get(handlers::health_check::health_check))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .merge(protected)
        .layer(middleware::from_fn(telemetry::trace_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// Starts the server with the given configuration
pub async fn run_server(
    config: AppConfig,
    db: DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;
    let profile = config.profile.clone();

    let state = AppState::new(Arc::new(config), db)?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Server listening on: {}", addr);
    println!("Running in profile: {}", profile);

    axum::serve(listener, app).await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::health_check::health_check,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::health_check::HealthCheckResponse,
            crate::error::ApiError,
        )
    ),
    info(
        title = "Marketplace Connect API",
        description = "Marketplace OAuth token lifecycle and connection health API",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
