//! # ontogate HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /values` - Property values for a fixed entity set
//! - `GET /entities` - Entities matching a filter set
//! - `GET /versions` - The version catalog
//! - `GET /prefixes` - The namespace prefix table
//! - `GET /health` - Health check
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `ONTOGATE_CORS_ORIGINS`: Comma-separated allowed origins, or "*"
//!   for all (default: localhost only)
//! - `ONTOGATE_RATE_LIMIT`: Requests per second (default: 100, 0 to
//!   disable)
//!
//! API keys and quotas are configured in `ontogate.toml` (`[keys]`).

mod auth;
mod handlers;
mod middleware;
mod types;

// Re-exports for external use and integration tests
#[allow(unused_imports)]
pub use auth::{ApiKeyRegistry, KeyError, QuotaSnapshot, spawn_maintenance};
#[allow(unused_imports)]
pub use handlers::{
    HealthResponse, VersionInfo, entities_handler, health_handler, prefixes_handler,
    values_handler, versions_handler,
};
#[allow(unused_imports)]
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
#[allow(unused_imports)]
pub use types::{
    CommonParams, EntityParams, ValueParams, build_entity_request, build_meta,
    build_value_request, parse_filter_expr, parse_property, parse_value_expr,
};

use crate::client::SparqlClient;
use crate::config::Config;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::get,
};
use ontogate_core::{ApiVersion, PrefixTable, Schema, VersionCatalog};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the immutable tables, the transport client, and
/// the optional key registry.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Namespace prefix table.
    pub prefixes: Arc<PrefixTable>,
    /// Datatype schema.
    pub schema: Arc<Schema>,
    /// Version catalog.
    pub catalog: Arc<VersionCatalog>,
    /// Important-properties map backing the `important` flag.
    pub important: Arc<BTreeMap<String, Vec<String>>>,
    /// SPARQL endpoint client.
    pub client: SparqlClient,
    /// Key registry; `None` when the key system is disabled.
    pub keys: Option<Arc<auth::ApiKeyRegistry>>,
}

impl AppState {
    /// Assemble the server state from loaded parts.
    #[must_use]
    pub fn new(
        config: Config,
        prefixes: PrefixTable,
        schema: Schema,
        catalog: VersionCatalog,
        important: BTreeMap<String, Vec<String>>,
        client: SparqlClient,
        keys: Option<Arc<auth::ApiKeyRegistry>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            prefixes: Arc::new(prefixes),
            schema: Arc::new(schema),
            catalog: Arc::new(catalog),
            important: Arc::new(important),
            client,
            keys,
        }
    }

    /// The latest catalog version string, for requests that omit one.
    #[must_use]
    pub fn latest_version(&self) -> String {
        self.catalog
            .latest()
            .map(ApiVersion::version_string)
            .unwrap_or_else(|| "0.0.0".to_string())
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from `ONTOGATE_CORS_ORIGINS`: `*` allows all,
/// a comma-separated list allows those, unset restricts to localhost.
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("ONTOGATE_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!("CORS: allowing ALL origins; do not use this in production");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if allowed.is_empty() {
                tracing::warn!("CORS: no valid origins configured, restricting to localhost");
                localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed)
                    .allow_methods([Method::GET, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => localhost_cors(),
    }
}

fn localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|o| o.parse().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate limiting - global request-per-second cap (if enabled)
///
/// Key checks run inside the request handlers (they need the per-key
/// quota bookkeeping, not a single shared secret).
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("rate limiting disabled");
        None
    };

    if state.keys.is_some() {
        tracing::info!("api key system enabled");
    } else {
        tracing::warn!("api key system DISABLED - all requests are served anonymously");
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/versions", get(handlers::versions_handler))
        .route("/prefixes", get(handlers::prefixes_handler))
        .route("/values", get(handlers::values_handler))
        .route("/entities", get(handlers::entities_handler));

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), std::io::Error> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("ontogate HTTP server listening on {}", addr);
    axum::serve(listener, router).await
}
