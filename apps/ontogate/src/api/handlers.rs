//! # API Endpoint Handlers
//!
//! The request pipeline per endpoint: decode parameters, check the API
//! key, migrate to the latest schema version, compile, window, execute
//! against the endpoint, and render the result.
//!
//! Client-input errors (bad filters, unknown prefixes/versions,
//! incompatible versions, bad keys) surface with distinct messages;
//! compilation and transport failures are logged with the full request
//! context and surfaced generically.

use super::{
    AppState,
    auth::KeyError,
    types::{EntityParams, ValueParams, build_entity_request, build_value_request},
};
use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use ontogate_core::{Migrator, OntoError, Request, compile, render};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;

// =============================================================================
// HEALTH & INTROSPECTION
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server answers.
    pub status: String,
    /// Crate version.
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// One catalog entry in the `/versions` listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    /// `"major.minor.patch"`.
    pub version: String,
    /// Number of resource rewrites into this version.
    pub resource_replacements: usize,
    /// Number of prefix rewrites into this version.
    pub prefix_replacements: usize,
}

/// List the version catalog, ascending.
pub async fn versions_handler(State(state): State<AppState>) -> impl IntoResponse {
    let versions: Vec<VersionInfo> = state
        .catalog
        .as_slice()
        .iter()
        .map(|v| VersionInfo {
            version: v.version_string(),
            resource_replacements: v.resource_replacements.len(),
            prefix_replacements: v.prefix_replacements.len(),
        })
        .collect();
    Json(versions)
}

/// List the namespace prefix table.
pub async fn prefixes_handler(State(state): State<AppState>) -> impl IntoResponse {
    let map: serde_json::Map<String, serde_json::Value> = state
        .prefixes
        .iter()
        .map(|(prefix, uri)| (prefix.to_string(), json!(uri)))
        .collect();
    Json(serde_json::Value::Object(map))
}

// =============================================================================
// REQUEST ENDPOINTS
// =============================================================================

/// `GET /values` — property values for a fixed entity set.
pub async fn values_handler(
    State(state): State<AppState>,
    Query(params): Query<ValueParams>,
) -> Response {
    match build_value_request(&params, &state.latest_version()) {
        Ok(request) => dispatch(&state, request).await,
        Err(e) => client_error(&e),
    }
}

/// `GET /entities` — entities matching a filter set.
pub async fn entities_handler(
    State(state): State<AppState>,
    Query(params): Query<EntityParams>,
) -> Response {
    match build_entity_request(&params, &state.latest_version(), &state.important) {
        Ok(request) => dispatch(&state, request).await,
        Err(e) => client_error(&e),
    }
}

// =============================================================================
// PIPELINE
// =============================================================================

async fn dispatch(state: &AppState, request: Request) -> Response {
    let started = Instant::now();
    let response = run_pipeline(state, &request).await;
    let meta = request.meta();
    tracing::info!(
        key = meta.key.as_deref().unwrap_or("-"),
        version = %meta.version,
        format = ?meta.format,
        style = ?meta.style,
        offset = meta.window.offset,
        limit = meta.window.limit,
        status = response.status().as_u16(),
        duration_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    response
}

async fn run_pipeline(state: &AppState, request: &Request) -> Response {
    let meta = request.meta();

    if let Some(registry) = &state.keys {
        let Some(key) = meta.key.as_deref() else {
            return key_error(&KeyError::UnknownKey);
        };
        match registry.check_and_consume(key) {
            Ok(quota) => tracing::debug!(
                day = quota.day,
                hour = quota.hour,
                minute = quota.minute,
                "quota remaining"
            ),
            Err(e) => return key_error(&e),
        }
    }

    let migrator = Migrator::new(&state.catalog, &state.prefixes);
    let migrated = match migrator.migrate(request) {
        Ok(migrated) => migrated,
        Err(e) => return error_response(state, request, e),
    };

    let compiled = match compile(&migrated, &state.schema, &state.prefixes) {
        Ok(compiled) => compiled,
        Err(e) => return error_response(state, request, e),
    };

    let window = migrated.meta().window.capped(state.config.window.max_limit);
    let query_text = compiled.windowed_text(&window);

    let table = match state.client.execute(&query_text).await {
        Ok(table) => table,
        Err(e) => return error_response(state, request, e),
    };

    let meta = migrated.meta();
    match render(&table, meta.format, meta.style, &state.prefixes) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, meta.format.content_type())],
            body,
        )
            .into_response(),
        Err(e) => error_response(state, request, e),
    }
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// Client-input errors: distinct message, 400.
fn client_error(error: &OntoError) -> Response {
    let body = match error {
        OntoError::IncompatibleVersion { .. } => format!(
            "{error}. The result could be incorrect. \
             Use oldVersion=true if you want to access an incompatible version."
        ),
        _ => error.to_string(),
    };
    (StatusCode::BAD_REQUEST, body).into_response()
}

fn key_error(error: &KeyError) -> Response {
    let status = match error {
        KeyError::UnknownKey => StatusCode::UNAUTHORIZED,
        KeyError::LimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
    };
    (status, error.to_string()).into_response()
}

/// Map a pipeline error: client errors keep their message, downstream
/// errors are logged with the request context and surfaced generically.
fn error_response(state: &AppState, request: &Request, error: OntoError) -> Response {
    if error.is_client_error() {
        return client_error(&error);
    }
    match &error {
        OntoError::TransportFailure(_) => {
            tracing::error!(?request, endpoint = state.client.endpoint(), %error, "query execution failed");
            (StatusCode::BAD_GATEWAY, "query execution failed").into_response()
        }
        _ => {
            tracing::error!(?request, %error, "cannot process request");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}
