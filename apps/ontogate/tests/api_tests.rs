//! Integration tests for the ontogate HTTP API.
//!
//! Uses axum-test to exercise the handlers without a real server. The
//! SPARQL endpoint is never reachable in tests; happy paths are served
//! from the client's query-text cache, and unreachable-endpoint paths
//! verify the transport-failure mapping.

#![allow(clippy::unwrap_used, clippy::panic)]

use ontogate::api::{
    ApiKeyRegistry, AppState, EntityParams, build_entity_request, create_router,
};
use ontogate::client::SparqlClient;
use ontogate::config::{Config, KeysConfig};
use axum_test::TestServer;
use ontogate_core::{ApiVersion, PrefixTable, Resource, Schema, VersionCatalog, compile};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// FIXTURES
// =============================================================================

const RESULT_BODY: &str = r#"{
    "head": {"vars": ["entities"]},
    "results": {"bindings": [
        {"entities": {"type": "uri", "value": "http://dbpedia.org/resource/Albert_Einstein"}}
    ]}
}"#;

fn prefix_table() -> PrefixTable {
    let mut map = BTreeMap::new();
    map.insert("dbr".to_string(), "http://dbpedia.org/resource/".to_string());
    map.insert("dbo".to_string(), "http://dbpedia.org/ontology/".to_string());
    map.insert("dbp".to_string(), "http://dbpedia.org/property/".to_string());
    map.insert(
        "rdf".to_string(),
        "http://www.w3.org/1999/02/22-rdf-syntax-ns#".to_string(),
    );
    map.insert(
        "rdfs".to_string(),
        "http://www.w3.org/2000/01/rdf-schema#".to_string(),
    );
    PrefixTable::new(map)
}

fn catalog() -> VersionCatalog {
    let mut replacements = BTreeMap::new();
    replacements.insert(
        Resource::new("dbo", "numOfEmployees"),
        Resource::new("dbo", "numberOfEmployees"),
    );
    VersionCatalog::from_versions(vec![
        ApiVersion::new(1, 0, 0, BTreeMap::new(), BTreeMap::new()),
        ApiVersion::new(2, 0, 0, replacements, BTreeMap::new()),
    ])
}

fn keys_config() -> KeysConfig {
    KeysConfig {
        enabled: true,
        quota_day: 100,
        quota_hour: 100,
        quota_minute: 2,
        reload_secs: 600,
    }
}

fn build_state(with_keys: bool) -> AppState {
    let keys = with_keys.then(|| {
        Arc::new(ApiKeyRegistry::new(
            vec!["alpha".to_string(), "root_ADMIN".to_string()],
            &keys_config(),
        ))
    });
    AppState::new(
        Config::default(),
        prefix_table(),
        Schema::empty(),
        catalog(),
        BTreeMap::new(),
        SparqlClient::new("http://127.0.0.1:1/sparql"),
        keys,
    )
}

fn server(state: AppState) -> TestServer {
    TestServer::new(create_router(state)).unwrap()
}

/// Prime the client cache with the exact text the handler will compile
/// for the given entity parameters.
async fn prime_for(state: &AppState, params: &EntityParams) {
    let request = build_entity_request(params, &state.latest_version(), &state.important).unwrap();
    let compiled = compile(&request, &state.schema, &state.prefixes).unwrap();
    let text = compiled.windowed_text(&request.meta().window);
    state.client.prime(text, RESULT_BODY).await;
}

fn class_only_params() -> EntityParams {
    EntityParams {
        class: Some("Person".to_string()),
        ..EntityParams::default()
    }
}

// =============================================================================
// HEALTH & INTROSPECTION
// =============================================================================

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let server = server(build_state(false));
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert!(!body["version"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn versions_endpoint_lists_catalog_ascending() {
    let server = server(build_state(false));
    let response = server.get("/versions").await;
    response.assert_status_ok();
    let body: Value = response.json();
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["version"], "1.0.0");
    assert_eq!(list[1]["version"], "2.0.0");
    assert_eq!(list[1]["resource_replacements"], 1);
}

#[tokio::test]
async fn prefixes_endpoint_lists_table() {
    let server = server(build_state(false));
    let response = server.get("/prefixes").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["dbo"], "http://dbpedia.org/ontology/");
}

// =============================================================================
// PARAMETER DECODING FAILURES
// =============================================================================

#[tokio::test]
async fn entities_endpoint_requires_a_filter_or_class() {
    let server = server(build_state(false));
    let response = server.get("/entities").await;
    response.assert_status_bad_request();
    assert!(response.text().contains("filter or a class name"));
}

#[tokio::test]
async fn unknown_operator_token_is_rejected() {
    let server = server(build_state(false));
    let response = server
        .get("/entities")
        .add_query_param("filter", "dbo:birthDate,between,1980")
        .await;
    response.assert_status_bad_request();
    assert!(response.text().contains("filter operator"));
}

#[tokio::test]
async fn malformed_property_token_is_rejected() {
    let server = server(build_state(false));
    let response = server
        .get("/values")
        .add_query_param("entities", "Albert_Einstein")
        .add_query_param("property", "birthDate")
        .await;
    response.assert_status_bad_request();
    assert!(response.text().contains("prefix:name"));
}

#[tokio::test]
async fn unknown_prefix_is_a_distinct_client_error() {
    let server = server(build_state(false));
    let response = server
        .get("/entities")
        .add_query_param("filter", "nope:thing")
        .await;
    response.assert_status_bad_request();
    assert!(response.text().contains("prefix 'nope' not found"));
}

// =============================================================================
// VERSIONING FAILURES
// =============================================================================

#[tokio::test]
async fn unknown_version_is_rejected() {
    let server = server(build_state(false));
    let response = server
        .get("/entities")
        .add_query_param("class", "Person")
        .add_query_param("version", "9.9.9")
        .await;
    response.assert_status_bad_request();
    assert!(response.text().contains("version '9.9.9' not found"));
}

#[tokio::test]
async fn incompatible_version_hints_at_the_override() {
    let server = server(build_state(false));
    let response = server
        .get("/entities")
        .add_query_param("class", "Person")
        .add_query_param("version", "1.0.0")
        .await;
    response.assert_status_bad_request();
    let text = response.text();
    assert!(text.contains("not compatible"));
    assert!(text.contains("oldVersion=true"));
}

// =============================================================================
// KEY SYSTEM
// =============================================================================

#[tokio::test]
async fn missing_or_unknown_key_is_unauthorized() {
    let server = server(build_state(true));
    let response = server
        .get("/entities")
        .add_query_param("class", "Person")
        .await;
    response.assert_status_unauthorized();

    let response = server
        .get("/entities")
        .add_query_param("class", "Person")
        .add_query_param("key", "wrong")
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn exhausted_quota_returns_too_many_requests() {
    let state = build_state(true);
    prime_for(&state, &class_only_params()).await;
    let server = server(state);

    for _ in 0..2 {
        let response = server
            .get("/entities")
            .add_query_param("class", "Person")
            .add_query_param("key", "alpha")
            .await;
        response.assert_status_ok();
    }
    let response = server
        .get("/entities")
        .add_query_param("class", "Person")
        .add_query_param("key", "alpha")
        .await;
    assert_eq!(response.status_code(), 429);
    assert!(response.text().contains("per minute"));
}

#[tokio::test]
async fn admin_keys_are_quota_exempt() {
    let state = build_state(true);
    prime_for(&state, &class_only_params()).await;
    let server = server(state);

    for _ in 0..5 {
        let response = server
            .get("/entities")
            .add_query_param("class", "Person")
            .add_query_param("key", "root_ADMIN")
            .await;
        response.assert_status_ok();
    }
}

// =============================================================================
// PIPELINE
// =============================================================================

#[tokio::test]
async fn entity_request_round_trips_from_cache() {
    let state = build_state(false);
    prime_for(&state, &class_only_params()).await;
    let server = server(state);

    let response = server
        .get("/entities")
        .add_query_param("class", "Person")
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.header("content-type"),
        "application/sparql-results+json"
    );
    let body: Value = response.json();
    assert_eq!(
        body.pointer("/results/bindings/0/entities/value"),
        Some(&Value::String(
            "http://dbpedia.org/resource/Albert_Einstein".to_string()
        ))
    );
}

#[tokio::test]
async fn nested_style_renders_entity_objects() {
    let state = build_state(false);
    let params = EntityParams {
        class: Some("Person".to_string()),
        common: ontogate::api::CommonParams {
            style: Some("nested".to_string()),
            ..ontogate::api::CommonParams::default()
        },
        ..EntityParams::default()
    };
    prime_for(&state, &params).await;
    let server = server(state);

    let response = server
        .get("/entities")
        .add_query_param("class", "Person")
        .add_query_param("style", "nested")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let list = body.as_array().unwrap();
    assert_eq!(list[0]["@id"], "Albert_Einstein");
}

#[tokio::test]
async fn unreachable_endpoint_maps_to_bad_gateway() {
    let server = server(build_state(false));
    let response = server
        .get("/entities")
        .add_query_param("class", "Person")
        .await;
    assert_eq!(response.status_code(), 502);
    // downstream failures never leak internals
    assert_eq!(response.text(), "query execution failed");
}
