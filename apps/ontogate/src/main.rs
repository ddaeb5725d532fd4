//! # ontogate - Knowledge Graph Gateway
//!
//! The main binary for the ontogate SPARQL gateway.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for offline compilation and introspection
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                apps/ontogate (THE BINARY)                │
//! │                                                          │
//! │  ┌─────────────┐   ┌─────────────┐   ┌───────────────┐  │
//! │  │   CLI       │   │  HTTP API   │   │   Transport   │  │
//! │  │  (clap)     │   │  (axum)     │   │  (reqwest)    │  │
//! │  └──────┬──────┘   └──────┬──────┘   └───────┬───────┘  │
//! │         │                 │                  │          │
//! │         └─────────────────┼──────────────────┘          │
//! │                           ▼                             │
//! │                 ┌──────────────────┐                    │
//! │                 │  ontogate-core   │                    │
//! │                 │   (THE LOGIC)    │                    │
//! │                 └──────────────────┘                    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! ontogate server --host 0.0.0.0 --port 8080
//!
//! # Compile a request offline
//! ontogate compile --class Person --filter dbo:birthDate,lt,1980-01-01
//!
//! # Introspection
//! ontogate versions
//! ontogate prefixes
//! ```

use clap::Parser;
use ontogate::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Initialize tracing — ONTOGATE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("ONTOGATE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ontogate=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the ontogate startup banner.
fn print_banner() {
    println!(
        r#"
  ontogate v{}

  Typed requests in • SPARQL out • Deterministic throughout
"#,
        env!("CARGO_PKG_VERSION")
    );
}
