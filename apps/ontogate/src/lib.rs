//! # ontogate (application library)
//!
//! The impure half of ontogate: HTTP API, CLI, configuration loading,
//! and the SPARQL endpoint transport. All pure logic lives in
//! [`ontogate_core`]; this crate wires it to the network, the
//! filesystem, and the clock.

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
