//! Provider integrations for the unified engine.
//!
//! [`catalog`] is the entry point: it wires every connector's mappers and
//! clients into the registries `unified_core` consumes.

pub mod catalog;
pub mod connectors;
mod http;

pub use catalog::{mapper_registry, orchestrator, provider_clients, service_registry, ProviderMapper};
