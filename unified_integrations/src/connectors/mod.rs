//! Provider connectors: one module per provider, each with its typed record
//! shapes, object mappers and an HTTP [`ProviderClient`](unified_core::sync::ProviderClient).

pub mod gorgias;
pub mod gusto;
pub mod hubspot;
pub mod jira;
pub mod pipedrive;
