//! Outbound event layer used for webhook notifications.
//!
//! Every persisted unified entity produces one [`models::Event`]; an
//! [`traits::EventBus`] keeps them for consumers and [`webhook::WebhookSender`]
//! pushes them to a tenant endpoint with an HMAC signature.

#![forbid(unsafe_code)]

mod error;

pub mod memory;
pub mod models;
pub mod traits;
pub mod webhook;

pub use error::{Error, Result};
