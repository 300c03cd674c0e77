//! Shared reqwest plumbing for provider clients.

use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use unified_core::models::Connection;
use unified_core::{Error, Result};

/// Longest provider error body echoed into an error message.
const ERROR_BODY_LIMIT: usize = 512;

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("unified/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(Error::backend_reqwest)
}

/// Base URL for a call: explicit override, then the connection's `api_base`
/// credential, then the provider default.
pub(crate) fn resolve_base(
    override_base: Option<&str>,
    connection: &Connection,
    default: Option<&str>,
) -> Result<String> {
    override_base
        .or_else(|| connection.credentials.get_str("api_base"))
        .or(default)
        .map(|b| b.trim_end_matches('/').to_string())
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "{} connection credentials missing 'api_base'",
                connection.provider
            ))
        })
}

/// Attaches bearer auth from `access_token`.
pub(crate) fn bearer(req: RequestBuilder, connection: &Connection) -> Result<RequestBuilder> {
    let token = connection.credentials.require_str("access_token")?;
    Ok(req.bearer_auth(token))
}

/// Sends `req` and returns the JSON body of a 2xx response.
pub(crate) async fn send_json(provider: &str, req: RequestBuilder) -> Result<Value> {
    let resp = req.send().await.map_err(Error::backend_reqwest)?;
    read_json(provider, resp).await
}

pub(crate) async fn read_json(provider: &str, resp: Response) -> Result<Value> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        return Err(Error::BackendMessage(format!(
            "{provider} returned {status}: {snippet}"
        )));
    }
    let bytes = resp.bytes().await.map_err(Error::backend_reqwest)?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::backend(format!("{provider} response is not JSON"), e))
}

/// Pulls the record array out of a list response (`results`, `data`, or a bare array).
pub(crate) fn records_at(provider: &str, body: Value, key: &str) -> Result<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(Error::BackendMessage(format!(
                "{provider} list response field '{key}' is not an array: {other}"
            ))),
        },
        other => Err(Error::BackendMessage(format!(
            "{provider} list response is not an object: {other}"
        ))),
    }
}
