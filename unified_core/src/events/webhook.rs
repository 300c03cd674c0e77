use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use sha2::Sha256;

use super::models::Event;
use super::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-unified-signature";

/// Verify a webhook signature.
///
/// Accepts the header value in either raw hex or `sha256=<hex>` format.
#[tracing::instrument(level = "debug", skip(secret, body))]
pub fn verify_signature(secret: &str, signature_header: &str, body: &[u8]) -> Result<()> {
    let sig = signature_header.trim();
    let sig_hex = sig.strip_prefix("sha256=").unwrap_or(sig);
    let provided = hex::decode(sig_hex).map_err(|_| Error::SignatureVerificationFailed)?;

    // `hmac` provides constant-time verification.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| Error::SignatureVerificationFailed)?;
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| Error::SignatureVerificationFailed)?;

    Ok(())
}

/// Compute the signature header value for `body`.
///
/// Format: `sha256=<hex>`
#[tracing::instrument(level = "debug", skip(secret, body))]
pub fn sign_body(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| Error::SignatureVerificationFailed)?;
    mac.update(body);
    let bytes = mac.finalize().into_bytes();
    Ok(format!("sha256={}", hex::encode(bytes)))
}

#[derive(Debug, Clone)]
pub struct WebhookSender {
    client: reqwest::Client,
    default_timeout: Duration,
    signing_secret: Option<String>,
}

impl WebhookSender {
    pub fn new(default_timeout: Duration, signing_secret: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("unified_core/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            default_timeout,
            signing_secret,
        })
    }

    #[tracing::instrument(level = "debug", skip_all, fields(topic = %event.topic))]
    pub async fn send(&self, url: &str, timeout_ms: Option<u64>, event: &Event) -> Result<()> {
        let timeout = timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout);

        let body = serde_json::to_vec(event).map_err(|e| Error::message(format!("json: {e}")))?;
        let mut req = self
            .client
            .post(url)
            .timeout(timeout)
            .header(CONTENT_TYPE, "application/json");

        if let Some(secret) = self.signing_secret.as_deref() {
            let sig = sign_body(secret, &body)?;
            req = req.header(SIGNATURE_HEADER, sig);
        }

        let resp = req.body(body).send().await?;
        if !resp.status().is_success() {
            return Err(Error::WebhookNonSuccess {
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn sign_then_verify() {
        let sig = sign_body("s3cret", b"{\"a\":1}").unwrap();
        assert!(sig.starts_with("sha256="));
        verify_signature("s3cret", &sig, b"{\"a\":1}").unwrap();
        verify_signature("s3cret", sig.trim_start_matches("sha256="), b"{\"a\":1}").unwrap();
        assert!(verify_signature("other", &sig, b"{\"a\":1}").is_err());
        assert!(verify_signature("s3cret", &sig, b"{\"a\":2}").is_err());
    }

    fn sample_event() -> Event {
        Event::new(
            "project-1",
            Some("user-1".to_string()),
            "ticketing.ticket.created",
            "gorgias",
            serde_json::json!({ "remote_id": "42" }),
            "ticketing.ticket:gorgias:42",
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn send_attaches_signature_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header_exists(SIGNATURE_HEADER))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let sender = WebhookSender::new(Duration::from_secs(5), Some("s3cret".into())).unwrap();
        sender
            .send(&format!("{}/hook", server.uri()), None, &sample_event())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sender = WebhookSender::new(Duration::from_secs(5), None).unwrap();
        let err = sender
            .send(&server.uri(), Some(1_000), &sample_event())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WebhookNonSuccess { status: 500 }));
    }
}
