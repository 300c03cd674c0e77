//! Gorgias helpdesk tickets.
//!
//! Tenant custom fields are kept in the ticket's free-form `meta` object.

use crate::http;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::instrument;
use unified_core::models::{Connection, ObjectType, Vertical};
use unified_core::sync::{FetchParams, ProviderClient};
use unified_core::unification::schema::ticketing::{
    UnifiedTicketingTicketInput, UnifiedTicketingTicketOutput, STATUS_CLOSED, STATUS_OPEN,
};
use unified_core::unification::{CustomFieldResolver, MapperKey, ObjectMapper, RemoteId, Unified};
use unified_core::{Error, Result};

pub const PROVIDER: &str = "gorgias";

#[derive(Debug, Deserialize)]
pub struct GorgiasRef {
    pub id: RemoteId,
}

#[derive(Debug, Deserialize)]
pub struct GorgiasTag {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct GorgiasMessage {
    #[serde(default)]
    pub body_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GorgiasTicket {
    pub id: RemoteId,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub tags: Vec<GorgiasTag>,
    #[serde(default)]
    pub assignee_user: Option<GorgiasRef>,
    #[serde(default)]
    pub assignee_team: Option<GorgiasRef>,
    #[serde(default)]
    pub customer: Option<GorgiasRef>,
    #[serde(default)]
    pub messages: Vec<GorgiasMessage>,
    #[serde(default)]
    pub closed_datetime: Option<DateTime<Utc>>,
}

fn priority_to_unified(priority: &str) -> Option<&'static str> {
    match priority.to_ascii_lowercase().as_str() {
        "critical" | "high" => Some("HIGH"),
        "normal" | "medium" => Some("MEDIUM"),
        "low" => Some("LOW"),
        _ => None,
    }
}

fn priority_to_remote(priority: &str) -> &'static str {
    match priority {
        "HIGH" => "high",
        "LOW" => "low",
        _ => "normal",
    }
}

fn custom_fields_source(raw: &Value) -> &Value {
    match raw.get("meta") {
        Some(meta) if meta.is_object() => meta,
        _ => raw,
    }
}

pub struct GorgiasTicketMapper;

impl ObjectMapper for GorgiasTicketMapper {
    type Input = UnifiedTicketingTicketInput;
    type Output = UnifiedTicketingTicketOutput;
    type Remote = GorgiasTicket;

    fn key(&self) -> MapperKey {
        MapperKey::new(Vertical::Ticketing, ObjectType::Ticket, PROVIDER)
    }

    fn desunify(
        &self,
        input: UnifiedTicketingTicketInput,
        cf: &CustomFieldResolver,
    ) -> Result<Value> {
        // A Gorgias ticket cannot be created without its first message.
        let body = match input.description.as_deref().map(str::trim) {
            Some(d) if !d.is_empty() => d.to_string(),
            _ => return Err(Error::missing_field("description")),
        };
        let subject = input.name.clone().unwrap_or_default();

        let mut message = json!({
            "channel": "api",
            "via": "api",
            "from_agent": false,
            "subject": subject,
            "body_text": body,
        });
        if let Some(contact) = input.contact_id.as_deref() {
            message["sender"] = json!({ "id": contact });
        }

        let mut out = Map::new();
        out.insert("subject".to_string(), json!(subject));
        out.insert("channel".to_string(), json!("api"));
        out.insert("via".to_string(), json!("api"));
        out.insert(
            "status".to_string(),
            json!(if input.is_closed() { "closed" } else { "open" }),
        );
        if let Some(p) = input.priority.as_deref() {
            out.insert("priority".to_string(), json!(priority_to_remote(p)));
        }
        if !input.tags.is_empty() {
            let tags: Vec<Value> = input.tags.iter().map(|t| json!({ "name": t })).collect();
            out.insert("tags".to_string(), Value::Array(tags));
        }
        if let Some(assignee) = input.assigned_to.first() {
            out.insert("assignee_user".to_string(), json!({ "id": assignee }));
        }
        if let Some(team) = input.collections.first() {
            out.insert("assignee_team".to_string(), json!({ "id": team }));
        }
        if let Some(contact) = input.contact_id.as_deref() {
            out.insert("customer".to_string(), json!({ "id": contact }));
        }
        out.insert("messages".to_string(), json!([message]));

        let meta = cf.to_provider(&input.field_mappings);
        if !meta.is_empty() {
            out.insert("meta".to_string(), Value::Object(meta));
        }
        Ok(Value::Object(out))
    }

    fn unify(
        &self,
        remote: GorgiasTicket,
        raw: &Value,
        cf: &CustomFieldResolver,
    ) -> Result<Unified<UnifiedTicketingTicketOutput>> {
        let status = match remote.status.as_deref() {
            Some("closed") => Some(STATUS_CLOSED.to_string()),
            Some(_) => Some(STATUS_OPEN.to_string()),
            None => None,
        };
        let output = UnifiedTicketingTicketOutput {
            name: remote.subject,
            status,
            description: remote.messages.into_iter().find_map(|m| m.body_text),
            due_date: None,
            ticket_type: remote.channel,
            priority: remote
                .priority
                .as_deref()
                .and_then(priority_to_unified)
                .map(str::to_string),
            tags: remote.tags.into_iter().map(|t| t.name).collect(),
            completed_at: remote.closed_datetime,
            assigned_to: remote
                .assignee_user
                .map(|u| u.id.into_string())
                .into_iter()
                .collect(),
            collections: remote
                .assignee_team
                .map(|t| t.id.into_string())
                .into_iter()
                .collect(),
            account_id: None,
            contact_id: remote.customer.map(|c| c.id.into_string()),
        };
        Ok(Unified {
            remote_id: remote.id,
            output,
            field_mappings: cf.to_canonical(custom_fields_source(raw)),
        })
    }
}

#[derive(Clone)]
pub struct GorgiasClient {
    client: Client,
    api_base: Option<String>,
}

impl GorgiasClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            api_base: None,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Accounts live at `https://{domain}.gorgias.com`.
    fn base(&self, connection: &Connection) -> Result<String> {
        let account = connection
            .credentials
            .get_str("domain")
            .map(|d| format!("https://{d}.gorgias.com"));
        http::resolve_base(self.api_base.as_deref(), connection, account.as_deref())
    }

    /// Private apps use basic auth (`username` + `api_key`); OAuth apps a bearer token.
    fn authorize(req: RequestBuilder, connection: &Connection) -> Result<RequestBuilder> {
        let creds = &connection.credentials;
        match (creds.get_str("username"), creds.get_str("api_key")) {
            (Some(user), Some(key)) => Ok(req.basic_auth(user, Some(key))),
            _ => http::bearer(req, connection),
        }
    }

    fn check(object_type: ObjectType) -> Result<()> {
        if object_type != ObjectType::Ticket {
            return Err(Error::InvalidInput(format!(
                "gorgias does not serve {object_type}"
            )));
        }
        Ok(())
    }
}

const SUPPORTED: &[(Vertical, ObjectType)] = &[(Vertical::Ticketing, ObjectType::Ticket)];

#[async_trait]
impl ProviderClient for GorgiasClient {
    fn provider(&self) -> &str {
        PROVIDER
    }

    fn supports(&self) -> &[(Vertical, ObjectType)] {
        SUPPORTED
    }

    #[instrument(level = "info", skip(self, connection, params), fields(connection_id = %connection.id))]
    async fn fetch(
        &self,
        connection: &Connection,
        object_type: ObjectType,
        params: &FetchParams,
    ) -> Result<Vec<Value>> {
        Self::check(object_type)?;
        let base = self.base(connection)?;
        let mut query = vec![("limit", params.limit.unwrap_or(30).min(100).to_string())];
        if let Some(cursor) = &params.cursor {
            query.push(("cursor", cursor.clone()));
        }
        let req = self.client.get(format!("{base}/api/tickets")).query(&query);
        let body = http::send_json(PROVIDER, Self::authorize(req, connection)?).await?;
        http::records_at(PROVIDER, body, "data")
    }

    #[instrument(level = "info", skip(self, connection, payload), fields(connection_id = %connection.id))]
    async fn write(
        &self,
        connection: &Connection,
        object_type: ObjectType,
        payload: &Value,
    ) -> Result<Value> {
        Self::check(object_type)?;
        let base = self.base(connection)?;
        let req = self.client.post(format!("{base}/api/tickets")).json(payload);
        http::send_json(PROVIDER, Self::authorize(req, connection)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unified_core::models::{Credentials, LinkedUserId, ProjectId};
    use unified_core::unification::mapper::{desunify_with, unify_with};
    use unified_core::unification::CustomFieldMapping;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sla_mapping() -> Vec<CustomFieldMapping> {
        vec![CustomFieldMapping::new(
            ProjectId::new(),
            Vertical::Ticketing,
            ObjectType::Ticket,
            PROVIDER,
            "sla_tier",
            "sla",
        )
        .unwrap()]
    }

    #[test]
    fn unify_maps_status_tags_and_refs() {
        let entity = unify_with(
            &GorgiasTicketMapper,
            &json!({
                "id": 3311,
                "subject": "Refund request",
                "status": "closed",
                "priority": "critical",
                "channel": "email",
                "tags": [{ "id": 1, "name": "refund" }, { "id": 2, "name": "vip" }],
                "assignee_user": { "id": 55, "email": "agent@shop.test" },
                "customer": { "id": 901 },
                "messages": [{ "body_text": "Please refund order 12" }],
                "closed_datetime": "2024-03-01T10:00:00Z",
                "meta": { "sla": "gold" }
            }),
            &sla_mapping(),
        )
        .unwrap();
        assert_eq!(entity.remote_id, "3311");
        assert_eq!(entity.field_str("status"), Some("CLOSED"));
        assert_eq!(entity.field_str("priority"), Some("HIGH"));
        assert_eq!(entity.field_str("type"), Some("email"));
        assert_eq!(entity.field("tags"), Some(&json!(["refund", "vip"])));
        assert_eq!(entity.field("assigned_to"), Some(&json!(["55"])));
        assert_eq!(entity.field_str("contact_id"), Some("901"));
        assert_eq!(entity.field_str("description"), Some("Please refund order 12"));
        assert_eq!(entity.field_mappings["sla_tier"], json!("gold"));
    }

    #[test]
    fn desunify_builds_first_message() {
        let payload = desunify_with(
            &GorgiasTicketMapper,
            &json!({
                "name": "Broken zipper",
                "description": "Zipper broke on day one",
                "priority": "LOW",
                "tags": ["defect"],
                "contact_id": "901",
                "field_mappings": { "sla_tier": "silver" }
            }),
            &sla_mapping(),
        )
        .unwrap();
        assert_eq!(payload["subject"], json!("Broken zipper"));
        assert_eq!(payload["status"], json!("open"));
        assert_eq!(payload["priority"], json!("low"));
        assert_eq!(payload["tags"], json!([{ "name": "defect" }]));
        assert_eq!(payload["customer"], json!({ "id": "901" }));
        assert_eq!(payload["messages"][0]["body_text"], json!("Zipper broke on day one"));
        assert_eq!(payload["messages"][0]["sender"], json!({ "id": "901" }));
        assert_eq!(payload["meta"], json!({ "sla": "silver" }));
    }

    #[test]
    fn desunify_requires_description() {
        let err = desunify_with(&GorgiasTicketMapper, &json!({ "name": "No body" }), &[])
            .unwrap_err();
        assert_eq!(err.field(), Some("description"));
    }

    #[tokio::test]
    async fn basic_auth_when_api_key_present() {
        let server = MockServer::start().await;
        // "agent@shop.test:key-1" base64 encoded.
        Mock::given(method("GET"))
            .and(path("/api/tickets"))
            .and(header(
                "authorization",
                "Basic YWdlbnRAc2hvcC50ZXN0OmtleS0x",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": 1, "subject": "a" }],
                "meta": { "next_cursor": null }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let conn = Connection::new(
            ProjectId::new(),
            LinkedUserId::new(),
            PROVIDER,
            Vertical::Ticketing,
            Credentials::new(json!({
                "api_base": server.uri(),
                "username": "agent@shop.test",
                "api_key": "key-1"
            })),
        )
        .unwrap();
        let records = GorgiasClient::new(Duration::from_secs(5))
            .unwrap()
            .fetch(&conn, ObjectType::Ticket, &FetchParams::default())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn base_url_falls_back_to_account_domain() {
        let conn = Connection::new(
            ProjectId::new(),
            LinkedUserId::new(),
            PROVIDER,
            Vertical::Ticketing,
            Credentials::new(json!({ "domain": "acme-shop" })),
        )
        .unwrap();
        let client = GorgiasClient::new(Duration::from_secs(5)).unwrap();
        assert_eq!(client.base(&conn).unwrap(), "https://acme-shop.gorgias.com");

        let bare = Connection::new(
            ProjectId::new(),
            LinkedUserId::new(),
            PROVIDER,
            Vertical::Ticketing,
            Credentials::default(),
        )
        .unwrap();
        assert!(client.base(&bare).is_err());
    }
}
