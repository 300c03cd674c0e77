//! Pipedrive persons as CRM contacts.
//!
//! Pipedrive ids are integers and custom fields are top-level keys (40 char
//! hashes) on the person object. Responses wrap the payload in `data`.

use crate::http;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::instrument;
use unified_core::models::{Connection, ObjectType, Vertical};
use unified_core::sync::{FetchParams, ProviderClient};
use unified_core::unification::schema::crm::{UnifiedCrmContactInput, UnifiedCrmContactOutput};
use unified_core::unification::schema::{Email, Phone};
use unified_core::unification::{CustomFieldResolver, MapperKey, ObjectMapper, RemoteId, Unified};
use unified_core::{Error, Result};

pub const PROVIDER: &str = "pipedrive";
const API_BASE: &str = "https://api.pipedrive.com";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PipedriveChannel {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub label: Option<String>,
}

/// `owner_id` is an object on reads and a bare id on writes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PipedriveOwner {
    Object { id: RemoteId },
    Id(RemoteId),
}

impl PipedriveOwner {
    fn id(self) -> RemoteId {
        match self {
            PipedriveOwner::Object { id } | PipedriveOwner::Id(id) => id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PipedrivePerson {
    pub id: RemoteId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Vec<PipedriveChannel>,
    #[serde(default)]
    pub phone: Vec<PipedriveChannel>,
    #[serde(default)]
    pub owner_id: Option<PipedriveOwner>,
}

/// Primary entries first, blanks dropped.
fn ordered(channels: Vec<PipedriveChannel>) -> Vec<PipedriveChannel> {
    let (mut primary, rest): (Vec<_>, Vec<_>) = channels
        .into_iter()
        .filter(|c| !c.value.trim().is_empty())
        .partition(|c| c.primary);
    primary.extend(rest);
    primary
}

fn channel_type(label: Option<String>) -> Option<String> {
    label.map(|l| l.to_ascii_uppercase())
}

pub struct PipedriveContactMapper;

impl ObjectMapper for PipedriveContactMapper {
    type Input = UnifiedCrmContactInput;
    type Output = UnifiedCrmContactOutput;
    type Remote = PipedrivePerson;

    fn key(&self) -> MapperKey {
        MapperKey::new(Vertical::Crm, ObjectType::Contact, PROVIDER)
    }

    fn desunify(&self, input: UnifiedCrmContactInput, cf: &CustomFieldResolver) -> Result<Value> {
        let first = input.first_name.as_deref().unwrap_or_default().trim();
        let last = input.last_name.as_deref().unwrap_or_default().trim();
        let mut out = Map::new();
        out.insert("name".to_string(), json!(format!("{first} {last}")));

        let emails: Vec<PipedriveChannel> = input
            .email_addresses
            .iter()
            .enumerate()
            .map(|(i, e)| PipedriveChannel {
                value: e.email_address.clone(),
                primary: i == 0,
                label: e.email_address_type.as_deref().map(str::to_ascii_lowercase),
            })
            .collect();
        if !emails.is_empty() {
            out.insert("email".to_string(), json!(emails));
        }
        let phones: Vec<PipedriveChannel> = input
            .phone_numbers
            .iter()
            .enumerate()
            .map(|(i, p)| PipedriveChannel {
                value: p.phone_number.clone(),
                primary: i == 0,
                label: p.phone_type.as_deref().map(str::to_ascii_lowercase),
            })
            .collect();
        if !phones.is_empty() {
            out.insert("phone".to_string(), json!(phones));
        }

        if let Some(owner) = input.user_id.as_deref() {
            let owner = owner
                .trim()
                .parse::<u64>()
                .map_err(|_| Error::invalid_field("user_id", "pipedrive owner ids are numeric"))?;
            out.insert("owner_id".to_string(), json!(owner));
        }

        cf.merge_into(&input.field_mappings, &mut out);
        Ok(Value::Object(out))
    }

    fn unify(
        &self,
        remote: PipedrivePerson,
        raw: &Value,
        cf: &CustomFieldResolver,
    ) -> Result<Unified<UnifiedCrmContactOutput>> {
        // Older accounts only return `name`; split on the first space.
        let (first_name, last_name) = match (remote.first_name, remote.last_name) {
            (None, None) => match remote.name.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => match name.split_once(' ') {
                    Some((f, l)) => (Some(f.to_string()), Some(l.trim().to_string())),
                    None => (Some(name.to_string()), None),
                },
                _ => (None, None),
            },
            names => names,
        };

        let output = UnifiedCrmContactOutput {
            first_name,
            last_name,
            email_addresses: ordered(remote.email)
                .into_iter()
                .map(|c| Email {
                    email_address: c.value,
                    email_address_type: channel_type(c.label),
                })
                .collect(),
            phone_numbers: ordered(remote.phone)
                .into_iter()
                .map(|c| Phone {
                    phone_number: c.value,
                    phone_type: channel_type(c.label),
                })
                .collect(),
            addresses: Vec::new(),
            user_id: remote.owner_id.map(|o| o.id().into_string()),
        };
        Ok(Unified {
            remote_id: remote.id,
            output,
            field_mappings: cf.to_canonical(raw),
        })
    }
}

#[derive(Clone)]
pub struct PipedriveClient {
    client: Client,
    api_base: Option<String>,
}

impl PipedriveClient {
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

    /// OAuth connections carry `access_token`; API key connections `api_token`.
    fn authorize(req: RequestBuilder, connection: &Connection) -> Result<RequestBuilder> {
        if let Some(token) = connection.credentials.get_str("api_token") {
            return Ok(req.query(&[("api_token", token)]));
        }
        http::bearer(req, connection)
    }

    fn check(object_type: ObjectType) -> Result<()> {
        if object_type != ObjectType::Contact {
            return Err(Error::InvalidInput(format!(
                "pipedrive does not serve {object_type}"
            )));
        }
        Ok(())
    }
}

const SUPPORTED: &[(Vertical, ObjectType)] = &[(Vertical::Crm, ObjectType::Contact)];

#[async_trait]
impl ProviderClient for PipedriveClient {
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
        let base = http::resolve_base(self.api_base.as_deref(), connection, Some(API_BASE))?;
        let mut query = vec![("limit", params.limit.unwrap_or(100).min(500).to_string())];
        if let Some(start) = &params.cursor {
            query.push(("start", start.clone()));
        }
        let req = self.client.get(format!("{base}/v1/persons")).query(&query);
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
        let base = http::resolve_base(self.api_base.as_deref(), connection, Some(API_BASE))?;
        let req = self.client.post(format!("{base}/v1/persons")).json(payload);
        let body = http::send_json(PROVIDER, Self::authorize(req, connection)?).await?;
        match body {
            Value::Object(mut map) if map.contains_key("data") => {
                Ok(map.remove("data").unwrap_or(Value::Null))
            }
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unified_core::models::{Credentials, LinkedUserId, ProjectId};
    use unified_core::unification::mapper::{desunify_with, unify_with};
    use unified_core::unification::CustomFieldMapping;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIER_KEY: &str = "d4de1c1518b4531717c676029a45911c340390a6";

    fn tier_mapping() -> Vec<CustomFieldMapping> {
        vec![CustomFieldMapping::new(
            ProjectId::new(),
            Vertical::Crm,
            ObjectType::Contact,
            PROVIDER,
            "tier",
            TIER_KEY,
        )
        .unwrap()]
    }

    #[test]
    fn unify_stringifies_numeric_ids_and_orders_primary_first() {
        let entity = unify_with(
            &PipedriveContactMapper,
            &json!({
                "id": 12345,
                "name": "Grace Hopper",
                "email": [
                    { "value": "work@navy.mil", "primary": false, "label": "work" },
                    { "value": "grace@example.com", "primary": true, "label": "home" }
                ],
                "phone": [{ "value": "", "primary": true }],
                "owner_id": { "id": 7, "name": "Owner" },
                TIER_KEY: "gold"
            }),
            &tier_mapping(),
        )
        .unwrap();
        assert_eq!(entity.remote_id, "12345");
        assert_eq!(entity.field_str("first_name"), Some("Grace"));
        assert_eq!(entity.field_str("last_name"), Some("Hopper"));
        assert_eq!(entity.field_str("user_id"), Some("7"));
        let emails = entity.field("email_addresses").unwrap();
        assert_eq!(emails[0]["email_address"], json!("grace@example.com"));
        assert_eq!(emails[0]["email_address_type"], json!("HOME"));
        assert_eq!(entity.field("phone_numbers"), Some(&json!([])));
        assert_eq!(entity.field_mappings["tier"], json!("gold"));
    }

    #[test]
    fn desunify_joins_name_and_maps_custom_fields() {
        let payload = desunify_with(
            &PipedriveContactMapper,
            &json!({
                "first_name": "Grace",
                "last_name": "Hopper",
                "email_addresses": [{ "email_address": "grace@example.com", "email_address_type": "WORK" }],
                "user_id": "7",
                "field_mappings": { "tier": "gold" }
            }),
            &tier_mapping(),
        )
        .unwrap();
        assert_eq!(payload["name"], json!("Grace Hopper"));
        assert_eq!(
            payload["email"],
            json!([{ "value": "grace@example.com", "primary": true, "label": "work" }])
        );
        assert_eq!(payload["owner_id"], json!(7));
        assert_eq!(payload[TIER_KEY], json!("gold"));
        assert!(payload.get("phone").is_none());
    }

    #[test]
    fn desunify_rejects_non_numeric_owner() {
        let err = desunify_with(
            &PipedriveContactMapper,
            &json!({ "first_name": "A", "last_name": "B", "user_id": "abc" }),
            &[],
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("user_id"));
    }

    #[tokio::test]
    async fn api_token_connections_use_query_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/persons"))
            .and(query_param("api_token", "pd-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": [{ "id": 1, "name": "Ada Lovelace" }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/persons"))
            .and(body_partial_json(json!({ "name": "Ada Lovelace" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "success": true,
                "data": { "id": 2, "name": "Ada Lovelace" }
            })))
            .mount(&server)
            .await;

        let conn = Connection::new(
            ProjectId::new(),
            LinkedUserId::new(),
            PROVIDER,
            Vertical::Crm,
            Credentials::new(json!({ "api_token": "pd-key" })),
        )
        .unwrap();
        let client = PipedriveClient::new(Duration::from_secs(5))
            .unwrap()
            .with_api_base(server.uri());

        let records = client
            .fetch(&conn, ObjectType::Contact, &FetchParams::default())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);

        let created = client
            .write(&conn, ObjectType::Contact, &json!({ "name": "Ada Lovelace" }))
            .await
            .unwrap();
        assert_eq!(created["id"], json!(2));

        let err = client
            .fetch(&conn, ObjectType::Company, &FetchParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
