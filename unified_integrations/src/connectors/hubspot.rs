//! HubSpot CRM (API v3): contacts and companies.
//!
//! Every HubSpot object is `{ id, properties: {..} }`; tenant custom fields
//! live next to the standard ones inside `properties`.

use crate::http;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::instrument;
use unified_core::models::{Connection, ObjectType, Vertical};
use unified_core::sync::{FetchParams, ProviderClient};
use unified_core::unification::schema::crm::{
    UnifiedCrmCompanyInput, UnifiedCrmCompanyOutput, UnifiedCrmContactInput,
    UnifiedCrmContactOutput,
};
use unified_core::unification::schema::{Address, Email, Phone};
use unified_core::unification::{
    CustomFieldResolver, FieldMappings, MapperKey, ObjectMapper, RemoteId, Unified,
};
use unified_core::{Error, Result};

pub const PROVIDER: &str = "hubspot";
const API_BASE: &str = "https://api.hubapi.com";

const CONTACT_PROPERTIES: &[&str] = &[
    "firstname",
    "lastname",
    "email",
    "phone",
    "address",
    "city",
    "state",
    "zip",
    "country",
    "hubspot_owner_id",
];

const COMPANY_PROPERTIES: &[&str] = &[
    "name",
    "industry",
    "numberofemployees",
    "phone",
    "address",
    "city",
    "state",
    "zip",
    "country",
    "hubspot_owner_id",
];

#[derive(Debug, Deserialize)]
pub struct HubspotObject {
    pub id: RemoteId,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl HubspotObject {
    fn prop(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn address(&self) -> Option<Address> {
        let address = Address {
            street_1: self.prop("address"),
            city: self.prop("city"),
            state: self.prop("state"),
            postal_code: self.prop("zip"),
            country: self.prop("country"),
            address_type: Some("PRIMARY".to_string()),
            ..Default::default()
        };
        (!address.is_empty()).then_some(address)
    }
}

fn custom_fields_source(raw: &Value) -> &Value {
    raw.get("properties").unwrap_or(raw)
}

fn put(props: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
        props.insert(key.to_string(), Value::String(v.to_string()));
    }
}

fn put_address(props: &mut Map<String, Value>, address: Option<&Address>) {
    let Some(a) = address else {
        return;
    };
    put(props, "address", a.street_1.as_deref());
    put(props, "city", a.city.as_deref());
    put(props, "state", a.state.as_deref());
    put(props, "zip", a.postal_code.as_deref());
    put(props, "country", a.country.as_deref());
}

fn finish(mut props: Map<String, Value>, cf: &CustomFieldResolver, fields: &FieldMappings) -> Value {
    cf.merge_into(fields, &mut props);
    json!({ "properties": Value::Object(props) })
}

pub struct HubspotContactMapper;

impl ObjectMapper for HubspotContactMapper {
    type Input = UnifiedCrmContactInput;
    type Output = UnifiedCrmContactOutput;
    type Remote = HubspotObject;

    fn key(&self) -> MapperKey {
        MapperKey::new(Vertical::Crm, ObjectType::Contact, PROVIDER)
    }

    fn desunify(&self, input: UnifiedCrmContactInput, cf: &CustomFieldResolver) -> Result<Value> {
        let mut props = Map::new();
        put(&mut props, "firstname", input.first_name.as_deref());
        put(&mut props, "lastname", input.last_name.as_deref());
        put(&mut props, "email", input.primary_email());
        put(&mut props, "phone", input.primary_phone());
        put(&mut props, "hubspot_owner_id", input.user_id.as_deref());
        put_address(&mut props, input.addresses.first());
        Ok(finish(props, cf, &input.field_mappings))
    }

    fn unify(
        &self,
        remote: HubspotObject,
        raw: &Value,
        cf: &CustomFieldResolver,
    ) -> Result<Unified<UnifiedCrmContactOutput>> {
        let output = UnifiedCrmContactOutput {
            first_name: remote.prop("firstname"),
            last_name: remote.prop("lastname"),
            email_addresses: remote
                .prop("email")
                .map(|email_address| Email {
                    email_address,
                    email_address_type: Some("PERSONAL".to_string()),
                })
                .into_iter()
                .collect(),
            phone_numbers: remote
                .prop("phone")
                .map(|phone_number| Phone {
                    phone_number,
                    phone_type: Some("WORK".to_string()),
                })
                .into_iter()
                .collect(),
            addresses: remote.address().into_iter().collect(),
            user_id: remote.prop("hubspot_owner_id"),
        };
        Ok(Unified {
            field_mappings: cf.to_canonical(custom_fields_source(raw)),
            remote_id: remote.id,
            output,
        })
    }
}

pub struct HubspotCompanyMapper;

impl ObjectMapper for HubspotCompanyMapper {
    type Input = UnifiedCrmCompanyInput;
    type Output = UnifiedCrmCompanyOutput;
    type Remote = HubspotObject;

    fn key(&self) -> MapperKey {
        MapperKey::new(Vertical::Crm, ObjectType::Company, PROVIDER)
    }

    fn desunify(&self, input: UnifiedCrmCompanyInput, cf: &CustomFieldResolver) -> Result<Value> {
        let mut props = Map::new();
        put(&mut props, "name", input.name.as_deref());
        // HubSpot's industry is an enumeration of upper snake case values.
        let industry = input
            .industry
            .as_deref()
            .map(|i| i.trim().to_ascii_uppercase().replace([' ', '-'], "_"));
        put(&mut props, "industry", industry.as_deref());
        if let Some(n) = input.number_of_employees {
            props.insert("numberofemployees".to_string(), Value::String(n.to_string()));
        }
        put(
            &mut props,
            "phone",
            input.phone_numbers.first().map(|p| p.phone_number.as_str()),
        );
        put(&mut props, "hubspot_owner_id", input.user_id.as_deref());
        put_address(&mut props, input.addresses.first());
        Ok(finish(props, cf, &input.field_mappings))
    }

    fn unify(
        &self,
        remote: HubspotObject,
        raw: &Value,
        cf: &CustomFieldResolver,
    ) -> Result<Unified<UnifiedCrmCompanyOutput>> {
        let number_of_employees = match remote.prop("numberofemployees") {
            Some(n) => Some(n.trim().parse::<u64>().map_err(|_| {
                Error::invalid_field(
                    "number_of_employees",
                    format!("hubspot numberofemployees is not a count: {n:?}"),
                )
            })?),
            None => None,
        };
        let output = UnifiedCrmCompanyOutput {
            name: remote.prop("name"),
            industry: remote.prop("industry"),
            number_of_employees,
            email_addresses: Vec::new(),
            phone_numbers: remote
                .prop("phone")
                .map(|phone_number| Phone {
                    phone_number,
                    phone_type: Some("WORK".to_string()),
                })
                .into_iter()
                .collect(),
            addresses: remote.address().into_iter().collect(),
            user_id: remote.prop("hubspot_owner_id"),
        };
        Ok(Unified {
            field_mappings: cf.to_canonical(custom_fields_source(raw)),
            remote_id: remote.id,
            output,
        })
    }
}

#[derive(Clone)]
pub struct HubspotClient {
    client: Client,
    api_base: Option<String>,
}

impl HubspotClient {
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

    fn object_path(object_type: ObjectType) -> Result<(&'static str, &'static [&'static str])> {
        match object_type {
            ObjectType::Contact => Ok(("contacts", CONTACT_PROPERTIES)),
            ObjectType::Company => Ok(("companies", COMPANY_PROPERTIES)),
            other => Err(Error::InvalidInput(format!("hubspot does not serve {other}"))),
        }
    }
}

const SUPPORTED: &[(Vertical, ObjectType)] = &[
    (Vertical::Crm, ObjectType::Contact),
    (Vertical::Crm, ObjectType::Company),
];

#[async_trait]
impl ProviderClient for HubspotClient {
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
        let (path, standard) = Self::object_path(object_type)?;
        let base = http::resolve_base(self.api_base.as_deref(), connection, Some(API_BASE))?;

        // Custom properties are only returned when asked for by name.
        let mut properties: Vec<String> = standard.iter().map(|s| s.to_string()).collect();
        let requested = params.custom_field_keys.iter().cloned().chain(
            params
                .extra
                .get("properties")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(|v| v.as_str().map(str::to_string)),
        );
        for key in requested {
            if !properties.contains(&key) {
                properties.push(key);
            }
        }

        let mut query = vec![
            ("limit", params.limit.unwrap_or(100).min(100).to_string()),
            ("properties", properties.join(",")),
        ];
        if let Some(after) = &params.cursor {
            query.push(("after", after.clone()));
        }

        let req = self
            .client
            .get(format!("{base}/crm/v3/objects/{path}"))
            .query(&query);
        let body = http::send_json(PROVIDER, http::bearer(req, connection)?).await?;
        http::records_at(PROVIDER, body, "results")
    }

    #[instrument(level = "info", skip(self, connection, payload), fields(connection_id = %connection.id))]
    async fn write(
        &self,
        connection: &Connection,
        object_type: ObjectType,
        payload: &Value,
    ) -> Result<Value> {
        let (path, _) = Self::object_path(object_type)?;
        let base = http::resolve_base(self.api_base.as_deref(), connection, Some(API_BASE))?;
        let req = self
            .client
            .post(format!("{base}/crm/v3/objects/{path}"))
            .json(payload);
        http::send_json(PROVIDER, http::bearer(req, connection)?).await
    }
}
