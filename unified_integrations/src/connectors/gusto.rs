//! Gusto company benefits as HRIS benefits.
//!
//! Gusto identifies benefit kinds by integer `benefit_type` codes and returns
//! money amounts as decimal strings.

use crate::http;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::instrument;
use unified_core::models::{Connection, ObjectType, Vertical};
use unified_core::sync::{FetchParams, ProviderClient};
use unified_core::unification::schema::hris::{UnifiedHrisBenefitInput, UnifiedHrisBenefitOutput};
use unified_core::unification::{CustomFieldResolver, MapperKey, ObjectMapper, RemoteId, Unified};
use unified_core::{Error, Result};

pub const PROVIDER: &str = "gusto";
const API_BASE: &str = "https://api.gusto.com";
const OTHER: &str = "OTHER";

const BENEFIT_TYPES: &[(i64, &str)] = &[
    (1, "MEDICAL"),
    (2, "DENTAL"),
    (3, "VISION"),
    (5, "HSA"),
    (6, "FSA"),
    (7, "DEPENDENT_CARE_FSA"),
    (105, "ROTH_401K"),
];

pub fn plan_type_for_code(code: i64) -> &'static str {
    BENEFIT_TYPES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or(OTHER)
}

pub fn code_for_plan_type(plan_type: &str) -> Option<i64> {
    BENEFIT_TYPES
        .iter()
        .find(|(_, name)| name.eq_ignore_ascii_case(plan_type.trim()))
        .map(|(code, _)| *code)
}

#[derive(Debug, Deserialize)]
pub struct GustoCompanyBenefit {
    #[serde(default)]
    pub uuid: Option<RemoteId>,
    /// Legacy numeric id, still returned next to `uuid`.
    #[serde(default)]
    pub id: Option<RemoteId>,
    #[serde(default)]
    pub benefit_type: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub employee_uuid: Option<String>,
    #[serde(default)]
    pub employee_deduction: Option<String>,
    #[serde(default)]
    pub company_contribution: Option<String>,
}

fn amount(field: &str, value: Option<&str>) -> Result<Option<f64>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v
            .parse::<f64>()
            .map(Some)
            .map_err(|_| Error::invalid_field(field, format!("gusto amount is not a number: {v:?}"))),
        None => Ok(None),
    }
}

pub struct GustoBenefitMapper;

impl ObjectMapper for GustoBenefitMapper {
    type Input = UnifiedHrisBenefitInput;
    type Output = UnifiedHrisBenefitOutput;
    type Remote = GustoCompanyBenefit;

    fn key(&self) -> MapperKey {
        MapperKey::new(Vertical::Hris, ObjectType::Benefit, PROVIDER)
    }

    fn desunify(&self, input: UnifiedHrisBenefitInput, cf: &CustomFieldResolver) -> Result<Value> {
        let plan_type = input.benefit_plan_type.as_deref().unwrap_or(OTHER);
        let code = code_for_plan_type(plan_type).ok_or_else(|| {
            Error::invalid_field(
                "benefit_plan_type",
                format!("gusto has no benefit type for {plan_type:?}"),
            )
        })?;

        let mut out = Map::new();
        out.insert("benefit_type".to_string(), json!(code));
        out.insert("description".to_string(), json!(input.provider_name));
        out.insert("active".to_string(), json!(input.end_date.is_none()));
        cf.merge_into(&input.field_mappings, &mut out);
        Ok(Value::Object(out))
    }

    fn unify(
        &self,
        remote: GustoCompanyBenefit,
        raw: &Value,
        cf: &CustomFieldResolver,
    ) -> Result<Unified<UnifiedHrisBenefitOutput>> {
        let remote_id = remote
            .uuid
            .or(remote.id)
            .ok_or_else(|| Error::missing_field("uuid"))?;
        let output = UnifiedHrisBenefitOutput {
            provider_name: remote.description,
            employee_id: remote.employee_uuid,
            benefit_plan_type: Some(
                remote
                    .benefit_type
                    .map(plan_type_for_code)
                    .unwrap_or(OTHER)
                    .to_string(),
            ),
            employee_contribution: amount(
                "employee_contribution",
                remote.employee_deduction.as_deref(),
            )?,
            company_contribution: amount(
                "company_contribution",
                remote.company_contribution.as_deref(),
            )?,
            start_date: None,
            end_date: None,
        };
        Ok(Unified {
            remote_id,
            output,
            field_mappings: cf.to_canonical(raw),
        })
    }
}

#[derive(Clone)]
pub struct GustoClient {
    client: Client,
    api_base: Option<String>,
}

impl GustoClient {
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

    fn benefits_url(&self, connection: &Connection, object_type: ObjectType) -> Result<String> {
        if object_type != ObjectType::Benefit {
            return Err(Error::InvalidInput(format!(
                "gusto does not serve {object_type}"
            )));
        }
        let base = http::resolve_base(self.api_base.as_deref(), connection, Some(API_BASE))?;
        let company = connection.credentials.require_str("company_id")?;
        Ok(format!("{base}/v1/companies/{company}/company_benefits"))
    }
}

const SUPPORTED: &[(Vertical, ObjectType)] = &[(Vertical::Hris, ObjectType::Benefit)];

#[async_trait]
impl ProviderClient for GustoClient {
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
        let url = self.benefits_url(connection, object_type)?;
        let mut query = vec![("per", params.limit.unwrap_or(100).to_string())];
        if let Some(page) = &params.cursor {
            query.push(("page", page.clone()));
        }
        let req = self.client.get(url).query(&query);
        let body = http::send_json(PROVIDER, http::bearer(req, connection)?).await?;
        // Gusto lists are bare arrays.
        http::records_at(PROVIDER, body, "company_benefits")
    }

    #[instrument(level = "info", skip(self, connection, payload), fields(connection_id = %connection.id))]
    async fn write(
        &self,
        connection: &Connection,
        object_type: ObjectType,
        payload: &Value,
    ) -> Result<Value> {
        let url = self.benefits_url(connection, object_type)?;
        let req = self.client.post(url).json(payload);
        http::send_json(PROVIDER, http::bearer(req, connection)?).await
    }
}
