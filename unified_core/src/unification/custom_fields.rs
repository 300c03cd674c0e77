use crate::models::{ObjectType, ProjectId, Vertical};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Tenant custom data carried on a unified entity: slug -> value.
pub type FieldMappings = BTreeMap<String, Value>;

/// Declared value type of a custom field. Applied best-effort when reading
/// provider data; values that do not coerce are passed through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldDataType {
    String,
    Number,
    Boolean,
    Date,
    Json,
}

impl FieldDataType {
    pub fn coerce(self, value: Value) -> Value {
        match (self, value) {
            (FieldDataType::String, Value::Number(n)) => Value::String(n.to_string()),
            (FieldDataType::String, Value::Bool(b)) => Value::String(b.to_string()),
            (FieldDataType::Number, Value::String(s)) => {
                if let Ok(i) = s.trim().parse::<i64>() {
                    Value::from(i)
                } else if let Some(n) = s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                {
                    Value::Number(n)
                } else {
                    Value::String(s)
                }
            }
            (FieldDataType::Boolean, Value::String(s)) => {
                match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "1" => Value::Bool(true),
                    "false" | "no" | "0" => Value::Bool(false),
                    _ => Value::String(s),
                }
            }
            (FieldDataType::Date, Value::Number(n)) => n
                .as_i64()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .map(|dt| Value::String(dt.to_rfc3339()))
                .unwrap_or(Value::Number(n)),
            (_, other) => other,
        }
    }
}

/// A tenant's mapping from a canonical slug to a provider-native field key.
///
/// Scoped to (project, vertical, object type, provider); the slug is unique
/// within that scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldMapping {
    pub id: Uuid,
    pub project_id: ProjectId,
    pub vertical: Vertical,
    pub object_type: ObjectType,
    pub provider: String,
    pub slug: String,
    pub remote_field_key: String,
    #[serde(default)]
    pub data_type: Option<FieldDataType>,
    pub created_at: DateTime<Utc>,
}

impl CustomFieldMapping {
    pub fn new(
        project_id: ProjectId,
        vertical: Vertical,
        object_type: ObjectType,
        provider: impl Into<String>,
        slug: impl Into<String>,
        remote_field_key: impl Into<String>,
    ) -> Result<Self> {
        let provider = provider.into().trim().to_ascii_lowercase();
        if provider.is_empty() {
            return Err(Error::InvalidInput("custom field provider is empty".to_string()));
        }
        let slug = slug.into();
        if slug.trim().is_empty() {
            return Err(Error::InvalidInput("custom field slug is empty".to_string()));
        }
        let remote_field_key = remote_field_key.into();
        if remote_field_key.trim().is_empty() {
            return Err(Error::InvalidInput(
                "custom field remote_field_key is empty".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            project_id,
            vertical,
            object_type,
            provider,
            slug,
            remote_field_key,
            data_type: None,
            created_at: Utc::now(),
        })
    }

    pub fn with_data_type(mut self, data_type: FieldDataType) -> Self {
        self.data_type = Some(data_type);
        self
    }
}

/// Reads `record[remote_field_key]` for every mapping. Missing and `null`
/// values are omitted rather than emitted as placeholders.
pub fn to_canonical(record: &Value, mappings: &[CustomFieldMapping]) -> FieldMappings {
    let mut out = FieldMappings::new();
    for m in mappings {
        let Some(value) = record.get(&m.remote_field_key) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let value = match m.data_type {
            Some(dt) => dt.coerce(value.clone()),
            None => value.clone(),
        };
        out.insert(m.slug.clone(), value);
    }
    out
}

/// Inverse of [`to_canonical`]. Slugs with no mapping are dropped silently.
pub fn to_provider(fields: &FieldMappings, mappings: &[CustomFieldMapping]) -> Map<String, Value> {
    let mut out = Map::new();
    for m in mappings {
        if let Some(value) = fields.get(&m.slug) {
            out.insert(m.remote_field_key.clone(), value.clone());
        }
    }
    out
}

/// The subset of a tenant's mappings that applies to one provider.
#[derive(Debug, Clone)]
pub struct CustomFieldResolver {
    mappings: Vec<CustomFieldMapping>,
}

impl CustomFieldResolver {
    pub fn for_provider(provider: &str, mappings: &[CustomFieldMapping]) -> Self {
        let provider = provider.trim().to_ascii_lowercase();
        Self {
            mappings: mappings
                .iter()
                .filter(|m| m.provider == provider)
                .cloned()
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn to_canonical(&self, record: &Value) -> FieldMappings {
        to_canonical(record, &self.mappings)
    }

    pub fn to_provider(&self, fields: &FieldMappings) -> Map<String, Value> {
        to_provider(fields, &self.mappings)
    }

    /// Merges the provider-side custom fields into `target` without
    /// overwriting keys the mapper already set.
    pub fn merge_into(&self, fields: &FieldMappings, target: &mut Map<String, Value>) {
        for (k, v) in self.to_provider(fields) {
            target.entry(k).or_insert(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(provider: &str, slug: &str, remote: &str) -> CustomFieldMapping {
        CustomFieldMapping::new(
            ProjectId::new(),
            Vertical::Crm,
            ObjectType::Contact,
            provider,
            slug,
            remote,
        )
        .unwrap()
    }

    #[test]
    fn to_canonical_reads_present_keys_only() {
        let mappings = vec![
            mapping("hubspot", "favorite_color", "favoriteColor"),
            mapping("hubspot", "shoe_size", "shoeSize"),
            mapping("hubspot", "nickname", "nickName"),
        ];
        let record = json!({ "favoriteColor": "blue", "nickName": null });
        let out = to_canonical(&record, &mappings);
        assert_eq!(out.len(), 1);
        assert_eq!(out.get("favorite_color"), Some(&json!("blue")));
        assert!(!out.contains_key("shoe_size"));
        assert!(!out.contains_key("nickname"));
    }

    #[test]
    fn to_provider_drops_unknown_slugs() {
        let mappings = vec![mapping("hubspot", "favorite_color", "favoriteColor")];
        let mut fields = FieldMappings::new();
        fields.insert("favorite_color".into(), json!("blue"));
        fields.insert("unmapped".into(), json!(1));
        let out = to_provider(&fields, &mappings);
        assert_eq!(Value::Object(out), json!({ "favoriteColor": "blue" }));
    }

    #[test]
    fn mapping_without_input_value_emits_nothing() {
        let mappings = vec![mapping("hubspot", "favorite_color", "favoriteColor")];
        let out = to_provider(&FieldMappings::new(), &mappings);
        assert!(out.is_empty());
    }

    #[test]
    fn resolver_ignores_other_providers() {
        let mappings = vec![
            mapping("hubspot", "favorite_color", "favoriteColor"),
            mapping("pipedrive", "favorite_color", "a1b2c3"),
        ];
        let resolver = CustomFieldResolver::for_provider("Pipedrive", &mappings);
        let out = resolver.to_canonical(&json!({ "favoriteColor": "red", "a1b2c3": "green" }));
        assert_eq!(out.get("favorite_color"), Some(&json!("green")));
    }

    #[test]
    fn merge_does_not_clobber_mapper_fields() {
        let mappings = vec![mapping("hubspot", "first", "firstname")];
        let resolver = CustomFieldResolver::for_provider("hubspot", &mappings);
        let mut fields = FieldMappings::new();
        fields.insert("first".into(), json!("custom"));
        let mut target = Map::new();
        target.insert("firstname".into(), json!("Ada"));
        resolver.merge_into(&fields, &mut target);
        assert_eq!(target.get("firstname"), Some(&json!("Ada")));
    }

    #[test]
    fn declared_types_coerce_best_effort() {
        assert_eq!(FieldDataType::Number.coerce(json!("42")), json!(42));
        assert_eq!(FieldDataType::Number.coerce(json!("4.5")), json!(4.5));
        assert_eq!(FieldDataType::Number.coerce(json!("n/a")), json!("n/a"));
        assert_eq!(FieldDataType::Boolean.coerce(json!("true")), json!(true));
        assert_eq!(FieldDataType::String.coerce(json!(7)), json!("7"));
        assert_eq!(
            FieldDataType::Date.coerce(json!(0)),
            json!("1970-01-01T00:00:00+00:00")
        );
        assert_eq!(FieldDataType::Json.coerce(json!({"a": 1})), json!({"a": 1}));
    }

    #[test]
    fn empty_slug_is_rejected() {
        assert!(CustomFieldMapping::new(
            ProjectId::new(),
            Vertical::Crm,
            ObjectType::Contact,
            "hubspot",
            " ",
            "x"
        )
        .is_err());
    }
}
