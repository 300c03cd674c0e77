use crate::error::{ItemFailure, TranslationPartialFailure};
use crate::models::{ObjectType, Vertical};
use crate::unification::custom_fields::{CustomFieldMapping, CustomFieldResolver, FieldMappings};
use crate::unification::identifiers::RemoteId;
use crate::unification::schema::{self, CanonicalInput};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Registration key of a mapper: (vertical, object type, provider slug).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapperKey {
    pub vertical: Vertical,
    pub object_type: ObjectType,
    pub provider: String,
}

impl MapperKey {
    pub fn new(vertical: Vertical, object_type: ObjectType, provider: impl AsRef<str>) -> Self {
        Self {
            vertical,
            object_type,
            provider: provider.as_ref().trim().to_ascii_lowercase(),
        }
    }

    /// "crm.contact"
    pub fn object_path(&self) -> String {
        format!("{}.{}", self.vertical, self.object_type)
    }
}

impl fmt::Display for MapperKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.vertical, self.object_type, self.provider)
    }
}

/// A single value or a list, translated with the same cardinality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// A value tagged with the position of the input it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indexed<T> {
    pub index: usize,
    pub value: T,
}

/// Per-element results of a batch: successes in input order plus failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<Indexed<T>>,
    pub failures: Vec<ItemFailure>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> BatchOutcome<T> {
    pub fn from_results(results: impl IntoIterator<Item = Result<T>>) -> Self {
        let mut out = Self::default();
        for (index, res) in results.into_iter().enumerate() {
            match res {
                Ok(value) => out.succeeded.push(Indexed { index, value }),
                Err(e) => out.failures.push(ItemFailure::from_error(index, &e)),
            }
        }
        out
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of inputs the batch covered.
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.succeeded.iter().map(|i| &i.value)
    }

    pub fn into_values(self) -> Vec<T> {
        self.succeeded.into_iter().map(|i| i.value).collect()
    }

    pub fn partial_failure(&self) -> Option<TranslationPartialFailure> {
        if self.failures.is_empty() {
            return None;
        }
        Some(TranslationPartialFailure {
            succeeded: self.succeeded.len(),
            failures: self.failures.clone(),
        })
    }

    /// All-or-nothing view for callers that cannot use partial results:
    /// every value, or `Error::PartialFailure` naming the failed indices.
    pub fn into_result(self) -> Result<Vec<T>> {
        match self.partial_failure() {
            Some(pf) => Err(Error::PartialFailure(pf)),
            None => Ok(self.into_values()),
        }
    }
}

/// Result of [`Mapper::unify`]: one entity for one record, or per-index
/// successes and failures for a list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Unification {
    One(UnifiedEntity),
    Many(BatchOutcome<UnifiedEntity>),
}

impl Unification {
    pub fn into_values(self) -> Vec<UnifiedEntity> {
        match self {
            Unification::One(entity) => vec![entity],
            Unification::Many(outcome) => outcome.into_values(),
        }
    }
}

/// Canonical representation of one business object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedEntity {
    pub remote_id: String,
    pub vertical: Vertical,
    pub object_type: ObjectType,
    pub provider: String,
    /// Canonical fields for this object type.
    pub fields: Map<String, Value>,
    /// Tenant custom fields: slug -> value.
    #[serde(default)]
    pub field_mappings: FieldMappings,
    /// The provider record this entity was unified from.
    #[serde(default)]
    pub remote_data: Value,
}

impl UnifiedEntity {
    pub fn new<O: Serialize>(
        key: &MapperKey,
        remote_id: RemoteId,
        output: &O,
        field_mappings: FieldMappings,
        remote_data: Value,
    ) -> Result<Self> {
        let fields = match serde_json::to_value(output)
            .map_err(|e| Error::backend("serialize unified output", e))?
        {
            Value::Object(map) => map,
            other => {
                return Err(Error::InvalidInput(format!(
                    "{key}: unified output must be an object, got {other}"
                )));
            }
        };
        Ok(Self {
            remote_id: remote_id.into_string(),
            vertical: key.vertical,
            object_type: key.object_type,
            provider: key.provider.clone(),
            fields,
            field_mappings,
            remote_data,
        })
    }

    pub fn key(&self) -> MapperKey {
        MapperKey::new(self.vertical, self.object_type, &self.provider)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_str())
    }

    /// Reads the canonical fields back into a typed output struct.
    pub fn parse_fields<O: DeserializeOwned>(&self) -> Result<O> {
        serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|e| Error::backend("parse unified fields", e))
    }

    /// Flat API shape: canonical fields plus `remote_id`, `field_mappings`, `remote_data`.
    pub fn to_json(&self) -> Value {
        let mut out = self.fields.clone();
        out.insert("remote_id".to_string(), Value::String(self.remote_id.clone()));
        out.insert(
            "field_mappings".to_string(),
            serde_json::to_value(&self.field_mappings).unwrap_or(Value::Null),
        );
        out.insert("remote_data".to_string(), self.remote_data.clone());
        Value::Object(out)
    }
}

/// Result of unifying one typed provider record.
#[derive(Debug, Clone, PartialEq)]
pub struct Unified<O> {
    pub remote_id: RemoteId,
    pub output: O,
    pub field_mappings: FieldMappings,
}

/// Typed translation unit for one (vertical, object type, provider).
///
/// Implementations only see parsed, validated canonical input and a parsed
/// provider record; [`desunify_with`] and [`unify_with`] handle the JSON edges.
pub trait ObjectMapper: Send + Sync {
    type Input: CanonicalInput;
    type Output: Serialize;
    type Remote: DeserializeOwned;

    fn key(&self) -> MapperKey;

    /// Canonical input -> exact provider write payload.
    fn desunify(&self, input: Self::Input, custom_fields: &CustomFieldResolver) -> Result<Value>;

    /// Provider record -> canonical output. `raw` is the untyped record, used
    /// for custom-field lookups.
    fn unify(
        &self,
        remote: Self::Remote,
        raw: &Value,
        custom_fields: &CustomFieldResolver,
    ) -> Result<Unified<Self::Output>>;
}

pub fn desunify_with<M: ObjectMapper + ?Sized>(
    mapper: &M,
    input: &Value,
    custom_fields: &[CustomFieldMapping],
) -> Result<Value> {
    let key = mapper.key();
    let parsed = schema::parse_input::<M::Input>(input)?;
    let resolver = CustomFieldResolver::for_provider(&key.provider, custom_fields);
    mapper.desunify(parsed, &resolver)
}

pub fn unify_with<M: ObjectMapper + ?Sized>(
    mapper: &M,
    record: &Value,
    custom_fields: &[CustomFieldMapping],
) -> Result<UnifiedEntity> {
    let key = mapper.key();
    let remote: M::Remote = serde_json::from_value(record.clone()).map_err(|e| {
        Error::InvalidInput(format!("{key}: provider record does not match schema: {e}"))
    })?;
    let resolver = CustomFieldResolver::for_provider(&key.provider, custom_fields);
    let unified = mapper.unify(remote, record, &resolver)?;
    UnifiedEntity::new(
        &key,
        unified.remote_id,
        &unified.output,
        unified.field_mappings,
        record.clone(),
    )
}

/// Type-erased translation contract the registry and orchestrator work with.
pub trait Mapper: Send + Sync {
    fn key(&self) -> MapperKey;

    /// Pure, synchronous canonical -> provider transform. Missing required
    /// canonical fields fail with `Error::Validation` naming the field.
    fn desunify(&self, input: &Value, custom_fields: &[CustomFieldMapping]) -> Result<Value>;

    fn unify_record(
        &self,
        record: &Value,
        custom_fields: &[CustomFieldMapping],
    ) -> Result<UnifiedEntity>;

    /// Single in, single out; list in, list out (same order, one-to-one).
    /// A list never fails as a whole: bad records come back as indexed
    /// failures next to the entities that did translate.
    fn unify(
        &self,
        source: OneOrMany<Value>,
        custom_fields: &[CustomFieldMapping],
    ) -> Result<Unification> {
        match source {
            OneOrMany::One(record) => self
                .unify_record(&record, custom_fields)
                .map(Unification::One),
            OneOrMany::Many(records) => Ok(Unification::Many(
                self.unify_batch(&records, custom_fields),
            )),
        }
    }

    /// Element conversions are independent; one bad record does not affect the rest.
    fn unify_batch(
        &self,
        records: &[Value],
        custom_fields: &[CustomFieldMapping],
    ) -> BatchOutcome<UnifiedEntity> {
        BatchOutcome::from_results(records.iter().map(|r| self.unify_record(r, custom_fields)))
    }

    fn desunify_batch(
        &self,
        inputs: &[Value],
        custom_fields: &[CustomFieldMapping],
    ) -> BatchOutcome<Value> {
        BatchOutcome::from_results(inputs.iter().map(|i| self.desunify(i, custom_fields)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unification::schema::require;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct NoteInput {
        title: Option<String>,
        #[serde(default)]
        field_mappings: FieldMappings,
    }

    impl CanonicalInput for NoteInput {
        fn validate(&self) -> Result<()> {
            require(&self.title, "title")?;
            Ok(())
        }
    }

    #[derive(Debug, Serialize)]
    struct NoteOutput {
        title: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    struct RemoteNote {
        id: RemoteId,
        heading: Option<String>,
    }

    struct NoteMapper;

    impl ObjectMapper for NoteMapper {
        type Input = NoteInput;
        type Output = NoteOutput;
        type Remote = RemoteNote;

        fn key(&self) -> MapperKey {
            MapperKey::new(Vertical::Crm, ObjectType::Comment, "acme")
        }

        fn desunify(&self, input: NoteInput, cf: &CustomFieldResolver) -> Result<Value> {
            let mut out = Map::new();
            out.insert("heading".into(), json!(input.title));
            cf.merge_into(&input.field_mappings, &mut out);
            Ok(Value::Object(out))
        }

        fn unify(
            &self,
            remote: RemoteNote,
            raw: &Value,
            cf: &CustomFieldResolver,
        ) -> Result<Unified<NoteOutput>> {
            Ok(Unified {
                remote_id: remote.id,
                output: NoteOutput {
                    title: remote.heading,
                },
                field_mappings: cf.to_canonical(raw),
            })
        }
    }

    impl Mapper for NoteMapper {
        fn key(&self) -> MapperKey {
            ObjectMapper::key(self)
        }

        fn desunify(&self, input: &Value, cf: &[CustomFieldMapping]) -> Result<Value> {
            desunify_with(self, input, cf)
        }

        fn unify_record(&self, record: &Value, cf: &[CustomFieldMapping]) -> Result<UnifiedEntity> {
            unify_with(self, record, cf)
        }
    }

    #[test]
    fn unify_preserves_single_cardinality() {
        let out = Mapper::unify(
            &NoteMapper,
            OneOrMany::One(json!({ "id": 9, "heading": "hi" })),
            &[],
        )
        .unwrap();
        let Unification::One(entity) = out else {
            panic!("expected single output");
        };
        assert_eq!(entity.remote_id, "9");
        assert_eq!(entity.field_str("title"), Some("hi"));
        assert_eq!(entity.remote_data["heading"], json!("hi"));
    }

    #[test]
    fn unify_preserves_list_order_and_length() {
        let records: Vec<Value> = (0..5)
            .map(|i| json!({ "id": i, "heading": format!("n{i}") }))
            .collect();
        let out = Mapper::unify(&NoteMapper, OneOrMany::Many(records), &[]).unwrap();
        let Unification::Many(outcome) = out else {
            panic!("expected list output");
        };
        assert!(outcome.is_complete());
        let entities = outcome.into_values();
        assert_eq!(entities.len(), 5);
        for (i, e) in entities.iter().enumerate() {
            assert_eq!(e.remote_id, i.to_string());
            assert_eq!(e.field_str("title"), Some(format!("n{i}").as_str()));
        }
    }

    #[test]
    fn batch_isolates_bad_records() {
        let records = vec![
            json!({ "id": 1, "heading": "a" }),
            json!({ "heading": "missing id" }),
            json!({ "id": "3", "heading": "c" }),
        ];
        let outcome = NoteMapper.unify_batch(&records, &[]);
        assert_eq!(outcome.len(), 3);
        let ids: Vec<_> = outcome.succeeded.iter().map(|s| s.index).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].index, 1);

        let out = Mapper::unify(&NoteMapper, OneOrMany::Many(records.clone()), &[]).unwrap();
        let Unification::Many(outcome) = out else {
            panic!("expected list output");
        };
        assert_eq!(outcome.succeeded[0].index, 0);
        assert_eq!(outcome.succeeded[0].value.remote_id, "1");
        assert_eq!(outcome.succeeded[1].index, 2);
        assert_eq!(outcome.succeeded[1].value.field_str("title"), Some("c"));
        assert_eq!(outcome.failures[0].index, 1);
        assert!(outcome.failures[0].reason.contains("id"));

        let err = NoteMapper.unify_batch(&records, &[]).into_result().unwrap_err();
        let Error::PartialFailure(pf) = err else {
            panic!("expected partial failure");
        };
        assert_eq!(pf.succeeded, 2);
        assert_eq!(pf.failures[0].index, 1);
    }

    #[test]
    fn desunify_reports_missing_required_field() {
        let err = Mapper::desunify(&NoteMapper, &json!({}), &[]).unwrap_err();
        assert_eq!(err.field(), Some("title"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn desunify_batch_collects_failures_by_index() {
        let outcome = NoteMapper.desunify_batch(
            &[json!({ "title": "a" }), json!({ "title": " " }), json!([])],
            &[],
        );
        assert_eq!(outcome.succeeded.len(), 1);
        let failed: Vec<_> = outcome.failures.iter().map(|f| f.index).collect();
        assert_eq!(failed, vec![1, 2]);
    }

    #[test]
    fn to_json_flattens_entity() {
        let entity = NoteMapper
            .unify_record(&json!({ "id": "n1", "heading": "x" }), &[])
            .unwrap();
        let flat = entity.to_json();
        assert_eq!(flat["remote_id"], json!("n1"));
        assert_eq!(flat["title"], json!("x"));
        assert_eq!(flat["field_mappings"], json!({}));
    }

    #[test]
    fn key_normalizes_provider() {
        let key = MapperKey::new(Vertical::Ticketing, ObjectType::Ticket, " Gorgias ");
        assert_eq!(key.to_string(), "ticketing.ticket.gorgias");
        assert_eq!(key.object_path(), "ticketing.ticket");
    }
}
