//! Translation between provider-native records and the canonical schema.
//!
//! - [`custom_fields`] resolves tenant-defined slugs to provider field keys
//! - [`mapper`] defines the per-(vertical, object, provider) translation contract
//! - [`registry`] freezes the set of mappers available to the orchestrator
//! - [`schema`] holds the canonical input/output shapes per object type

pub mod custom_fields;
pub mod identifiers;
pub mod mapper;
pub mod registry;
pub mod schema;

pub use custom_fields::{CustomFieldMapping, CustomFieldResolver, FieldDataType, FieldMappings};
pub use identifiers::RemoteId;
pub use mapper::{
    BatchOutcome, Indexed, Mapper, MapperKey, ObjectMapper, OneOrMany, Unification, Unified,
    UnifiedEntity,
};
pub use registry::{MapperRegistry, MapperRegistryBuilder};
