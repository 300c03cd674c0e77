use crate::models::{ObjectType, Vertical};
use crate::unification::mapper::{Mapper, MapperKey};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Collects mapper registrations before the registry is frozen.
#[derive(Default)]
pub struct MapperRegistryBuilder {
    mappers: BTreeMap<MapperKey, Arc<dyn Mapper>>,
}

impl MapperRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `mapper` under an explicit triple. A second registration for
    /// the same triple replaces the first.
    pub fn register(
        mut self,
        vertical: Vertical,
        object_type: ObjectType,
        provider: &str,
        mapper: Arc<dyn Mapper>,
    ) -> Self {
        let key = MapperKey::new(vertical, object_type, provider);
        if self.mappers.insert(key.clone(), mapper).is_some() {
            tracing::debug!(%key, "mapper re-registered; previous registration replaced");
        }
        self
    }

    /// Registers `mapper` under the triple it declares.
    pub fn register_mapper(self, mapper: Arc<dyn Mapper>) -> Self {
        let key = mapper.key();
        self.register(key.vertical, key.object_type, &key.provider, mapper)
    }

    pub fn build(self) -> MapperRegistry {
        tracing::debug!(mappers = self.mappers.len(), "mapper registry built");
        MapperRegistry {
            mappers: Arc::new(self.mappers),
        }
    }
}

/// Frozen (vertical, object type, provider) -> mapper directory.
///
/// Cheap to clone; clones share the same map.
#[derive(Clone, Default)]
pub struct MapperRegistry {
    mappers: Arc<BTreeMap<MapperKey, Arc<dyn Mapper>>>,
}

impl std::fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapperRegistry")
            .field("keys", &self.mappers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MapperRegistry {
    pub fn builder() -> MapperRegistryBuilder {
        MapperRegistryBuilder::new()
    }

    pub fn resolve(
        &self,
        vertical: Vertical,
        object_type: ObjectType,
        provider: &str,
    ) -> Result<Arc<dyn Mapper>> {
        let key = MapperKey::new(vertical, object_type, provider);
        self.mappers.get(&key).cloned().ok_or_else(|| {
            Error::Configuration(format!("no mapper registered for {key}"))
        })
    }

    pub fn contains(&self, vertical: Vertical, object_type: ObjectType, provider: &str) -> bool {
        self.mappers
            .contains_key(&MapperKey::new(vertical, object_type, provider))
    }

    /// Registered triples in sorted order.
    pub fn keys(&self) -> Vec<MapperKey> {
        self.mappers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}
