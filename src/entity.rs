//! Entities and the entity registry
//!
//! An entity is a physical device or node owning one or more sensor series.
//! Raw entities keep every sample; aggregating entities keep only the
//! EWMA-emitted samples (see [`crate::ewma`]).
//!
//! The [`EntityRegistry`] is an arena: entities live in a vector and are
//! addressed by an opaque [`EntityId`], with a separate map from the textual
//! device id to that index.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DriftError, Result};
use crate::ewma::{DownsampleConfig, EwmaDownsampler};
use crate::series::Timestamp;
use crate::store::TimeSeriesStore;

/// Which kind of entity the registry creates on first sight of an id
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityKind {
    /// Store every ingested sample verbatim
    #[default]
    Raw,
    /// Store only EWMA-emitted samples
    Aggregating {
        #[serde(flatten)]
        downsample: DownsampleConfig,
    },
}

impl EntityKind {
    /// Aggregating entity with the given window and alpha
    pub fn aggregating(window: u32, alpha: f64) -> Self {
        Self::Aggregating {
            downsample: DownsampleConfig::new(window, alpha),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Raw => Ok(()),
            Self::Aggregating { downsample } => downsample.validate(),
        }
    }
}

/// A device or node
#[derive(Debug, Clone)]
pub enum Entity {
    Raw(TimeSeriesStore),
    Aggregating(EwmaDownsampler),
}

impl Entity {
    /// Create an entity of the given kind
    pub fn new(id: impl Into<String>, kind: EntityKind) -> Result<Self> {
        match kind {
            EntityKind::Raw => Ok(Self::Raw(TimeSeriesStore::new(id))),
            EntityKind::Aggregating { downsample } => {
                Ok(Self::Aggregating(EwmaDownsampler::new(id, downsample)?))
            }
        }
    }

    /// Ingest one sample
    pub fn add(&mut self, sensor_id: &str, timestamp: Timestamp, value: f64) {
        match self {
            Self::Raw(store) => store.add(sensor_id, timestamp, value),
            Self::Aggregating(downsampler) => {
                downsampler.add(sensor_id, timestamp, value);
            }
        }
    }

    /// Stored series (raw or smoothed)
    pub fn store(&self) -> &TimeSeriesStore {
        match self {
            Self::Raw(store) => store,
            Self::Aggregating(downsampler) => downsampler.store(),
        }
    }

    pub fn id(&self) -> &str {
        self.store().entity_id()
    }

    pub fn is_aggregating(&self) -> bool {
        matches!(self, Self::Aggregating(_))
    }
}

/// Opaque index of an entity inside an [`EntityRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(usize);

impl EntityId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Arena of entities with id lookup
#[derive(Debug, Clone)]
pub struct EntityRegistry {
    kind: EntityKind,
    entities: Vec<Entity>,
    index: HashMap<String, EntityId>,
}

impl EntityRegistry {
    /// Create an empty registry creating entities of `kind`
    pub fn new(kind: EntityKind) -> Result<Self> {
        kind.validate()?;
        Ok(Self {
            kind,
            entities: Vec::new(),
            index: HashMap::new(),
        })
    }

    /// Registry of raw entities
    pub fn raw() -> Self {
        Self {
            kind: EntityKind::Raw,
            entities: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Route a sample to its entity, creating the entity if unseen
    pub fn add(
        &mut self,
        entity_id: &str,
        sensor_id: &str,
        timestamp: Timestamp,
        value: f64,
    ) -> Result<EntityId> {
        let id = self.get_or_insert(entity_id)?;
        self.entities[id.0].add(sensor_id, timestamp, value);
        Ok(id)
    }

    fn get_or_insert(&mut self, entity_id: &str) -> Result<EntityId> {
        if let Some(id) = self.index.get(entity_id) {
            return Ok(*id);
        }
        let id = EntityId(self.entities.len());
        self.entities.push(Entity::new(entity_id, self.kind)?);
        self.index.insert(entity_id.to_string(), id);
        log::debug!("registered entity {} as {}", entity_id, id);
        Ok(id)
    }

    /// Exact id lookup
    pub fn lookup(&self, entity_id: &str) -> Option<EntityId> {
        self.index.get(entity_id).copied()
    }

    /// First entity (in registration order) whose id ends with `suffix`
    pub fn find_by_suffix(&self, suffix: &str) -> Option<EntityId> {
        self.entities
            .iter()
            .position(|e| e.id().ends_with(suffix))
            .map(EntityId)
    }

    /// Get an entity by index
    pub fn get(&self, id: EntityId) -> Result<&Entity> {
        self.entities
            .get(id.0)
            .ok_or_else(|| DriftError::NotFound(format!("entity {}", id)))
    }

    /// Get an entity by its textual id
    pub fn by_name(&self, entity_id: &str) -> Result<&Entity> {
        let id = self
            .lookup(entity_id)
            .ok_or_else(|| DriftError::NotFound(format!("entity '{}'", entity_id)))?;
        self.get(id)
    }

    /// Iterate over entities in registration order
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(i, e)| (EntityId(i), e))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::from_epoch_secs;

    fn ts(secs: i64) -> Timestamp {
        from_epoch_secs(secs).unwrap()
    }

    #[test]
    fn test_entities_created_on_first_sample() {
        let mut registry = EntityRegistry::raw();
        let a = registry.add("f6ce368d7563b285", "T", ts(0), 1.0).unwrap();
        let b = registry.add("f6ce36f0118e6361", "T", ts(0), 2.0).unwrap();
        let a2 = registry.add("f6ce368d7563b285", "T", ts(1), 3.0).unwrap();

        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(a).unwrap().store().sample_count(), 2);
    }

    #[test]
    fn test_lookup_and_suffix() {
        let mut registry = EntityRegistry::raw();
        registry.add("f6ce368d7563b285", "T", ts(0), 1.0).unwrap();
        registry.add("f6ce368f8d612db5", "T", ts(0), 1.0).unwrap();

        assert_eq!(registry.lookup("f6ce368f8d612db5").unwrap().index(), 1);
        assert!(registry.lookup("b5").is_none());
        assert_eq!(registry.find_by_suffix("b5").unwrap().index(), 1);
        assert_eq!(registry.find_by_suffix("85").unwrap().index(), 0);
        assert!(registry.find_by_suffix("zz").is_none());
    }

    #[test]
    fn test_aggregating_registry() {
        let mut registry = EntityRegistry::new(EntityKind::aggregating(0, 0.5)).unwrap();
        registry.add("d1", "T", ts(0), 10.0).unwrap();
        registry.add("d1", "T", ts(1), 20.0).unwrap();

        let entity = registry.by_name("d1").unwrap();
        assert!(entity.is_aggregating());
        let (_, values) = entity.store().ordered("T").unwrap();
        assert_eq!(values, vec![10.0, 15.0]);
    }

    #[test]
    fn test_invalid_kind_rejected() {
        let result = EntityRegistry::new(EntityKind::aggregating(10, 0.0));
        assert!(matches!(result, Err(DriftError::InvalidConfig(_))));
    }

    #[test]
    fn test_unknown_entity() {
        let registry = EntityRegistry::raw();
        assert!(matches!(
            registry.by_name("nope"),
            Err(DriftError::NotFound(_))
        ));
    }

    #[test]
    fn test_kind_serialization() {
        let kind = EntityKind::aggregating(100, 0.7);
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"kind\":\"aggregating\""));
        let parsed: EntityKind = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, kind);

        let raw: EntityKind = serde_json::from_str(r#"{"kind":"raw"}"#).unwrap();
        assert_eq!(raw, EntityKind::Raw);
    }
}
