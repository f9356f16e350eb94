//! WorldModel - arena holding the entities and factors of the map graph.
//!
//! Entities and factors live in flat stores keyed by [`Id`]. The base-frame
//! relation of relative entities is a parent id into the same store; since a
//! base must already exist when an entity is inserted and is never changed
//! afterwards, the relation is always a forest.
//!
//! Front-ends insert, the back-end reads factors through their edge contract
//! and writes entity values back. Global poses are composed on demand along
//! the base chain and memoised; every value update or removal clears the
//! memo, so a composed pose is never older than the last back-end update.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::{Result, WorldModelError};
use crate::geometry::SE3;

use super::entities::{Entity, EntityValue};
use super::factors::{Factor, FactorBase};
use super::types::{Id, IdAllocator};

/// World model shared between front-ends, back-end and viewers.
///
/// One write lock covers a whole entity value update, so readers never see a
/// pose from one update paired with a twist from another.
pub type SharedWorldModel = Arc<RwLock<WorldModel>>;

#[derive(Debug, Clone)]
struct EntityRecord {
    entity: Entity,
    /// Entity whose frame this entity's value is expressed in. None for roots.
    base: Option<Id>,
}

/// The map graph.
pub struct WorldModel {
    entities: HashMap<Id, EntityRecord>,

    factors: HashMap<Id, Factor>,

    /// Entity → factors touching it.
    adjacency: HashMap<Id, BTreeSet<Id>>,

    /// Shared id space for entities and factors.
    ids: IdAllocator,

    /// Memoised global poses. Cleared on any value change or removal.
    pose_cache: Mutex<HashMap<Id, SE3>>,
}

impl WorldModel {
    /// Create a new empty WorldModel.
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            factors: HashMap::new(),
            adjacency: HashMap::new(),
            ids: IdAllocator::new(),
            pose_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Wrap into a lock for sharing between threads.
    pub fn into_shared(self) -> SharedWorldModel {
        Arc::new(RwLock::new(self))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entity Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert an entity, optionally relative to an existing `base` entity.
    ///
    /// Returns the id assigned to the new entity.
    pub fn insert_entity(&mut self, entity: impl Into<Entity>, base: Option<Id>) -> Result<Id> {
        let entity = entity.into();

        if let Some(base_id) = base {
            if !base_id.is_valid() {
                return Err(WorldModelError::InvalidId("base entity"));
            }
            let base_record = self
                .entities
                .get(&base_id)
                .ok_or(WorldModelError::UnknownEntity(base_id))?;
            if base_record.entity.value().is_none() {
                return Err(WorldModelError::NotRelative(base_id));
            }
            if !entity.is_relative() {
                return Err(WorldModelError::KindMismatch(
                    "base given for an entity without relative state",
                ));
            }
        }

        let id = self.ids.allocate();
        debug!(
            "Inserted entity {} (keyframe={}, base={:?})",
            id,
            entity.is_keyframe(),
            base
        );
        self.entities.insert(id, EntityRecord { entity, base });
        Ok(id)
    }

    /// Get an entity by id.
    pub fn entity(&self, id: Id) -> Option<&Entity> {
        self.entities.get(&id).map(|record| &record.entity)
    }

    /// Base entity of `id`, or None if `id` is a root.
    pub fn base_of(&self, id: Id) -> Result<Option<Id>> {
        Ok(self.record(id)?.base)
    }

    /// All entity ids, ascending.
    pub fn entity_ids(&self) -> Vec<Id> {
        let mut ids: Vec<Id> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Get the number of entities.
    pub fn num_entities(&self) -> usize {
        self.entities.len()
    }

    /// Current value of a relative entity.
    pub fn entity_value(&self, id: Id) -> Result<EntityValue> {
        self.record(id)?
            .entity
            .value()
            .ok_or(WorldModelError::NotRelative(id))
    }

    /// Replace the current value of one entity as a unit.
    pub fn set_entity_value(&mut self, id: Id, value: EntityValue) -> Result<()> {
        let record = self
            .entities
            .get_mut(&id)
            .ok_or(WorldModelError::UnknownEntity(id))?;
        record.entity.set_value(value)?;
        self.invalidate_pose_cache();
        Ok(())
    }

    /// Write back a batch of values, e.g. after one optimization pass.
    ///
    /// Every update is validated before any is applied, so a bad entry
    /// leaves the model untouched. Returns the number of entities updated.
    pub fn apply_values(
        &mut self,
        updates: impl IntoIterator<Item = (Id, EntityValue)>,
    ) -> Result<usize> {
        let updates: Vec<(Id, EntityValue)> = updates.into_iter().collect();

        for (id, value) in &updates {
            self.record(*id)?.entity.accepts(value)?;
        }

        for (id, value) in &updates {
            if let Some(record) = self.entities.get_mut(id) {
                record.entity.set_value(*value)?;
            }
        }

        self.invalidate_pose_cache();
        debug!("Applied values to {} entities", updates.len());
        Ok(updates.len())
    }

    /// Remove an entity.
    ///
    /// Refuses while another entity uses it as base or a factor references it;
    /// remove those first.
    pub fn remove_entity(&mut self, id: Id) -> Result<Entity> {
        self.record(id)?;

        if let Some(child) = self.children_of(id).first() {
            return Err(WorldModelError::EntityInUse {
                id,
                referenced_by: *child,
            });
        }
        if let Some(factor_id) = self.adjacency.get(&id).and_then(|f| f.iter().next()) {
            return Err(WorldModelError::EntityInUse {
                id,
                referenced_by: *factor_id,
            });
        }

        self.adjacency.remove(&id);
        let record = self
            .entities
            .remove(&id)
            .ok_or(WorldModelError::UnknownEntity(id))?;
        self.invalidate_pose_cache();
        debug!("Removed entity {}", id);
        Ok(record.entity)
    }

    /// Entities whose base is `id`, ascending.
    pub fn children_of(&self, id: Id) -> Vec<Id> {
        let mut children: Vec<Id> = self
            .entities
            .iter()
            .filter(|(_, record)| record.base == Some(id))
            .map(|(child, _)| *child)
            .collect();
        children.sort_unstable();
        children
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Factor Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a factor. Every entity it touches must already exist.
    ///
    /// Returns the id assigned to the new factor.
    pub fn insert_factor(&mut self, factor: impl Into<Factor>) -> Result<Id> {
        let factor = factor.into();
        let edges = factor.edges();

        for entity_id in &edges {
            if !entity_id.is_valid() {
                return Err(WorldModelError::InvalidId("factor edge"));
            }
            if !self.entities.contains_key(entity_id) {
                return Err(WorldModelError::UnknownEntity(*entity_id));
            }
        }

        let id = self.ids.allocate();
        for entity_id in &edges {
            self.adjacency.entry(*entity_id).or_default().insert(id);
        }
        debug!("Inserted factor {} ({}) over {:?}", id, factor.kind(), edges);
        self.factors.insert(id, factor);
        Ok(id)
    }

    /// Get a factor by id.
    pub fn factor(&self, id: Id) -> Option<&Factor> {
        self.factors.get(&id)
    }

    /// All factors with their ids, ascending by id.
    pub fn factors(&self) -> Vec<(Id, &Factor)> {
        let mut factors: Vec<(Id, &Factor)> = self.factors.iter().map(|(id, f)| (*id, f)).collect();
        factors.sort_unstable_by_key(|(id, _)| *id);
        factors
    }

    /// Get the number of factors.
    pub fn num_factors(&self) -> usize {
        self.factors.len()
    }

    /// Factors touching entity `id`, ascending.
    pub fn factors_of(&self, id: Id) -> Vec<Id> {
        self.adjacency
            .get(&id)
            .map(|factors| factors.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Remove a factor.
    pub fn remove_factor(&mut self, id: Id) -> Result<Factor> {
        let factor = self
            .factors
            .remove(&id)
            .ok_or(WorldModelError::UnknownFactor(id))?;

        for entity_id in factor.edges() {
            if let Some(factors) = self.adjacency.get_mut(&entity_id) {
                factors.remove(&id);
                if factors.is_empty() {
                    self.adjacency.remove(&entity_id);
                }
            }
        }
        debug!("Removed factor {} ({})", id, factor.kind());
        Ok(factor)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Global Poses
    // ─────────────────────────────────────────────────────────────────────────

    /// Pose of `id` in the world frame, composing relative values up to the root.
    ///
    /// Results (including every ancestor on the way) are memoised until the
    /// next value update or removal.
    pub fn global_pose(&self, id: Id) -> Result<SE3> {
        let mut cache = self.pose_cache.lock();
        if let Some(pose) = cache.get(&id) {
            return Ok(*pose);
        }

        // Walk up until a root or an already-composed ancestor.
        let mut chain = Vec::new();
        let mut pose = SE3::identity();
        let mut current = Some(id);
        while let Some(cur) = current {
            if let Some(cached) = cache.get(&cur) {
                pose = *cached;
                break;
            }
            let record = self.record(cur)?;
            let value = record.entity.value().ok_or(WorldModelError::NotRelative(cur))?;
            chain.push((cur, value.pose));
            current = record.base;
        }

        for (cur, relpose) in chain.into_iter().rev() {
            pose = pose.compose(&relpose);
            cache.insert(cur, pose);
        }
        Ok(pose)
    }

    /// Same as [`global_pose`](Self::global_pose) without touching the memo.
    pub fn global_pose_uncached(&self, id: Id) -> Result<SE3> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            let record = self.record(cur)?;
            let value = record.entity.value().ok_or(WorldModelError::NotRelative(cur))?;
            chain.push(value.pose);
            current = record.base;
        }

        Ok(chain
            .into_iter()
            .rev()
            .fold(SE3::identity(), |pose, relpose| pose.compose(&relpose)))
    }

    /// Drop all memoised global poses.
    pub fn invalidate_pose_cache(&self) {
        self.pose_cache.lock().clear();
    }

    /// Clear the entire world model. Ids are not reused.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.factors.clear();
        self.adjacency.clear();
        self.invalidate_pose_cache();
    }

    fn record(&self, id: Id) -> Result<&EntityRecord> {
        if !id.is_valid() {
            return Err(WorldModelError::InvalidId("entity"));
        }
        self.entities
            .get(&id)
            .ok_or(WorldModelError::UnknownEntity(id))
    }
}

impl Default for WorldModel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WorldModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldModel")
            .field("num_entities", &self.entities.len())
            .field("num_factors", &self.factors.len())
            .finish()
    }
}
