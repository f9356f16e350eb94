//! Graph layout for back-end solvers.
//!
//! Turns the world model into the block structure of a sparse least-squares
//! problem using only the factors' edge contract, so factor types defined
//! outside this crate take part without the back-end knowing them.
//!
//! This module uses the three-phase pattern:
//! 1. COLLECT: [`collect_graph_layout`] extracts variables, factor blocks and
//!    initial values under a shared borrow of the world model
//! 2. SOLVE: done by the external back-end, without holding any lock
//! 3. APPLY: [`GraphLayout::apply`] writes the new values back as a batch

use std::collections::{BTreeSet, HashMap};

use tracing::warn;

use crate::error::{Result, WorldModelError};
use crate::geometry::Matrix6;
use crate::world_model::{Entity, EntityValue, FactorBase, Id, WorldModel};

/// Tangent dimension of an SE3 pose.
const POSE_DIM: usize = 6;

/// Tangent dimension of a twist.
const TWIST_DIM: usize = 6;

/// Configuration for layout collection.
#[derive(Debug, Clone, Default)]
pub struct GraphLayoutConfig {
    /// Also create variables for relative entities no factor touches.
    pub include_unconstrained: bool,
}

/// One entity's columns in the stacked state vector.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableBlock {
    pub entity_id: Id,

    /// First column of this block.
    pub offset: usize,

    /// 6 for pose keyframes, 12 for pose + twist, 0 for extension entities
    /// (parameterized by whoever defined them).
    pub dim: usize,
}

/// One factor's rows: which variables it touches and how it is weighted.
#[derive(Debug, Clone)]
pub struct FactorBlock {
    pub factor_id: Id,

    /// Concrete factor kind, for back-ends that dispatch on it.
    pub kind: &'static str,

    /// Entities in edge slot order.
    pub entity_ids: Vec<Id>,

    /// Index into [`GraphLayout::variables`] for each edge slot.
    pub variables: Vec<usize>,

    /// Declared measurement covariance. `None` only for extension factors.
    pub covariance: Option<Matrix6>,

    /// Weight of the residual (inverse covariance). `None` for extension
    /// factors, or when `covariance` is singular; back-ends must then fall
    /// back on `covariance` themselves (e.g. a pseudo-inverse).
    pub information: Option<Matrix6>,
}

/// Block structure of the optimization problem.
#[derive(Debug, Clone, Default)]
pub struct GraphLayout {
    variables: Vec<VariableBlock>,
    index: HashMap<Id, usize>,
    factors: Vec<FactorBlock>,

    /// Upper-triangular (i <= j) variable block pairs with a non-zero Hessian block.
    nonzero_blocks: BTreeSet<(usize, usize)>,

    dimension: usize,

    /// Values of every variable at collection time.
    initial_values: HashMap<Id, EntityValue>,
}

impl GraphLayout {
    /// Number of variable blocks.
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Total number of columns of the stacked state.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Variable blocks in column order.
    pub fn variables(&self) -> &[VariableBlock] {
        &self.variables
    }

    /// Variable block of an entity.
    pub fn block_of(&self, entity_id: Id) -> Option<&VariableBlock> {
        self.index.get(&entity_id).map(|&i| &self.variables[i])
    }

    /// Factor blocks, ascending by factor id.
    pub fn factor_blocks(&self) -> &[FactorBlock] {
        &self.factors
    }

    /// Non-zero blocks of the (symmetric) information matrix, upper triangle.
    pub fn nonzero_blocks(&self) -> &BTreeSet<(usize, usize)> {
        &self.nonzero_blocks
    }

    /// Value of an entity when the layout was collected.
    pub fn initial_value(&self, entity_id: Id) -> Option<&EntityValue> {
        self.initial_values.get(&entity_id)
    }

    /// PHASE 3: write optimized values back into the world model.
    ///
    /// Only entities that are variables of this layout may be updated.
    /// Returns the number of entities updated.
    pub fn apply(
        &self,
        world: &mut WorldModel,
        updates: impl IntoIterator<Item = (Id, EntityValue)>,
    ) -> Result<usize> {
        let updates: Vec<(Id, EntityValue)> = updates.into_iter().collect();
        if let Some((id, _)) = updates.iter().find(|(id, _)| !self.index.contains_key(id)) {
            return Err(WorldModelError::UnknownEntity(*id));
        }
        world.apply_values(updates)
    }
}

/// PHASE 1: Collect the problem structure from the world model.
///
/// Variables are ordered by entity id, so the layout is deterministic for a
/// given world model.
pub fn collect_graph_layout(
    world: &WorldModel,
    config: &GraphLayoutConfig,
) -> Result<GraphLayout> {
    let factors = world.factors();

    // Entities touched by at least one factor, discovered via the edge contract.
    let mut touched: BTreeSet<Id> = BTreeSet::new();
    for (_, factor) in &factors {
        for slot in 0..factor.edge_count() {
            touched.insert(factor.edge_indices(slot));
        }
    }
    if config.include_unconstrained {
        touched.extend(
            world
                .entity_ids()
                .into_iter()
                .filter(|id| world.entity(*id).is_some_and(Entity::is_relative)),
        );
    }

    let mut layout = GraphLayout::default();
    for entity_id in touched {
        let entity = world
            .entity(entity_id)
            .ok_or(WorldModelError::UnknownEntity(entity_id))?;

        let dim = match entity {
            Entity::RelPose3KF(_) => POSE_DIM,
            Entity::RelDynPose3KF(_) => POSE_DIM + TWIST_DIM,
            Entity::Other(_) => 0,
        };
        if let Some(value) = entity.value() {
            layout.initial_values.insert(entity_id, value);
        }

        layout.index.insert(entity_id, layout.variables.len());
        layout.variables.push(VariableBlock {
            entity_id,
            offset: layout.dimension,
            dim,
        });
        layout.dimension += dim;
    }

    for (factor_id, factor) in factors {
        let entity_ids = factor.edges();
        let variables: Vec<usize> = entity_ids.iter().map(|id| layout.index[id]).collect();

        for (a, &var_a) in variables.iter().enumerate() {
            for &var_b in &variables[a..] {
                layout
                    .nonzero_blocks
                    .insert((var_a.min(var_b), var_a.max(var_b)));
            }
        }

        let covariance = factor.effective_covariance();
        let information = factor.information();
        if covariance.is_some() && information.is_none() {
            warn!(
                "Factor {} ({}) has a singular covariance, no information matrix",
                factor_id,
                factor.kind()
            );
        }

        layout.factors.push(FactorBlock {
            factor_id,
            kind: factor.kind(),
            entity_ids,
            variables,
            covariance,
            information,
        });
    }

    Ok(layout)
}
