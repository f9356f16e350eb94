//! Entities - the nodes of the world model graph.
//!
//! The built-in keyframe kinds store their state *relative* to a base
//! keyframe rather than in the world frame. Keeping values small and local
//! keeps the optimization well conditioned as the map grows; global poses are
//! recovered on demand by the world model, which also owns the base-frame
//! relation (entities never hold a reference to their base).
//!
//! - [`RelPose3KF`] - relative SE(3) pose
//! - [`RelDynPose3KF`] - relative SE(3) pose + twist
//! - [`EntityOther`] - user-defined entity types

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{Result, WorldModelError};
use crate::geometry::{Twist3, SE3};
use crate::ingestion::ObservationPtr;

/// Keyframe capability: a discrete, timestamped node of the map.
#[derive(Debug, Clone, Default)]
pub struct KeyFrameInfo {
    /// Timestamp in nanoseconds, if known.
    pub timestamp_ns: Option<u64>,

    /// Raw observations this keyframe was created from.
    pub raw_observations: Vec<ObservationPtr>,
}

impl KeyFrameInfo {
    pub fn at(timestamp_ns: u64) -> Self {
        Self {
            timestamp_ns: Some(timestamp_ns),
            raw_observations: Vec::new(),
        }
    }
}

/// A relative SE(3) keyframe.
#[derive(Debug, Clone, Default)]
pub struct RelPose3KF {
    pub keyframe: KeyFrameInfo,

    /// The up-to-date pose, in the frame of the base keyframe.
    pub relpose_value: SE3,
}

impl RelPose3KF {
    pub fn new(keyframe: KeyFrameInfo, relpose_value: SE3) -> Self {
        Self {
            keyframe,
            relpose_value,
        }
    }
}

/// A relative "dynamic" keyframe: SE(3) pose + velocity.
///
/// Both the pose and the twist are given in the frame of the base keyframe.
#[derive(Debug, Clone, Default)]
pub struct RelDynPose3KF {
    pub keyframe: KeyFrameInfo,

    /// The up-to-date pose, in the frame of the base keyframe.
    pub relpose_value: SE3,

    /// The up-to-date twist, in the frame of the base keyframe.
    pub twist_value: Twist3,
}

impl RelDynPose3KF {
    pub fn new(keyframe: KeyFrameInfo, relpose_value: SE3, twist_value: Twist3) -> Self {
        Self {
            keyframe,
            relpose_value,
            twist_value,
        }
    }
}

/// Capability interface for entity types defined outside this crate.
pub trait EntityBase: Send + Sync + Debug {
    fn is_keyframe(&self) -> bool {
        false
    }

    fn is_relative(&self) -> bool {
        false
    }

    fn timestamp_ns(&self) -> Option<u64> {
        None
    }
}

/// Shared handle to a user-defined entity.
pub type EntityOther = Arc<dyn EntityBase>;

/// The "current value" of a relative entity, replaced as a whole by the back-end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityValue {
    pub pose: SE3,
    /// Only meaningful for dynamic keyframes.
    pub twist: Option<Twist3>,
}

impl EntityValue {
    pub fn pose(pose: SE3) -> Self {
        Self { pose, twist: None }
    }

    pub fn dynamic(pose: SE3, twist: Twist3) -> Self {
        Self {
            pose,
            twist: Some(twist),
        }
    }
}

/// Any node of the world model.
#[derive(Debug, Clone)]
pub enum Entity {
    RelPose3KF(RelPose3KF),
    RelDynPose3KF(RelDynPose3KF),
    Other(EntityOther),
}

impl Entity {
    pub fn is_keyframe(&self) -> bool {
        match self {
            Entity::RelPose3KF(_) | Entity::RelDynPose3KF(_) => true,
            Entity::Other(other) => other.is_keyframe(),
        }
    }

    /// Whether this entity stores its value relative to a base keyframe.
    pub fn is_relative(&self) -> bool {
        match self {
            Entity::RelPose3KF(_) | Entity::RelDynPose3KF(_) => true,
            Entity::Other(other) => other.is_relative(),
        }
    }

    /// Whether the value carries a twist in addition to the pose.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Entity::RelDynPose3KF(_))
    }

    pub fn keyframe(&self) -> Option<&KeyFrameInfo> {
        match self {
            Entity::RelPose3KF(kf) => Some(&kf.keyframe),
            Entity::RelDynPose3KF(kf) => Some(&kf.keyframe),
            Entity::Other(_) => None,
        }
    }

    pub fn timestamp_ns(&self) -> Option<u64> {
        match self {
            Entity::Other(other) => other.timestamp_ns(),
            _ => self.keyframe().and_then(|kf| kf.timestamp_ns),
        }
    }

    /// Snapshot of the current value. `None` for extension entities.
    pub fn value(&self) -> Option<EntityValue> {
        match self {
            Entity::RelPose3KF(kf) => Some(EntityValue::pose(kf.relpose_value)),
            Entity::RelDynPose3KF(kf) => {
                Some(EntityValue::dynamic(kf.relpose_value, kf.twist_value))
            }
            Entity::Other(_) => None,
        }
    }

    /// Replace the current value as a unit.
    ///
    /// A dynamic keyframe given no twist keeps its previous twist.
    pub fn set_value(&mut self, value: EntityValue) -> Result<()> {
        self.accepts(&value)?;
        match self {
            Entity::RelPose3KF(kf) => kf.relpose_value = value.pose,
            Entity::RelDynPose3KF(kf) => {
                kf.relpose_value = value.pose;
                if let Some(twist) = value.twist {
                    kf.twist_value = twist;
                }
            }
            Entity::Other(_) => {}
        }
        Ok(())
    }

    /// Check that `value` could be stored by this entity, without storing it.
    pub(crate) fn accepts(&self, value: &EntityValue) -> Result<()> {
        match self {
            Entity::RelPose3KF(_) if value.twist.is_some() => Err(
                WorldModelError::KindMismatch("twist given for a pose-only keyframe"),
            ),
            Entity::Other(_) => Err(WorldModelError::KindMismatch(
                "extension entities have no built-in value",
            )),
            _ => Ok(()),
        }
    }
}

impl From<RelPose3KF> for Entity {
    fn from(kf: RelPose3KF) -> Self {
        Entity::RelPose3KF(kf)
    }
}

impl From<RelDynPose3KF> for Entity {
    fn from(kf: RelDynPose3KF) -> Self {
        Entity::RelDynPose3KF(kf)
    }
}

impl From<EntityOther> for Entity {
    fn from(other: EntityOther) -> Self {
        Entity::Other(other)
    }
}
