//! World model - the factor graph of the map.
//!
//! This module contains:
//! - [`Id`] - the identifier space shared by entities and factors
//! - [`Entity`] - map nodes (relative keyframes, user-defined entities)
//! - [`Factor`] - constraints between entities, behind the [`FactorBase`] edge contract
//! - [`WorldModel`] - the arena owning both, with global pose recovery
//!
//! # Example
//!
//! ```
//! use slam_kernel::geometry::SE3;
//! use slam_kernel::world_model::{
//!     FactorBase, FactorRelativePose3, KeyFrameInfo, RelPose3KF, WorldModel,
//! };
//!
//! let mut world = WorldModel::new();
//! let step = SE3::from_euler(1.0, 0.0, 0.0, 0.0, 0.0, 0.0);
//!
//! let kf0 = world.insert_entity(RelPose3KF::new(KeyFrameInfo::at(0), SE3::identity()), None)?;
//! let kf1 = world.insert_entity(RelPose3KF::new(KeyFrameInfo::at(100), step), Some(kf0))?;
//! let f = world.insert_factor(FactorRelativePose3::new(kf0, kf1, step))?;
//!
//! let factor = world.factor(f).unwrap();
//! assert_eq!(factor.edges(), vec![kf0, kf1]);
//! assert_eq!(world.global_pose(kf1)?.translation.x, 1.0);
//! # Ok::<(), slam_kernel::WorldModelError>(())
//! ```

pub mod entities;
pub mod factors;
pub mod map;
pub mod types;

pub use entities::{
    Entity, EntityBase, EntityOther, EntityValue, KeyFrameInfo, RelDynPose3KF, RelPose3KF,
};
pub use factors::{
    edge_out_of_bounds, Factor, FactorBase, FactorOther, FactorRelativePose3,
    FactorRelativePose3ConstVel,
};
pub use map::{SharedWorldModel, WorldModel};
pub use types::{Id, IdAllocator, INVALID_ID};
