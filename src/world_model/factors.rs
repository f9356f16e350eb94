//! Factors - the probabilistic constraints (edges) of the world model graph.
//!
//! Every factor exposes the same edge contract through [`FactorBase`]:
//! `edge_count()` entities, each retrievable by slot with `edge_indices(i)`.
//! A back-end can build the full adjacency and sparsity pattern of the graph
//! from that contract alone, without knowing the concrete factor types.
//!
//! Asking for a slot `i >= edge_count()` is a programming error and panics;
//! returning a made-up id would silently corrupt the graph topology.

use std::fmt::Debug;
use std::sync::Arc;

use crate::config::NoiseDefaults;
use crate::geometry::{Matrix6, Vector6, SE3};

use super::types::Id;

/// Default translation standard deviation (m) of relative pose factors.
pub const DEFAULT_NOISE_DIAG_XYZ: f64 = 0.01;

/// Default rotation standard deviation (rad) of relative pose factors: 0.5°.
pub const DEFAULT_NOISE_DIAG_ROT: f64 = 0.5 * std::f64::consts::PI / 180.0;

/// Edge contract shared by all factor types.
pub trait FactorBase: Send + Sync + Debug {
    /// Number of entities this factor touches. Zero is legal.
    fn edge_count(&self) -> usize;

    /// Entity id at slot `i`, for `0 <= i < edge_count()`.
    ///
    /// # Panics
    /// If `i >= edge_count()`.
    fn edge_indices(&self, i: usize) -> Id;

    /// All entity ids, in slot order.
    fn edges(&self) -> Vec<Id> {
        (0..self.edge_count()).map(|i| self.edge_indices(i)).collect()
    }
}

/// Panic for an `edge_indices` call past `edge_count`.
///
/// Shared by the built-in factors so user-defined ones can fail the same way.
#[cold]
#[track_caller]
pub fn edge_out_of_bounds(i: usize, edge_count: usize) -> ! {
    panic!("edge index {i} out of bounds (edge_count = {edge_count})")
}

/// Observed relative pose of keyframe `to_kf` as seen from `from_kf`.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorRelativePose3 {
    pub from_kf: Id,
    pub to_kf: Id,

    /// Pose of `to_kf` in the frame of `from_kf`.
    pub rel_pose: SE3,

    /// Full covariance of the observation, order (rotx, roty, rotz, x, y, z).
    /// When present it takes precedence over the diagonal fields below.
    pub noise_model: Option<Matrix6>,

    /// Standard deviation in X, Y, Z. Ignored if `noise_model` is set.
    pub noise_model_diag_xyz: f64,

    /// Standard deviation of each rotation angle (rad). Ignored if
    /// `noise_model` is set.
    pub noise_model_diag_rot: f64,
}

impl FactorRelativePose3 {
    /// Relative pose constraint of `kf_to` as seen from `kf_from`.
    pub fn new(kf_from: Id, kf_to: Id, rel_pose: SE3) -> Self {
        Self {
            from_kf: kf_from,
            to_kf: kf_to,
            rel_pose,
            noise_model: None,
            noise_model_diag_xyz: DEFAULT_NOISE_DIAG_XYZ,
            noise_model_diag_rot: DEFAULT_NOISE_DIAG_ROT,
        }
    }

    /// Use configured standard deviations for the diagonal fallback.
    pub fn with_noise_defaults(mut self, noise: &NoiseDefaults) -> Self {
        self.noise_model_diag_xyz = noise.diag_xyz;
        self.noise_model_diag_rot = noise.diag_rot_rad();
        self
    }

    /// Attach a full covariance.
    pub fn with_covariance(mut self, covariance: Matrix6) -> Self {
        self.noise_model = Some(covariance);
        self
    }

    /// Covariance the back-end should weight this factor with.
    ///
    /// The full covariance if one was given, otherwise
    /// `diag(σ_rot², σ_rot², σ_rot², σ_xyz², σ_xyz², σ_xyz²)`.
    pub fn effective_covariance(&self) -> Matrix6 {
        match self.noise_model {
            Some(covariance) => covariance,
            None => {
                let var_rot = self.noise_model_diag_rot * self.noise_model_diag_rot;
                let var_xyz = self.noise_model_diag_xyz * self.noise_model_diag_xyz;
                Matrix6::from_diagonal(&Vector6::new(
                    var_rot, var_rot, var_rot, var_xyz, var_xyz, var_xyz,
                ))
            }
        }
    }

    /// Information matrix (inverse covariance).
    ///
    /// `None` if the effective covariance is not positive definite.
    pub fn information(&self) -> Option<Matrix6> {
        self.effective_covariance()
            .cholesky()
            .map(|chol| chol.inverse())
    }

    /// Tangent-space error `log(rel_pose⁻¹ ∘ from⁻¹ ∘ to)` for the given
    /// global (or common-frame) poses of both keyframes.
    pub fn residual(&self, from_pose: &SE3, to_pose: &SE3) -> Vector6 {
        let predicted = from_pose.inverse().compose(to_pose);
        self.rel_pose.inverse().compose(&predicted).log()
    }
}

impl FactorBase for FactorRelativePose3 {
    fn edge_count(&self) -> usize {
        2
    }

    fn edge_indices(&self, i: usize) -> Id {
        match i {
            0 => self.from_kf,
            1 => self.to_kf,
            _ => edge_out_of_bounds(i, 2),
        }
    }
}

/// A [`FactorRelativePose3`] that additionally imposes a constant velocity
/// model between the two keyframes.
///
/// Only valid for keyframes very close in time. Never use it for loop
/// closures: nothing detects the misuse, the estimate just gets biased.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorRelativePose3ConstVel {
    pub rel_pose_factor: FactorRelativePose3,
}

impl FactorRelativePose3ConstVel {
    pub fn new(kf_from: Id, kf_to: Id, rel_pose: SE3) -> Self {
        Self {
            rel_pose_factor: FactorRelativePose3::new(kf_from, kf_to, rel_pose),
        }
    }
}

impl From<FactorRelativePose3> for FactorRelativePose3ConstVel {
    fn from(rel_pose_factor: FactorRelativePose3) -> Self {
        Self { rel_pose_factor }
    }
}

impl FactorBase for FactorRelativePose3ConstVel {
    fn edge_count(&self) -> usize {
        self.rel_pose_factor.edge_count()
    }

    fn edge_indices(&self, i: usize) -> Id {
        self.rel_pose_factor.edge_indices(i)
    }
}

/// Shared handle to a user-defined factor type.
pub type FactorOther = Arc<dyn FactorBase>;

/// Any factor of the world model.
#[derive(Debug, Clone)]
pub enum Factor {
    RelativePose3(FactorRelativePose3),
    RelativePose3ConstVel(FactorRelativePose3ConstVel),
    Other(FactorOther),
}

impl Factor {
    /// Short name of the concrete kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Factor::RelativePose3(_) => "RelativePose3",
            Factor::RelativePose3ConstVel(_) => "RelativePose3ConstVel",
            Factor::Other(_) => "Other",
        }
    }

    /// The relative pose measurement, for the kinds that carry one.
    pub fn relative_pose(&self) -> Option<&FactorRelativePose3> {
        match self {
            Factor::RelativePose3(f) => Some(f),
            Factor::RelativePose3ConstVel(f) => Some(&f.rel_pose_factor),
            Factor::Other(_) => None,
        }
    }

    /// Covariance of the measurement. `None` for extension factors.
    pub fn effective_covariance(&self) -> Option<Matrix6> {
        self.relative_pose().map(|f| f.effective_covariance())
    }

    /// Information matrix of the measurement. `None` for extension factors or
    /// a singular covariance.
    pub fn information(&self) -> Option<Matrix6> {
        self.relative_pose().and_then(|f| f.information())
    }
}

impl FactorBase for Factor {
    fn edge_count(&self) -> usize {
        match self {
            Factor::RelativePose3(f) => f.edge_count(),
            Factor::RelativePose3ConstVel(f) => f.edge_count(),
            Factor::Other(f) => f.edge_count(),
        }
    }

    fn edge_indices(&self, i: usize) -> Id {
        match self {
            Factor::RelativePose3(f) => f.edge_indices(i),
            Factor::RelativePose3ConstVel(f) => f.edge_indices(i),
            Factor::Other(f) => f.edge_indices(i),
        }
    }
}

impl From<FactorRelativePose3> for Factor {
    fn from(f: FactorRelativePose3) -> Self {
        Factor::RelativePose3(f)
    }
}

impl From<FactorRelativePose3ConstVel> for Factor {
    fn from(f: FactorRelativePose3ConstVel) -> Self {
        Factor::RelativePose3ConstVel(f)
    }
}

impl From<FactorOther> for Factor {
    fn from(f: FactorOther) -> Self {
        Factor::Other(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Hyper-edge over an arbitrary set of entities.
    #[derive(Debug)]
    struct MultiFactor(Vec<Id>);

    impl FactorBase for MultiFactor {
        fn edge_count(&self) -> usize {
            self.0.len()
        }

        fn edge_indices(&self, i: usize) -> Id {
            match self.0.get(i) {
                Some(id) => *id,
                None => edge_out_of_bounds(i, self.0.len()),
            }
        }
    }

    fn sample_pose() -> SE3 {
        SE3::from_euler(1.0, 0.5, -0.2, 0.01, 0.02, 0.3)
    }

    #[test]
    fn test_relative_pose_construction() {
        let pose = sample_pose();
        let factor = FactorRelativePose3::new(Id::new(5), Id::new(9), pose);

        assert_eq!(factor.from_kf, Id::new(5));
        assert_eq!(factor.to_kf, Id::new(9));
        assert_eq!(factor.rel_pose, pose);
        assert_eq!(factor.edge_count(), 2);
        assert_eq!(factor.edge_indices(0), Id::new(5));
        assert_eq!(factor.edge_indices(1), Id::new(9));
        assert_eq!(factor.edges(), vec![Id::new(5), Id::new(9)]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_relative_pose_edge_out_of_bounds() {
        let factor = FactorRelativePose3::new(Id::new(0), Id::new(1), SE3::identity());
        factor.edge_indices(2);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_const_vel_edge_out_of_bounds() {
        let factor = FactorRelativePose3ConstVel::new(Id::new(0), Id::new(1), SE3::identity());
        factor.edge_indices(2);
    }

    #[test]
    fn test_const_vel_delegates_edge_contract() {
        let factor = FactorRelativePose3ConstVel::new(Id::new(3), Id::new(4), sample_pose());
        let inner = &factor.rel_pose_factor;

        assert_eq!(factor.edge_count(), inner.edge_count());
        for i in 0..factor.edge_count() {
            assert_eq!(factor.edge_indices(i), inner.edge_indices(i));
        }
    }

    #[test]
    fn test_diagonal_fallback_covariance() {
        let factor = FactorRelativePose3::new(Id::new(0), Id::new(1), SE3::identity());
        let cov = factor.effective_covariance();

        let var_rot = DEFAULT_NOISE_DIAG_ROT.powi(2);
        let var_xyz = DEFAULT_NOISE_DIAG_XYZ.powi(2);
        let expected = Matrix6::from_diagonal(&Vector6::new(
            var_rot, var_rot, var_rot, var_xyz, var_xyz, var_xyz,
        ));

        assert_eq!(cov, expected);
        assert_relative_eq!(DEFAULT_NOISE_DIAG_ROT, 0.5_f64.to_radians(), epsilon = 1e-15);
    }

    #[test]
    fn test_noise_defaults_feed_fallback() {
        let noise = NoiseDefaults {
            diag_xyz: 0.2,
            diag_rot_deg: 2.0,
        };
        let factor = FactorRelativePose3::new(Id::new(0), Id::new(1), SE3::identity())
            .with_noise_defaults(&noise);
        let cov = factor.effective_covariance();

        assert_relative_eq!(cov[(0, 0)], 2.0_f64.to_radians().powi(2), epsilon = 1e-15);
        assert_relative_eq!(cov[(5, 5)], 0.04, epsilon = 1e-15);
        assert_eq!(cov[(0, 5)], 0.0);
    }

    #[test]
    fn test_full_covariance_takes_precedence() {
        let mut full = Matrix6::identity() * 3.0;
        full[(0, 1)] = 0.5;
        full[(1, 0)] = 0.5;

        let mut factor =
            FactorRelativePose3::new(Id::new(0), Id::new(1), SE3::identity()).with_covariance(full);
        factor.noise_model_diag_xyz = 100.0;
        factor.noise_model_diag_rot = 100.0;

        assert_eq!(factor.effective_covariance(), full);
    }

    #[test]
    fn test_information_inverts_covariance() {
        let factor = FactorRelativePose3::new(Id::new(0), Id::new(1), SE3::identity());
        let info = factor.information().unwrap();

        assert_relative_eq!(
            info * factor.effective_covariance(),
            Matrix6::identity(),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            info[(3, 3)],
            1.0 / DEFAULT_NOISE_DIAG_XYZ.powi(2),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_information_of_singular_covariance() {
        let factor = FactorRelativePose3::new(Id::new(0), Id::new(1), SE3::identity())
            .with_covariance(Matrix6::zeros());
        assert!(factor.information().is_none());
    }

    #[test]
    fn test_residual_zero_when_consistent() {
        let rel = sample_pose();
        let from = SE3::from_euler(10.0, -3.0, 1.0, 0.0, 0.1, 1.2);
        let to = from.compose(&rel);
        let factor = FactorRelativePose3::new(Id::new(0), Id::new(1), rel);

        assert_relative_eq!(factor.residual(&from, &to), Vector6::zeros(), epsilon = 1e-10);

        let perturbed = to.compose(&SE3::from_euler(0.1, 0.0, 0.0, 0.0, 0.0, 0.0));
        let r = factor.residual(&from, &perturbed);
        assert_relative_eq!(r, Vector6::new(0.0, 0.0, 0.0, 0.1, 0.0, 0.0), epsilon = 1e-10);
    }

    #[test]
    fn test_factor_enum_dispatch() {
        let other: FactorOther = Arc::new(MultiFactor(vec![Id::new(1), Id::new(2), Id::new(3)]));
        let factors: Vec<Factor> = vec![
            FactorRelativePose3::new(Id::new(0), Id::new(1), SE3::identity()).into(),
            FactorRelativePose3ConstVel::new(Id::new(1), Id::new(2), SE3::identity()).into(),
            other.into(),
            (Arc::new(MultiFactor(Vec::new())) as FactorOther).into(),
        ];

        let counts: Vec<usize> = factors.iter().map(|f| f.edge_count()).collect();
        assert_eq!(counts, vec![2, 2, 3, 0]);
        assert_eq!(factors[2].edges(), vec![Id::new(1), Id::new(2), Id::new(3)]);
        assert!(factors[3].edges().is_empty());

        assert!(factors[1].effective_covariance().is_some());
        assert!(factors[2].effective_covariance().is_none());
        assert_eq!(factors[1].kind(), "RelativePose3ConstVel");
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_zero_edge_factor_has_no_slots() {
        let factor: Factor = (Arc::new(MultiFactor(Vec::new())) as FactorOther).into();
        factor.edge_indices(0);
    }
}
