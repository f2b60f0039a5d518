//! Preintegrated IMU process model with incremental Jacobians in SE_2(3).
//!
//! A filter can integrate at sensor rate (hundreds of Hz) while correcting
//! at a much lower keyframe rate. This model keeps the manifold state
//! tracking the true pose every step while deferring Jacobian work: it
//! accumulates composite increments so that the state-transition and noise
//! Jacobians *since the last reset* are always available in O(1), without
//! re-walking the raw sample history.
//!
//! The owning filter must call
//! [`PreintegratedImuModel::reset_incremental_jacobians`] exactly once per
//! correction, after applying it; a forgotten reset silently keeps growing a
//! stale Jacobian chain. Long windows between resets are legal but degrade
//! linearization accuracy; [`PreintegratedImuModel::steps_since_reset`]
//! exposes the window length for monitoring.

use crate::error::{ImuError, ImuResult};
use crate::manifold::ie3::Ie3;
use crate::manifold::se_2_3::ExtendedPose;
use crate::manifold::{Matrix12, Matrix15, Matrix15x12, Matrix9x6};
use crate::process::coupled::CoupledImuKinematicModel;
use crate::process::{check_time_step, ImuInput, Perturbation};
use nalgebra::{Matrix6, Vector3};
use tracing::debug;

/// The composite increment state of one preintegration window.
///
/// All fields are updated in lockstep by every `evaluate` call and cleared
/// together by the reset; they are never valid to mutate independently.
#[derive(Debug, Clone)]
pub struct PreintegrationIncrements {
    /// Product of all per-step increments `U` since the last reset.
    u_ij: Ie3,
    /// Product of all gravity elements `G`, composed on the opposite side.
    g_ij: Ie3,
    /// Bias-coupling block, recursed through each step's inverse adjoint.
    b_ij: Matrix9x6,
    /// Accumulated process noise in the incremental frame.
    q_ij: Matrix15,
    /// Covariance snapshot taken at the last reset (keyframe instant).
    p_i: Matrix15,
    /// Covariance snapshot at the current end of the window.
    p_j: Matrix15,
    /// Full-state transition Jacobian since the last reset.
    a_ij: Matrix15,
    /// Full-state noise Jacobian since the last reset.
    l_ij: Matrix15,
    /// Raw-rate steps composed since the last reset.
    steps: u64,
}

impl PreintegrationIncrements {
    fn new() -> Self {
        PreintegrationIncrements {
            u_ij: Ie3::identity(),
            g_ij: Ie3::identity(),
            b_ij: Matrix9x6::zeros(),
            q_ij: Matrix15::zeros(),
            p_i: Matrix15::zeros(),
            p_j: Matrix15::zeros(),
            a_ij: Matrix15::identity(),
            l_ij: Matrix15::identity(),
            steps: 0,
        }
    }

    fn reset(&mut self, p: &Matrix15) {
        self.u_ij = Ie3::identity();
        self.g_ij = Ie3::identity();
        self.b_ij = Matrix9x6::zeros();
        self.q_ij = Matrix15::zeros();
        self.a_ij = Matrix15::identity();
        self.l_ij = Matrix15::identity();
        self.p_i = *p;
        self.p_j = *p;
        self.steps = 0;
    }

    /// Composite increment `U_ij`.
    pub fn u_ij(&self) -> &Ie3 {
        &self.u_ij
    }

    /// Composite gravity element `G_ij`.
    pub fn g_ij(&self) -> &Ie3 {
        &self.g_ij
    }

    /// Composite bias-coupling block `B_ij`.
    pub fn b_ij(&self) -> &Matrix9x6 {
        &self.b_ij
    }

    /// Incremental-frame noise covariance `Q_ij`.
    pub fn q_ij(&self) -> &Matrix15 {
        &self.q_ij
    }

    /// Covariance snapshot at the last keyframe.
    pub fn keyframe_covariance(&self) -> &Matrix15 {
        &self.p_i
    }
}

/// Preintegrated kinematics model with incremental Jacobians in SE_2(3).
///
/// Owns exactly one trajectory's increment window; independent trajectories
/// each need their own instance (the predict/correct loop of one filter is
/// the single writer).
#[derive(Debug, Clone)]
pub struct PreintegratedImuModel {
    q_c: Matrix12,
    g_a: Vector3<f64>,
    perturbation: Perturbation,
    increments: PreintegrationIncrements,
}

impl PreintegratedImuModel {
    /// Create a model from the continuous-time noise density, perturbation
    /// convention, and gravity vector.
    pub fn new(q_c: Matrix12, perturbation: Perturbation, g_a: Vector3<f64>) -> Self {
        PreintegratedImuModel {
            q_c,
            g_a,
            perturbation,
            increments: PreintegrationIncrements::new(),
        }
    }

    /// Create a model with the standard z-up gravity vector.
    pub fn with_standard_gravity(q_c: Matrix12, perturbation: Perturbation) -> Self {
        Self::new(q_c, perturbation, crate::process::standard_gravity_vector())
    }

    /// The perturbation convention.
    pub fn perturbation(&self) -> Perturbation {
        self.perturbation
    }

    /// Read-only view of the composite increment state.
    pub fn increments(&self) -> &PreintegrationIncrements {
        &self.increments
    }

    /// Raw-rate steps composed since the last reset.
    pub fn steps_since_reset(&self) -> u64 {
        self.increments.steps
    }

    /// Propagate the state one step and fold the step into the composite
    /// increments.
    ///
    /// The manifold state keeps tracking the true pose every call;
    /// [`Self::state_jacobian`] and [`Self::covariance`] always describe the
    /// whole window since the last reset.
    ///
    /// # Errors
    /// [`ImuError::InvalidTimeStep`] if `Δt ≤ 0`.
    pub fn evaluate(&mut self, x: &ExtendedPose, u: &ImuInput, dt: f64) -> ImuResult<ExtendedPose> {
        check_time_step(dt)?;

        let u_k = CoupledImuKinematicModel::generate_u(u, dt);
        let g_k = CoupledImuKinematicModel::generate_g(dt, &self.g_a);
        let x_next = ExtendedPose::from_matrix_unchecked(
            g_k.matrix() * x.matrix() * u_k.matrix(),
        );

        let step_adj = u_k.inverse().adjoint();
        let l_step = CoupledImuKinematicModel::pose_input_jacobian(u, dt);

        let inc = &mut self.increments;
        inc.u_ij = inc.u_ij * u_k;
        inc.g_ij = g_k * inc.g_ij;
        inc.b_ij = step_adj * inc.b_ij - l_step;

        // discrete Lyapunov recursion in the incremental frame
        let mut a_full = Matrix15::identity();
        a_full.fixed_view_mut::<9, 9>(0, 0).copy_from(&step_adj);
        a_full.fixed_view_mut::<9, 6>(0, 9).copy_from(&(-l_step));

        let mut l_full = Matrix15x12::zeros();
        l_full.fixed_view_mut::<9, 6>(0, 0).copy_from(&l_step);
        l_full
            .fixed_view_mut::<6, 6>(9, 6)
            .copy_from(&(dt * Matrix6::identity()));

        inc.q_ij = a_full * inc.q_ij * a_full.transpose()
            + l_full * (self.q_c / dt) * l_full.transpose();

        // recompute the window Jacobians from the composites
        inc.a_ij = Matrix15::identity();
        inc.l_ij = Matrix15::identity();
        match self.perturbation {
            Perturbation::Right => {
                inc.a_ij
                    .fixed_view_mut::<9, 9>(0, 0)
                    .copy_from(&inc.u_ij.inverse().adjoint());
                inc.a_ij.fixed_view_mut::<9, 6>(0, 9).copy_from(&inc.b_ij);
            }
            Perturbation::Left => {
                let adj_x = x_next.adjoint();
                inc.a_ij
                    .fixed_view_mut::<9, 9>(0, 0)
                    .copy_from(&inc.g_ij.adjoint());
                inc.a_ij
                    .fixed_view_mut::<9, 6>(0, 9)
                    .copy_from(&(adj_x * inc.b_ij));
                inc.l_ij.fixed_view_mut::<9, 9>(0, 0).copy_from(&adj_x);
            }
        }
        inc.steps += 1;

        Ok(x_next)
    }

    /// Clear the increment window and snapshot the keyframe covariance.
    ///
    /// Must be called by the owning filter exactly once per correction,
    /// after the correction has been applied and before the next prediction
    /// sequence begins.
    pub fn reset_incremental_jacobians(&mut self, p: &Matrix15) {
        debug!(
            steps = self.increments.steps,
            "resetting preintegration window"
        );
        self.increments.reset(p);
    }

    /// Full-state transition Jacobian `A_ij` covering the window since the
    /// last reset.
    pub fn state_jacobian(&self) -> &Matrix15 {
        &self.increments.a_ij
    }

    /// Full-state noise Jacobian `L_ij` covering the window since the last
    /// reset.
    pub fn noise_jacobian(&self) -> &Matrix15 {
        &self.increments.l_ij
    }

    /// Process covariance of the whole window: `L_ij Q_ij L_ijᵀ`.
    ///
    /// # Errors
    /// [`ImuError::NonFiniteCovariance`] if round-off or a degenerate input
    /// stream produced NaN/Inf entries.
    pub fn covariance(&self) -> ImuResult<Matrix15> {
        let inc = &self.increments;
        let q = inc.l_ij * inc.q_ij * inc.l_ij.transpose();

        if q.iter().all(|entry| entry.is_finite()) {
            Ok(q)
        } else {
            debug!(
                steps = inc.steps,
                "preintegrated covariance has non-finite entries"
            );
            Err(ImuError::NonFiniteCovariance {
                context: "preintegrated covariance",
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifold::so3;
    use crate::noise::ImuNoiseDensity;

    const TOLERANCE: f64 = 1e-10;

    fn models(perturbation: Perturbation) -> (CoupledImuKinematicModel, PreintegratedImuModel) {
        let q_c = ImuNoiseDensity::default().to_matrix();
        (
            CoupledImuKinematicModel::with_standard_gravity(q_c, perturbation),
            PreintegratedImuModel::with_standard_gravity(q_c, perturbation),
        )
    }

    fn input_stream(n: usize, seed: f64) -> Vec<ImuInput> {
        (0..n)
            .map(|k| {
                let t = seed + k as f64 * 0.05;
                ImuInput::new(
                    Vector3::new(0.4 * t.sin(), -0.8 * (2.0 * t).cos(), 0.3 * t.cos()),
                    Vector3::new(0.2 * t.cos(), 0.1 * t.sin(), 9.81 + 0.5 * (3.0 * t).sin()),
                )
            })
            .collect()
    }

    #[test]
    fn test_evaluate_rejects_non_positive_dt() {
        let (_, mut preint) = models(Perturbation::Right);
        let result = preint.evaluate(&ExtendedPose::identity(), &input_stream(1, 0.0)[0], 0.0);
        assert!(matches!(result, Err(ImuError::InvalidTimeStep(_))));
        assert_eq!(preint.steps_since_reset(), 0);
    }

    #[test]
    fn test_state_matches_single_step_chain() {
        for perturbation in [Perturbation::Right, Perturbation::Left] {
            let (single, mut preint) = models(perturbation);
            let dt = 1.0 / 400.0;

            let x0 = ExtendedPose::from_components(
                so3::exp(&Vector3::new(0.1, -0.2, 0.3)),
                Vector3::new(0.5, 0.0, -0.1),
                Vector3::new(1.0, 2.0, 3.0),
            );

            let mut x_single = x0;
            let mut x_preint = x0;
            for u in input_stream(200, 0.0) {
                x_single = single.evaluate(&x_single, &u, dt).unwrap();
                x_preint = preint.evaluate(&x_preint, &u, dt).unwrap();
            }

            assert!(
                (x_single.matrix() - x_preint.matrix()).norm() < TOLERANCE,
                "{perturbation} state divergence"
            );
            assert!(x_preint.is_valid(1e-8));
            assert_eq!(preint.steps_since_reset(), 200);
        }
    }

    #[test]
    fn test_covariance_matches_recursive_propagation() {
        let (single, mut preint) = models(Perturbation::Right);
        let dt = 1.0 / 100.0;

        let p0 = 1e-4 * Matrix15::identity();
        preint.reset_incremental_jacobians(&p0);

        let mut x = ExtendedPose::identity();
        let mut p_recursive = p0;
        for u in input_stream(50, 1.0) {
            let f = single.state_jacobian(&x, &u, dt).unwrap();
            let q = single.covariance(&x, &u, dt).unwrap();
            p_recursive = f * p_recursive * f.transpose() + q;

            x = preint.evaluate(&x, &u, dt).unwrap();
        }

        let a_ij = preint.state_jacobian();
        let p_preint = a_ij * p0 * a_ij.transpose() + preint.covariance().unwrap();

        assert!(
            (p_recursive - p_preint).norm() < 1e-10 * (1.0 + p_recursive.norm()),
            "covariance divergence: {}",
            (p_recursive - p_preint).norm()
        );
    }

    #[test]
    fn test_reset_idempotence() {
        let (single, mut preint) = models(Perturbation::Right);
        let dt = 1.0 / 400.0;
        let stream = input_stream(30, 2.0);

        let mut x = ExtendedPose::identity();
        for u in &stream {
            x = preint.evaluate(&x, u, dt).unwrap();
        }

        let p = 1e-3 * Matrix15::identity();
        preint.reset_incremental_jacobians(&p);

        let inc = preint.increments();
        assert!((inc.u_ij().matrix() - crate::manifold::Matrix5::identity()).norm() < TOLERANCE);
        assert!((inc.g_ij().matrix() - crate::manifold::Matrix5::identity()).norm() < TOLERANCE);
        assert!(inc.b_ij().norm() < TOLERANCE);
        assert!(inc.q_ij().norm() < TOLERANCE);
        assert!((inc.keyframe_covariance() - p).norm() < TOLERANCE);
        assert_eq!(preint.steps_since_reset(), 0);

        // the first post-reset step reproduces the single-step model exactly
        let u = &stream[0];
        let x_preint = preint.evaluate(&x, u, dt).unwrap();
        let x_single = single.evaluate(&x, u, dt).unwrap();
        assert!((x_preint.matrix() - x_single.matrix()).norm() < TOLERANCE);

        let f_single = single.state_jacobian(&x, u, dt).unwrap();
        assert!((preint.state_jacobian() - f_single).norm() < TOLERANCE);

        let q_single = single.covariance(&x, u, dt).unwrap();
        assert!((preint.covariance().unwrap() - q_single).norm() < TOLERANCE);
    }

    #[test]
    fn test_covariance_surfaces_non_finite_entries() {
        let (_, mut preint) = models(Perturbation::Right);
        let u = ImuInput::new(Vector3::zeros(), Vector3::new(f64::NAN, 0.0, 0.0));

        preint.evaluate(&ExtendedPose::identity(), &u, 0.01).unwrap();
        assert!(matches!(
            preint.covariance(),
            Err(ImuError::NonFiniteCovariance { .. })
        ));
    }

    #[test]
    fn test_missing_reset_keeps_growing_the_window() {
        // Forgetting to reset is the documented defect class: the composite
        // Jacobian keeps absorbing steps instead of restarting.
        let (_, mut preint) = models(Perturbation::Right);
        let dt = 0.01;
        let stream = input_stream(6, 3.0);

        let mut x = ExtendedPose::identity();
        for u in &stream[..3] {
            x = preint.evaluate(&x, u, dt).unwrap();
        }
        let a_after_three = *preint.state_jacobian();
        assert_eq!(preint.steps_since_reset(), 3);

        for u in &stream[3..] {
            x = preint.evaluate(&x, u, dt).unwrap();
        }
        assert_eq!(preint.steps_since_reset(), 6);
        assert!((preint.state_jacobian() - a_after_three).norm() > 1e-6);
    }

    #[test]
    fn test_independent_trajectories_stay_independent() {
        // batch of three trajectories = three accumulators; each must match
        // its own single-step chain
        let dt = 1.0 / 200.0;
        let q_c = ImuNoiseDensity::default().to_matrix();
        let single = CoupledImuKinematicModel::with_standard_gravity(q_c, Perturbation::Right);

        let starts = [
            ExtendedPose::identity(),
            ExtendedPose::from_components(
                so3::exp(&Vector3::new(0.0, 0.0, 1.0)),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::zeros(),
            ),
            ExtendedPose::from_components(
                so3::exp(&Vector3::new(-0.4, 0.2, 0.0)),
                Vector3::new(0.0, -1.0, 0.5),
                Vector3::new(5.0, -5.0, 2.0),
            ),
        ];

        let mut accumulators: Vec<PreintegratedImuModel> = (0..3)
            .map(|_| PreintegratedImuModel::with_standard_gravity(q_c, Perturbation::Right))
            .collect();

        for (k, (x0, preint)) in starts.iter().zip(accumulators.iter_mut()).enumerate() {
            let stream = input_stream(40, k as f64);
            let mut x_single = *x0;
            let mut x_preint = *x0;
            for u in &stream {
                x_single = single.evaluate(&x_single, u, dt).unwrap();
                x_preint = preint.evaluate(&x_preint, u, dt).unwrap();
            }
            assert!(
                (x_single.matrix() - x_preint.matrix()).norm() < TOLERANCE,
                "trajectory {k} diverged"
            );
        }
    }
}
