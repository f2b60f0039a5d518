//! Zero-motion gated variant of the coupled SE_2(3) model.
//!
//! An external classifier (stance detector, zero-velocity detector) marks
//! each step with [`RestMarkers`]; the model suppresses the corresponding
//! parts of the kinematic increment before propagating. An angular rest
//! forces the rotation increment to identity. A linear rest freezes velocity
//! and position entirely, including the gravity compensation element, since
//! a body known to be at rest must not accumulate gravity drift.
//!
//! The markers are read per call and never stored, so one model instance
//! can serve any interleaving of moving and resting steps.

use crate::error::{ImuError, ImuResult};
use crate::manifold::ie3::Ie3;
use crate::manifold::se_2_3::ExtendedPose;
use crate::manifold::{Matrix12, Matrix15, Matrix15x12};
use crate::process::coupled::CoupledImuKinematicModel;
use crate::process::{check_time_step, ImuInput, Perturbation, RestMarkers};
use nalgebra::{Matrix3, Vector3};
use tracing::debug;

/// Coupled SE_2(3) kinematics with per-step zero-motion gating.
#[derive(Debug, Clone)]
pub struct NullGatedImuModel {
    inner: CoupledImuKinematicModel,
}

impl NullGatedImuModel {
    /// Create a model from the continuous-time noise density, perturbation
    /// convention, and gravity vector.
    pub fn new(q_c: Matrix12, perturbation: Perturbation, g_a: Vector3<f64>) -> Self {
        NullGatedImuModel {
            inner: CoupledImuKinematicModel::new(q_c, perturbation, g_a),
        }
    }

    /// Create a model with the standard z-up gravity vector.
    pub fn with_standard_gravity(q_c: Matrix12, perturbation: Perturbation) -> Self {
        NullGatedImuModel {
            inner: CoupledImuKinematicModel::with_standard_gravity(q_c, perturbation),
        }
    }

    /// The ungated base model.
    pub fn inner(&self) -> &CoupledImuKinematicModel {
        &self.inner
    }

    fn gated_increment(u: &ImuInput, dt: f64, markers: RestMarkers) -> Ie3 {
        let u_k = CoupledImuKinematicModel::generate_u(u, dt);
        let (c, v, r, scalar) = u_k.to_components();
        let c = if markers.angular_rest {
            Matrix3::identity()
        } else {
            c
        };
        if markers.linear_rest {
            Ie3::from_components(c, Vector3::zeros(), Vector3::zeros(), 0.0)
        } else {
            Ie3::from_components(c, v, r, scalar)
        }
    }

    /// Propagate one step with the marked zero-motion components held still.
    ///
    /// With no markers set this is exactly the base model's propagation.
    ///
    /// # Errors
    /// [`ImuError::InvalidTimeStep`] if `Δt ≤ 0`.
    pub fn evaluate(
        &self,
        x: &ExtendedPose,
        u: &ImuInput,
        dt: f64,
        markers: RestMarkers,
    ) -> ImuResult<ExtendedPose> {
        check_time_step(dt)?;

        let u_k = Self::gated_increment(u, dt, markers);
        if markers.linear_rest {
            // gravity compensation is skipped with the linear increment
            return Ok(ExtendedPose::from_matrix_unchecked(
                x.matrix() * u_k.matrix(),
            ));
        }
        let g_k = CoupledImuKinematicModel::generate_g(dt, self.inner.gravity());
        Ok(ExtendedPose::from_matrix_unchecked(
            g_k.matrix() * x.matrix() * u_k.matrix(),
        ))
    }

    /// State Jacobian with the gated error components decoupled.
    ///
    /// Rows of suppressed components become pure identity rows: their error
    /// neither evolves nor feeds from any other component.
    ///
    /// # Errors
    /// [`ImuError::InvalidTimeStep`] if `Δt ≤ 0`.
    pub fn state_jacobian(
        &self,
        x: &ExtendedPose,
        u: &ImuInput,
        dt: f64,
        markers: RestMarkers,
    ) -> ImuResult<Matrix15> {
        let mut f = self.inner.state_jacobian(x, u, dt)?;
        if markers.angular_rest {
            f.fixed_view_mut::<3, 15>(0, 0).fill(0.0);
            f.fixed_view_mut::<3, 3>(0, 0)
                .copy_from(&Matrix3::identity());
        }
        if markers.linear_rest {
            f.fixed_view_mut::<6, 15>(3, 0).fill(0.0);
            f.fixed_view_mut::<3, 3>(3, 3)
                .copy_from(&Matrix3::identity());
            f.fixed_view_mut::<3, 3>(6, 6)
                .copy_from(&Matrix3::identity());
        }
        Ok(f)
    }

    /// Input Jacobian with the gated rows zeroed.
    ///
    /// Suppressed components admit no input noise at all, so their rows are
    /// zero without any identity reinsertion.
    ///
    /// # Errors
    /// [`ImuError::InvalidTimeStep`] if `Δt ≤ 0`.
    pub fn input_jacobian(
        &self,
        x: &ExtendedPose,
        u: &ImuInput,
        dt: f64,
        markers: RestMarkers,
    ) -> ImuResult<Matrix15x12> {
        let mut l = self.inner.input_jacobian(x, u, dt)?;
        if markers.angular_rest {
            l.fixed_view_mut::<3, 12>(0, 0).fill(0.0);
        }
        if markers.linear_rest {
            l.fixed_view_mut::<6, 12>(3, 0).fill(0.0);
        }
        Ok(l)
    }

    /// Discrete process covariance built from the gated input Jacobian.
    ///
    /// # Errors
    /// [`ImuError::InvalidTimeStep`] if `Δt ≤ 0`,
    /// [`ImuError::NonFiniteCovariance`] on NaN/Inf entries.
    pub fn covariance(
        &self,
        x: &ExtendedPose,
        u: &ImuInput,
        dt: f64,
        markers: RestMarkers,
    ) -> ImuResult<Matrix15> {
        let input_jac = self.input_jacobian(x, u, dt, markers)?;
        let q = input_jac * (*self.inner.noise_density() / dt) * input_jac.transpose();

        if q.iter().all(|entry| entry.is_finite()) {
            Ok(q)
        } else {
            debug!(dt, "null-gated covariance has non-finite entries");
            Err(ImuError::NonFiniteCovariance {
                context: "null-gated covariance",
            })
        }
    }
}
