//! Decoupled IMU kinematics on a flat 15-vector state.
//!
//! The state is the plain vector `[φ, v, r, b_g, b_a]` with the rotation
//! carried as an axis-angle triple instead of a group element. Rotation,
//! velocity, and position are each propagated by their own strapdown
//! equation, so the Jacobians lack the full group coupling of
//! [`CoupledImuKinematicModel`](crate::process::coupled::CoupledImuKinematicModel).
//! Its role here is cross-validation: over one small step both models must
//! agree to integration order.
//!
//! Biases ride along unchanged through `evaluate`; they enter only through
//! the linearized model (the bias columns of the state Jacobian and the
//! bias rows of the noise map).

use crate::error::ImuResult;
use crate::manifold::{so3, Matrix12, Matrix15, Matrix15x12, Vector15};
use crate::process::{check_time_step, ImuInput};
use nalgebra::{Matrix3, Vector3};

/// Decoupled strapdown model on the flat state `[φ, v, r, b_g, b_a]`.
#[derive(Debug, Clone)]
pub struct DecoupledImuKinematicModel {
    q_c: Matrix12,
    g_a: Vector3<f64>,
}

impl DecoupledImuKinematicModel {
    /// Create a model from the continuous-time noise density and gravity
    /// vector.
    pub fn new(q_c: Matrix12, g_a: Vector3<f64>) -> Self {
        DecoupledImuKinematicModel { q_c, g_a }
    }

    /// Create a model with the standard z-up gravity vector.
    pub fn with_standard_gravity(q_c: Matrix12) -> Self {
        Self::new(q_c, crate::process::standard_gravity_vector())
    }

    /// The gravity vector.
    pub fn gravity(&self) -> &Vector3<f64> {
        &self.g_a
    }

    /// Propagate the flat state one step.
    ///
    /// Position integrates the trapezoid of the resolved acceleration,
    /// velocity the rectangle, and the rotation composes the gyro increment
    /// on the right. Biases pass through unchanged.
    ///
    /// # Errors
    /// [`ImuError::InvalidTimeStep`](crate::ImuError::InvalidTimeStep) if
    /// `Δt ≤ 0`.
    pub fn evaluate(&self, x: &Vector15, u: &ImuInput, dt: f64) -> ImuResult<Vector15> {
        check_time_step(dt)?;

        let phi = x.fixed_rows::<3>(0).into_owned();
        let v = x.fixed_rows::<3>(3).into_owned();
        let r = x.fixed_rows::<3>(6).into_owned();

        let c = so3::exp(&phi);
        let accel_resolved = self.g_a + c * u.accel;

        let r_next = r + dt * v + (dt * dt / 2.0) * accel_resolved;
        let v_next = v + dt * accel_resolved;
        let c_next = c * so3::exp(&(dt * u.gyro));

        let mut x_next = *x;
        x_next.fixed_rows_mut::<3>(0).copy_from(&so3::log(&c_next));
        x_next.fixed_rows_mut::<3>(3).copy_from(&v_next);
        x_next.fixed_rows_mut::<3>(6).copy_from(&r_next);
        Ok(x_next)
    }

    /// State Jacobian of the flat-state propagation, 15×15.
    ///
    /// # Errors
    /// [`ImuError::InvalidTimeStep`](crate::ImuError::InvalidTimeStep) if
    /// `Δt ≤ 0`.
    pub fn state_jacobian(&self, x: &Vector15, u: &ImuInput, dt: f64) -> ImuResult<Matrix15> {
        check_time_step(dt)?;

        let phi = x.fixed_rows::<3>(0).into_owned();
        let c = so3::exp(&phi);
        let accel_skew = so3::wedge(&(-(c * u.accel)));

        let mut f = Matrix15::identity();
        f.fixed_view_mut::<3, 3>(6, 3)
            .copy_from(&(dt * Matrix3::identity()));
        f.fixed_view_mut::<3, 3>(3, 0).copy_from(&(dt * accel_skew));
        f.fixed_view_mut::<3, 3>(6, 0)
            .copy_from(&((dt * dt / 2.0) * accel_skew));
        f.fixed_view_mut::<3, 3>(0, 9)
            .copy_from(&Self::rotation_bias_block(&c, u, dt));
        f.fixed_view_mut::<3, 3>(3, 12).copy_from(&(dt * c));
        f.fixed_view_mut::<3, 3>(6, 12)
            .copy_from(&((dt * dt / 2.0) * c));
        Ok(f)
    }

    /// Discrete process covariance `B (Q_c/Δt) Bᵀ`, 15×15.
    ///
    /// # Errors
    /// [`ImuError::InvalidTimeStep`](crate::ImuError::InvalidTimeStep) if
    /// `Δt ≤ 0`.
    pub fn covariance(&self, x: &Vector15, u: &ImuInput, dt: f64) -> ImuResult<Matrix15> {
        check_time_step(dt)?;

        let phi = x.fixed_rows::<3>(0).into_owned();
        let c = so3::exp(&phi);

        let mut b = Matrix15x12::zeros();
        b.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&Self::rotation_bias_block(&c, u, dt));
        b.fixed_view_mut::<3, 3>(3, 3).copy_from(&(dt * c));
        b.fixed_view_mut::<3, 3>(6, 3)
            .copy_from(&((dt * dt / 2.0) * c));
        b.fixed_view_mut::<6, 6>(9, 6)
            .copy_from(&nalgebra::Matrix6::identity());

        let q_n = self.q_c / dt;
        Ok(b * q_n * b.transpose())
    }

    // sensitivity of Log(C Exp(Δtω)) to the gyro increment, shared by the
    // gyro-bias column and the gyro-noise block
    fn rotation_bias_block(c: &Matrix3<f64>, u: &ImuInput, dt: f64) -> Matrix3<f64> {
        c * so3::exp(&(dt * u.gyro)) * (dt * so3::left_jacobian(&(-dt * u.gyro)))
    }
}
