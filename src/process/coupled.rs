//! Coupled IMU process model on SE_2(3).
//!
//! One discrete step propagates the 5×5 extended pose as a single matrix
//! composition `x' = G x U`, where `U` packs the rotation exponential, a
//! left-Jacobian-weighted velocity increment, and a second-order position
//! increment built from the input, and `G` applies gravity and the elapsed
//! time. Both are IE3 matrices, which gives exact closed-form state
//! Jacobians through their adjoints.

use crate::error::{ImuError, ImuResult};
use crate::manifold::ie3::Ie3;
use crate::manifold::se_2_3::{self, ExtendedPose};
use crate::manifold::{so3, Matrix12, Matrix15, Matrix15x12, Matrix9x6, Vector9};
use crate::process::{check_time_step, ImuInput, Perturbation};
use nalgebra::{Matrix3, Vector3};
use tracing::debug;

/// Generic coupled IMU process model in SE_2(3).
///
/// Stateless aside from its construction-time parameters: the
/// continuous-time noise density `Q_c`, the gravity vector, and the
/// perturbation convention.
#[derive(Debug, Clone)]
pub struct CoupledImuKinematicModel {
    q_c: Matrix12,
    g_a: Vector3<f64>,
    perturbation: Perturbation,
}

impl CoupledImuKinematicModel {
    /// Create a model from the continuous-time noise density, perturbation
    /// convention, and gravity vector.
    pub fn new(q_c: Matrix12, perturbation: Perturbation, g_a: Vector3<f64>) -> Self {
        CoupledImuKinematicModel {
            q_c,
            g_a,
            perturbation,
        }
    }

    /// Create a model with the standard z-up gravity vector
    /// `[0, 0, -9.80665]`.
    pub fn with_standard_gravity(q_c: Matrix12, perturbation: Perturbation) -> Self {
        Self::new(q_c, perturbation, crate::process::standard_gravity_vector())
    }

    /// The continuous-time noise spectral density.
    pub fn noise_density(&self) -> &Matrix12 {
        &self.q_c
    }

    /// The gravity vector.
    pub fn gravity(&self) -> &Vector3<f64> {
        &self.g_a
    }

    /// The perturbation convention.
    pub fn perturbation(&self) -> Perturbation {
        self.perturbation
    }

    /// Build the kinematic increment `U` from one input sample and Δt.
    ///
    /// ```text
    ///     [ Exp(Δtω)   Δt J_l(Δtω) a   (Δt²/2) N(Δtω) a ]
    /// U = [    0             1               Δt         ]
    ///     [    0             0               1          ]
    /// ```
    pub fn generate_u(u: &ImuInput, dt: f64) -> Ie3 {
        let phi = dt * u.gyro;
        Ie3::from_components(
            so3::exp(&phi),
            dt * so3::left_jacobian(&phi) * u.accel,
            (dt * dt / 2.0) * so3::n_matrix(&phi) * u.accel,
            dt,
        )
    }

    /// Build the gravity compensation element `G` from Δt and the gravity
    /// vector.
    ///
    /// ```text
    ///     [ I   Δt g   -(Δt²/2) g ]
    /// G = [ 0    1        -Δt     ]
    ///     [ 0    0         1      ]
    /// ```
    pub fn generate_g(dt: f64, g_a: &Vector3<f64>) -> Ie3 {
        Ie3::from_components(
            Matrix3::identity(),
            dt * g_a,
            -(dt * dt / 2.0) * g_a,
            -dt,
        )
    }

    /// ℝ⁹ parameterization ν of the increment: `U = T(Δt) Exp(ν)` where
    /// `T(Δt)` is the time-machine element separating the trailing scalar.
    pub fn generate_nu(u: &ImuInput, dt: f64) -> Vector9 {
        let phi = dt * u.gyro;
        let position_term = (dt * dt / 2.0)
            * so3::left_jacobian_inv(&phi)
            * so3::n_matrix(&phi)
            * u.accel;

        let mut nu = Vector9::zeros();
        nu.fixed_rows_mut::<3>(0).copy_from(&phi);
        nu.fixed_rows_mut::<3>(3).copy_from(&(dt * u.accel));
        nu.fixed_rows_mut::<3>(6).copy_from(&position_term);
        nu
    }

    /// Approximate Jacobian Υ of [`Self::generate_nu`] with respect to the
    /// input `[ω, a]`.
    ///
    /// The gyro and accel columns of the rotation/velocity rows and the
    /// accel column of the position row are exact; the position/gyro
    /// coupling is the series
    /// `Υ₃₀ = (Δt³/12) [a]ₓ - (Δt³/720) W` truncated after the cubic term
    /// of `J_l⁻¹(Δtω) N(Δtω)`, with
    /// `W = [Δtω]ₓ²[a]ₓ + [Δtω]ₓ[[Δtω]ₓa]ₓ + [[Δtω]ₓ²a]ₓ`.
    pub fn generate_upsilon(u: &ImuInput, dt: f64) -> Matrix9x6 {
        let phi = dt * u.gyro;
        let om = so3::wedge(&phi);
        let om_om = om * om;
        let accel_skew = so3::wedge(&u.accel);

        let w = om_om * accel_skew
            + om * so3::wedge(&(om * u.accel))
            + so3::wedge(&(om_om * u.accel));

        let dt_3 = dt * dt * dt;
        let upsilon_30 = (dt_3 / 12.0) * accel_skew - (dt_3 / 720.0) * w;
        let upsilon_31 =
            (dt * dt / 2.0) * so3::left_jacobian_inv(&phi) * so3::n_matrix(&phi);

        let dt_eye = dt * Matrix3::identity();
        let mut upsilon = Matrix9x6::zeros();
        upsilon.fixed_view_mut::<3, 3>(0, 0).copy_from(&dt_eye);
        upsilon.fixed_view_mut::<3, 3>(3, 3).copy_from(&dt_eye);
        upsilon.fixed_view_mut::<3, 3>(6, 0).copy_from(&upsilon_30);
        upsilon.fixed_view_mut::<3, 3>(6, 3).copy_from(&upsilon_31);
        upsilon
    }

    /// Per-step pose input Jacobian (9×6, excluding the bias rows):
    /// `L = J_l(-ν) Υ` through the SE_2(3) left Jacobian.
    pub fn pose_input_jacobian(u: &ImuInput, dt: f64) -> Matrix9x6 {
        se_2_3::left_jacobian(&(-Self::generate_nu(u, dt))) * Self::generate_upsilon(u, dt)
    }

    /// Propagate the state one step: `x' = G x U`.
    ///
    /// # Errors
    /// [`ImuError::InvalidTimeStep`] if `Δt ≤ 0`.
    pub fn evaluate(&self, x: &ExtendedPose, u: &ImuInput, dt: f64) -> ImuResult<ExtendedPose> {
        check_time_step(dt)?;

        let u_k = Self::generate_u(u, dt);
        let g_k = Self::generate_g(dt, &self.g_a);

        Ok(ExtendedPose::from_matrix_unchecked(
            g_k.matrix() * x.matrix() * u_k.matrix(),
        ))
    }

    /// Process Jacobian with respect to the 15-dimensional error state
    /// (9 pose tangent + 6 bias).
    ///
    /// Right convention:
    /// ```text
    /// F = [ Adj(U⁻¹)   -L ]
    ///     [    0        I ]
    /// ```
    /// Left convention:
    /// ```text
    /// F = [ Adj(G)   -Adj(x) L ]
    ///     [   0          I     ]
    /// ```
    pub fn state_jacobian(&self, x: &ExtendedPose, u: &ImuInput, dt: f64) -> ImuResult<Matrix15> {
        check_time_step(dt)?;

        let pose_input = Self::pose_input_jacobian(u, dt);
        let mut jac = Matrix15::identity();

        match self.perturbation {
            Perturbation::Right => {
                jac.fixed_view_mut::<9, 9>(0, 0)
                    .copy_from(&Self::generate_u(u, dt).inverse().adjoint());
                jac.fixed_view_mut::<9, 6>(0, 9).copy_from(&(-pose_input));
            }
            Perturbation::Left => {
                jac.fixed_view_mut::<9, 9>(0, 0)
                    .copy_from(&Self::generate_g(dt, &self.g_a).adjoint());
                jac.fixed_view_mut::<9, 6>(0, 9)
                    .copy_from(&(-x.adjoint() * pose_input));
            }
        }

        Ok(jac)
    }

    /// Process Jacobian with respect to the 12-dimensional noise vector
    /// (gyro, accel, gyro bias walk, accel bias walk).
    pub fn input_jacobian(&self, x: &ExtendedPose, u: &ImuInput, dt: f64) -> ImuResult<Matrix15x12> {
        check_time_step(dt)?;

        let pose_input = match self.perturbation {
            Perturbation::Right => Self::pose_input_jacobian(u, dt),
            Perturbation::Left => x.adjoint() * Self::pose_input_jacobian(u, dt),
        };

        let mut jac = Matrix15x12::zeros();
        jac.fixed_view_mut::<9, 6>(0, 0).copy_from(&pose_input);
        jac.fixed_view_mut::<6, 6>(9, 6)
            .copy_from(&(dt * nalgebra::Matrix6::identity()));
        Ok(jac)
    }

    /// Discrete-time process covariance `Q_k = L (Q_c/Δt) Lᵀ`.
    ///
    /// # Errors
    /// [`ImuError::InvalidTimeStep`] for `Δt ≤ 0`;
    /// [`ImuError::NonFiniteCovariance`] if the result contains NaN/Inf
    /// entries (numerical degeneracy is surfaced, never masked).
    pub fn covariance(&self, x: &ExtendedPose, u: &ImuInput, dt: f64) -> ImuResult<Matrix15> {
        let input_jac = self.input_jacobian(x, u, dt)?;
        let q_k = input_jac * (self.q_c / dt) * input_jac.transpose();

        if q_k.iter().all(|entry| entry.is_finite()) {
            Ok(q_k)
        } else {
            debug!(dt, "single-step covariance has non-finite entries");
            Err(ImuError::NonFiniteCovariance {
                context: "single-step covariance",
            })
        }
    }
}
