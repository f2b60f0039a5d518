//! SE_2(3) - Extended Special Euclidean Group (Rotation + Velocity + Position)
//!
//! This module implements the SE_2(3) Lie group on its 5×5 matrix
//! representation,
//!
//! ```text
//!     [ C  v  r ]
//! X = [ 0  1  0 ]     C ∈ SO(3), v, r ∈ ℝ³
//!     [ 0  0  1 ]
//! ```
//!
//! so that IMU kinematics become a single matrix composition. Tangent
//! elements are ordered `[θ(3), ν(3), ρ(3)]`: rotation, velocity, position.
//!
//! # References
//! - "Associating Uncertainty to Extended Poses for on Lie Group IMU
//!   Preintegration" - Brossard et al.
//! - "A micro Lie theory for state estimation in robotics" - Solà et al.

use crate::manifold::{so3, Matrix5, Matrix9, Vector9};
use nalgebra::{Matrix3, Vector3};
use std::fmt;

/// SE_2(3) group element stored as its 5×5 matrix representation.
///
/// The upper-left 3×3 block is the body-to-reference rotation, column 3
/// (rows 0-2) the velocity, column 4 (rows 0-2) the position; the bottom two
/// rows are the fixed `[0 0 0 1 0; 0 0 0 0 1]` pattern.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtendedPose {
    matrix: Matrix5,
}

impl fmt::Display for ExtendedPose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.velocity();
        let r = self.position();
        write!(
            f,
            "SE_2(3)(velocity: [{:.4}, {:.4}, {:.4}], position: [{:.4}, {:.4}, {:.4}])",
            v.x, v.y, v.z, r.x, r.y, r.z
        )
    }
}

impl ExtendedPose {
    /// Degrees of freedom - dimension of the tangent space
    pub const DOF: usize = 9;

    /// Get the identity element of the group.
    pub fn identity() -> Self {
        ExtendedPose {
            matrix: Matrix5::identity(),
        }
    }

    /// Create an SE_2(3) element from its rotation, velocity, and position.
    pub fn from_components(
        rotation: Matrix3<f64>,
        velocity: Vector3<f64>,
        position: Vector3<f64>,
    ) -> Self {
        let mut matrix = Matrix5::identity();
        matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&velocity);
        matrix.fixed_view_mut::<3, 1>(0, 4).copy_from(&position);
        ExtendedPose { matrix }
    }

    /// Wrap a raw 5×5 matrix without checking the block pattern.
    ///
    /// Intended for results of compositions that are known to preserve the
    /// pattern; use [`ExtendedPose::is_valid`] when in doubt.
    pub fn from_matrix_unchecked(matrix: Matrix5) -> Self {
        ExtendedPose { matrix }
    }

    /// Get the underlying 5×5 matrix.
    pub fn matrix(&self) -> &Matrix5 {
        &self.matrix
    }

    /// Get the rotation block C.
    pub fn rotation(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Get the velocity column v.
    pub fn velocity(&self) -> Vector3<f64> {
        self.matrix.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Get the position column r.
    pub fn position(&self) -> Vector3<f64> {
        self.matrix.fixed_view::<3, 1>(0, 4).into_owned()
    }

    /// Decompose into (rotation, velocity, position).
    pub fn to_components(&self) -> (Matrix3<f64>, Vector3<f64>, Vector3<f64>) {
        (self.rotation(), self.velocity(), self.position())
    }

    /// Group inverse: (Cᵀ, -Cᵀv, -Cᵀr).
    pub fn inverse(&self) -> Self {
        let (c, v, r) = self.to_components();
        let c_inv = c.transpose();
        ExtendedPose::from_components(c_inv, -c_inv * v, -c_inv * r)
    }

    /// Adjoint of the group element, transporting tangent perturbations
    /// through X.
    ///
    /// Block structure in `[θ, ν, ρ]` ordering:
    /// ```text
    /// [ C      0   0 ]
    /// [ [v]ₓC  C   0 ]
    /// [ [r]ₓC  0   C ]
    /// ```
    pub fn adjoint(&self) -> Matrix9 {
        let (c, v, r) = self.to_components();
        let mut adj = Matrix9::zeros();

        adj.fixed_view_mut::<3, 3>(0, 0).copy_from(&c);
        adj.fixed_view_mut::<3, 3>(3, 3).copy_from(&c);
        adj.fixed_view_mut::<3, 3>(6, 6).copy_from(&c);
        adj.fixed_view_mut::<3, 3>(3, 0)
            .copy_from(&(so3::wedge(&v) * c));
        adj.fixed_view_mut::<3, 3>(6, 0)
            .copy_from(&(so3::wedge(&r) * c));

        adj
    }

    /// Exponential map from the tangent space to SE_2(3).
    pub fn exp(xi: &Vector9) -> Self {
        let theta = xi.fixed_rows::<3>(0).into_owned();
        let nu = xi.fixed_rows::<3>(3).into_owned();
        let rho = xi.fixed_rows::<3>(6).into_owned();

        let jac = so3::left_jacobian(&theta);
        ExtendedPose::from_components(so3::exp(&theta), jac * nu, jac * rho)
    }

    /// Logarithm map from SE_2(3) to its tangent space.
    pub fn log(&self) -> Vector9 {
        let (c, v, r) = self.to_components();
        let theta = so3::log(&c);
        let jac_inv = so3::left_jacobian_inv(&theta);

        let mut xi = Vector9::zeros();
        xi.fixed_rows_mut::<3>(0).copy_from(&theta);
        xi.fixed_rows_mut::<3>(3).copy_from(&(jac_inv * v));
        xi.fixed_rows_mut::<3>(6).copy_from(&(jac_inv * r));
        xi
    }

    /// Check that the element satisfies the SE_2(3) constraints: orthonormal
    /// rotation block with determinant +1 and the fixed bottom-row pattern.
    pub fn is_valid(&self, tolerance: f64) -> bool {
        let c = self.rotation();
        let orthonormal = (c.transpose() * c - Matrix3::identity()).norm() < tolerance;
        let proper = (c.determinant() - 1.0).abs() < tolerance;

        let mut pattern = nalgebra::SMatrix::<f64, 2, 5>::zeros();
        pattern[(0, 3)] = 1.0;
        pattern[(1, 4)] = 1.0;
        let bottom = self.matrix.fixed_view::<2, 5>(3, 0).into_owned();

        orthonormal && proper && (bottom - pattern).norm() < tolerance
    }

    #[cfg(test)]
    pub fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        let mut sample = || {
            Vector3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            )
        };
        ExtendedPose::from_components(so3::exp(&sample()), sample(), 5.0 * sample())
    }
}

/// Left Jacobian of SE_2(3) in `[θ, ν, ρ]` ordering.
///
/// ```text
/// [ J_l(θ)     0       0    ]
/// [ Q(θ, ν)  J_l(θ)    0    ]
/// [ Q(θ, ρ)    0     J_l(θ) ]
/// ```
pub fn left_jacobian(xi: &Vector9) -> Matrix9 {
    let theta = xi.fixed_rows::<3>(0).into_owned();
    let nu = xi.fixed_rows::<3>(3).into_owned();
    let rho = xi.fixed_rows::<3>(6).into_owned();

    let jac_theta = so3::left_jacobian(&theta);
    let mut jac = Matrix9::zeros();

    jac.fixed_view_mut::<3, 3>(0, 0).copy_from(&jac_theta);
    jac.fixed_view_mut::<3, 3>(3, 3).copy_from(&jac_theta);
    jac.fixed_view_mut::<3, 3>(6, 6).copy_from(&jac_theta);
    jac.fixed_view_mut::<3, 3>(3, 0)
        .copy_from(&q_matrix(&theta, &nu));
    jac.fixed_view_mut::<3, 3>(6, 0)
        .copy_from(&q_matrix(&theta, &rho));

    jac
}

/// Q matrix coupling a translational-type tangent component to the rotation
/// (Barfoot, eq. 7.86).
fn q_matrix(phi: &Vector3<f64>, xi: &Vector3<f64>) -> Matrix3<f64> {
    let px = so3::wedge(phi);
    let xx = so3::wedge(xi);
    let theta_squared = phi.norm_squared();

    let (m2, m3, m4) = if theta_squared < so3::SMALL_ANGLE_SQUARED {
        (1.0 / 6.0, 1.0 / 24.0, 1.0 / 120.0)
    } else {
        let theta = theta_squared.sqrt();
        let theta_3 = theta_squared * theta;
        let theta_4 = theta_squared * theta_squared;
        let theta_5 = theta_4 * theta;
        let sin_theta = theta.sin();
        let cos_theta = theta.cos();

        (
            (theta - sin_theta) / theta_3,
            (0.5 * theta_squared + cos_theta - 1.0) / theta_4,
            (theta - 1.5 * sin_theta + 0.5 * theta * cos_theta) / theta_5,
        )
    };

    let t1 = px * xx + xx * px + px * xx * px;
    let t2 = px * px * xx + xx * px * px - 3.0 * px * xx * px;
    let t3 = px * xx * px * px + px * px * xx * px;

    0.5 * xx + m2 * t1 + m3 * t2 + m4 * t3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifold::so3;

    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn test_identity() {
        let identity = ExtendedPose::identity();
        assert!(identity.is_valid(TOLERANCE));
        assert!((identity.rotation() - Matrix3::identity()).norm() < TOLERANCE);
        assert!(identity.velocity().norm() < TOLERANCE);
        assert!(identity.position().norm() < TOLERANCE);
    }

    #[test]
    fn test_components_round_trip() {
        let c = so3::exp(&Vector3::new(0.1, -0.4, 0.2));
        let v = Vector3::new(1.0, -2.0, 0.5);
        let r = Vector3::new(10.0, 3.0, -7.0);

        let x = ExtendedPose::from_components(c, v, r);
        let (c2, v2, r2) = x.to_components();

        assert!((c - c2).norm() < TOLERANCE);
        assert!((v - v2).norm() < TOLERANCE);
        assert!((r - r2).norm() < TOLERANCE);
        assert!(x.is_valid(TOLERANCE));
    }

    #[test]
    fn test_inverse() {
        let x = ExtendedPose::random();
        let product = x.matrix() * x.inverse().matrix();
        assert!((product - Matrix5::identity()).norm() < 1e-10);
    }

    #[test]
    fn test_exp_log_round_trip() {
        let mut xi = Vector9::zeros();
        xi.copy_from_slice(&[0.2, -0.1, 0.3, 1.0, 0.5, -0.7, 2.0, -1.0, 0.4]);

        let x = ExtendedPose::exp(&xi);
        assert!(x.is_valid(TOLERANCE));
        assert!((x.log() - xi).norm() < 1e-10);
    }

    #[test]
    fn test_adjoint_transports_tangent() {
        // X Exp(ξ) X⁻¹ = Exp(Adj(X) ξ)
        let x = ExtendedPose::random();
        let mut xi = Vector9::zeros();
        xi.copy_from_slice(&[0.02, -0.01, 0.03, 0.1, 0.05, -0.07, 0.2, -0.1, 0.04]);

        let lhs = x.matrix() * ExtendedPose::exp(&xi).matrix() * x.inverse().matrix();
        let rhs = ExtendedPose::exp(&(x.adjoint() * xi));

        assert!((lhs - rhs.matrix()).norm() < 1e-9);
    }

    #[test]
    fn test_left_jacobian_small_angle() {
        let xi = Vector9::zeros();
        assert!((left_jacobian(&xi) - Matrix9::identity()).norm() < TOLERANCE);
    }

    // Exp(ξ + ε δ) ≈ Exp(ε J_l(ξ) δ) Exp(ξ), so
    // Log(Exp(ξ + ε δ) Exp(ξ)⁻¹) / ε → J_l(ξ) δ
    fn check_left_jacobian_against_finite_difference(xi: &Vector9) {
        let x_inv = ExtendedPose::exp(xi).inverse();
        let jac = left_jacobian(xi);

        let eps = 1e-6;
        for k in 0..9 {
            let mut delta = Vector9::zeros();
            delta[k] = eps;

            let plus = ExtendedPose::from_matrix_unchecked(
                ExtendedPose::exp(&(xi + delta)).matrix() * x_inv.matrix(),
            )
            .log();
            let minus = ExtendedPose::from_matrix_unchecked(
                ExtendedPose::exp(&(xi - delta)).matrix() * x_inv.matrix(),
            )
            .log();

            let column = (plus - minus) / (2.0 * eps);
            assert!(
                (column - jac.column(k)).norm() < 1e-5,
                "left Jacobian column {k} mismatch"
            );
        }
    }

    #[test]
    fn test_left_jacobian_finite_difference() {
        let mut xi = Vector9::zeros();
        xi.copy_from_slice(&[0.3, -0.2, 0.1, 0.5, -0.4, 0.2, 0.7, 0.1, -0.3]);
        check_left_jacobian_against_finite_difference(&xi);
    }

    #[test]
    fn test_left_jacobian_finite_difference_small_rotation() {
        // tiny rotation with order-one translational components drives the
        // Q-matrix coefficients through their cancellation-prone regime
        let mut xi = Vector9::zeros();
        xi.copy_from_slice(&[1e-5, -2e-5, 1.5e-5, 0.5, -0.4, 0.2, 0.7, 0.1, -0.3]);
        check_left_jacobian_against_finite_difference(&xi);
    }
}
