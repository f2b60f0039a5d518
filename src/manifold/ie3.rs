//! IE3 - auxiliary 5×5 propagation matrices
//!
//! Kinematic increments `U` and gravity compensation elements `G` share the
//! SE_2(3) block layout but carry an arbitrary scalar in the trailing
//! position,
//!
//! ```text
//!     [ C  v  r ]
//! X = [ 0  1  c ]     c ∈ ℝ unconstrained
//!     [ 0  0  1 ]
//! ```
//!
//! so they are not SE_2(3) elements. The set is nevertheless closed under
//! matrix composition and admits exact closed-form inverse and adjoint maps,
//! which is what makes the O(1) preintegrated Jacobian recursion possible.

use crate::manifold::{so3, Matrix5, Matrix9};
use nalgebra::{Matrix3, Vector3};
use std::ops::Mul;

/// A 5×5 IE3 matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ie3 {
    matrix: Matrix5,
}

impl Ie3 {
    /// Get the identity element.
    pub fn identity() -> Self {
        Ie3 {
            matrix: Matrix5::identity(),
        }
    }

    /// Assemble an IE3 matrix from its blocks.
    pub fn from_components(
        rotation: Matrix3<f64>,
        velocity: Vector3<f64>,
        position: Vector3<f64>,
        scalar: f64,
    ) -> Self {
        let mut matrix = Matrix5::identity();
        matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&velocity);
        matrix.fixed_view_mut::<3, 1>(0, 4).copy_from(&position);
        matrix[(3, 4)] = scalar;
        Ie3 { matrix }
    }

    /// Get the underlying 5×5 matrix.
    pub fn matrix(&self) -> &Matrix5 {
        &self.matrix
    }

    /// Decompose into (rotation block, velocity column, position column,
    /// trailing scalar).
    pub fn to_components(&self) -> (Matrix3<f64>, Vector3<f64>, Vector3<f64>, f64) {
        (
            self.matrix.fixed_view::<3, 3>(0, 0).into_owned(),
            self.matrix.fixed_view::<3, 1>(0, 3).into_owned(),
            self.matrix.fixed_view::<3, 1>(0, 4).into_owned(),
            self.matrix[(3, 4)],
        )
    }

    /// Exact inverse.
    ///
    /// ```text
    ///        [ Cᵀ  -Cᵀv  Cᵀ(cv - r) ]
    /// X⁻¹ =  [ 0     1      -c      ]
    ///        [ 0     0       1      ]
    /// ```
    pub fn inverse(&self) -> Self {
        let (c, v, r, scalar) = self.to_components();
        let c_inv = c.transpose();
        Ie3::from_components(c_inv, -c_inv * v, c_inv * (scalar * v - r), -scalar)
    }

    /// Exact adjoint in `[θ, ν, ρ]` tangent ordering.
    ///
    /// ```text
    /// [ C            0    0 ]
    /// [ [v]ₓC        C    0 ]
    /// [ -[cv - r]ₓC  -cC  C ]
    /// ```
    ///
    /// Reduces to the SE_2(3) adjoint when the trailing scalar is zero.
    pub fn adjoint(&self) -> Matrix9 {
        let (c, v, r, scalar) = self.to_components();
        let mut adj = Matrix9::zeros();

        adj.fixed_view_mut::<3, 3>(0, 0).copy_from(&c);
        adj.fixed_view_mut::<3, 3>(3, 3).copy_from(&c);
        adj.fixed_view_mut::<3, 3>(6, 6).copy_from(&c);
        adj.fixed_view_mut::<3, 3>(3, 0)
            .copy_from(&(so3::wedge(&v) * c));
        adj.fixed_view_mut::<3, 3>(6, 0)
            .copy_from(&(-so3::wedge(&(scalar * v - r)) * c));
        adj.fixed_view_mut::<3, 3>(6, 3)
            .copy_from(&(-scalar * c));

        adj
    }
}

impl Mul for Ie3 {
    type Output = Ie3;

    fn mul(self, rhs: Ie3) -> Ie3 {
        Ie3 {
            matrix: self.matrix * rhs.matrix,
        }
    }
}
