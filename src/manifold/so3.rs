//! SO(3) - Special Orthogonal Group in 3D
//!
//! This module implements the rotation-group primitives on 3×3
//! direction-cosine matrices, which is the representation the 5×5 extended
//! pose matrices embed directly. The exponential and logarithm maps delegate
//! to nalgebra's `Rotation3`, which handles the small-angle and
//! near-π branches; the Jacobian maps carry their own Taylor branches.
//!
//! Tangent elements are axis-angle vectors in R³: direction gives the axis
//! of rotation, magnitude gives the angle.

use nalgebra::{Matrix3, Rotation3, Vector3};

/// Angle-squared threshold below which Taylor branches are used.
///
/// At θ < 1e-4 the second-order truncations are accurate to ≲1e-14, while
/// the closed forms' `(1 - cos θ)/θ²`-type coefficients are already
/// dominated by cancellation noise. The threshold must sit above that
/// crossover, not at the smallest representable angle.
pub(crate) const SMALL_ANGLE_SQUARED: f64 = 1e-8;

/// Wedge (hat) operator: maps an axis-angle vector to its skew-symmetric
/// matrix.
///
/// [θ]ₓ = [0 -θz θy; θz 0 -θx; -θy θx 0]
pub fn wedge(phi: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -phi.z, phi.y, //
        phi.z, 0.0, -phi.x, //
        -phi.y, phi.x, 0.0,
    )
}

/// Vee operator: inverse of [`wedge`], extracting the axis-angle vector from
/// a skew-symmetric matrix.
pub fn vee(m: &Matrix3<f64>) -> Vector3<f64> {
    Vector3::new(m[(2, 1)], m[(0, 2)], m[(1, 0)])
}

/// Exponential map from so(3) to SO(3).
///
/// Returns the rotation matrix Exp([φ]ₓ) via Rodrigues' formula.
pub fn exp(phi: &Vector3<f64>) -> Matrix3<f64> {
    Rotation3::new(*phi).into_inner()
}

/// Logarithm map from SO(3) to so(3).
///
/// Returns the axis-angle vector φ such that Exp([φ]ₓ) = C. The angle is
/// extracted as atan2 of the skew part's magnitude against (tr C - 1)/2,
/// which keeps full precision near identity; an acos of the trace loses half
/// the significant digits there and turns into NaN when round-off pushes the
/// trace of a near-identity product above 3. The caller is responsible for
/// `c` being a valid rotation matrix.
pub fn log(c: &Matrix3<f64>) -> Vector3<f64> {
    // w = sin θ · axis
    let w = vee(&((c - c.transpose()) * 0.5));
    let sin_theta = w.norm();
    let cos_theta = 0.5 * (c.trace() - 1.0);
    let theta = sin_theta.atan2(cos_theta);

    if sin_theta < 1e-6 {
        if cos_theta > 0.0 {
            // θ/sin θ = 1 + θ²/6 + O(θ⁴)
            return w * (1.0 + theta * theta / 6.0);
        }
        // θ near π: the skew part vanishes, so recover the axis from the
        // symmetric part cos θ I + (1 - cos θ) aaᵀ instead
        let outer =
            ((c + c.transpose()) * 0.5 - Matrix3::identity() * cos_theta) / (1.0 - cos_theta);
        let k = if outer[(0, 0)] >= outer[(1, 1)] && outer[(0, 0)] >= outer[(2, 2)] {
            0
        } else if outer[(1, 1)] >= outer[(2, 2)] {
            1
        } else {
            2
        };
        let mut axis = outer.column(k).into_owned();
        axis.normalize_mut();
        if w.dot(&axis) < 0.0 {
            axis = -axis;
        }
        return axis * theta;
    }

    w * (theta / sin_theta)
}

/// Left Jacobian of SO(3).
///
/// J_l(φ) = I + (1 - cos θ)/θ² [φ]ₓ + (θ - sin θ)/θ³ [φ]ₓ²
pub fn left_jacobian(phi: &Vector3<f64>) -> Matrix3<f64> {
    let theta_squared = phi.norm_squared();
    let phi_skew = wedge(phi);

    if theta_squared < SMALL_ANGLE_SQUARED {
        Matrix3::identity() + 0.5 * phi_skew + phi_skew * phi_skew / 6.0
    } else {
        let theta = theta_squared.sqrt();
        let sin_theta = theta.sin();
        let cos_theta = theta.cos();

        Matrix3::identity()
            + (1.0 - cos_theta) / theta_squared * phi_skew
            + (theta - sin_theta) / (theta_squared * theta) * phi_skew * phi_skew
    }
}

/// Inverse of the left Jacobian of SO(3).
///
/// J_l⁻¹(φ) = I - ½[φ]ₓ + (1/θ² - (1 + cos θ)/(2θ sin θ)) [φ]ₓ²
///
/// The closed form is indeterminate as θ → 0; the Taylor branch keeps the
/// map finite there. θ near π (where sin θ vanishes) never occurs for
/// per-step rotation increments at sensor rate.
pub fn left_jacobian_inv(phi: &Vector3<f64>) -> Matrix3<f64> {
    let theta_squared = phi.norm_squared();
    let phi_skew = wedge(phi);

    if theta_squared < SMALL_ANGLE_SQUARED {
        Matrix3::identity() - 0.5 * phi_skew + phi_skew * phi_skew / 12.0
    } else {
        let theta = theta_squared.sqrt();
        let sin_theta = theta.sin();
        let cos_theta = theta.cos();

        Matrix3::identity() - 0.5 * phi_skew
            + (1.0 / theta_squared - (1.0 + cos_theta) / (2.0 * theta * sin_theta))
                * phi_skew
                * phi_skew
    }
}

/// Second-order integration factor for the position increment
/// (Barfoot, eq. 9.211).
///
/// N(φ) = 2(1 - cos θ)/θ² I + (1 - 2(1 - cos θ)/θ²) aaᵀ
///        + 2(θ - sin θ)/θ² [a]ₓ,  a = φ/θ
///
/// Equivalently the series 2 Σₙ [φ]ₓⁿ/(n+2)!, which the Taylor branch
/// truncates.
pub fn n_matrix(phi: &Vector3<f64>) -> Matrix3<f64> {
    let theta_squared = phi.norm_squared();

    if theta_squared < SMALL_ANGLE_SQUARED {
        let phi_skew = wedge(phi);
        Matrix3::identity() + phi_skew / 3.0 + phi_skew * phi_skew / 12.0
    } else {
        let theta = theta_squared.sqrt();
        let axis = phi / theta;
        let c = 2.0 * (1.0 - theta.cos()) / theta_squared;
        let s = 2.0 * (theta - theta.sin()) / theta_squared;

        c * Matrix3::identity() + (1.0 - c) * (axis * axis.transpose()) + s * wedge(&axis)
    }
}
