//! IMU process models on SE_2(3).
//!
//! Three model families share the types in this module:
//! - [`coupled::CoupledImuKinematicModel`]: the single-step kinematic model
//!   on the 5×5 extended pose, with exact per-step state/noise Jacobians.
//! - [`preintegrated::PreintegratedImuModel`]: the preintegration
//!   accumulator, composing many raw-rate steps into one between-keyframe
//!   Jacobian/covariance.
//! - [`decoupled::DecoupledImuKinematicModel`]: an independent flat
//!   15-vector variant used to cross-validate the manifold math.
//! - [`null_gated::NullGatedImuModel`]: the coupled model with externally
//!   classified zero-motion components suppressed per step.
//!
//! All models are built for one trajectory; independent trajectories are an
//! ordered sequence of states driven by per-trajectory model instances (the
//! stateless models can be shared, the accumulator cannot).

use crate::error::{ImuError, ImuResult};
use nalgebra::Vector3;
use std::fmt;
use std::str::FromStr;

pub mod coupled;
pub mod decoupled;
pub mod null_gated;
pub mod preintegrated;

/// Standard gravitational acceleration in m/s².
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Gravity vector in a z-up reference frame.
pub fn standard_gravity_vector() -> Vector3<f64> {
    Vector3::new(0.0, 0.0, -STANDARD_GRAVITY)
}

/// Error-state perturbation convention, fixed at model construction.
///
/// Determines which frame the estimation error is expressed in and with it
/// the form of every Jacobian: `Right` yields the right-invariant
/// error-state formulas, `Left` the left-invariant ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Perturbation {
    /// Error right-multiplies the state: x = x̂ Exp(ξ)
    #[default]
    Right,
    /// Error left-multiplies the state: x = Exp(ξ) x̂
    Left,
}

impl FromStr for Perturbation {
    type Err = ImuError;

    fn from_str(s: &str) -> ImuResult<Self> {
        match s {
            "right" => Ok(Perturbation::Right),
            "left" => Ok(Perturbation::Left),
            other => Err(ImuError::InvalidPerturbation(other.to_string())),
        }
    }
}

impl fmt::Display for Perturbation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Perturbation::Right => write!(f, "right"),
            Perturbation::Left => write!(f, "left"),
        }
    }
}

/// One IMU sample: angular velocity and specific force at a single instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuInput {
    /// Angular velocity ω in rad/s, body frame
    pub gyro: Vector3<f64>,
    /// Specific force (accelerometer reading) a in m/s², body frame
    pub accel: Vector3<f64>,
}

impl ImuInput {
    /// Create an input from gyro and accelerometer readings.
    pub fn new(gyro: Vector3<f64>, accel: Vector3<f64>) -> Self {
        ImuInput { gyro, accel }
    }
}

/// Per-step zero-motion markers supplied by an external classifier.
///
/// Inputs to the null-gated model only; they are read for one call and never
/// persisted by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestMarkers {
    /// The body is not rotating: suppress the rotation increment.
    pub angular_rest: bool,
    /// Zero-velocity interval: suppress velocity/position propagation and
    /// gravity compensation.
    pub linear_rest: bool,
}

/// Reject non-positive integration intervals before any division by Δt.
pub(crate) fn check_time_step(dt: f64) -> ImuResult<()> {
    if dt > 0.0 {
        Ok(())
    } else {
        Err(ImuError::InvalidTimeStep(dt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perturbation_from_str() {
        assert_eq!("right".parse::<Perturbation>(), Ok(Perturbation::Right));
        assert_eq!("left".parse::<Perturbation>(), Ok(Perturbation::Left));
        assert!(matches!(
            "Left".parse::<Perturbation>(),
            Err(ImuError::InvalidPerturbation(_))
        ));
    }

    #[test]
    fn test_check_time_step() {
        assert!(check_time_step(1.0 / 400.0).is_ok());
        assert_eq!(check_time_step(0.0), Err(ImuError::InvalidTimeStep(0.0)));
        assert_eq!(
            check_time_step(-0.01),
            Err(ImuError::InvalidTimeStep(-0.01))
        );
    }
}
