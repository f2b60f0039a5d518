//! Error types for the imu-preintegration library
//!
//! This module provides the main error and result types used throughout the
//! library. All errors use the `thiserror` crate for automatic trait
//! implementations.
//!
//! Configuration errors (an unrecognized perturbation convention) and
//! invalid-input errors (a non-positive time step) are non-recoverable and
//! surface immediately; numerical degeneracy is reported through the
//! covariance finiteness boundary rather than retried, since retrying does
//! not change deterministic arithmetic.

use thiserror::Error;

/// Main result type used throughout the imu-preintegration library
pub type ImuResult<T> = Result<T, ImuError>;

/// Main error type for the imu-preintegration library
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImuError {
    /// Unrecognized error-state perturbation convention
    #[error("invalid perturbation convention '{0}', expected 'left' or 'right'")]
    InvalidPerturbation(String),

    /// Non-positive integration time step
    #[error("non-positive time step dt = {0}; the kinematic increment is undefined")]
    InvalidTimeStep(f64),

    /// A computed covariance contains NaN or infinite entries
    #[error("covariance contains non-finite entries ({context})")]
    NonFiniteCovariance {
        /// Which computation produced the degenerate covariance
        context: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_perturbation_display() {
        let error = ImuError::InvalidPerturbation("middle".to_string());
        assert_eq!(
            error.to_string(),
            "invalid perturbation convention 'middle', expected 'left' or 'right'"
        );
    }

    #[test]
    fn test_invalid_time_step_display() {
        let error = ImuError::InvalidTimeStep(0.0);
        assert!(error.to_string().contains("dt = 0"));
    }

    #[test]
    fn test_imu_result_err() {
        let result: ImuResult<i32> = Err(ImuError::NonFiniteCovariance {
            context: "single-step covariance",
        });
        assert!(result.is_err());
    }
}
