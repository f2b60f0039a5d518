//! Continuous-time IMU noise configuration.
//!
//! The process models consume a 12×12 continuous-time spectral density
//! `Q_c = diag(σ_g² I₃, σ_a² I₃, σ_bg² I₃, σ_ba² I₃)` covering gyro white
//! noise, accelerometer white noise, and the two bias random walks. This
//! module builds that matrix from per-sensor 1-sigma densities so that hosts
//! configure physical datasheet values instead of raw matrices.

use crate::manifold::Matrix12;

/// Continuous-time 1-sigma noise densities of an IMU.
///
/// Units follow the usual datasheet conventions: rad/s/√Hz for the gyro,
/// m/s²/√Hz for the accelerometer, and the corresponding /s·√Hz rates for
/// the bias random walks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuNoiseDensity {
    /// Gyroscope white-noise density
    pub sigma_gyro: f64,
    /// Accelerometer white-noise density
    pub sigma_accel: f64,
    /// Gyroscope bias random-walk density
    pub sigma_gyro_bias: f64,
    /// Accelerometer bias random-walk density
    pub sigma_accel_bias: f64,
}

impl ImuNoiseDensity {
    /// Create a noise configuration from the four 1-sigma densities.
    pub fn new(
        sigma_gyro: f64,
        sigma_accel: f64,
        sigma_gyro_bias: f64,
        sigma_accel_bias: f64,
    ) -> Self {
        ImuNoiseDensity {
            sigma_gyro,
            sigma_accel,
            sigma_gyro_bias,
            sigma_accel_bias,
        }
    }

    /// Build the 12×12 continuous-time spectral density `Q_c`.
    ///
    /// Block ordering matches the noise-map columns of the process models:
    /// gyro, accel, gyro bias walk, accel bias walk.
    pub fn to_matrix(&self) -> Matrix12 {
        let mut q_c = Matrix12::zeros();
        let variances = [
            self.sigma_gyro,
            self.sigma_accel,
            self.sigma_gyro_bias,
            self.sigma_accel_bias,
        ];

        for (block, sigma) in variances.iter().enumerate() {
            let variance = sigma * sigma;
            for axis in 0..3 {
                let i = 3 * block + axis;
                q_c[(i, i)] = variance;
            }
        }

        q_c
    }
}

impl Default for ImuNoiseDensity {
    /// Tactical-grade MEMS defaults in the EuRoC range.
    fn default() -> Self {
        ImuNoiseDensity::new(1.7e-4, 2.0e-3, 1.9e-5, 3.0e-3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_matrix_block_layout() {
        let noise = ImuNoiseDensity::new(2.0, 3.0, 4.0, 5.0);
        let q_c = noise.to_matrix();

        assert!((q_c[(0, 0)] - 4.0).abs() < 1e-12);
        assert!((q_c[(4, 4)] - 9.0).abs() < 1e-12);
        assert!((q_c[(8, 8)] - 16.0).abs() < 1e-12);
        assert!((q_c[(11, 11)] - 25.0).abs() < 1e-12);

        // purely diagonal
        let diagonal = Matrix12::from_diagonal(&q_c.diagonal());
        assert!((q_c - diagonal).norm() < 1e-12);
    }
}
