//! Lie-group primitives for the SE_2(3) IMU process models.
//!
//! This module provides the matrix-Lie-group layer the process models are
//! built on:
//! - **SO(3)**: rotations on 3×3 direction-cosine matrices. Exponential and
//!   logarithm maps, wedge/vee, left Jacobian and its inverse, and the
//!   second-order integration factor (the "N matrix").
//! - **SE_2(3)**: the extended special Euclidean group. 5×5 matrices
//!   jointly encoding rotation, velocity, and position, with composition,
//!   adjoint, exponential/logarithm, and the 9×9 left Jacobian.
//! - **IE3**: auxiliary 5×5 matrices sharing SE_2(3)'s block layout but with
//!   an unconstrained trailing scalar; closed under composition with exact
//!   closed-form inverse and adjoint. Kinematic increments and gravity
//!   compensation elements live here; they are not valid poses themselves.
//!
//! Tangent vectors are ordered `[θ(3), ν(3), ρ(3)]`: rotation, velocity,
//! position. Every small-angle-sensitive map (left Jacobian inverse, Q
//! matrix, N matrix) carries an explicit Taylor branch so that near-zero
//! rotation increments stay finite; the process models rely on that and do
//! not guard against it themselves.

use nalgebra::{SMatrix, SVector};

pub mod ie3;
pub mod se_2_3;
pub mod so3;

/// 5×5 matrix representation shared by SE_2(3) elements and IE3 matrices.
pub type Matrix5 = SMatrix<f64, 5, 5>;

/// 9-dimensional tangent vector `[θ, ν, ρ]` of SE_2(3).
pub type Vector9 = SVector<f64, 9>;

/// 9×9 Jacobian/adjoint matrix on the SE_2(3) tangent space.
pub type Matrix9 = SMatrix<f64, 9, 9>;

/// 9×6 pose-versus-input (or pose-versus-bias) coupling block.
pub type Matrix9x6 = SMatrix<f64, 9, 6>;

/// 12×12 continuous-time IMU noise spectral density.
pub type Matrix12 = SMatrix<f64, 12, 12>;

/// 15-dimensional flat state `[φ, v, r, b_g, b_a]` of the decoupled model.
pub type Vector15 = SVector<f64, 15>;

/// 15×15 full-state (pose tangent + bias) Jacobian or covariance.
pub type Matrix15 = SMatrix<f64, 15, 15>;

/// 15×12 full-state noise map.
pub type Matrix15x12 = SMatrix<f64, 15, 12>;
