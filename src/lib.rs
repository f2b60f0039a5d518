//! Preintegrated IMU process models on the extended pose group SE_2(3).
//!
//! This crate implements the process-model side of an invariant IMU filter:
//! a single-step kinematic model that propagates a 5×5 extended pose
//! (rotation, velocity, position) on the manifold, a preintegration
//! accumulator that composes many raw-rate steps into one exact
//! between-keyframe Jacobian/covariance, and a null-gated variant that
//! suppresses designated motion components during externally detected
//! zero-motion intervals.
//!
//! The `manifold` module supplies the Lie-group primitives the process
//! models are built from; the `process` module contains the models
//! themselves. Measurement updates, dataset loading, and the zero-motion
//! classifier are collaborator concerns and live outside this crate.

pub mod error;
pub mod logger;
pub mod manifold;
pub mod noise;
pub mod process;

pub use error::{ImuError, ImuResult};
pub use logger::{init_logger, init_logger_with_level};
pub use manifold::se_2_3::ExtendedPose;
pub use noise::ImuNoiseDensity;
pub use process::{
    coupled::CoupledImuKinematicModel, decoupled::DecoupledImuKinematicModel,
    null_gated::NullGatedImuModel, preintegrated::PreintegratedImuModel, ImuInput, Perturbation,
    RestMarkers,
};
