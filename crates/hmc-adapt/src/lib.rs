#![deny(missing_docs)]

//! Online mass-matrix adaptation for Hamiltonian Monte Carlo.
//!
//! Running estimators accumulate the stream of visited parameter vectors,
//! preconditioners turn them into a shrinkage-regularised inverse mass matrix
//! once enough samples exist, and metrics expose that matrix to the
//! Hamiltonian for momentum draws and kinetic energy.

/// Preconditioner state persistence.
pub mod checkpoint;
/// YAML configuration schema and defaults.
pub mod config;
/// Naive and Welford variance/covariance estimators.
pub mod estimator;
/// Metric tags and preconditioner/metric construction.
pub mod factory;
/// Euclidean metrics over the inverse mass matrix.
pub mod metric;
/// Unit, diagonal and dense preconditioners.
pub mod preconditioner;

pub use checkpoint::AdaptCheckpoint;
pub use config::AdaptConfig;
pub use estimator::{CovEstimator, NaiveCov, NaiveVar, VarEstimator, WelfordCov, WelfordVar};
pub use factory::MetricKind;
pub use hmc_core::{AdaptError, ErrorInfo, Real, RngHandle};
pub use metric::{
    DenseEuclideanMetric, DiagEuclideanMetric, EuclideanMetric, InvMass, Metric,
    UnitEuclideanMetric,
};
pub use preconditioner::{
    DensePreconditioner, DiagPreconditioner, Precondition, Preconditioner, UnitPreconditioner,
    DEFAULT_N_MIN,
};
