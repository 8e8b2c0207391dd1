use hmc_core::errors::ErrorInfo;
use hmc_core::{AdaptError, Real};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::estimator::{check_shape, CovEstimator, VarEstimator, WelfordCov, WelfordVar};
use crate::metric::InvMass;

/// Samples an estimator must hold before its estimate replaces the cached one.
pub const DEFAULT_N_MIN: usize = 10;

/// Adaptive estimate of the inverse mass matrix.
///
/// The sampling driver calls [`Precondition::adapt`] once per iteration, in
/// order, from a single thread. Each chain owns its own preconditioner.
pub trait Precondition<T: Real> {
    /// Feeds one parameter draw into the estimator.
    ///
    /// `alpha` is the acceptance statistic of the transition that produced
    /// `theta`. It is accepted for sample-weighting adaptors and ignored by the
    /// preconditioners in this crate. With `is_update == false` the sample is
    /// accumulated but the cached estimate is left untouched.
    fn adapt(&mut self, theta: &[T], alpha: T, is_update: bool) -> Result<(), AdaptError>;

    /// Current cached inverse mass matrix.
    fn inv_mass(&self) -> InvMass<'_, T>;

    /// Clears the estimator. The cached estimate is kept.
    fn reset(&mut self);
}

fn check_n_min(n_min: usize) -> Result<usize, AdaptError> {
    if n_min >= 2 {
        return Ok(n_min);
    }
    Err(AdaptError::Config(
        ErrorInfo::new("invalid-n-min", "n_min must allow at least two samples")
            .with_context("n_min", n_min),
    ))
}

/// Preconditioner that always reports the identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPreconditioner;

impl UnitPreconditioner {
    /// Creates the identity preconditioner.
    pub fn new() -> Self {
        Self
    }
}

impl<T: Real> Precondition<T> for UnitPreconditioner {
    fn adapt(&mut self, _theta: &[T], _alpha: T, _is_update: bool) -> Result<(), AdaptError> {
        Ok(())
    }

    fn inv_mass(&self) -> InvMass<'_, T> {
        InvMass::Scalar(T::one())
    }

    fn reset(&mut self) {}
}

/// Diagonal preconditioner backed by a variance estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "E: Serialize",
    deserialize = "E: serde::de::DeserializeOwned"
))]
pub struct DiagPreconditioner<T: Real, E: VarEstimator<T> = WelfordVar<T>> {
    n_min: usize,
    estimator: E,
    var: DVector<T>,
}

impl<T: Real> DiagPreconditioner<T> {
    /// Welford-backed preconditioner for `dim` coordinates with the default `n_min`.
    pub fn new(dim: usize) -> Self {
        Self {
            n_min: DEFAULT_N_MIN,
            estimator: WelfordVar::new(dim),
            var: DVector::from_element(dim, T::one()),
        }
    }
}

impl<T: Real, E: VarEstimator<T>> DiagPreconditioner<T, E> {
    /// Wraps an arbitrary variance estimator.
    ///
    /// The cached estimate starts at the identity of the estimator's dimension.
    pub fn with_estimator(estimator: E, n_min: usize) -> Result<Self, AdaptError> {
        let n_min = check_n_min(n_min)?;
        let var = DVector::from_element(estimator.dim(), T::one());
        Ok(Self {
            n_min,
            estimator,
            var,
        })
    }

    /// Minimum sample count before the cached estimate is refreshed.
    pub fn n_min(&self) -> usize {
        self.n_min
    }

    /// The underlying estimator.
    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    /// Cached variance estimate.
    pub fn var(&self) -> &DVector<T> {
        &self.var
    }

    /// Checks `n_min` and that estimator and cache share one dimension.
    pub fn validate(&self) -> Result<(), AdaptError> {
        check_n_min(self.n_min)?;
        self.estimator.validate()?;
        check_shape("var", self.estimator.dim(), self.var.len())
    }
}

impl<T: Real, E: VarEstimator<T>> Precondition<T> for DiagPreconditioner<T, E> {
    fn adapt(&mut self, theta: &[T], _alpha: T, is_update: bool) -> Result<(), AdaptError> {
        if theta.len() != self.var.len() {
            self.estimator.resize(theta.len())?;
            self.var = DVector::from_element(theta.len(), T::one());
        }
        self.estimator.add_sample(theta)?;
        log::trace!("diag preconditioner accepted sample {}", self.estimator.n());
        if is_update && self.estimator.n() >= self.n_min {
            self.var = self.estimator.get_var()?;
            log::debug!(
                "diag preconditioner refreshed from {} samples in {} dimensions",
                self.estimator.n(),
                self.var.len()
            );
        }
        Ok(())
    }

    fn inv_mass(&self) -> InvMass<'_, T> {
        InvMass::Diag(&self.var)
    }

    fn reset(&mut self) {
        log::debug!(
            "diag preconditioner reset after {} samples",
            self.estimator.n()
        );
        self.estimator.reset();
    }
}

/// Dense preconditioner backed by a covariance estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "E: Serialize",
    deserialize = "E: serde::de::DeserializeOwned"
))]
pub struct DensePreconditioner<T: Real, E: CovEstimator<T> = WelfordCov<T>> {
    n_min: usize,
    estimator: E,
    covar: DMatrix<T>,
}

impl<T: Real> DensePreconditioner<T> {
    /// Welford-backed preconditioner for `dim` coordinates with the default `n_min`.
    pub fn new(dim: usize) -> Self {
        Self {
            n_min: DEFAULT_N_MIN,
            estimator: WelfordCov::new(dim),
            covar: DMatrix::identity(dim, dim),
        }
    }
}

impl<T: Real, E: CovEstimator<T>> DensePreconditioner<T, E> {
    /// Wraps an arbitrary covariance estimator.
    ///
    /// The cached estimate starts at the identity of the estimator's dimension.
    pub fn with_estimator(estimator: E, n_min: usize) -> Result<Self, AdaptError> {
        let n_min = check_n_min(n_min)?;
        let dim = estimator.dim();
        Ok(Self {
            n_min,
            estimator,
            covar: DMatrix::identity(dim, dim),
        })
    }

    /// Minimum sample count before the cached estimate is refreshed.
    pub fn n_min(&self) -> usize {
        self.n_min
    }

    /// The underlying estimator.
    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    /// Cached covariance estimate.
    pub fn covar(&self) -> &DMatrix<T> {
        &self.covar
    }

    /// Checks `n_min` and that estimator and cache share one dimension.
    pub fn validate(&self) -> Result<(), AdaptError> {
        check_n_min(self.n_min)?;
        self.estimator.validate()?;
        check_shape("covar.rows", self.estimator.dim(), self.covar.nrows())?;
        check_shape("covar.cols", self.estimator.dim(), self.covar.ncols())
    }
}

impl<T: Real, E: CovEstimator<T>> Precondition<T> for DensePreconditioner<T, E> {
    fn adapt(&mut self, theta: &[T], _alpha: T, is_update: bool) -> Result<(), AdaptError> {
        let dim = theta.len();
        if dim != self.covar.nrows() {
            self.estimator.resize(dim)?;
            self.covar = DMatrix::identity(dim, dim);
        }
        self.estimator.add_sample(theta)?;
        log::trace!("dense preconditioner accepted sample {}", self.estimator.n());
        if is_update && self.estimator.n() >= self.n_min {
            self.covar = self.estimator.get_cov()?;
            log::debug!(
                "dense preconditioner refreshed from {} samples in {} dimensions",
                self.estimator.n(),
                dim
            );
        }
        Ok(())
    }

    fn inv_mass(&self) -> InvMass<'_, T> {
        InvMass::Dense(&self.covar)
    }

    fn reset(&mut self) {
        log::debug!(
            "dense preconditioner reset after {} samples",
            self.estimator.n()
        );
        self.estimator.reset();
    }
}

/// Closed set of Welford-backed preconditioners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", bound = "")]
pub enum Preconditioner<T: Real> {
    /// Identity, never adapts.
    Unit(UnitPreconditioner),
    /// Per-coordinate variance.
    Diag(DiagPreconditioner<T>),
    /// Full covariance.
    Dense(DensePreconditioner<T>),
}

impl<T: Real> Preconditioner<T> {
    /// Checks internal consistency, e.g. after deserialisation.
    pub fn validate(&self) -> Result<(), AdaptError> {
        match self {
            Preconditioner::Unit(_) => Ok(()),
            Preconditioner::Diag(pc) => pc.validate(),
            Preconditioner::Dense(pc) => pc.validate(),
        }
    }
}

impl<T: Real> Precondition<T> for Preconditioner<T> {
    fn adapt(&mut self, theta: &[T], alpha: T, is_update: bool) -> Result<(), AdaptError> {
        match self {
            Preconditioner::Unit(pc) => pc.adapt(theta, alpha, is_update),
            Preconditioner::Diag(pc) => pc.adapt(theta, alpha, is_update),
            Preconditioner::Dense(pc) => pc.adapt(theta, alpha, is_update),
        }
    }

    fn inv_mass(&self) -> InvMass<'_, T> {
        match self {
            Preconditioner::Unit(pc) => pc.inv_mass(),
            Preconditioner::Diag(pc) => pc.inv_mass(),
            Preconditioner::Dense(pc) => pc.inv_mass(),
        }
    }

    fn reset(&mut self) {
        match self {
            Preconditioner::Unit(pc) => Precondition::<T>::reset(pc),
            Preconditioner::Diag(pc) => pc.reset(),
            Preconditioner::Dense(pc) => pc.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::NaiveVar;

    #[test]
    fn resize_resets_cached_estimate_to_identity() {
        let mut pc = DiagPreconditioner::<f64>::new(2);
        pc.adapt(&[1.0, 2.0, 3.0], 1.0, true).unwrap();
        assert_eq!(pc.var().as_slice(), &[1.0, 1.0, 1.0]);
        assert_eq!(pc.estimator().dim(), 3);
        assert_eq!(pc.estimator().n(), 1);
    }

    #[test]
    fn resize_after_samples_is_refused() {
        let mut pc = DensePreconditioner::<f64>::new(2);
        pc.adapt(&[1.0, 2.0], 1.0, true).unwrap();
        let err = pc.adapt(&[1.0, 2.0, 3.0], 1.0, true).unwrap_err();
        assert_eq!(err.code(), "resize-nonempty");
    }

    #[test]
    fn frozen_updates_accumulate_without_refreshing() {
        let mut pc = DiagPreconditioner::with_estimator(NaiveVar::<f64>::new(1), 2).unwrap();
        for x in [1.0, 3.0, 5.0] {
            pc.adapt(&[x], 0.8, false).unwrap();
        }
        assert_eq!(pc.estimator().n(), 3);
        assert_eq!(pc.var()[0], 1.0);
        pc.adapt(&[7.0], 0.8, true).unwrap();
        assert!(pc.var()[0] > 1.0);
    }

    #[test]
    fn n_min_below_two_is_rejected() {
        let err = DiagPreconditioner::with_estimator(WelfordVar::<f64>::new(2), 1).unwrap_err();
        assert_eq!(err.code(), "invalid-n-min");
    }
}
