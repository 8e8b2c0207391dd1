use hmc_core::errors::ErrorInfo;
use hmc_core::{AdaptError, Real};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Running estimator of per-coordinate dispersion.
pub trait VarEstimator<T: Real> {
    /// Dimension of the samples accepted by the estimator.
    fn dim(&self) -> usize;

    /// Number of samples accumulated since the last reset.
    fn n(&self) -> usize;

    /// Discards every accumulated sample, keeping the dimension.
    fn reset(&mut self);

    /// Reinitialises the estimator for samples of length `dim`.
    ///
    /// Only legal while the estimator holds no samples.
    fn resize(&mut self, dim: usize) -> Result<(), AdaptError>;

    /// Accumulates one sample.
    fn add_sample(&mut self, theta: &[T]) -> Result<(), AdaptError>;

    /// Shrinkage-regularised variance estimate. Requires at least two samples.
    fn get_var(&self) -> Result<DVector<T>, AdaptError>;

    /// Checks that the accumulator shapes agree with `dim`.
    ///
    /// Only state restored from outside the estimator can fail this.
    fn validate(&self) -> Result<(), AdaptError>;
}

/// Running estimator of the full covariance matrix.
pub trait CovEstimator<T: Real> {
    /// Dimension of the samples accepted by the estimator.
    fn dim(&self) -> usize;

    /// Number of samples accumulated since the last reset.
    fn n(&self) -> usize;

    /// Discards every accumulated sample, keeping the dimension.
    fn reset(&mut self);

    /// Reinitialises the estimator for samples of length `dim`.
    ///
    /// Only legal while the estimator holds no samples.
    fn resize(&mut self, dim: usize) -> Result<(), AdaptError>;

    /// Accumulates one sample.
    fn add_sample(&mut self, theta: &[T]) -> Result<(), AdaptError>;

    /// Shrinkage-regularised covariance estimate. Requires at least two samples.
    fn get_cov(&self) -> Result<DMatrix<T>, AdaptError>;

    /// Checks that the accumulator shapes agree with `dim`.
    ///
    /// Only state restored from outside the estimator can fail this.
    fn validate(&self) -> Result<(), AdaptError>;
}

/// Weight on the regularisation target, as a multiple of the identity.
const SHRINKAGE_TARGET: f64 = 1e-3;
/// Pseudo sample count given to the target.
const SHRINKAGE_PRIOR: f64 = 5.0;

/// Returns `(scale, ridge)` such that the estimate is `scale * M + ridge * I`.
fn shrinkage<T: Real>(n: usize) -> (T, T) {
    let n = n as f64;
    let scale = n / ((n + SHRINKAGE_PRIOR) * (n - 1.0));
    let ridge = SHRINKAGE_TARGET * SHRINKAGE_PRIOR / (n + SHRINKAGE_PRIOR);
    (T::lit(scale), T::lit(ridge))
}

fn check_len(expected: usize, actual: usize) -> Result<(), AdaptError> {
    if expected == actual {
        return Ok(());
    }
    Err(AdaptError::Estimator(
        ErrorInfo::new("dimension-mismatch", "sample length does not match estimator")
            .with_context("expected", expected)
            .with_context("actual", actual),
    ))
}

fn check_estimable(n: usize) -> Result<(), AdaptError> {
    if n >= 2 {
        return Ok(());
    }
    Err(AdaptError::Estimator(
        ErrorInfo::new(
            "insufficient-samples",
            "cannot estimate dispersion from a single sample",
        )
        .with_context("n", n),
    ))
}

pub(crate) fn check_shape(field: &str, expected: usize, actual: usize) -> Result<(), AdaptError> {
    if expected == actual {
        return Ok(());
    }
    Err(AdaptError::Estimator(
        ErrorInfo::new("inconsistent-state", "accumulator shape does not match dimension")
            .with_context("field", field)
            .with_context("expected", expected)
            .with_context("actual", actual),
    ))
}

fn check_samples<T: Real>(dim: usize, samples: &[DVector<T>]) -> Result<(), AdaptError> {
    samples
        .iter()
        .try_for_each(|sample| check_shape("samples", dim, sample.len()))
}

fn check_resizable(n: usize, from: usize, to: usize) -> Result<(), AdaptError> {
    if n == 0 {
        log::debug!("resizing estimator from {from} to {to} dimensions");
        return Ok(());
    }
    Err(AdaptError::Estimator(
        ErrorInfo::new("resize-nonempty", "cannot resize an estimator that holds samples")
            .with_context("n", n)
            .with_context("from", from)
            .with_context("to", to)
            .with_hint("reset the estimator before changing dimension"),
    ))
}

/// Welford's one-pass variance accumulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct WelfordVar<T: Real> {
    n: usize,
    mu: DVector<T>,
    m: DVector<T>,
}

impl<T: Real> WelfordVar<T> {
    /// Creates an empty accumulator for `dim`-dimensional samples.
    pub fn new(dim: usize) -> Self {
        Self {
            n: 0,
            mu: DVector::zeros(dim),
            m: DVector::zeros(dim),
        }
    }

    /// Running mean of the accumulated samples.
    pub fn mean(&self) -> &DVector<T> {
        &self.mu
    }
}

impl<T: Real> VarEstimator<T> for WelfordVar<T> {
    fn dim(&self) -> usize {
        self.mu.len()
    }

    fn n(&self) -> usize {
        self.n
    }

    fn reset(&mut self) {
        self.n = 0;
        self.mu.fill(T::zero());
        self.m.fill(T::zero());
    }

    fn resize(&mut self, dim: usize) -> Result<(), AdaptError> {
        check_resizable(self.n, self.dim(), dim)?;
        *self = Self::new(dim);
        Ok(())
    }

    fn add_sample(&mut self, theta: &[T]) -> Result<(), AdaptError> {
        check_len(self.dim(), theta.len())?;
        self.n += 1;
        let n = T::lit(self.n as f64);
        for (i, &x) in theta.iter().enumerate() {
            let delta = x - self.mu[i];
            self.mu[i] += delta / n;
            // Second factor uses the updated mean.
            self.m[i] += delta * (x - self.mu[i]);
        }
        Ok(())
    }

    fn get_var(&self) -> Result<DVector<T>, AdaptError> {
        check_estimable(self.n)?;
        let (scale, ridge) = shrinkage::<T>(self.n);
        Ok(self.m.map(|m| m * scale + ridge))
    }

    fn validate(&self) -> Result<(), AdaptError> {
        check_shape("m", self.mu.len(), self.m.len())
    }
}

/// Welford's one-pass covariance accumulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct WelfordCov<T: Real> {
    n: usize,
    mu: DVector<T>,
    m: DMatrix<T>,
}

impl<T: Real> WelfordCov<T> {
    /// Creates an empty accumulator for `dim`-dimensional samples.
    pub fn new(dim: usize) -> Self {
        Self {
            n: 0,
            mu: DVector::zeros(dim),
            m: DMatrix::zeros(dim, dim),
        }
    }

    /// Running mean of the accumulated samples.
    pub fn mean(&self) -> &DVector<T> {
        &self.mu
    }
}

impl<T: Real> CovEstimator<T> for WelfordCov<T> {
    fn dim(&self) -> usize {
        self.mu.len()
    }

    fn n(&self) -> usize {
        self.n
    }

    fn reset(&mut self) {
        self.n = 0;
        self.mu.fill(T::zero());
        self.m.fill(T::zero());
    }

    fn resize(&mut self, dim: usize) -> Result<(), AdaptError> {
        check_resizable(self.n, self.dim(), dim)?;
        *self = Self::new(dim);
        Ok(())
    }

    fn add_sample(&mut self, theta: &[T]) -> Result<(), AdaptError> {
        check_len(self.dim(), theta.len())?;
        self.n += 1;
        let n = T::lit(self.n as f64);
        let theta = DVector::from_column_slice(theta);
        let delta = &theta - &self.mu;
        self.mu.axpy(T::one() / n, &delta, T::one());
        let centered = theta - &self.mu;
        // M += (θ - μ_new) δᵀ
        self.m.ger(T::one(), &centered, &delta, T::one());
        Ok(())
    }

    fn get_cov(&self) -> Result<DMatrix<T>, AdaptError> {
        check_estimable(self.n)?;
        let (scale, ridge) = shrinkage::<T>(self.n);
        let mut cov = self.m.map(|m| m * scale);
        for i in 0..cov.nrows() {
            cov[(i, i)] += ridge;
        }
        Ok(cov)
    }

    fn validate(&self) -> Result<(), AdaptError> {
        check_shape("m.rows", self.dim(), self.m.nrows())?;
        check_shape("m.cols", self.dim(), self.m.ncols())
    }
}

/// Reference variance estimator that keeps every sample.
///
/// Recomputes the statistic from scratch on request; meant for checking the
/// running estimators, not for production sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct NaiveVar<T: Real> {
    dim: usize,
    samples: Vec<DVector<T>>,
}

impl<T: Real> NaiveVar<T> {
    /// Creates an empty estimator for `dim`-dimensional samples.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            samples: Vec::new(),
        }
    }

    /// Arithmetic mean of the stored samples (zeros when empty).
    pub fn mean(&self) -> DVector<T> {
        sample_mean(self.dim, &self.samples)
    }
}

impl<T: Real> VarEstimator<T> for NaiveVar<T> {
    fn dim(&self) -> usize {
        self.dim
    }

    fn n(&self) -> usize {
        self.samples.len()
    }

    fn reset(&mut self) {
        self.samples.clear();
    }

    fn resize(&mut self, dim: usize) -> Result<(), AdaptError> {
        check_resizable(self.samples.len(), self.dim, dim)?;
        self.dim = dim;
        Ok(())
    }

    fn add_sample(&mut self, theta: &[T]) -> Result<(), AdaptError> {
        check_len(self.dim, theta.len())?;
        self.samples.push(DVector::from_column_slice(theta));
        Ok(())
    }

    fn get_var(&self) -> Result<DVector<T>, AdaptError> {
        check_estimable(self.samples.len())?;
        let mean = self.mean();
        let mut m = DVector::zeros(self.dim);
        for sample in &self.samples {
            let centered = sample - &mean;
            m += centered.component_mul(&centered);
        }
        let (scale, ridge) = shrinkage::<T>(self.samples.len());
        Ok(m.map(|m| m * scale + ridge))
    }

    fn validate(&self) -> Result<(), AdaptError> {
        check_samples(self.dim, &self.samples)
    }
}

/// Reference covariance estimator that keeps every sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct NaiveCov<T: Real> {
    dim: usize,
    samples: Vec<DVector<T>>,
}

impl<T: Real> NaiveCov<T> {
    /// Creates an empty estimator for `dim`-dimensional samples.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            samples: Vec::new(),
        }
    }

    /// Arithmetic mean of the stored samples (zeros when empty).
    pub fn mean(&self) -> DVector<T> {
        sample_mean(self.dim, &self.samples)
    }
}

impl<T: Real> CovEstimator<T> for NaiveCov<T> {
    fn dim(&self) -> usize {
        self.dim
    }

    fn n(&self) -> usize {
        self.samples.len()
    }

    fn reset(&mut self) {
        self.samples.clear();
    }

    fn resize(&mut self, dim: usize) -> Result<(), AdaptError> {
        check_resizable(self.samples.len(), self.dim, dim)?;
        self.dim = dim;
        Ok(())
    }

    fn add_sample(&mut self, theta: &[T]) -> Result<(), AdaptError> {
        check_len(self.dim, theta.len())?;
        self.samples.push(DVector::from_column_slice(theta));
        Ok(())
    }

    fn get_cov(&self) -> Result<DMatrix<T>, AdaptError> {
        check_estimable(self.samples.len())?;
        let mean = self.mean();
        let mut m = DMatrix::zeros(self.dim, self.dim);
        for sample in &self.samples {
            let centered = sample - &mean;
            m.ger(T::one(), &centered, &centered, T::one());
        }
        let (scale, ridge) = shrinkage::<T>(self.samples.len());
        let mut cov = m.map(|m| m * scale);
        for i in 0..self.dim {
            cov[(i, i)] += ridge;
        }
        Ok(cov)
    }

    fn validate(&self) -> Result<(), AdaptError> {
        check_samples(self.dim, &self.samples)
    }
}

fn sample_mean<T: Real>(dim: usize, samples: &[DVector<T>]) -> DVector<T> {
    let mut mean = DVector::zeros(dim);
    if samples.is_empty() {
        return mean;
    }
    for sample in samples {
        mean += sample;
    }
    let n = T::lit(samples.len() as f64);
    mean.map(|v| v / n)
}
