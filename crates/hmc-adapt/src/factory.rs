use std::fmt::{self, Display};
use std::str::FromStr;

use hmc_core::errors::ErrorInfo;
use hmc_core::{AdaptError, Real};
use serde::{Deserialize, Serialize};

use crate::estimator::{WelfordCov, WelfordVar};
use crate::metric::{
    DenseEuclideanMetric, DiagEuclideanMetric, EuclideanMetric, Metric, UnitEuclideanMetric,
};
use crate::preconditioner::{
    DensePreconditioner, DiagPreconditioner, Preconditioner, UnitPreconditioner,
};

/// Tag naming one of the three metric families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKind {
    /// Identity mass matrix.
    #[serde(alias = "unit_e", alias = "unit-euclidean")]
    Unit,
    /// Diagonal mass matrix.
    #[serde(alias = "diagonal", alias = "diag_e")]
    Diag,
    /// Dense mass matrix.
    #[serde(alias = "dense_e", alias = "full")]
    Dense,
}

impl MetricKind {
    /// Canonical tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Unit => "unit",
            MetricKind::Diag => "diag",
            MetricKind::Dense => "dense",
        }
    }
}

impl Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = AdaptError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "unit" | "unit_e" | "unit-euclidean" => Ok(MetricKind::Unit),
            "diag" | "diagonal" | "diag_e" => Ok(MetricKind::Diag),
            "dense" | "dense_e" | "full" => Ok(MetricKind::Dense),
            _ => Err(AdaptError::Config(
                ErrorInfo::new("unknown-metric", "unrecognised metric tag")
                    .with_context("tag", tag)
                    .with_hint("expected one of unit, diag, dense"),
            )),
        }
    }
}

impl<T: Real> Preconditioner<T> {
    /// Welford-backed preconditioner of the given family with the default `n_min`.
    pub fn from_kind(kind: MetricKind, dim: usize) -> Self {
        match kind {
            MetricKind::Unit => Preconditioner::Unit(UnitPreconditioner::new()),
            MetricKind::Diag => Preconditioner::Diag(DiagPreconditioner::new(dim)),
            MetricKind::Dense => Preconditioner::Dense(DensePreconditioner::new(dim)),
        }
    }

    /// Welford-backed preconditioner of the given family with an explicit `n_min`.
    pub fn with_n_min(kind: MetricKind, dim: usize, n_min: usize) -> Result<Self, AdaptError> {
        Ok(match kind {
            MetricKind::Unit => Preconditioner::Unit(UnitPreconditioner::new()),
            MetricKind::Diag => Preconditioner::Diag(DiagPreconditioner::with_estimator(
                WelfordVar::new(dim),
                n_min,
            )?),
            MetricKind::Dense => Preconditioner::Dense(DensePreconditioner::with_estimator(
                WelfordCov::new(dim),
                n_min,
            )?),
        })
    }

    /// Preconditioner matching the family and dimension of `metric`.
    pub fn for_metric(metric: &Metric<T>) -> Self {
        Self::from_kind(metric.kind(), metric.dim())
    }

    /// Parses `tag` and builds the matching preconditioner.
    pub fn from_tag(tag: &str, dim: usize) -> Result<Self, AdaptError> {
        Ok(Self::from_kind(tag.parse()?, dim))
    }

    /// Family of this preconditioner.
    pub fn kind(&self) -> MetricKind {
        match self {
            Preconditioner::Unit(_) => MetricKind::Unit,
            Preconditioner::Diag(_) => MetricKind::Diag,
            Preconditioner::Dense(_) => MetricKind::Dense,
        }
    }
}

impl<T: Real> Metric<T> {
    /// Identity metric of the given family.
    pub fn identity(kind: MetricKind, dim: usize) -> Self {
        match kind {
            MetricKind::Unit => Metric::Unit(UnitEuclideanMetric::new(dim)),
            MetricKind::Diag => Metric::Diag(DiagEuclideanMetric::identity(dim)),
            MetricKind::Dense => Metric::Dense(DenseEuclideanMetric::identity(dim)),
        }
    }

    /// Parses `tag` and builds the identity metric of that family.
    pub fn from_tag(tag: &str, dim: usize) -> Result<Self, AdaptError> {
        Ok(Self::identity(tag.parse()?, dim))
    }
}
