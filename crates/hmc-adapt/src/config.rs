use std::fs;
use std::path::Path;

use hmc_core::errors::ErrorInfo;
use hmc_core::{AdaptError, Real};
use serde::{Deserialize, Serialize};

use crate::factory::MetricKind;
use crate::metric::Metric;
use crate::preconditioner::{Preconditioner, DEFAULT_N_MIN};

/// YAML-configurable mass-matrix adaptation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptConfig {
    /// Metric family to adapt.
    #[serde(default = "default_metric")]
    pub metric: MetricKind,
    /// Dimension of the parameter vector.
    #[serde(default = "default_dim")]
    pub dim: usize,
    /// Samples required before the cached estimate is refreshed.
    #[serde(default = "default_n_min")]
    pub n_min: usize,
}

fn default_metric() -> MetricKind {
    MetricKind::Diag
}

fn default_dim() -> usize {
    1
}

fn default_n_min() -> usize {
    DEFAULT_N_MIN
}

impl Default for AdaptConfig {
    fn default() -> Self {
        Self {
            metric: default_metric(),
            dim: default_dim(),
            n_min: default_n_min(),
        }
    }
}

impl AdaptConfig {
    /// Parses and validates a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, AdaptError> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|err| {
            AdaptError::Config(
                ErrorInfo::new("config-parse", err.to_string())
                    .with_hint("metric must be one of unit, diag, dense"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a YAML file.
    pub fn load(path: &Path) -> Result<Self, AdaptError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            AdaptError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Checks the settings that serde cannot express.
    pub fn validate(&self) -> Result<(), AdaptError> {
        if self.n_min < 2 {
            return Err(AdaptError::Config(
                ErrorInfo::new("invalid-n-min", "n_min must allow at least two samples")
                    .with_context("n_min", self.n_min),
            ));
        }
        Ok(())
    }

    /// Builds the preconditioner described by this configuration.
    pub fn build_preconditioner<T: Real>(&self) -> Result<Preconditioner<T>, AdaptError> {
        self.validate()?;
        Preconditioner::with_n_min(self.metric, self.dim, self.n_min)
    }

    /// Builds the identity metric the preconditioner starts from.
    pub fn build_metric<T: Real>(&self) -> Metric<T> {
        Metric::identity(self.metric, self.dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AdaptConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, AdaptConfig::default());
        assert_eq!(config.n_min, 10);
        assert_eq!(config.metric, MetricKind::Diag);
    }

    #[test]
    fn aliases_are_accepted() {
        let config = AdaptConfig::from_yaml_str("metric: dense_e\ndim: 4\n").unwrap();
        assert_eq!(config.metric, MetricKind::Dense);
        assert_eq!(config.dim, 4);
    }

    #[test]
    fn unknown_metric_is_a_config_error() {
        let err = AdaptConfig::from_yaml_str("metric: riemannian\n").unwrap_err();
        assert!(matches!(err, AdaptError::Config(_)));
        assert_eq!(err.code(), "config-parse");
    }

    #[test]
    fn tiny_n_min_is_rejected() {
        let err = AdaptConfig::from_yaml_str("n_min: 1\n").unwrap_err();
        assert_eq!(err.code(), "invalid-n-min");
    }
}
