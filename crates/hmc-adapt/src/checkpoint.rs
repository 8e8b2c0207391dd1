use std::fs;
use std::path::{Path, PathBuf};

use hmc_core::errors::ErrorInfo;
use hmc_core::{AdaptError, Real};
use serde::{Deserialize, Serialize};

use crate::preconditioner::Preconditioner;

/// Serializable snapshot of an adapting preconditioner.
///
/// Captures estimator accumulators, the cached estimate and `n_min`, so a
/// warmup interrupted mid-window resumes with identical statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct AdaptCheckpoint<T: Real> {
    /// Sampling iteration at which the snapshot was taken.
    pub iteration: usize,
    /// Chain that owns the preconditioner.
    pub chain: usize,
    /// Preconditioner state.
    pub preconditioner: Preconditioner<T>,
}

impl<T: Real> AdaptCheckpoint<T> {
    /// Snapshots `preconditioner` at `iteration`.
    pub fn capture(iteration: usize, chain: usize, preconditioner: &Preconditioner<T>) -> Self {
        Self {
            iteration,
            chain,
            preconditioner: preconditioner.clone(),
        }
    }

    /// Restores the payload from disk.
    ///
    /// The restored preconditioner is validated before it is handed back.
    pub fn load(path: &Path) -> Result<Self, AdaptError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            AdaptError::Serde(
                ErrorInfo::new("checkpoint-read", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        let checkpoint: Self = serde_json::from_str(&contents).map_err(|err| {
            AdaptError::Serde(
                ErrorInfo::new("checkpoint-parse", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        checkpoint.preconditioner.validate().map_err(|err| {
            let cause = err.info();
            let mut info = ErrorInfo::new("checkpoint-invalid", cause.message.clone())
                .with_context("path", path.display())
                .with_context("cause", &cause.code);
            for (key, value) in &cause.context {
                info = info.with_context(key.clone(), value);
            }
            AdaptError::Serde(info)
        })?;
        Ok(checkpoint)
    }

    /// Writes the payload to disk, creating parent directories.
    pub fn store(&self, path: &Path) -> Result<(), AdaptError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                AdaptError::Serde(
                    ErrorInfo::new("checkpoint-mkdir", err.to_string())
                        .with_context("path", parent.display()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            AdaptError::Serde(
                ErrorInfo::new("checkpoint-serialize", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            AdaptError::Serde(
                ErrorInfo::new("checkpoint-write", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        log::debug!(
            "stored chain {} adaptation checkpoint at iteration {}",
            self.chain,
            self.iteration
        );
        Ok(())
    }

    /// Hands back the preconditioner, ready for further `adapt` calls.
    pub fn into_preconditioner(self) -> Preconditioner<T> {
        self.preconditioner
    }
}

/// Deterministic checkpoint file name for a chain and iteration.
pub fn checkpoint_path(root: &Path, chain: usize, iteration: usize) -> PathBuf {
    root.join(format!("adapt_c{chain:02}_{iteration:06}.json"))
}
