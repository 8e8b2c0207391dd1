//! Floating point precision used by estimators, preconditioners and metrics.

use nalgebra::RealField;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Numeric precision of an adaptation pipeline.
///
/// Implemented for `f32` and `f64`. One precision is chosen per estimator
/// instance through the type parameter and used uniformly for its
/// accumulators, cached estimates and momentum draws.
pub trait Real: RealField + Copy + Serialize + DeserializeOwned {
    /// Draws one standard normal variate at this precision.
    fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> Self;

    /// Converts an `f64` constant into this precision.
    fn lit(value: f64) -> Self {
        nalgebra::convert(value)
    }
}

impl Real for f64 {
    fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> Self {
        StandardNormal.sample(rng)
    }
}

impl Real for f32 {
    fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> Self {
        StandardNormal.sample(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RngHandle;

    #[test]
    fn literal_conversion_keeps_value() {
        assert_eq!(<f64 as Real>::lit(1e-3), 1e-3);
        assert_eq!(<f32 as Real>::lit(0.5), 0.5f32);
    }

    #[test]
    fn standard_normal_has_unit_scale() {
        let mut rng = RngHandle::from_seed(17);
        let draws: Vec<f64> = (0..20_000).map(|_| f64::standard_normal(&mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let var = draws.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / draws.len() as f64;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.05, "variance {var}");
    }
}
