use approx::assert_relative_eq;
use hmc_adapt::{CovEstimator, Real, RngHandle, VarEstimator, WelfordCov, WelfordVar};
use nalgebra::DMatrix;

#[test]
fn covariance_converges_to_population_value() {
    let mut rng = RngHandle::from_seed(2024);
    let mut est = WelfordCov::<f64>::new(3);
    let scale = 2.0f64.sqrt();
    for _ in 0..100_000 {
        let theta: Vec<f64> = (0..3).map(|_| scale * f64::standard_normal(&mut rng)).collect();
        est.add_sample(&theta).unwrap();
    }
    let cov = est.get_cov().unwrap();
    let target = DMatrix::<f64>::identity(3, 3) * 2.0;
    for (estimate, expected) in cov.iter().zip(target.iter()) {
        assert!(
            (estimate - expected).abs() < 0.05,
            "estimate {estimate} vs {expected}"
        );
    }
}

#[test]
fn two_samples_are_pulled_toward_the_target() {
    let mut est = WelfordVar::<f64>::new(1);
    est.add_sample(&[0.0]).unwrap();
    est.add_sample(&[2.0]).unwrap();
    // Raw unbiased variance is 2; n = 2 gives 2/7 · M + 5e-3/7 with M = 2.
    let var = est.get_var().unwrap()[0];
    assert_relative_eq!(var, 4.0 / 7.0 + 5e-3 / 7.0, epsilon = 1e-12);
}

#[test]
fn constant_stream_stays_positive_definite() {
    let mut est = WelfordCov::<f64>::new(2);
    for _ in 0..12 {
        est.add_sample(&[3.0, -1.0]).unwrap();
    }
    let cov = est.get_cov().unwrap();
    assert_relative_eq!(cov[(0, 0)], 1e-3 * 5.0 / 17.0, epsilon = 1e-15);
    assert_eq!(cov[(0, 1)], 0.0);
    assert!(cov.cholesky().is_some());
}
