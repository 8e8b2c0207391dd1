use hmc_adapt::{CovEstimator, NaiveCov, NaiveVar, VarEstimator, WelfordCov, WelfordVar};
use proptest::prelude::*;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 * (1.0 + a.abs().max(b.abs()))
}

fn sample_stream() -> impl Strategy<Value = Vec<Vec<f64>>> {
    (1usize..=50).prop_flat_map(|dim| {
        prop::collection::vec(prop::collection::vec(-10.0f64..10.0, dim), 2..40)
    })
}

proptest! {
    #[test]
    fn welford_var_matches_naive(samples in sample_stream()) {
        let dim = samples[0].len();
        let mut naive = NaiveVar::<f64>::new(dim);
        let mut welford = WelfordVar::<f64>::new(dim);
        for sample in &samples {
            naive.add_sample(sample).unwrap();
            welford.add_sample(sample).unwrap();
        }
        prop_assert_eq!(naive.n(), welford.n());
        let expected = naive.get_var().unwrap();
        let actual = welford.get_var().unwrap();
        for (a, b) in expected.iter().zip(actual.iter()) {
            prop_assert!(close(*a, *b), "naive {} vs welford {}", a, b);
        }
    }

    #[test]
    fn welford_cov_matches_naive(samples in sample_stream()) {
        let dim = samples[0].len();
        let mut naive = NaiveCov::<f64>::new(dim);
        let mut welford = WelfordCov::<f64>::new(dim);
        for sample in &samples {
            naive.add_sample(sample).unwrap();
            welford.add_sample(sample).unwrap();
        }
        let expected = naive.get_cov().unwrap();
        let actual = welford.get_cov().unwrap();
        for (a, b) in expected.iter().zip(actual.iter()) {
            prop_assert!(close(*a, *b), "naive {} vs welford {}", a, b);
        }
    }
}

#[test]
fn welford_survives_large_offsets() {
    // Sum-of-squares would cancel catastrophically at this offset.
    let offset = 1e9;
    let mut welford = WelfordVar::<f64>::new(1);
    for i in 0..200_000 {
        let x = offset + if i % 2 == 0 { 1.0 } else { -1.0 };
        welford.add_sample(&[x]).unwrap();
    }
    let var = welford.get_var().unwrap()[0];
    assert!((var - 1.0).abs() < 1e-3, "variance {var}");
}

#[test]
fn single_precision_pipeline_agrees_with_naive() {
    let rows: [[f32; 2]; 4] = [[1.0, -2.0], [0.5, 3.0], [-1.5, 0.25], [2.0, 1.0]];
    let mut naive = NaiveVar::<f32>::new(2);
    let mut welford = WelfordVar::<f32>::new(2);
    for row in &rows {
        naive.add_sample(row).unwrap();
        welford.add_sample(row).unwrap();
    }
    let expected = naive.get_var().unwrap();
    let actual = welford.get_var().unwrap();
    for (a, b) in expected.iter().zip(actual.iter()) {
        assert!((a - b).abs() < 1e-5, "{a} vs {b}");
    }
}
