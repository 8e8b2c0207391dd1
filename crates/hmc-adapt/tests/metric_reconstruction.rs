use hmc_adapt::{
    DenseEuclideanMetric, DensePreconditioner, DiagEuclideanMetric, DiagPreconditioner,
    EuclideanMetric, InvMass, Metric, MetricKind, Precondition, UnitEuclideanMetric,
};
use nalgebra::{DMatrix, DVector};

#[test]
fn dense_metric_returns_matrix_untouched() {
    let m_inv = DMatrix::<f64>::from_row_slice(
        3,
        3,
        &[3.0, 0.2, -0.1, 0.2, 1.5, 0.3, -0.1, 0.3, 0.8],
    );
    let metric = DenseEuclideanMetric::new(m_inv.clone()).unwrap();
    assert_eq!(metric.inv_mass(), InvMass::Dense(&m_inv));
    assert_eq!(metric.dim(), 3);
}

#[test]
fn non_positive_definite_matrix_is_rejected() {
    let m_inv = DMatrix::<f64>::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
    let err = DenseEuclideanMetric::new(m_inv).unwrap_err();
    assert_eq!(err.code(), "not-positive-definite");

    let err = DenseEuclideanMetric::new(DMatrix::<f64>::zeros(2, 3)).unwrap_err();
    assert_eq!(err.code(), "non-square");
}

#[test]
fn diagonal_metric_rejects_non_positive_entries() {
    let err = DiagEuclideanMetric::new(DVector::<f64>::from_vec(vec![1.0, 0.0])).unwrap_err();
    assert_eq!(err.code(), "non-positive-variance");
    assert_eq!(err.info().context["index"], "1");
    let err = DiagEuclideanMetric::new(DVector::from_vec(vec![f64::NAN])).unwrap_err();
    assert_eq!(err.code(), "non-positive-variance");
}

#[test]
fn renew_builds_a_fresh_metric_of_any_dimension() {
    let metric = DiagEuclideanMetric::<f64>::identity(2);
    let renewed = metric.renew(DVector::from_vec(vec![9.0, 4.0, 1.0])).unwrap();
    assert_eq!(metric.dim(), 2);
    assert_eq!(renewed.dim(), 3);
    assert_eq!(renewed.sqrt_inv_mass().as_slice(), &[3.0, 2.0, 1.0]);

    let unit = UnitEuclideanMetric::<f64>::new(2).renew(5);
    assert_eq!(unit.dim(), 5);
}

#[test]
fn metric_refreshes_from_dense_preconditioner() {
    let mut pc = DensePreconditioner::<f64>::new(2);
    for i in 0..20 {
        let t = i as f64;
        pc.adapt(&[t.cos(), 0.5 * t.sin() + 0.1 * t], 0.7, true).unwrap();
    }
    let metric = Metric::identity(MetricKind::Dense, 2);
    let refreshed = metric.refreshed(&pc).unwrap();
    assert_eq!(refreshed.inv_mass(), InvMass::Dense(pc.covar()));
    // The previous metric value is unchanged.
    assert_eq!(metric.inv_mass(), InvMass::Dense(&DMatrix::identity(2, 2)));

    let Metric::Dense(dense) = &refreshed else {
        panic!("expected dense metric");
    };
    let u = dense.cholesky_upper();
    assert!((u.transpose() * u - pc.covar()).amax() < 1e-12);
}

#[test]
fn shape_mismatch_is_reported() {
    let pc = DiagPreconditioner::<f64>::new(2);
    let metric = Metric::identity(MetricKind::Dense, 2);
    let err = metric.refreshed(&pc).unwrap_err();
    assert_eq!(err.code(), "shape-mismatch");
    assert_eq!(err.info().context["metric"], "dense");
    assert_eq!(err.info().context["estimate"], "diag");
}

#[test]
fn kinetic_energy_matches_velocity() {
    let m_inv = DMatrix::<f64>::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 1.0]);
    let metric = DenseEuclideanMetric::new(m_inv.clone()).unwrap();
    let r = DVector::<f64>::from_vec(vec![1.0, -2.0]);
    assert_eq!(metric.velocity(&r), &m_inv * &r);
    // ½ (2·1 - 2·0.5·2 + 1·4) = 2
    assert!((metric.kinetic_energy(&r) - 2.0).abs() < 1e-12);
}
