use std::marker::PhantomData;

use hmc_core::errors::ErrorInfo;
use hmc_core::{AdaptError, Real};
use nalgebra::{DMatrix, DVector};
use rand::Rng;

use crate::factory::MetricKind;
use crate::preconditioner::Precondition;

/// Borrowed view of an inverse mass matrix in one of its three shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvMass<'a, T: Real> {
    /// Scalar identity; the dimension is carried elsewhere.
    Scalar(T),
    /// Diagonal of `M⁻¹`.
    Diag(&'a DVector<T>),
    /// Full `M⁻¹`.
    Dense(&'a DMatrix<T>),
}

impl<'a, T: Real> InvMass<'a, T> {
    /// Metric family matching this shape.
    pub fn kind(&self) -> MetricKind {
        match self {
            InvMass::Scalar(_) => MetricKind::Unit,
            InvMass::Diag(_) => MetricKind::Diag,
            InvMass::Dense(_) => MetricKind::Dense,
        }
    }
}

/// Euclidean metric used by the Hamiltonian's kinetic energy.
pub trait EuclideanMetric<T: Real> {
    /// Dimension of the momentum space.
    fn dim(&self) -> usize;

    /// The stored inverse mass matrix.
    fn inv_mass(&self) -> InvMass<'_, T>;

    /// Draws momentum distributed as `Normal(0, M)`.
    fn draw_momentum<R: Rng + ?Sized>(&self, rng: &mut R) -> DVector<T>;

    /// Gradient of the kinetic energy with respect to momentum, `M⁻¹ r`.
    fn velocity(&self, r: &DVector<T>) -> DVector<T>;

    /// Kinetic energy `½ rᵀ M⁻¹ r`.
    fn kinetic_energy(&self, r: &DVector<T>) -> T {
        r.dot(&self.velocity(r)) * T::lit(0.5)
    }
}

fn standard_normal<T: Real, R: Rng + ?Sized>(dim: usize, rng: &mut R) -> DVector<T> {
    DVector::from_fn(dim, |_, _| T::standard_normal(&mut *rng))
}

/// Identity metric.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitEuclideanMetric<T: Real> {
    dim: usize,
    precision: PhantomData<T>,
}

impl<T: Real> UnitEuclideanMetric<T> {
    /// Identity metric of dimension `dim`.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            precision: PhantomData,
        }
    }

    /// Builds a new identity metric of dimension `dim`.
    pub fn renew(&self, dim: usize) -> Self {
        Self::new(dim)
    }
}

impl<T: Real> EuclideanMetric<T> for UnitEuclideanMetric<T> {
    fn dim(&self) -> usize {
        self.dim
    }

    fn inv_mass(&self) -> InvMass<'_, T> {
        InvMass::Scalar(T::one())
    }

    fn draw_momentum<R: Rng + ?Sized>(&self, rng: &mut R) -> DVector<T> {
        standard_normal(self.dim, rng)
    }

    fn velocity(&self, r: &DVector<T>) -> DVector<T> {
        r.clone()
    }
}

/// Diagonal metric with a cached elementwise square root of `M⁻¹`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagEuclideanMetric<T: Real> {
    m_inv: DVector<T>,
    sqrt_m_inv: DVector<T>,
}

impl<T: Real> DiagEuclideanMetric<T> {
    /// Builds the metric from the diagonal of `M⁻¹`.
    ///
    /// Every entry must be finite and strictly positive.
    pub fn new(m_inv: DVector<T>) -> Result<Self, AdaptError> {
        if let Some(index) = m_inv
            .iter()
            .position(|v| !v.is_finite() || *v <= T::zero())
        {
            return Err(AdaptError::Metric(
                ErrorInfo::new(
                    "non-positive-variance",
                    "diagonal inverse mass matrix must be finite and positive",
                )
                .with_context("index", index)
                .with_context("value", m_inv[index]),
            ));
        }
        let sqrt_m_inv = m_inv.map(|v| v.sqrt());
        Ok(Self { m_inv, sqrt_m_inv })
    }

    /// Identity metric of dimension `dim`.
    pub fn identity(dim: usize) -> Self {
        Self {
            m_inv: DVector::from_element(dim, T::one()),
            sqrt_m_inv: DVector::from_element(dim, T::one()),
        }
    }

    /// Builds a new metric from another diagonal, possibly of a different length.
    pub fn renew(&self, m_inv: DVector<T>) -> Result<Self, AdaptError> {
        Self::new(m_inv)
    }

    /// Elementwise square root of the stored diagonal.
    pub fn sqrt_inv_mass(&self) -> &DVector<T> {
        &self.sqrt_m_inv
    }
}

impl<T: Real> EuclideanMetric<T> for DiagEuclideanMetric<T> {
    fn dim(&self) -> usize {
        self.m_inv.len()
    }

    fn inv_mass(&self) -> InvMass<'_, T> {
        InvMass::Diag(&self.m_inv)
    }

    fn draw_momentum<R: Rng + ?Sized>(&self, rng: &mut R) -> DVector<T> {
        let z: DVector<T> = standard_normal(self.dim(), rng);
        z.component_div(&self.sqrt_m_inv)
    }

    fn velocity(&self, r: &DVector<T>) -> DVector<T> {
        self.m_inv.component_mul(r)
    }
}

/// Largest `|a_ij - a_ji|` and largest `|a_ij|` of a square matrix.
fn symmetry_gap<T: Real>(m: &DMatrix<T>) -> (T, T) {
    let mut gap = T::zero();
    let mut largest = T::zero();
    for i in 0..m.nrows() {
        for j in 0..m.ncols() {
            let d = m[(i, j)] - m[(j, i)];
            gap = gap.max(d.max(-d));
            largest = largest.max(m[(i, j)].max(-m[(i, j)]));
        }
    }
    (gap, largest)
}

/// Dense metric carrying the upper Cholesky factor `U` with `UᵀU = M⁻¹`.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseEuclideanMetric<T: Real> {
    m_inv: DMatrix<T>,
    chol_upper: DMatrix<T>,
}

impl<T: Real> DenseEuclideanMetric<T> {
    /// Factorises `M⁻¹` and builds the metric.
    ///
    /// `M⁻¹` must be symmetric up to rounding. The symmetrised matrix is what
    /// gets stored and factorised, so `velocity` and the Cholesky factor agree.
    pub fn new(m_inv: DMatrix<T>) -> Result<Self, AdaptError> {
        if !m_inv.is_square() {
            return Err(AdaptError::Metric(
                ErrorInfo::new("non-square", "inverse mass matrix must be square")
                    .with_context("rows", m_inv.nrows())
                    .with_context("cols", m_inv.ncols()),
            ));
        }
        let (asymmetry, largest) = symmetry_gap(&m_inv);
        if asymmetry > T::default_epsilon().sqrt() * (T::one() + largest) {
            return Err(AdaptError::Metric(
                ErrorInfo::new("non-symmetric", "inverse mass matrix must be symmetric")
                    .with_context("dim", m_inv.nrows())
                    .with_context("asymmetry", asymmetry),
            ));
        }
        let m_inv = (&m_inv + m_inv.transpose()) * T::lit(0.5);
        let Some(chol) = m_inv.clone().cholesky() else {
            log::warn!(
                "dense metric rejected a {0}x{0} inverse mass matrix",
                m_inv.nrows()
            );
            return Err(AdaptError::Metric(
                ErrorInfo::new("not-positive-definite", "matrix not positive definite")
                    .with_context("dim", m_inv.nrows())
                    .with_hint("keep the covariance estimate regularised"),
            ));
        };
        let chol_upper = chol.l().transpose();
        Ok(Self { m_inv, chol_upper })
    }

    /// Identity metric of dimension `dim`.
    pub fn identity(dim: usize) -> Self {
        Self {
            m_inv: DMatrix::identity(dim, dim),
            chol_upper: DMatrix::identity(dim, dim),
        }
    }

    /// Builds a new metric from another matrix, re-running the factorisation.
    pub fn renew(&self, m_inv: DMatrix<T>) -> Result<Self, AdaptError> {
        Self::new(m_inv)
    }

    /// Upper triangular Cholesky factor of the stored `M⁻¹`.
    pub fn cholesky_upper(&self) -> &DMatrix<T> {
        &self.chol_upper
    }
}

impl<T: Real> EuclideanMetric<T> for DenseEuclideanMetric<T> {
    fn dim(&self) -> usize {
        self.m_inv.nrows()
    }

    fn inv_mass(&self) -> InvMass<'_, T> {
        InvMass::Dense(&self.m_inv)
    }

    fn draw_momentum<R: Rng + ?Sized>(&self, rng: &mut R) -> DVector<T> {
        // U r = z gives Cov(r) = U⁻¹U⁻ᵀ = (M⁻¹)⁻¹.
        let mut r: DVector<T> = standard_normal(self.dim(), rng);
        let solved = self.chol_upper.solve_upper_triangular_mut(&mut r);
        debug_assert!(solved, "cholesky factor has a zero pivot");
        r
    }

    fn velocity(&self, r: &DVector<T>) -> DVector<T> {
        &self.m_inv * r
    }
}

/// Closed set of metrics a sampler can run with.
#[derive(Debug, Clone, PartialEq)]
pub enum Metric<T: Real> {
    /// Identity metric.
    Unit(UnitEuclideanMetric<T>),
    /// Diagonal metric.
    Diag(DiagEuclideanMetric<T>),
    /// Dense metric.
    Dense(DenseEuclideanMetric<T>),
}

impl<T: Real> Metric<T> {
    /// Family of this metric.
    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Unit(_) => MetricKind::Unit,
            Metric::Diag(_) => MetricKind::Diag,
            Metric::Dense(_) => MetricKind::Dense,
        }
    }

    /// Builds a new metric of the same family from `inv_mass`.
    ///
    /// A unit metric keeps its dimension. Feeding a shape of another family is
    /// an error.
    pub fn renew(&self, inv_mass: InvMass<'_, T>) -> Result<Self, AdaptError> {
        match (self, inv_mass) {
            (Metric::Unit(unit), InvMass::Scalar(_)) => Ok(Metric::Unit(unit.renew(unit.dim))),
            (Metric::Diag(diag), InvMass::Diag(var)) => {
                Ok(Metric::Diag(diag.renew(var.clone())?))
            }
            (Metric::Dense(dense), InvMass::Dense(cov)) => {
                Ok(Metric::Dense(dense.renew(cov.clone())?))
            }
            (metric, other) => Err(AdaptError::Metric(
                ErrorInfo::new("shape-mismatch", "inverse mass matrix shape does not fit metric")
                    .with_context("metric", metric.kind())
                    .with_context("estimate", other.kind()),
            )),
        }
    }

    /// Builds a new metric from the preconditioner's current estimate.
    pub fn refreshed<P>(&self, preconditioner: &P) -> Result<Self, AdaptError>
    where
        P: Precondition<T> + ?Sized,
    {
        self.renew(preconditioner.inv_mass())
    }
}

impl<T: Real> EuclideanMetric<T> for Metric<T> {
    fn dim(&self) -> usize {
        match self {
            Metric::Unit(metric) => metric.dim(),
            Metric::Diag(metric) => metric.dim(),
            Metric::Dense(metric) => metric.dim(),
        }
    }

    fn inv_mass(&self) -> InvMass<'_, T> {
        match self {
            Metric::Unit(metric) => metric.inv_mass(),
            Metric::Diag(metric) => metric.inv_mass(),
            Metric::Dense(metric) => metric.inv_mass(),
        }
    }

    fn draw_momentum<R: Rng + ?Sized>(&self, rng: &mut R) -> DVector<T> {
        match self {
            Metric::Unit(metric) => metric.draw_momentum(rng),
            Metric::Diag(metric) => metric.draw_momentum(rng),
            Metric::Dense(metric) => metric.draw_momentum(rng),
        }
    }

    fn velocity(&self, r: &DVector<T>) -> DVector<T> {
        match self {
            Metric::Unit(metric) => metric.velocity(r),
            Metric::Diag(metric) => metric.velocity(r),
            Metric::Dense(metric) => metric.velocity(r),
        }
    }
}

impl<T: Real> From<UnitEuclideanMetric<T>> for Metric<T> {
    fn from(metric: UnitEuclideanMetric<T>) -> Self {
        Metric::Unit(metric)
    }
}

impl<T: Real> From<DiagEuclideanMetric<T>> for Metric<T> {
    fn from(metric: DiagEuclideanMetric<T>) -> Self {
        Metric::Diag(metric)
    }
}

impl<T: Real> From<DenseEuclideanMetric<T>> for Metric<T> {
    fn from(metric: DenseEuclideanMetric<T>) -> Self {
        Metric::Dense(metric)
    }
}
