use nalgebra::*;
use std::cmp::Ordering;
use tracing::debug;
use crate::error::{DiscriminantError, DiscriminantResult};

/// Retained eigenvalues smaller than this fraction of the leading eigenvalue are
/// treated as zero when the inverse square-root scale is formed.
const SINGULAR_TOL : f64 = 1E-12;

/// Eigenpairs of a scatter matrix, ordered by descending eigenvalue. Eigenvectors
/// are the unit-norm columns of vectors, aligned with the entries of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {

    values : DVector<f64>,

    vectors : DMatrix<f64>

}

impl Spectrum {

    /// Decomposes a symmetric scatter matrix (a covariance, pooled or per class).
    pub fn symmetric(scatter : &DMatrix<f64>) -> Self {
        let eigen = SymmetricEigen::new(scatter.clone());
        Self::sorted(eigen.eigenvalues, eigen.eigenvectors)
    }

    /// Decomposes the Fisher ratio Sw^-1 Sb for a within-class scatter Sw and a between-class
    /// scatter Sb. The ratio is not symmetric, so it is not handed to a symmetric solver directly:
    /// with Sw = L L^T, the symmetric matrix L^-1 Sb L^-T shares its eigenvalues, and each of its
    /// eigenvectors u maps to the eigenvector L^-T u of the ratio (rescaled to unit norm).
    pub fn fisher(within : &DMatrix<f64>, between : &DMatrix<f64>) -> DiscriminantResult<Self> {
        let dim = within.nrows();
        let singular = DiscriminantError::Singular { context : "within-class scatter inverse" };
        let chol = match within.clone().cholesky() {
            Some(chol) => chol,
            None => {
                // Not positive definite: indefinite, or singular up to rounding.
                let values = SymmetricEigen::new(within.clone()).eigenvalues;
                let (least, scale) = (values.min(), values.amax());
                return if least < -SINGULAR_TOL * scale {
                    Err(DiscriminantError::NegativeEigenvalue { value : least })
                } else {
                    Err(singular)
                };
            }
        };
        let l = chol.l();
        let diag = l.diagonal();
        // Squared pivots are the conditioning scale of Sw.
        if diag.min().powi(2) <= SINGULAR_TOL * diag.max().powi(2) {
            return Err(singular);
        }
        let l_inv = l.solve_lower_triangular(&DMatrix::identity(dim, dim)).ok_or(singular)?;
        let reduced = &l_inv * between * l_inv.transpose();
        let reduced = (&reduced + reduced.transpose()) * 0.5;
        let eigen = SymmetricEigen::new(reduced);
        let mut vectors = l_inv.tr_mul(&eigen.eigenvectors);
        for mut col in vectors.column_iter_mut() {
            let norm = col.norm();
            if norm > 0.0 {
                col.unscale_mut(norm);
            }
        }
        Ok(Self::sorted(eigen.eigenvalues, vectors))
    }

    fn sorted(values : DVector<f64>, vectors : DMatrix<f64>) -> Self {
        let mut order : Vec<usize> = (0..values.nrows()).collect();
        order.sort_by(|a, b| values[*b].partial_cmp(&values[*a]).unwrap_or(Ordering::Equal) );
        Self {
            values : values.select_rows(order.iter()),
            vectors : vectors.select_columns(order.iter())
        }
    }

    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    pub fn vectors(&self) -> &DMatrix<f64> {
        &self.vectors
    }

    pub fn dim(&self) -> usize {
        self.values.nrows()
    }

    /// Keeps the k leading eigenpairs; k must lie in (0, dim].
    pub fn truncate(&self, k : usize) -> DiscriminantResult<Self> {
        check_components(k, self.dim())?;
        Ok(Self {
            values : self.values.rows(0, k).into_owned(),
            vectors : self.vectors.columns(0, k).into_owned()
        })
    }

    /// Builds T = V D^-1 with D = diag(sqrt(values)), so that T^T S T is the identity
    /// over the retained subspace of the decomposed matrix S.
    pub fn transform(&self) -> DiscriminantResult<DMatrix<f64>> {
        if let Some(neg) = self.values.iter().find(|v| **v < 0.0 ) {
            return Err(DiscriminantError::NegativeEigenvalue { value : *neg });
        }
        let leading = self.values.iter().fold(0.0f64, |m, v| m.max(*v) );
        let singular = DiscriminantError::Singular { context : "inverse square root of eigenvalues" };
        if self.values.iter().any(|v| !v.is_finite() || *v <= SINGULAR_TOL * leading ) {
            return Err(singular);
        }
        let scale = DMatrix::from_diagonal(&self.values.map(f64::sqrt));
        let scale_inv = scale.try_inverse().ok_or(singular)?;
        Ok(&self.vectors * scale_inv)
    }

}

fn check_components(k : usize, dim : usize) -> DiscriminantResult<()> {
    if k == 0 || k > dim {
        Err(DiscriminantError::ComponentRange { requested : k, dim })
    } else {
        Ok(())
    }
}

/// Whitening transform of a covariance over its k leading principal axes.
pub fn build(scatter : &DMatrix<f64>, k : usize) -> DiscriminantResult<DMatrix<f64>> {
    check_components(k, scatter.nrows())?;
    let spectrum = Spectrum::symmetric(scatter).truncate(k)?;
    debug!(retained = ?spectrum.values().as_slice(), "whitening spectrum");
    spectrum.transform()
}

/// Discriminant transform over the k leading eigenpairs of Sw^-1 Sb.
pub fn build_fisher(
    within : &DMatrix<f64>,
    between : &DMatrix<f64>,
    k : usize
) -> DiscriminantResult<DMatrix<f64>> {
    check_components(k, within.nrows())?;
    let spectrum = Spectrum::fisher(within, between)?.truncate(k)?;
    debug!(retained = ?spectrum.values().as_slice(), "fisher spectrum");
    spectrum.transform()
}
