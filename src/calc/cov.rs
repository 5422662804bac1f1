use nalgebra::*;
use serde::{Serialize, Deserialize};
use std::fmt::{self, Display};
use std::str::FromStr;
use tracing::debug;
use crate::error::DiscriminantError;
use super::{column_means, center_rows, stack, pooled_mean};

/// Whether the estimate keeps the cross-products between variables (Full) or only
/// their variances (Diagonal, all off-diagonal entries exactly zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CovType {
    Full,
    Diagonal
}

/// Which mean is subtracted from the observations before the second moment is taken.
/// None keeps the raw data; Tied subtracts a single mean computed over all classes pooled;
/// Untied subtracts each class own mean. Uncentered data is still debiased by the scalings
/// that imply it (none, biased and the per-class terms of empirical); unbiased scaling of
/// uncentered data is a raw second moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Centering {
    None,
    Tied,
    Untied
}

/// Divisor applied to the cross-product matrix of the (centered) observations:
/// None divides by 1, Biased by n, Unbiased by n-1. Empirical estimates each class
/// separately with the unbiased divisor and combines them with weights (n_i - 1) / (N - C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scaling {
    None,
    Biased,
    Unbiased,
    Empirical
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CovarianceConfig {

    pub ctype : CovType,

    pub center : Centering,

    pub scale : Scaling

}

impl Default for CovarianceConfig {

    fn default() -> Self {
        Self {
            ctype : CovType::Full,
            center : Centering::Untied,
            scale : Scaling::Biased
        }
    }

}

impl FromStr for CovType {

    type Err = DiscriminantError;

    fn from_str(s : &str) -> Result<Self, Self::Err> {
        match &s.to_lowercase()[..] {
            "full" => Ok(CovType::Full),
            "diagonal" | "diag" => Ok(CovType::Diagonal),
            _ => Err(DiscriminantError::UnknownOption { option : "ctype", value : s.to_string() })
        }
    }

}

impl FromStr for Centering {

    type Err = DiscriminantError;

    fn from_str(s : &str) -> Result<Self, Self::Err> {
        match &s.to_lowercase()[..] {
            "none" => Ok(Centering::None),
            "tied" => Ok(Centering::Tied),
            "untied" => Ok(Centering::Untied),
            _ => Err(DiscriminantError::UnknownOption { option : "center", value : s.to_string() })
        }
    }

}

impl FromStr for Scaling {

    type Err = DiscriminantError;

    fn from_str(s : &str) -> Result<Self, Self::Err> {
        match &s.to_lowercase()[..] {
            "none" => Ok(Scaling::None),
            "biased" => Ok(Scaling::Biased),
            "unbiased" => Ok(Scaling::Unbiased),
            "empirical" => Ok(Scaling::Empirical),
            _ => Err(DiscriminantError::UnknownOption { option : "scale", value : s.to_string() })
        }
    }

}

impl Display for CovarianceConfig {

    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctype={:?} center={:?} scale={:?}", self.ctype, self.center, self.scale)
    }

}

/// Weights (n_i - 1) / (N - C) used to combine per-class estimates under empirical
/// scaling. They are non-negative and sum to one whenever N > C. When every class
/// holds a single observation there is no within-class information and all weights are zero.
pub fn empirical_weights(counts : &[usize]) -> Vec<f64> {
    let total : usize = counts.iter().sum();
    let dof = total.saturating_sub(counts.len());
    if dof == 0 {
        return vec![0.0; counts.len()];
    }
    counts.iter().map(|n| n.saturating_sub(1) as f64 / dof as f64 ).collect()
}

/// Estimates a single covariance for all classes pooled together.
///
/// Under empirical scaling, each class is estimated on its own (after the requested
/// centering) with the unbiased divisor, and the class estimates are summed with the
/// weights given by empirical_weights. Under the other scalings, the centered classes are
/// stacked and the stacked matrix is scaled as a whole.
///
/// This never fails: degenerate inputs (too few observations, collinear variables) yield
/// a singular or indefinite matrix, which is rejected when the transform is built.
pub fn estimate(classes : &[DMatrix<f64>], config : &CovarianceConfig) -> DMatrix<f64> {
    let centered = center_classes(classes, config.center);
    let dim = classes.first().map(|c| c.ncols() ).unwrap_or(0);
    let cov = match config.scale {
        Scaling::Empirical => {
            let counts : Vec<usize> = classes.iter().map(|c| c.nrows() ).collect();
            let weights = empirical_weights(&counts[..]);
            debug!(?weights, "combining per-class covariances");
            let mut cov = DMatrix::zeros(dim, dim);
            for (m, w) in centered.iter().zip(weights.iter()) {
                if *w > 0.0 {
                    let m = debias_uncentered(m, config.center, Scaling::Empirical);
                    cov += second_moment(&m, config.ctype, Scaling::Unbiased) * *w;
                }
            }
            cov
        },
        scale => {
            let m = debias_uncentered(&stack(&centered[..]), config.center, scale);
            second_moment(&m, config.ctype, scale)
        }
    };
    debug!(%config, dim, "estimated pooled covariance");
    cov
}

/// Estimates one covariance per class. Tied centering still subtracts the mean of all
/// classes pooled; empirical scaling reduces to the unbiased estimate of each class,
/// since a single class carries the full weight.
pub fn estimate_each(classes : &[DMatrix<f64>], config : &CovarianceConfig) -> Vec<DMatrix<f64>> {
    let scale = match config.scale {
        Scaling::Empirical => Scaling::Unbiased,
        other => other
    };
    center_classes(classes, config.center)
        .iter()
        .map(|m| debias_uncentered(m, config.center, config.scale) )
        .map(|m| second_moment(&m, config.ctype, scale) )
        .collect()
}

/// Subtracts the column means of m when no centering was requested and the scaling
/// is taken over deviations from the mean.
fn debias_uncentered(m : &DMatrix<f64>, center : Centering, scale : Scaling) -> DMatrix<f64> {
    let mut out = m.clone();
    if center == Centering::None && scale != Scaling::Unbiased {
        let mean = column_means(m);
        center_rows(&mut out, &mean);
    }
    out
}

fn center_classes(classes : &[DMatrix<f64>], center : Centering) -> Vec<DMatrix<f64>> {
    let mut centered = classes.to_vec();
    match center {
        Centering::None => { },
        Centering::Tied => {
            let mean = pooled_mean(classes);
            centered.iter_mut().for_each(|m| center_rows(m, &mean) );
        },
        Centering::Untied => {
            for m in centered.iter_mut() {
                let mean = column_means(m);
                center_rows(m, &mean);
            }
        }
    }
    centered
}

/// Cross-product matrix of m divided according to scale. Diagonal estimates
/// carry only the column sums of squares.
fn second_moment(m : &DMatrix<f64>, ctype : CovType, scale : Scaling) -> DMatrix<f64> {
    let n = m.nrows();
    let divisor = match scale {
        Scaling::None => 1.0,
        Scaling::Biased => n.max(1) as f64,
        Scaling::Unbiased | Scaling::Empirical => n.saturating_sub(1).max(1) as f64
    };
    match ctype {
        CovType::Full => {
            let cp = m.tr_mul(m);
            let mut sym = (&cp + cp.transpose()) * 0.5;
            sym.unscale_mut(divisor);
            sym
        },
        CovType::Diagonal => {
            let vars = DVector::from_iterator(
                m.ncols(),
                m.column_iter().map(|c| c.norm_squared() / divisor )
            );
            DMatrix::from_diagonal(&vars)
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use approx::assert_relative_eq;

    fn classes() -> Vec<DMatrix<f64>> {
        vec![
            DMatrix::from_row_slice(3, 2, &[1., 2., 2., 1., 3., 5.]),
            DMatrix::from_row_slice(4, 2, &[-1., 0., 0., -2., 1., 1., -2., -1.])
        ]
    }

    fn all_configs() -> Vec<CovarianceConfig> {
        let mut cfgs = Vec::new();
        for ctype in [CovType::Full, CovType::Diagonal] {
            for center in [Centering::None, Centering::Tied, Centering::Untied] {
                for scale in [Scaling::None, Scaling::Biased, Scaling::Unbiased, Scaling::Empirical] {
                    cfgs.push(CovarianceConfig { ctype, center, scale });
                }
            }
        }
        cfgs
    }

    #[test]
    fn every_configuration_is_symmetric() {
        let cs = classes();
        for cfg in all_configs() {
            let cov = estimate(&cs[..], &cfg);
            assert_eq!(cov, cov.transpose(), "asymmetric under {}", cfg);
            for each in estimate_each(&cs[..], &cfg) {
                assert_eq!(each, each.transpose(), "asymmetric class estimate under {}", cfg);
            }
        }
    }

    #[test]
    fn diagonal_has_exact_zero_off_diagonal() {
        let cs = classes();
        for cfg in all_configs().into_iter().filter(|c| c.ctype == CovType::Diagonal ) {
            let cov = estimate(&cs[..], &cfg);
            for i in 0..2 {
                for j in 0..2 {
                    if i != j {
                        assert_eq!(cov[(i, j)], 0.0);
                    }
                }
            }
        }
    }

    #[test]
    fn empirical_weights_sum_to_one() {
        let w = empirical_weights(&[3, 4, 10]);
        assert!(w.iter().all(|w| *w >= 0.0 ));
        assert_relative_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1E-12);
        assert_relative_eq!(w[0], 2.0 / 14.0, epsilon = 1E-12);
        assert_eq!(empirical_weights(&[1, 1]), vec![0.0, 0.0]);
    }

    #[test]
    fn untied_biased_matches_pooled_within_scatter() {
        let cs = classes();
        let cfg = CovarianceConfig { ctype : CovType::Full, center : Centering::Untied, scale : Scaling::Biased };
        let cov = estimate(&cs[..], &cfg);

        // Class 0 mean (2, 8/3), class 1 mean (-0.5, -0.5).
        let mut expected = DMatrix::<f64>::zeros(2, 2);
        for c in cs.iter() {
            let mean = column_means(c);
            for row in c.row_iter() {
                let d = row.transpose() - &mean;
                expected += &d * d.transpose();
            }
        }
        expected /= 7.0;
        assert_relative_eq!(cov, expected, epsilon = 1E-12);
    }

    #[test]
    fn empirical_equals_within_scatter_over_dof() {
        let cs = classes();
        let emp = CovarianceConfig { ctype : CovType::Full, center : Centering::Untied, scale : Scaling::Empirical };
        let none = CovarianceConfig { ctype : CovType::Full, center : Centering::Untied, scale : Scaling::None };
        let scatter = estimate(&cs[..], &none);
        assert_relative_eq!(estimate(&cs[..], &emp), scatter / 5.0, epsilon = 1E-12);
    }

    #[test]
    fn uncentered_data_is_debiased_by_scaling() {
        let m = DMatrix::from_row_slice(2, 1, &[1., 3.]);
        let cfg = CovarianceConfig { ctype : CovType::Full, center : Centering::None, scale : Scaling::Biased };
        assert_relative_eq!(estimate(&[m.clone()], &cfg)[(0, 0)], 1.0, epsilon = 1E-12);
        let none = CovarianceConfig { scale : Scaling::None, ..cfg };
        assert_relative_eq!(estimate(&[m.clone()], &none)[(0, 0)], 2.0, epsilon = 1E-12);
        assert_relative_eq!(estimate_each(&[m.clone()], &none)[0][(0, 0)], 2.0, epsilon = 1E-12);
        let diag = CovarianceConfig { ctype : CovType::Diagonal, ..none };
        assert_relative_eq!(estimate(&[m.clone()], &diag)[(0, 0)], 2.0, epsilon = 1E-12);

        // Unbiased scaling of uncentered data stays a raw second moment.
        let unb = CovarianceConfig { scale : Scaling::Unbiased, ..cfg };
        assert_relative_eq!(estimate(&[m.clone()], &unb)[(0, 0)], 10.0, epsilon = 1E-12);

        // Empirical terms are class covariances whatever the centering.
        let emp = CovarianceConfig { scale : Scaling::Empirical, ..cfg };
        let shifted = vec![m.clone(), m.add_scalar(10.0)];
        let untied = CovarianceConfig { center : Centering::Untied, ..emp };
        assert_relative_eq!(estimate(&shifted[..], &emp), estimate(&shifted[..], &untied), epsilon = 1E-12);
        assert_relative_eq!(estimate(&shifted[..], &emp)[(0, 0)], 2.0, epsilon = 1E-12);

        let tied = CovarianceConfig { center : Centering::Tied, ..cfg };
        assert_relative_eq!(estimate(&[m], &tied)[(0, 0)], 1.0, epsilon = 1E-12);
    }

    #[test]
    fn per_class_estimates_are_unbiased_under_empirical() {
        let cs = classes();
        let emp = CovarianceConfig { ctype : CovType::Full, center : Centering::Untied, scale : Scaling::Empirical };
        let unb = CovarianceConfig { scale : Scaling::Unbiased, ..emp };
        assert_eq!(estimate_each(&cs[..], &emp), estimate_each(&cs[..], &unb));
    }

    #[test]
    fn options_parse_case_insensitive() {
        assert_eq!("Diagonal".parse::<CovType>(), Ok(CovType::Diagonal));
        assert_eq!("untied".parse::<Centering>(), Ok(Centering::Untied));
        assert_eq!("EMPIRICAL".parse::<Scaling>(), Ok(Scaling::Empirical));
        assert_eq!(
            "sample".parse::<Scaling>(),
            Err(DiscriminantError::UnknownOption { option : "scale", value : "sample".into() })
        );
    }

}
