use nalgebra::*;
use std::f64::consts::PI;
use crate::error::{DiscriminantError, DiscriminantResult};
use crate::model::TrainedModel;

/// Confusion matrix and the summary rates derived from it.
pub mod score;

pub use score::*;

/// Outcome of the decision rule over a batch of observations: for row i,
/// classes[i] is the chosen class index, labels[i] the corresponding model label,
/// and row i of posteriors the normalized class probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {

    pub classes : Vec<usize>,

    pub labels : Vec<i64>,

    pub posteriors : DMatrix<f64>

}

/// Gaussian decision rule shared by every discriminant variant.
///
/// For observation x and class k, both x and the class mean are mapped through the
/// transform the model holds for k, and the unnormalized likelihood
///
/// g_k = exp(-|x' - mean_k'|^2 / 2) (2 pi)^(-p/2) prior_k
///
/// is evaluated, where p is the number of discriminant axes. The posteriors are the g_k
/// normalized over classes, and the decision is the class of largest g_k (the first one,
/// on ties). Everything is evaluated in the log domain, so observations far from every
/// class still receive well-defined posteriors.
pub fn decide(model : &TrainedModel, samples : &DMatrix<f64>) -> DiscriminantResult<Decision> {
    if samples.ncols() != model.dim() {
        return Err(DiscriminantError::DimensionMismatch { expected : model.dim(), found : samples.ncols() });
    }
    let n_classes = model.num_classes();
    let transform = model.transform();
    let axes = transform.ncols() as f64;
    let log_norm = -0.5 * axes * (2.0 * PI).ln();
    let projected_means : Vec<DVector<f64>> = model.means().iter()
        .enumerate()
        .map(|(k, m)| transform.for_class(k).tr_mul(m) )
        .collect();
    let log_priors : Vec<f64> = model.priors().iter().map(|p| p.ln() ).collect();

    let mut posteriors = DMatrix::zeros(samples.nrows(), n_classes);
    let mut classes = Vec::with_capacity(samples.nrows());
    let mut log_g = vec![0.0; n_classes];
    for (i, row) in samples.row_iter().enumerate() {
        let x = row.transpose();
        for k in 0..n_classes {
            let dist = (transform.for_class(k).tr_mul(&x) - &projected_means[k]).norm_squared();
            log_g[k] = -0.5 * dist + log_norm + log_priors[k];
        }
        let best = argmax(&log_g[..]);
        let top = log_g[best];
        let mut total = 0.0;
        for k in 0..n_classes {
            let w = (log_g[k] - top).exp();
            posteriors[(i, k)] = w;
            total += w;
        }
        posteriors.row_mut(i).unscale_mut(total);
        classes.push(best);
    }
    let labels = classes.iter().map(|k| model.labels()[*k] ).collect();
    Ok(Decision { classes, labels, posteriors })
}

fn argmax(vals : &[f64]) -> usize {
    let mut best = 0;
    for (ix, v) in vals.iter().enumerate().skip(1) {
        if *v > vals[best] {
            best = ix;
        }
    }
    best
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::fit::Algorithm;
    use crate::model::Transform;
    use approx::assert_relative_eq;

    fn two_class(priors : Vec<f64>) -> TrainedModel {
        TrainedModel::new(
            Algorithm::Pooled,
            vec![0, 1],
            DVector::from_vec(priors),
            vec![DVector::from_vec(vec![-1.0, 0.0]), DVector::from_vec(vec![1.0, 0.0])],
            Transform::Shared(DMatrix::identity(2, 2)),
            0.0
        )
    }

    #[test]
    fn posteriors_follow_gaussian_kernel() {
        let model = two_class(vec![0.5, 0.5]);
        let x = DMatrix::from_row_slice(2, 2, &[-1.0, 0.0, 0.5, 3.0]);
        let d = decide(&model, &x).unwrap();
        assert_eq!(d.classes, vec![0, 1]);
        assert_eq!(d.labels, vec![0, 1]);

        // At (-1, 0): g0 ~ exp(0), g1 ~ exp(-2).
        let p0 = 1.0 / (1.0 + (-2.0f64).exp());
        assert_relative_eq!(d.posteriors[(0, 0)], p0, epsilon = 1E-12);
        for i in 0..2 {
            assert_relative_eq!(d.posteriors.row(i).sum(), 1.0, epsilon = 1E-12);
        }
    }

    #[test]
    fn prior_shifts_the_boundary() {
        let x = DMatrix::from_row_slice(1, 2, &[0.1, 0.0]);
        assert_eq!(decide(&two_class(vec![0.5, 0.5]), &x).unwrap().classes, vec![1]);
        assert_eq!(decide(&two_class(vec![0.9, 0.1]), &x).unwrap().classes, vec![0]);
    }

    #[test]
    fn far_observations_keep_finite_posteriors() {
        let x = DMatrix::from_row_slice(1, 2, &[1E4, 0.0]);
        let d = decide(&two_class(vec![0.5, 0.5]), &x).unwrap();
        assert_eq!(d.classes, vec![1]);
        assert!(d.posteriors.iter().all(|p| p.is_finite() ));
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let x = DMatrix::from_row_slice(1, 3, &[0.0, 0.0, 0.0]);
        assert_eq!(
            decide(&two_class(vec![0.5, 0.5]), &x),
            Err(DiscriminantError::DimensionMismatch { expected : 2, found : 3 })
        );
    }

}
