use nalgebra::*;
use tracing::debug;
use crate::basis::spectral;
use crate::calc::{self, cov};
use crate::error::DiscriminantResult;
use crate::model::Transform;
use super::{Algorithm, Discriminant, Training, TrainConfig};

/// Between-class scatter sum_i w_i (mean_i - mean)(mean_i - mean)^T around the mean of
/// all observations pooled.
fn between_scatter(training : &Training, weights : &[f64]) -> DMatrix<f64> {
    let dim = training.dim();
    let global = calc::pooled_mean(training.partition.classes());
    let mut sb = DMatrix::zeros(dim, dim);
    for (mean, w) in training.means.iter().zip(weights.iter()) {
        let diff = mean - &global;
        sb += (&diff * diff.transpose()) * *w;
    }
    sb
}

/// Number of discriminant axes: one less than the number of classes. A single class
/// gives zero axes, which the transform builder rejects as out of range.
fn fisher_components(training : &Training) -> usize {
    training.num_classes().saturating_sub(1)
}

/// Projects all classes onto the C - 1 leading eigenvectors of Sw^-1 Sb, where the
/// within-class scatter Sw is the prior-weighted sum of the class covariances and the
/// between-class scatter Sb weights each class by its prior.
#[derive(Debug, Clone, Copy, Default)]
pub struct FisherPooled;

impl Discriminant for FisherPooled {

    fn algorithm(&self) -> Algorithm {
        Algorithm::FisherPooled
    }

    fn transform(&self, training : &Training, config : &TrainConfig) -> DiscriminantResult<Transform> {
        let k = fisher_components(training);
        let dim = training.dim();
        let sigmas = cov::estimate_each(training.partition.classes(), &config.covariance);
        let mut sw = DMatrix::zeros(dim, dim);
        for (sigma, prior) in sigmas.iter().zip(training.priors.iter()) {
            sw += sigma * *prior;
        }
        let sb = between_scatter(training, training.priors.as_slice());
        debug!(k, "building shared fisher transform");
        Ok(Transform::Shared(spectral::build_fisher(&sw, &sb, k)?))
    }

}

/// Builds one set of C - 1 discriminant axes per class from Sw_i^-1 Sb, with
/// Sw_i = prior_i Sigma_i. Unlike FisherPooled, the between-class scatter here weights
/// each class by its number of observations rather than by its prior.
#[derive(Debug, Clone, Copy, Default)]
pub struct FisherClassDependent;

impl Discriminant for FisherClassDependent {

    fn algorithm(&self) -> Algorithm {
        Algorithm::FisherClassDependent
    }

    fn transform(&self, training : &Training, config : &TrainConfig) -> DiscriminantResult<Transform> {
        let k = fisher_components(training);
        let counts : Vec<f64> = training.partition.counts().iter().map(|n| *n as f64 ).collect();
        let sb = between_scatter(training, &counts[..]);
        let sigmas = cov::estimate_each(training.partition.classes(), &config.covariance);
        debug!(k, classes = sigmas.len(), "building per-class fisher transforms");
        let transforms = sigmas.iter()
            .zip(training.priors.iter())
            .map(|(sigma, prior)| spectral::build_fisher(&(sigma * *prior), &sb, k) )
            .collect::<DiscriminantResult<Vec<_>>>()?;
        Ok(Transform::PerClass(transforms))
    }

}
