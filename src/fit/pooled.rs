use tracing::debug;
use crate::basis::spectral;
use crate::calc::cov;
use crate::error::DiscriminantResult;
use crate::model::Transform;
use super::{Algorithm, Discriminant, Training, TrainConfig};

/// Whitens all classes with a single covariance, estimated over the classes pooled
/// under the requested covariance configuration. With every axis kept, the decision
/// rule compares Mahalanobis distances under the shared covariance.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pooled;

impl Discriminant for Pooled {

    fn algorithm(&self) -> Algorithm {
        Algorithm::Pooled
    }

    fn transform(&self, training : &Training, config : &TrainConfig) -> DiscriminantResult<Transform> {
        let k = config.components(training.dim());
        let sigma = cov::estimate(training.partition.classes(), &config.covariance);
        debug!(k, "building pooled whitening transform");
        Ok(Transform::Shared(spectral::build(&sigma, k)?))
    }

}

/// Whitens each class with its own covariance, so each class is evaluated in its own
/// transformed space.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassDependent;

impl Discriminant for ClassDependent {

    fn algorithm(&self) -> Algorithm {
        Algorithm::ClassDependent
    }

    fn transform(&self, training : &Training, config : &TrainConfig) -> DiscriminantResult<Transform> {
        let k = config.components(training.dim());
        let sigmas = cov::estimate_each(training.partition.classes(), &config.covariance);
        debug!(k, classes = sigmas.len(), "building per-class whitening transforms");
        let transforms = sigmas.iter()
            .map(|sigma| spectral::build(sigma, k) )
            .collect::<DiscriminantResult<Vec<_>>>()?;
        Ok(Transform::PerClass(transforms))
    }

}

#[cfg(test)]
mod tests {

    use nalgebra::DMatrix;
    use approx::assert_relative_eq;
    use crate::calc::cov::{CovarianceConfig, CovType, Centering, Scaling};
    use crate::error::DiscriminantError;
    use crate::fit::PriorPolicy;
    use crate::sample::Dataset;
    use super::*;

    fn data() -> Dataset {
        Dataset::from_rows(
            &[
                vec![0.0, 0.0], vec![2.0, 0.5], vec![1.0, 2.0], vec![0.5, -1.0],
                vec![5.0, 5.0], vec![5.5, 4.0], vec![4.0, 6.0], vec![6.0, 5.5], vec![5.0, 3.5]
            ],
            vec![1, 1, 1, 1, 4, 4, 4, 4, 4]
        ).unwrap()
    }

    #[test]
    fn pooled_transform_whitens_the_pooled_covariance() {
        let d = data();
        let cfg = TrainConfig::default();
        let model = Pooled.train(&d, &cfg).unwrap();
        let sigma = cov::estimate(d.partition().classes(), &cfg.covariance);
        let t = match model.transform() {
            Transform::Shared(t) => t.clone(),
            Transform::PerClass(_) => panic!("pooled model with per-class transforms")
        };
        assert_relative_eq!(t.transpose() * sigma * &t, DMatrix::<f64>::identity(2, 2), epsilon = 1E-9);
        assert_eq!(model.labels(), &[1, 4]);
        assert_relative_eq!(model.priors().sum(), 1.0, epsilon = 1E-12);
    }

    #[test]
    fn class_dependent_has_one_transform_per_class() {
        let d = data();
        let cfg = TrainConfig {
            prior : PriorPolicy::FrequencyWeighted,
            covariance : CovarianceConfig { ctype : CovType::Diagonal, center : Centering::Untied, scale : Scaling::Unbiased },
            n_components : Some(1)
        };
        let model = ClassDependent.train(&d, &cfg).unwrap();
        match model.transform() {
            Transform::PerClass(ts) => {
                assert_eq!(ts.len(), 2);
                assert!(ts.iter().all(|t| t.shape() == (2, 1) ));
            },
            Transform::Shared(_) => panic!("class-dependent model with a shared transform")
        }
        assert_relative_eq!(model.priors()[0], 4.0 / 9.0, epsilon = 1E-12);
        let decision = ClassDependent.predict(&model, d.features()).unwrap();
        assert_eq!(decision.labels, d.labels().to_vec());
    }

    #[test]
    fn too_many_components_is_a_range_failure() {
        let cfg = TrainConfig { n_components : Some(0), ..TrainConfig::default() };
        assert_eq!(Pooled.train(&data(), &cfg).err(), Some(DiscriminantError::ComponentRange { requested : 0, dim : 2 }));
    }

    #[test]
    fn degenerate_class_covariance_is_rejected() {
        // The second class lies on a line, so its own covariance is singular.
        let d = Dataset::from_rows(
            &[vec![0.0, 0.0], vec![1.0, 0.3], vec![0.2, 1.0], vec![5.0, 5.0], vec![6.0, 6.0], vec![7.0, 7.0]],
            vec![0, 0, 0, 1, 1, 1]
        ).unwrap();
        let res = ClassDependent.train(&d, &TrainConfig::default());
        assert!(matches!(
            res,
            Err(DiscriminantError::Singular { .. }) | Err(DiscriminantError::NegativeEigenvalue { .. })
        ));
    }

}
