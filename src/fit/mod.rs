use nalgebra::*;
use serde::{Serialize, Deserialize};
use std::fmt::{self, Display};
use std::str::FromStr;
use tracing::{info, warn};
use crate::calc;
use crate::calc::cov::CovarianceConfig;
use crate::decision::{self, Decision, ConfusionMatrix, Evaluation};
use crate::error::{DiscriminantError, DiscriminantResult};
use crate::model::{TrainedModel, Transform};
use crate::sample::{Dataset, Partition};

/// Whitening classifiers: a single covariance for all classes (Pooled), or one
/// covariance per class (ClassDependent).
pub mod pooled;

/// Fisher discriminant classifiers: shared discriminant axes (FisherPooled), or
/// per-class axes (FisherClassDependent).
pub mod fisher;

pub use pooled::{Pooled, ClassDependent};
pub use fisher::{FisherPooled, FisherClassDependent};

/// How the class priors are set: uniform 1/C ("ml") or class frequency n_i / N ("map").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriorPolicy {
    MaximumLikelihood,
    FrequencyWeighted
}

impl PriorPolicy {

    pub fn priors(&self, counts : &[usize]) -> DVector<f64> {
        let c = counts.len();
        match self {
            PriorPolicy::MaximumLikelihood => DVector::from_element(c, 1.0 / c.max(1) as f64),
            PriorPolicy::FrequencyWeighted => {
                let total = counts.iter().sum::<usize>().max(1) as f64;
                DVector::from_iterator(c, counts.iter().map(|n| *n as f64 / total ))
            }
        }
    }

}

impl Default for PriorPolicy {

    fn default() -> Self {
        PriorPolicy::MaximumLikelihood
    }

}

impl FromStr for PriorPolicy {

    type Err = DiscriminantError;

    fn from_str(s : &str) -> Result<Self, Self::Err> {
        match &s.to_lowercase()[..] {
            "ml" => Ok(PriorPolicy::MaximumLikelihood),
            "map" => Ok(PriorPolicy::FrequencyWeighted),
            _ => Err(DiscriminantError::UnknownPriorMode(s.to_string()))
        }
    }

}

/// Everything a training call is parametrized by. n_components is the number of
/// whitening axes kept by Pooled and ClassDependent (None keeps all of them); the
/// Fisher variants always keep C - 1 axes and ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrainConfig {

    pub prior : PriorPolicy,

    pub covariance : CovarianceConfig,

    pub n_components : Option<usize>

}

impl TrainConfig {

    pub fn components(&self, dim : usize) -> usize {
        self.n_components.unwrap_or(dim)
    }

}

/// The closed set of discriminant classifiers. Names are resolved to a variant once,
/// when the request is configured; the variant is recorded in every model it trains,
/// so a model cannot be evaluated by a different variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Pooled,
    ClassDependent,
    FisherPooled,
    FisherClassDependent
}

impl Algorithm {

    pub const ALL : [Algorithm; 4] = [
        Algorithm::Pooled,
        Algorithm::ClassDependent,
        Algorithm::FisherPooled,
        Algorithm::FisherClassDependent
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Pooled => "pooled",
            Algorithm::ClassDependent => "class_dependent",
            Algorithm::FisherPooled => "fisher_pooled",
            Algorithm::FisherClassDependent => "fisher_class_dependent"
        }
    }

    /// Whether models of this variant carry one transform per class.
    pub fn class_dependent(&self) -> bool {
        matches!(self, Algorithm::ClassDependent | Algorithm::FisherClassDependent)
    }

    pub fn train(&self, data : &Dataset, config : &TrainConfig) -> DiscriminantResult<TrainedModel> {
        match self {
            Algorithm::Pooled => Pooled.train(data, config),
            Algorithm::ClassDependent => ClassDependent.train(data, config),
            Algorithm::FisherPooled => FisherPooled.train(data, config),
            Algorithm::FisherClassDependent => FisherClassDependent.train(data, config)
        }
    }

    pub fn predict(&self, model : &TrainedModel, samples : &DMatrix<f64>) -> DiscriminantResult<Decision> {
        check_owner(*self, model)?;
        decision::decide(model, samples)
    }

    pub fn score(&self, model : &TrainedModel, data : &Dataset) -> DiscriminantResult<Evaluation> {
        check_owner(*self, model)?;
        evaluate(model, data)
    }

}

impl Display for Algorithm {

    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }

}

impl FromStr for Algorithm {

    type Err = DiscriminantError;

    fn from_str(s : &str) -> Result<Self, Self::Err> {
        match &s.to_lowercase()[..] {
            "pca" | "pooled" => Ok(Algorithm::Pooled),
            "qda" | "class_dependent" => Ok(Algorithm::ClassDependent),
            "lda" | "fisher_pooled" => Ok(Algorithm::FisherPooled),
            "qlda" | "fisher_class_dependent" => Ok(Algorithm::FisherClassDependent),
            _ => Err(DiscriminantError::UnknownAlgorithm(s.to_string()))
        }
    }

}

fn check_owner(expected : Algorithm, model : &TrainedModel) -> DiscriminantResult<()> {
    if model.algorithm() != expected {
        Err(DiscriminantError::NameMismatch { expected, found : model.algorithm() })
    } else {
        Ok(())
    }
}

/// Per-class statistics shared by all variants: the partition by label, the priors
/// under the requested policy and the class means.
#[derive(Debug, Clone)]
pub struct Training {

    pub partition : Partition,

    pub priors : DVector<f64>,

    pub means : Vec<DVector<f64>>

}

impl Training {

    pub fn new(data : &Dataset, prior : PriorPolicy) -> Self {
        let partition = data.partition();
        let priors = prior.priors(&partition.counts()[..]);
        let means = partition.classes().iter().map(calc::column_means).collect();
        Self { partition, priors, means }
    }

    pub fn num_classes(&self) -> usize {
        self.partition.num_classes()
    }

    pub fn dim(&self) -> usize {
        self.partition.dim()
    }

    /// Prior-weighted sum over classes of the euclidean distances between each observation
    /// and its class mean, divided by the number of observations. Distances are taken in the
    /// original feature space, not in the space of any transform.
    pub fn fit_score(&self) -> f64 {
        let gsum : f64 = self.partition.classes().iter()
            .zip(self.means.iter())
            .zip(self.priors.iter())
            .map(|((class, mean), prior)| prior * calc::total_deviation(class, mean) )
            .sum();
        gsum / self.partition.total() as f64
    }

}

/// Contract shared by the four discriminant variants. Implementors are stateless:
/// they only decide how the transform is built from the class statistics, and
/// training always returns a new, immutable model.
pub trait Discriminant {

    fn algorithm(&self) -> Algorithm;

    /// Builds the transform(s) of the model, or fails if the scatter matrices do not
    /// admit the requested number of axes.
    fn transform(&self, training : &Training, config : &TrainConfig) -> DiscriminantResult<Transform>;

    fn train(&self, data : &Dataset, config : &TrainConfig) -> DiscriminantResult<TrainedModel> {
        let algorithm = self.algorithm();
        let training = Training::new(data, config.prior);
        let transform = self.transform(&training, config).map_err(|e| {
            warn!(%algorithm, kind = e.kind(), "training rejected: {}", e);
            e
        })?;
        let fit_score = training.fit_score();
        info!(
            %algorithm,
            classes = training.num_classes(),
            observations = training.partition.total(),
            axes = transform.ncols(),
            fit_score,
            "trained model"
        );
        let Training { partition, priors, means } = training;
        Ok(TrainedModel::new(algorithm, partition.labels().to_vec(), priors, means, transform, fit_score))
    }

    fn predict(&self, model : &TrainedModel, samples : &DMatrix<f64>) -> DiscriminantResult<Decision> {
        self.algorithm().predict(model, samples)
    }

    fn score(&self, model : &TrainedModel, data : &Dataset) -> DiscriminantResult<Evaluation> {
        self.algorithm().score(model, data)
    }

}

/// Confusion matrix and rates of the model decisions against the dataset labels, over
/// the class index range of the model.
pub fn evaluate(model : &TrainedModel, data : &Dataset) -> DiscriminantResult<Evaluation> {
    let reference = data.labels().iter()
        .map(|l| model.index_of(*l).ok_or(DiscriminantError::UnknownLabel(*l)) )
        .collect::<DiscriminantResult<Vec<usize>>>()?;
    let decision = decision::decide(model, data.features())?;
    let confusion = ConfusionMatrix::new(model.num_classes(), &reference[..], &decision.classes[..])?;
    let eval = Evaluation::new(confusion);
    info!(algorithm = %model.algorithm(), observations = data.nrows(), accuracy = eval.metrics.accuracy, "scored model");
    Ok(eval)
}

/// A classifier instance owned by a single caller (one session, one request). It moves
/// from untrained to trained exactly once: a failed training leaves it untrained, and
/// a trained instance refuses to be trained again, so a model observed through it never
/// changes. To retrain, create a new classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Classifier {

    algorithm : Algorithm,

    model : Option<TrainedModel>

}

impl Classifier {

    pub fn new(algorithm : Algorithm) -> Self {
        Self { algorithm, model : None }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> DiscriminantResult<&TrainedModel> {
        self.model.as_ref().ok_or(DiscriminantError::ModelNotTrained)
    }

    pub fn into_model(self) -> Option<TrainedModel> {
        self.model
    }

    pub fn train(&mut self, data : &Dataset, config : &TrainConfig) -> DiscriminantResult<&TrainedModel> {
        if self.model.is_some() {
            return Err(DiscriminantError::AlreadyTrained);
        }
        let model = self.algorithm.train(data, config)?;
        Ok(self.model.insert(model))
    }

    /// Attaches a previously trained (e.g. deserialized) model to an untrained instance.
    pub fn restore(&mut self, model : TrainedModel) -> DiscriminantResult<&TrainedModel> {
        if self.model.is_some() {
            return Err(DiscriminantError::AlreadyTrained);
        }
        check_owner(self.algorithm, &model)?;
        Ok(self.model.insert(model))
    }

    pub fn predict(&self, samples : &DMatrix<f64>) -> DiscriminantResult<Decision> {
        self.algorithm.predict(self.model()?, samples)
    }

    pub fn score(&self, data : &Dataset) -> DiscriminantResult<Evaluation> {
        self.algorithm.score(self.model()?, data)
    }

}
