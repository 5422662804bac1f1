/// Error type shared by every operation of the crate.
pub mod error;

/// Labelled observations and their partition into classes.
pub mod sample;

/// Column statistics and covariance estimation under configurable centering and scaling.
pub mod calc;

/// Spectral transformations: whitening of symmetric scatter matrices and Fisher
/// generalized eigendecomposition.
pub mod basis;

/// The four discriminant classifiers, their training configuration and lifecycle.
pub mod fit;

/// Trained, immutable models and their serialized form.
pub mod model;

// Gaussian decision rule over the transformed space, and the scoring of its decisions
// against reference labels.
pub mod decision;

/// Request boundary: caller labels, parameter parsing and per-session model storage.
pub mod api;

pub use error::{DiscriminantError, DiscriminantResult};
pub use fit::{Algorithm, Classifier, TrainConfig, PriorPolicy};
pub use model::TrainedModel;
pub use sample::Dataset;
