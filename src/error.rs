use thiserror::Error;
use crate::fit::Algorithm;

/// Failures surfaced by training, prediction, scoring and the request boundary.
/// All of them are deterministic given the same input, so none is retried: the caller
/// must change the configuration (fewer components, another scaling) or the data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiscriminantError {

    #[error("number of components {requested} outside (0, {dim}]")]
    ComponentRange { requested : usize, dim : usize },

    #[error("scatter matrix has a negative eigenvalue ({value:e})")]
    NegativeEigenvalue { value : f64 },

    #[error("singular matrix while building {context}")]
    Singular { context : &'static str },

    #[error("unknown prior mode '{0}' (expected 'ml' or 'map')")]
    UnknownPriorMode(String),

    #[error("unknown value '{value}' for option {option}")]
    UnknownOption { option : &'static str, value : String },

    #[error("unknown algorithm '{0}'")]
    UnknownAlgorithm(String),

    #[error("classifier is already trained; create a new one to retrain")]
    AlreadyTrained,

    #[error("classifier has not been trained")]
    ModelNotTrained,

    #[error("model trained by {found} cannot be used by {expected}")]
    NameMismatch { expected : Algorithm, found : Algorithm },

    #[error("feature vector has length {found}, expected {expected}")]
    DimensionMismatch { expected : usize, found : usize },

    #[error("dataset has no observations")]
    EmptyDataset,

    #[error("coordinate arrays differ in length: {x} x values, {y} y values")]
    CoordinateLength { x : usize, y : usize },

    #[error("dataset has {rows} rows but {labels} labels")]
    LabelCount { rows : usize, labels : usize },

    #[error("label {0} is not a class of the trained model")]
    UnknownLabel(i64),

    #[error("label '{0}' was not seen during training")]
    UnseenLabel(String),

    #[error("model serialization failed: {0}")]
    Serialization(String)

}

impl DiscriminantError {

    /// Stable upper-case name reported at the request boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            DiscriminantError::ComponentRange { .. } => "COMPONENT_RANGE",
            DiscriminantError::NegativeEigenvalue { .. } => "NEGATIVE_EIGENVALUE",
            DiscriminantError::Singular { .. } => "SINGULAR",
            DiscriminantError::UnknownPriorMode(_) => "UNKNOWN_PRIOR_MODE",
            DiscriminantError::UnknownOption { .. } => "UNKNOWN_OPTION",
            DiscriminantError::UnknownAlgorithm(_) => "UNKNOWN_ALGORITHM",
            DiscriminantError::AlreadyTrained => "ALREADY_TRAINED",
            DiscriminantError::ModelNotTrained => "MODEL_NOT_TRAINED",
            DiscriminantError::NameMismatch { .. } => "NAME_MISMATCH",
            DiscriminantError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            DiscriminantError::EmptyDataset => "EMPTY_DATASET",
            DiscriminantError::CoordinateLength { .. } => "COORDINATE_LENGTH",
            DiscriminantError::LabelCount { .. } => "LABEL_COUNT",
            DiscriminantError::UnknownLabel(_) | DiscriminantError::UnseenLabel(_) => "UNKNOWN_LABEL",
            DiscriminantError::Serialization(_) => "SERIALIZATION"
        }
    }

}

impl From<serde_json::Error> for DiscriminantError {

    fn from(e : serde_json::Error) -> Self {
        DiscriminantError::Serialization(e.to_string())
    }

}

impl From<std::io::Error> for DiscriminantError {

    fn from(e : std::io::Error) -> Self {
        DiscriminantError::Serialization(e.to_string())
    }

}

pub type DiscriminantResult<T> = Result<T, DiscriminantError>;

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn kinds_match_boundary_names() {
        let e = DiscriminantError::ComponentRange { requested : 0, dim : 2 };
        assert_eq!(e.kind(), "COMPONENT_RANGE");
        assert_eq!(e.to_string(), "number of components 0 outside (0, 2]");
        assert_eq!(DiscriminantError::UnknownPriorMode("mle".into()).kind(), "UNKNOWN_PRIOR_MODE");
        assert_eq!(DiscriminantError::Singular { context : "whitening transform" }.kind(), "SINGULAR");
    }

}
