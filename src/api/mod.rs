use nalgebra::*;
use parking_lot::RwLock;
use serde::{Serialize, Deserialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt::{self, Display};
use std::sync::Arc;
use tracing::info;
use crate::calc::cov::CovarianceConfig;
use crate::decision::Evaluation;
use crate::error::{DiscriminantError, DiscriminantResult};
use crate::fit::{Algorithm, Classifier, PriorPolicy, TrainConfig};
use crate::model::TrainedModel;
use crate::sample::{self, Dataset};

/// A class label as the caller writes it: either an integer or a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Int(i64),
    Text(String)
}

impl Display for Label {

    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Int(i) => write!(f, "{}", i),
            Label::Text(s) => write!(f, "{}", s)
        }
    }

}

/// Maps caller labels to the integer labels the classifiers work with. Integer labels
/// keep their value; when any label is a name, all labels are numbered in sorted order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LabelTable {

    entries : Vec<(Label, i64)>

}

impl LabelTable {

    /// Builds the table from the training labels and encodes them.
    pub fn encode(labels : &[Label]) -> (Self, Vec<i64>) {
        let distinct : BTreeSet<&Label> = labels.iter().collect();
        let all_int = distinct.iter().all(|l| matches!(l, Label::Int(_)) );
        let entries : Vec<(Label, i64)> = distinct.into_iter()
            .enumerate()
            .map(|(ix, l)| match l {
                Label::Int(v) if all_int => (l.clone(), *v),
                _ => (l.clone(), ix as i64)
            })
            .collect();
        let table = Self { entries };
        let codes = labels.iter().filter_map(|l| table.code(l) ).collect();
        (table, codes)
    }

    pub fn code(&self, label : &Label) -> Option<i64> {
        self.entries.iter().find(|(l, _)| l == label ).map(|(_, c)| *c )
    }

    pub fn label(&self, code : i64) -> Option<&Label> {
        self.entries.iter().find(|(_, c)| *c == code ).map(|(l, _)| l )
    }

    pub fn codes(&self, labels : &[Label]) -> DiscriminantResult<Vec<i64>> {
        labels.iter()
            .map(|l| self.code(l).ok_or_else(|| DiscriminantError::UnseenLabel(l.to_string())) )
            .collect()
    }

}

/// Parameter block of a training request. Every field is optional; absent fields take
/// the defaults of TrainConfig (ml priors, full covariance, untied centering, biased
/// scaling, all components).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {

    pub prior : Option<String>,

    pub ctype : Option<String>,

    pub center : Option<String>,

    pub scale : Option<String>,

    pub n_components : Option<usize>

}

impl Params {

    pub fn config(&self) -> DiscriminantResult<TrainConfig> {
        let defaults = CovarianceConfig::default();
        let prior = match &self.prior {
            Some(p) => p.parse()?,
            None => PriorPolicy::default()
        };
        let covariance = CovarianceConfig {
            ctype : self.ctype.as_ref().map(|s| s.parse() ).transpose()?.unwrap_or(defaults.ctype),
            center : self.center.as_ref().map(|s| s.parse() ).transpose()?.unwrap_or(defaults.center),
            scale : self.scale.as_ref().map(|s| s.parse() ).transpose()?.unwrap_or(defaults.scale)
        };
        Ok(TrainConfig { prior, covariance, n_components : self.n_components })
    }

}

/// Two-dimensional points as parallel coordinate arrays.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Points {

    pub x : Vec<f64>,

    pub y : Vec<f64>

}

impl Points {

    fn matrix(&self) -> DiscriminantResult<DMatrix<f64>> {
        sample::xy_matrix(&self.x[..], &self.y[..])
    }

}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainRequest {

    pub algorithm : String,

    #[serde(flatten)]
    pub points : Points,

    pub labels : Vec<Label>,

    #[serde(default)]
    pub params : Params

}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainResponse {

    pub handle : String,

    pub algorithm : Algorithm,

    pub fit_score : f64,

    pub classes : Vec<Label>

}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateRequest {

    #[serde(flatten)]
    pub points : Points,

    pub labels : Vec<Label>

}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {

    pub labels : Vec<Label>,

    pub posteriors : Vec<Vec<f64>>

}

/// Failure as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {

    pub kind : String,

    pub message : String

}

impl From<&DiscriminantError> for ErrorResponse {

    fn from(e : &DiscriminantError) -> Self {
        Self { kind : e.kind().to_string(), message : e.to_string() }
    }

}

/// A published model together with the table translating its labels back to the
/// caller's. Sessions are immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {

    pub model : TrainedModel,

    pub labels : LabelTable

}

impl Session {

    pub fn to_bytes(&self) -> DiscriminantResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(blob : &[u8]) -> DiscriminantResult<Self> {
        let session : Session = serde_json::from_slice(blob)?;
        session.model.validate()?;
        if session.model.labels().iter().any(|c| session.labels.label(*c).is_none() ) {
            return Err(DiscriminantError::Serialization("label table does not cover the model classes".into()));
        }
        Ok(session)
    }

    fn decode(&self, codes : &[i64]) -> Vec<Label> {
        codes.iter()
            .map(|c| self.labels.label(*c).cloned().unwrap_or(Label::Int(*c)) )
            .collect()
    }

}

/// Trained models addressed by an opaque caller handle (a session or user id).
///
/// Each training call builds a fresh classifier and trains it without holding any lock;
/// only the successful result is published, replacing whatever the handle pointed to
/// before in a single step. Readers clone the Arc and work on their own snapshot, so a
/// prediction never observes a model that is being replaced, and a failed training
/// never disturbs the model already published under the same handle.
#[derive(Debug, Default)]
pub struct Sessions {

    entries : RwLock<HashMap<String, Arc<Session>>>

}

impl Sessions {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn train(&self, handle : &str, request : &TrainRequest) -> DiscriminantResult<TrainResponse> {
        let algorithm : Algorithm = request.algorithm.parse()?;
        let config = request.params.config()?;
        let (labels, codes) = LabelTable::encode(&request.labels[..]);
        let data = Dataset::new(request.points.matrix()?, codes)?;
        let mut classifier = Classifier::new(algorithm);
        classifier.train(&data, &config)?;
        let model = classifier.into_model().ok_or(DiscriminantError::ModelNotTrained)?;
        let session = Session { model, labels };
        let response = TrainResponse {
            handle : handle.to_string(),
            algorithm,
            fit_score : session.model.fit_score(),
            classes : session.decode(session.model.labels())
        };
        self.publish(handle, session);
        Ok(response)
    }

    fn publish(&self, handle : &str, session : Session) {
        let previous = self.entries.write().insert(handle.to_string(), Arc::new(session));
        info!(handle, replaced = previous.is_some(), "published model");
    }

    pub fn get(&self, handle : &str) -> DiscriminantResult<Arc<Session>> {
        self.entries.read().get(handle).cloned().ok_or(DiscriminantError::ModelNotTrained)
    }

    pub fn remove(&self, handle : &str) -> bool {
        self.entries.write().remove(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn predict(&self, handle : &str, points : &Points) -> DiscriminantResult<PredictResponse> {
        let session = self.get(handle)?;
        let decision = session.model.algorithm().predict(&session.model, &points.matrix()?)?;
        let posteriors = decision.posteriors.row_iter()
            .map(|row| row.iter().copied().collect() )
            .collect();
        Ok(PredictResponse { labels : session.decode(&decision.labels[..]), posteriors })
    }

    pub fn evaluate(&self, handle : &str, request : &EvaluateRequest) -> DiscriminantResult<Evaluation> {
        let session = self.get(handle)?;
        let codes = session.labels.codes(&request.labels[..])?;
        let data = Dataset::new(request.points.matrix()?, codes)?;
        session.model.algorithm().score(&session.model, &data)
    }

    /// Class decisions over a steps x steps grid spanning the informed ranges, for drawing
    /// decision regions.
    pub fn predict_grid(
        &self,
        handle : &str,
        x_range : (f64, f64),
        y_range : (f64, f64),
        steps : usize
    ) -> DiscriminantResult<(Points, PredictResponse)> {
        let points = grid(x_range, y_range, steps);
        let response = self.predict(handle, &points)?;
        Ok((points, response))
    }

    pub fn export(&self, handle : &str) -> DiscriminantResult<Vec<u8>> {
        self.get(handle)?.to_bytes()
    }

    pub fn import(&self, handle : &str, blob : &[u8]) -> DiscriminantResult<()> {
        let session = Session::from_bytes(blob)?;
        self.publish(handle, session);
        Ok(())
    }

}

/// Row-major grid of steps x steps points over the closed ranges (x varies fastest).
pub fn grid(x_range : (f64, f64), y_range : (f64, f64), steps : usize) -> Points {
    let axis = |(lo, hi) : (f64, f64)| -> Vec<f64> {
        match steps {
            0 => Vec::new(),
            1 => vec![lo],
            n => (0..n).map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64 ).collect()
        }
    };
    let (xs, ys) = (axis(x_range), axis(y_range));
    let mut points = Points::default();
    for y in ys.iter() {
        for x in xs.iter() {
            points.x.push(*x);
            points.y.push(*y);
        }
    }
    points
}
