use nalgebra::*;
use serde::{Serialize, Deserialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use std::fmt::{self, Display};
use crate::error::{DiscriminantError, DiscriminantResult};
use crate::fit::Algorithm;

/// Linear map taking observations into the discriminant space. Pooled variants share
/// a single d x k matrix among all classes; class-dependent variants carry one per class,
/// in class index order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transform {
    Shared(DMatrix<f64>),
    PerClass(Vec<DMatrix<f64>>)
}

impl Transform {

    /// Transform applied to observations when evaluated against class k.
    pub fn for_class(&self, k : usize) -> &DMatrix<f64> {
        match self {
            Transform::Shared(t) => t,
            Transform::PerClass(ts) => &ts[k]
        }
    }

    pub fn matrices(&self) -> Vec<&DMatrix<f64>> {
        match self {
            Transform::Shared(t) => vec![t],
            Transform::PerClass(ts) => ts.iter().collect()
        }
    }

    /// Number of discriminant axes (columns), which all matrices share.
    pub fn ncols(&self) -> usize {
        self.matrices().first().map(|t| t.ncols() ).unwrap_or(0)
    }

}

/// Result of a successful training call: everything the decision rule needs, and
/// nothing else. A model is never mutated after training; retraining produces a new
/// model, so it can be shared freely between concurrent predictions.
///
/// Class k of the model corresponds to labels[k], priors[k], means[k] and (for
/// class-dependent variants) the k-th transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {

    algorithm : Algorithm,

    labels : Vec<i64>,

    priors : DVector<f64>,

    means : Vec<DVector<f64>>,

    transform : Transform,

    fit_score : f64

}

impl TrainedModel {

    pub(crate) fn new(
        algorithm : Algorithm,
        labels : Vec<i64>,
        priors : DVector<f64>,
        means : Vec<DVector<f64>>,
        transform : Transform,
        fit_score : f64
    ) -> Self {
        Self { algorithm, labels, priors, means, transform, fit_score }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn labels(&self) -> &[i64] {
        &self.labels[..]
    }

    pub fn priors(&self) -> &DVector<f64> {
        &self.priors
    }

    pub fn means(&self) -> &[DVector<f64>] {
        &self.means[..]
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn fit_score(&self) -> f64 {
        self.fit_score
    }

    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }

    /// Dimension of the feature vectors the model accepts.
    pub fn dim(&self) -> usize {
        self.means.first().map(|m| m.nrows() ).unwrap_or(0)
    }

    pub fn index_of(&self, label : i64) -> Option<usize> {
        self.labels.iter().position(|l| *l == label )
    }

    pub fn label_of(&self, index : usize) -> Option<i64> {
        self.labels.get(index).copied()
    }

    /// Serializes the model into an opaque blob, which from_bytes restores exactly.
    pub fn to_bytes(&self) -> DiscriminantResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(blob : &[u8]) -> DiscriminantResult<Self> {
        let model : TrainedModel = serde_json::from_slice(blob)?;
        model.validate()?;
        Ok(model)
    }

    pub fn save<W>(&self, mut writer : W) -> DiscriminantResult<()>
    where
        W : Write
    {
        writer.write_all(&self.to_bytes()?[..])?;
        Ok(())
    }

    pub fn load<R>(mut reader : R) -> DiscriminantResult<Self>
    where
        R : Read
    {
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        Self::from_bytes(&content[..])
    }

    pub fn save_to_path<P>(&self, path : P) -> DiscriminantResult<()>
    where
        P : AsRef<Path>
    {
        let file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
        self.save(file)
    }

    pub fn load_from_path<P>(path : P) -> DiscriminantResult<Self>
    where
        P : AsRef<Path>
    {
        let f = File::open(path)?;
        Self::load(f)
    }

    /// Blobs come from outside the process, so their shapes are checked before the
    /// model is handed to the decision rule.
    pub(crate) fn validate(&self) -> DiscriminantResult<()> {
        let c = self.labels.len();
        let d = self.dim();
        let inconsistent = |what : &str| DiscriminantError::Serialization(format!("inconsistent model: {}", what));
        if c == 0 || self.priors.nrows() != c || self.means.len() != c {
            return Err(inconsistent("class count"));
        }
        if self.means.iter().any(|m| m.nrows() != d ) {
            return Err(inconsistent("mean dimension"));
        }
        if self.priors.iter().any(|p| !p.is_finite() || *p < 0.0 ) || (self.priors.sum() - 1.0).abs() > 1E-9 {
            return Err(inconsistent("priors"));
        }
        if self.means.iter().any(|m| m.iter().any(|v| !v.is_finite() ) ) {
            return Err(inconsistent("non-finite mean"));
        }
        if self.transform.matrices().iter().any(|t| t.iter().any(|v| !v.is_finite() ) ) {
            return Err(inconsistent("non-finite transform"));
        }
        let k = self.transform.ncols();
        let well_formed = self.transform.matrices().iter().all(|t| t.nrows() == d && t.ncols() == k );
        let cardinality = match &self.transform {
            Transform::Shared(_) => !self.algorithm.class_dependent(),
            Transform::PerClass(ts) => self.algorithm.class_dependent() && ts.len() == c
        };
        if !well_formed || !cardinality || k == 0 {
            return Err(inconsistent("transform shape"));
        }
        Ok(())
    }

}

impl Display for TrainedModel {

    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} model ({} classes, {} features, {} axes)",
            self.algorithm, self.num_classes(), self.dim(), self.transform.ncols())?;
        for (k, label) in self.labels.iter().enumerate() {
            writeln!(f, "class {}: prior = {:.4}, mean = {:?}", label, self.priors[k], self.means[k].as_slice())?;
        }
        write!(f, "fit score = {:.6}", self.fit_score)
    }

}
