use nalgebra::*;
use std::collections::BTreeMap;
use crate::error::{DiscriminantError, DiscriminantResult};

/// A labeled sample: one observation per row of a tall feature matrix, and one
/// integer class label per row. All observations share the same dimension by
/// construction, and the dataset is never mutated after it is built, so it can be
/// handed by reference to any number of training calls.
///
/// Classifiers never look at the rows in dataset order; they always work over
/// the partition by label (see Partition).
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {

    features : DMatrix<f64>,

    labels : Vec<i64>

}

impl Dataset {

    pub fn new(features : DMatrix<f64>, labels : Vec<i64>) -> DiscriminantResult<Self> {
        if features.nrows() != labels.len() {
            return Err(DiscriminantError::LabelCount { rows : features.nrows(), labels : labels.len() });
        }
        if features.nrows() == 0 || features.ncols() == 0 {
            return Err(DiscriminantError::EmptyDataset);
        }
        Ok(Self { features, labels })
    }

    /// Builds the dataset from row vectors, which must all share the length of the first row.
    pub fn from_rows(rows : &[Vec<f64>], labels : Vec<i64>) -> DiscriminantResult<Self> {
        let dim = rows.first().map(|r| r.len() ).ok_or(DiscriminantError::EmptyDataset)?;
        if let Some(bad) = rows.iter().find(|r| r.len() != dim ) {
            return Err(DiscriminantError::DimensionMismatch { expected : dim, found : bad.len() });
        }
        let features = DMatrix::from_row_slice(rows.len(), dim, &rows.concat()[..]);
        Self::new(features, labels)
    }

    /// Builds a two-dimensional dataset from parallel coordinate arrays, which is how
    /// the plotting front-end ships its points.
    pub fn from_xy(x : &[f64], y : &[f64], labels : Vec<i64>) -> DiscriminantResult<Self> {
        Self::new(xy_matrix(x, y)?, labels)
    }

    pub fn features(&self) -> &DMatrix<f64> {
        &self.features
    }

    pub fn labels(&self) -> &[i64] {
        &self.labels[..]
    }

    pub fn nrows(&self) -> usize {
        self.features.nrows()
    }

    pub fn dim(&self) -> usize {
        self.features.ncols()
    }

    /// Splits the observations by label. Classes are ordered by ascending label value,
    /// and rows keep their dataset order inside each class.
    pub fn partition(&self) -> Partition {
        let mut rows : BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (ix, label) in self.labels.iter().enumerate() {
            rows.entry(*label).or_insert_with(Vec::new).push(ix);
        }
        let labels : Vec<i64> = rows.keys().copied().collect();
        let classes = rows.values()
            .map(|ixs| self.features.select_rows(ixs.iter()) )
            .collect();
        Partition { labels, classes }
    }

}

/// Per-class feature matrices, in ascending label order. The position of a class
/// in this partition is its class index everywhere else (priors, means, transforms,
/// confusion matrix rows).
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {

    labels : Vec<i64>,

    classes : Vec<DMatrix<f64>>

}

impl Partition {

    pub fn labels(&self) -> &[i64] {
        &self.labels[..]
    }

    pub fn classes(&self) -> &[DMatrix<f64>] {
        &self.classes[..]
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn counts(&self) -> Vec<usize> {
        self.classes.iter().map(|c| c.nrows() ).collect()
    }

    pub fn total(&self) -> usize {
        self.classes.iter().map(|c| c.nrows() ).sum()
    }

    pub fn dim(&self) -> usize {
        self.classes.first().map(|c| c.ncols() ).unwrap_or(0)
    }

    pub fn index_of(&self, label : i64) -> Option<usize> {
        self.labels.binary_search(&label).ok()
    }

}

/// Stacks parallel x and y coordinate arrays as the two columns of a feature matrix.
pub fn xy_matrix(x : &[f64], y : &[f64]) -> DiscriminantResult<DMatrix<f64>> {
    if x.len() != y.len() {
        return Err(DiscriminantError::CoordinateLength { x : x.len(), y : y.len() });
    }
    Ok(DMatrix::from_fn(x.len(), 2, |i, j| if j == 0 { x[i] } else { y[i] }))
}
