use nalgebra::*;
use serde::{Serialize, Deserialize};
use std::fmt::{self, Display};
use crate::error::{DiscriminantError, DiscriminantResult};

/// Counts of correct and wrong decisions for one class taken as the positive outcome
/// against all others.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Outcomes {

    pub true_pos : f64,

    pub true_neg : f64,

    pub false_pos : f64,

    pub false_neg : f64

}

impl Outcomes {

    pub fn sensitivity(&self) -> f64 {
        ratio(self.true_pos, self.true_pos + self.false_neg)
    }

    pub fn specificity(&self) -> f64 {
        ratio(self.true_neg, self.true_neg + self.false_pos)
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_pos, self.true_pos + self.false_pos)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.sensitivity());
        ratio(2.0 * p * r, p + r)
    }

}

fn ratio(num : f64, den : f64) -> f64 {
    if den > 0.0 { num / den } else { 0.0 }
}

/// Aggregate rates over a confusion matrix. Sensitivity, specificity, precision and F1
/// are the rates of class index 1 for two-class problems, and the unweighted average of
/// the per-class rates otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {

    pub accuracy : f64,

    pub error_rate : f64,

    pub sensitivity : f64,

    pub specificity : f64,

    pub precision : f64,

    pub f1 : f64

}

impl Display for Metrics {

    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accuracy = {:.4}, error = {:.4}, sensitivity = {:.4}, specificity = {:.4}, precision = {:.4}, f1 = {:.4}",
            self.accuracy, self.error_rate, self.sensitivity, self.specificity, self.precision, self.f1
        )
    }

}

/// Square matrix of decision counts over the fixed class range [0, C): rows index
/// the reference class and columns the hypothesis, so classes that never occur on
/// one side still show up as zero rows or columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {

    counts : DMatrix<usize>

}

impl ConfusionMatrix {

    pub fn new(
        num_classes : usize,
        reference : &[usize],
        hypothesis : &[usize]
    ) -> DiscriminantResult<Self> {
        if reference.len() != hypothesis.len() {
            return Err(DiscriminantError::LabelCount { rows : hypothesis.len(), labels : reference.len() });
        }
        let mut counts = DMatrix::from_element(num_classes, num_classes, 0usize);
        for (r, h) in reference.iter().zip(hypothesis.iter()) {
            if let Some(bad) = [*r, *h].iter().find(|c| **c >= num_classes ) {
                return Err(DiscriminantError::UnknownLabel(*bad as i64));
            }
            counts[(*r, *h)] += 1;
        }
        Ok(Self { counts })
    }

    pub fn num_classes(&self) -> usize {
        self.counts.nrows()
    }

    pub fn counts(&self) -> &DMatrix<usize> {
        &self.counts
    }

    pub fn get(&self, reference : usize, hypothesis : usize) -> usize {
        self.counts[(reference, hypothesis)]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.num_classes()).map(|k| self.counts[(k, k)] ).sum()
    }

    /// Outcomes for class k as the positive outcome.
    pub fn outcomes(&self, k : usize) -> Outcomes {
        let row : usize = self.counts.row(k).iter().sum();
        let col : usize = self.counts.column(k).iter().sum();
        let tp = self.counts[(k, k)];
        let false_neg = row - tp;
        let false_pos = col - tp;
        Outcomes {
            true_pos : tp as f64,
            false_neg : false_neg as f64,
            false_pos : false_pos as f64,
            true_neg : (self.total() - tp - false_neg - false_pos) as f64
        }
    }

    pub fn metrics(&self) -> Metrics {
        let total = self.total();
        let accuracy = ratio(self.correct() as f64, total as f64);
        let per_class : Vec<Outcomes> = (0..self.num_classes()).map(|k| self.outcomes(k) ).collect();
        let avg = |f : fn(&Outcomes) -> f64| -> f64 {
            if per_class.len() == 2 {
                f(&per_class[1])
            } else if per_class.is_empty() {
                0.0
            } else {
                per_class.iter().map(f).sum::<f64>() / per_class.len() as f64
            }
        };
        Metrics {
            accuracy,
            error_rate : 1.0 - accuracy,
            sensitivity : avg(Outcomes::sensitivity),
            specificity : avg(Outcomes::specificity),
            precision : avg(Outcomes::precision),
            f1 : avg(Outcomes::f1)
        }
    }

}

impl Display for ConfusionMatrix {

    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.counts.row_iter() {
            let cells : Vec<String> = row.iter().map(|c| format!("{:>6}", c) ).collect();
            writeln!(f, "{}", cells.join(" "))?;
        }
        Ok(())
    }

}

/// Scores of a model over a labeled sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {

    pub confusion : ConfusionMatrix,

    pub metrics : Metrics

}

impl Evaluation {

    pub fn new(confusion : ConfusionMatrix) -> Self {
        let metrics = confusion.metrics();
        Self { confusion, metrics }
    }

}
