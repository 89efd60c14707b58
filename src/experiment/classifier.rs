//! Multinomial logistic regression over record vectors, with top-k accuracy.

use anyhow::{bail, Result};
use indexmap::IndexMap;
use linfa::{dataset::DatasetBase, prelude::Fit};
use linfa_logistic::{MultiFittedLogisticRegression, MultiLogisticRegression};
use ndarray::{Array1, Array2};
use tracing::info;

pub const MODEL_NAME: &str = "logistic_regression";

/// Fits on labelled vectors and scores acc@k.
#[derive(Debug)]
pub struct Trainer {
    max_iterations: u64,
    alpha: f64,
    model: Option<MultiFittedLogisticRegression<f64, usize>>,
}

impl Default for Trainer {
    fn default() -> Self {
        Self {
            max_iterations: 150,
            alpha: 1.0,
            model: None,
        }
    }
}

impl Trainer {
    pub fn params(&self) -> IndexMap<&'static str, String> {
        IndexMap::from([
            ("max_iterations", self.max_iterations.to_string()),
            ("alpha", self.alpha.to_string()),
        ])
    }

    pub fn train(&mut self, x: Array2<f64>, y: Array1<usize>) -> Result<()> {
        if x.nrows() == 0 {
            bail!("no training rows");
        }
        let classes = {
            let mut labels = y.to_vec();
            labels.sort_unstable();
            labels.dedup();
            labels.len()
        };
        if classes < 2 {
            bail!("need at least two classes to fit, got {classes}");
        }
        let dataset = DatasetBase::new(x, y);
        let fitted = MultiLogisticRegression::default()
            .alpha(self.alpha)
            .max_iterations(self.max_iterations)
            .fit(&dataset)?;
        info!(rows = dataset.records().nrows(), classes, "fitted classifier");
        self.model = Some(fitted);
        Ok(())
    }

    /// Share of rows whose label is among the `k` most probable classes.
    pub fn accuracy(&self, x: &Array2<f64>, y: &[usize], k: usize) -> Result<f64> {
        let Some(model) = &self.model else {
            bail!("classifier has not been trained");
        };
        if y.is_empty() {
            return Ok(0.0);
        }
        let probabilities = model.predict_probabilities(x);
        let classes = model.classes();
        let hits = probabilities
            .rows()
            .into_iter()
            .zip(y)
            .filter(|(row, label)| {
                let mut ranked: Vec<(usize, f64)> = row.iter().copied().enumerate().collect();
                ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
                ranked
                    .iter()
                    .take(k)
                    .any(|(col, _)| classes.get(*col) == Some(*label))
            })
            .count();
        Ok(hits as f64 / y.len() as f64)
    }
}

/// Stack equal-length vectors into a design matrix.
pub fn design_matrix(rows: &[&[f32]]) -> Result<Array2<f64>> {
    let width = rows.first().map_or(0, |r| r.len());
    let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().map(|&v| v as f64)).collect();
    Ok(Array2::from_shape_vec((rows.len(), width), flat)?)
}
