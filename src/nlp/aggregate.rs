//! Policies for collapsing per-token vectors into one record vector.

use std::str::FromStr;

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Word-vector aggregation, chosen once per process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Avg,
    Max,
}

/// Pooling applied to the transformer states attributed to a span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanPooling {
    #[default]
    Mean,
    Sum,
}

impl FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "avg" | "mean" => Ok(Self::Avg),
            "max" => Ok(Self::Max),
            other => Err(format!("unknown aggregation `{other}`")),
        }
    }
}

impl FromStr for SpanPooling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" | "avg" => Ok(Self::Mean),
            "sum" => Ok(Self::Sum),
            other => Err(format!("unknown span pooling `{other}`")),
        }
    }
}

impl Aggregation {
    pub const ALL: [Aggregation; 2] = [Aggregation::Avg, Aggregation::Max];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Avg => "avg",
            Self::Max => "max",
        }
    }

    /// Element-wise reduction over equally sized vectors; `None` for an empty set.
    pub fn apply(&self, vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
        let matrix = stack(vectors)?;
        let reduced = match self {
            Self::Avg => matrix.mean_axis(Axis(0))?,
            Self::Max => matrix.fold_axis(Axis(0), f32::NEG_INFINITY, |acc, &v| acc.max(v)),
        };
        Some(reduced.to_vec())
    }
}

impl SpanPooling {
    pub const ALL: [SpanPooling; 2] = [SpanPooling::Mean, SpanPooling::Sum];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Sum => "sum",
        }
    }

    /// Reduce the rows of a `[tokens, hidden]` matrix; `None` when it has no rows.
    pub fn apply(&self, states: ArrayView2<'_, f32>) -> Option<Vec<f32>> {
        if states.nrows() == 0 {
            return None;
        }
        let reduced = match self {
            Self::Mean => states.mean_axis(Axis(0))?,
            Self::Sum => states.sum_axis(Axis(0)),
        };
        Some(reduced.to_vec())
    }
}

fn stack(vectors: &[Vec<f32>]) -> Option<Array2<f32>> {
    let width = vectors.first()?.len();
    let flat: Vec<f32> = vectors.iter().flatten().copied().collect();
    Array2::from_shape_vec((vectors.len(), width), flat).ok()
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn avg_and_max_are_element_wise() {
        let vectors = vec![vec![1.0, 4.0], vec![3.0, -2.0]];
        assert_eq!(Aggregation::Avg.apply(&vectors), Some(vec![2.0, 1.0]));
        assert_eq!(Aggregation::Max.apply(&vectors), Some(vec![3.0, 4.0]));
    }

    #[test]
    fn empty_input_has_no_aggregate() {
        assert_eq!(Aggregation::Avg.apply(&[]), None);
        let empty = Array2::<f32>::zeros((0, 3));
        assert_eq!(SpanPooling::Mean.apply(empty.view()), None);
    }

    #[test]
    fn span_pooling_sums_rows() {
        let states = array![[1.0f32, 2.0], [3.0, 4.0]];
        assert_eq!(SpanPooling::Sum.apply(states.view()), Some(vec![4.0, 6.0]));
        assert_eq!(SpanPooling::Mean.apply(states.view()), Some(vec![2.0, 3.0]));
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("MAX".parse::<Aggregation>(), Ok(Aggregation::Max));
        assert_eq!("sum".parse::<SpanPooling>(), Ok(SpanPooling::Sum));
        assert!("median".parse::<Aggregation>().is_err());
    }
}
