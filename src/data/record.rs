//! Record batches flowing through the vectorizers.

use serde::{Deserialize, Serialize};

/// Default text-bearing field consumed by every backend.
pub const TERM_FIELD: &str = "term";

/// One mention to classify, optionally with the surrounding context.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Record {
    pub term: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub code: Option<String>,
    #[serde(skip)]
    pub vector: Option<VectorValue>,
}

impl Record {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            text: None,
            code: None,
            vector: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Dense vector if the record was vectorized to a fixed-shape value.
    pub fn dense(&self) -> Option<&[f32]> {
        match &self.vector {
            Some(VectorValue::Dense(values)) => Some(values),
            _ => None,
        }
    }
}

/// Value stored in the appended `<field>_vec` column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VectorValue {
    Dense(Vec<f32>),
    /// Untokenizable input passed through verbatim by the word-vector backends.
    Raw(String),
}

impl VectorValue {
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Dense(values) => Some(values.len()),
            Self::Raw(_) => None,
        }
    }
}

/// Ordered, growable table of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBatch {
    rows: Vec<Record>,
    vector_column: Option<String>,
}

impl RecordBatch {
    pub fn new(rows: Vec<Record>) -> Self {
        Self {
            rows,
            vector_column: None,
        }
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Name of the appended vector column, once a vectorizer ran.
    pub fn vector_column(&self) -> Option<&str> {
        self.vector_column.as_deref()
    }

    /// Attach one value per row under `<field>_vec`.
    ///
    /// Panics if `values` does not have exactly one entry per row; backends
    /// always emit one value per input record.
    pub fn append_vectors(&mut self, field: &str, values: Vec<Option<VectorValue>>) {
        assert_eq!(values.len(), self.rows.len(), "one vector per record");
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.vector = value;
        }
        self.vector_column = Some(format!("{field}_vec"));
    }

    /// Drop rows without a vector. Returns the number of rows removed.
    pub fn drop_missing(&mut self) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| row.vector.is_some());
        before - self.rows.len()
    }

    /// Drop rows without a fixed-shape vector, including raw pass-through rows.
    pub fn drop_non_dense(&mut self) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| row.dense().is_some());
        before - self.rows.len()
    }

    /// Dense vector length shared by every vectorized row, if any.
    pub fn dense_width(&self) -> Option<usize> {
        self.rows.iter().find_map(|row| row.dense().map(<[f32]>::len))
    }
}

impl FromIterator<Record> for RecordBatch {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}
