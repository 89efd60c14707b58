//! MedDRA code → dense class id mapping.

use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::info;

/// Dense, first-seen ordering of every known MedDRA code.
#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    ids: IndexMap<String, usize>,
}

#[derive(Debug, Deserialize)]
struct LabelRow {
    #[serde(rename = "CODE")]
    code: String,
}

impl LabelIndex {
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids = IndexMap::new();
        for code in codes {
            let key = code.as_ref().trim().to_string();
            let next = ids.len();
            ids.entry(key).or_insert(next);
        }
        Self { ids }
    }

    /// Load the label vocabulary from a CSV carrying a `CODE` column.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("open label vocabulary {}", path.display()))?;
        let mut codes = Vec::new();
        for row in reader.deserialize() {
            let row: LabelRow = row?;
            codes.push(row.code);
        }
        let index = Self::from_codes(codes);
        info!(labels = index.len(), "built label index");
        Ok(index)
    }

    pub fn id(&self, code: &str) -> Option<usize> {
        self.ids.get(code.trim()).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_codes_keep_first_id() {
        let index = LabelIndex::from_codes(["10019211", "10013573", "10019211", " 10037844 "]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.id("10019211"), Some(0));
        assert_eq!(index.id("10037844"), Some(2));
        assert_eq!(index.id("999"), None);
    }
}
