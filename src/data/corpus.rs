//! Benchmark corpus discovery, CSV loading and parquet export.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use polars::prelude::{DataFrame, IntoSeries, ListChunked, NamedFrom, ParquetWriter, Series};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::data::record::{Record, RecordBatch, VectorValue};

/// Corpus directory names recognised under `interim/`.
pub const BENCHMARK_CORPORA: &[&str] = &["smm4h17", "smm4h21", "psytar", "cadec"];

/// Train/test CSV pair for one benchmark corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusSplit {
    pub name: String,
    pub train: PathBuf,
    pub test: PathBuf,
}

/// List benchmark corpora under `root`, ignoring unrelated directories.
pub fn discover(root: &Path) -> Result<Vec<CorpusSplit>> {
    if !root.exists() {
        warn!(path = %root.display(), "corpus root missing");
        return Ok(Vec::new());
    }
    let mut splits = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !BENCHMARK_CORPORA.contains(&name) {
            continue;
        }
        splits.push(CorpusSplit {
            name: name.to_string(),
            train: entry.path().join("train.csv"),
            test: entry.path().join("test.csv"),
        });
    }
    info!(count = splits.len(), "discovered benchmark corpora");
    Ok(splits)
}

/// Read a corpus CSV with at least a `term` column.
pub fn load_records(path: &Path, limit: Option<usize>) -> Result<RecordBatch> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("open corpus {}", path.display()))?;
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        if limit.is_some_and(|limit| rows.len() >= limit) {
            break;
        }
        let row: Record = result.with_context(|| format!("parse row in {}", path.display()))?;
        rows.push(row);
    }
    info!(path = %path.display(), rows = rows.len(), "loaded corpus rows");
    Ok(RecordBatch::new(rows))
}

/// Read the `text` column of a CSV, skipping empty cells.
pub fn load_texts(path: &Path) -> Result<Vec<String>> {
    let batch = load_records(path, None)?;
    Ok(batch.into_rows().into_iter().filter_map(|row| row.text).collect())
}

/// Materialise a vectorized batch as a polars frame.
///
/// The vector column is a `List(Float32)`; raw pass-through and missing rows are null.
pub fn to_frame(batch: &RecordBatch) -> Result<DataFrame> {
    let rows = batch.rows();
    let terms: Vec<&str> = rows.iter().map(|r| r.term.as_str()).collect();
    let texts: Vec<Option<&str>> = rows.iter().map(|r| r.text.as_deref()).collect();
    let codes: Vec<Option<&str>> = rows.iter().map(|r| r.code.as_deref()).collect();

    let mut columns = vec![
        Series::new("term".into(), terms),
        Series::new("text".into(), texts),
        Series::new("code".into(), codes),
    ];
    if let Some(name) = batch.vector_column() {
        let vectors: ListChunked = rows
            .iter()
            .map(|r| match &r.vector {
                Some(VectorValue::Dense(values)) => Some(Series::new("".into(), values.as_slice())),
                _ => None,
            })
            .collect();
        columns.push(vectors.into_series().with_name(name.into()));
    }
    Ok(DataFrame::new(columns)?)
}

/// Write a vectorized batch to parquet.
pub fn write_parquet(batch: &RecordBatch, path: &Path) -> Result<()> {
    let mut df = to_frame(batch)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    ParquetWriter::new(file).finish(&mut df)?;
    info!(path = %path.display(), rows = df.height(), "wrote vectorized parquet");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_skips_unknown_directories() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["cadec", "psytar", "scratch"] {
            std::fs::create_dir_all(dir.path().join(name)).unwrap();
        }
        let splits = discover(dir.path()).unwrap();
        let names: Vec<_> = splits.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["cadec", "psytar"]);
        assert!(splits[0].train.ends_with("cadec/train.csv"));
    }

    #[test]
    fn load_records_honours_limit_and_blank_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        std::fs::write(
            &path,
            "term,text,code\nheadache,,10019211\nfelt dizzy,I felt dizzy all day,10013573\nrash,,10037844\n",
        )
        .unwrap();
        let batch = load_records(&path, Some(2)).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.rows()[0].text, None);
        assert_eq!(batch.rows()[1].text.as_deref(), Some("I felt dizzy all day"));
        assert_eq!(batch.rows()[1].code.as_deref(), Some("10013573"));
    }
}
