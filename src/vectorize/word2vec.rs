//! Static word-vector tables in the word2vec binary and text formats.

use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use ndarray::{Array2, ArrayView1};
use tracing::info;

use crate::{
    error::{Result, VectorizeError},
    vectorize::word_vectors::EmbeddingTable,
};

/// Exact-match word → vector table.
#[derive(Debug, Clone)]
pub struct WordVectors {
    index: HashMap<String, usize>,
    words: Vec<String>,
    matrix: Array2<f32>,
}

impl WordVectors {
    /// Build a table from `(word, vector)` pairs; later duplicates are ignored.
    pub fn from_pairs(dim: usize, pairs: Vec<(String, Vec<f32>)>) -> Result<Self> {
        let mut index = HashMap::with_capacity(pairs.len());
        let mut words = Vec::with_capacity(pairs.len());
        let mut flat = Vec::with_capacity(pairs.len() * dim);
        for (word, vector) in pairs {
            if vector.len() != dim {
                return Err(VectorizeError::Model(format!(
                    "vector for `{word}` has {} dims, expected {dim}",
                    vector.len()
                )));
            }
            if index.contains_key(&word) {
                continue;
            }
            index.insert(word.clone(), words.len());
            words.push(word);
            flat.extend(vector);
        }
        let matrix = Array2::from_shape_vec((words.len(), dim), flat)
            .map_err(|e| VectorizeError::Model(e.to_string()))?;
        Ok(Self {
            index,
            words,
            matrix,
        })
    }

    pub fn from_matrix(words: Vec<String>, matrix: Array2<f32>) -> Self {
        let index = words
            .iter()
            .enumerate()
            .map(|(idx, word)| (word.clone(), idx))
            .collect();
        Self {
            index,
            words,
            matrix,
        }
    }

    pub fn get(&self, word: &str) -> Option<ArrayView1<'_, f32>> {
        self.index.get(word).map(|&row| self.matrix.row(row))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Load either format, choosing binary for `.bin` files.
    pub fn load(path: &Path) -> Result<Self> {
        let binary = path.extension().and_then(|e| e.to_str()) == Some("bin");
        let file = File::open(path).map_err(|e| VectorizeError::artifact(path, e))?;
        let file_len = file
            .metadata()
            .map_err(|e| VectorizeError::artifact(path, e))?
            .len();
        let reader = BufReader::new(file);
        let table = if binary {
            read_binary(reader, file_len)
        } else {
            read_text(reader)
        }
        .map_err(|reason| VectorizeError::artifact(path, reason))?;
        info!(
            path = %path.display(),
            words = table.len(),
            dim = table.matrix.ncols(),
            "loaded word2vec table"
        );
        Ok(table)
    }

    /// Save in the word2vec text format (`<count> <dim>` header).
    pub fn save_text(&self, path: &Path) -> Result<()> {
        let io = |e: std::io::Error| VectorizeError::artifact(path, e);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        let mut out = BufWriter::new(File::create(path).map_err(io)?);
        writeln!(out, "{} {}", self.len(), self.matrix.ncols()).map_err(io)?;
        for (word, row) in self.words.iter().zip(self.matrix.rows()) {
            let values: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(out, "{word} {}", values.join(" ")).map_err(io)?;
        }
        out.flush().map_err(io)
    }
}

impl EmbeddingTable for WordVectors {
    fn dim(&self) -> usize {
        self.matrix.ncols()
    }

    fn lookup(&self, word: &str) -> Option<Vec<f32>> {
        self.get(word).map(|row| row.to_vec())
    }
}

fn parse_header(line: &str) -> Option<(usize, usize)> {
    let mut parts = line.split_whitespace();
    let count = parts.next()?.parse().ok()?;
    let dim = parts.next()?.parse().ok()?;
    parts.next().is_none().then_some((count, dim))
}

/// Upper bound on capacity reserved from header values before any data is read.
const MAX_RESERVE: usize = 1 << 20;

fn read_binary<R: BufRead>(mut reader: R, file_len: u64) -> std::result::Result<WordVectors, String> {
    let mut header = String::new();
    reader.read_line(&mut header).map_err(|e| e.to_string())?;
    let (count, dim) = parse_header(&header).ok_or("malformed word2vec header")?;
    let row_bytes = dim.checked_mul(4).ok_or("header sizes exceed file")?;
    let needed = count
        .checked_mul(row_bytes)
        .and_then(|bytes| u64::try_from(bytes).ok())
        .ok_or("header sizes exceed file")?;
    if needed > file_len || row_bytes as u64 > file_len {
        return Err(format!(
            "header sizes exceed file: {count} x {dim} needs {needed} bytes, file has {file_len}"
        ));
    }

    let mut words = Vec::with_capacity(count.min(MAX_RESERVE));
    let mut flat = Vec::with_capacity((count * dim).min(MAX_RESERVE));
    let mut row = vec![0u8; row_bytes];
    for _ in 0..count {
        let mut word = Vec::new();
        reader
            .read_until(b' ', &mut word)
            .map_err(|e| e.to_string())?;
        if word.last() == Some(&b' ') {
            word.pop();
        }
        let word = String::from_utf8_lossy(&word).trim_start_matches('\n').to_string();
        reader.read_exact(&mut row).map_err(|e| e.to_string())?;
        flat.extend(
            row.chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        );
        words.push(word);
    }
    let matrix = Array2::from_shape_vec((count, dim), flat).map_err(|e| e.to_string())?;
    Ok(WordVectors::from_matrix(words, matrix))
}

fn read_text<R: BufRead>(reader: R) -> std::result::Result<WordVectors, String> {
    let mut pairs = Vec::new();
    let mut dim = None;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| e.to_string())?;
        if line.trim().is_empty() {
            continue;
        }
        if line_no == 0 {
            if let Some((_, header_dim)) = parse_header(&line) {
                dim = Some(header_dim);
                continue;
            }
        }
        let mut parts = line.split(' ').filter(|p| !p.is_empty());
        let word = parts.next().ok_or("empty line")?.to_string();
        let vector = parts
            .map(|p| p.trim().parse::<f32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| format!("line {}: {e}", line_no + 1))?;
        let expected = *dim.get_or_insert(vector.len());
        if vector.len() != expected {
            return Err(format!(
                "line {}: {} values, expected {expected}",
                line_no + 1,
                vector.len()
            ));
        }
        pairs.push((word, vector));
    }
    WordVectors::from_pairs(dim.unwrap_or(0), pairs).map_err(|e| e.to_string())
}
