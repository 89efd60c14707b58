//! Reader for native fastText `.bin` models with subword composition.
//!
//! Only the input matrix and the dictionary are decoded; the output layer is
//! never needed to compute word vectors. Quantized (`.ftz`) models are rejected.

use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use ndarray::Array2;
use tracing::info;

use crate::{
    error::{Result, VectorizeError},
    vectorize::word_vectors::EmbeddingTable,
};

const FASTTEXT_MAGIC: i32 = 793_712_314;
const FASTTEXT_VERSION: i32 = 12;
const EOW: &str = ">";
const BOW: &str = "<";
/// Upper bound on capacity reserved from header values before any data is read.
const MAX_RESERVE: usize = 1 << 20;

/// Hyper-parameters stored in the model header that drive subword hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubwordParams {
    pub dim: usize,
    pub bucket: usize,
    pub minn: usize,
    pub maxn: usize,
}

/// In-memory fastText model able to embed out-of-vocabulary words.
#[derive(Debug, Clone)]
pub struct FastTextModel {
    params: SubwordParams,
    words: HashMap<String, usize>,
    nwords: usize,
    /// Remapping of hashed buckets for pruned models; `None` when unpruned.
    prune_index: Option<HashMap<i32, i32>>,
    input: Array2<f32>,
}

impl FastTextModel {
    /// Assemble a model from its parts. `input` must have `vocab.len() + bucket` rows.
    pub fn from_parts(
        params: SubwordParams,
        vocab: Vec<String>,
        input: Array2<f32>,
    ) -> Result<Self> {
        let nwords = vocab.len();
        if input.nrows() != nwords + params.bucket || input.ncols() != params.dim {
            return Err(VectorizeError::Model(format!(
                "input matrix {:?} does not match {nwords} words + {} buckets x {} dims",
                input.dim(),
                params.bucket,
                params.dim
            )));
        }
        let words = vocab
            .into_iter()
            .enumerate()
            .map(|(idx, word)| (word, idx))
            .collect();
        Ok(Self {
            params,
            words,
            nwords,
            prune_index: None,
            input,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| VectorizeError::artifact(path, e))?;
        let file_len = file
            .metadata()
            .map_err(|e| VectorizeError::artifact(path, e))?
            .len();
        let model = read_model(&mut BufReader::new(file), file_len)
            .map_err(|reason| VectorizeError::artifact(path, reason))?;
        info!(
            path = %path.display(),
            words = model.nwords,
            dim = model.params.dim,
            buckets = model.params.bucket,
            "loaded fastText model"
        );
        Ok(model)
    }

    pub fn params(&self) -> SubwordParams {
        self.params
    }

    /// Rows of the input matrix that make up `word`.
    pub fn subword_rows(&self, word: &str) -> Vec<usize> {
        let mut rows = Vec::new();
        if let Some(&id) = self.words.get(word) {
            rows.push(id);
        }
        if self.params.bucket == 0 {
            return rows;
        }
        for hash in char_ngram_hashes(word, self.params.minn, self.params.maxn) {
            let bucket = (hash % self.params.bucket as u32) as i32;
            let bucket = match &self.prune_index {
                None => bucket,
                Some(remap) if remap.is_empty() => continue,
                Some(remap) => match remap.get(&bucket) {
                    Some(&mapped) => mapped,
                    None => continue,
                },
            };
            rows.push(self.nwords + bucket as usize);
        }
        rows
    }
}

impl EmbeddingTable for FastTextModel {
    fn dim(&self) -> usize {
        self.params.dim
    }

    fn lookup(&self, word: &str) -> Option<Vec<f32>> {
        let rows = self.subword_rows(word);
        if rows.is_empty() {
            return None;
        }
        let mut sum = vec![0.0f32; self.params.dim];
        for row in &rows {
            for (acc, value) in sum.iter_mut().zip(self.input.row(*row)) {
                *acc += value;
            }
        }
        let scale = 1.0 / rows.len() as f32;
        Some(sum.into_iter().map(|v| v * scale).collect())
    }
}

/// fastText's FNV-1a variant: bytes are sign-extended before mixing.
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for &byte in bytes {
        hash ^= byte as i8 as i32 as u32;
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

/// Hashes of the character n-grams of `<word>` with `minn <= n <= maxn`.
///
/// N-gram lengths count UTF-8 characters; single-character n-grams touching a
/// boundary marker are skipped.
pub fn char_ngram_hashes(word: &str, minn: usize, maxn: usize) -> Vec<u32> {
    let wrapped = format!("{BOW}{word}{EOW}");
    let bytes = wrapped.as_bytes();
    let is_continuation = |b: u8| b & 0xC0 == 0x80;
    let mut hashes = Vec::new();
    for i in 0..bytes.len() {
        if is_continuation(bytes[i]) {
            continue;
        }
        let mut ngram = Vec::new();
        let mut j = i;
        let mut n = 1;
        while j < bytes.len() && n <= maxn {
            ngram.push(bytes[j]);
            j += 1;
            while j < bytes.len() && is_continuation(bytes[j]) {
                ngram.push(bytes[j]);
                j += 1;
            }
            if n >= minn && !(n == 1 && (i == 0 || j == bytes.len())) {
                hashes.push(fnv1a(&ngram));
            }
            n += 1;
        }
    }
    hashes
}

struct Cursor<'a, R: Read> {
    inner: &'a mut R,
}

impl<R: Read> Cursor<'_, R> {
    fn bytes<const N: usize>(&mut self) -> std::result::Result<[u8; N], String> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf).map_err(|e| e.to_string())?;
        Ok(buf)
    }

    fn i32(&mut self) -> std::result::Result<i32, String> {
        Ok(i32::from_le_bytes(self.bytes::<4>()?))
    }

    fn i64(&mut self) -> std::result::Result<i64, String> {
        Ok(i64::from_le_bytes(self.bytes::<8>()?))
    }

    fn f64(&mut self) -> std::result::Result<f64, String> {
        Ok(f64::from_le_bytes(self.bytes::<8>()?))
    }

    fn u8(&mut self) -> std::result::Result<u8, String> {
        Ok(self.bytes::<1>()?[0])
    }

    fn cstr(&mut self) -> std::result::Result<String, String> {
        let mut buf = Vec::new();
        loop {
            match self.u8()? {
                0 => break,
                byte => buf.push(byte),
            }
        }
        String::from_utf8(buf).map_err(|e| e.to_string())
    }
}

fn non_negative(value: impl Into<i64>, what: &str) -> std::result::Result<usize, String> {
    let value = value.into();
    usize::try_from(value).map_err(|_| format!("negative {what}: {value}"))
}

fn read_model<R: Read>(
    reader: &mut R,
    file_len: u64,
) -> std::result::Result<FastTextModel, String> {
    let mut cur = Cursor { inner: reader };
    if cur.i32()? != FASTTEXT_MAGIC {
        return Err("not a fastText binary model".into());
    }
    let version = cur.i32()?;
    if version > FASTTEXT_VERSION {
        return Err(format!("unsupported fastText version {version}"));
    }

    // dim, ws, epoch, minCount, neg, wordNgrams, loss, model, bucket, minn, maxn, lrUpdateRate, t
    let dim = non_negative(cur.i32()?, "dim")?;
    for _ in 0..7 {
        cur.i32()?;
    }
    let bucket = non_negative(cur.i32()?, "bucket")?;
    let minn = non_negative(cur.i32()?, "minn")?;
    let maxn = non_negative(cur.i32()?, "maxn")?;
    cur.i32()?;
    cur.f64()?;

    let size = non_negative(cur.i32()?, "dictionary size")?;
    let nwords = non_negative(cur.i32()?, "word count")?;
    cur.i32()?; // nlabels
    cur.i64()?; // ntokens
    let prune_size = cur.i64()?;

    let mut vocab = Vec::with_capacity(nwords.min(MAX_RESERVE));
    for _ in 0..size {
        let word = cur.cstr()?;
        cur.i64()?; // count
        let entry_type = cur.u8()?;
        if entry_type == 0 {
            vocab.push(word);
        }
    }
    if vocab.len() != nwords {
        return Err(format!("dictionary lists {} words, header says {nwords}", vocab.len()));
    }

    let prune_index = if prune_size >= 0 {
        let mut remap = HashMap::new();
        for _ in 0..prune_size {
            let first = cur.i32()?;
            let second = cur.i32()?;
            remap.insert(first, second);
        }
        Some(remap)
    } else {
        None
    };

    if cur.u8()? != 0 {
        return Err("quantized fastText models are not supported".into());
    }
    let rows = non_negative(cur.i64()?, "matrix rows")?;
    let cols = non_negative(cur.i64()?, "matrix cols")?;
    if cols != dim {
        return Err(format!("matrix has {cols} columns, header dim is {dim}"));
    }
    let matrix_bytes = rows
        .checked_mul(cols)
        .and_then(|cells| cells.checked_mul(4))
        .ok_or("header sizes exceed file")?;
    if u64::try_from(matrix_bytes).map_or(true, |bytes| bytes > file_len) {
        return Err(format!(
            "header sizes exceed file: {rows} x {cols} matrix, file has {file_len} bytes"
        ));
    }
    let mut raw = vec![0u8; matrix_bytes];
    cur.inner.read_exact(&mut raw).map_err(|e| e.to_string())?;
    let flat: Vec<f32> = raw
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    let input = Array2::from_shape_vec((rows, cols), flat).map_err(|e| e.to_string())?;

    let params = SubwordParams {
        dim,
        bucket: rows.saturating_sub(nwords),
        minn,
        maxn,
    };
    if prune_index.is_none() && params.bucket != bucket {
        return Err(format!(
            "matrix has {} bucket rows, header says {bucket}",
            params.bucket
        ));
    }
    let mut model = FastTextModel::from_parts(params, vocab, input).map_err(|e| e.to_string())?;
    model.prune_index = prune_index;
    Ok(model)
}
