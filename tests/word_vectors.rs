use std::{io::Write, sync::Arc};

use adr_vectorizer::{
    data::{Record, RecordBatch, VectorValue},
    error::VectorizeError,
    nlp::{aggregate::Aggregation, tokenizer},
    vectorize::{
        fasttext::{char_ngram_hashes, FastTextModel, SubwordParams},
        word2vec::WordVectors,
        word_vectors::{EmbeddingTable, WordVectorBackend},
        VectorizeBatch,
    },
};
use ndarray::Array2;

fn table() -> WordVectors {
    WordVectors::from_pairs(
        3,
        vec![
            ("muscle".into(), vec![1.0, 2.0, 0.0]),
            ("pain".into(), vec![3.0, 0.0, -1.0]),
            ("cramps".into(), vec![-1.0, 4.0, 2.0]),
        ],
    )
    .unwrap()
}

fn backend(aggregation: Aggregation) -> WordVectorBackend {
    WordVectorBackend::new(
        Arc::new(table()),
        tokenizer::from_name("regex").unwrap(),
        aggregation,
    )
}

fn vectors(backend: &WordVectorBackend, terms: &[&str]) -> Vec<Option<VectorValue>> {
    let batch: RecordBatch = terms.iter().map(|t| Record::new(*t)).collect();
    backend.vectorize_batch(&batch).unwrap()
}

#[test]
fn single_token_terms_pass_through_verbatim() {
    let out = vectors(&backend(Aggregation::Avg), &["Pain", "", "!!"]);
    assert_eq!(
        out,
        vec![
            Some(VectorValue::Raw("Pain".into())),
            Some(VectorValue::Raw(String::new())),
            Some(VectorValue::Raw("!!".into())),
        ]
    );
}

#[test]
fn average_skips_unknown_tokens() {
    let out = vectors(&backend(Aggregation::Avg), &["muscle unknown pain"]);
    assert_eq!(out, vec![Some(VectorValue::Dense(vec![2.0, 1.0, -0.5]))]);
}

#[test]
fn max_is_elementwise() {
    let out = vectors(&backend(Aggregation::Max), &["muscle pain cramps"]);
    assert_eq!(out, vec![Some(VectorValue::Dense(vec![3.0, 4.0, 2.0]))]);
}

#[test]
fn all_unknown_tokens_yield_missing_value() {
    let out = vectors(&backend(Aggregation::Avg), &["hair loss"]);
    assert_eq!(out, vec![None]);
}

#[test]
fn text_format_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vectors.txt");
    table().save_text(&path).unwrap();
    let loaded = WordVectors::load(&path).unwrap();
    assert_eq!(loaded.words(), table().words());
    assert_eq!(loaded.lookup("cramps"), Some(vec![-1.0, 4.0, 2.0]));
}

#[test]
fn binary_word2vec_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vectors.bin");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, "2 2\n").unwrap();
    for (word, values) in [("rash", [0.5f32, 1.5]), ("itch", [2.0, -2.0])] {
        file.write_all(word.as_bytes()).unwrap();
        file.write_all(b" ").unwrap();
        for v in values {
            file.write_all(&v.to_le_bytes()).unwrap();
        }
        file.write_all(b"\n").unwrap();
    }
    drop(file);
    let loaded = WordVectors::load(&path).unwrap();
    assert_eq!(loaded.dim(), 2);
    assert_eq!(loaded.lookup("itch"), Some(vec![2.0, -2.0]));
}

fn write_fasttext(
    path: &std::path::Path,
    words: &[&str],
    bucket: usize,
    dim: usize,
    rows: i64,
    input: &[f32],
) {
    let mut out = Vec::new();
    let i32s = |out: &mut Vec<u8>, v: i32| out.extend_from_slice(&v.to_le_bytes());
    i32s(&mut out, 793_712_314);
    i32s(&mut out, 12);
    // dim ws epoch minCount neg wordNgrams loss model bucket minn maxn lrUpdateRate
    for v in [dim as i32, 5, 5, 1, 5, 1, 1, 2, bucket as i32, 3, 4, 100] {
        i32s(&mut out, v);
    }
    out.extend_from_slice(&1e-4f64.to_le_bytes());
    i32s(&mut out, words.len() as i32);
    i32s(&mut out, words.len() as i32);
    i32s(&mut out, 0);
    out.extend_from_slice(&100i64.to_le_bytes());
    out.extend_from_slice(&(-1i64).to_le_bytes());
    for word in words {
        out.extend_from_slice(word.as_bytes());
        out.push(0);
        out.extend_from_slice(&10i64.to_le_bytes());
        out.push(0);
    }
    out.push(0);
    out.extend_from_slice(&rows.to_le_bytes());
    out.extend_from_slice(&(dim as i64).to_le_bytes());
    for v in input {
        out.extend_from_slice(&v.to_le_bytes());
    }
    std::fs::write(path, out).unwrap();
}

#[test]
fn fasttext_binary_loads_and_composes_subwords() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    let bucket = 4;
    let input: Vec<f32> = (0..(2 + bucket) * 2).map(|v| v as f32).collect();
    write_fasttext(&path, &["pain", "rash"], bucket, 2, (2 + bucket) as i64, &input);

    let model = FastTextModel::load(&path).unwrap();
    assert_eq!(
        model.params(),
        SubwordParams {
            dim: 2,
            bucket,
            minn: 3,
            maxn: 4
        }
    );

    let rows = model.subword_rows("pain");
    assert_eq!(rows[0], 0);
    assert_eq!(rows.len(), 1 + char_ngram_hashes("pain", 3, 4).len());
    assert!(rows.iter().all(|&r| r < 2 + bucket));

    // out-of-vocabulary words still get a vector from their n-grams
    let oov = model.lookup("itchy").unwrap();
    assert_eq!(oov.len(), 2);
}

#[test]
fn fasttext_rejects_foreign_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    std::fs::write(&path, b"not a model at all").unwrap();
    assert!(FastTextModel::load(&path).is_err());
}

#[test]
fn fasttext_from_parts_checks_shape() {
    let params = SubwordParams {
        dim: 2,
        bucket: 3,
        minn: 3,
        maxn: 6,
    };
    assert!(FastTextModel::from_parts(params, vec!["a".into()], Array2::zeros((3, 2))).is_err());
    let model =
        FastTextModel::from_parts(params, vec!["a".into()], Array2::ones((4, 2))).unwrap();
    assert_eq!(model.lookup("a"), Some(vec![1.0, 1.0]));
}

#[test]
fn fasttext_oversized_matrix_header_is_an_artifact_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    write_fasttext(&path, &["pain"], 0, 2, i64::MAX / 4, &[0.0, 0.0]);
    let err = FastTextModel::load(&path).unwrap_err();
    assert!(matches!(err, VectorizeError::Artifact { .. }), "{err}");
    assert!(err.to_string().contains("header sizes exceed file"));
}

#[test]
fn word2vec_oversized_binary_header_is_an_artifact_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vectors.bin");
    std::fs::write(&path, b"99999999999 999999999\nrash ").unwrap();
    let err = WordVectors::load(&path).unwrap_err();
    assert!(matches!(err, VectorizeError::Artifact { .. }), "{err}");

    std::fs::write(&path, format!("1 {}\n", usize::MAX)).unwrap();
    assert!(WordVectors::load(&path).is_err());
}
