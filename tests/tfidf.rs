use std::sync::Arc;

use adr_vectorizer::{
    data::{Record, RecordBatch, VectorValue},
    error::Result,
    nlp::tokenizer,
    vectorize::{
        tfidf::{Norm, TfidfBackend, TfidfModel, TfidfOptions},
        Backend, BackendLoader, SentenceVectorizer, Strategy,
    },
};

const CORPUS: [&str; 4] = [
    "muscle pain",
    "joint pain and swelling",
    "severe headache",
    "headache with nausea",
];

struct TfidfLoader(Arc<TfidfModel>);

impl BackendLoader for TfidfLoader {
    fn load(&self, _strategy: Strategy) -> Result<Backend> {
        Ok(Backend::Tfidf(TfidfBackend::new(
            Arc::clone(&self.0),
            tokenizer::from_name("regex")?,
        )))
    }
}

fn batch() -> RecordBatch {
    ["Muscle PAIN!", "headache, nausea", "completely unseen words"]
        .into_iter()
        .map(Record::new)
        .collect()
}

fn dense(batch: &RecordBatch) -> Vec<Vec<f32>> {
    batch
        .rows()
        .iter()
        .map(|r| r.dense().expect("tfidf rows are dense").to_vec())
        .collect()
}

#[test]
fn rows_are_unit_length_or_zero() {
    let model = TfidfModel::fit(&CORPUS, TfidfOptions::default()).unwrap();
    let vectorizer = SentenceVectorizer::new(TfidfLoader(Arc::new(model)));
    let out = vectorizer.vectorize(batch(), "tfidf").unwrap();
    let rows = dense(&out);
    assert_eq!(out.dense_width(), Some(9));
    for row in &rows[..2] {
        let norm: f32 = row.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
    assert!(rows[2].iter().all(|&v| v == 0.0));
}

#[test]
fn reloaded_model_reproduces_vectors_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tfidf/vectorizer.json");
    let options = TfidfOptions {
        ngram_range: (1, 2),
        sublinear_tf: true,
        ..TfidfOptions::default()
    };
    let fitted = TfidfModel::fit(&CORPUS, options).unwrap();
    fitted.save(&path).unwrap();
    let loaded = TfidfModel::load(&path).unwrap();
    assert_eq!(loaded.n_features(), fitted.n_features());

    let first = SentenceVectorizer::new(TfidfLoader(Arc::new(fitted)))
        .vectorize(batch(), "tfidf")
        .unwrap();
    let second = SentenceVectorizer::new(TfidfLoader(Arc::new(loaded)))
        .vectorize(batch(), "tfidf")
        .unwrap();
    let bits = |rows: Vec<Vec<f32>>| -> Vec<Vec<u32>> {
        rows.into_iter()
            .map(|r| r.into_iter().map(f32::to_bits).collect())
            .collect()
    };
    assert_eq!(bits(dense(&first)), bits(dense(&second)));
}

#[test]
fn l1_norm_and_raw_counts() {
    let options = TfidfOptions {
        norm: Norm::L1,
        ..TfidfOptions::default()
    };
    let model = TfidfModel::fit(&CORPUS, options).unwrap();
    let row = model.transform("pain pain headache").unwrap();
    let total: f32 = row.iter().sum();
    assert!((total - 1.0).abs() < 1e-6);

    let unnormalized = TfidfModel::fit(
        &CORPUS,
        TfidfOptions {
            norm: Norm::None,
            smooth_idf: false,
            ..TfidfOptions::default()
        },
    )
    .unwrap();
    let muscle = unnormalized.vocabulary["muscle"];
    let row = unnormalized.transform("muscle muscle").unwrap();
    let expected = 2.0 * ((4.0f32 / 1.0).ln() + 1.0);
    assert!((row[muscle] - expected).abs() < 1e-6);
}

#[test]
fn corrupt_artifact_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vectorizer.json");
    std::fs::write(&path, r#"{"vocabulary": {"pain": 3}, "idf": [1.0]}"#).unwrap();
    assert!(TfidfModel::load(&path).is_err());
}

#[test]
fn single_token_rows_are_not_passed_through() {
    let model = TfidfModel::fit(&CORPUS, TfidfOptions::default()).unwrap();
    let vectorizer = SentenceVectorizer::new(TfidfLoader(Arc::new(model)));
    let out = vectorizer
        .vectorize(RecordBatch::new(vec![Record::new("pain")]), "tfidf")
        .unwrap();
    assert!(matches!(out.rows()[0].vector, Some(VectorValue::Dense(_))));
}
