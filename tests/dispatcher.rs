use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use adr_vectorizer::{
    data::{Record, RecordBatch, VectorValue},
    error::{Result, VectorizeError},
    nlp::{aggregate::Aggregation, tokenizer},
    vectorize::{
        sentence::{SentenceBackend, SentenceEmbedder},
        word2vec::WordVectors,
        word_vectors::WordVectorBackend,
        Backend, BackendLoader, SentenceVectorizer, Strategy,
    },
};

struct CountingLoader {
    calls: Arc<AtomicUsize>,
}

impl BackendLoader for CountingLoader {
    fn load(&self, _strategy: Strategy) -> Result<Backend> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let table = WordVectors::from_pairs(
            2,
            vec![
                ("muscle".into(), vec![1.0, 0.0]),
                ("pain".into(), vec![0.0, 1.0]),
            ],
        )?;
        Ok(Backend::WordVectors(WordVectorBackend::new(
            Arc::new(table),
            tokenizer::from_name("regex")?,
            Aggregation::Avg,
        )))
    }
}

fn counting() -> (SentenceVectorizer, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = CountingLoader {
        calls: Arc::clone(&calls),
    };
    (SentenceVectorizer::new(loader), calls)
}

fn batch(terms: &[&str]) -> RecordBatch {
    terms.iter().map(|t| Record::new(*t)).collect()
}

#[test]
fn unknown_strategy_fails_before_loading() {
    let (vectorizer, calls) = counting();
    let err = vectorizer.vectorize(batch(&["pain"]), "glove").unwrap_err();
    assert!(matches!(err, VectorizeError::UnknownStrategy(name) if name == "glove"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn strategy_names_are_case_sensitive() {
    let (vectorizer, _) = counting();
    assert!(vectorizer.vectorize(batch(&["pain"]), "BERT-PUBMED").is_err());
    assert!(vectorizer.vectorize(batch(&["pain"]), "tfidf").is_ok());
}

#[test]
fn backends_load_once_per_strategy() {
    let (vectorizer, calls) = counting();
    for _ in 0..3 {
        vectorizer
            .vectorize(batch(&["muscle pain"]), "word2vec")
            .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    vectorizer.vectorize(batch(&["muscle pain"]), "tfidf").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    vectorizer.invalidate(Strategy::Word2Vec);
    vectorizer.vectorize(batch(&["muscle pain"]), "word2vec").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    vectorizer.clear_cache();
    vectorizer.vectorize(batch(&["muscle pain"]), "tfidf").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn empty_batch_gets_column_without_loading() {
    let (vectorizer, calls) = counting();
    let out = vectorizer.vectorize(RecordBatch::default(), "encoder").unwrap();
    assert!(out.is_empty());
    assert_eq!(out.vector_column(), Some("term_vec"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn output_preserves_rows_and_order() {
    let (vectorizer, _) = counting();
    let input = batch(&["muscle pain", "pain", "zzz qqq", "pain muscle"]);
    let out = vectorizer.vectorize(input.clone(), "fasttext_facebook").unwrap();
    assert_eq!(out.len(), input.len());
    let terms: Vec<_> = out.rows().iter().map(|r| r.term.as_str()).collect();
    assert_eq!(terms, ["muscle pain", "pain", "zzz qqq", "pain muscle"]);
    assert_eq!(out.rows()[0].vector, Some(VectorValue::Dense(vec![0.5, 0.5])));
    assert_eq!(out.rows()[1].vector, Some(VectorValue::Raw("pain".into())));
    assert_eq!(out.rows()[2].vector, None);
    assert_eq!(out.dense_width(), Some(2));
}

struct RaggedEmbedder;

impl SentenceEmbedder for RaggedEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| vec![0.0; t.len()]).collect())
    }
}

struct RaggedLoader;

impl BackendLoader for RaggedLoader {
    fn load(&self, _strategy: Strategy) -> Result<Backend> {
        Ok(Backend::Sentence(SentenceBackend::new(Arc::new(RaggedEmbedder))))
    }
}

#[test]
fn mixed_vector_widths_are_rejected() {
    let vectorizer = SentenceVectorizer::new(RaggedLoader);
    let err = vectorizer
        .vectorize(batch(&["rash", "hair loss"]), "sent2vec")
        .unwrap_err();
    assert!(matches!(err, VectorizeError::Model(_)));
}

#[test]
fn uniform_sentence_vectors_pass() {
    let vectorizer = SentenceVectorizer::new(RaggedLoader);
    let out = vectorizer.vectorize(batch(&["rash", "ache"]), "sent2vec").unwrap();
    assert_eq!(out.dense_width(), Some(4));
}

#[test]
fn listed_strategies_match_dispatch() {
    let (vectorizer, _) = counting();
    let names = vectorizer.list_strategies();
    let expected = [
        "bert-PubMed",
        "bert-base-uncased",
        "bertweet-base",
        "encoder",
        "fasttext_facebook",
        "sent2vec",
        "tfidf",
        "word2vec",
    ];
    assert_eq!(names.into_iter().collect::<Vec<_>>(), expected);
    for name in expected {
        assert_eq!(name.parse::<Strategy>().unwrap().as_str(), name);
    }
}

#[test]
fn missing_artifacts_surface_as_errors() {
    use adr_vectorizer::vectorize::{ArtifactLoader, ArtifactPaths};
    use adr_vectorizer::nlp::aggregate::SpanPooling;

    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths {
        fasttext: dir.path().join("missing.bin"),
        word2vec: dir.path().join("missing.txt"),
        tfidf: dir.path().join("missing.json"),
        encoder_model: dir.path().join("encoder.json"),
        encoder_tokenizer: dir.path().join("tokenizer.json"),
        transformers_dir: dir.path().join("transformers"),
    };
    let loader = ArtifactLoader::new(
        paths,
        tokenizer::from_name("regex").unwrap(),
        Aggregation::Avg,
        SpanPooling::Mean,
        10,
    );
    let vectorizer = SentenceVectorizer::new(loader);
    for name in ["fasttext_facebook", "word2vec", "tfidf", "encoder"] {
        let err = vectorizer.vectorize(batch(&["a b"]), name).unwrap_err();
        assert!(matches!(err, VectorizeError::Artifact { .. }), "{name}: {err}");
    }
}
