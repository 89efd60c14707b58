use adr_vectorizer::{
    error::VectorizeError,
    nlp::tokenizer,
    pretrain::{self, PretrainCorpus, PretrainOptions, COMMON_TEXTS},
    vectorize::{word2vec::WordVectors, word_vectors::EmbeddingTable},
};

fn options() -> PretrainOptions {
    PretrainOptions {
        size: 8,
        epochs: 3,
        ..PretrainOptions::default()
    }
}

#[test]
fn unknown_corpus_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let tok = tokenizer::from_name("regex").unwrap();
    let err = pretrain::pretrain(
        "pubmed",
        dir.path(),
        tok.as_ref(),
        &options(),
        &dir.path().join("out.txt"),
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<VectorizeError>(),
        Some(VectorizeError::UnknownCorpus(name)) if name == "pubmed"
    ));
    assert!(!dir.path().join("out.txt").exists());
}

#[test]
fn default_corpus_trains_and_saves() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("w2v/default.txt");
    let tok = tokenizer::from_name("regex").unwrap();
    let vectors = pretrain::pretrain("default", dir.path(), tok.as_ref(), &options(), &out).unwrap();

    let distinct: std::collections::HashSet<_> = COMMON_TEXTS.iter().flat_map(|s| s.iter()).collect();
    assert_eq!(vectors.len(), distinct.len());
    assert_eq!(vectors.dim(), 8);
    let reloaded = WordVectors::load(&out).unwrap();
    assert_eq!(reloaded.words(), vectors.words());
}

#[test]
fn training_is_deterministic_for_a_seed() {
    let tok = tokenizer::from_name("regex").unwrap();
    let dir = tempfile::tempdir().unwrap();
    let sentences =
        pretrain::corpus_sentences(PretrainCorpus::Default, dir.path(), tok.as_ref()).unwrap();
    let a = pretrain::train(&sentences, &options()).unwrap();
    let b = pretrain::train(&sentences, &options()).unwrap();
    assert_eq!(a.lookup("graph"), b.lookup("graph"));
}

#[test]
fn cadec_sentences_split_on_marker() {
    let dir = tempfile::tempdir().unwrap();
    let cadec = dir.path().join("interim/cadec");
    std::fs::create_dir_all(&cadec).unwrap();
    std::fs::write(
        cadec.join("test.csv"),
        "term,text,code\npain,\"Severe pain today.<SENT>Could not walk\",1\nrash,,2\n",
    )
    .unwrap();
    let tok = tokenizer::from_name("regex").unwrap();
    let sentences =
        pretrain::corpus_sentences(PretrainCorpus::Cadec, dir.path(), tok.as_ref()).unwrap();
    assert_eq!(
        sentences,
        vec![
            vec!["severe".to_string(), "pain".into(), "today".into()],
            vec!["could".to_string(), "not".into(), "walk".into()],
        ]
    );
}
