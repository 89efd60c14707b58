//! Closed registry of vectorization strategies.

use std::{collections::BTreeSet, fmt, str::FromStr};

use crate::error::VectorizeError;

/// One named vectorization method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strategy {
    FasttextFacebook,
    BertBaseUncased,
    BertPubMed,
    BertweetBase,
    Sent2Vec,
    Encoder,
    Tfidf,
    Word2Vec,
}

impl Strategy {
    pub const ALL: [Strategy; 8] = [
        Strategy::FasttextFacebook,
        Strategy::BertBaseUncased,
        Strategy::BertPubMed,
        Strategy::BertweetBase,
        Strategy::Sent2Vec,
        Strategy::Encoder,
        Strategy::Tfidf,
        Strategy::Word2Vec,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FasttextFacebook => "fasttext_facebook",
            Self::BertBaseUncased => "bert-base-uncased",
            Self::BertPubMed => "bert-PubMed",
            Self::BertweetBase => "bertweet-base",
            Self::Sent2Vec => "sent2vec",
            Self::Encoder => "encoder",
            Self::Tfidf => "tfidf",
            Self::Word2Vec => "word2vec",
        }
    }

    /// Hub identifier of the transformer behind a span-context strategy.
    pub const fn transformer_id(&self) -> Option<&'static str> {
        match self {
            Self::BertBaseUncased => Some("bert-base-uncased"),
            Self::BertPubMed => Some("cambridgeltl/SapBERT-from-PubMedBERT-fulltext"),
            Self::BertweetBase => Some("vinai/bertweet-base"),
            _ => None,
        }
    }
}

impl FromStr for Strategy {
    type Err = VectorizeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == name)
            .ok_or_else(|| VectorizeError::UnknownStrategy(name.to_string()))
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every recognised strategy name.
pub fn list_strategies() -> BTreeSet<&'static str> {
    Strategy::ALL.iter().map(Strategy::as_str).collect()
}
