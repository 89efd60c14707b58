//! Word-level tokenizers used by the static-vector and TF-IDF backends.

use std::{str::FromStr, sync::Arc};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::VectorizeError;

/// Turns raw text into a normalized token sequence.
pub trait WordTokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Built-in tokenizers addressable by `TOKENIZER_NAME`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenizerKind {
    /// Split on whitespace, keep case and punctuation.
    Whitespace,
    /// Lowercased runs of word characters.
    Regex,
    /// Runs of alphabetic characters, case preserved.
    Alpha,
}

impl TokenizerKind {
    pub const ALL: [TokenizerKind; 3] = [Self::Whitespace, Self::Regex, Self::Alpha];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Whitespace => "whitespace",
            Self::Regex => "regex",
            Self::Alpha => "alpha",
        }
    }
}

impl FromStr for TokenizerKind {
    type Err = VectorizeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "whitespace" => Ok(Self::Whitespace),
            "regex" | "word" => Ok(Self::Regex),
            "alpha" | "gensim" => Ok(Self::Alpha),
            other => Err(VectorizeError::UnknownTokenizer(other.to_string())),
        }
    }
}

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("valid regex"));
static ALPHA: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\W\d_]+").expect("valid regex"));

impl WordTokenizer for TokenizerKind {
    fn tokenize(&self, text: &str) -> Vec<String> {
        match self {
            Self::Whitespace => text.split_whitespace().map(str::to_string).collect(),
            Self::Regex => WORD
                .find_iter(&text.to_lowercase())
                .map(|m| m.as_str().to_string())
                .collect(),
            Self::Alpha => ALPHA
                .find_iter(text)
                .map(|m| m.as_str().to_string())
                .collect(),
        }
    }
}

/// Resolve a tokenizer by name into a shareable handle.
pub fn from_name(name: &str) -> Result<Arc<dyn WordTokenizer>, VectorizeError> {
    let kind: TokenizerKind = name.parse()?;
    Ok(Arc::new(kind))
}
