//! Context-span transformer backend.
//!
//! A span (the reaction mention) is embedded by running a BERT-family model over
//! its surrounding context and pooling the hidden states of the context subwords
//! that also occur in the span's own tokenization. Long contexts are cut down to
//! a character window around the first occurrence of the span.

use std::{collections::HashSet, sync::Arc};

use ndarray::{Array2, Axis};
use regex::RegexBuilder;
use tracing::{debug, warn};

use crate::{
    data::{RecordBatch, VectorValue},
    error::Result,
    nlp::aggregate::SpanPooling,
    vectorize::VectorizeBatch,
};

/// Contexts longer than this many characters are windowed.
pub const MAX_CONTEXT_CHARS: usize = 512;
/// Characters kept before the span start.
pub const WINDOW_LEAD: usize = 255;
/// Width of the character window.
pub const WINDOW_CHARS: usize = 256;

/// Hidden states for the non-special tokens of one input.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenStates {
    pub tokens: Vec<String>,
    /// `[tokens.len(), hidden]`
    pub states: Array2<f32>,
}

/// Subword tokenizer plus transformer forward pass.
pub trait SubwordModel: Send + Sync {
    /// Subword tokens of `text` without special tokens.
    fn tokenize(&self, text: &str) -> Result<Vec<String>>;
    /// Last hidden state of every non-special token of `text`.
    fn token_states(&self, text: &str) -> Result<TokenStates>;
}

/// Text actually fed to the transformer for a given context and span.
pub fn context_window(context: &str, span: &str) -> String {
    if context.chars().count() <= MAX_CONTEXT_CHARS {
        return context.to_string();
    }
    // match against `context` itself; lowercasing may change its length
    let found = RegexBuilder::new(&regex::escape(span))
        .case_insensitive(true)
        .build()
        .ok()
        .and_then(|pattern| pattern.find(context));
    match found {
        Some(m) => {
            let start = context[..m.start()]
                .chars()
                .count()
                .saturating_sub(WINDOW_LEAD);
            context.chars().skip(start).take(WINDOW_CHARS).collect()
        }
        None => span.to_string(),
    }
}

/// Rows of `states` whose token belongs to `span_tokens`.
pub fn attribute(states: &TokenStates, span_tokens: &HashSet<String>) -> Array2<f32> {
    let selected: Vec<usize> = states
        .tokens
        .iter()
        .enumerate()
        .filter(|(_, token)| span_tokens.contains(*token))
        .map(|(idx, _)| idx)
        .collect();
    states.states.select(Axis(0), &selected)
}

pub struct SpanContextBackend {
    model: Arc<dyn SubwordModel>,
    pooling: SpanPooling,
}

impl SpanContextBackend {
    pub fn new(model: Arc<dyn SubwordModel>, pooling: SpanPooling) -> Self {
        Self { model, pooling }
    }

    fn embed(&self, text: &str, span: &str) -> Result<Option<Vec<f32>>> {
        let span_tokens: HashSet<String> = self.model.tokenize(span)?.into_iter().collect();
        let states = self.model.token_states(text)?;
        let selected = attribute(&states, &span_tokens);
        Ok(self.pooling.apply(selected.view()))
    }

    fn vectorize_one(&self, context: &str, span: &str) -> Option<VectorValue> {
        let text = context_window(context, span);
        let vector = match self.embed(&text, span) {
            Ok(vector) => vector,
            Err(err) => {
                warn!(term = span, error = %err, "context encoding failed; using span as text");
                self.embed(span, span)
                    .map_err(|err| warn!(term = span, error = %err, "span encoding failed"))
                    .ok()
                    .flatten()
            }
        };
        if vector.is_none() {
            debug!(term = span, "no context subwords attributed to span");
        }
        vector.map(VectorValue::Dense)
    }
}

impl VectorizeBatch for SpanContextBackend {
    fn vectorize_batch(&self, batch: &RecordBatch) -> Result<Vec<Option<VectorValue>>> {
        Ok(batch
            .rows()
            .iter()
            .map(|row| {
                let context = row.text.as_deref().unwrap_or(&row.term);
                self.vectorize_one(context, &row.term)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn short_context_is_untouched() {
        let context = "I got a terrible headache after the second dose.";
        assert_eq!(context_window(context, "headache"), context);
    }

    #[test]
    fn window_starts_255_chars_before_span() {
        let context = format!("{}Muscle Pain{}", "x".repeat(600), "y".repeat(100));
        let window = context_window(&context, "muscle pain");
        assert_eq!(window.chars().count(), WINDOW_CHARS);
        assert!(window.starts_with(&"x".repeat(255)));
        assert!(window.ends_with('M'));
    }

    #[test]
    fn window_clamps_at_context_start() {
        let context = format!("rash {}", "z".repeat(600));
        let window = context_window(&context, "RASH");
        assert!(window.starts_with("rash "));
        assert_eq!(window.chars().count(), WINDOW_CHARS);
    }

    #[test]
    fn missing_span_falls_back_to_span() {
        let context = "a".repeat(513);
        assert_eq!(context_window(&context, "insomnia"), "insomnia");
    }

    #[test]
    fn attribution_is_token_membership() {
        let states = TokenStates {
            tokens: vec!["bad".into(), "head".into(), "##ache".into(), "head".into()],
            states: array![[1.0, 0.0], [2.0, 2.0], [4.0, 0.0], [6.0, 4.0]],
        };
        let span: HashSet<String> = ["head".to_string(), "##ache".to_string()].into();
        let selected = attribute(&states, &span);
        assert_eq!(selected, array![[2.0f32, 2.0], [4.0, 0.0], [6.0, 4.0]]);
    }
}
