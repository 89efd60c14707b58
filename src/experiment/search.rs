//! Random search over vectorizer configurations, one sample per process.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::Serialize;
use tracing::info;

use crate::{
    config::Settings,
    nlp::{
        aggregate::{Aggregation, SpanPooling},
        tokenizer::TokenizerKind,
    },
    vectorize::Strategy,
};

/// One point of the configuration grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampledConfig {
    pub seed: u64,
    pub strategy: Strategy,
    pub agg_type: Aggregation,
    pub span_pooling: SpanPooling,
    pub tokenizer: TokenizerKind,
}

/// Flat, serialisable view used for run artifacts and tracker params.
#[derive(Debug, Clone, Serialize)]
pub struct SampledParams {
    pub seed: u64,
    pub vectorizer: &'static str,
    pub agg_type: &'static str,
    pub span_pooling: &'static str,
    pub tokenizer: &'static str,
}

impl SampledConfig {
    /// Draw a configuration from `Strategy × Aggregation × SpanPooling × TokenizerKind`.
    pub fn sample(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        // every `ALL` is non-empty
        let strategy = *Strategy::ALL.choose(&mut rng).unwrap_or(&Strategy::Tfidf);
        let agg_type = *Aggregation::ALL.choose(&mut rng).unwrap_or(&Aggregation::Avg);
        let span_pooling = *SpanPooling::ALL.choose(&mut rng).unwrap_or(&SpanPooling::Mean);
        let tokenizer = *TokenizerKind::ALL
            .choose(&mut rng)
            .unwrap_or(&TokenizerKind::Regex);
        let sampled = Self {
            seed,
            strategy,
            agg_type,
            span_pooling,
            tokenizer,
        };
        info!(?sampled, "sampled run configuration");
        sampled
    }

    /// Overwrite the matching fields of `settings`.
    pub fn apply(&self, settings: &mut Settings) {
        settings.sentence_vectorizer = self.strategy.as_str().to_string();
        settings.agg_type = self.agg_type;
        settings.span_pooling = self.span_pooling;
        settings.tokenizer_name = self.tokenizer.as_str().to_string();
    }

    pub fn params(&self) -> SampledParams {
        SampledParams {
            seed: self.seed,
            vectorizer: self.strategy.as_str(),
            agg_type: self.agg_type.as_str(),
            span_pooling: self.span_pooling.as_str(),
            tokenizer: self.tokenizer.as_str(),
        }
    }
}
