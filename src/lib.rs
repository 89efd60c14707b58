//! Sentence vectorization backends and the ADR normalization experiment loop.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod experiment;
pub mod logging;
pub mod nlp;
pub mod pretrain;
pub mod vectorize;
