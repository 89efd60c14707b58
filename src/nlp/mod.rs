//! Word tokenization and vector pooling shared by the vectorizers.

pub mod aggregate;
pub mod tokenizer;
