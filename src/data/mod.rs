//! Corpus records, label vocabulary and batch I/O.

pub mod corpus;
pub mod hub;
pub mod labels;
pub mod record;

pub use record::{Record, RecordBatch, VectorValue, TERM_FIELD};
