//! Prepares manuscript transcription exports for cross-witness textual
//! collation.
//!
//! The pipeline reconstructs each manuscript from its part files, extracts
//! a token stream per witness for every configured milestone, drops
//! witnesses whose length marks a missed section boundary, and writes one
//! collation set per milestone for the external collation engine.
//!
//! Embedding code constructs a [`config::CollationConfig`], picks a
//! tokenizer (the built-in [`pipeline::tei::TeiTokenizer`] or its own
//! [`pipeline::Tokenizer`] implementation), and drives a
//! [`pipeline::Assembler`].

pub mod config;
pub mod numerals;
pub mod pipeline;

pub use config::{CollationConfig, NormalizeFn, PriorityPolicy};
pub use pipeline::{Assembler, CollationSet, PipelineError, RunSummary, Tokenizer};
