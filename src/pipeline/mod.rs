pub mod grouping;
pub mod sources;
pub mod tokenizer;
pub mod tei;
pub mod outlier;
pub mod assemble;

pub use assemble::{Assembler, CollationSet, RunSummary};
pub use tokenizer::{
    Extraction, Layer, RawWitness, TokenizeError, TokenizeRequest, Tokenizer, Witness,
};

use std::path::PathBuf;

use thiserror::Error;

/// Errors that halt a run (or one stage of it) outright. Per-source and
/// per-milestone trouble is handled inline and logged, never raised as
/// one of these.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error in {path}: {message}")]
    Json { path: PathBuf, message: String },

    #[error("JSON serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cannot read input directory {0}")]
    InputDir(PathBuf),

    #[error("duplicate witness id {id} in milestone {milestone}")]
    DuplicateWitness { milestone: String, id: String },
}
