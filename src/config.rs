//! Collation run configuration.
//!
//! Everything the pipeline can be tuned with lives in one struct that the
//! embedding code constructs and hands to the assembler. The data-bearing
//! fields can also be loaded from a JSON file for the CLI; function-valued
//! fields (token normalization, numeral parsing) are only injectable
//! through this API — there is no dynamic module loading.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::numerals;
use crate::pipeline::PipelineError;

/// Token normalization hook. Receives each token object after
/// tokenization and may rewrite it in place (typically setting its
/// normalized form `"n"` from its surface form `"t"`).
pub type NormalizeFn = Arc<dyn Fn(&mut serde_json::Value) + Send + Sync>;

/// Which transcription format wins when one witness is available in
/// several formats. Historical variants of this pipeline disagreed on
/// the iteration direction, so the policy is explicit and named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityPolicy {
    /// The earliest tag in the priority list wins (canonical order).
    FirstMatchWins,
    /// The latest tag in the priority list wins.
    LastMatchWins,
}

/// Configuration for one collation run. Read-only after construction.
#[derive(Clone)]
pub struct CollationConfig {
    /// Structural sections to collate, in output order. Externally
    /// enumerated; the pipeline never discovers milestones from the data.
    pub milestones: Vec<String>,
    /// Witness names excluded from all output (unfinished transcriptions).
    pub unfinished: Vec<String>,
    /// Transcription format tags, best first. A tag is a filename suffix
    /// such as `json.tei.xml`.
    pub priority: Vec<String>,
    /// Tie-break policy when a witness exists in several formats.
    pub policy: PriorityPolicy,
    /// Characters the tokenizer should split into their own tokens.
    pub punctuation: Option<Vec<char>>,
    /// Per-token normalization, applied by the tokenizer.
    pub normalize: Option<NormalizeFn>,
    /// Parser for alphabetic numeral strings embedded in the sources.
    pub numeral_parser: Option<fn(&str) -> u64>,
}

impl Default for CollationConfig {
    fn default() -> Self {
        Self {
            milestones: Vec::new(),
            unfinished: Vec::new(),
            priority: default_priority(),
            policy: PriorityPolicy::FirstMatchWins,
            punctuation: None,
            normalize: None,
            numeral_parser: Some(numerals::parse),
        }
    }
}

impl std::fmt::Debug for CollationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollationConfig")
            .field("milestones", &self.milestones.len())
            .field("unfinished", &self.unfinished)
            .field("priority", &self.priority)
            .field("policy", &self.policy)
            .field("punctuation", &self.punctuation)
            .field("normalize", &self.normalize.is_some())
            .field("numeral_parser", &self.numeral_parser.is_some())
            .finish()
    }
}

/// Built-in format priority: merged JSON-derived TEI first, then TEI
/// converted from plain-text transcriptions.
pub fn default_priority() -> Vec<String> {
    vec!["json.tei.xml".into(), "txt.tei.xml".into()]
}

/// On-disk shape of a configuration file (all fields optional).
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    milestones: Option<Vec<String>>,
    unfinished: Option<Vec<String>>,
    priority: Option<Vec<String>>,
    policy: Option<PriorityPolicy>,
    /// Punctuation characters as one string, e.g. `"։՝,"`.
    punctuation: Option<String>,
}

impl CollationConfig {
    /// Load the data-bearing configuration fields from a JSON file.
    ///
    /// An unreadable or invalid file is a fatal configuration error:
    /// the run must halt before any output is produced.
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let file: ConfigFile = serde_json::from_str(&raw).map_err(|e| {
            PipelineError::Config(format!("invalid config {}: {e}", path.display()))
        })?;

        let defaults = Self::default();
        Ok(Self {
            milestones: file.milestones.unwrap_or_default(),
            unfinished: file.unfinished.unwrap_or_default(),
            priority: file.priority.unwrap_or(defaults.priority),
            policy: file.policy.unwrap_or(defaults.policy),
            punctuation: file.punctuation.map(|s| s.chars().collect()),
            normalize: None,
            numeral_parser: defaults.numeral_parser,
        })
    }
}
