//! Tokenizer capability and the witness extraction adapter.
//!
//! The actual markup-aware tokenization is an external concern; this
//! pipeline talks to it through the [`Tokenizer`] trait (allows stubbing
//! in tests and swapping the real engine in embedding code). The adapter
//! adds witness naming, the corrected-layer pass, and an explicit
//! [`Extraction`] outcome so callers branch on a tag instead of catching
//! errors.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::{CollationConfig, NormalizeFn};

/// Suffix appended to the corrected-layer witness id ("ante correctionem").
pub const CORRECTED_SUFFIX: &str = " (a.c.)";

/// Which text layer of a witness to extract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// The base transcribed text.
    #[default]
    Main,
    /// The scribal/editorial correction layer.
    Corrected,
}

/// One witness for one milestone: a sigil plus its ordered token stream.
/// Token payloads are opaque to the pipeline; only their count is ever
/// inspected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Witness {
    pub id: String,
    pub tokens: Vec<Value>,
    #[serde(skip)]
    pub layer: Layer,
}

impl Witness {
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

/// What the external capability hands back for one extraction call.
#[derive(Debug, Clone)]
pub struct RawWitness {
    /// Witness id as declared inside the source, when the markup carries
    /// one. Absent ids fall back to the filename-derived name.
    pub id: Option<String>,
    pub tokens: Vec<Value>,
}

/// Parameters for one tokenization call.
pub struct TokenizeRequest<'a> {
    pub milestone: &'a str,
    pub layer: Layer,
    pub normalize: Option<&'a NormalizeFn>,
    pub punctuation: Option<&'a [char]>,
    pub numeral_parser: Option<fn(&str) -> u64>,
}

/// Failure modes of the external tokenizer.
#[derive(Error, Debug)]
pub enum TokenizeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed source: {0}")]
    Malformed(String),
}

/// External tokenization capability.
///
/// `Ok(None)` means the requested milestone does not occur in the source,
/// which is a normal outcome, not an error.
pub trait Tokenizer {
    fn tokenize(
        &self,
        source: &Path,
        request: &TokenizeRequest<'_>,
    ) -> Result<Option<RawWitness>, TokenizeError>;
}

/// Outcome of extracting one witness layer from one source file.
#[derive(Debug)]
pub enum Extraction {
    Found(Witness),
    /// Milestone not present in this source (or present but empty).
    NotFound,
    /// Source unreadable or tokenizer failure; the run continues.
    Failed(String),
}

/// Witness name derived from a source filename: everything before the
/// first `.`, with any merge marker removed.
pub fn witness_name(filename: &str) -> String {
    let stem = filename.split('.').next().unwrap_or(filename);
    stem.replace("-merged", "")
}

/// Extract one witness layer from one source file.
///
/// Tokenizer failures are logged and folded into [`Extraction::Failed`];
/// they never abort the run. The corrected layer gets the fixed id
/// suffix so it collates as a related but distinct witness.
pub fn extract<T: Tokenizer + ?Sized>(
    tokenizer: &T,
    source: &Path,
    milestone: &str,
    layer: Layer,
    config: &CollationConfig,
) -> Extraction {
    let request = TokenizeRequest {
        milestone,
        layer,
        normalize: config.normalize.as_ref(),
        punctuation: config.punctuation.as_deref(),
        numeral_parser: config.numeral_parser,
    };

    let raw = match tokenizer.tokenize(source, &request) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Extraction::NotFound,
        Err(TokenizeError::Io(e)) => {
            tracing::warn!(
                source = %source.display(),
                error = %e,
                "source unavailable, skipping"
            );
            return Extraction::Failed(format!("source unavailable: {e}"));
        }
        Err(TokenizeError::Malformed(reason)) => {
            tracing::warn!(
                source = %source.display(),
                error = %reason,
                "tokenizer failed on source, skipping"
            );
            return Extraction::Failed(reason);
        }
    };

    if raw.tokens.is_empty() {
        return Extraction::NotFound;
    }

    let filename = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut id = raw
        .id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| witness_name(&filename));
    if layer == Layer::Corrected {
        id.push_str(CORRECTED_SUFFIX);
    }

    Extraction::Found(Witness {
        id,
        tokens: raw.tokens,
        layer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct StubTokenizer {
        result: fn(&TokenizeRequest<'_>) -> Result<Option<RawWitness>, TokenizeError>,
    }

    impl Tokenizer for StubTokenizer {
        fn tokenize(
            &self,
            _source: &Path,
            request: &TokenizeRequest<'_>,
        ) -> Result<Option<RawWitness>, TokenizeError> {
            (self.result)(request)
        }
    }

    fn config() -> CollationConfig {
        CollationConfig::default()
    }

    #[test]
    fn witness_name_strips_extensions_and_merge_marker() {
        assert_eq!(witness_name("M5587-merged.json.tei.xml"), "M5587");
        assert_eq!(witness_name("B.txt.tei.xml"), "B");
        assert_eq!(witness_name("plain"), "plain");
    }

    #[test]
    fn found_witness_uses_declared_id() {
        let stub = StubTokenizer {
            result: |_| {
                Ok(Some(RawWitness {
                    id: Some("W1".into()),
                    tokens: vec![json!({"t": "a"})],
                }))
            },
        };
        let out = extract(&stub, Path::new("x.json.tei.xml"), "401", Layer::Main, &config());
        match out {
            Extraction::Found(w) => {
                assert_eq!(w.id, "W1");
                assert_eq!(w.layer, Layer::Main);
                assert_eq!(w.token_count(), 1);
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn missing_declared_id_falls_back_to_filename() {
        let stub = StubTokenizer {
            result: |_| {
                Ok(Some(RawWitness {
                    id: None,
                    tokens: vec![json!({"t": "a"})],
                }))
            },
        };
        let out = extract(
            &stub,
            Path::new("/in/M5587-merged.json.tei.xml"),
            "401",
            Layer::Main,
            &config(),
        );
        match out {
            Extraction::Found(w) => assert_eq!(w.id, "M5587"),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn corrected_layer_id_gets_suffix() {
        let stub = StubTokenizer {
            result: |_| {
                Ok(Some(RawWitness {
                    id: Some("W1".into()),
                    tokens: vec![json!({"t": "a"})],
                }))
            },
        };
        let out = extract(&stub, Path::new("x.json.tei.xml"), "401", Layer::Corrected, &config());
        match out {
            Extraction::Found(w) => {
                assert_eq!(w.id, "W1 (a.c.)");
                assert_eq!(w.layer, Layer::Corrected);
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn milestone_absent_is_not_found() {
        let stub = StubTokenizer { result: |_| Ok(None) };
        let out = extract(&stub, Path::new("x.xml"), "401", Layer::Main, &config());
        assert!(matches!(out, Extraction::NotFound));
    }

    #[test]
    fn empty_token_stream_is_not_found() {
        let stub = StubTokenizer {
            result: |_| Ok(Some(RawWitness { id: Some("W1".into()), tokens: vec![] })),
        };
        let out = extract(&stub, Path::new("x.xml"), "401", Layer::Main, &config());
        assert!(matches!(out, Extraction::NotFound));
    }

    #[test]
    fn tokenizer_failure_is_failed_not_panic() {
        let stub = StubTokenizer {
            result: |_| Err(TokenizeError::Malformed("bad markup".into())),
        };
        let out = extract(&stub, Path::new("x.xml"), "401", Layer::Main, &config());
        assert!(matches!(out, Extraction::Failed(reason) if reason.contains("bad markup")));
    }

    #[test]
    fn missing_file_is_failed() {
        let stub = StubTokenizer {
            result: |_| {
                Err(TokenizeError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no such file",
                )))
            },
        };
        let out = extract(&stub, Path::new("gone.xml"), "401", Layer::Main, &config());
        assert!(matches!(out, Extraction::Failed(_)));
    }
}
