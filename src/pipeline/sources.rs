//! Source file selection for one collation run.
//!
//! A witness may exist in several transcription formats in the input
//! directory; the configured priority list of format tags decides which
//! file represents it. Witnesses on the skip list never make it to
//! extraction at all.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::config::{CollationConfig, PriorityPolicy};

use super::tokenizer::witness_name;
use super::PipelineError;

/// One candidate source file for extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub filename: String,
    /// Filename-derived witness name (skip-list key).
    pub witness: String,
    /// Index of the matching tag in the priority list (0 = best).
    pub rank: usize,
}

/// True when `filename` carries format tag `tag` as its extension suffix.
fn matches_tag(filename: &str, tag: &str) -> bool {
    filename.ends_with(tag)
        && filename.len() > tag.len()
        && filename.as_bytes()[filename.len() - tag.len() - 1] == b'.'
}

/// Rank of the priority tag matching `filename`, if any. A file matching
/// several tags takes the best (lowest) rank.
fn tag_rank(filename: &str, priority: &[String]) -> Option<usize> {
    priority.iter().position(|tag| matches_tag(filename, tag))
}

/// Enumerate candidate witness files in `dir`, one per witness name.
///
/// Files are matched against the priority tags; skip-listed witnesses are
/// dropped (logged); when a witness exists in several formats, the
/// configured [`PriorityPolicy`] decides which file wins. The result is
/// ordered by (rank, filename) so runs are deterministic.
pub fn select(dir: &Path, config: &CollationConfig) -> Result<Vec<SourceFile>, PipelineError> {
    let entries = fs::read_dir(dir).map_err(|_| PipelineError::InputDir(dir.to_path_buf()))?;

    // witness name -> chosen candidate, BTreeMap for deterministic order
    let mut chosen: BTreeMap<String, SourceFile> = BTreeMap::new();

    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().into_owned();
        let Some(rank) = tag_rank(&filename, &config.priority) else {
            continue;
        };

        let witness = witness_name(&filename);
        if config.unfinished.iter().any(|w| w == &witness) {
            tracing::debug!(witness = %witness, file = %filename, "skipping unfinished witness");
            continue;
        }

        let candidate = SourceFile { filename, witness: witness.clone(), rank };
        match chosen.get(&witness) {
            None => {
                chosen.insert(witness, candidate);
            }
            Some(current) => {
                let replace = match config.policy {
                    PriorityPolicy::FirstMatchWins => candidate.rank < current.rank,
                    PriorityPolicy::LastMatchWins => candidate.rank > current.rank,
                };
                // Equal rank: lexicographically first filename stays.
                let replace = replace
                    || (candidate.rank == current.rank && candidate.filename < current.filename);
                if replace {
                    chosen.insert(witness, candidate);
                }
            }
        }
    }

    let mut sources: Vec<SourceFile> = chosen.into_values().collect();
    sources.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.filename.cmp(&b.filename)));
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"<TEI/>").unwrap();
    }

    fn config_with(policy: PriorityPolicy) -> CollationConfig {
        CollationConfig {
            policy,
            ..CollationConfig::default()
        }
    }

    #[test]
    fn matches_only_dotted_suffixes() {
        assert!(matches_tag("A.json.tei.xml", "json.tei.xml"));
        assert!(!matches_tag("Ajson.tei.xml", "json.tei.xml"));
        assert!(!matches_tag("json.tei.xml", "json.tei.xml"));
        assert!(!matches_tag("A.txt.tei.xml", "json.tei.xml"));
    }

    #[test]
    fn selects_matching_files_in_rank_then_name_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "B.txt.tei.xml");
        touch(dir.path(), "A.json.tei.xml");
        touch(dir.path(), "C.json.tei.xml");
        touch(dir.path(), "notes.txt");

        let sources = select(dir.path(), &CollationConfig::default()).unwrap();
        let names: Vec<&str> = sources.iter().map(|s| s.filename.as_str()).collect();
        assert_eq!(names, vec!["A.json.tei.xml", "C.json.tei.xml", "B.txt.tei.xml"]);
    }

    #[test]
    fn first_match_wins_prefers_earlier_tag() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "A.json.tei.xml");
        touch(dir.path(), "A.txt.tei.xml");

        let sources = select(dir.path(), &config_with(PriorityPolicy::FirstMatchWins)).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].filename, "A.json.tei.xml");
        assert_eq!(sources[0].witness, "A");
    }

    #[test]
    fn last_match_wins_prefers_later_tag() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "A.json.tei.xml");
        touch(dir.path(), "A.txt.tei.xml");

        let sources = select(dir.path(), &config_with(PriorityPolicy::LastMatchWins)).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].filename, "A.txt.tei.xml");
    }

    #[test]
    fn skip_listed_witness_is_excluded_before_extraction() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "A-merged.json.tei.xml");
        touch(dir.path(), "B.json.tei.xml");

        let config = CollationConfig {
            unfinished: vec!["A".into()],
            ..CollationConfig::default()
        };
        let sources = select(dir.path(), &config).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].witness, "B");
    }

    #[test]
    fn unreadable_dir_is_fatal() {
        let err = select(Path::new("/nonexistent/dir"), &CollationConfig::default());
        assert!(matches!(err, Err(PipelineError::InputDir(_))));
    }
}
