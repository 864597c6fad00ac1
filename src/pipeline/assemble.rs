//! Per-milestone collation assembly.
//!
//! Ties the pipeline together: resolve source files, extract both witness
//! layers from each, prune length outliers, and emit one collation set
//! per milestone in the shape the external collation engine expects.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::config::CollationConfig;

use super::outlier::{filter_outliers, Exclusion};
use super::sources;
use super::tokenizer::{extract, Extraction, Layer, Tokenizer, Witness};
use super::PipelineError;

/// The witness set for one milestone, in the collation engine's input
/// shape: `{"witnesses": [{id, tokens}, ...]}`.
#[derive(Debug, Serialize)]
pub struct CollationSet {
    #[serde(skip)]
    pub milestone: String,
    pub witnesses: Vec<Witness>,
}

/// Everything one milestone produced, for logging and verification.
#[derive(Debug)]
pub struct MilestoneReport {
    pub set: CollationSet,
    pub excluded: Vec<Exclusion>,
    /// Witness names whose source lacked this milestone (or failed).
    pub missing: Vec<String>,
}

/// Aggregate counts for one full run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub milestones_written: usize,
    pub milestones_empty: usize,
    /// Milestones skipped over a duplicate witness id (data error).
    pub milestones_failed: usize,
    pub witnesses_excluded: usize,
}

/// Drives the whole collation pass. Construction injects the tokenizer
/// capability and the run configuration; both are read-only afterwards.
pub struct Assembler {
    tokenizer: Box<dyn Tokenizer + Send + Sync>,
    config: CollationConfig,
}

impl Assembler {
    pub fn new(tokenizer: Box<dyn Tokenizer + Send + Sync>, config: CollationConfig) -> Self {
        Self { tokenizer, config }
    }

    pub fn config(&self) -> &CollationConfig {
        &self.config
    }

    /// Assemble the witness set for one milestone.
    ///
    /// Sources are processed strictly sequentially; a witness whose main
    /// layer is found is immediately probed for its corrected layer. A
    /// duplicate witness id is a data error and fails the milestone.
    pub fn assemble_milestone(
        &self,
        indir: &Path,
        milestone: &str,
    ) -> Result<MilestoneReport, PipelineError> {
        let mut witnesses: Vec<Witness> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut missing: Vec<String> = Vec::new();

        for source in sources::select(indir, &self.config)? {
            let path = indir.join(&source.filename);
            tracing::debug!(
                milestone,
                file = %source.filename,
                "looking for milestone in witness file"
            );

            let main = match extract(&*self.tokenizer, &path, milestone, Layer::Main, &self.config)
            {
                Extraction::Found(witness) => witness,
                Extraction::NotFound | Extraction::Failed(_) => {
                    tracing::info!(
                        milestone,
                        file = %source.filename,
                        "milestone not found in witness file"
                    );
                    missing.push(source.witness);
                    continue;
                }
            };
            tracing::info!(
                milestone,
                file = %source.filename,
                witness = %main.id,
                tokens = main.token_count(),
                "milestone found in witness file"
            );

            let corrected =
                match extract(&*self.tokenizer, &path, milestone, Layer::Corrected, &self.config) {
                    Extraction::Found(witness) => Some(witness),
                    Extraction::NotFound | Extraction::Failed(_) => None,
                };

            for witness in std::iter::once(main).chain(corrected) {
                if !seen.insert(witness.id.clone()) {
                    return Err(PipelineError::DuplicateWitness {
                        milestone: milestone.to_string(),
                        id: witness.id,
                    });
                }
                witnesses.push(witness);
            }
        }

        let (kept, excluded) = filter_outliers(witnesses);
        if !missing.is_empty() {
            tracing::info!(
                milestone,
                witnesses = %missing.join(" "),
                "milestone not in witnesses"
            );
        }
        Ok(MilestoneReport {
            set: CollationSet {
                milestone: milestone.to_string(),
                witnesses: kept,
            },
            excluded,
            missing,
        })
    }

    /// Run every configured milestone and write one output file per
    /// milestone with surviving witnesses into `outdir`.
    ///
    /// Per-milestone data errors are logged and skipped; only startup
    /// problems (unreadable input directory, unwritable output) abort.
    pub fn run(&self, indir: &Path, outdir: &Path) -> Result<RunSummary, PipelineError> {
        // Fail before any output if the input directory is unreadable.
        fs::read_dir(indir).map_err(|_| PipelineError::InputDir(indir.to_path_buf()))?;
        fs::create_dir_all(outdir)?;

        let mut summary = RunSummary::default();
        for milestone in &self.config.milestones {
            let milestone = milestone.as_str();
            let report = match self.assemble_milestone(indir, milestone) {
                Ok(report) => report,
                Err(PipelineError::DuplicateWitness { milestone, id }) => {
                    tracing::error!(
                        milestone = %milestone,
                        witness = %id,
                        "duplicate witness id, skipping milestone"
                    );
                    summary.milestones_failed += 1;
                    continue;
                }
                Err(other) => return Err(other),
            };

            summary.witnesses_excluded += report.excluded.len();
            if report.set.witnesses.is_empty() {
                tracing::info!(milestone, "no witnesses survived, not writing a file");
                summary.milestones_empty += 1;
                continue;
            }

            let outfile = outdir.join(format!("milestone-{milestone}.json"));
            fs::write(&outfile, serde_json::to_string_pretty(&report.set)?.as_bytes())?;
            tracing::info!(
                milestone,
                witnesses = report.set.witnesses.len(),
                out = %outfile.display(),
                "wrote collation set"
            );
            summary.milestones_written += 1;
        }

        tracing::info!(
            written = summary.milestones_written,
            empty = summary.milestones_empty,
            failed = summary.milestones_failed,
            excluded = summary.witnesses_excluded,
            "collation run complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tokenizer::{RawWitness, TokenizeError, TokenizeRequest};
    use serde_json::json;

    /// Tokenizer stub keyed by (witness file stem, milestone).
    struct StubTokenizer {
        entries: Vec<(&'static str, &'static str, Vec<&'static str>)>,
        corrected: Vec<(&'static str, &'static str, Vec<&'static str>)>,
    }

    impl StubTokenizer {
        fn lookup(
            &self,
            table: &[(&'static str, &'static str, Vec<&'static str>)],
            source: &Path,
            milestone: &str,
        ) -> Option<RawWitness> {
            let name = source.file_name()?.to_str()?;
            table
                .iter()
                .find(|(file, ms, _)| name.starts_with(file) && *ms == milestone)
                .map(|(_, _, tokens)| RawWitness {
                    id: None,
                    tokens: tokens.iter().map(|t| json!({ "t": t })).collect(),
                })
        }
    }

    impl Tokenizer for StubTokenizer {
        fn tokenize(
            &self,
            source: &Path,
            request: &TokenizeRequest<'_>,
        ) -> Result<Option<RawWitness>, TokenizeError> {
            let table = match request.layer {
                Layer::Main => &self.entries,
                Layer::Corrected => &self.corrected,
            };
            Ok(self.lookup(table, source, request.milestone))
        }
    }

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"stub").unwrap();
    }

    fn assembler(stub: StubTokenizer, milestones: &[&str]) -> Assembler {
        let config = CollationConfig {
            milestones: milestones.iter().map(|m| m.to_string()).collect(),
            ..CollationConfig::default()
        };
        Assembler::new(Box::new(stub), config)
    }

    #[test]
    fn merged_parts_and_single_part_collate_together() {
        // Manuscripts "A" (two merged parts) and "B" (single part), one
        // milestone S1, no corrected layer anywhere.
        let indir = tempfile::tempdir().unwrap();
        let outdir = tempfile::tempdir().unwrap();
        touch(indir.path(), "A-merged.json.tei.xml");
        touch(indir.path(), "B.json.tei.xml");

        let stub = StubTokenizer {
            entries: vec![
                ("A-merged", "S1", vec!["a", "b", "c"]),
                ("B", "S1", vec!["x"]),
            ],
            corrected: vec![],
        };
        let assembler = assembler(stub, &["S1"]);
        let summary = assembler.run(indir.path(), outdir.path()).unwrap();
        assert_eq!(summary.milestones_written, 1);

        let raw = std::fs::read_to_string(outdir.path().join("milestone-S1.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let witnesses = parsed["witnesses"].as_array().unwrap();
        assert_eq!(witnesses.len(), 2);
        let ids: Vec<&str> = witnesses.iter().map(|w| w["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert_eq!(witnesses[0]["tokens"].as_array().unwrap().len(), 3);
        assert_eq!(witnesses[1]["tokens"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn corrected_layer_is_added_when_present() {
        let indir = tempfile::tempdir().unwrap();
        touch(indir.path(), "A.json.tei.xml");

        let stub = StubTokenizer {
            entries: vec![("A", "S1", vec!["a", "b"])],
            corrected: vec![("A", "S1", vec!["a", "old"])],
        };
        let assembler = assembler(stub, &["S1"]);
        let report = assembler.assemble_milestone(indir.path(), "S1").unwrap();
        let ids: Vec<&str> = report.set.witnesses.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "A (a.c.)"]);
    }

    #[test]
    fn milestone_with_no_witnesses_writes_no_file() {
        let indir = tempfile::tempdir().unwrap();
        let outdir = tempfile::tempdir().unwrap();
        touch(indir.path(), "A.json.tei.xml");

        let stub = StubTokenizer { entries: vec![], corrected: vec![] };
        let assembler = assembler(stub, &["S1"]);
        let summary = assembler.run(indir.path(), outdir.path()).unwrap();
        assert_eq!(summary.milestones_written, 0);
        assert_eq!(summary.milestones_empty, 1);
        assert!(!outdir.path().join("milestone-S1.json").exists());
    }

    #[test]
    fn missing_sources_are_reported_not_fatal() {
        let indir = tempfile::tempdir().unwrap();
        touch(indir.path(), "A.json.tei.xml");
        touch(indir.path(), "B.json.tei.xml");

        let stub = StubTokenizer {
            entries: vec![("A", "S1", vec!["a"])],
            corrected: vec![],
        };
        let assembler = assembler(stub, &["S1"]);
        let report = assembler.assemble_milestone(indir.path(), "S1").unwrap();
        assert_eq!(report.set.witnesses.len(), 1);
        assert_eq!(report.missing, vec!["B"]);
    }

    #[test]
    fn duplicate_witness_id_fails_the_milestone_only() {
        // Two distinctly named files resolving to the same witness id.
        let indir = tempfile::tempdir().unwrap();
        let outdir = tempfile::tempdir().unwrap();
        touch(indir.path(), "A one.json.tei.xml");
        touch(indir.path(), "A two.json.tei.xml");

        struct SameId;
        impl Tokenizer for SameId {
            fn tokenize(
                &self,
                _source: &Path,
                request: &TokenizeRequest<'_>,
            ) -> Result<Option<RawWitness>, TokenizeError> {
                if request.layer == Layer::Corrected {
                    return Ok(None);
                }
                Ok(Some(RawWitness {
                    id: Some("A".into()),
                    tokens: vec![json!({ "t": "x" })],
                }))
            }
        }

        let config = CollationConfig {
            milestones: vec!["S1".into()],
            ..CollationConfig::default()
        };
        let assembler = Assembler::new(Box::new(SameId), config);

        let err = assembler.assemble_milestone(indir.path(), "S1");
        assert!(matches!(
            err,
            Err(PipelineError::DuplicateWitness { ref id, .. }) if id == "A"
        ));

        // The run continues: the milestone is counted failed, not fatal.
        let summary = assembler.run(indir.path(), outdir.path()).unwrap();
        assert_eq!(summary.milestones_failed, 1);
        assert_eq!(summary.milestones_written, 0);
    }

    #[test]
    fn outliers_are_excluded_from_output() {
        let indir = tempfile::tempdir().unwrap();
        touch(indir.path(), "A.json.tei.xml");
        touch(indir.path(), "B.json.tei.xml");
        touch(indir.path(), "C.json.tei.xml");
        touch(indir.path(), "D.json.tei.xml");

        let stub = StubTokenizer {
            entries: vec![
                ("A", "S1", vec!["t"; 99]),
                ("B", "S1", vec!["t"; 100]),
                ("C", "S1", vec!["t"; 101]),
                ("D", "S1", vec!["t"; 950]),
            ],
            corrected: vec![],
        };
        let assembler = assembler(stub, &["S1"]);
        let report = assembler.assemble_milestone(indir.path(), "S1").unwrap();
        // Median over [99, 100, 101, 950] is 100.5; 950 > 900.5.
        assert_eq!(report.set.witnesses.len(), 3);
        assert_eq!(report.excluded.len(), 1);
        assert_eq!(report.excluded[0].id, "D");
    }

    #[test]
    fn unreadable_input_dir_aborts_before_output() {
        let outdir = tempfile::tempdir().unwrap();
        let stub = StubTokenizer { entries: vec![], corrected: vec![] };
        let assembler = assembler(stub, &["S1"]);
        let err = assembler.run(Path::new("/nonexistent/in"), outdir.path());
        assert!(matches!(err, Err(PipelineError::InputDir(_))));
        assert_eq!(std::fs::read_dir(outdir.path()).unwrap().count(), 0);
    }
}
