//! Manuscript grouping and part-file merging.
//!
//! Transcription exports arrive as one or more JSON files per manuscript,
//! named like `M5587 (J) 1.json`, `M5587 (J) 2.json` — a base title, an
//! optional parenthesized shelfmark code, and an optional part sequence
//! number. This module reassembles those fragments into one logical
//! witness document per manuscript: metadata from the first part, canvases
//! concatenated across parts in part order.
//!
//! Part order is filename sort order. Sequence numbers of 10 and above
//! sort lexicographically, not numerically (`X 10` lands between `X 1`
//! and `X 2`); the naming convention in use keeps sequences single-digit.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Value};

use super::PipelineError;

/// One input file holding a physical or logical segment of a manuscript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRef {
    pub filename: String,
    /// Trailing sequence number, if the filename declared one.
    pub sequence: Option<u32>,
}

/// A manuscript reassembled from its part files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manuscript {
    /// Canonical id: the grouping key with any trailing parenthesized
    /// annotation removed, e.g. `M5587 (J)` → `M5587`.
    pub id: String,
    /// Grouping key: the working title minus its part sequence number.
    pub key: String,
    /// Parts in filename sort order.
    pub parts: Vec<PartRef>,
}

fn part_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?P<base>.*\S) (?P<seq>\d+)$").unwrap())
}

fn annotation_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\([^)]*\)\s*$").unwrap())
}

/// Strip the trailing file extension from a filename.
fn working_title(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(dot) if dot > 0 => &filename[..dot],
        _ => filename,
    }
}

/// Split a working title into grouping key and part sequence number.
/// A title that does not end in a space-separated integer is its own key
/// (single-part manuscript, or an unconventional name kept whole).
fn split_title(title: &str) -> (String, Option<u32>) {
    if let Some(caps) = part_pattern().captures(title) {
        if let Ok(seq) = caps["seq"].parse::<u32>() {
            return (caps["base"].to_string(), Some(seq));
        }
    }
    (title.to_string(), None)
}

/// Canonical manuscript id from a grouping key.
fn canonical_id(key: &str) -> String {
    annotation_pattern().replace(key, "").trim().to_string()
}

/// Group a flat list of filenames into manuscripts.
///
/// Filenames are sorted lexicographically; consecutive names sharing a
/// grouping key form one manuscript, parts in encounter order. Every
/// input filename lands in exactly one manuscript.
pub fn group_filenames<S: AsRef<str>>(filenames: &[S]) -> Vec<Manuscript> {
    let mut sorted: Vec<&str> = filenames.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();

    let mut manuscripts: Vec<Manuscript> = Vec::new();
    for filename in sorted {
        let (key, sequence) = split_title(working_title(filename));
        let part = PartRef {
            filename: filename.to_string(),
            sequence,
        };
        match manuscripts.last_mut() {
            Some(current) if current.key == key => current.parts.push(part),
            _ => manuscripts.push(Manuscript {
                id: canonical_id(&key),
                key,
                parts: vec![part],
            }),
        }
    }
    manuscripts
}

fn read_part(dir: &Path, filename: &str) -> Result<Value, PipelineError> {
    let path = dir.join(filename);
    let raw = fs::read_to_string(&path)?;
    serde_json::from_str(&raw).map_err(|e| PipelineError::Json {
        path,
        message: e.to_string(),
    })
}

/// Canvases of one part document: `sequences[0].canvases`, or empty when
/// the export carries no sequence (logged, not an error).
fn part_canvases(doc: &Value, filename: &str) -> Vec<Value> {
    match doc
        .pointer("/sequences/0/canvases")
        .and_then(Value::as_array)
    {
        Some(canvases) => canvases.clone(),
        None => {
            tracing::warn!(file = filename, "part file has no canvases");
            Vec::new()
        }
    }
}

/// Merge a manuscript's part files into one witness document:
/// `{metadata, sequences: [{canvases: <flattened>}]}`. Metadata comes
/// from the first part only; canvases keep part order.
pub fn merge_manuscript(dir: &Path, manuscript: &Manuscript) -> Result<Value, PipelineError> {
    let mut metadata = Value::Null;
    let mut canvases: Vec<Value> = Vec::new();

    for (index, part) in manuscript.parts.iter().enumerate() {
        let doc = read_part(dir, &part.filename)?;
        if index == 0 {
            metadata = doc.get("metadata").cloned().unwrap_or(Value::Null);
        }
        canvases.extend(part_canvases(&doc, &part.filename));
    }

    Ok(json!({
        "metadata": metadata,
        "sequences": [{ "canvases": canvases }],
    }))
}

/// Merge every `*.json` part file in `indir` and write one
/// `<id>-merged.json` per manuscript into `outdir`. Returns the number
/// of merged documents written.
pub fn merge_directory(indir: &Path, outdir: &Path) -> Result<usize, PipelineError> {
    let entries =
        fs::read_dir(indir).map_err(|_| PipelineError::InputDir(indir.to_path_buf()))?;

    let mut filenames: Vec<String> = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".json") && entry.file_type()?.is_file() {
            filenames.push(name);
        }
    }

    let manuscripts = group_filenames(&filenames);
    for manuscript in &manuscripts {
        let merged = merge_manuscript(indir, manuscript)?;
        let outfile = outdir.join(format!("{}-merged.json", manuscript.id));
        fs::write(&outfile, serde_json::to_string_pretty(&merged)?.as_bytes())?;
        tracing::info!(
            manuscript = %manuscript.id,
            parts = manuscript.parts.len(),
            out = %outfile.display(),
            "merged manuscript parts"
        );
    }
    Ok(manuscripts.len())
}
