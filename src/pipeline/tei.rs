//! Minimal built-in tokenizer for TEI transcription exports.
//!
//! Covers the common shape of the upstream exports: `<milestone
//! unit="section" n="..."/>` markers delimit sections, corrections are
//! `<del>`/`<add>` (or `<sic>`/`<corr>`) pairs, and the witness declares
//! its sigil on `<msDesc xml:id="...">`. Embedding code with richer
//! markup should inject its own [`Tokenizer`] instead; this one exists so
//! the CLI works out of the box.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Value};

use super::tokenizer::{Layer, RawWitness, TokenizeError, TokenizeRequest, Tokenizer};

/// Tokenizer for TEI-XML sources. Stateless; one instance serves a run.
#[derive(Debug, Default)]
pub struct TeiTokenizer;

fn milestone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<milestone\b[^>]*unit="section"[^>]*n="([^"]*)"[^>]*/?>"#).unwrap()
    })
}

fn ms_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<msDesc\b[^>]*xml:id="([^"]*)""#).unwrap())
}

fn num_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<num\b[^>]*>(.*?)</num>").unwrap())
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap())
}

fn drop_elements(text: &str, names: [&str; 2]) -> String {
    let mut out = text.to_string();
    for name in names {
        let re = Regex::new(&format!(r"(?s)<{name}\b[^>]*>.*?</{name}>")).unwrap();
        out = re.replace_all(&out, " ").into_owned();
    }
    out
}

fn unwrap_elements(text: &str, names: [&str; 2]) -> String {
    let mut out = text.to_string();
    for name in names {
        let re = Regex::new(&format!(r"(?s)<{name}\b[^>]*>(.*?)</{name}>")).unwrap();
        out = re.replace_all(&out, " $1 ").into_owned();
    }
    out
}

/// True when the slice carries any correction markup at all. Without it
/// there is no corrected layer to extract.
fn has_correction_markup(text: &str) -> bool {
    ["<del", "<add", "<sic", "<corr"].iter().any(|t| text.contains(t))
}

// Private-use sentinels bracket <num> placeholders through tokenization.
const NUM_OPEN: char = '\u{E000}';
const NUM_CLOSE: char = '\u{E001}';

/// Replace `<num>` elements with sentinel placeholders so each numeral
/// string survives tokenization as a single token; returns the captured
/// numeral texts in placeholder order.
fn stash_numerals(text: &str) -> (String, Vec<String>) {
    let mut numerals = Vec::new();
    let replaced = num_re()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let inner = tag_re().replace_all(&caps[1], "").trim().to_string();
            numerals.push(inner);
            format!(" {NUM_OPEN}{}{NUM_CLOSE} ", numerals.len() - 1)
        })
        .into_owned();
    (replaced, numerals)
}

/// Split a whitespace-separated chunk into word and punctuation tokens.
fn split_punctuation(chunk: &str, punctuation: &[char]) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    for c in chunk.chars() {
        if punctuation.contains(&c) {
            if !word.is_empty() {
                tokens.push(std::mem::take(&mut word));
            }
            tokens.push(c.to_string());
        } else {
            word.push(c);
        }
    }
    if !word.is_empty() {
        tokens.push(word);
    }
    tokens
}

fn build_token(
    surface: &str,
    numerals: &[String],
    numeral_parser: Option<fn(&str) -> u64>,
) -> Value {
    // Numeral placeholder: surface is the original numeral string, the
    // normalized form its parsed value when a parser is configured.
    if let Some(inner) = surface
        .strip_prefix(NUM_OPEN)
        .and_then(|s| s.strip_suffix(NUM_CLOSE))
    {
        if let Ok(index) = inner.parse::<usize>() {
            if let Some(text) = numerals.get(index) {
                let normalized = match numeral_parser {
                    Some(parse) => parse(text).to_string(),
                    None => text.clone(),
                };
                return json!({ "t": text, "n": normalized });
            }
        }
    }
    json!({ "t": surface, "n": surface })
}

impl Tokenizer for TeiTokenizer {
    fn tokenize(
        &self,
        source: &Path,
        request: &TokenizeRequest<'_>,
    ) -> Result<Option<RawWitness>, TokenizeError> {
        let document = fs::read_to_string(source)?;

        // Locate the requested milestone and slice to the next marker.
        let markers: Vec<(usize, usize, String)> = milestone_re()
            .captures_iter(&document)
            .map(|caps| {
                let m = caps.get(0).unwrap();
                (m.start(), m.end(), caps[1].to_string())
            })
            .collect();
        let Some(position) = markers.iter().position(|(_, _, n)| n == request.milestone) else {
            return Ok(None);
        };
        let start = markers[position].1;
        let end = markers
            .get(position + 1)
            .map(|(next_start, _, _)| *next_start)
            .unwrap_or(document.len());
        let section = &document[start..end];

        // Pick the text layer. A section without correction markup has
        // no corrected layer.
        let layered = match request.layer {
            Layer::Main => {
                let kept = drop_elements(section, ["del", "sic"]);
                unwrap_elements(&kept, ["add", "corr"])
            }
            Layer::Corrected => {
                if !has_correction_markup(section) {
                    return Ok(None);
                }
                let kept = drop_elements(section, ["add", "corr"]);
                unwrap_elements(&kept, ["del", "sic"])
            }
        };

        let (stashed, numerals) = stash_numerals(&layered);
        let text = tag_re().replace_all(&stashed, " ");

        let no_punctuation: &[char] = &[];
        let punctuation = request.punctuation.unwrap_or(no_punctuation);
        let mut tokens: Vec<Value> = text
            .split_whitespace()
            .flat_map(|chunk| split_punctuation(chunk, punctuation))
            .map(|surface| build_token(&surface, &numerals, request.numeral_parser))
            .collect();

        if let Some(normalize) = request.normalize {
            for token in &mut tokens {
                normalize(token);
            }
        }

        let id = ms_id_re()
            .captures(&document)
            .map(|caps| caps[1].to_string());
        Ok(Some(RawWitness { id, tokens }))
    }
}
