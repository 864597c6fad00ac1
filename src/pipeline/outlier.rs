//! Length-based outlier exclusion.
//!
//! A witness that is far longer than its peers for the same milestone
//! almost always means a milestone boundary marker was missed in the
//! source, so the extraction ran on into unrelated text. Left in, such a
//! witness can make the downstream alignment pathologically slow, so it
//! is excluded here and reported for audit.

use crate::pipeline::tokenizer::{Layer, Witness};

/// How many tokens over the main-layer median a witness may run before
/// it is treated as a missed-boundary artifact.
pub const OUTLIER_MARGIN: f64 = 800.0;

/// One excluded witness, kept for the run summary.
#[derive(Debug, Clone, PartialEq)]
pub struct Exclusion {
    pub id: String,
    pub token_count: usize,
    pub median: f64,
}

/// Median of a set of token counts; the mean of the two middle values
/// for even-sized input, 0 for empty input.
pub fn median(counts: &[usize]) -> f64 {
    if counts.is_empty() {
        return 0.0;
    }
    let mut sorted = counts.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid] as f64
    } else {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    }
}

/// Drop witnesses whose token count strictly exceeds the main-layer
/// median plus [`OUTLIER_MARGIN`].
///
/// The median is computed over main-layer witnesses only; corrected
/// layers are judged against it by their own length. Exclusions are
/// reported at `warn` with an `outlier` field so they stand apart from
/// ordinary log lines.
pub fn filter_outliers(witnesses: Vec<Witness>) -> (Vec<Witness>, Vec<Exclusion>) {
    let main_counts: Vec<usize> = witnesses
        .iter()
        .filter(|w| w.layer == Layer::Main)
        .map(Witness::token_count)
        .collect();
    let median = median(&main_counts);
    let threshold = median + OUTLIER_MARGIN;

    let mut kept = Vec::with_capacity(witnesses.len());
    let mut excluded = Vec::new();
    for witness in witnesses {
        let count = witness.token_count();
        if count as f64 > threshold {
            tracing::warn!(
                outlier = true,
                witness = %witness.id,
                tokens = count,
                median,
                "witness too long, excluding from collation"
            );
            excluded.push(Exclusion {
                id: witness.id,
                token_count: count,
                median,
            });
        } else {
            kept.push(witness);
        }
    }
    (kept, excluded)
}
