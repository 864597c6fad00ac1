//! Armenian alphabetic numeral parsing.
//!
//! Section and page numbers in the transcription sources are written with
//! Armenian letters carrying numeric values: Ա–Թ are units, Ժ–Ղ tens,
//! Ճ–Ջ hundreds, Ռ–Ք thousands. Magnitude generally descends left to
//! right; a letter of equal or greater value than its predecessor turns
//! the accumulated run into a multiplier (ՌՌ = 1000 × 1000, ԻՌ = 20 × 1000).

/// First code point of the Armenian capital letter block (Ա).
const BLOCK_START: u32 = 1329;
/// Last code point with a numeric value (Ք = 9000).
const BLOCK_END: u32 = 1364;

/// Parse an Armenian alphabetic numeral string into its integer value.
///
/// The conjunction `և` is stripped, lowercase letters are uppercased, and
/// any character outside the valued range is ignored. An input with no
/// recognized characters parses to 0.
pub fn parse(text: &str) -> u64 {
    let mut total: u64 = 0;
    let mut last: Option<u64> = None;

    let cleaned = text.replace('և', "");
    let letters = cleaned
        .chars()
        .flat_map(char::to_uppercase)
        .map(|c| c as u32)
        .filter(|cp| (BLOCK_START..=BLOCK_END).contains(cp));

    for cp in letters {
        let value = letter_value(cp);
        match last {
            Some(prev) if value >= prev => total *= value,
            _ => total += value,
        }
        last = Some(value);
    }
    total
}

fn letter_value(cp: u32) -> u64 {
    debug_assert!((BLOCK_START..=BLOCK_END).contains(&cp));
    if cp < 1338 {
        u64::from(cp - 1328) // Ա-Թ
    } else if cp < 1347 {
        u64::from(cp - 1337) * 10 // Ժ-Ղ
    } else if cp < 1356 {
        u64::from(cp - 1346) * 100 // Ճ-Ջ
    } else {
        u64::from(cp - 1355) * 1000 // Ռ-Ք
    }
}
