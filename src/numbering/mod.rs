//! Document number parsing and allocation.
//!
//! Numbers are human-readable strings whose trailing integer forms the
//! per-year sequence. Strings that do not match the family's pattern are
//! ignored wholesale so legacy or hand-entered numbers never corrupt the
//! computed maximum.

pub mod allocator;
pub mod conflict;

pub use allocator::{NextNumber, SequenceAllocator};
pub use conflict::ConflictResolver;

use crate::documents::DocumentKind;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // "FATURA NR.12/B" -> 12
    static ref INVOICE_SEQ: Regex = Regex::new(r"NR\.(\d+)").unwrap();
    // "OF-2026-7" -> 7
    static ref OFFER_SEQ: Regex = Regex::new(r"-(\d+)\s*$").unwrap();
}

fn pattern(kind: DocumentKind) -> &'static Regex {
    match kind {
        DocumentKind::Invoice => &INVOICE_SEQ,
        DocumentKind::Offer => &OFFER_SEQ,
    }
}

/// The numeric sequence embedded in `number`, if the family pattern matches.
pub fn sequence_of(kind: DocumentKind, number: &str) -> Option<i64> {
    pattern(kind)
        .captures(number)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Rewrite the embedded sequence while preserving the surrounding text, so
/// `"FATURA NR.1/A"` renumbered to 4 becomes `"FATURA NR.4/A"`.
pub fn renumber(kind: DocumentKind, number: &str, sequence: i64) -> Option<String> {
    let m = pattern(kind).captures(number)?.get(1)?;
    Some(format!(
        "{}{}{}",
        &number[..m.start()],
        sequence,
        &number[m.end()..]
    ))
}

/// First and last calendar day of the numbering period, as ISO text.
pub(crate) fn period_bounds(year: i32) -> (String, String) {
    (format!("{year:04}-01-01"), format!("{year:04}-12-31"))
}
