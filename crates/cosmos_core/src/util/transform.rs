//! Field-name transforms between storage and external naming.
//!
//! # Invariants
//! - Storage names are snake case; external names are camel case.
//! - The mapping is mechanical, so external names never need to be declared
//!   by hand per field.

/// Converts a snake case identifier to camel case.
///
/// Leading underscores are dropped, the first segment is kept as written and
/// every following segment is capitalized (first char upper, rest lower).
/// Empty segments produced by repeated underscores are skipped.
pub fn to_camel(value: &str) -> String {
    let mut segments = value.trim_start_matches('_').split('_');
    let mut out = String::with_capacity(value.len());

    if let Some(head) = segments.next() {
        out.push_str(head);
    }

    for segment in segments.filter(|segment| !segment.is_empty()) {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
        }
    }

    out
}
