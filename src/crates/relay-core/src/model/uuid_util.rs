//! Normalization of upstream identifiers to the canonical 8-4-4-4-12
//! hyphenated form, per §3's UUID invariant.

use uuid::Uuid;

/// Parse an upstream identifier (which may or may not carry hyphens, and
/// may carry surrounding whitespace) into a canonical [`Uuid`].
///
/// Returns `None` rather than a `RelayError` — callers decide whether a
/// malformed id is a validation error (caller-supplied) or a decode
/// anomaly (upstream-supplied, logged and skipped per §9).
pub fn normalize(raw: &str) -> Option<Uuid> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(id) = Uuid::parse_str(trimmed) {
        return Some(id);
    }
    // Some upstream representations omit hyphens entirely (32 hex chars).
    let hex_only: String = trimmed.chars().filter(|c| *c != '-').collect();
    if hex_only.len() == 32 && hex_only.chars().all(|c| c.is_ascii_hexdigit()) {
        let hyphenated = format!(
            "{}-{}-{}-{}-{}",
            &hex_only[0..8],
            &hex_only[8..12],
            &hex_only[12..16],
            &hex_only[16..20],
            &hex_only[20..32]
        );
        return Uuid::parse_str(&hyphenated).ok();
    }
    None
}

/// Render a [`Uuid`] in the canonical 8-4-4-4-12 hyphenated form (this is
/// simply `Uuid::to_string`, wrapped so call sites document intent).
pub fn canonical(id: &Uuid) -> String {
    id.to_string()
}
