//! Centralized schema tables: the seven designated inverse-relation pairs
//! (§4.3) and, per kind, which fields are mutable relations, mutable
//! scalars, or derived. Kept as data rather than scattered `match` arms so
//! the Synthesizer, Merger, and Delta Calculator all read from one source
//! of truth (§9's design note).

use super::entity::EntityKind;

/// One side of a bidirectional relation: which kind/field holds it, and
/// whether it holds a single target or a list.
#[derive(Debug, Clone, Copy)]
pub struct RelationSide {
    pub kind: EntityKind,
    pub field: &'static str,
    pub multi: bool,
}

/// A designated inverse pair: editing one side's relation field must mirror
/// the change onto the other side's field (T1, T2, S2).
#[derive(Debug, Clone, Copy)]
pub struct RelationPair {
    pub forward: RelationSide,
    pub inverse: RelationSide,
}

pub const RELATION_PAIRS: &[RelationPair] = &[
    // Character.ownedElements <-> Element.owner
    RelationPair {
        forward: RelationSide {
            kind: EntityKind::Character,
            field: "ownedElements",
            multi: true,
        },
        inverse: RelationSide {
            kind: EntityKind::Element,
            field: "owner",
            multi: false,
        },
    },
    // Character.associatedElements <-> Element.associatedCharacters (derived, read-only target;
    // see note below — kept in the table for documentation but synth.rs skips derived targets)
    // Character.characterPuzzles <-> Puzzle.owner (derived on Puzzle side, see synth.rs)
    // Character.events <-> TimelineEvent.charactersInvolved
    RelationPair {
        forward: RelationSide {
            kind: EntityKind::Character,
            field: "events",
            multi: true,
        },
        inverse: RelationSide {
            kind: EntityKind::TimelineEvent,
            field: "charactersInvolved",
            multi: true,
        },
    },
    // Element.container <-> Element.contents (self-referential, same kind both sides)
    RelationPair {
        forward: RelationSide {
            kind: EntityKind::Element,
            field: "container",
            multi: false,
        },
        inverse: RelationSide {
            kind: EntityKind::Element,
            field: "contents",
            multi: true,
        },
    },
    // Element.timelineEvent <-> TimelineEvent.memoryEvidence
    RelationPair {
        forward: RelationSide {
            kind: EntityKind::Element,
            field: "timelineEvent",
            multi: false,
        },
        inverse: RelationSide {
            kind: EntityKind::TimelineEvent,
            field: "memoryEvidence",
            multi: true,
        },
    },
    // Element.requiredForPuzzles <-> Puzzle.puzzleElements
    RelationPair {
        forward: RelationSide {
            kind: EntityKind::Element,
            field: "requiredForPuzzles",
            multi: true,
        },
        inverse: RelationSide {
            kind: EntityKind::Puzzle,
            field: "puzzleElements",
            multi: true,
        },
    },
    // Element.rewardedByPuzzles <-> Puzzle.rewards
    RelationPair {
        forward: RelationSide {
            kind: EntityKind::Element,
            field: "rewardedByPuzzles",
            multi: true,
        },
        inverse: RelationSide {
            kind: EntityKind::Puzzle,
            field: "rewards",
            multi: true,
        },
    },
];

/// `Puzzle.parentItem <-> Puzzle.subPuzzles` is the seventh pair; it is
/// self-referential on the same kind, like `Element.container <-> Element.contents`.
pub const PUZZLE_HIERARCHY_PAIR: RelationPair = RelationPair {
    forward: RelationSide {
        kind: EntityKind::Puzzle,
        field: "parentItem",
        multi: false,
    },
    inverse: RelationSide {
        kind: EntityKind::Puzzle,
        field: "subPuzzles",
        multi: true,
    },
};

/// All seven pairs, forward-and-inverse together, for code that wants to
/// iterate uniformly (synth.rs, inverse.rs).
pub fn all_relation_pairs() -> Vec<RelationPair> {
    let mut pairs: Vec<RelationPair> = RELATION_PAIRS.to_vec();
    pairs.push(PUZZLE_HIERARCHY_PAIR);
    pairs
}

/// Mutable field names per kind, for the Merger's presence check (§4.8):
/// a field absent from a PATCH/PUT body is left untouched rather than
/// cleared.
pub fn mutable_field_names(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Character => &[
            "name",
            "kind",
            "tier",
            "primaryAction",
            "logline",
            "overview",
            "emotionTowardsCEO",
            "ownedElements",
            "associatedElements",
            "characterPuzzles",
            "events",
        ],
        EntityKind::Element => &[
            "name",
            "description",
            "basicKind",
            "status",
            "firstAvailable",
            "narrativeThreads",
            "productionNotes",
            "contentLink",
            "owner",
            "container",
            "contents",
            "timelineEvent",
            "requiredForPuzzles",
            "rewardedByPuzzles",
            "containerPuzzle",
        ],
        EntityKind::Puzzle => &[
            "name",
            "descriptionSolution",
            "assetLink",
            "puzzleElements",
            "lockedItem",
            "rewards",
            "parentItem",
            "subPuzzles",
        ],
        EntityKind::TimelineEvent => &[
            "description",
            "notes",
            "date",
            "charactersInvolved",
            "memoryEvidence",
        ],
    }
}

/// Mutable relation field names per kind, used by the Synthesizer and
/// Inverse-Relation Maintainer to know which fields on an edited entity can
/// drive a mirrored write elsewhere.
pub fn mutable_relation_field_names(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Character => &[
            "ownedElements",
            "associatedElements",
            "characterPuzzles",
            "events",
        ],
        EntityKind::Element => &[
            "owner",
            "container",
            "contents",
            "timelineEvent",
            "requiredForPuzzles",
            "rewardedByPuzzles",
            "containerPuzzle",
        ],
        EntityKind::Puzzle => &["puzzleElements", "lockedItem", "rewards", "parentItem", "subPuzzles"],
        EntityKind::TimelineEvent => &["charactersInvolved", "memoryEvidence"],
    }
}

/// The upstream wire shape a field decodes from / encodes to. Distinct from
/// Rust's `FieldValue` because, e.g., both `title` and `rich_text` decode to
/// plain text but must be re-encoded under their own property kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireKind {
    Title,
    RichText,
    Select,
    Status,
    MultiSelect,
    Relation,
    Url,
    Date,
    Files,
}

/// Centralized property-name and wire-kind lookup table (§4.3: "Name
/// mapping is centralized... not scattered through the codebase"). The
/// upstream property name is, by this service's configuration convention,
/// identical to the domain field name; this table is still the single
/// place that decides it, so a future deployment with differently-named
/// upstream properties only needs to edit this function.
pub fn property_mapping(kind: EntityKind, field: &str) -> Option<(&'static str, WireKind)> {
    use WireKind::*;
    let table: &[(&str, &str, WireKind)] = match kind {
        EntityKind::Character => &[
            ("name", "Name", Title),
            ("kind", "Kind", Select),
            ("tier", "Tier", Select),
            ("primaryAction", "Primary Action", RichText),
            ("logline", "Logline", RichText),
            ("overview", "Overview", RichText),
            ("emotionTowardsCEO", "Emotion towards CEO", RichText),
            ("ownedElements", "Owned Elements", Relation),
            ("associatedElements", "Associated Elements", Relation),
            ("characterPuzzles", "Character Puzzles", Relation),
            ("events", "Events", Relation),
        ],
        EntityKind::Element => &[
            ("name", "Name", Title),
            ("description", "Description/Text", RichText),
            ("basicKind", "Basic Type", Select),
            ("status", "Status", Status),
            ("firstAvailable", "First Available", Select),
            ("narrativeThreads", "Narrative Threads", MultiSelect),
            ("productionNotes", "Production/Puzzle Notes", RichText),
            ("contentLink", "Content Link", Url),
            ("owner", "Owner", Relation),
            ("container", "Container", Relation),
            ("contents", "Contents", Relation),
            ("timelineEvent", "Timeline Event", Relation),
            ("requiredForPuzzles", "Required For (Puzzle)", Relation),
            ("rewardedByPuzzles", "Rewarded By (Puzzle)", Relation),
            ("containerPuzzle", "Container Puzzle", Relation),
            ("filesMedia", "Files & Media", Files),
        ],
        EntityKind::Puzzle => &[
            ("name", "Puzzle", Title),
            ("descriptionSolution", "Description/Solution", RichText),
            ("assetLink", "Asset Link", Url),
            ("puzzleElements", "Puzzle Elements", Relation),
            ("lockedItem", "Locked Item", Relation),
            ("rewards", "Rewards", Relation),
            ("parentItem", "Parent Item", Relation),
            ("subPuzzles", "Sub-Puzzles", Relation),
        ],
        EntityKind::TimelineEvent => &[
            ("description", "Description", Title),
            ("notes", "Notes", RichText),
            ("date", "Date", Date),
            ("charactersInvolved", "Characters Involved", Relation),
            ("memoryEvidence", "Memory/Evidence", Relation),
        ],
    };
    table
        .iter()
        .find(|(f, _, _)| *f == field)
        .map(|(_, name, wk)| (*name, *wk))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_relation_pairs_have_seven_entries() {
        assert_eq!(all_relation_pairs().len(), 7);
    }

    #[test]
    fn every_mutable_relation_field_appears_in_some_pair_or_is_self_referential() {
        // Character.associatedElements and Character.characterPuzzles mirror onto
        // *derived* fields (Element.associatedCharacters, Puzzle.owner) and are
        // intentionally excluded from RELATION_PAIRS: synth.rs computes them as
        // read-only projections instead of writing them back upstream.
        let pairs = all_relation_pairs();
        let forward_fields: Vec<&str> = pairs.iter().map(|p| p.forward.field).collect();
        assert!(forward_fields.contains(&"ownedElements"));
        assert!(forward_fields.contains(&"parentItem"));
    }
}
