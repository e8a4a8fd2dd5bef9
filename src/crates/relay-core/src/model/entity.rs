//! The four domain entity kinds (§3) plus the placeholder node type, and
//! the generic accessors that let kind-agnostic code (Merger, Synthesizer,
//! Delta Calculator) read and write fields by name without a `match` on
//! every call site.

use super::metadata::EmbeddedMetadata;
use super::value::{FieldValue, RelationValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Character,
    Element,
    Puzzle,
    TimelineEvent,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Character => "character",
            EntityKind::Element => "element",
            EntityKind::Puzzle => "puzzle",
            EntityKind::TimelineEvent => "timeline_event",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CharacterKind {
    Npc,
    Player,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CharacterTier {
    Core,
    Secondary,
    Tertiary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: Uuid,
    pub name: String,
    pub kind: CharacterKind,
    pub tier: CharacterTier,
    pub primary_action: String,
    pub logline: String,
    pub overview: String,
    pub emotion_towards_ceo: String,
    pub last_edited: DateTime<Utc>,

    // mutable relations
    pub owned_elements: Vec<Uuid>,
    pub associated_elements: Vec<Uuid>,
    pub character_puzzles: Vec<Uuid>,
    pub events: Vec<Uuid>,

    // derived
    pub connections: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub basic_kind: String,
    pub status: String,
    pub first_available: String,
    pub narrative_threads: Vec<String>,
    pub production_notes: String,
    pub content_link: Option<String>,
    pub files_media: Vec<FileRef>,
    pub embedded_metadata: EmbeddedMetadata,
    pub last_edited: DateTime<Utc>,

    // mutable relations
    pub owner: Option<Uuid>,
    pub container: Option<Uuid>,
    pub contents: Vec<Uuid>,
    pub timeline_event: Option<Uuid>,
    pub required_for_puzzles: Vec<Uuid>,
    pub rewarded_by_puzzles: Vec<Uuid>,
    pub container_puzzle: Option<Uuid>,

    // derived
    pub associated_characters: Vec<Uuid>,
    pub puzzle_chain: Vec<Uuid>,
    pub is_container: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Puzzle {
    pub id: Uuid,
    pub name: String,
    pub description_solution: String,
    pub asset_link: Option<String>,
    pub last_edited: DateTime<Utc>,

    // mutable relations
    pub puzzle_elements: Vec<Uuid>,
    pub locked_item: Option<Uuid>,
    pub rewards: Vec<Uuid>,
    pub parent_item: Option<Uuid>,
    pub sub_puzzles: Vec<Uuid>,

    // derived
    pub owner: Option<Uuid>,
    pub story_reveals: Vec<Uuid>,
    pub timing: Vec<String>,
    pub narrative_threads: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub date: Option<DateTime<Utc>>,
    pub notes: String,
    pub last_edited: DateTime<Utc>,

    // mutable relations
    pub characters_involved: Vec<Uuid>,
    pub memory_evidence: Vec<Uuid>,

    // derived
    pub mem_types: Vec<String>,
    pub associated_puzzles: Vec<Uuid>,
}

/// Tagged union over the four entity kinds, used anywhere code needs to
/// hold "some entity" without committing to a kind (synthesis input/output,
/// graph nodes, capture results).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Character(Character),
    Element(Element),
    Puzzle(Puzzle),
    TimelineEvent(TimelineEvent),
}

impl Entity {
    pub fn id(&self) -> Uuid {
        match self {
            Entity::Character(e) => e.id,
            Entity::Element(e) => e.id,
            Entity::Puzzle(e) => e.id,
            Entity::TimelineEvent(e) => e.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Character(_) => EntityKind::Character,
            Entity::Element(_) => EntityKind::Element,
            Entity::Puzzle(_) => EntityKind::Puzzle,
            Entity::TimelineEvent(_) => EntityKind::TimelineEvent,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Entity::Character(e) => e.name.clone(),
            Entity::Element(e) => e.name.clone(),
            Entity::Puzzle(e) => e.name.clone(),
            Entity::TimelineEvent(e) => {
                if e.name.is_empty() {
                    e.description.chars().take(60).collect()
                } else {
                    e.name.clone()
                }
            }
        }
    }

    pub fn last_edited(&self) -> DateTime<Utc> {
        match self {
            Entity::Character(e) => e.last_edited,
            Entity::Element(e) => e.last_edited,
            Entity::Puzzle(e) => e.last_edited,
            Entity::TimelineEvent(e) => e.last_edited,
        }
    }

    /// Read a mutable relation field by its canonical (spec) name. Returns
    /// `None` if the field does not exist on this kind or is not a
    /// relation.
    pub fn relation_field(&self, field: &str) -> Option<RelationValue> {
        use RelationValue::{Multi, Single};
        Some(match (self, field) {
            (Entity::Character(e), "ownedElements") => Multi(e.owned_elements.clone()),
            (Entity::Character(e), "associatedElements") => Multi(e.associated_elements.clone()),
            (Entity::Character(e), "characterPuzzles") => Multi(e.character_puzzles.clone()),
            (Entity::Character(e), "events") => Multi(e.events.clone()),

            (Entity::Element(e), "owner") => Single(e.owner),
            (Entity::Element(e), "container") => Single(e.container),
            (Entity::Element(e), "contents") => Multi(e.contents.clone()),
            (Entity::Element(e), "timelineEvent") => Single(e.timeline_event),
            (Entity::Element(e), "requiredForPuzzles") => Multi(e.required_for_puzzles.clone()),
            (Entity::Element(e), "rewardedByPuzzles") => Multi(e.rewarded_by_puzzles.clone()),
            (Entity::Element(e), "containerPuzzle") => Single(e.container_puzzle),

            (Entity::Puzzle(e), "puzzleElements") => Multi(e.puzzle_elements.clone()),
            (Entity::Puzzle(e), "lockedItem") => Single(e.locked_item),
            (Entity::Puzzle(e), "rewards") => Multi(e.rewards.clone()),
            (Entity::Puzzle(e), "parentItem") => Single(e.parent_item),
            (Entity::Puzzle(e), "subPuzzles") => Multi(e.sub_puzzles.clone()),

            (Entity::TimelineEvent(e), "charactersInvolved") => Multi(e.characters_involved.clone()),
            (Entity::TimelineEvent(e), "memoryEvidence") => Multi(e.memory_evidence.clone()),

            _ => return None,
        })
    }

    /// Write a mutable relation field by its canonical name. No-op (but
    /// logged by the caller) if the field does not exist on this kind.
    pub fn set_relation_field(&mut self, field: &str, value: RelationValue) {
        match (self, field, value) {
            (Entity::Character(e), "ownedElements", RelationValue::Multi(v)) => e.owned_elements = v,
            (Entity::Character(e), "associatedElements", RelationValue::Multi(v)) => {
                e.associated_elements = v
            }
            (Entity::Character(e), "characterPuzzles", RelationValue::Multi(v)) => {
                e.character_puzzles = v
            }
            (Entity::Character(e), "events", RelationValue::Multi(v)) => e.events = v,

            (Entity::Element(e), "owner", RelationValue::Single(v)) => e.owner = v,
            (Entity::Element(e), "container", RelationValue::Single(v)) => e.container = v,
            (Entity::Element(e), "contents", RelationValue::Multi(v)) => e.contents = v,
            (Entity::Element(e), "timelineEvent", RelationValue::Single(v)) => e.timeline_event = v,
            (Entity::Element(e), "requiredForPuzzles", RelationValue::Multi(v)) => {
                e.required_for_puzzles = v
            }
            (Entity::Element(e), "rewardedByPuzzles", RelationValue::Multi(v)) => {
                e.rewarded_by_puzzles = v
            }
            (Entity::Element(e), "containerPuzzle", RelationValue::Single(v)) => {
                e.container_puzzle = v
            }

            (Entity::Puzzle(e), "puzzleElements", RelationValue::Multi(v)) => e.puzzle_elements = v,
            (Entity::Puzzle(e), "lockedItem", RelationValue::Single(v)) => e.locked_item = v,
            (Entity::Puzzle(e), "rewards", RelationValue::Multi(v)) => e.rewards = v,
            (Entity::Puzzle(e), "parentItem", RelationValue::Single(v)) => e.parent_item = v,
            (Entity::Puzzle(e), "subPuzzles", RelationValue::Multi(v)) => e.sub_puzzles = v,

            (Entity::TimelineEvent(e), "charactersInvolved", RelationValue::Multi(v)) => {
                e.characters_involved = v
            }
            (Entity::TimelineEvent(e), "memoryEvidence", RelationValue::Multi(v)) => {
                e.memory_evidence = v
            }

            _ => tracing::debug!(field, "set_relation_field: no matching field for this kind"),
        }
    }

    /// Every mutable field (scalar or relation) on this entity, keyed by
    /// canonical name, for the Delta Calculator's property-level comparator
    /// (§4.10 rule 4) and the Entity Merger (§4.8). Derived fields (§3) are
    /// never included here — see [`Entity::derived_fields`].
    pub fn mutable_fields(&self) -> Vec<(&'static str, FieldValue)> {
        use FieldValue::*;
        use RelationValue::{Multi, Single};
        match self {
            Entity::Character(e) => vec![
                ("name", Text(e.name.clone())),
                ("kind", Text(format!("{:?}", e.kind))),
                ("tier", Text(format!("{:?}", e.tier))),
                ("primaryAction", Text(e.primary_action.clone())),
                ("logline", Text(e.logline.clone())),
                ("overview", Text(e.overview.clone())),
                ("emotionTowardsCEO", Text(e.emotion_towards_ceo.clone())),
                ("ownedElements", Relation(Multi(e.owned_elements.clone()))),
                (
                    "associatedElements",
                    Relation(Multi(e.associated_elements.clone())),
                ),
                (
                    "characterPuzzles",
                    Relation(Multi(e.character_puzzles.clone())),
                ),
                ("events", Relation(Multi(e.events.clone()))),
            ],
            Entity::Element(e) => vec![
                ("name", Text(e.name.clone())),
                ("description", Text(e.description.clone())),
                ("basicKind", Text(e.basic_kind.clone())),
                ("status", Text(e.status.clone())),
                ("firstAvailable", Text(e.first_available.clone())),
                ("narrativeThreads", TextList(e.narrative_threads.clone())),
                ("productionNotes", Text(e.production_notes.clone())),
                (
                    "contentLink",
                    Text(e.content_link.clone().unwrap_or_default()),
                ),
                ("owner", Relation(Single(e.owner))),
                ("container", Relation(Single(e.container))),
                ("contents", Relation(Multi(e.contents.clone()))),
                ("timelineEvent", Relation(Single(e.timeline_event))),
                (
                    "requiredForPuzzles",
                    Relation(Multi(e.required_for_puzzles.clone())),
                ),
                (
                    "rewardedByPuzzles",
                    Relation(Multi(e.rewarded_by_puzzles.clone())),
                ),
                ("containerPuzzle", Relation(Single(e.container_puzzle))),
            ],
            Entity::Puzzle(e) => vec![
                ("name", Text(e.name.clone())),
                ("descriptionSolution", Text(e.description_solution.clone())),
                (
                    "assetLink",
                    Text(e.asset_link.clone().unwrap_or_default()),
                ),
                ("puzzleElements", Relation(Multi(e.puzzle_elements.clone()))),
                ("lockedItem", Relation(Single(e.locked_item))),
                ("rewards", Relation(Multi(e.rewards.clone()))),
                ("parentItem", Relation(Single(e.parent_item))),
                ("subPuzzles", Relation(Multi(e.sub_puzzles.clone()))),
            ],
            Entity::TimelineEvent(e) => vec![
                ("description", Text(e.description.clone())),
                ("notes", Text(e.notes.clone())),
                ("date", OptDateTime(e.date)),
                (
                    "charactersInvolved",
                    Relation(Multi(e.characters_involved.clone())),
                ),
                (
                    "memoryEvidence",
                    Relation(Multi(e.memory_evidence.clone())),
                ),
            ],
        }
    }

    /// Derived fields, listed for documentation/testing only — §9 forbids
    /// comparing these for equality (T9, S6).
    pub fn derived_fields(&self) -> Vec<(&'static str, FieldValue)> {
        use FieldValue::*;
        use RelationValue::{Multi, Single};
        match self {
            Entity::Character(e) => vec![("connections", Relation(Multi(e.connections.clone())))],
            Entity::Element(e) => vec![
                (
                    "associatedCharacters",
                    Relation(Multi(e.associated_characters.clone())),
                ),
                ("puzzleChain", Relation(Multi(e.puzzle_chain.clone()))),
                ("isContainer", Bool(e.is_container)),
            ],
            Entity::Puzzle(e) => vec![
                ("owner", Relation(Single(e.owner))),
                ("storyReveals", Relation(Multi(e.story_reveals.clone()))),
                ("timing", TextList(e.timing.clone())),
                ("narrativeThreads", TextList(e.narrative_threads.clone())),
            ],
            Entity::TimelineEvent(e) => vec![
                ("memTypes", TextList(e.mem_types.clone())),
                (
                    "associatedPuzzles",
                    Relation(Multi(e.associated_puzzles.clone())),
                ),
            ],
        }
    }

    /// An all-default entity of `kind` carrying only `id`, used as the
    /// synthetic "new = {}" state the Inverse-Relation Maintainer runs
    /// against for an archive (§4.7) and as the synthetic "old" state for a
    /// freshly created entity, whose relations were all empty a moment ago.
    pub fn blank(kind: EntityKind, id: Uuid) -> Entity {
        let last_edited = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        match kind {
            EntityKind::Character => Entity::Character(Character {
                id,
                name: String::new(),
                kind: CharacterKind::Npc,
                tier: CharacterTier::Core,
                primary_action: String::new(),
                logline: String::new(),
                overview: String::new(),
                emotion_towards_ceo: String::new(),
                last_edited,
                owned_elements: Vec::new(),
                associated_elements: Vec::new(),
                character_puzzles: Vec::new(),
                events: Vec::new(),
                connections: Vec::new(),
            }),
            EntityKind::Element => Entity::Element(Element {
                id,
                name: String::new(),
                description: String::new(),
                basic_kind: String::new(),
                status: String::new(),
                first_available: String::new(),
                narrative_threads: Vec::new(),
                production_notes: String::new(),
                content_link: None,
                files_media: Vec::new(),
                embedded_metadata: EmbeddedMetadata::default(),
                last_edited,
                owner: None,
                container: None,
                contents: Vec::new(),
                timeline_event: None,
                required_for_puzzles: Vec::new(),
                rewarded_by_puzzles: Vec::new(),
                container_puzzle: None,
                associated_characters: Vec::new(),
                puzzle_chain: Vec::new(),
                is_container: false,
            }),
            EntityKind::Puzzle => Entity::Puzzle(Puzzle {
                id,
                name: String::new(),
                description_solution: String::new(),
                asset_link: None,
                last_edited,
                puzzle_elements: Vec::new(),
                locked_item: None,
                rewards: Vec::new(),
                parent_item: None,
                sub_puzzles: Vec::new(),
                owner: None,
                story_reveals: Vec::new(),
                timing: Vec::new(),
                narrative_threads: Vec::new(),
            }),
            EntityKind::TimelineEvent => Entity::TimelineEvent(TimelineEvent {
                id,
                name: String::new(),
                description: String::new(),
                date: None,
                notes: String::new(),
                last_edited,
                characters_involved: Vec::new(),
                memory_evidence: Vec::new(),
                mem_types: Vec::new(),
                associated_puzzles: Vec::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_entity_carries_only_its_id() {
        let id = Uuid::from_u128(42);
        let Entity::Puzzle(p) = Entity::blank(EntityKind::Puzzle, id) else {
            panic!("expected puzzle");
        };
        assert_eq!(p.id, id);
        assert!(p.rewards.is_empty());
        assert!(p.puzzle_elements.is_empty());
    }
}
