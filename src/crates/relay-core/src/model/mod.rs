//! Domain model: the four entity kinds, the generic value types used by
//! kind-agnostic pipeline stages, the embedded-metadata marker parser, UUID
//! normalization, and the relation/field schema tables.

pub mod entity;
pub mod metadata;
pub mod schema;
pub mod uuid_util;
pub mod value;

pub use entity::{
    CharacterKind, CharacterTier, Entity, EntityKind, FileRef,
};
pub use metadata::{EmbeddedMetadata, GroupMarker, MemoryType};
pub use schema::{
    all_relation_pairs, mutable_field_names, mutable_relation_field_names, property_mapping,
    RelationPair, RelationSide, WireKind,
};
pub use value::{multiset_eq, FieldValue, RelationValue};

pub use entity::{Character, Element, Puzzle, TimelineEvent};
