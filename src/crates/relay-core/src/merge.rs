//! Entity Merger (§4.8): upstream `updatePage` responses sometimes carry
//! only the just-updated properties. Decoding such a response naively
//! yields empty values for every field the caller didn't touch, which must
//! not be mistaken for the caller clearing them.

use crate::model::schema::mutable_field_names;
use crate::model::{Entity, FieldValue};
use std::collections::BTreeSet;
use tracing::warn;

/// A field whose value dropped from non-empty to empty without being named
/// in the request body — reported as a consistency warning (§7), never
/// fatal.
#[derive(Debug, Clone)]
pub struct ConsistencyWarning {
    pub field: &'static str,
}

pub struct MergeOutcome {
    pub merged: Entity,
    pub warnings: Vec<ConsistencyWarning>,
}

/// Merge a freshly decoded partial entity onto the pre-update snapshot,
/// using the set of field names the caller actually supplied in the
/// request body (by canonical name; alias resolution, if any, happens
/// before this call).
pub fn merge_entity(old: &Entity, decoded_partial: &Entity, requested_fields: &BTreeSet<String>) -> MergeOutcome {
    let kind = old.kind();
    let mut merged = decoded_partial.clone();
    let mut warnings = Vec::new();

    for field in mutable_field_names(kind) {
        let old_value = old.mutable_fields().into_iter().find(|(f, _)| f == field).map(|(_, v)| v);
        let new_value = decoded_partial
            .mutable_fields()
            .into_iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v);

        let (Some(old_value), Some(new_value)) = (old_value, new_value) else {
            continue;
        };

        let requested = requested_fields.contains(*field);

        let resolved = if requested {
            new_value
        } else if new_value.is_empty() && !old_value.is_empty() {
            warnings.push(ConsistencyWarning { field });
            old_value
        } else {
            new_value
        };

        merged.set_mutable_field(field, resolved);
    }

    if !warnings.is_empty() {
        warn!(
            kind = %kind,
            fields = ?warnings.iter().map(|w| w.field).collect::<Vec<_>>(),
            "consistency warning: fields dropped to empty outside the request body"
        );
    }

    MergeOutcome { merged, warnings }
}

impl Entity {
    /// Write one mutable field back onto the entity by canonical name,
    /// the merge-time counterpart to `mutable_fields`/`relation_field`.
    pub fn set_mutable_field(&mut self, field: &str, value: FieldValue) {
        if let FieldValue::Relation(r) = &value {
            self.set_relation_field(field, r.clone());
            return;
        }
        set_scalar_field(self, field, value);
    }
}

fn set_scalar_field(entity: &mut Entity, field: &str, value: FieldValue) {
    use FieldValue::*;
    match (entity, field, value) {
        (Entity::Character(e), "name", Text(v)) => e.name = v,
        (Entity::Character(e), "primaryAction", Text(v)) => e.primary_action = v,
        (Entity::Character(e), "logline", Text(v)) => e.logline = v,
        (Entity::Character(e), "overview", Text(v)) => e.overview = v,
        (Entity::Character(e), "emotionTowardsCEO", Text(v)) => e.emotion_towards_ceo = v,

        (Entity::Element(e), "name", Text(v)) => e.name = v,
        (Entity::Element(e), "description", Text(v)) => {
            e.embedded_metadata = crate::model::metadata::parse(&v);
            e.description = v;
        }
        (Entity::Element(e), "basicKind", Text(v)) => e.basic_kind = v,
        (Entity::Element(e), "status", Text(v)) => e.status = v,
        (Entity::Element(e), "firstAvailable", Text(v)) => e.first_available = v,
        (Entity::Element(e), "narrativeThreads", TextList(v)) => e.narrative_threads = v,
        (Entity::Element(e), "productionNotes", Text(v)) => e.production_notes = v,
        (Entity::Element(e), "contentLink", Text(v)) => {
            e.content_link = if v.is_empty() { None } else { Some(v) }
        }

        (Entity::Puzzle(e), "name", Text(v)) => e.name = v,
        (Entity::Puzzle(e), "descriptionSolution", Text(v)) => e.description_solution = v,
        (Entity::Puzzle(e), "assetLink", Text(v)) => {
            e.asset_link = if v.is_empty() { None } else { Some(v) }
        }

        (Entity::TimelineEvent(e), "description", Text(v)) => e.description = v,
        (Entity::TimelineEvent(e), "notes", Text(v)) => e.notes = v,
        (Entity::TimelineEvent(e), "date", OptDateTime(v)) => e.date = v,

        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Character, CharacterKind, CharacterTier};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_character(owned: Vec<Uuid>) -> Entity {
        Entity::Character(Character {
            id: Uuid::nil(),
            name: "Old Name".into(),
            kind: CharacterKind::Npc,
            tier: CharacterTier::Core,
            primary_action: String::new(),
            logline: String::new(),
            overview: String::new(),
            emotion_towards_ceo: String::new(),
            last_edited: Utc::now(),
            owned_elements: owned,
            associated_elements: vec![],
            character_puzzles: vec![],
            events: vec![],
            connections: vec![],
        })
    }

    #[test]
    fn keeps_old_value_when_not_requested_and_decoded_is_empty() {
        let e1 = Uuid::from_u128(1);
        let old = sample_character(vec![e1]);
        let decoded = sample_character(vec![]);
        let requested: BTreeSet<String> = BTreeSet::new();

        let outcome = merge_entity(&old, &decoded, &requested);
        if let Entity::Character(c) = &outcome.merged {
            assert_eq!(c.owned_elements, vec![e1]);
        } else {
            panic!("expected character");
        }
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].field, "ownedElements");
    }

    #[test]
    fn takes_decoded_value_when_field_was_requested() {
        let e1 = Uuid::from_u128(1);
        let old = sample_character(vec![e1]);
        let decoded = sample_character(vec![]);
        let mut requested = BTreeSet::new();
        requested.insert("ownedElements".to_string());

        let outcome = merge_entity(&old, &decoded, &requested);
        if let Entity::Character(c) = &outcome.merged {
            assert!(c.owned_elements.is_empty());
        } else {
            panic!("expected character");
        }
        assert!(outcome.warnings.is_empty());
    }
}
