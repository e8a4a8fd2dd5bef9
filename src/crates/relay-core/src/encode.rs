//! Property Encoder: the inverse of the Property Decoder (§4.2), turning
//! domain field values back into the upstream's wire-tagged property shape
//! so they can be sent to `updatePage`/`createPage`.
//!
//! `description` (and with it, every `SF_*` marker) is always written back
//! verbatim as plain text — this module never re-serializes
//! `EmbeddedMetadata` itself, which is what keeps decode → encode
//! byte-for-byte (T6); see [`crate::model::metadata`].

use crate::gateway::types::RelationRef;
use crate::gateway::PropertyValue;
use crate::model::schema::{property_mapping, WireKind};
use crate::model::{uuid_util, Entity, EntityKind, FieldValue};
use serde_json::Value;
use std::collections::BTreeSet;

/// Encode one field into its upstream property name and wire-tagged value.
/// Returns `None` if the field has no schema mapping or the `FieldValue`
/// variant doesn't match the field's wire kind (a programmer error
/// elsewhere, logged by the caller rather than panicking here).
pub fn encode_field(kind: EntityKind, field: &str, value: &FieldValue) -> Option<(&'static str, PropertyValue)> {
    let (name, wire_kind) = property_mapping(kind, field)?;

    let encoded = match (wire_kind, value) {
        (WireKind::Title, FieldValue::Text(s)) => PropertyValue::Title {
            plain_text: text_parts(s),
        },
        (WireKind::RichText, FieldValue::Text(s)) => PropertyValue::RichText {
            plain_text: text_parts(s),
        },
        (WireKind::Select, FieldValue::Text(s)) => PropertyValue::Select {
            name: non_empty(s),
        },
        (WireKind::Status, FieldValue::Text(s)) => PropertyValue::Status {
            name: non_empty(s),
        },
        (WireKind::MultiSelect, FieldValue::TextList(v)) => PropertyValue::MultiSelect { names: v.clone() },
        (WireKind::Relation, FieldValue::Relation(r)) => PropertyValue::Relation {
            targets: r
                .ids()
                .into_iter()
                .map(|id| RelationRef {
                    id: uuid_util::canonical(&id),
                })
                .collect(),
            has_more: false,
        },
        (WireKind::Url, FieldValue::Text(s)) => PropertyValue::Url { url: non_empty(s) },
        (WireKind::Date, FieldValue::OptDateTime(d)) => PropertyValue::Date {
            start: d.map(|dt| dt.to_rfc3339()),
        },
        _ => return None,
    };

    Some((name, encoded))
}

fn text_parts(s: &str) -> Vec<String> {
    if s.is_empty() {
        Vec::new()
    } else {
        vec![s.to_string()]
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Encode every mutable field on `entity` whose canonical name is in
/// `fields` (the caller-supplied request body's field set) into the JSON
/// `properties` object `updatePage`/`createPage` expect. An empty `fields`
/// set encodes every mutable field (used by `create`, which has no prior
/// state to diff against).
pub fn encode_entity(entity: &Entity, fields: &BTreeSet<String>) -> Value {
    let kind = entity.kind();
    let mut map = serde_json::Map::new();

    for (field, value) in entity.mutable_fields() {
        if !fields.is_empty() && !fields.contains(field) {
            continue;
        }
        if let Some((name, encoded)) = encode_field(kind, field, &value) {
            if let Ok(json) = serde_json::to_value(encoded) {
                map.insert(name.to_string(), json);
            }
        }
    }

    Value::Object(map)
}

/// Encode a single relation field in isolation, used by the Inverse-
/// Relation Maintainer to build a minimal one-property update for a
/// target entity.
pub fn encode_relation_field(kind: EntityKind, field: &str, value: &FieldValue) -> Option<Value> {
    let (name, encoded) = encode_field(kind, field, value)?;
    let json = serde_json::to_value(encoded).ok()?;
    let mut map = serde_json::Map::new();
    map.insert(name.to_string(), json);
    Some(Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RelationValue;
    use uuid::Uuid;

    #[test]
    fn encodes_text_field_as_title() {
        let (name, pv) = encode_field(
            EntityKind::Character,
            "name",
            &FieldValue::Text("Alice".to_string()),
        )
        .unwrap();
        assert_eq!(name, "Name");
        matches!(pv, PropertyValue::Title { .. });
    }

    #[test]
    fn encodes_relation_field_with_canonical_uuids() {
        let id = Uuid::from_u128(7);
        let (_, pv) = encode_field(
            EntityKind::Character,
            "ownedElements",
            &FieldValue::Relation(RelationValue::Multi(vec![id])),
        )
        .unwrap();
        if let PropertyValue::Relation { targets, .. } = pv {
            assert_eq!(targets[0].id, uuid_util::canonical(&id));
        } else {
            panic!("expected relation");
        }
    }

    #[test]
    fn empty_text_encodes_to_none_for_optional_kinds() {
        let (_, pv) = encode_field(EntityKind::Element, "status", &FieldValue::Text(String::new())).unwrap();
        matches!(pv, PropertyValue::Status { name: None });
    }
}
