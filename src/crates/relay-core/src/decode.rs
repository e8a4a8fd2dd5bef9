//! Property Decoder (§4.2): pure functions mapping one upstream property
//! value into its natural domain shape. Unknown property kinds decode to
//! `DecodedValue::Unknown` and are logged-and-skipped by the caller (§9).
//!
//! Relation pagination is the one decode path that isn't pure — a relation
//! marked `has_more` must issue follow-up `retrieveProperty` calls through
//! the gateway until exhausted (I1's precondition), so it lives in
//! [`decode_relation_complete`] rather than [`decode_property`].

use crate::gateway::{GatewayError, PropertyValue, RollupType, UpstreamGateway};
use crate::model::{uuid_util, FileRef};
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum DecodedValue {
    Text(String),
    TextList(Vec<String>),
    OptionName(Option<String>),
    Relation(Vec<Uuid>),
    RollupArray(Vec<String>),
    RollupNumber(Option<f64>),
    Date(Option<DateTime<Utc>>),
    Formula(serde_json::Value),
    Url(Option<String>),
    Files(Vec<FileRef>),
    Timestamp(Option<DateTime<Utc>>),
    Unknown,
}

impl DecodedValue {
    pub fn as_text(&self) -> String {
        match self {
            DecodedValue::Text(s) => s.clone(),
            _ => String::new(),
        }
    }

    pub fn as_text_list(&self) -> Vec<String> {
        match self {
            DecodedValue::TextList(v) => v.clone(),
            DecodedValue::RollupArray(v) => v.clone(),
            _ => Vec::new(),
        }
    }

    pub fn as_option_name(&self) -> Option<String> {
        match self {
            DecodedValue::OptionName(v) => v.clone(),
            _ => None,
        }
    }

    pub fn as_relation(&self) -> Vec<Uuid> {
        match self {
            DecodedValue::Relation(v) => v.clone(),
            _ => Vec::new(),
        }
    }

    pub fn as_url(&self) -> Option<String> {
        match self {
            DecodedValue::Url(v) => v.clone(),
            DecodedValue::Text(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    pub fn as_files(&self) -> Vec<FileRef> {
        match self {
            DecodedValue::Files(v) => v.clone(),
            _ => Vec::new(),
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            DecodedValue::Timestamp(v) => *v,
            DecodedValue::Date(v) => *v,
            _ => None,
        }
    }
}

fn join_plain_text(parts: &[String]) -> String {
    parts.concat()
}

fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Decode a single property value in isolation, without regard to
/// relation pagination. If the property is absent from the page, callers
/// pass the kind's zero value (this function is never called on an absent
/// property directly — see `decode_or_zero`).
pub fn decode_property(value: &PropertyValue) -> DecodedValue {
    match value {
        PropertyValue::Title { plain_text } | PropertyValue::RichText { plain_text } => {
            DecodedValue::Text(join_plain_text(plain_text))
        }
        PropertyValue::Select { name } | PropertyValue::Status { name } => {
            DecodedValue::OptionName(name.clone())
        }
        PropertyValue::MultiSelect { names } => DecodedValue::TextList(names.clone()),
        PropertyValue::Relation { targets, .. } => {
            let ids = targets
                .iter()
                .filter_map(|r| {
                    let normalized = uuid_util::normalize(&r.id);
                    if normalized.is_none() {
                        warn!(raw_id = %r.id, "dropping unparseable relation target id");
                    }
                    normalized
                })
                .collect();
            DecodedValue::Relation(ids)
        }
        PropertyValue::Rollup {
            array,
            number,
            rollup_type,
        } => match rollup_type {
            RollupType::Array => {
                let decoded = array
                    .iter()
                    .map(|v| match v {
                        serde_json::Value::String(s) => s.clone(),
                        serde_json::Value::Number(n) => n.to_string(),
                        other => other.to_string(),
                    })
                    .collect();
                DecodedValue::RollupArray(decoded)
            }
            RollupType::Number => DecodedValue::RollupNumber(*number),
        },
        PropertyValue::Date { start } => {
            DecodedValue::Date(start.as_deref().and_then(parse_iso8601))
        }
        PropertyValue::Formula { value } => DecodedValue::Formula(value.clone()),
        PropertyValue::Url { url } => DecodedValue::Url(url.clone()),
        PropertyValue::Files { files } => DecodedValue::Files(
            files
                .iter()
                .map(|f| FileRef {
                    name: f.name.clone(),
                    url: f.url.clone(),
                })
                .collect(),
        ),
        PropertyValue::LastEditedTime { value } | PropertyValue::CreatedTime { value } => {
            DecodedValue::Timestamp(parse_iso8601(value))
        }
        PropertyValue::Unknown => DecodedValue::Unknown,
    }
}

/// Decode a relation property, completing pagination if the upstream
/// reported `has_more` (§4.2, I1). `property_id` is the upstream's internal
/// property identifier used for `retrieveProperty` follow-ups — by
/// convention in this service it is the same string as the property name.
pub async fn decode_relation_complete(
    gateway: &dyn UpstreamGateway,
    page_id: &str,
    property_id: &str,
    value: &PropertyValue,
) -> Result<Vec<Uuid>, GatewayError> {
    let (mut ids, mut has_more, mut cursor) = match value {
        PropertyValue::Relation { targets, has_more } => {
            let ids: Vec<Uuid> = targets
                .iter()
                .filter_map(|r| uuid_util::normalize(&r.id))
                .collect();
            (ids, *has_more, None::<String>)
        }
        _ => return Ok(Vec::new()),
    };

    while has_more {
        let page = gateway
            .retrieve_property(page_id, property_id, cursor.as_deref())
            .await?;
        if let DecodedValue::Relation(more) = decode_property(&page.value) {
            ids.extend(more);
        }
        has_more = page.has_more;
        cursor = page.next_cursor;
    }

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::types::RelationRef;

    #[test]
    fn decodes_title_and_rich_text_as_concatenated_text() {
        let v = PropertyValue::Title {
            plain_text: vec!["Hello, ".to_string(), "world".to_string()],
        };
        assert_eq!(decode_property(&v).as_text(), "Hello, world");
    }

    #[test]
    fn decodes_absent_select_as_none() {
        let v = PropertyValue::Select { name: None };
        assert_eq!(decode_property(&v).as_option_name(), None);
    }

    #[test]
    fn decodes_relation_without_pagination() {
        let v = PropertyValue::Relation {
            targets: vec![RelationRef {
                id: "a1a1a1a1-0000-0000-0000-000000000001".to_string(),
            }],
            has_more: false,
        };
        let ids = decode_property(&v).as_relation();
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn drops_unparseable_relation_targets() {
        let v = PropertyValue::Relation {
            targets: vec![RelationRef {
                id: "not-a-uuid".to_string(),
            }],
            has_more: false,
        };
        assert!(decode_property(&v).as_relation().is_empty());
    }

    #[test]
    fn decodes_number_rollup() {
        let v = PropertyValue::Rollup {
            array: vec![],
            number: Some(4.0),
            rollup_type: RollupType::Number,
        };
        matches!(decode_property(&v), DecodedValue::RollupNumber(Some(n)) if n == 4.0);
    }

    #[test]
    fn unknown_kind_decodes_to_unknown() {
        let v = PropertyValue::Unknown;
        matches!(decode_property(&v), DecodedValue::Unknown);
    }
}
