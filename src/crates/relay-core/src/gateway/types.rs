//! Wire-adjacent types shared between the Gateway and the Property Decoder.
//! The upstream's property schema is opaque to this crate: property bags are
//! keyed by human-readable name and carry a `kind`-tagged value whose shape
//! this module mirrors closely enough to decode without inventing structure
//! the upstream doesn't have.

use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::collections::HashMap;

/// One page as returned by `retrievePage` / `queryDatabase` / `updatePage` /
/// `createPage`. `parent_database_id` drives database-id-based kind
/// detection (Q1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub parent_database_id: String,
    pub last_edited_time: String,
    pub archived: bool,
    pub properties: PropertyBag,
}

/// A page's full property bag, keyed by human-readable property name.
pub type PropertyBag = HashMap<String, PropertyValue>;

/// One file/media attachment, as decoded straight from the `files` property
/// kind into the domain model's `FileRef`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamFile {
    pub name: String,
    pub url: String,
}

/// A single relation target as the upstream represents it before UUID
/// normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationRef {
    pub id: String,
}

/// Tagged union over the property kinds this service understands (§4.2).
/// Any other `kind` string decodes as `Unknown` and is logged-and-skipped
/// per §9.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyValue {
    Title {
        #[serde(default)]
        plain_text: Vec<String>,
    },
    RichText {
        #[serde(default)]
        plain_text: Vec<String>,
    },
    Select {
        name: Option<String>,
    },
    Status {
        name: Option<String>,
    },
    MultiSelect {
        #[serde(default)]
        names: Vec<String>,
    },
    Relation {
        #[serde(default)]
        targets: Vec<RelationRef>,
        #[serde(default)]
        has_more: bool,
    },
    Rollup {
        #[serde(default)]
        array: Vec<serde_json::Value>,
        number: Option<f64>,
        rollup_type: RollupType,
    },
    Date {
        start: Option<String>,
    },
    Formula {
        value: serde_json::Value,
    },
    Url {
        url: Option<String>,
    },
    Files {
        #[serde(default)]
        files: Vec<UpstreamFile>,
    },
    LastEditedTime {
        value: String,
    },
    CreatedTime {
        value: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollupType {
    Array,
    Number,
}

/// An opaque, pass-through filter (Q3): the service does not interpret
/// filter structure, it forwards whatever the caller supplied.
pub type QueryFilter = Map<String, serde_json::Value>;

#[derive(Debug, Clone)]
pub struct QueryPage {
    pub pages: Vec<Page>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

#[derive(Debug, Clone)]
pub struct PropertyPage {
    pub value: PropertyValue,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}
