//! Entity Transformer (§4.3): maps a decoded page's property bag, by name,
//! onto the typed domain structs in [`crate::model::entity`]. The name
//! mapping itself lives in [`crate::model::schema::property_mapping`] — this
//! module only walks that table and dispatches to the right decoder.

use crate::decode::{decode_property, decode_relation_complete, DecodedValue};
use crate::gateway::{GatewayError, Page, PropertyValue, UpstreamGateway};
use crate::model::metadata;
use crate::model::schema::property_mapping;
use crate::model::{
    Character, CharacterKind, CharacterTier, Element, Entity, EntityKind, Puzzle, TimelineEvent,
};
use crate::model::uuid_util;
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

fn lookup<'a>(page: &'a Page, name: &str) -> Option<&'a PropertyValue> {
    page.properties.get(name)
}

/// Decode one field, applying the documented "absent property" zero-value
/// policy (§4.2): a missing property behaves exactly like a present-but-
/// empty one at this layer; distinguishing "not present in this response"
/// from "explicitly cleared" is the Entity Merger's job (§4.8), not this
/// one's.
async fn decode_field(
    gateway: &dyn UpstreamGateway,
    page: &Page,
    kind: EntityKind,
    field: &str,
) -> Result<DecodedValue, GatewayError> {
    let Some((name, wire_kind)) = property_mapping(kind, field) else {
        return Ok(DecodedValue::Unknown);
    };
    let Some(value) = lookup(page, name) else {
        return Ok(zero_value(wire_kind));
    };

    if matches!(value, PropertyValue::Relation { .. }) {
        let ids = decode_relation_complete(gateway, &page.id, name, value).await?;
        return Ok(DecodedValue::Relation(ids));
    }

    Ok(decode_property(value))
}

fn zero_value(wire_kind: crate::model::WireKind) -> DecodedValue {
    use crate::model::WireKind::*;
    match wire_kind {
        Title | RichText => DecodedValue::Text(String::new()),
        Select | Status => DecodedValue::OptionName(None),
        MultiSelect => DecodedValue::TextList(Vec::new()),
        Relation => DecodedValue::Relation(Vec::new()),
        Url => DecodedValue::Url(None),
        Date => DecodedValue::Date(None),
        Files => DecodedValue::Files(Vec::new()),
    }
}

fn entity_id(page: &Page) -> Uuid {
    uuid_util::normalize(&page.id).unwrap_or_else(|| {
        warn!(raw_id = %page.id, "page id did not normalize to a UUID, using nil");
        Uuid::nil()
    })
}

fn last_edited(page: &Page) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&page.last_edited_time)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            warn!(raw = %page.last_edited_time, "page lastEditedTime did not parse, defaulting to epoch");
            chrono::DateTime::<Utc>::from_timestamp(0, 0).unwrap()
        })
}

pub async fn transform_character(
    gateway: &dyn UpstreamGateway,
    page: &Page,
) -> Result<Character, GatewayError> {
    let k = EntityKind::Character;
    let kind_name = decode_field(gateway, page, k, "kind").await?.as_option_name();
    let tier_name = decode_field(gateway, page, k, "tier").await?.as_option_name();

    Ok(Character {
        id: entity_id(page),
        name: decode_field(gateway, page, k, "name").await?.as_text(),
        kind: match kind_name.as_deref() {
            Some("Player") => CharacterKind::Player,
            _ => CharacterKind::Npc,
        },
        tier: match tier_name.as_deref() {
            Some("Secondary") => CharacterTier::Secondary,
            Some("Tertiary") => CharacterTier::Tertiary,
            _ => CharacterTier::Core,
        },
        primary_action: decode_field(gateway, page, k, "primaryAction").await?.as_text(),
        logline: decode_field(gateway, page, k, "logline").await?.as_text(),
        overview: decode_field(gateway, page, k, "overview").await?.as_text(),
        emotion_towards_ceo: decode_field(gateway, page, k, "emotionTowardsCEO")
            .await?
            .as_text(),
        last_edited: last_edited(page),
        owned_elements: decode_field(gateway, page, k, "ownedElements").await?.as_relation(),
        associated_elements: decode_field(gateway, page, k, "associatedElements")
            .await?
            .as_relation(),
        character_puzzles: decode_field(gateway, page, k, "characterPuzzles")
            .await?
            .as_relation(),
        events: decode_field(gateway, page, k, "events").await?.as_relation(),
        connections: Vec::new(),
    })
}

pub async fn transform_element(
    gateway: &dyn UpstreamGateway,
    page: &Page,
) -> Result<Element, GatewayError> {
    let k = EntityKind::Element;
    let description = decode_field(gateway, page, k, "description").await?.as_text();
    let owner = decode_field(gateway, page, k, "owner").await?.as_relation();
    let contents = decode_field(gateway, page, k, "contents").await?.as_relation();

    Ok(Element {
        id: entity_id(page),
        name: decode_field(gateway, page, k, "name").await?.as_text(),
        description: description.clone(),
        basic_kind: decode_field(gateway, page, k, "basicKind")
            .await?
            .as_option_name()
            .unwrap_or_default(),
        status: decode_field(gateway, page, k, "status")
            .await?
            .as_option_name()
            .unwrap_or_default(),
        first_available: decode_field(gateway, page, k, "firstAvailable")
            .await?
            .as_option_name()
            .unwrap_or_default(),
        narrative_threads: decode_field(gateway, page, k, "narrativeThreads")
            .await?
            .as_text_list(),
        production_notes: decode_field(gateway, page, k, "productionNotes").await?.as_text(),
        content_link: decode_field(gateway, page, k, "contentLink").await?.as_url(),
        files_media: decode_field(gateway, page, k, "filesMedia").await?.as_files(),
        embedded_metadata: metadata::parse(&description),
        last_edited: last_edited(page),
        owner: owner.first().copied(),
        container: decode_field(gateway, page, k, "container")
            .await?
            .as_relation()
            .first()
            .copied(),
        contents,
        timeline_event: decode_field(gateway, page, k, "timelineEvent")
            .await?
            .as_relation()
            .first()
            .copied(),
        required_for_puzzles: decode_field(gateway, page, k, "requiredForPuzzles")
            .await?
            .as_relation(),
        rewarded_by_puzzles: decode_field(gateway, page, k, "rewardedByPuzzles")
            .await?
            .as_relation(),
        container_puzzle: decode_field(gateway, page, k, "containerPuzzle")
            .await?
            .as_relation()
            .first()
            .copied(),
        associated_characters: Vec::new(),
        puzzle_chain: Vec::new(),
        is_container: false,
    })
}

pub async fn transform_puzzle(
    gateway: &dyn UpstreamGateway,
    page: &Page,
) -> Result<Puzzle, GatewayError> {
    let k = EntityKind::Puzzle;
    Ok(Puzzle {
        id: entity_id(page),
        name: decode_field(gateway, page, k, "name").await?.as_text(),
        description_solution: decode_field(gateway, page, k, "descriptionSolution")
            .await?
            .as_text(),
        asset_link: decode_field(gateway, page, k, "assetLink").await?.as_url(),
        last_edited: last_edited(page),
        puzzle_elements: decode_field(gateway, page, k, "puzzleElements").await?.as_relation(),
        locked_item: decode_field(gateway, page, k, "lockedItem")
            .await?
            .as_relation()
            .first()
            .copied(),
        rewards: decode_field(gateway, page, k, "rewards").await?.as_relation(),
        parent_item: decode_field(gateway, page, k, "parentItem")
            .await?
            .as_relation()
            .first()
            .copied(),
        sub_puzzles: decode_field(gateway, page, k, "subPuzzles").await?.as_relation(),
        owner: None,
        story_reveals: Vec::new(),
        timing: Vec::new(),
        narrative_threads: Vec::new(),
    })
}

pub async fn transform_timeline_event(
    gateway: &dyn UpstreamGateway,
    page: &Page,
) -> Result<TimelineEvent, GatewayError> {
    let k = EntityKind::TimelineEvent;
    Ok(TimelineEvent {
        id: entity_id(page),
        name: String::new(),
        description: decode_field(gateway, page, k, "description").await?.as_text(),
        date: decode_field(gateway, page, k, "date").await?.as_timestamp(),
        notes: decode_field(gateway, page, k, "notes").await?.as_text(),
        last_edited: last_edited(page),
        characters_involved: decode_field(gateway, page, k, "charactersInvolved")
            .await?
            .as_relation(),
        memory_evidence: decode_field(gateway, page, k, "memoryEvidence").await?.as_relation(),
        mem_types: Vec::new(),
        associated_puzzles: Vec::new(),
    })
}

/// Dispatch to the right per-kind transformer and wrap the result in the
/// tagged [`Entity`] union. `kind` is decided by the caller from the page's
/// parent database id (Q1's database-id-based kind detection).
pub async fn transform_page(
    gateway: &dyn UpstreamGateway,
    kind: EntityKind,
    page: &Page,
) -> Result<Entity, GatewayError> {
    Ok(match kind {
        EntityKind::Character => Entity::Character(transform_character(gateway, page).await?),
        EntityKind::Element => Entity::Element(transform_element(gateway, page).await?),
        EntityKind::Puzzle => Entity::Puzzle(transform_puzzle(gateway, page).await?),
        EntityKind::TimelineEvent => {
            Entity::TimelineEvent(transform_timeline_event(gateway, page).await?)
        }
    })
}
