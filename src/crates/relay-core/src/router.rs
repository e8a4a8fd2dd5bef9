//! Entity Router (§4.7): the generic per-kind CRUD contract — list, get,
//! create, update, archive — composed from every other module in this
//! crate. A single trait, [`EntityService`], carries the behavior as
//! default method bodies in terms of the free functions below; one
//! zero-sized struct per entity kind implements it by naming which kind it
//! is, in the spirit of a shared behavior trait with a per-entity-kind
//! type implementing it.
//!
//! This module never constructs an HTTP response. Every return type here
//! is a plain Rust struct; the advisory `X-Cache-Hit` / `X-*-Version`
//! header values in §6 are fields on these structs for an embedding HTTP
//! layer to attach, not headers this crate writes itself.

use crate::cache::Cache;
use crate::capture::{self, CapturedGraph};
use crate::config::DatabaseIds;
use crate::delta::{calculate_delta, Delta};
use crate::encode::{encode_entity, encode_relation_field};
use crate::gateway::{QueryFilter, UpstreamGateway};
use crate::graph::{build_graph, Graph};
use crate::inverse::{maintain_inverse_relations, InverseUpdateSummary};
use crate::merge::{merge_entity, ConsistencyWarning};
use crate::model::{Entity, EntityKind, FieldValue};
use crate::synth::synthesize;
use crate::transform::transform_page;
use crate::{RelayError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Everything an [`EntityService`] impl needs, held by the embedding
/// binary and handed to every call. Cheap to clone — every field is an
/// `Arc` or small `Copy`/owned value.
#[derive(Clone)]
pub struct RouterContext {
    pub gateway: Arc<dyn UpstreamGateway>,
    pub cache: Arc<Cache>,
    pub database_ids: DatabaseIds,
}

#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub limit: u32,
    pub cursor: Option<String>,
    pub filter: Option<QueryFilter>,
    pub bypass_cache: bool,
}

impl ListRequest {
    fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, 100)
    }
}

#[derive(Debug, Clone)]
pub struct ListResponse {
    pub data: Vec<Entity>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
    pub cache_hit: bool,
    pub global_version: u64,
}

#[derive(Debug, Clone)]
pub struct GetResponse {
    pub entity: Entity,
    pub cache_hit: bool,
    pub entity_version: Option<u64>,
}

/// The `_parentRelation` hint from §4.7's create contract: on success, the
/// parent's own relation field is atomically updated to point at the
/// newly created entity.
#[derive(Debug, Clone)]
pub struct ParentRelation {
    pub parent_kind: EntityKind,
    pub parent_id: Uuid,
    pub field_key: String,
}

#[derive(Debug, Clone)]
pub struct UpdateResponse {
    pub entity: Entity,
    pub delta: Option<Delta>,
    pub warnings: Vec<ConsistencyWarning>,
    pub inverse_summary: InverseUpdateSummary,
}

#[derive(Debug, Clone)]
pub struct ArchiveResponse {
    pub ok: bool,
    pub delta: Option<Delta>,
    pub inverse_summary: InverseUpdateSummary,
}

#[derive(Debug, Clone)]
pub struct GraphResponse {
    pub graph: Graph,
    pub cache_hit: bool,
    pub global_version: u64,
}

/// `§4.6`'s "sorted filter params" requirement, applied once here instead
/// of at every call site.
fn sorted_filter_string(filter: Option<&QueryFilter>) -> String {
    let Some(filter) = filter else { return String::new() };
    let sorted: BTreeMap<&String, &serde_json::Value> = filter.iter().collect();
    serde_json::to_string(&sorted).unwrap_or_default()
}

/// The generic per-kind CRUD contract (§4.7). Default method bodies
/// delegate to the free functions in this module; implementors only need
/// to say which [`EntityKind`] they are.
#[async_trait]
pub trait EntityService: Send + Sync {
    fn kind(&self) -> EntityKind;

    async fn list(&self, ctx: &RouterContext, req: ListRequest) -> Result<ListResponse> {
        list_entities(ctx, self.kind(), req).await
    }

    async fn get(&self, ctx: &RouterContext, id: Uuid, bypass_cache: bool) -> Result<GetResponse> {
        get_entity(ctx, self.kind(), id, bypass_cache).await
    }

    async fn create(&self, ctx: &RouterContext, partial: Entity, parent_relation: Option<ParentRelation>) -> Result<Entity> {
        create_entity(ctx, self.kind(), partial, parent_relation).await
    }

    async fn update(
        &self,
        ctx: &RouterContext,
        id: Uuid,
        partial: Entity,
        requested_fields: BTreeSet<String>,
        if_version: Option<u64>,
    ) -> Result<UpdateResponse> {
        update_entity(ctx, self.kind(), id, partial, requested_fields, if_version).await
    }

    async fn archive(&self, ctx: &RouterContext, id: Uuid) -> Result<ArchiveResponse> {
        archive_entity(ctx, self.kind(), id).await
    }
}

pub struct CharacterService;
impl EntityService for CharacterService {
    fn kind(&self) -> EntityKind {
        EntityKind::Character
    }
}

pub struct ElementService;
impl EntityService for ElementService {
    fn kind(&self) -> EntityKind {
        EntityKind::Element
    }
}

pub struct PuzzleService;
impl EntityService for PuzzleService {
    fn kind(&self) -> EntityKind {
        EntityKind::Puzzle
    }
}

pub struct TimelineEventService;
impl EntityService for TimelineEventService {
    fn kind(&self) -> EntityKind {
        EntityKind::TimelineEvent
    }
}

/// `GetCompleteGraph(bypassCache?) → (nodes, edges, metadata)` (§6). Not
/// part of [`EntityService`] — it spans all four kinds rather than one.
pub async fn get_complete_graph(ctx: &RouterContext, bypass_cache: bool) -> Result<GraphResponse> {
    let cache_key = Cache::graph_key();
    if !bypass_cache {
        if let Some(cached) = ctx.cache.get(cache_key).await {
            if let Ok(graph) = serde_json::from_value::<Graph>(cached) {
                return Ok(GraphResponse {
                    graph,
                    cache_hit: true,
                    global_version: ctx.cache.global_version(),
                });
            }
        }
    }

    let mut entities = Vec::new();
    for kind in [EntityKind::Character, EntityKind::Element, EntityKind::Puzzle, EntityKind::TimelineEvent] {
        entities.extend(fetch_all(ctx, kind).await?);
    }
    synthesize(&mut entities);
    let graph = build_graph(&entities);

    if let Ok(value) = serde_json::to_value(&graph) {
        ctx.cache.set(cache_key, value).await;
    }

    Ok(GraphResponse {
        graph,
        cache_hit: false,
        global_version: ctx.cache.global_version(),
    })
}

/// Paginate a whole database to exhaustion, used only by the graph
/// endpoint (list respects the caller's `limit`; the graph always wants
/// everything).
async fn fetch_all(ctx: &RouterContext, kind: EntityKind) -> Result<Vec<Entity>> {
    let db_id = ctx.database_ids.database_for_kind(kind).to_string();
    let mut entities = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = ctx
            .gateway
            .query_database(&db_id, cursor.as_deref(), 100, None)
            .await
            .map_err(RelayError::from)?;
        for raw_page in &page.pages {
            entities.push(transform_page(ctx.gateway.as_ref(), kind, raw_page).await.map_err(RelayError::from)?);
        }
        if !page.has_more {
            break;
        }
        cursor = page.next_cursor;
    }
    Ok(entities)
}

async fn list_entities(ctx: &RouterContext, kind: EntityKind, req: ListRequest) -> Result<ListResponse> {
    let limit = req.effective_limit();
    let filter_sorted = sorted_filter_string(req.filter.as_ref());
    let cache_key = Cache::collection_key(kind, limit, req.cursor.as_deref(), &filter_sorted);

    if !req.bypass_cache {
        if let Some(cached) = ctx.cache.get(&cache_key).await {
            if let Ok(cached) = serde_json::from_value::<CachedList>(cached) {
                return Ok(ListResponse {
                    data: cached.data,
                    next_cursor: cached.next_cursor,
                    has_more: cached.has_more,
                    cache_hit: true,
                    global_version: ctx.cache.global_version(),
                });
            }
        }
    }

    let db_id = ctx.database_ids.database_for_kind(kind).to_string();
    let mut data = Vec::new();
    let mut cursor = req.cursor.clone();
    let mut has_more = false;
    let mut next_cursor = None;

    while (data.len() as u32) < limit {
        let remaining = limit - data.len() as u32;
        let page_size = remaining.min(100);
        let query = ctx
            .gateway
            .query_database(&db_id, cursor.as_deref(), page_size, req.filter.as_ref())
            .await
            .map_err(RelayError::from)?;

        for raw_page in &query.pages {
            data.push(transform_page(ctx.gateway.as_ref(), kind, raw_page).await.map_err(RelayError::from)?);
            if data.len() as u32 >= limit {
                break;
            }
        }

        has_more = query.has_more;
        next_cursor = query.next_cursor;
        cursor = next_cursor.clone();
        if !has_more {
            break;
        }
    }

    let cached = CachedList {
        data: data.clone(),
        next_cursor: next_cursor.clone(),
        has_more,
    };
    if let Ok(value) = serde_json::to_value(&cached) {
        ctx.cache.set(cache_key, value).await;
    }

    Ok(ListResponse {
        data,
        next_cursor,
        has_more,
        cache_hit: false,
        global_version: ctx.cache.global_version(),
    })
}

#[derive(serde::Serialize, serde::Deserialize)]
struct CachedList {
    data: Vec<Entity>,
    next_cursor: Option<String>,
    has_more: bool,
}

async fn get_entity(ctx: &RouterContext, kind: EntityKind, id: Uuid, bypass_cache: bool) -> Result<GetResponse> {
    let cache_key = Cache::entity_key(kind, id, 0, None);
    if !bypass_cache {
        if let Some(cached) = ctx.cache.get(&cache_key).await {
            if let Ok(entity) = serde_json::from_value::<Entity>(cached) {
                return Ok(GetResponse {
                    entity,
                    cache_hit: true,
                    entity_version: ctx.cache.entity_version(kind, id).await,
                });
            }
        }
    }

    let entity = fetch_one(ctx, kind, id).await?;
    if let Ok(value) = serde_json::to_value(&entity) {
        ctx.cache.set(cache_key, value).await;
    }

    Ok(GetResponse {
        entity,
        cache_hit: false,
        entity_version: ctx.cache.entity_version(kind, id).await,
    })
}

async fn fetch_one(ctx: &RouterContext, kind: EntityKind, id: Uuid) -> Result<Entity> {
    let page = ctx.gateway.retrieve_page(&id.to_string()).await.map_err(RelayError::from)?;
    transform_page(ctx.gateway.as_ref(), kind, &page).await.map_err(RelayError::from)
}

async fn create_entity(ctx: &RouterContext, kind: EntityKind, partial: Entity, parent_relation: Option<ParentRelation>) -> Result<Entity> {
    let db_id = ctx.database_ids.database_for_kind(kind);
    // Empty field set: encode every mutable field, there is no prior
    // request-body-vs-cleared-field ambiguity on a brand new page.
    let properties = encode_entity(&partial, &BTreeSet::new());
    let page = ctx.gateway.create_page(db_id, &properties).await.map_err(RelayError::from)?;
    let created = transform_page(ctx.gateway.as_ref(), kind, &page).await.map_err(RelayError::from)?;

    if let Some(parent) = &parent_relation {
        if let Err(e) = attach_to_parent(ctx, parent, created.id()).await {
            warn!(id = %created.id(), parent = %parent.parent_id, error = %e, "create: parent attach failed, rolling back created page");
            let _ = ctx.gateway.archive_page(&created.id().to_string()).await;
            return Err(e);
        }
    }

    let blank = Entity::blank(kind, created.id());
    let summary = maintain_inverse_relations(ctx.gateway.as_ref(), &ctx.cache, created.id(), kind, &blank, &created).await;
    if summary.failed > 0 {
        warn!(id = %created.id(), failed = summary.failed, "create: inverse-relation fan-out had partial failures");
    }

    ctx.cache.invalidate_related(kind, created.id(), &[]).await;

    Ok(created)
}

async fn attach_to_parent(ctx: &RouterContext, parent: &ParentRelation, new_id: Uuid) -> Result<()> {
    let parent_page = ctx
        .gateway
        .retrieve_page(&parent.parent_id.to_string())
        .await
        .map_err(RelayError::from)?;
    let parent_entity = transform_page(ctx.gateway.as_ref(), parent.parent_kind, &parent_page)
        .await
        .map_err(RelayError::from)?;

    let Some(current) = parent_entity.relation_field(&parent.field_key) else {
        return Err(RelayError::Validation(format!(
            "parent field '{}' is not a relation field on {}",
            parent.field_key, parent.parent_kind
        )));
    };

    let mut ids = current.ids();
    if !ids.contains(&new_id) {
        ids.push(new_id);
    }
    let updated = if matches!(current, crate::model::RelationValue::Single(_)) {
        crate::model::RelationValue::Single(Some(new_id))
    } else {
        crate::model::RelationValue::Multi(ids)
    };

    let Some(body) = encode_relation_field(parent.parent_kind, &parent.field_key, &FieldValue::Relation(updated)) else {
        return Err(RelayError::Internal(format!(
            "parent field '{}' has no wire encoding",
            parent.field_key
        )));
    };

    ctx.gateway
        .update_page(&parent.parent_id.to_string(), &body)
        .await
        .map_err(RelayError::from)?;
    ctx.cache.invalidate_entity(parent.parent_kind, parent.parent_id).await;
    Ok(())
}

async fn update_entity(
    ctx: &RouterContext,
    kind: EntityKind,
    id: Uuid,
    partial: Entity,
    requested_fields: BTreeSet<String>,
    if_version: Option<u64>,
) -> Result<UpdateResponse> {
    if let Some(expected) = if_version {
        let actual = ctx.cache.entity_version(kind, id).await;
        if actual != Some(expected) {
            return Err(RelayError::VersionConflict { expected, actual });
        }
    }

    let old_entity = fetch_one(ctx, kind, id).await?;
    let before = capture::capture_neighborhood(ctx.gateway.as_ref(), &ctx.database_ids, kind, id).await;

    let properties = encode_entity(&partial, &requested_fields);
    let page = ctx.gateway.update_page(&id.to_string(), &properties).await.map_err(RelayError::from)?;
    let decoded_partial = transform_page(ctx.gateway.as_ref(), kind, &page).await.map_err(RelayError::from)?;

    let outcome = merge_entity(&old_entity, &decoded_partial, &requested_fields);
    let merged = outcome.merged;

    let summary = maintain_inverse_relations(ctx.gateway.as_ref(), &ctx.cache, id, kind, &old_entity, &merged).await;
    if summary.failed > 0 {
        warn!(id = %id, failed = summary.failed, "update: inverse-relation fan-out had partial failures");
    }

    let related: Vec<(EntityKind, Vec<Uuid>)> = group_touched(&summary.touched);
    ctx.cache.invalidate_related(kind, id, &related).await;

    let delta = match before {
        Some(before_graph) => Some(compute_post_write_delta(ctx, &before_graph, &merged).await),
        None => None,
    };

    Ok(UpdateResponse {
        entity: merged,
        delta,
        warnings: outcome.warnings,
        inverse_summary: summary,
    })
}

async fn archive_entity(ctx: &RouterContext, kind: EntityKind, id: Uuid) -> Result<ArchiveResponse> {
    let old_entity = fetch_one(ctx, kind, id).await?;
    let before = capture::capture_neighborhood(ctx.gateway.as_ref(), &ctx.database_ids, kind, id).await;

    ctx.gateway.archive_page(&id.to_string()).await.map_err(RelayError::from)?;

    let blank = Entity::blank(kind, id);
    let summary = maintain_inverse_relations(ctx.gateway.as_ref(), &ctx.cache, id, kind, &old_entity, &blank).await;
    if summary.failed > 0 {
        warn!(id = %id, failed = summary.failed, "archive: inverse-relation fan-out had partial failures");
    }

    let related: Vec<(EntityKind, Vec<Uuid>)> = group_touched(&summary.touched);
    ctx.cache.invalidate_related(kind, id, &related).await;

    let delta = match before {
        Some(before_graph) => Some(compute_post_write_delta(ctx, &before_graph, &blank).await),
        None => None,
    };

    Ok(ArchiveResponse {
        ok: true,
        delta,
        inverse_summary: summary,
    })
}

fn group_touched(touched: &[(EntityKind, Uuid)]) -> Vec<(EntityKind, Vec<Uuid>)> {
    let mut grouped: BTreeMap<EntityKind, Vec<Uuid>> = BTreeMap::new();
    for (kind, id) in touched {
        grouped.entry(*kind).or_default().push(*id);
    }
    grouped.into_iter().collect()
}

/// §4.11's "after" capture: the id-set union of the before-capture's nodes
/// and the written entity's current relation targets, then a delta
/// against the before-capture (§4.10). Failures here never fail the
/// mutation itself — they only mean the caller gets `delta: None`.
async fn compute_post_write_delta(ctx: &RouterContext, before: &CapturedGraph, written: &Entity) -> Delta {
    let mut ids: HashSet<Uuid> = before.node_ids();
    ids.insert(written.id());
    for field in crate::model::mutable_relation_field_names(written.kind()) {
        if let Some(relation) = written.relation_field(field) {
            ids.extend(relation.ids());
        }
    }

    let after = capture::capture_id_set(ctx.gateway.as_ref(), &ctx.database_ids, &ids).await;
    calculate_delta(&before.nodes, &after.nodes, &before.edges, &after.edges)
}
