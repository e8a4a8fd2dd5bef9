//! Inverse-Relation Maintainer (§4.9): given an entity's relation fields
//! before and after a write, computes the added/removed target ids for
//! every relation pair this entity participates in and concurrently
//! updates the opposite side of each link. Partial failure is tolerated —
//! the caller gets a failure count, not a propagated error per target.

use crate::encode::encode_relation_field;
use crate::gateway::UpstreamGateway;
use crate::model::schema::all_relation_pairs;
use crate::model::{Entity, EntityKind, FieldValue, RelationValue};
use crate::transform::transform_page;
use crate::Cache;
use futures::future::join_all;
use std::collections::HashSet;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct InverseUpdateSummary {
    pub attempted: usize,
    pub failed: usize,
    /// The `(kind, id)` pairs successfully written to the opposite side of
    /// a relation, for callers (the Entity Router) that need to cascade
    /// cache invalidation beyond the entity that was directly edited.
    pub touched: Vec<(EntityKind, Uuid)>,
}

enum Direction {
    Add,
    Remove,
}

/// Run the maintainer for one entity's write. `entity_id`/`old`/`new`
/// describe the entity whose relation fields just changed; `entity_id` may
/// differ from `old.id()`/`new.id()` only in the archive case, where `new`
/// is a synthetic empty entity (§4.7's "run the Maintainer with `new = {}`
/// to strip this id from every inverse side").
pub async fn maintain_inverse_relations(
    gateway: &dyn UpstreamGateway,
    cache: &Cache,
    entity_id: Uuid,
    kind: EntityKind,
    old: &Entity,
    new: &Entity,
) -> InverseUpdateSummary {
    let mut jobs: Vec<(EntityKind, Uuid, &'static str, bool, Direction)> = Vec::new();

    for pair in all_relation_pairs() {
        let (my_field, other_kind, other_field, other_multi) = if kind == pair.forward.kind {
            (pair.forward.field, pair.inverse.kind, pair.inverse.field, pair.inverse.multi)
        } else if kind == pair.inverse.kind {
            (pair.inverse.field, pair.forward.kind, pair.forward.field, pair.forward.multi)
        } else {
            continue;
        };

        let old_ids: HashSet<Uuid> = old
            .relation_field(my_field)
            .map(|r| r.ids().into_iter().collect())
            .unwrap_or_default();
        let new_ids: HashSet<Uuid> = new
            .relation_field(my_field)
            .map(|r| r.ids().into_iter().collect())
            .unwrap_or_default();

        for added in new_ids.difference(&old_ids) {
            jobs.push((other_kind, *added, other_field, other_multi, Direction::Add));
        }
        for removed in old_ids.difference(&new_ids) {
            jobs.push((other_kind, *removed, other_field, other_multi, Direction::Remove));
        }
    }

    let attempted = jobs.len();
    let futures = jobs.into_iter().map(|(other_kind, target_id, other_field, other_multi, dir)| {
        apply_one(gateway, other_kind, target_id, other_field, other_multi, entity_id, dir)
    });

    let results = join_all(futures).await;
    let mut failed = 0;
    let mut touched: Vec<(EntityKind, Uuid)> = Vec::new();
    for r in results {
        match r {
            Ok((k, id)) => touched.push((k, id)),
            Err(()) => failed += 1,
        }
    }

    if attempted > 0 {
        cache.invalidate_pattern(&format!("{}*", Cache::graph_key())).await;
        for (k, id) in &touched {
            cache.invalidate_entity(*k, *id).await;
        }
    }

    InverseUpdateSummary {
        attempted,
        failed,
        touched,
    }
}

async fn apply_one(
    gateway: &dyn UpstreamGateway,
    target_kind: EntityKind,
    target_id: Uuid,
    target_field: &'static str,
    target_multi: bool,
    mirror_id: Uuid,
    dir: Direction,
) -> Result<(EntityKind, Uuid), ()> {
    let page = match gateway.retrieve_page(&target_id.to_string()).await {
        Ok(p) => p,
        Err(e) => {
            warn!(target=%target_id, error=%e, "inverse-relation target fetch failed");
            return Err(());
        }
    };

    let target_entity = match transform_page(gateway, target_kind, &page).await {
        Ok(e) => e,
        Err(e) => {
            warn!(target=%target_id, error=%e, "inverse-relation target decode failed");
            return Err(());
        }
    };

    let current = target_entity
        .relation_field(target_field)
        .unwrap_or(RelationValue::Multi(Vec::new()));

    let updated = match (dir, target_multi) {
        (Direction::Add, true) => {
            let mut ids = current.ids();
            if !ids.contains(&mirror_id) {
                ids.push(mirror_id);
            }
            RelationValue::Multi(ids)
        }
        (Direction::Remove, true) => {
            let ids = current.ids().into_iter().filter(|id| *id != mirror_id).collect();
            RelationValue::Multi(ids)
        }
        (Direction::Add, false) => RelationValue::Single(Some(mirror_id)),
        (Direction::Remove, false) => match current {
            RelationValue::Single(Some(id)) if id == mirror_id => RelationValue::Single(None),
            other => other,
        },
    };

    let Some(body) = encode_relation_field(target_kind, target_field, &FieldValue::Relation(updated)) else {
        warn!(target=%target_id, field=target_field, "inverse-relation field has no wire encoding");
        return Err(());
    };

    match gateway.update_page(&target_id.to_string(), &body).await {
        Ok(_) => Ok((target_kind, target_id)),
        Err(e) => {
            warn!(target=%target_id, error=%e, "inverse-relation target update failed");
            Err(())
        }
    }
}
