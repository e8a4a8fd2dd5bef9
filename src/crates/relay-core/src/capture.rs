//! Graph State Capture (§4.11): fetches the minimal subgraph a write needs
//! to compute a before/after delta, without re-materializing the whole
//! graph. Two modes — a cheap "neighborhood" capture around one entity
//! before a mutation, and a "id-set" capture restricted to an explicit id
//! list after one — share the fetch-then-synthesize-then-build pipeline
//! but differ in how they bound the result.
//!
//! Neither mode is ever cached (§9: "Graph state capture: no caching") —
//! two writes to the same entity inside the cache TTL window would
//! otherwise see the same stale "before" state and compute a wrong delta
//! for the second.

use crate::config::DatabaseIds;
use crate::gateway::{GatewayError, UpstreamGateway};
use crate::graph::{build_graph, Edge, Node};
use crate::model::{mutable_relation_field_names, Entity, EntityKind};
use crate::synth::synthesize;
use crate::transform::transform_page;
use futures::future::join_all;
use std::collections::HashSet;
use tracing::warn;
use uuid::Uuid;

/// The subgraph produced by either capture mode.
#[derive(Debug, Clone, Default)]
pub struct CapturedGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl CapturedGraph {
    pub fn node_ids(&self) -> HashSet<Uuid> {
        self.nodes.iter().map(|n| n.id).collect()
    }
}

/// Fetch one page and decode it into an entity, tolerating per-id failure
/// (§4.11: "Both modes tolerate per-id failures"). A 404, an archived
/// page (the upstream's deletion — §3's lifecycle note), an unrecognized
/// parent database, or a decode error all resolve to `None` rather than
/// aborting the whole capture.
async fn fetch_and_transform(gateway: &dyn UpstreamGateway, database_ids: &DatabaseIds, id: Uuid) -> Option<Entity> {
    let page = match gateway.retrieve_page(&id.to_string()).await {
        Ok(p) => p,
        Err(GatewayError::NotFound(_)) => return None,
        Err(e) => {
            warn!(id = %id, error = %e, "graph state capture: fetch failed, treating as absent");
            return None;
        }
    };
    if page.archived {
        return None;
    }

    let Some(kind) = database_ids.kind_for_database(&page.parent_database_id) else {
        warn!(id = %id, db = %page.parent_database_id, "graph state capture: unrecognized parent database, skipping");
        return None;
    };

    match transform_page(gateway, kind, &page).await {
        Ok(e) => Some(e),
        Err(e) => {
            warn!(id = %id, error = %e, "graph state capture: decode failed, skipping");
            None
        }
    }
}

/// Before-mutation capture: the target entity plus every id it directly
/// references through a mutable relation, synthesized and built into a
/// graph, then trimmed to (a) the target node, (b) every node with an
/// edge to or from it, and (c) the edges between those nodes — exactly
/// the one-hop neighborhood §4.11 describes, not the full graph that
/// `build_graph` would produce over the fetched set (a neighbor's own
/// further relations may point past what this capture fetched, and those
/// become placeholders in the full build; this capture drops them rather
/// than surface a degree-2 placeholder the caller never asked about).
///
/// Returns `None` if the target itself cannot be fetched/decoded — a
/// before-capture over a target that doesn't exist carries no information
/// a delta calculation could use.
pub async fn capture_neighborhood(
    gateway: &dyn UpstreamGateway,
    database_ids: &DatabaseIds,
    kind: EntityKind,
    id: Uuid,
) -> Option<CapturedGraph> {
    let target = fetch_and_transform(gateway, database_ids, id).await?;
    if target.kind() != kind {
        warn!(id = %id, expected = %kind, actual = %target.kind(), "graph state capture: entity kind mismatch");
    }

    let neighbor_ids: Vec<Uuid> = mutable_relation_field_names(target.kind())
        .iter()
        .filter_map(|field| target.relation_field(field))
        .flat_map(|relation| relation.ids())
        .collect();

    let mut entities = vec![target.clone()];
    let fetched = join_all(neighbor_ids.iter().map(|nid| fetch_and_transform(gateway, database_ids, *nid))).await;
    entities.extend(fetched.into_iter().flatten());

    synthesize(&mut entities);
    let graph = build_graph(&entities);

    let target_id = target.id();
    let mut keep: HashSet<Uuid> = HashSet::new();
    keep.insert(target_id);
    for edge in &graph.edges {
        if edge.source == target_id {
            keep.insert(edge.target);
        }
        if edge.target == target_id {
            keep.insert(edge.source);
        }
    }

    let nodes = graph.nodes.into_iter().filter(|n| keep.contains(&n.id)).collect();
    let edges = graph
        .edges
        .into_iter()
        .filter(|e| keep.contains(&e.source) && keep.contains(&e.target))
        .collect();

    Some(CapturedGraph { nodes, edges })
}

/// After-mutation capture: fetch exactly `ids` (typically the union of a
/// prior neighborhood capture's node ids and the just-written entity's new
/// neighbors), decode each by the kind its own parent database implies,
/// and build the subgraph restricted to that set. A relation pointing
/// outside `ids` resolves to a placeholder, exactly as it would on the
/// full-graph endpoint.
pub async fn capture_id_set(gateway: &dyn UpstreamGateway, database_ids: &DatabaseIds, ids: &HashSet<Uuid>) -> CapturedGraph {
    let fetched = join_all(ids.iter().map(|id| fetch_and_transform(gateway, database_ids, *id))).await;
    let mut entities: Vec<Entity> = fetched.into_iter().flatten().collect();

    synthesize(&mut entities);
    let graph = build_graph(&entities);

    CapturedGraph {
        nodes: graph.nodes,
        edges: graph.edges,
    }
}
