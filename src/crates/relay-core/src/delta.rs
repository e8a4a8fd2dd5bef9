//! Delta Calculator (§4.10): given "before" and "after" node/edge sets,
//! produces the minimal set of creates/updates/deletes the graph-editing
//! client needs to patch its in-memory view without refetching.
//!
//! Node equality dispatches through a fixed precedence: structural fields,
//! then `lastEdited` (this service's entities carry no separate `version`
//! field, so step 2 of §4.10's dispatch never applies here), then a
//! per-kind mutable-property comparator as the final fallback.

use crate::graph::{Edge, Node};
use crate::model::{Entity, EntityKind};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NodeDelta {
    pub id: Uuid,
    pub change: ChangeKind,
    pub node: Option<Node>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EdgeDelta {
    pub id: String,
    pub change: ChangeKind,
    pub edge: Option<Edge>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Delta {
    pub nodes: Vec<NodeDelta>,
    pub edges: Vec<EdgeDelta>,
    /// Set when the calculator hit an internal inconsistency and fell back
    /// to marking every surviving node/edge as updated rather than risk a
    /// partially-wrong diff (§4.10: "returns a full invalidation delta...
    /// rather than a partial wrong answer").
    pub full_invalidation: bool,
}

pub fn calculate_delta(old_nodes: &[Node], new_nodes: &[Node], old_edges: &[Edge], new_edges: &[Edge]) -> Delta {
    match try_calculate_delta(old_nodes, new_nodes, old_edges, new_edges) {
        Ok(delta) => delta,
        Err(reason) => {
            error!(reason, "delta calculation failed, falling back to full invalidation");
            full_invalidation_delta(new_nodes, new_edges)
        }
    }
}

fn full_invalidation_delta(new_nodes: &[Node], new_edges: &[Edge]) -> Delta {
    Delta {
        nodes: new_nodes
            .iter()
            .map(|n| NodeDelta {
                id: n.id,
                change: ChangeKind::Updated,
                node: Some(n.clone()),
            })
            .collect(),
        edges: new_edges
            .iter()
            .map(|e| EdgeDelta {
                id: e.id.clone(),
                change: ChangeKind::Updated,
                edge: Some(e.clone()),
            })
            .collect(),
        full_invalidation: true,
    }
}

fn try_calculate_delta(
    old_nodes: &[Node],
    new_nodes: &[Node],
    old_edges: &[Edge],
    new_edges: &[Edge],
) -> Result<Delta, &'static str> {
    let old_by_id: HashMap<Uuid, &Node> = old_nodes.iter().map(|n| (n.id, n)).collect();
    let new_by_id: HashMap<Uuid, &Node> = new_nodes.iter().map(|n| (n.id, n)).collect();
    if old_by_id.len() != old_nodes.len() || new_by_id.len() != new_nodes.len() {
        return Err("duplicate node id in input set");
    }

    let mut node_deltas = Vec::new();
    for (id, new_node) in &new_by_id {
        match old_by_id.get(id) {
            None => node_deltas.push(NodeDelta {
                id: *id,
                change: ChangeKind::Created,
                node: Some((*new_node).clone()),
            }),
            Some(old_node) => {
                if !nodes_equal(old_node, new_node) {
                    node_deltas.push(NodeDelta {
                        id: *id,
                        change: ChangeKind::Updated,
                        node: Some((*new_node).clone()),
                    });
                }
            }
        }
    }
    for (id, old_node) in &old_by_id {
        if !new_by_id.contains_key(id) {
            node_deltas.push(NodeDelta {
                id: *id,
                change: ChangeKind::Deleted,
                node: Some((*old_node).clone()),
            });
        }
    }

    let new_node_ids: HashSet<Uuid> = new_by_id.keys().copied().collect();
    let old_edges_by_id: HashMap<&str, &Edge> = old_edges.iter().map(|e| (e.id.as_str(), e)).collect();
    let new_edges_by_id: HashMap<&str, &Edge> = new_edges.iter().map(|e| (e.id.as_str(), e)).collect();

    let mut edge_deltas = Vec::new();
    for (id, new_edge) in &new_edges_by_id {
        let orphaned = !new_node_ids.contains(&new_edge.source) || !new_node_ids.contains(&new_edge.target);
        if orphaned {
            if old_edges_by_id.contains_key(id) {
                edge_deltas.push(EdgeDelta {
                    id: id.to_string(),
                    change: ChangeKind::Deleted,
                    edge: Some((*new_edge).clone()),
                });
            }
            continue;
        }
        match old_edges_by_id.get(id) {
            None => edge_deltas.push(EdgeDelta {
                id: id.to_string(),
                change: ChangeKind::Created,
                edge: Some((*new_edge).clone()),
            }),
            Some(old_edge) => {
                if !edges_equal(old_edge, new_edge) {
                    edge_deltas.push(EdgeDelta {
                        id: id.to_string(),
                        change: ChangeKind::Updated,
                        edge: Some((*new_edge).clone()),
                    });
                }
            }
        }
    }
    for (id, old_edge) in &old_edges_by_id {
        let still_present = new_edges_by_id.contains_key(id)
            && new_node_ids.contains(&old_edge.source)
            && new_node_ids.contains(&old_edge.target);
        if !still_present && !new_edges_by_id.contains_key(id) {
            edge_deltas.push(EdgeDelta {
                id: id.to_string(),
                change: ChangeKind::Deleted,
                edge: Some((*old_edge).clone()),
            });
        }
    }

    Ok(Delta {
        nodes: node_deltas,
        edges: edge_deltas,
        full_invalidation: false,
    })
}

fn nodes_equal(old: &Node, new: &Node) -> bool {
    if old.id != new.id || old.kind != new.kind || old.label != new.label || old.is_placeholder != new.is_placeholder {
        return false;
    }
    if old.is_placeholder {
        return true;
    }
    match (&old.data, &new.data) {
        (Some(old_entity), Some(new_entity)) => {
            if old_entity.last_edited() != new_entity.last_edited() {
                return false;
            }
            mutable_properties_equal(old_entity, new_entity)
        }
        // A node claiming not to be a placeholder but missing data is a
        // conservative inequality (§4.10: "unknown kinds yield inequality").
        _ => false,
    }
}

fn mutable_properties_equal(old: &Entity, new: &Entity) -> bool {
    if old.kind() != new.kind() {
        return false;
    }
    let old_fields = old.mutable_fields();
    let new_fields: HashMap<&str, _> = new.mutable_fields().into_iter().collect();

    let mut equal = true;
    for (field, old_value) in &old_fields {
        match new_fields.get(field) {
            Some(new_value) if old_value.equals(new_value) => {}
            Some(new_value) => {
                debug!(kind = %old.kind(), field, "mutable property differs between snapshots" , old=?old_value, new=?new_value);
                equal = false;
            }
            None => equal = false,
        }
    }
    equal
}

fn edges_equal(old: &Edge, new: &Edge) -> bool {
    old.source == new.source && old.target == new.target && old.kind == new.kind && old.animated == new.animated && old.data == new.data
}
