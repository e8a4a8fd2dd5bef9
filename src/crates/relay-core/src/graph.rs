//! Graph Builder (§4.5): turns a synthesized entity set into a node/edge
//! graph, inserting a placeholder node for every reference that doesn't
//! resolve to a known entity (I1) instead of silently dropping it.

use crate::model::{Entity, EntityKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Ownership,
    Association,
    Puzzle,
    Timeline,
    Requirement,
    Reward,
    Dependency,
    Chain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub kind: Option<EntityKind>,
    pub label: String,
    pub data: Option<Entity>,
    pub is_placeholder: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: Uuid,
    pub target: Uuid,
    pub kind: EdgeKind,
    pub weight: u32,
    pub animated: bool,
    pub data: Map<String, Value>,
}

impl Edge {
    fn new(source: Uuid, target: Uuid, kind: EdgeKind, weight: u32, label: &str) -> Self {
        let mut data = Map::new();
        data.insert("label".to_string(), Value::String(label.to_string()));
        Edge {
            id: format!("{source}:{target}:{kind:?}"),
            source,
            target,
            kind,
            weight,
            animated: false,
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingEntity {
    pub id: Uuid,
    pub referenced_by: Vec<Uuid>,
    pub expected_kind: Option<EntityKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphMetadata {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub placeholder_count: usize,
    pub missing_entities: Vec<MissingEntity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub metadata: GraphMetadata,
}

fn fallback_label(e: &Entity) -> String {
    let label = e.label();
    if label.is_empty() {
        format!("{} {}", e.kind(), e.id())
    } else {
        label
    }
}

/// Build the full node/edge graph from a synthesized entity set. Call
/// [`crate::synth::synthesize`] first — this function does not mirror
/// relations itself, it only materializes what's already there.
pub fn build_graph(entities: &[Entity]) -> Graph {
    let index: HashMap<Uuid, EntityKind> = entities.iter().map(|e| (e.id(), e.kind())).collect();

    let mut nodes: Vec<Node> = entities
        .iter()
        .map(|e| Node {
            id: e.id(),
            kind: Some(e.kind()),
            label: fallback_label(e),
            data: Some(e.clone()),
            is_placeholder: false,
        })
        .collect();

    // referenced_by accumulates every entity id that pointed at a given
    // missing target, and expected_kind records what kind the reference
    // implied (best-effort, from the field it came from).
    let mut missing: HashMap<Uuid, (HashSet<Uuid>, Option<EntityKind>)> = HashMap::new();
    let mut note_missing = |id: Uuid, referrer: Uuid, expected: Option<EntityKind>| {
        let entry = missing.entry(id).or_insert_with(|| (HashSet::new(), expected));
        entry.0.insert(referrer);
    };

    let mut edges: Vec<Edge> = Vec::new();
    let mut seen_edge_keys: HashSet<(Uuid, Uuid, EdgeKind)> = HashSet::new();
    let mut push_edge = |edges: &mut Vec<Edge>, seen: &mut HashSet<(Uuid, Uuid, EdgeKind)>, edge: Edge| {
        let key = (edge.source, edge.target, edge.kind);
        if seen.insert(key) {
            edges.push(edge);
        }
    };

    let mut resolve = |id: Uuid, referrer: Uuid, expected: Option<EntityKind>| -> bool {
        if index.contains_key(&id) {
            true
        } else {
            note_missing(id, referrer, expected);
            false
        }
    };

    let mut timeline_event_order: Vec<Uuid> = Vec::new();

    for e in entities {
        match e {
            Entity::Character(c) => {
                for target in &c.owned_elements {
                    if resolve(*target, c.id, Some(EntityKind::Element)) {
                        push_edge(
                            &mut edges,
                            &mut seen_edge_keys,
                            Edge::new(c.id, *target, EdgeKind::Ownership, 10, "owns"),
                        );
                    }
                }
                for target in &c.associated_elements {
                    if resolve(*target, c.id, Some(EntityKind::Element)) {
                        push_edge(
                            &mut edges,
                            &mut seen_edge_keys,
                            Edge::new(c.id, *target, EdgeKind::Association, 6, "associated with"),
                        );
                    }
                }
                for target in &c.character_puzzles {
                    if resolve(*target, c.id, Some(EntityKind::Puzzle)) {
                        push_edge(
                            &mut edges,
                            &mut seen_edge_keys,
                            Edge::new(c.id, *target, EdgeKind::Puzzle, 7, "involved in"),
                        );
                    }
                }
                for target in &c.events {
                    if resolve(*target, c.id, Some(EntityKind::TimelineEvent)) {
                        push_edge(
                            &mut edges,
                            &mut seen_edge_keys,
                            Edge::new(c.id, *target, EdgeKind::Timeline, 6, "present at"),
                        );
                    }
                }
            }
            Entity::Element(el) => {
                if let Some(owner) = el.owner {
                    if resolve(owner, el.id, Some(EntityKind::Character)) {
                        push_edge(
                            &mut edges,
                            &mut seen_edge_keys,
                            Edge::new(owner, el.id, EdgeKind::Ownership, 10, "owns"),
                        );
                    }
                }
                for target in &el.required_for_puzzles {
                    if resolve(*target, el.id, Some(EntityKind::Puzzle)) {
                        push_edge(
                            &mut edges,
                            &mut seen_edge_keys,
                            Edge::new(el.id, *target, EdgeKind::Requirement, 8, "required for"),
                        );
                    }
                }
            }
            Entity::Puzzle(p) => {
                for target in &p.rewards {
                    if resolve(*target, p.id, Some(EntityKind::Element)) {
                        push_edge(
                            &mut edges,
                            &mut seen_edge_keys,
                            Edge::new(p.id, *target, EdgeKind::Reward, 8, "rewards"),
                        );
                    }
                }
                if let Some(parent) = p.parent_item {
                    if resolve(parent, p.id, Some(EntityKind::Puzzle)) {
                        push_edge(
                            &mut edges,
                            &mut seen_edge_keys,
                            Edge::new(parent, p.id, EdgeKind::Dependency, 10, "unlocks"),
                        );
                    }
                }
                for target in &p.sub_puzzles {
                    if resolve(*target, p.id, Some(EntityKind::Puzzle)) {
                        push_edge(
                            &mut edges,
                            &mut seen_edge_keys,
                            Edge::new(p.id, *target, EdgeKind::Chain, 15, "leads to"),
                        );
                    }
                }
            }
            Entity::TimelineEvent(t) => {
                timeline_event_order.push(t.id);
                for target in &t.characters_involved {
                    if resolve(*target, t.id, Some(EntityKind::Character)) {
                        push_edge(
                            &mut edges,
                            &mut seen_edge_keys,
                            Edge::new(t.id, *target, EdgeKind::Timeline, 6, "involves"),
                        );
                    }
                }
                for target in &t.memory_evidence {
                    if resolve(*target, t.id, Some(EntityKind::Element)) {
                        push_edge(
                            &mut edges,
                            &mut seen_edge_keys,
                            Edge::new(t.id, *target, EdgeKind::Timeline, 6, "evidenced by"),
                        );
                    }
                }
            }
        }
    }

    for pair in timeline_event_order.windows(2) {
        push_edge(
            &mut edges,
            &mut seen_edge_keys,
            Edge::new(pair[0], pair[1], EdgeKind::Timeline, 3, "followed by"),
        );
    }

    let missing_entities: Vec<MissingEntity> = missing
        .into_iter()
        .map(|(id, (referrers, expected_kind))| MissingEntity {
            id,
            referenced_by: referrers.into_iter().collect(),
            expected_kind,
        })
        .collect();

    for m in &missing_entities {
        nodes.push(Node {
            id: m.id,
            kind: m.expected_kind,
            label: format!("missing {}", m.id),
            data: None,
            is_placeholder: true,
        });
    }

    let metadata = GraphMetadata {
        total_nodes: nodes.len(),
        total_edges: edges.len(),
        placeholder_count: missing_entities.len(),
        missing_entities,
    };

    Graph {
        nodes,
        edges,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Character, CharacterKind, CharacterTier, Element};
    use chrono::Utc;

    fn character(id: Uuid, owned: Vec<Uuid>) -> Entity {
        Entity::Character(Character {
            id,
            name: "c".into(),
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

    fn element(id: Uuid) -> Entity {
        Entity::Element(Element {
            id,
            name: "e".into(),
            description: String::new(),
            basic_kind: String::new(),
            status: String::new(),
            first_available: String::new(),
            narrative_threads: vec![],
            production_notes: String::new(),
            content_link: None,
            files_media: vec![],
            embedded_metadata: Default::default(),
            last_edited: Utc::now(),
            owner: None,
            container: None,
            contents: vec![],
            timeline_event: None,
            required_for_puzzles: vec![],
            rewarded_by_puzzles: vec![],
            container_puzzle: None,
            associated_characters: vec![],
            puzzle_chain: vec![],
            is_container: false,
        })
    }

    #[test]
    fn dangling_reference_produces_placeholder_node() {
        let char_id = Uuid::from_u128(1);
        let missing = Uuid::from_u128(99);
        let entities = vec![character(char_id, vec![missing])];

        let graph = build_graph(&entities);

        assert_eq!(graph.metadata.placeholder_count, 1);
        assert!(graph.nodes.iter().any(|n| n.id == missing && n.is_placeholder));
    }

    #[test]
    fn resolved_reference_produces_one_deduplicated_edge() {
        let char_id = Uuid::from_u128(1);
        let elem_id = Uuid::from_u128(2);
        let entities = vec![character(char_id, vec![elem_id, elem_id]), element(elem_id)];

        let graph = build_graph(&entities);

        let ownership_edges: Vec<_> = graph
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Ownership)
            .collect();
        assert_eq!(ownership_edges.len(), 1);
    }

    #[test]
    fn element_owner_field_produces_an_ownership_edge_and_a_placeholder_when_dangling() {
        let char_id = Uuid::from_u128(1);
        let elem_id = Uuid::from_u128(2);
        let mut owned = element(elem_id);
        if let Entity::Element(e) = &mut owned {
            e.owner = Some(char_id);
        }
        let entities = vec![character(char_id, vec![]), owned];

        let graph = build_graph(&entities);

        let ownership_edges: Vec<_> = graph
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Ownership)
            .collect();
        assert_eq!(ownership_edges.len(), 1);
        assert_eq!(ownership_edges[0].source, char_id);
        assert_eq!(ownership_edges[0].target, elem_id);

        let missing_owner = Uuid::from_u128(99);
        let mut dangling = element(elem_id);
        if let Entity::Element(e) = &mut dangling {
            e.owner = Some(missing_owner);
        }
        let entities = vec![dangling];

        let graph = build_graph(&entities);
        assert_eq!(graph.metadata.placeholder_count, 1);
        assert!(graph
            .nodes
            .iter()
            .any(|n| n.id == missing_owner && n.is_placeholder));
    }
}

/// T4: graph-equality is stable under permutation of the input entity
/// arrays. The "consecutive TimelineEvents by insertion order" edge (§4.5)
/// is deliberately order-*dependent*, so this property sticks to the
/// Character/Element/Puzzle relations, where the spec promises
/// order-independence.
#[cfg(test)]
mod permutation_proptests {
    use super::*;
    use crate::model::{Character, CharacterKind, CharacterTier, Element, Puzzle};
    use chrono::Utc;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn sample_entities() -> Vec<Entity> {
        let c1 = Uuid::from_u128(1);
        let c2 = Uuid::from_u128(2);
        let e1 = Uuid::from_u128(10);
        let e2 = Uuid::from_u128(11);
        let p1 = Uuid::from_u128(20);
        let p2 = Uuid::from_u128(21);

        vec![
            Entity::Character(Character {
                id: c1,
                name: "c1".into(),
                kind: CharacterKind::Npc,
                tier: CharacterTier::Core,
                primary_action: String::new(),
                logline: String::new(),
                overview: String::new(),
                emotion_towards_ceo: String::new(),
                last_edited: Utc::now(),
                owned_elements: vec![e1],
                associated_elements: vec![e2],
                character_puzzles: vec![p1],
                events: vec![],
                connections: vec![],
            }),
            Entity::Character(Character {
                id: c2,
                name: "c2".into(),
                kind: CharacterKind::Player,
                tier: CharacterTier::Secondary,
                primary_action: String::new(),
                logline: String::new(),
                overview: String::new(),
                emotion_towards_ceo: String::new(),
                last_edited: Utc::now(),
                owned_elements: vec![],
                associated_elements: vec![],
                character_puzzles: vec![],
                events: vec![],
                connections: vec![],
            }),
            Entity::Element(Element {
                id: e1,
                name: "e1".into(),
                description: String::new(),
                basic_kind: String::new(),
                status: String::new(),
                first_available: String::new(),
                narrative_threads: vec![],
                production_notes: String::new(),
                content_link: None,
                files_media: vec![],
                embedded_metadata: Default::default(),
                last_edited: Utc::now(),
                owner: None,
                container: None,
                contents: vec![],
                timeline_event: None,
                required_for_puzzles: vec![p2],
                rewarded_by_puzzles: vec![],
                container_puzzle: None,
                associated_characters: vec![],
                puzzle_chain: vec![],
                is_container: false,
            }),
            Entity::Element(Element {
                id: e2,
                name: "e2".into(),
                description: String::new(),
                basic_kind: String::new(),
                status: String::new(),
                first_available: String::new(),
                narrative_threads: vec![],
                production_notes: String::new(),
                content_link: None,
                files_media: vec![],
                embedded_metadata: Default::default(),
                last_edited: Utc::now(),
                owner: None,
                container: None,
                contents: vec![],
                timeline_event: None,
                required_for_puzzles: vec![],
                rewarded_by_puzzles: vec![p2],
                container_puzzle: None,
                associated_characters: vec![],
                puzzle_chain: vec![],
                is_container: false,
            }),
            Entity::Puzzle(Puzzle {
                id: p1,
                name: "p1".into(),
                description_solution: String::new(),
                asset_link: None,
                last_edited: Utc::now(),
                puzzle_elements: vec![],
                locked_item: None,
                rewards: vec![],
                parent_item: None,
                sub_puzzles: vec![p2],
                owner: None,
                story_reveals: vec![],
                timing: vec![],
                narrative_threads: vec![],
            }),
            Entity::Puzzle(Puzzle {
                id: p2,
                name: "p2".into(),
                description_solution: String::new(),
                asset_link: None,
                last_edited: Utc::now(),
                puzzle_elements: vec![],
                locked_item: None,
                rewards: vec![e2],
                parent_item: None,
                sub_puzzles: vec![],
                owner: None,
                story_reveals: vec![],
                timing: vec![],
                narrative_threads: vec![],
            }),
        ]
    }

    proptest! {
        #[test]
        fn graph_node_and_edge_sets_are_permutation_invariant(seed in any::<u64>()) {
            let entities = sample_entities();
            let mut shuffled = entities.clone();
            let mut rng = StdRng::seed_from_u64(seed);
            shuffled.shuffle(&mut rng);

            let baseline = build_graph(&entities);
            let permuted = build_graph(&shuffled);

            let mut baseline_ids: Vec<Uuid> = baseline.nodes.iter().map(|n| n.id).collect();
            let mut permuted_ids: Vec<Uuid> = permuted.nodes.iter().map(|n| n.id).collect();
            baseline_ids.sort();
            permuted_ids.sort();
            prop_assert_eq!(baseline_ids, permuted_ids);

            let mut baseline_edges: Vec<(Uuid, Uuid, EdgeKind)> =
                baseline.edges.iter().map(|e| (e.source, e.target, e.kind)).collect();
            let mut permuted_edges: Vec<(Uuid, Uuid, EdgeKind)> =
                permuted.edges.iter().map(|e| (e.source, e.target, e.kind)).collect();
            baseline_edges.sort();
            permuted_edges.sort();
            prop_assert_eq!(baseline_edges, permuted_edges);

            prop_assert_eq!(baseline.metadata.placeholder_count, permuted.metadata.placeholder_count);
        }
    }
}
