//! Relationship Synthesizer (§4.4): given four arrays of decoded entities
//! whose relation data may be asymmetric (one side populated, the mirror
//! side blank), populate every designated inverse relation in both
//! directions until the graph is internally consistent (I2, T1, T2).
//!
//! Synthesis is idempotent: running it twice over the same entity set
//! leaves it unchanged, because an id is only ever appended to an inverse
//! field it is not already present in.

use crate::model::schema::{all_relation_pairs, RelationPair};
use crate::model::{Entity, RelationValue};
use std::collections::HashMap;
use uuid::Uuid;

/// Mirror every designated relation pair across `entities` in place.
pub fn synthesize(entities: &mut [Entity]) {
    let index: HashMap<Uuid, usize> = entities.iter().enumerate().map(|(i, e)| (e.id(), i)).collect();

    for pair in all_relation_pairs() {
        mirror_pair(entities, &index, &pair);
    }
}

fn mirror_pair(entities: &mut [Entity], index: &HashMap<Uuid, usize>, pair: &RelationPair) {
    // (index of entity to mutate, field to mutate, whether that field is multi-valued, id to add)
    let mut additions: Vec<(usize, &'static str, bool, Uuid)> = Vec::new();

    for (i, e) in entities.iter().enumerate() {
        if e.kind() == pair.forward.kind {
            if let Some(rv) = e.relation_field(pair.forward.field) {
                for target_id in rv.ids() {
                    if let Some(&j) = index.get(&target_id) {
                        if entities[j].kind() == pair.inverse.kind {
                            additions.push((j, pair.inverse.field, pair.inverse.multi, e.id()));
                        }
                    }
                }
            }
        }
        if e.kind() == pair.inverse.kind {
            if let Some(rv) = e.relation_field(pair.inverse.field) {
                for target_id in rv.ids() {
                    if let Some(&j) = index.get(&target_id) {
                        if entities[j].kind() == pair.forward.kind {
                            additions.push((j, pair.forward.field, pair.forward.multi, e.id()));
                        }
                    }
                }
            }
        }
        let _ = i;
    }

    for (j, field, multi, id_to_add) in additions {
        add_to_relation(&mut entities[j], field, multi, id_to_add);
    }
}

fn add_to_relation(entity: &mut Entity, field: &'static str, multi: bool, id: Uuid) {
    let Some(current) = entity.relation_field(field) else {
        return;
    };

    let updated = if multi {
        let mut ids = current.ids();
        if !ids.contains(&id) {
            ids.push(id);
        }
        RelationValue::Multi(ids)
    } else {
        match current {
            RelationValue::Single(None) => RelationValue::Single(Some(id)),
            // Already set (to this id or another) — leave untouched so
            // repeated synthesis passes stay idempotent and a prior,
            // deliberately-set single relation is never clobbered.
            already_set => already_set,
        }
    };

    entity.set_relation_field(field, updated);
}


/// T1: synthesis is idempotent for any asymmetric starting distribution of
/// `ownedElements`/`owner` references over a fixed pool of character and
/// element ids, including references that dangle (point outside the pool).
#[cfg(test)]
mod idempotency_proptests {
    use super::*;
    use crate::model::{Character, CharacterKind, CharacterTier, Element};
    use chrono::Utc;
    use proptest::prelude::*;

    const CHAR_IDS: [u128; 3] = [1, 2, 3];
    const ELEM_IDS: [u128; 4] = [10, 11, 12, 13];

    fn build(owned: &[Vec<usize>], owners: &[Option<usize>]) -> Vec<Entity> {
        let mut entities = Vec::new();
        for (i, &id) in CHAR_IDS.iter().enumerate() {
            entities.push(Entity::Character(Character {
                id: Uuid::from_u128(id),
                name: "c".into(),
                kind: CharacterKind::Npc,
                tier: CharacterTier::Core,
                primary_action: String::new(),
                logline: String::new(),
                overview: String::new(),
                emotion_towards_ceo: String::new(),
                last_edited: Utc::now(),
                owned_elements: owned[i].iter().map(|&e| Uuid::from_u128(ELEM_IDS[e])).collect(),
                associated_elements: vec![],
                character_puzzles: vec![],
                events: vec![],
                connections: vec![],
            }));
        }
        for (i, &id) in ELEM_IDS.iter().enumerate() {
            entities.push(Entity::Element(Element {
                id: Uuid::from_u128(id),
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
                owner: owners[i].map(|c| Uuid::from_u128(CHAR_IDS[c])),
                container: None,
                contents: vec![],
                timeline_event: None,
                required_for_puzzles: vec![],
                rewarded_by_puzzles: vec![],
                container_puzzle: None,
                associated_characters: vec![],
                puzzle_chain: vec![],
                is_container: false,
            }));
        }
        entities
    }

    fn owned_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
        proptest::collection::vec(proptest::collection::vec(0usize..ELEM_IDS.len(), 0..3), CHAR_IDS.len())
    }

    fn owners_strategy() -> impl Strategy<Value = Vec<Option<usize>>> {
        proptest::collection::vec(proptest::option::of(0usize..CHAR_IDS.len()), ELEM_IDS.len())
    }

    proptest! {
        #[test]
        fn synthesize_twice_equals_synthesize_once(owned in owned_strategy(), owners in owners_strategy()) {
            let mut entities = build(&owned, &owners);
            synthesize(&mut entities);
            let once = format!("{:?}", entities);
            synthesize(&mut entities);
            let twice = format!("{:?}", entities);
            prop_assert_eq!(once, twice);
        }

    }

    /// Assignment is a conflict-free partial function element -> owner
    /// (one owner per element, by construction), so T2 ("the designated
    /// inverse contains A") is a meaningful invariant to check — a
    /// `Single`-cardinality field can't honor two simultaneous claimants,
    /// so the earlier idempotency test (which tolerates conflicting,
    /// independently-random data) is kept separate from this one.
    fn assignment_strategy() -> impl Strategy<Value = Vec<Option<(usize, bool, bool)>>> {
        proptest::collection::vec(
            proptest::option::of((0usize..CHAR_IDS.len(), any::<bool>(), any::<bool>())),
            ELEM_IDS.len(),
        )
    }

    fn build_from_assignment(assignment: &[Option<(usize, bool, bool)>]) -> Vec<Entity> {
        let mut owned: Vec<Vec<usize>> = vec![Vec::new(); CHAR_IDS.len()];
        let mut owners: Vec<Option<usize>> = vec![None; ELEM_IDS.len()];
        for (elem_idx, entry) in assignment.iter().enumerate() {
            if let Some((char_idx, show_on_char, show_on_elem)) = entry {
                // Always show the relation on at least one side so synthesis
                // has something asymmetric to mirror; a pair with neither
                // side set is equivalent to "no relation at all".
                if *show_on_char || !*show_on_elem {
                    owned[*char_idx].push(elem_idx);
                }
                if *show_on_elem {
                    owners[elem_idx] = Some(*char_idx);
                }
            }
        }
        build(&owned, &owners)
    }

    proptest! {
        #[test]
        fn every_owned_element_points_back_at_its_owner_after_synthesis(assignment in assignment_strategy()) {
            let mut entities = build_from_assignment(&assignment);
            synthesize(&mut entities);

            for e in &entities {
                if let Entity::Character(c) = e {
                    for target in &c.owned_elements {
                        if let Some(Entity::Element(elem)) = entities.iter().find(|x| x.id() == *target) {
                            prop_assert_eq!(elem.owner, Some(c.id));
                        }
                    }
                }
            }
        }
    }
}
