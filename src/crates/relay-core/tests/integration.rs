//! Full read/write/delta flow against a fake in-process upstream
//! (`gateway::fake::FakeGateway`, exposed here via the `test-util`
//! feature). Exercises the router end to end rather than any single
//! module in isolation: list/get caching, create-with-parent, the
//! bidirectional inverse-relation write (S3), and the before/after delta
//! that a write produces (S7's orphan rule, at entity-router scale).

use relay_core::cache::{Cache, CacheConfig};
use relay_core::config::DatabaseIds;
use relay_core::delta::ChangeKind;
use relay_core::gateway::fake::FakeGateway;
use relay_core::gateway::types::{Page, PropertyBag, PropertyValue, RelationRef};
use relay_core::model::{Entity, EntityKind};
use relay_core::router::{
    CharacterService, ElementService, EntityService, ListRequest, ParentRelation, PuzzleService,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

/// Surfaces this suite's `tracing` events (gateway calls, cache
/// invalidation, inverse-relation fan-out) when run with `RUST_LOG` set;
/// harmless, and a no-op, when it isn't.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn database_ids() -> DatabaseIds {
    DatabaseIds {
        character: "char-db".to_string(),
        element: "elem-db".to_string(),
        puzzle: "puzzle-db".to_string(),
        timeline_event: "timeline-db".to_string(),
    }
}

fn context(gateway: FakeGateway) -> relay_core::router::RouterContext {
    relay_core::router::RouterContext {
        gateway: Arc::new(gateway),
        cache: Arc::new(Cache::new(CacheConfig::default())),
        database_ids: database_ids(),
    }
}

fn title(s: &str) -> PropertyValue {
    PropertyValue::Title {
        plain_text: vec![s.to_string()],
    }
}

fn relation(ids: &[Uuid]) -> PropertyValue {
    PropertyValue::Relation {
        targets: ids.iter().map(|id| RelationRef { id: id.to_string() }).collect(),
        has_more: false,
    }
}

fn page(id: Uuid, db: &str, props: Vec<(&str, PropertyValue)>) -> Page {
    let mut properties = PropertyBag::new();
    for (name, value) in props {
        properties.insert(name.to_string(), value);
    }
    Page {
        id: id.to_string(),
        parent_database_id: db.to_string(),
        last_edited_time: "1970-01-01T00:00:00Z".to_string(),
        archived: false,
        properties,
    }
}

#[tokio::test]
async fn list_then_get_round_trips_through_the_cache() {
    init_tracing();
    let gw = FakeGateway::new();
    let db = database_ids();
    let id = Uuid::from_u128(1);
    gw.insert(page(id, &db.character, vec![("Name", title("Alice"))]));
    let ctx = context(gw);
    let service = CharacterService;

    let list = service
        .list(
            &ctx,
            ListRequest {
                limit: 20,
                cursor: None,
                filter: None,
                bypass_cache: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(list.data.len(), 1);
    assert!(!list.has_more);

    let first_get = service.get(&ctx, id, false).await.unwrap();
    assert!(!first_get.cache_hit);
    let second_get = service.get(&ctx, id, false).await.unwrap();
    assert!(second_get.cache_hit, "second read of the same entity must be served from cache");
}

/// S3 from spec.md: updating `puzzle.rewards` from `[e2]` to `[e3]` must
/// flip `e2.rewardedByPuzzles -= [p1]` and `e3.rewardedByPuzzles += [p1]`
/// concurrently, and invalidate every touched entity's cache.
#[tokio::test]
async fn bidirectional_write_flips_both_sides_of_the_reward_relation() {
    let gw = FakeGateway::new();
    let db = database_ids();
    let p1 = Uuid::from_u128(1);
    let e2 = Uuid::from_u128(2);
    let e3 = Uuid::from_u128(3);

    gw.insert(page(p1, &db.puzzle, vec![("Rewards", relation(&[e2]))]));
    gw.insert(page(e2, &db.element, vec![("Rewarded By (Puzzle)", relation(&[p1]))]));
    gw.insert(page(e3, &db.element, vec![]));
    let ctx = context(gw);
    let puzzles = PuzzleService;
    let elements = ElementService;

    // Prime the element caches so we can assert they were invalidated, not
    // just eventually-consistent on a fresh fetch.
    let _ = elements.get(&ctx, e2, false).await.unwrap();
    let _ = elements.get(&ctx, e3, false).await.unwrap();

    let mut requested = BTreeSet::new();
    requested.insert("rewards".to_string());
    let mut partial = Entity::blank(EntityKind::Puzzle, p1);
    if let Entity::Puzzle(p) = &mut partial {
        p.rewards = vec![e3];
    }

    let update = puzzles.update(&ctx, p1, partial, requested, None).await.unwrap();
    if let Entity::Puzzle(p) = &update.entity {
        assert_eq!(p.rewards, vec![e3]);
    } else {
        panic!("expected puzzle");
    }
    assert_eq!(update.inverse_summary.failed, 0);

    let e2_after = elements.get(&ctx, e2, false).await.unwrap();
    assert!(!e2_after.cache_hit, "e2's cache must have been invalidated by the inverse-relation fan-out");
    if let Entity::Element(e) = e2_after.entity {
        assert!(e.rewarded_by_puzzles.is_empty());
    } else {
        panic!("expected element");
    }

    let e3_after = elements.get(&ctx, e3, false).await.unwrap();
    if let Entity::Element(e) = e3_after.entity {
        assert_eq!(e.rewarded_by_puzzles, vec![p1]);
    } else {
        panic!("expected element");
    }
}

#[tokio::test]
async fn create_with_parent_relation_attaches_and_update_produces_a_delta() {
    let gw = FakeGateway::new();
    let db = database_ids();
    let parent_id = Uuid::from_u128(1);
    gw.insert(page(parent_id, &db.character, vec![("Name", title("Alice"))]));
    let ctx = context(gw);
    let elements = ElementService;
    let characters = CharacterService;

    let created = elements
        .create(
            &ctx,
            Entity::blank(EntityKind::Element, Uuid::nil()),
            Some(ParentRelation {
                parent_kind: EntityKind::Character,
                parent_id,
                field_key: "ownedElements".to_string(),
            }),
        )
        .await
        .unwrap();

    let parent = characters.get(&ctx, parent_id, true).await.unwrap();
    if let Entity::Character(c) = parent.entity {
        assert_eq!(c.owned_elements, vec![created.id()]);
    } else {
        panic!("expected character");
    }

    let mut requested = BTreeSet::new();
    requested.insert("name".to_string());
    let mut partial = Entity::blank(EntityKind::Character, parent_id);
    if let Entity::Character(c) = &mut partial {
        c.name = "Alice Prime".to_string();
    }
    let update = characters.update(&ctx, parent_id, partial, requested, None).await.unwrap();

    let delta = update.delta.expect("before-capture should have produced a delta");
    let parent_delta = delta.nodes.iter().find(|n| n.id == parent_id);
    assert!(
        matches!(parent_delta.map(|n| n.change), Some(ChangeKind::Updated)),
        "the renamed parent must appear as updated in the delta"
    );
}

#[tokio::test]
async fn archive_strips_the_entity_from_every_inverse_relation() {
    let gw = FakeGateway::new();
    let db = database_ids();
    let char_id = Uuid::from_u128(1);
    let elem_id = Uuid::from_u128(2);
    gw.insert(page(char_id, &db.character, vec![("Owned Elements", relation(&[elem_id]))]));
    gw.insert(page(elem_id, &db.element, vec![("Owner", relation(&[char_id]))]));
    let ctx = context(gw);
    let characters = CharacterService;
    let elements = ElementService;

    let archived = characters.archive(&ctx, char_id).await.unwrap();
    assert!(archived.ok);

    let elem = elements.get(&ctx, elem_id, true).await.unwrap();
    if let Entity::Element(e) = elem.entity {
        assert_eq!(e.owner, None, "archiving the owner must strip it from the element's owner field");
    } else {
        panic!("expected element");
    }
}
