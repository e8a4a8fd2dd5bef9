//! Generic value types used to expose entity fields to code that must stay
//! kind-agnostic (the Merger, the Synthesizer, the Delta Calculator). Per
//! §9's "express classification as data" note, a single comparator here is
//! the only place multiset-vs-set semantics (I4) are decided.

use std::collections::HashMap;
use uuid::Uuid;

/// A relation-valued field: either a single optional target, or a list of
/// targets (order is preserved for reads, but equality is multiset-wise).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationValue {
    Single(Option<Uuid>),
    Multi(Vec<Uuid>),
}

impl RelationValue {
    pub fn is_empty(&self) -> bool {
        match self {
            RelationValue::Single(v) => v.is_none(),
            RelationValue::Multi(v) => v.is_empty(),
        }
    }

    pub fn ids(&self) -> Vec<Uuid> {
        match self {
            RelationValue::Single(Some(id)) => vec![*id],
            RelationValue::Single(None) => vec![],
            RelationValue::Multi(ids) => ids.clone(),
        }
    }

    /// Multiset equality per I4: `[a,a,b] != [a,b,b]`, `[a,a,b] == [a,b,a]`.
    pub fn multiset_eq(&self, other: &RelationValue) -> bool {
        multiset_eq(&self.ids(), &other.ids())
    }
}

/// Any field worth comparing for equality or merging: scalars, relations.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    TextList(Vec<String>),
    Relation(RelationValue),
    Bool(bool),
    OptDateTime(Option<chrono::DateTime<chrono::Utc>>),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::TextList(v) => v.is_empty(),
            FieldValue::Relation(r) => r.is_empty(),
            FieldValue::Bool(_) => false,
            FieldValue::OptDateTime(d) => d.is_none(),
        }
    }

    /// Equality that uses multiset semantics for list-shaped variants (I4)
    /// and exact equality otherwise.
    pub fn equals(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            (FieldValue::TextList(a), FieldValue::TextList(b)) => multiset_eq(a, b),
            (FieldValue::Relation(a), FieldValue::Relation(b)) => a.multiset_eq(b),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::OptDateTime(a), FieldValue::OptDateTime(b)) => a == b,
            _ => false,
        }
    }
}

/// Multiset equality by element-wise frequency (I4, T7).
pub fn multiset_eq<T: Eq + std::hash::Hash + Clone>(a: &[T], b: &[T]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut counts: HashMap<&T, i64> = HashMap::new();
    for item in a {
        *counts.entry(item).or_insert(0) += 1;
    }
    for item in b {
        *counts.entry(item).or_insert(0) -= 1;
    }
    counts.values().all(|c| *c == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiset_eq_respects_duplicate_counts() {
        assert!(!multiset_eq(&["a", "a", "b"], &["a", "b", "b"]));
        assert!(multiset_eq(&["a", "a", "b"], &["a", "b", "a"]));
    }

    #[test]
    fn relation_value_multiset_eq() {
        let id1 = Uuid::nil();
        let id2 = Uuid::from_u128(1);
        let a = RelationValue::Multi(vec![id1, id1, id2]);
        let b = RelationValue::Multi(vec![id1, id2, id1]);
        assert!(a.multiset_eq(&b));

        let c = RelationValue::Multi(vec![id1, id2, id2]);
        assert!(!a.multiset_eq(&c));
    }
}

/// T7: multiset equality by element-wise frequency, not set equality — an
/// arbitrary pair of small-alphabet vectors agrees with `multiset_eq` iff
/// they agree once sorted (the textbook definition of "equal as
/// multisets"), over any length and any duplicate distribution.
#[cfg(test)]
mod multiset_proptests {
    use super::*;
    use proptest::prelude::*;

    fn small_vec() -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(0u8..4, 0..8)
    }

    proptest! {
        #[test]
        fn multiset_eq_agrees_with_sorted_equality(mut a in small_vec(), mut b in small_vec()) {
            let result = multiset_eq(&a, &b);
            a.sort();
            b.sort();
            prop_assert_eq!(result, a == b);
        }

        #[test]
        fn multiset_eq_is_reflexive(v in small_vec()) {
            prop_assert!(multiset_eq(&v, &v));
        }

        #[test]
        fn multiset_eq_is_symmetric(a in small_vec(), b in small_vec()) {
            prop_assert_eq!(multiset_eq(&a, &b), multiset_eq(&b, &a));
        }
    }
}
