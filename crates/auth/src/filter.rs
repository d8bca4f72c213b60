//! Effective policies and their translation into collection filters.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use permscope_core::ObjectId;

/// `default` applies to every object except those in `exceptions`, which get
/// the opposite answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePolicy {
    pub default: bool,
    pub exceptions: BTreeSet<ObjectId>,
}

impl EffectivePolicy {
    pub fn allow_all() -> Self {
        Self {
            default: true,
            exceptions: BTreeSet::new(),
        }
    }

    pub fn deny_all() -> Self {
        Self::default()
    }

    pub fn allows(&self, object: ObjectId) -> bool {
        self.default ^ self.exceptions.contains(&object)
    }

    /// Nothing to report: denied everywhere.
    pub fn is_deny_all(&self) -> bool {
        !self.default && self.exceptions.is_empty()
    }

    pub fn to_filter(&self) -> ObjectFilter {
        match (self.default, self.exceptions.is_empty()) {
            (true, true) => ObjectFilter::All,
            (true, false) => ObjectFilter::Exclude(self.exceptions.clone()),
            (false, false) => ObjectFilter::Only(self.exceptions.clone()),
            (false, true) => ObjectFilter::Nothing,
        }
    }
}

/// A single include/exclude predicate over object ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectFilter {
    All,
    Exclude(BTreeSet<ObjectId>),
    Only(BTreeSet<ObjectId>),
    Nothing,
}

impl ObjectFilter {
    pub fn admits(&self, object: ObjectId) -> bool {
        match self {
            ObjectFilter::All => true,
            ObjectFilter::Exclude(ids) => !ids.contains(&object),
            ObjectFilter::Only(ids) => ids.contains(&object),
            ObjectFilter::Nothing => false,
        }
    }
}

/// A lazily evaluated collection that can take an id predicate, such as a
/// query builder. Implementations push the predicate down to storage.
pub trait FilterTarget: Sized {
    fn exclude_ids(self, ids: &BTreeSet<ObjectId>) -> Self;

    fn only_ids(self, ids: &BTreeSet<ObjectId>) -> Self;

    fn none(self) -> Self;
}

/// Narrow `target` to the objects `policy` permits.
pub fn apply<Q: FilterTarget>(policy: &EffectivePolicy, target: Q) -> Q {
    match policy.to_filter() {
        ObjectFilter::All => target,
        ObjectFilter::Exclude(ids) => target.exclude_ids(&ids),
        ObjectFilter::Only(ids) => target.only_ids(&ids),
        ObjectFilter::Nothing => target.none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Recorded {
        Untouched,
        Excluded(usize),
        Only(usize),
        Empty,
    }

    impl FilterTarget for Recorded {
        fn exclude_ids(self, ids: &BTreeSet<ObjectId>) -> Self {
            Recorded::Excluded(ids.len())
        }

        fn only_ids(self, ids: &BTreeSet<ObjectId>) -> Self {
            Recorded::Only(ids.len())
        }

        fn none(self) -> Self {
            Recorded::Empty
        }
    }

    #[test]
    fn apply_maps_all_four_shapes() {
        let id = ObjectId::new();
        let with = |default| EffectivePolicy {
            default,
            exceptions: [id].into_iter().collect(),
        };

        assert_eq!(apply(&EffectivePolicy::allow_all(), Recorded::Untouched), Recorded::Untouched);
        assert_eq!(apply(&with(true), Recorded::Untouched), Recorded::Excluded(1));
        assert_eq!(apply(&with(false), Recorded::Untouched), Recorded::Only(1));
        assert_eq!(apply(&EffectivePolicy::deny_all(), Recorded::Untouched), Recorded::Empty);
    }

    #[test]
    fn allows_is_default_xor_exception() {
        let listed = ObjectId::new();
        let other = ObjectId::new();
        let policy = EffectivePolicy {
            default: true,
            exceptions: [listed].into_iter().collect(),
        };

        assert!(!policy.allows(listed));
        assert!(policy.allows(other));
        assert_eq!(policy.to_filter().admits(listed), policy.allows(listed));

        let inverted = EffectivePolicy {
            default: false,
            ..policy
        };
        assert!(inverted.allows(listed));
        assert!(!inverted.allows(other));
    }

    mod properties {
        use proptest::prelude::*;
        use uuid::Uuid;

        use super::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: the pushed-down filter admits exactly what the policy allows.
            #[test]
            fn filter_matches_policy(
                default in any::<bool>(),
                pool in prop::collection::btree_set(any::<u128>(), 1..32),
                picks in prop::collection::vec(any::<bool>(), 32),
            ) {
                let ids: Vec<ObjectId> = pool
                    .into_iter()
                    .map(|n| ObjectId::from(Uuid::from_u128(n)))
                    .collect();
                let exceptions = ids
                    .iter()
                    .zip(&picks)
                    .filter(|(_, picked)| **picked)
                    .map(|(id, _)| *id)
                    .collect();
                let policy = EffectivePolicy { default, exceptions };
                let filter = policy.to_filter();

                for id in &ids {
                    prop_assert_eq!(filter.admits(*id), policy.allows(*id));
                }
            }
        }
    }
}
