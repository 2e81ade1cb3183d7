use crate::Id;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// The ordered list of policy rule ids a checklist selects, stored as JSON.
///
/// Order is significant: it is the order rules are presented when the
/// checklist is resolved. Duplicate ids are dropped, keeping the first.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult,
)]
#[serde(from = "Vec<Id>", into = "Vec<Id>")]
pub struct Ruleset(Vec<Id>);

impl Ruleset {
    pub fn new<I: IntoIterator<Item = Id>>(rule_ids: I) -> Self {
        let mut seen = std::collections::HashSet::new();
        Self(rule_ids.into_iter().filter(|id| seen.insert(*id)).collect())
    }

    pub fn ids(&self) -> &[Id] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<Id>> for Ruleset {
    fn from(rule_ids: Vec<Id>) -> Self {
        Self::new(rule_ids)
    }
}

impl From<Ruleset> for Vec<Id> {
    fn from(ruleset: Ruleset) -> Self {
        ruleset.0
    }
}
