//! Set difference between membership and valid certificates.

use std::collections::BTreeSet;

use serde::Serialize;

/// What one cycle has to do. Both sets are disjoint by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationPlan {
    pub to_create: BTreeSet<String>,
    pub to_delete: BTreeSet<String>,
}

impl ReconciliationPlan {
    /// `to_create = members \ certificates`, `to_delete = certificates \ members`.
    pub fn compute(members: &BTreeSet<String>, certificates: &BTreeSet<String>) -> Self {
        Self {
            to_create: members.difference(certificates).cloned().collect(),
            to_delete: certificates.difference(members).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }
}
