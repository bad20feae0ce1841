//! Action planning
//!
//! Computes the create/edit/delete actions that turn the existing records of
//! one domain name into the desired ones. Planning is pure; execution lives
//! in [`super::Reconciler`].
//!
//! ## Matching
//!
//! 1. A desired record equal to an existing one (see [`Record::same_as`])
//!    pairs with it and yields [`Action::Unchanged`].
//! 2. Remaining records pair up by slot, i.e. by record type within the
//!    name: each unmatched desired record takes the next unmatched existing
//!    record of the same type and yields [`Action::Edit`].
//! 3. Desired records left over yield [`Action::Create`]; existing records
//!    left over yield [`Action::Delete`].
//!
//! Existing records of types outside the managed set are ignored. Pairing
//! follows the order the provider returned records in, so plans are
//! deterministic.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record::{DomainName, Record, RecordType};

/// Kind of an [`Action`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Create,
    Edit,
    Delete,
    Unchanged,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionKind::Create => "create",
            ActionKind::Edit => "edit",
            ActionKind::Delete => "delete",
            ActionKind::Unchanged => "none",
        };
        f.write_str(s)
    }
}

/// One step of a reconciliation plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Create `record`
    Create { record: Record },
    /// Replace the existing record `id` (currently `current`) with `record`
    Edit {
        id: String,
        current: Record,
        record: Record,
    },
    /// Delete the existing record `id`
    Delete { id: String, record: Record },
    /// The existing record already matches
    Unchanged { record: Record },
}

impl Action {
    /// Kind of this action
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Create { .. } => ActionKind::Create,
            Action::Edit { .. } => ActionKind::Edit,
            Action::Delete { .. } => ActionKind::Delete,
            Action::Unchanged { .. } => ActionKind::Unchanged,
        }
    }

    /// Identifier of the existing record this action targets, if any
    pub fn target_id(&self) -> Option<&str> {
        match self {
            Action::Create { .. } => None,
            Action::Edit { id, .. } | Action::Delete { id, .. } => Some(id),
            Action::Unchanged { record } => record.id.as_deref(),
        }
    }

    /// The record payload carried by this action
    pub fn record(&self) -> &Record {
        match self {
            Action::Create { record }
            | Action::Edit { record, .. }
            | Action::Delete { record, .. }
            | Action::Unchanged { record } => record,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Edit { current, record, .. } => write!(
                f,
                "edit {} -> {} {}",
                current,
                record.content,
                record.effective_ttl()
            ),
            other => write!(f, "{} {}", other.kind(), other.record()),
        }
    }
}

/// Actions for one domain name, in application order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Domain name the plan applies to
    pub name: DomainName,
    /// Unchanged records first, then creates, deletes and edits
    pub actions: Vec<Action>,
    /// Unmatched existing records without a provider identifier; they can
    /// be neither edited nor deleted
    pub orphans: Vec<Record>,
}

impl Plan {
    /// Compute the plan converging `existing` to `desired`
    ///
    /// # Parameters
    ///
    /// - `name`: The domain name being reconciled
    /// - `desired`: Records that should exist at `name`
    /// - `existing`: Records the provider currently holds at `name`
    /// - `managed`: Record types owned by this system at `name`
    pub fn compute(
        name: &DomainName,
        desired: &[Record],
        existing: &[Record],
        managed: &[RecordType],
    ) -> Self {
        let mut wanted: Vec<Record> = Vec::with_capacity(desired.len());
        for record in desired {
            let record = record.normalized();
            if !wanted.iter().any(|w| w.same_as(&record)) {
                wanted.push(Record { id: None, ..record });
            }
        }

        let current: Vec<&Record> = existing
            .iter()
            .filter(|e| e.name == *name && managed.contains(&e.record_type))
            .collect();

        let mut matched = vec![false; current.len()];
        let mut unchanged = Vec::new();
        let mut unmatched = Vec::new();

        for record in wanted {
            let hit = (0..current.len()).find(|&i| !matched[i] && current[i].same_as(&record));
            match hit {
                Some(i) => {
                    matched[i] = true;
                    unchanged.push(Action::Unchanged {
                        record: current[i].clone(),
                    });
                }
                None => unmatched.push(record),
            }
        }

        let mut orphans = Vec::new();
        let mut spare: Vec<(String, &Record)> = Vec::new();
        for (i, record) in current.iter().enumerate() {
            if matched[i] {
                continue;
            }
            match &record.id {
                Some(id) => spare.push((id.clone(), record)),
                None => orphans.push((*record).clone()),
            }
        }

        let mut creates = Vec::new();
        let mut edits = Vec::new();
        for record in unmatched {
            match spare.iter().position(|(_, e)| e.record_type == record.record_type) {
                Some(pos) => {
                    let (id, current) = spare.remove(pos);
                    edits.push(Action::Edit {
                        id,
                        current: current.clone(),
                        record,
                    });
                }
                None => creates.push(Action::Create { record }),
            }
        }

        let deletes = spare.into_iter().map(|(id, record)| Action::Delete {
            id,
            record: record.clone(),
        });

        let mut actions = unchanged;
        actions.extend(creates);
        actions.extend(deletes);
        actions.extend(edits);

        Self {
            name: name.clone(),
            actions,
            orphans,
        }
    }

    /// Actions that change provider state
    pub fn changes(&self) -> impl Iterator<Item = &Action> {
        self.actions
            .iter()
            .filter(|a| a.kind() != ActionKind::Unchanged)
    }

    /// Number of actions of `kind`
    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions.iter().filter(|a| a.kind() == kind).count()
    }

    /// Whether applying this plan changes nothing
    pub fn is_noop(&self) -> bool {
        self.changes().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn host() -> DomainName {
        DomainName::new("example.com", "host")
    }

    fn a(content: &str) -> Record {
        Record::new(host(), RecordType::A, content)
    }

    fn aaaa(content: &str) -> Record {
        Record::new(host(), RecordType::Aaaa, content)
    }

    const MANAGED: &[RecordType] = &[RecordType::A, RecordType::Aaaa];

    #[test]
    fn test_create_into_empty() {
        let plan = Plan::compute(&host(), &[a("1.2.3.4").with_ttl(Some(300))], &[], MANAGED);
        assert_eq!(plan.actions.len(), 1);
        match &plan.actions[0] {
            Action::Create { record } => assert_eq!(record.content, "1.2.3.4"),
            other => panic!("expected create, got {:?}", other),
        }
    }

    #[test]
    fn test_edit_same_slot() {
        let plan = Plan::compute(&host(), &[a("1.2.3.4")], &[a("5.6.7.8").with_id("42")], MANAGED);
        assert_eq!(plan.actions.len(), 1);
        match &plan.actions[0] {
            Action::Edit { id, record, .. } => {
                assert_eq!(id, "42");
                assert_eq!(record.content, "1.2.3.4");
                assert!(record.id.is_none());
            }
            other => panic!("expected edit, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_surplus() {
        let plan = Plan::compute(&host(), &[], &[a("1.2.3.4").with_id("7")], MANAGED);
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].kind(), ActionKind::Delete);
        assert_eq!(plan.actions[0].target_id(), Some("7"));
    }

    #[test]
    fn test_identical_is_noop() {
        let plan = Plan::compute(&host(), &[a("1.2.3.4")], &[a("1.2.3.4").with_id("9")], MANAGED);
        assert!(plan.is_noop());
        assert_eq!(plan.count(ActionKind::Unchanged), 1);
    }

    #[test]
    fn test_types_never_cross_slots() {
        let plan = Plan::compute(
            &host(),
            &[aaaa("2001:db8::1")],
            &[a("1.2.3.4").with_id("1")],
            MANAGED,
        );
        assert_eq!(plan.count(ActionKind::Create), 1);
        assert_eq!(plan.count(ActionKind::Delete), 1);
        assert_eq!(plan.count(ActionKind::Edit), 0);
    }

    #[test]
    fn test_unmanaged_types_are_ignored() {
        let mx = Record::new(host(), RecordType::Mx, "mail.example.com")
            .with_priority(Some(10))
            .with_id("mx1");
        let plan = Plan::compute(&host(), &[a("1.2.3.4")], &[mx], &[RecordType::A]);
        assert_eq!(plan.count(ActionKind::Create), 1);
        assert_eq!(plan.count(ActionKind::Delete), 0);
    }

    #[test]
    fn test_duplicate_existing_records_are_pruned() {
        let plan = Plan::compute(
            &host(),
            &[a("1.2.3.4")],
            &[a("1.2.3.4").with_id("1"), a("1.2.3.4").with_id("2")],
            MANAGED,
        );
        assert_eq!(plan.count(ActionKind::Unchanged), 1);
        assert_eq!(plan.count(ActionKind::Delete), 1);
        assert_eq!(plan.actions[1].target_id(), Some("2"));
    }

    #[test]
    fn test_duplicate_desired_records_collapse() {
        let plan = Plan::compute(&host(), &[a("1.2.3.4"), a("1.2.3.4")], &[], MANAGED);
        assert_eq!(plan.count(ActionKind::Create), 1);
    }

    #[test]
    fn test_orphans_without_id_are_not_targeted() {
        let plan = Plan::compute(&host(), &[a("1.2.3.4")], &[a("5.6.7.8")], MANAGED);
        assert_eq!(plan.count(ActionKind::Create), 1);
        assert_eq!(plan.count(ActionKind::Edit), 0);
        assert_eq!(plan.orphans.len(), 1);
    }

    #[test]
    fn test_application_order() {
        let desired = [a("1.1.1.1"), a("2.2.2.2"), aaaa("2001:db8::9")];
        let existing = [
            a("9.9.9.9").with_id("a1"),
            aaaa("2001:db8::1").with_id("q1"),
            aaaa("2001:db8::2").with_id("q2"),
        ];
        let plan = Plan::compute(&host(), &desired, &existing, MANAGED);
        let kinds: Vec<ActionKind> = plan.changes().map(Action::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActionKind::Create,
                ActionKind::Delete,
                ActionKind::Edit,
                ActionKind::Edit,
            ]
        );
    }

    #[test]
    fn test_no_record_targeted_twice() {
        let desired = [a("1.1.1.1"), a("2.2.2.2"), a("3.3.3.3")];
        let existing = [
            a("1.1.1.1").with_id("1"),
            a("8.8.8.8").with_id("2"),
            a("9.9.9.9").with_id("3"),
            a("7.7.7.7").with_id("4"),
        ];
        let plan = Plan::compute(&host(), &desired, &existing, MANAGED);
        let mut seen = HashSet::new();
        for id in plan.actions.iter().filter_map(Action::target_id) {
            assert!(seen.insert(id.to_string()), "{} targeted twice", id);
        }
        assert_eq!(plan.count(ActionKind::Edit), 2);
        assert_eq!(plan.count(ActionKind::Delete), 1);
    }
}
