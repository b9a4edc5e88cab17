//! Conflict grouping.
//!
//! Policies conflict only with policies of the same rule kind, attribute
//! type and vendor. [`group`] partitions a record set by that key.

use std::collections::HashMap;

use polsat_types::{GroupKey, PolicyRecord};

/// Records sharing one [`GroupKey`], in record order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictGroup {
    key: GroupKey,
    records: Vec<PolicyRecord>,
}

impl ConflictGroup {
    /// Creates a group from records that all carry `key`.
    pub fn new(key: GroupKey, records: Vec<PolicyRecord>) -> Self {
        debug_assert!(records.iter().all(|r| r.key() == key));
        Self { key, records }
    }

    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    pub fn records(&self) -> &[PolicyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A group conflicts when more than one policy governs its key.
    pub fn is_conflict(&self) -> bool {
        self.records.len() > 1
    }
}

/// Partitions records by key.
///
/// Groups come out in order of first key appearance; records keep their
/// input order within a group.
pub fn group(records: impl IntoIterator<Item = PolicyRecord>) -> Vec<ConflictGroup> {
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<ConflictGroup> = Vec::new();

    for record in records {
        let key = record.key();
        match index.get(&key) {
            Some(&i) => groups[i].records.push(record),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(ConflictGroup {
                    key,
                    records: vec![record],
                });
            }
        }
    }

    groups
}
