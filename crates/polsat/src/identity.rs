//! Identity registry.
//!
//! Users and groups are resolved to small integers on first sighting. The
//! registry lives for one run, so a name seen in the first file keeps its
//! id in every later file. Ids are handed out from 1 upward and must fit
//! the 16-bit selector domain.

use std::collections::HashMap;

use polsat_document::PolicyEntry;
use polsat_types::{IdentityId, PolicyRecord};
use tracing::trace;

use crate::error::{AnalysisError, Result};

/// Bidirectional name ↔ id mapping shared by every group of a run.
#[derive(Debug)]
pub struct IdentityRegistry {
    ids: HashMap<String, IdentityId>,
    /// Names by id, offset by one (id 1 is at index 0).
    names: Vec<String>,
    /// Next id to hand out. `None` once the selector domain is exhausted.
    next: Option<IdentityId>,
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self {
            ids: HashMap::new(),
            names: Vec::new(),
            next: Some(IdentityId::FIRST),
        }
    }
}

impl IdentityRegistry {
    /// Most identities a registry can hold.
    pub const CAPACITY: usize = u16::MAX as usize;

    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `name`, assigning the next free id if it is new.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::IdentityDomainExceeded`] once every id of
    /// the selector domain is taken.
    pub fn resolve(&mut self, name: &str) -> Result<IdentityId> {
        if let Some(id) = self.ids.get(name) {
            return Ok(*id);
        }

        let id = self.next.ok_or(AnalysisError::IdentityDomainExceeded {
            limit: Self::CAPACITY,
        })?;
        self.ids.insert(name.to_string(), id);
        self.names.push(name.to_string());
        self.next = id.checked_next();
        trace!(name, id = %id, "Registered identity");
        Ok(id)
    }

    /// Reverse lookup.
    pub fn name_of(&self, id: IdentityId) -> Result<&str> {
        usize::from(id.as_u16())
            .checked_sub(1)
            .and_then(|index| self.names.get(index))
            .map(String::as_str)
            .ok_or(AnalysisError::UnknownIdentity(id))
    }

    /// Looks up a name without registering it.
    pub fn get(&self, name: &str) -> Option<IdentityId> {
        self.ids.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Turns an extracted entry into a record, resolving users then groups
    /// in listed order.
    pub fn resolve_entry(&mut self, entry: PolicyEntry) -> Result<PolicyRecord> {
        let users = entry
            .users
            .iter()
            .map(|name| self.resolve(name))
            .collect::<Result<Vec<_>>>()?;
        let groups = entry
            .groups
            .iter()
            .map(|name| self.resolve(name))
            .collect::<Result<Vec<_>>>()?;

        Ok(PolicyRecord {
            rule: entry.rule,
            description: entry.description,
            attribute_type: entry.attribute_type,
            vendor: entry.vendor,
            valid_from: entry.time,
            users,
            groups,
        })
    }

    /// Resolves every entry of a document, in document order.
    pub fn resolve_entries(&mut self, entries: Vec<PolicyEntry>) -> Result<Vec<PolicyRecord>> {
        entries
            .into_iter()
            .map(|entry| self.resolve_entry(entry))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polsat_types::Rule;
    use proptest::prelude::*;

    fn entry(users: &[&str], groups: &[&str]) -> PolicyEntry {
        PolicyEntry {
            rule: Rule::Access,
            description: String::new(),
            attribute_type: "password".to_string(),
            vendor: "Latas".to_string(),
            time: None,
            users: users.iter().map(ToString::to_string).collect(),
            groups: groups.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn ids_start_at_one_in_first_seen_order() {
        let mut registry = IdentityRegistry::new();
        assert_eq!(registry.resolve("user1").unwrap(), IdentityId::FIRST);
        assert_eq!(registry.resolve("user2").unwrap(), IdentityId::new(2));
        assert_eq!(registry.resolve("user1").unwrap(), IdentityId::FIRST);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn reverse_lookup() {
        let mut registry = IdentityRegistry::new();
        let id = registry.resolve("groupC").unwrap();
        assert_eq!(registry.name_of(id).unwrap(), "groupC");
        assert!(matches!(
            registry.name_of(IdentityId::new(0)),
            Err(AnalysisError::UnknownIdentity(_))
        ));
        assert!(matches!(
            registry.name_of(IdentityId::new(9)),
            Err(AnalysisError::UnknownIdentity(_))
        ));
    }

    #[test]
    fn users_and_groups_share_a_namespace() {
        let mut registry = IdentityRegistry::new();
        let record = registry
            .resolve_entry(entry(&["user1", "user3"], &["groupA", "user1"]))
            .unwrap();
        assert_eq!(record.users, vec![IdentityId::new(1), IdentityId::new(2)]);
        assert_eq!(record.groups, vec![IdentityId::new(3), IdentityId::new(1)]);
        assert_eq!(record.attribute_type, "password");
    }

    #[test]
    fn entries_resolve_in_document_order() {
        let mut registry = IdentityRegistry::new();
        let records = registry
            .resolve_entries(vec![entry(&["b"], &[]), entry(&["a", "b"], &["g"])])
            .unwrap();
        assert_eq!(records[0].users, vec![IdentityId::new(1)]);
        assert_eq!(records[1].users, vec![IdentityId::new(2), IdentityId::new(1)]);
        assert_eq!(registry.get("g"), Some(IdentityId::new(3)));
    }

    #[test]
    fn domain_is_exhausted_after_capacity() {
        let mut registry = IdentityRegistry::new();
        for i in 0..IdentityRegistry::CAPACITY {
            registry.resolve(&format!("id{i}")).unwrap();
        }
        assert_eq!(registry.get("id65534"), Some(IdentityId::MAX));

        // Known names still resolve, new ones do not
        assert_eq!(registry.resolve("id0").unwrap(), IdentityId::FIRST);
        assert!(matches!(
            registry.resolve("one-too-many"),
            Err(AnalysisError::IdentityDomainExceeded { limit: 65_535 })
        ));
        assert_eq!(registry.len(), IdentityRegistry::CAPACITY);

        // A failed registration leaves the registry untouched
        assert!(registry.get("one-too-many").is_none());
        assert!(registry.resolve("another").is_err());
        assert_eq!(registry.name_of(IdentityId::MAX).unwrap(), "id65534");
    }

    proptest! {
        #[test]
        fn resolve_is_injective_and_idempotent(names in prop::collection::vec("[a-z]{1,4}", 0..50)) {
            let mut registry = IdentityRegistry::new();
            let ids: Vec<IdentityId> = names.iter().map(|n| registry.resolve(n).unwrap()).collect();

            for (name, id) in names.iter().zip(&ids) {
                prop_assert_eq!(registry.resolve(name).unwrap(), *id);
                prop_assert_eq!(registry.name_of(*id).unwrap(), name.as_str());
            }
            for (i, a) in names.iter().enumerate() {
                for (j, b) in names.iter().enumerate() {
                    prop_assert_eq!(a == b, ids[i] == ids[j]);
                }
            }
        }
    }
}
