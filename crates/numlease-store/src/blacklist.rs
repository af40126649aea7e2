//! Permanently excluded (phone, project) pairs.
//!
//! Like [`LeaseStore`](crate::LeaseStore), this is only touched under a
//! [`NumberBook`](crate::NumberBook) shard lock.

use std::collections::HashMap;

use numlease_types::{AccountId, BlacklistEntry, PhoneNumber, ProjectId};

/// Result of [`BlacklistStore::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlacklistInsert {
    Inserted,
    AlreadyPresent,
}

#[derive(Debug, Default, Clone)]
pub struct BlacklistStore {
    entries: HashMap<PhoneNumber, HashMap<ProjectId, BlacklistEntry>>,
}

impl BlacklistStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, phone: &PhoneNumber, project: &ProjectId) -> bool {
        self.entries
            .get(phone)
            .is_some_and(|scopes| scopes.contains_key(project))
    }

    /// Exclude `phone` within `project`. An existing entry is left as is.
    pub fn insert(
        &mut self,
        phone: PhoneNumber,
        project: ProjectId,
        account: AccountId,
    ) -> BlacklistInsert {
        let scopes = self.entries.entry(phone.clone()).or_default();
        if scopes.contains_key(&project) {
            return BlacklistInsert::AlreadyPresent;
        }
        scopes.insert(
            project.clone(),
            BlacklistEntry::new(phone, project, account),
        );
        BlacklistInsert::Inserted
    }

    /// Put back an exported entry as is.
    pub fn restore(&mut self, entry: BlacklistEntry) {
        self.entries
            .entry(entry.phone.clone())
            .or_default()
            .insert(entry.project.clone(), entry);
    }

    /// Lift the exclusion of `phone` within `project`.
    pub fn remove(&mut self, phone: &PhoneNumber, project: &ProjectId) -> Option<BlacklistEntry> {
        let scopes = self.entries.get_mut(phone)?;
        let removed = scopes.remove(project);
        if scopes.is_empty() {
            self.entries.remove(phone);
        }
        removed
    }

    /// Number of (phone, project) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlacklistEntry> {
        self.entries.values().flat_map(HashMap::values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_scoped_by_project() {
        let mut bl = BlacklistStore::new();
        let phone = PhoneNumber::new("13800000001");
        let acct = AccountId::new();
        assert_eq!(
            bl.insert(phone.clone(), "p".into(), acct),
            BlacklistInsert::Inserted
        );
        assert!(bl.contains(&phone, &"p".into()));
        assert!(!bl.contains(&phone, &"q".into()));
        assert_eq!(
            bl.insert(phone.clone(), "q".into(), acct),
            BlacklistInsert::Inserted
        );
        assert_eq!(bl.len(), 2);
    }

    #[test]
    fn duplicate_insert_keeps_original() {
        let mut bl = BlacklistStore::new();
        let phone = PhoneNumber::new("13800000001");
        let first = AccountId::new();
        bl.insert(phone.clone(), "p".into(), first);
        assert_eq!(
            bl.insert(phone.clone(), "p".into(), AccountId::new()),
            BlacklistInsert::AlreadyPresent
        );
        assert_eq!(bl.iter().next().unwrap().owner, first);
    }

    #[test]
    fn remove_only_touches_one_scope() {
        let mut bl = BlacklistStore::new();
        let phone = PhoneNumber::new("13800000001");
        bl.insert(phone.clone(), "p".into(), AccountId::new());
        bl.insert(phone.clone(), "q".into(), AccountId::new());

        assert!(bl.remove(&phone, &"p".into()).is_some());
        assert!(!bl.contains(&phone, &"p".into()));
        assert!(bl.contains(&phone, &"q".into()));
        assert!(bl.remove(&phone, &"p".into()).is_none());

        bl.remove(&phone, &"q".into());
        assert!(bl.is_empty());
    }
}
