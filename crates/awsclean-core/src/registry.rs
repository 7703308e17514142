//! Keyed collection of partial security-group records.
//!
//! Records are keyed by group name. A secondary id → name index is kept in
//! step with every insert, merge and removal so evidence keyed by group id
//! (as the audit trail reports it) finds the same record.
//!
//! # Invariants
//!
//! - At most one record per group name.
//! - Every record with a known group id has exactly one index entry pointing
//!   at its name key.
//! - Merging is the only way an existing record changes.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{error, info};

use crate::merge::MergeError;
use crate::model::SecurityGroup;

/// Validation and merge failures of [`SecurityGroups::add_or_update`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The record has no usable key.
    #[error("security group has an empty name")]
    EmptyName,

    /// Fresh records must carry the API descriptor.
    #[error("security group '{0}' has no descriptor")]
    MissingDescriptor(String),

    /// The record matched an existing entry but could not be merged cleanly.
    #[error(transparent)]
    Merge(#[from] MergeError),
}

/// Security groups keyed by name with a secondary id index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityGroups {
    by_name: BTreeMap<String, SecurityGroup>,
    by_id: HashMap<String, String>,
}

impl SecurityGroups {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// `true` when no record is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Record stored under exactly this name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SecurityGroup> {
        self.by_name.get(name)
    }

    /// `true` when a record is stored under this name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Record matching a group name, or failing that a group id.
    #[must_use]
    pub fn get_by_id_or_name(&self, id_or_name: &str) -> Option<&SecurityGroup> {
        self.resolve_key(id_or_name)
            .and_then(|key| self.by_name.get(key))
    }

    /// Records in name order.
    pub fn iter(&self) -> impl Iterator<Item = &SecurityGroup> {
        self.by_name.values()
    }

    /// Name keys in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Validate and insert a record, merging into an existing entry of the
    /// same name.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::EmptyName`] if the record has no name.
    /// - [`RegistryError::MissingDescriptor`] if the record carries no
    ///   descriptor.
    /// - [`RegistryError::Merge`] if it collided with the existing entry;
    ///   the non-descriptor fields are merged regardless.
    pub fn add_or_update(&mut self, record: SecurityGroup) -> Result<(), RegistryError> {
        if record.group_name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if record.descriptor.is_none() {
            return Err(RegistryError::MissingDescriptor(record.group_name));
        }

        let key = record.group_name.clone();
        match self.by_name.get_mut(&key) {
            Some(existing) => {
                let merged = existing.merge_fields(&record);
                self.reindex(&key);
                merged.map_err(RegistryError::from)
            }
            None => {
                self.insert(record);
                Ok(())
            }
        }
    }

    /// Merge every record of `other` into this registry, inserting records
    /// that match nothing.
    ///
    /// Collisions are logged and returned; they do not stop the batch.
    pub fn append_all(&mut self, other: Self) -> Vec<MergeError> {
        let mut collisions = Vec::new();
        for (key, incoming) in other.by_name {
            match self.resolve_key(&key).map(str::to_owned) {
                Some(target) => {
                    if let Err(err) = self.merge_into(&target, &incoming) {
                        error!(group = %key, error = %err, "append_all: merge failed");
                        collisions.push(err);
                    }
                }
                None => self.insert(incoming),
            }
        }
        collisions
    }

    /// Merge records of `other` that match an existing entry; return the
    /// rest untouched.
    ///
    /// Never inserts a new key. Collisions are logged and do not stop the
    /// batch.
    pub fn update_if_exists(&mut self, other: Self) -> Self {
        let mut skipped = Self::new();
        for (key, incoming) in other.by_name {
            match self.resolve_key(&key).map(str::to_owned) {
                Some(target) => {
                    if let Err(err) = self.merge_into(&target, &incoming) {
                        error!(group = %key, error = %err, "update_if_exists: merge failed");
                    }
                }
                None => {
                    info!(group = %key, "group no longer exists, skipping update");
                    skipped.insert(incoming);
                }
            }
        }
        skipped
    }

    /// Remove every record matched (by name or id) by an entry of `skipped`.
    pub fn delete_skipped(&mut self, skipped: &Self) {
        let doomed: Vec<String> = self
            .by_name
            .iter()
            .filter(|(name, record)| {
                skipped.resolve_key(name).is_some()
                    || record
                        .group_id()
                        .is_some_and(|id| skipped.resolve_key(id).is_some())
            })
            .map(|(name, _)| name.clone())
            .collect();

        for name in doomed {
            self.remove(&name);
        }
    }

    /// Records of this registry that no entry of `evidence` refers to.
    #[must_use]
    pub fn unconfirmed_by(&self, evidence: &Self) -> Self {
        let confirmed: BTreeSet<&str> = evidence
            .names()
            .filter_map(|key| self.resolve_key(key))
            .collect();

        self.by_name
            .values()
            .filter(|record| !confirmed.contains(record.group_name.as_str()))
            .cloned()
            .collect()
    }

    /// Remove and return the record stored under `name`.
    pub fn remove(&mut self, name: &str) -> Option<SecurityGroup> {
        let removed = self.by_name.remove(name)?;
        self.by_id.retain(|_, key| key.as_str() != name);
        Some(removed)
    }

    /// Insert or replace verbatim, keyed by the record's group name.
    fn insert(&mut self, record: SecurityGroup) {
        let key = record.group_name.clone();
        if let Some(id) = record.group_id() {
            self.by_id.insert(id.to_string(), key.clone());
        }
        self.by_name.insert(key, record);
    }

    fn merge_into(&mut self, target: &str, incoming: &SecurityGroup) -> Result<(), MergeError> {
        let Some(existing) = self.by_name.get_mut(target) else {
            return Ok(());
        };
        let merged = existing.merge_fields(incoming);
        self.reindex(target);
        merged
    }

    fn reindex(&mut self, key: &str) {
        if let Some(id) = self.by_name.get(key).and_then(SecurityGroup::group_id) {
            self.by_id.insert(id.to_string(), key.to_string());
        }
    }

    fn resolve_key<'a>(&'a self, id_or_name: &'a str) -> Option<&'a str> {
        if self.by_name.contains_key(id_or_name) {
            return Some(id_or_name);
        }
        self.by_id.get(id_or_name).map(String::as_str)
    }
}

impl FromIterator<SecurityGroup> for SecurityGroups {
    fn from_iter<I: IntoIterator<Item = SecurityGroup>>(iter: I) -> Self {
        let mut groups = Self::new();
        for record in iter {
            groups.insert(record);
        }
        groups
    }
}

impl IntoIterator for SecurityGroups {
    type Item = SecurityGroup;
    type IntoIter = std::collections::btree_map::IntoValues<String, SecurityGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.by_name.into_values()
    }
}

impl<'a> IntoIterator for &'a SecurityGroups {
    type Item = &'a SecurityGroup;
    type IntoIter = std::collections::btree_map::Values<'a, String, SecurityGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.by_name.values()
    }
}
