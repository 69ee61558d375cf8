//! Multi-scope primary-key occupancy tracking.
//!
//! [`KeyIndex`] records which primary-key values are currently claimed, at
//! which scope, by which `(group, table)` pair. It is owned state: callers
//! construct one per process (or per test) and pass it by `&mut` wherever
//! registration happens, so exclusive access is the borrow checker's
//! guarantee rather than a hidden global lock.
//!
//! The uniqueness rules form an asymmetric lattice:
//! - a group-scoped key must be free within its own group and must not be
//!   claimed by any global key anywhere;
//! - a global key must be free across the entire key space, including every
//!   group-scoped occupant.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use tabula_model::{ConfigTable, KeyScope};

/// The `(group, table)` pair currently holding a key value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyOwner {
    pub group: String,
    pub table: String,
}

impl KeyOwner {
    fn new(group: &str, table: &str) -> Self {
        Self {
            group: group.to_string(),
            table: table.to_string(),
        }
    }
}

/// A primary-key value that is already claimed by another table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "primary key {value} for table '{table}' in group '{group}' already belongs to \
     table '{owner_table}' in group '{owner_group}'"
)]
pub struct KeyConflict {
    pub value: i64,
    /// Group the key was being registered for.
    pub group: String,
    /// Table the key was being registered for.
    pub table: String,
    pub owner_group: String,
    pub owner_table: String,
}

/// Occupancy index over all tables reconciled in one process.
#[derive(Debug, Default)]
pub struct KeyIndex {
    /// Every key registered in a group, regardless of scope: `group -> pk -> table`.
    group_occupancy: HashMap<String, HashMap<i64, String>>,
    /// Keys belonging to globally-scoped tables: `pk -> owner`.
    global_occupancy: HashMap<i64, KeyOwner>,
    /// Every registered key, any scope, any group: `pk -> owner`.
    all_occupancy: HashMap<i64, KeyOwner>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `value` against the uniqueness lattice and claim it for
    /// `(group, table)` at `scope`.
    pub fn register(
        &mut self,
        group: &str,
        table: &str,
        value: i64,
        scope: KeyScope,
    ) -> Result<(), KeyConflict> {
        if let Some(owner) = self.find_conflict(group, value, scope) {
            return Err(KeyConflict {
                value,
                group: group.to_string(),
                table: table.to_string(),
                owner_group: owner.group,
                owner_table: owner.table,
            });
        }
        self.claim(group, table, value, scope);
        Ok(())
    }

    /// Apply a reconciliation diff: drop `removed`, then claim `added`.
    ///
    /// Removal comes first so a key deleted and re-added in the same diff
    /// does not conflict with itself, and is scope-agnostic: the caller
    /// knows the keys belonged to this table. All additions are validated
    /// against the post-removal state before anything is mutated, so a
    /// conflicting diff leaves the index unchanged.
    pub fn apply_diff(
        &mut self,
        group: &str,
        table: &str,
        removed: &BTreeSet<i64>,
        added: &BTreeSet<i64>,
        scope: KeyScope,
    ) -> Result<(), KeyConflict> {
        for &value in added {
            if removed.contains(&value) {
                continue;
            }
            if let Some(owner) = self.find_conflict(group, value, scope) {
                return Err(KeyConflict {
                    value,
                    group: group.to_string(),
                    table: table.to_string(),
                    owner_group: owner.group,
                    owner_table: owner.table,
                });
            }
        }

        for &value in removed {
            if let Some(keys) = self.group_occupancy.get_mut(group) {
                keys.remove(&value);
            }
            self.all_occupancy.remove(&value);
            self.global_occupancy.remove(&value);
        }
        for &value in added {
            self.claim(group, table, value, scope);
        }
        Ok(())
    }

    /// Drop every registration.
    pub fn clear(&mut self) {
        self.group_occupancy.clear();
        self.global_occupancy.clear();
        self.all_occupancy.clear();
    }

    /// Clear, then register every row's primary key of every table.
    ///
    /// Conflicts found here indicate pre-existing corrupted data; they are
    /// collected (and logged) rather than raised, and the scan continues
    /// past the conflicting rows so the index is as complete as the data
    /// allows.
    pub fn rebuild_from<'a>(
        &mut self,
        tables: impl IntoIterator<Item = &'a ConfigTable>,
    ) -> Vec<KeyConflict> {
        self.clear();
        let mut conflicts = Vec::new();
        for table in tables {
            for value in table.primary_keys() {
                if let Err(conflict) = self.register(
                    &table.group_name,
                    &table.table_name,
                    value,
                    table.key_scope,
                ) {
                    log::warn!("occupancy rebuild: {conflict}");
                    conflicts.push(conflict);
                }
            }
        }
        conflicts
    }

    /// The table holding `value` within `group`, if any.
    pub fn group_owner(&self, group: &str, value: i64) -> Option<&str> {
        self.group_occupancy
            .get(group)?
            .get(&value)
            .map(String::as_str)
    }

    /// The owner of `value` among globally-scoped keys, if any.
    pub fn global_owner(&self, value: i64) -> Option<&KeyOwner> {
        self.global_occupancy.get(&value)
    }

    /// The owner of `value` among all registered keys, if any.
    pub fn owner(&self, value: i64) -> Option<&KeyOwner> {
        self.all_occupancy.get(&value)
    }

    /// Total number of registered keys.
    pub fn len(&self) -> usize {
        self.all_occupancy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_occupancy.is_empty()
    }

    fn find_conflict(&self, group: &str, value: i64, scope: KeyScope) -> Option<KeyOwner> {
        if let Some(table) = self.group_owner(group, value) {
            return Some(KeyOwner::new(group, table));
        }
        if let Some(owner) = self.global_occupancy.get(&value) {
            return Some(owner.clone());
        }
        if scope == KeyScope::Global {
            if let Some(owner) = self.all_occupancy.get(&value) {
                return Some(owner.clone());
            }
        }
        None
    }

    fn claim(&mut self, group: &str, table: &str, value: i64, scope: KeyScope) {
        self.group_occupancy
            .entry(group.to_string())
            .or_default()
            .insert(value, table.to_string());
        self.all_occupancy
            .insert(value, KeyOwner::new(group, table));
        if scope == KeyScope::Global {
            self.global_occupancy
                .insert(value, KeyOwner::new(group, table));
        }
    }
}
