use crate::core::{EntityId, EntityKind, Patch};
use std::collections::HashMap;
use std::fmt;

/// Work waiting to be committed for one entity.
pub struct StagedPatch<K: EntityKind> {
    /// Sent to the remote store.
    pub wire: Patch<K>,
    /// Applied to the local cache once the wire patch is committed.
    pub local: Patch<K>,
}

impl<K: EntityKind> StagedPatch<K> {
    pub fn new(wire: Patch<K>, local: Patch<K>) -> Self {
        Self { wire, local }
    }

    pub fn has_wire_changes(&self) -> bool {
        !self.wire.is_empty()
    }
}

impl<K: EntityKind> Clone for StagedPatch<K> {
    fn clone(&self) -> Self {
        Self {
            wire: self.wire.clone(),
            local: self.local.clone(),
        }
    }
}

impl<K: EntityKind> PartialEq for StagedPatch<K> {
    fn eq(&self, other: &Self) -> bool {
        self.wire == other.wire && self.local == other.local
    }
}

impl<K: EntityKind> fmt::Debug for StagedPatch<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedPatch")
            .field("wire", &self.wire)
            .field("local", &self.local)
            .finish()
    }
}

/// Per-entity accumulation of pending field changes.
///
/// Staging is synchronous and never performs I/O; repeated stages of the same
/// field overwrite the previous value.
pub struct PatchStager<K: EntityKind> {
    staged: HashMap<EntityId, StagedPatch<K>>,
}

impl<K: EntityKind> PatchStager<K> {
    pub fn new() -> Self {
        Self {
            staged: HashMap::new(),
        }
    }

    /// Merges both patches into the entry for `entity_id`.
    ///
    /// Returns `true` if the staged entry changed. Two empty patches are
    /// refused without creating an entry.
    pub fn stage(&mut self, entity_id: &EntityId, wire: Patch<K>, local: Patch<K>) -> bool {
        if wire.is_empty() && local.is_empty() {
            return false;
        }

        let entry = self
            .staged
            .entry(entity_id.clone())
            .or_insert_with(|| StagedPatch::new(Patch::new(), Patch::new()));
        let wire_changed = entry.wire.merge(&wire);
        let local_changed = entry.local.merge(&local);
        wire_changed || local_changed
    }

    /// Puts a claimed patch back after a failed commit. Anything staged while
    /// it was in flight is newer and keeps precedence.
    pub fn restage(&mut self, entity_id: &EntityId, failed: StagedPatch<K>) {
        match self.staged.get_mut(entity_id) {
            Some(newer) => {
                newer.wire.merge_under(failed.wire);
                newer.local.merge_under(failed.local);
            }
            None => {
                self.staged.insert(entity_id.clone(), failed);
            }
        }
    }

    /// Removes and returns the entry so it cannot be claimed twice.
    pub fn take(&mut self, entity_id: &EntityId) -> Option<StagedPatch<K>> {
        self.staged.remove(entity_id)
    }

    pub fn peek(&self, entity_id: &EntityId) -> Option<&StagedPatch<K>> {
        self.staged.get(entity_id)
    }

    /// Any entry counts, local-only ones included. Entries are never empty.
    pub fn has_pending(&self, entity_id: &EntityId) -> bool {
        self.staged.contains_key(entity_id)
    }

    /// Drops every entry except the one for `except`. Returns the ids whose
    /// pending wire changes were discarded.
    pub fn clear(&mut self, except: Option<&EntityId>) -> Vec<EntityId> {
        let mut dropped = Vec::new();
        self.staged.retain(|entity_id, staged| {
            if Some(entity_id) == except {
                return true;
            }
            if staged.has_wire_changes() {
                dropped.push(entity_id.clone());
            }
            false
        });
        dropped.sort();
        dropped
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }
}

impl<K: EntityKind> Default for PatchStager<K> {
    fn default() -> Self {
        Self::new()
    }
}
