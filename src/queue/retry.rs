use crate::core::{EntityId, EntityKind};
use crate::stager::StagedPatch;
use std::fmt;

/// Last patch whose commit exhausted every inline attempt.
///
/// There is at most one per engine; it is replaced by the next failure and
/// cleared by the next successful commit of the same entity.
pub struct RetrySnapshot<K: EntityKind> {
    pub entity_id: EntityId,
    pub staged: StagedPatch<K>,
}

impl<K: EntityKind> RetrySnapshot<K> {
    pub fn new(entity_id: EntityId, staged: StagedPatch<K>) -> Self {
        Self { entity_id, staged }
    }

    pub fn belongs_to(&self, entity_id: Option<&EntityId>) -> bool {
        entity_id == Some(&self.entity_id)
    }
}

impl<K: EntityKind> Clone for RetrySnapshot<K> {
    fn clone(&self) -> Self {
        Self {
            entity_id: self.entity_id.clone(),
            staged: self.staged.clone(),
        }
    }
}

impl<K: EntityKind> PartialEq for RetrySnapshot<K> {
    fn eq(&self, other: &Self) -> bool {
        self.entity_id == other.entity_id && self.staged == other.staged
    }
}

impl<K: EntityKind> fmt::Debug for RetrySnapshot<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySnapshot")
            .field("entity_id", &self.entity_id)
            .field("staged", &self.staged)
            .finish()
    }
}
