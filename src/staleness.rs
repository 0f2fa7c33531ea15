use crate::core::EntityId;
use crate::store::ActiveEntitySource;
use std::sync::Arc;

/// Which entity a commit is for, and whether it may be discarded once the
/// user has moved on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitTarget {
    /// Commit only while this entity is still the active one.
    Active(EntityId),
    /// Commit regardless of what is active (manual retry of a past save).
    Pinned(EntityId),
}

impl CommitTarget {
    pub fn entity_id(&self) -> &EntityId {
        match self {
            Self::Active(id) | Self::Pinned(id) => id,
        }
    }

    pub fn is_pinned(&self) -> bool {
        matches!(self, Self::Pinned(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimVerdict {
    Commit,
    /// The patch targets an entity that is no longer open.
    Discard { active: Option<EntityId> },
}

/// Compares a patch's entity against the entity the user is looking at.
///
/// Checked twice per commit: when a staged patch is claimed and again before
/// the optimistic local patch is applied.
#[derive(Clone)]
pub struct StalenessGuard {
    source: Arc<dyn ActiveEntitySource>,
}

impl StalenessGuard {
    pub fn new(source: Arc<dyn ActiveEntitySource>) -> Self {
        Self { source }
    }

    pub fn active_entity_id(&self) -> Option<EntityId> {
        self.source.active_entity_id()
    }

    pub fn is_active(&self, entity_id: &EntityId) -> bool {
        self.active_entity_id().as_ref() == Some(entity_id)
    }

    pub fn check_claim(&self, target: &CommitTarget) -> ClaimVerdict {
        if target.is_pinned() {
            return ClaimVerdict::Commit;
        }
        let active = self.active_entity_id();
        if active.as_ref() == Some(target.entity_id()) {
            ClaimVerdict::Commit
        } else {
            ClaimVerdict::Discard { active }
        }
    }
}
