use super::{ActiveEntitySource, LocalStore};
use crate::core::{EntityId, EntityKind, Patch, Result};
use std::sync::Mutex;
use tracing::{Level, event};

struct InspectorSlot<K: EntityKind> {
    record: Option<K::Record>,
    open: bool,
}

/// Holds the record currently open in the inspector.
///
/// It is both the local cache that optimistic patches land in and the source
/// of truth for which entity is active.
pub struct InspectorStore<K: EntityKind> {
    slot: Mutex<InspectorSlot<K>>,
}

impl<K: EntityKind> InspectorStore<K> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(InspectorSlot {
                record: None,
                open: false,
            }),
        }
    }

    pub fn open(&self, record: K::Record) -> Result<()> {
        let mut slot = self.slot.lock()?;
        slot.record = Some(record);
        slot.open = true;
        Ok(())
    }

    /// Hides the inspector. The last record is kept and stays the active
    /// entity until another record is opened, so work already queued for it
    /// still commits.
    pub fn close(&self) -> Result<()> {
        self.slot.lock()?.open = false;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.slot.lock().map(|slot| slot.open).unwrap_or(false)
    }

    pub fn current(&self) -> Option<K::Record> {
        self.slot.lock().ok().and_then(|slot| slot.record.clone())
    }

    /// Replaces the open record with a fresher copy of the same entity.
    pub fn replace(&self, record: K::Record) -> Result<()> {
        let mut slot = self.slot.lock()?;
        let same = slot
            .record
            .as_ref()
            .is_some_and(|current| K::record_id(current) == K::record_id(&record));
        if same {
            slot.record = Some(record);
        }
        Ok(())
    }
}

impl<K: EntityKind> Default for InspectorStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityKind> LocalStore<K> for InspectorStore<K> {
    fn patch_local(&self, entity_id: &EntityId, patch: &Patch<K>) {
        let Ok(mut slot) = self.slot.lock() else {
            return;
        };
        match slot.record.as_mut() {
            Some(record) if K::record_id(record) == entity_id => patch.apply_to(record),
            _ => event!(
                Level::DEBUG,
                kind = K::KIND,
                entity_id = %entity_id,
                "local patch ignored: record not open"
            ),
        }
    }
}

impl<K: EntityKind> ActiveEntitySource for InspectorStore<K> {
    fn active_entity_id(&self) -> Option<EntityId> {
        let slot = self.slot.lock().ok()?;
        slot.record.as_ref().map(|record| K::record_id(record).clone())
    }
}
