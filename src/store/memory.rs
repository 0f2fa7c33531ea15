use super::RecordStore;
use crate::core::{AutosaveError, EntityId, EntityKind, Patch, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, Semaphore};

/// Scriptable in-memory remote store.
///
/// Successful writes are applied to the seeded records and logged; failures
/// can be queued up front; writes can be held in flight with [`hold`] until
/// [`release`] lets them through.
///
/// [`hold`]: MemoryRecordStore::hold
/// [`release`]: MemoryRecordStore::release
pub struct MemoryRecordStore<K: EntityKind> {
    records: Mutex<HashMap<EntityId, K::Record>>,
    committed: Mutex<Vec<(EntityId, Patch<K>)>>,
    failures: Mutex<VecDeque<String>>,
    attempts: AtomicUsize,
    started: Notify,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl<K: EntityKind> MemoryRecordStore<K> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            committed: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            attempts: AtomicUsize::new(0),
            started: Notify::new(),
            gate: Mutex::new(None),
        }
    }

    pub fn seed(&self, record: K::Record) -> Result<()> {
        let id = K::record_id(&record).clone();
        self.records.lock()?.insert(id, record);
        Ok(())
    }

    pub fn record(&self, entity_id: &EntityId) -> Result<Option<K::Record>> {
        Ok(self.records.lock()?.get(entity_id).cloned())
    }

    /// Makes the next `count` attempts fail.
    pub fn fail_next(&self, count: usize) -> Result<()> {
        let mut failures = self.failures.lock()?;
        for _ in 0..count {
            failures.push_back("remote store unavailable".to_string());
        }
        Ok(())
    }

    /// Blocks every subsequent attempt until released.
    pub fn hold(&self) -> Result<()> {
        *self.gate.lock()? = Some(Arc::new(Semaphore::new(0)));
        Ok(())
    }

    /// Lets `count` held attempts proceed.
    pub fn release(&self, count: usize) -> Result<()> {
        if let Some(gate) = self.gate.lock()?.as_ref() {
            gate.add_permits(count);
        }
        Ok(())
    }

    /// Removes the gate; attempts no longer block.
    pub fn open_gate(&self) -> Result<()> {
        if let Some(gate) = self.gate.lock()?.take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
        Ok(())
    }

    /// Resolves once at least `count` attempts have started.
    pub async fn wait_for_attempts(&self, count: usize) {
        loop {
            let started = self.started.notified();
            if self.attempts() >= count {
                return;
            }
            started.await;
        }
    }

    /// Number of `update_record` calls, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Successful writes in commit order.
    pub fn committed(&self) -> Result<Vec<(EntityId, Patch<K>)>> {
        Ok(self.committed.lock()?.clone())
    }
}

impl<K: EntityKind> Default for MemoryRecordStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K: EntityKind> RecordStore<K> for MemoryRecordStore<K> {
    async fn update_record(&self, entity_id: &EntityId, patch: &Patch<K>) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.started.notify_waiters();

        let gate = self.gate.lock()?.clone();
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|err| AutosaveError::remote_write(entity_id.as_str(), err.to_string()))?;
            permit.forget();
        }

        if let Some(message) = self.failures.lock()?.pop_front() {
            return Err(AutosaveError::remote_write(entity_id.as_str(), message));
        }

        if let Some(record) = self.records.lock()?.get_mut(entity_id) {
            patch.apply_to(record);
        }
        self.committed.lock()?.push((entity_id.clone(), patch.clone()));
        Ok(())
    }
}
