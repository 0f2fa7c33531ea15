use super::retry::RetrySnapshot;
use crate::core::{EntityId, EntityKind, Patch, Result};
use crate::policy::AutosavePolicy;
use crate::save_state::{RevertTimer, SaveStateMachine, SaveStatus};
use crate::staleness::{ClaimVerdict, CommitTarget, StalenessGuard};
use crate::stager::{PatchStager, StagedPatch};
use crate::store::{ActiveEntitySource, ChangeNotifier, LocalStore, RecordStore};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, Level, event, info_span};

/// Result of one `process` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Another loop owns the queue and will pick the staged work up.
    AlreadyRunning,
    /// Nothing is left to commit.
    Drained { committed: usize, discarded: usize },
    /// A commit exhausted its attempts. The patch is restaged and a retry
    /// snapshot recorded; nothing else was attempted after it.
    Failed { committed: usize, discarded: usize },
}

impl ProcessOutcome {
    pub fn committed(&self) -> usize {
        match self {
            Self::AlreadyRunning => 0,
            Self::Drained { committed, .. } | Self::Failed { committed, .. } => *committed,
        }
    }

    pub fn discarded(&self) -> usize {
        match self {
            Self::AlreadyRunning => 0,
            Self::Drained { discarded, .. } | Self::Failed { discarded, .. } => *discarded,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Collaborators an engine talks to.
pub struct EngineParts<K: EntityKind> {
    pub store: Arc<dyn RecordStore<K>>,
    pub local: Arc<dyn LocalStore<K>>,
    pub active: Arc<dyn ActiveEntitySource>,
    pub notifier: Arc<dyn ChangeNotifier>,
}

impl<K: EntityKind> EngineParts<K> {
    pub fn new(
        store: Arc<dyn RecordStore<K>>,
        local: Arc<dyn LocalStore<K>>,
        active: Arc<dyn ActiveEntitySource>,
    ) -> Self {
        Self {
            store,
            local,
            active,
            notifier: Arc::new(()),
        }
    }

    /// Set the change notifier fired after every successful commit.
    pub fn notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

struct EngineState<K: EntityKind> {
    stager: PatchStager<K>,
    queue_running: bool,
    retry_snapshot: Option<RetrySnapshot<K>>,
    save_state: SaveStateMachine,
    revert_task: Option<JoinHandle<()>>,
}

struct EngineInner<K: EntityKind> {
    state: Mutex<EngineState<K>>,
    status_tx: watch::Sender<SaveStatus>,
    store: Arc<dyn RecordStore<K>>,
    local: Arc<dyn LocalStore<K>>,
    guard: StalenessGuard,
    notifier: Arc<dyn ChangeNotifier>,
    policy: AutosavePolicy,
}

impl<K: EntityKind> EngineInner<K> {
    // A panic while holding the lock leaves plain data behind; keep going.
    fn lock_state(&self) -> MutexGuard<'_, EngineState<K>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &EngineState<K>) {
        self.status_tx.send_replace(state.save_state.status());
    }
}

impl<K: EntityKind> Drop for EngineInner<K> {
    fn drop(&mut self) {
        if let Some(task) = self.lock_state().revert_task.take() {
            task.abort();
        }
    }
}

/// Releases the queue flag when a loop ends early (failure, panic).
struct QueueLease<'a, K: EntityKind> {
    inner: &'a EngineInner<K>,
    armed: bool,
}

impl<K: EntityKind> QueueLease<'_, K> {
    /// The flag was already cleared under the state lock.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<K: EntityKind> Drop for QueueLease<'_, K> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.lock_state().queue_running = false;
        }
    }
}

enum Claim<K: EntityKind> {
    Staged(StagedPatch<K>),
    Switch(EntityId),
    Done,
}

/// Serialized commit loop over staged patches.
///
/// Cloning is cheap and every clone drives the same queue. At most one
/// processing loop runs at a time across all entities; a stage that arrives
/// while a write is in flight is merged into the next claimed patch.
pub struct AutosaveEngine<K: EntityKind> {
    inner: Arc<EngineInner<K>>,
}

impl<K: EntityKind> Clone for AutosaveEngine<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: EntityKind> AutosaveEngine<K> {
    pub fn new(parts: EngineParts<K>, policy: AutosavePolicy) -> Result<Self> {
        policy.validate()?;
        let policy = policy.normalized();
        let save_state = SaveStateMachine::new(policy.saved_revert(), policy.error_revert());
        let (status_tx, _) = watch::channel(save_state.status());

        Ok(Self {
            inner: Arc::new(EngineInner {
                state: Mutex::new(EngineState {
                    stager: PatchStager::new(),
                    queue_running: false,
                    retry_snapshot: None,
                    save_state,
                    revert_task: None,
                }),
                status_tx,
                store: parts.store,
                local: parts.local,
                guard: StalenessGuard::new(parts.active),
                notifier: parts.notifier,
                policy,
            }),
        })
    }

    pub fn policy(&self) -> &AutosavePolicy {
        &self.inner.policy
    }

    pub fn staleness_guard(&self) -> &StalenessGuard {
        &self.inner.guard
    }

    /// Records a change without committing it.
    pub fn stage(&self, entity_id: &EntityId, wire: Patch<K>, local: Patch<K>) -> bool {
        let mut state = self.inner.lock_state();
        let changed = state.stager.stage(entity_id, wire, local);
        event!(
            Level::DEBUG,
            kind = K::KIND,
            entity_id = %entity_id,
            changed,
            "patch staged"
        );
        changed
    }

    /// Stages and processes right away (explicit actions, blur, flush).
    pub async fn enqueue_immediate(
        &self,
        entity_id: &EntityId,
        wire: Patch<K>,
        local: Patch<K>,
    ) -> ProcessOutcome {
        if wire.is_empty() && local.is_empty() {
            return ProcessOutcome::Drained {
                committed: 0,
                discarded: 0,
            };
        }
        self.stage(entity_id, wire, local);
        self.process(entity_id).await
    }

    /// Stages and processes after the caller's own debounce window elapsed.
    pub async fn enqueue_debounced(
        &self,
        entity_id: &EntityId,
        wire: Patch<K>,
        local: Patch<K>,
    ) -> ProcessOutcome {
        if wire.is_empty() && local.is_empty() {
            return ProcessOutcome::Drained {
                committed: 0,
                discarded: 0,
            };
        }
        event!(Level::DEBUG, kind = K::KIND, entity_id = %entity_id, "debounced stage");
        self.stage(entity_id, wire, local);
        self.process(entity_id).await
    }

    /// Commits everything staged for `entity_id` while it stays active.
    pub async fn process(&self, entity_id: &EntityId) -> ProcessOutcome {
        self.process_target(CommitTarget::Active(entity_id.clone()))
            .await
    }

    /// Runs the commit loop on its own task. Dropping the returned future
    /// does not cancel a claimed write: the loop still settles it, restaging
    /// on failure, and updates the save status.
    pub async fn process_target(&self, target: CommitTarget) -> ProcessOutcome {
        let engine = self.clone();
        let entity_id = target.entity_id().clone();
        match tokio::spawn(async move { engine.run_queue(target).await }).await {
            Ok(outcome) => outcome,
            Err(err) => {
                event!(
                    Level::ERROR,
                    kind = K::KIND,
                    entity_id = %entity_id,
                    error = %err,
                    "commit loop aborted"
                );
                ProcessOutcome::Failed {
                    committed: 0,
                    discarded: 0,
                }
            }
        }
    }

    async fn run_queue(&self, target: CommitTarget) -> ProcessOutcome {
        let Some(mut lease) = self.acquire_queue() else {
            event!(
                Level::DEBUG,
                kind = K::KIND,
                entity_id = %target.entity_id(),
                "queue already running"
            );
            return ProcessOutcome::AlreadyRunning;
        };

        let mut target = target;
        let mut committed = 0;
        let mut discarded = 0;
        loop {
            match self.claim_next(&target) {
                Claim::Staged(staged) => {
                    if let ClaimVerdict::Discard { active } = self.inner.guard.check_claim(&target)
                    {
                        event!(
                            Level::WARN,
                            kind = K::KIND,
                            entity_id = %target.entity_id(),
                            active = ?active,
                            "stale patch discarded"
                        );
                        discarded += 1;
                        continue;
                    }

                    if !staged.has_wire_changes() {
                        self.apply_local(target.entity_id(), &staged.local);
                        continue;
                    }

                    if !self.commit(&target, staged).await {
                        return ProcessOutcome::Failed {
                            committed,
                            discarded,
                        };
                    }
                    committed += 1;
                    // A pinned retry covers one patch; later work is checked again.
                    target = CommitTarget::Active(target.entity_id().clone());
                }
                Claim::Switch(next) => {
                    event!(
                        Level::DEBUG,
                        kind = K::KIND,
                        from = %target.entity_id(),
                        to = %next,
                        "continuing with active entity"
                    );
                    target = CommitTarget::Active(next);
                }
                Claim::Done => {
                    lease.disarm();
                    return ProcessOutcome::Drained {
                        committed,
                        discarded,
                    };
                }
            }
        }
    }

    /// Re-enqueues the retry snapshot against its own entity, bypassing the
    /// staleness check. Returns `None` when there is nothing to retry.
    pub async fn manual_retry(&self) -> Option<ProcessOutcome> {
        let entity_id = {
            let mut state = self.inner.lock_state();
            let snapshot = state.retry_snapshot.clone()?;
            state.stager.restage(&snapshot.entity_id, snapshot.staged);
            snapshot.entity_id
        };
        event!(Level::INFO, kind = K::KIND, entity_id = %entity_id, "manual retry");
        Some(self.process_target(CommitTarget::Pinned(entity_id)).await)
    }

    /// A retry is offered only for the entity the user is looking at.
    pub fn retry_available(&self) -> bool {
        let active = self.inner.guard.active_entity_id();
        self.inner
            .lock_state()
            .retry_snapshot
            .as_ref()
            .is_some_and(|snapshot| snapshot.belongs_to(active.as_ref()))
    }

    pub fn retry_snapshot(&self) -> Option<RetrySnapshot<K>> {
        self.inner.lock_state().retry_snapshot.clone()
    }

    /// Drops work that belongs to anything but `next`. Returns the entities
    /// whose pending changes were discarded.
    pub fn on_context_change(
        &self,
        previous: Option<&EntityId>,
        next: Option<&EntityId>,
    ) -> Vec<EntityId> {
        if previous.is_none() || previous == next {
            return Vec::new();
        }
        self.drop_work_except(next)
    }

    /// Same as a context change towards whatever is active now.
    pub fn clear_inactive(&self) -> Vec<EntityId> {
        let active = self.inner.guard.active_entity_id();
        self.drop_work_except(active.as_ref())
    }

    pub fn has_pending(&self, entity_id: &EntityId) -> bool {
        self.inner.lock_state().stager.has_pending(entity_id)
    }

    pub fn staged(&self, entity_id: &EntityId) -> Option<StagedPatch<K>> {
        self.inner.lock_state().stager.peek(entity_id).cloned()
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock_state().queue_running
    }

    pub fn save_status(&self) -> SaveStatus {
        self.inner.lock_state().save_state.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status_tx.subscribe()
    }

    fn acquire_queue(&self) -> Option<QueueLease<'_, K>> {
        let mut state = self.inner.lock_state();
        if state.queue_running {
            return None;
        }
        state.queue_running = true;
        Some(QueueLease {
            inner: &self.inner,
            armed: true,
        })
    }

    /// Claims the next patch. When the queue is empty the running flag is
    /// cleared under the same lock, so a concurrent stage is never stranded.
    fn claim_next(&self, target: &CommitTarget) -> Claim<K> {
        let mut state = self.inner.lock_state();
        let entity_id = target.entity_id();
        if let Some(staged) = state.stager.take(entity_id) {
            event!(Level::DEBUG, kind = K::KIND, entity_id = %entity_id, "patch claimed");
            return Claim::Staged(staged);
        }

        let active = self.inner.guard.active_entity_id();
        if let Some(active) =
            active.filter(|active| active != entity_id && state.stager.has_pending(active))
        {
            return Claim::Switch(active);
        }

        state.queue_running = false;
        Claim::Done
    }

    async fn commit(&self, target: &CommitTarget, staged: StagedPatch<K>) -> bool {
        let entity_id = target.entity_id().clone();
        let span = info_span!(
            "autosave.commit",
            kind = K::KIND,
            entity_id = %entity_id,
            pinned = target.is_pinned(),
            fields = staged.wire.len()
        );

        async move {
            self.begin_save();

            let max_attempts = self.inner.policy.max_commit_attempts.max(1);
            let mut attempt = 0;
            let result = loop {
                attempt += 1;
                match self.inner.store.update_record(&entity_id, &staged.wire).await {
                    Ok(()) => break Ok(()),
                    Err(err) if attempt < max_attempts => {
                        event!(Level::DEBUG, attempt, error = %err, "commit attempt failed");
                    }
                    Err(err) => break Err(err),
                }
            };

            match result {
                Ok(()) => {
                    self.finish_success(&entity_id, staged);
                    true
                }
                Err(err) => {
                    event!(Level::ERROR, attempts = attempt, error = %err, "commit failed");
                    self.finish_failure(entity_id, staged);
                    false
                }
            }
        }
        .instrument(span)
        .await
    }

    fn begin_save(&self) {
        let mut state = self.inner.lock_state();
        state.save_state.begin_save();
        if let Some(task) = state.revert_task.take() {
            task.abort();
        }
        self.inner.publish(&state);
    }

    fn finish_success(&self, entity_id: &EntityId, staged: StagedPatch<K>) {
        if !staged.local.is_empty() {
            self.apply_local(entity_id, &staged.local);
        }
        self.inner
            .notifier
            .notify_external_watchers(K::KIND, entity_id);

        let mut state = self.inner.lock_state();
        if state
            .retry_snapshot
            .as_ref()
            .is_some_and(|snapshot| &snapshot.entity_id == entity_id)
        {
            state.retry_snapshot = None;
        }
        let timer = state.save_state.end_save(true);
        self.inner.publish(&state);
        if let Some(timer) = timer {
            self.arm_revert(&mut state, timer);
        }
        event!(Level::DEBUG, "patch committed");
    }

    fn finish_failure(&self, entity_id: EntityId, staged: StagedPatch<K>) {
        let mut state = self.inner.lock_state();
        state.stager.restage(&entity_id, staged.clone());
        state.retry_snapshot = Some(RetrySnapshot::new(entity_id, staged));
        let timer = state.save_state.end_save(false);
        self.inner.publish(&state);
        if let Some(timer) = timer {
            self.arm_revert(&mut state, timer);
        }
    }

    /// Optimistic local apply, only for the entity still on screen.
    fn apply_local(&self, entity_id: &EntityId, local: &Patch<K>) {
        if self.inner.guard.is_active(entity_id) {
            self.inner.local.patch_local(entity_id, local);
        } else {
            event!(
                Level::DEBUG,
                kind = K::KIND,
                entity_id = %entity_id,
                "local patch skipped: entity no longer active"
            );
        }
    }

    fn arm_revert(&self, state: &mut EngineState<K>, timer: RevertTimer) {
        if let Some(task) = state.revert_task.take() {
            task.abort();
        }
        let inner = Arc::downgrade(&self.inner);
        state.revert_task = Some(tokio::spawn(async move {
            tokio::time::sleep(timer.delay).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut state = inner.lock_state();
            if state.save_state.expire(timer.generation) {
                inner.publish(&state);
            }
        }));
    }

    fn drop_work_except(&self, keep: Option<&EntityId>) -> Vec<EntityId> {
        let mut state = self.inner.lock_state();
        let dropped = state.stager.clear(keep);
        for entity_id in &dropped {
            event!(
                Level::WARN,
                kind = K::KIND,
                entity_id = %entity_id,
                "pending patch dropped on context change"
            );
        }
        if state
            .retry_snapshot
            .as_ref()
            .is_some_and(|snapshot| !snapshot.belongs_to(keep))
        {
            state.retry_snapshot = None;
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::task::{Task, TaskField, TaskRecord, TaskValue};
    use crate::save_state::SaveState;
    use crate::store::{InspectorStore, MemoryRecordStore};
    use std::time::Duration;

    struct Harness {
        engine: AutosaveEngine<Task>,
        remote: Arc<MemoryRecordStore<Task>>,
        inspector: Arc<InspectorStore<Task>>,
    }

    fn harness() -> Harness {
        let remote = Arc::new(MemoryRecordStore::<Task>::new());
        let inspector = Arc::new(InspectorStore::<Task>::new());
        let record = TaskRecord::new("t-1", "s-1", "Old");
        remote.seed(record.clone()).unwrap();
        inspector.open(record).unwrap();

        let parts = EngineParts::<Task>::new(remote.clone(), inspector.clone(), inspector.clone());
        let engine = AutosaveEngine::new(parts, AutosavePolicy::default()).unwrap();
        Harness {
            engine,
            remote,
            inspector,
        }
    }

    fn title(value: &str) -> Patch<Task> {
        Patch::new().with(TaskValue::Title(value.to_string()))
    }

    #[tokio::test(start_paused = true)]
    async fn successful_commit_applies_locally_and_reverts_to_idle() {
        let h = harness();
        let id = EntityId::from("t-1");

        let outcome = h.engine.enqueue_immediate(&id, title("New"), title("New")).await;

        assert_eq!(
            outcome,
            ProcessOutcome::Drained {
                committed: 1,
                discarded: 0
            }
        );
        assert_eq!(h.inspector.current().unwrap().title, "New");
        assert_eq!(h.engine.save_status().state, SaveState::Saved);

        tokio::time::sleep(Duration::from_millis(1_250)).await;
        assert_eq!(h.engine.save_status().state, SaveState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_restage_and_snapshot() {
        let h = harness();
        let id = EntityId::from("t-1");
        h.remote.fail_next(2).unwrap();

        let outcome = h.engine.enqueue_immediate(&id, title("New"), title("New")).await;

        assert!(outcome.is_failed());
        assert_eq!(h.remote.attempts(), 2);
        assert!(h.engine.has_pending(&id));
        assert!(h.engine.retry_available());
        assert_eq!(h.engine.save_status().state, SaveState::Error);
        assert_eq!(h.inspector.current().unwrap().title, "Old");
        assert!(!h.engine.is_running());

        tokio::time::sleep(Duration::from_millis(3_050)).await;
        assert_eq!(h.engine.save_status().state, SaveState::Idle);
    }

    #[tokio::test]
    async fn local_only_patch_skips_the_remote_store() {
        let h = harness();
        let id = EntityId::from("t-1");
        let local = Patch::new().with(TaskValue::CompletedAt(Some(42)));

        h.engine.enqueue_immediate(&id, Patch::new(), local).await;

        assert_eq!(h.remote.attempts(), 0);
        assert_eq!(h.inspector.current().unwrap().completed_at, Some(42));
        assert!(h.engine.staged(&id).is_none());
    }

    #[tokio::test]
    async fn switch_picks_up_local_only_work_of_the_active_entity() {
        let h = harness();
        let active = EntityId::from("t-1");
        let local = Patch::new().with(TaskValue::CompletedAt(Some(7)));
        h.engine.stage(&active, Patch::new(), local);

        let outcome = h.engine.process(&EntityId::from("elsewhere")).await;

        assert_eq!(outcome.committed(), 0);
        assert_eq!(h.remote.attempts(), 0);
        assert_eq!(h.inspector.current().unwrap().completed_at, Some(7));
        assert!(!h.engine.has_pending(&active));
    }

    #[tokio::test]
    async fn context_change_keeps_only_the_next_entity() {
        let h = harness();
        let x = EntityId::from("x");
        let y = EntityId::from("y");
        h.engine.stage(&x, title("A"), Patch::new());
        h.engine.stage(&y, title("B"), Patch::new());

        let dropped = h.engine.on_context_change(Some(&x), Some(&y));

        assert_eq!(dropped, vec![x.clone()]);
        assert!(!h.engine.has_pending(&x));
        assert!(h.engine.staged(&y).unwrap().wire.contains(TaskField::Title));
        assert!(h.engine.on_context_change(None, Some(&x)).is_empty());
    }
}
