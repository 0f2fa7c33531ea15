//! Collaborators consumed by the autosave engine, plus in-memory
//! implementations usable in hosts and tests.

pub mod local;
pub mod memory;
pub mod signals;

use crate::core::{EntityId, EntityKind, Patch, Result};
use async_trait::async_trait;

pub use local::InspectorStore;
pub use memory::MemoryRecordStore;
pub use signals::RefreshSignals;

/// Remote record store. Updates are idempotent: re-sending a patch after a
/// failed attempt is safe.
#[async_trait]
pub trait RecordStore<K: EntityKind>: Send + Sync {
    async fn update_record(&self, entity_id: &EntityId, patch: &Patch<K>) -> Result<()>;
}

/// In-memory representation of the open record, patched optimistically.
pub trait LocalStore<K: EntityKind>: Send + Sync {
    fn patch_local(&self, entity_id: &EntityId, patch: &Patch<K>);
}

/// Reports which record the user is looking at right now.
pub trait ActiveEntitySource: Send + Sync {
    fn active_entity_id(&self) -> Option<EntityId>;
}

impl<F> ActiveEntitySource for F
where
    F: Fn() -> Option<EntityId> + Send + Sync,
{
    fn active_entity_id(&self) -> Option<EntityId> {
        self()
    }
}

/// Side channel fired once per successful commit so other views can refresh.
pub trait ChangeNotifier: Send + Sync {
    fn notify_external_watchers(&self, kind: &'static str, entity_id: &EntityId);
}

impl ChangeNotifier for () {
    fn notify_external_watchers(&self, _kind: &'static str, _entity_id: &EntityId) {}
}
