// ============================================================================
// Inspector Autosave Library
// ============================================================================
//
// Field edits are normalized into patches, staged per entity, committed by a
// single serialized queue and surfaced through a four-state save indicator.

pub mod core;
pub mod entity;
pub mod inspector;
pub mod interaction;
pub mod normalize;
pub mod policy;
pub mod prelude;
pub mod queue;
pub mod save_state;
pub mod scheduler;
pub mod staleness;
pub mod stager;
pub mod store;

// Re-export main types for convenience
pub use core::{AutosaveError, EntityId, EntityKind, FieldValue, Patch, Result};
pub use policy::AutosavePolicy;
pub use save_state::{SaveState, SaveStateMachine, SaveStatus};

// Re-export the engine and its collaborators
pub use queue::{AutosaveEngine, EngineParts, ProcessOutcome, RetrySnapshot};
pub use staleness::{ClaimVerdict, CommitTarget, StalenessGuard};
pub use stager::{PatchStager, StagedPatch};
pub use store::{
    ActiveEntitySource, ChangeNotifier, InspectorStore, LocalStore, MemoryRecordStore,
    RecordStore, RefreshSignals,
};

// ============================================================================
// Inspector sessions
// ============================================================================

pub use entity::{EditableKind, Priority, Project, Task};
pub use inspector::{InspectorSession, StageMode, StageOutcome};
pub use interaction::{InteractionEffect, TextField, TextInteractionTracker};
pub use scheduler::DebounceScheduler;
