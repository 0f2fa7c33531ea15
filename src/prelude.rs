//! Recommended imports grouped by abstraction level.
//!
//! `session` is the default for hosts that drive an inspector panel.
//! `engine` is the lower-level surface for hosts that build their own
//! patches and only need staging, commit and retry.

pub mod session {
    //! Inspector-facing surface.
    //!
    //! Intended usage in host code:
    //! - `InspectorSession::connect` with a `RecordStore`,
    //! - `open` / input setters / focus and IME callbacks,
    //! - `pump_debounced` from the host's event loop.
    pub use crate::entity::{
        DoneReason, Priority, Project, ProjectRecord, Task, TaskRecord, TaskStatus,
    };
    pub use crate::interaction::TextField;
    pub use crate::normalize::{CustomFieldFormItem, LinkFormItem};
    pub use crate::{
        AutosavePolicy, InspectorSession, RecordStore, RefreshSignals, SaveState, SaveStatus,
        StageOutcome,
    };
}

pub mod engine {
    //! Escape hatch for driving the queue directly.
    pub use crate::{
        AutosaveEngine, CommitTarget, EngineParts, EntityId, EntityKind, FieldValue,
        InspectorStore, Patch, ProcessOutcome, RetrySnapshot,
    };
}
