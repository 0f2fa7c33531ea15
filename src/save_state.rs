use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Visible autosave indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveState {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

impl fmt::Display for SaveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Saving => "saving",
            Self::Saved => "saved",
            Self::Error => "error",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SaveStatus {
    pub state: SaveState,
    pub pending_saves: usize,
}

/// Request to return to `Idle` after `delay`, valid only while the machine is
/// still at `generation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevertTimer {
    pub generation: u64,
    pub delay: Duration,
}

/// Aggregate in-flight write counter behind the four-state indicator.
///
/// `Saving` holds exactly while `pending_saves > 0`. Only the last of several
/// overlapping saves decides between `Saved` and `Error`. The machine owns no
/// timers: it hands out [`RevertTimer`]s and invalidates them by bumping its
/// generation whenever a new save begins.
#[derive(Debug, Clone)]
pub struct SaveStateMachine {
    state: SaveState,
    pending_saves: usize,
    generation: u64,
    saved_revert: Duration,
    error_revert: Duration,
}

impl SaveStateMachine {
    pub fn new(saved_revert: Duration, error_revert: Duration) -> Self {
        Self {
            state: SaveState::Idle,
            pending_saves: 0,
            generation: 0,
            saved_revert,
            error_revert,
        }
    }

    pub fn state(&self) -> SaveState {
        self.state
    }

    pub fn pending_saves(&self) -> usize {
        self.pending_saves
    }

    pub fn status(&self) -> SaveStatus {
        SaveStatus {
            state: self.state,
            pending_saves: self.pending_saves,
        }
    }

    pub fn begin_save(&mut self) {
        self.pending_saves += 1;
        self.state = SaveState::Saving;
        self.generation += 1;
    }

    /// Settles one save. Returns the revert timer to arm when this was the
    /// last save in flight.
    pub fn end_save(&mut self, ok: bool) -> Option<RevertTimer> {
        self.pending_saves = self.pending_saves.saturating_sub(1);
        if self.pending_saves > 0 {
            return None;
        }

        self.generation += 1;
        let delay = if ok {
            self.state = SaveState::Saved;
            self.saved_revert
        } else {
            self.state = SaveState::Error;
            self.error_revert
        };

        Some(RevertTimer {
            generation: self.generation,
            delay,
        })
    }

    /// Fires a revert timer. Stale timers are ignored.
    pub fn expire(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        if !matches!(self.state, SaveState::Saved | SaveState::Error) {
            return false;
        }
        self.state = SaveState::Idle;
        true
    }
}

impl Default for SaveStateMachine {
    fn default() -> Self {
        Self::new(Duration::from_millis(1_200), Duration::from_millis(3_000))
    }
}
