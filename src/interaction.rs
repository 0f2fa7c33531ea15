//! Focus / IME composition tracking for the free-text fields of an inspector.
//!
//! The tracker is the only gate the debounce path consults: plain focus never
//! blocks an autosave, an open composition always does.

use std::collections::HashMap;
use std::fmt;

/// Inspector fields edited through free text input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextField {
    Title,
    Note,
    Links,
    CustomFields,
}

impl TextField {
    pub const ALL: [TextField; 4] = [
        TextField::Title,
        TextField::Note,
        TextField::Links,
        TextField::CustomFields,
    ];
}

impl fmt::Display for TextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Title => "title",
            Self::Note => "note",
            Self::Links => "links",
            Self::CustomFields => "custom_fields",
        };
        write!(f, "{label}")
    }
}

/// `composing` implies `editing`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextInteractionState {
    pub editing: bool,
    pub composing: bool,
}

/// What the caller must do after a transition.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionEffect {
    None,
    /// The user paused (blur or composition end): stage the field now,
    /// bypassing the debounce window.
    FlushNow,
}

#[derive(Debug, Default)]
pub struct TextInteractionTracker {
    states: HashMap<TextField, TextInteractionState>,
    suppressed: bool,
}

impl TextInteractionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, field: TextField) -> TextInteractionState {
        self.states.get(&field).copied().unwrap_or_default()
    }

    /// Focus entered the field.
    pub fn mark_editing(&mut self, field: TextField) -> InteractionEffect {
        self.states.entry(field).or_default().editing = true;
        InteractionEffect::None
    }

    /// IME session started.
    pub fn mark_composing(&mut self, field: TextField) -> InteractionEffect {
        let state = self.states.entry(field).or_default();
        state.editing = true;
        state.composing = true;
        InteractionEffect::None
    }

    /// IME session committed; the field keeps focus.
    pub fn mark_composition_end(&mut self, field: TextField) -> InteractionEffect {
        self.states.entry(field).or_default().composing = false;
        InteractionEffect::FlushNow
    }

    /// Blur.
    pub fn mark_edit_end(&mut self, field: TextField) -> InteractionEffect {
        self.states.insert(field, TextInteractionState::default());
        InteractionEffect::FlushNow
    }

    pub fn is_interacting(&self, field: TextField) -> bool {
        let state = self.state(field);
        state.editing || state.composing
    }

    pub fn is_composing(&self, field: TextField) -> bool {
        self.state(field).composing
    }

    pub fn should_skip_debounced_stage(&self, field: TextField) -> bool {
        self.suppressed || self.is_composing(field)
    }

    pub fn set_suppressed(&mut self, suppressed: bool) {
        self.suppressed = suppressed;
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub fn reset(&mut self) {
        self.states.clear();
    }
}
