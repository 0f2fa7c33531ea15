//! Concrete record kinds the engine is instantiated for.
//!
//! Each kind is a closed union of field values (`TaskValue`, `ProjectValue`)
//! keyed by a field enum, instead of an open string-keyed map.

pub mod project;
pub mod task;

use crate::core::EntityKind;
use crate::normalize::{CustomFieldItem, Link};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use project::{Project, ProjectField, ProjectRecord, ProjectValue};
pub use task::{DoneReason, Task, TaskField, TaskRecord, TaskStatus, TaskValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    P0,
    #[default]
    P1,
    P2,
    P3,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
        };
        write!(f, "{label}")
    }
}

/// The free-text surface every inspector shares: title, note, tags, links
/// and custom fields. Read accessors look at the persisted record; the
/// `*_value` constructors build the matching patch value.
pub trait EditableKind: EntityKind {
    fn title(record: &Self::Record) -> &str;
    fn note(record: &Self::Record) -> Option<&str>;
    fn tags(record: &Self::Record) -> &[String];
    fn links(record: &Self::Record) -> &[Link];
    fn custom_fields(record: &Self::Record) -> &[CustomFieldItem];

    fn title_value(title: String) -> Self::Value;
    fn note_value(note: Option<String>) -> Self::Value;
    fn tags_value(tags: Vec<String>) -> Self::Value;
    fn links_value(links: Vec<Link>) -> Self::Value;
    fn custom_fields_value(fields: Vec<CustomFieldItem>) -> Self::Value;
}
