use super::{EditableKind, Priority};
use crate::core::{EntityId, EntityKind, FieldValue};
use crate::normalize::{CustomFieldItem, Link};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    Doing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneReason {
    #[default]
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: EntityId,
    pub space_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub done_reason: Option<DoneReason>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub deadline_at: Option<i64>,
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldItem>,
}

impl TaskRecord {
    pub fn new(id: impl Into<EntityId>, space_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            space_id: space_id.into(),
            project_id: None,
            title: title.into(),
            note: None,
            status: TaskStatus::Todo,
            done_reason: None,
            priority: Priority::P1,
            deadline_at: None,
            completed_at: None,
            tags: Vec::new(),
            links: Vec::new(),
            custom_fields: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskField {
    Title,
    Note,
    Status,
    DoneReason,
    Priority,
    DeadlineAt,
    Tags,
    SpaceId,
    ProjectId,
    Links,
    CustomFields,
    /// Local patches only; the server derives it from the status change.
    CompletedAt,
}

impl fmt::Display for TaskField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Title => "title",
            Self::Note => "note",
            Self::Status => "status",
            Self::DoneReason => "doneReason",
            Self::Priority => "priority",
            Self::DeadlineAt => "deadlineAt",
            Self::Tags => "tags",
            Self::SpaceId => "spaceId",
            Self::ProjectId => "projectId",
            Self::Links => "links",
            Self::CustomFields => "customFields",
            Self::CompletedAt => "completedAt",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TaskValue {
    Title(String),
    Note(Option<String>),
    Status(TaskStatus),
    DoneReason(Option<DoneReason>),
    Priority(Priority),
    DeadlineAt(Option<i64>),
    Tags(Vec<String>),
    SpaceId(String),
    ProjectId(Option<String>),
    Links(Vec<Link>),
    CustomFields(Vec<CustomFieldItem>),
    CompletedAt(Option<i64>),
}

impl FieldValue for TaskValue {
    type Field = TaskField;

    fn field(&self) -> TaskField {
        match self {
            Self::Title(_) => TaskField::Title,
            Self::Note(_) => TaskField::Note,
            Self::Status(_) => TaskField::Status,
            Self::DoneReason(_) => TaskField::DoneReason,
            Self::Priority(_) => TaskField::Priority,
            Self::DeadlineAt(_) => TaskField::DeadlineAt,
            Self::Tags(_) => TaskField::Tags,
            Self::SpaceId(_) => TaskField::SpaceId,
            Self::ProjectId(_) => TaskField::ProjectId,
            Self::Links(_) => TaskField::Links,
            Self::CustomFields(_) => TaskField::CustomFields,
            Self::CompletedAt(_) => TaskField::CompletedAt,
        }
    }
}

/// Task-like records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task;

impl EntityKind for Task {
    const KIND: &'static str = "task";

    type Field = TaskField;
    type Value = TaskValue;
    type Record = TaskRecord;

    fn record_id(record: &TaskRecord) -> &EntityId {
        &record.id
    }

    fn apply_value(record: &mut TaskRecord, value: &TaskValue) {
        match value.clone() {
            TaskValue::Title(title) => record.title = title,
            TaskValue::Note(note) => record.note = note,
            TaskValue::Status(status) => record.status = status,
            TaskValue::DoneReason(reason) => record.done_reason = reason,
            TaskValue::Priority(priority) => record.priority = priority,
            TaskValue::DeadlineAt(deadline) => record.deadline_at = deadline,
            TaskValue::Tags(tags) => record.tags = tags,
            TaskValue::SpaceId(space_id) => record.space_id = space_id,
            TaskValue::ProjectId(project_id) => record.project_id = project_id,
            TaskValue::Links(links) => record.links = links,
            TaskValue::CustomFields(fields) => record.custom_fields = fields,
            TaskValue::CompletedAt(at) => record.completed_at = at,
        }
    }
}

impl EditableKind for Task {
    fn title(record: &TaskRecord) -> &str {
        &record.title
    }

    fn note(record: &TaskRecord) -> Option<&str> {
        record.note.as_deref()
    }

    fn tags(record: &TaskRecord) -> &[String] {
        &record.tags
    }

    fn links(record: &TaskRecord) -> &[Link] {
        &record.links
    }

    fn custom_fields(record: &TaskRecord) -> &[CustomFieldItem] {
        &record.custom_fields
    }

    fn title_value(title: String) -> TaskValue {
        TaskValue::Title(title)
    }

    fn note_value(note: Option<String>) -> TaskValue {
        TaskValue::Note(note)
    }

    fn tags_value(tags: Vec<String>) -> TaskValue {
        TaskValue::Tags(tags)
    }

    fn links_value(links: Vec<Link>) -> TaskValue {
        TaskValue::Links(links)
    }

    fn custom_fields_value(fields: Vec<CustomFieldItem>) -> TaskValue {
        TaskValue::CustomFields(fields)
    }
}
