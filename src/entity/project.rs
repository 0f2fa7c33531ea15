use super::{EditableKind, Priority};
use crate::core::{EntityId, EntityKind, FieldValue};
use crate::normalize::{CustomFieldItem, Link};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: EntityId,
    pub space_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldItem>,
}

impl ProjectRecord {
    pub fn new(id: impl Into<EntityId>, space_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            space_id: space_id.into(),
            parent_id: None,
            title: title.into(),
            note: None,
            priority: Priority::P1,
            tags: Vec::new(),
            links: Vec::new(),
            custom_fields: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectField {
    Title,
    Note,
    Priority,
    ParentId,
    Tags,
    Links,
    CustomFields,
}

impl fmt::Display for ProjectField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Title => "title",
            Self::Note => "note",
            Self::Priority => "priority",
            Self::ParentId => "parentId",
            Self::Tags => "tags",
            Self::Links => "links",
            Self::CustomFields => "customFields",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProjectValue {
    Title(String),
    Note(Option<String>),
    Priority(Priority),
    ParentId(Option<String>),
    Tags(Vec<String>),
    Links(Vec<Link>),
    CustomFields(Vec<CustomFieldItem>),
}

impl FieldValue for ProjectValue {
    type Field = ProjectField;

    fn field(&self) -> ProjectField {
        match self {
            Self::Title(_) => ProjectField::Title,
            Self::Note(_) => ProjectField::Note,
            Self::Priority(_) => ProjectField::Priority,
            Self::ParentId(_) => ProjectField::ParentId,
            Self::Tags(_) => ProjectField::Tags,
            Self::Links(_) => ProjectField::Links,
            Self::CustomFields(_) => ProjectField::CustomFields,
        }
    }
}

/// Project-like records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Project;

impl EntityKind for Project {
    const KIND: &'static str = "project";

    type Field = ProjectField;
    type Value = ProjectValue;
    type Record = ProjectRecord;

    fn record_id(record: &ProjectRecord) -> &EntityId {
        &record.id
    }

    fn apply_value(record: &mut ProjectRecord, value: &ProjectValue) {
        match value.clone() {
            ProjectValue::Title(title) => record.title = title,
            ProjectValue::Note(note) => record.note = note,
            ProjectValue::Priority(priority) => record.priority = priority,
            ProjectValue::ParentId(parent_id) => record.parent_id = parent_id,
            ProjectValue::Tags(tags) => record.tags = tags,
            ProjectValue::Links(links) => record.links = links,
            ProjectValue::CustomFields(fields) => record.custom_fields = fields,
        }
    }
}

impl EditableKind for Project {
    fn title(record: &ProjectRecord) -> &str {
        &record.title
    }

    fn note(record: &ProjectRecord) -> Option<&str> {
        record.note.as_deref()
    }

    fn tags(record: &ProjectRecord) -> &[String] {
        &record.tags
    }

    fn links(record: &ProjectRecord) -> &[Link] {
        &record.links
    }

    fn custom_fields(record: &ProjectRecord) -> &[CustomFieldItem] {
        &record.custom_fields
    }

    fn title_value(title: String) -> ProjectValue {
        ProjectValue::Title(title)
    }

    fn note_value(note: Option<String>) -> ProjectValue {
        ProjectValue::Note(note)
    }

    fn tags_value(tags: Vec<String>) -> ProjectValue {
        ProjectValue::Tags(tags)
    }

    fn links_value(links: Vec<Link>) -> ProjectValue {
        ProjectValue::Links(links)
    }

    fn custom_fields_value(fields: Vec<CustomFieldItem>) -> ProjectValue {
        ProjectValue::CustomFields(fields)
    }
}
