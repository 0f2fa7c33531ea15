use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

/// Opaque identity of the record currently (or formerly) open in the inspector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A single tagged field value of a closed per-kind patch union.
pub trait FieldValue: Clone + PartialEq + fmt::Debug + Serialize + Send + Sync + 'static {
    type Field: Copy + Ord + Hash + fmt::Debug + fmt::Display + Serialize + Send + Sync + 'static;

    fn field(&self) -> Self::Field;
}

/// An editable record kind (task-like, project-like) the engine is instantiated for.
pub trait EntityKind: Send + Sync + 'static {
    /// Short label used in logs and change notifications.
    const KIND: &'static str;

    type Field: Copy + Ord + Hash + fmt::Debug + fmt::Display + Serialize + Send + Sync + 'static;
    type Value: FieldValue<Field = Self::Field>;
    type Record: Clone + fmt::Debug + Send + Sync + 'static;

    fn record_id(record: &Self::Record) -> &EntityId;

    /// Writes one patch value into a full record (optimistic local apply).
    fn apply_value(record: &mut Self::Record, value: &Self::Value);
}

/// Partial update keyed by field. At most one value per field; inserting the
/// same field again replaces the previous value.
pub struct Patch<K: EntityKind> {
    values: BTreeMap<K::Field, K::Value>,
}

impl<K: EntityKind> Patch<K> {
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, value: K::Value) -> Self {
        self.insert(value);
        self
    }

    /// Inserts `value`, replacing any value for the same field.
    ///
    /// Returns `true` if the patch changed.
    pub fn insert(&mut self, value: K::Value) -> bool {
        let field = value.field();
        match self.values.get(&field) {
            Some(existing) if *existing == value => false,
            _ => {
                self.values.insert(field, value);
                true
            }
        }
    }

    pub fn get(&self, field: K::Field) -> Option<&K::Value> {
        self.values.get(&field)
    }

    pub fn contains(&self, field: K::Field) -> bool {
        self.values.contains_key(&field)
    }

    pub fn remove(&mut self, field: K::Field) -> Option<K::Value> {
        self.values.remove(&field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = K::Field> + '_ {
        self.values.keys().copied()
    }

    pub fn values(&self) -> impl Iterator<Item = &K::Value> {
        self.values.values()
    }

    /// Shallow last-write-wins merge: every field of `newer` overwrites ours.
    pub fn merge(&mut self, newer: &Patch<K>) -> bool {
        let mut changed = false;
        for value in newer.values() {
            changed |= self.insert(value.clone());
        }
        changed
    }

    /// Merges `older` underneath this patch: only fields we do not already
    /// carry are taken from it.
    pub fn merge_under(&mut self, older: Patch<K>) {
        for (field, value) in older.values {
            self.values.entry(field).or_insert(value);
        }
    }

    pub fn apply_to(&self, record: &mut K::Record) {
        for value in self.values() {
            K::apply_value(record, value);
        }
    }
}

impl<K: EntityKind> Default for Patch<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityKind> Clone for Patch<K> {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
        }
    }
}

impl<K: EntityKind> PartialEq for Patch<K> {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl<K: EntityKind> fmt::Debug for Patch<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.values.iter()).finish()
    }
}

impl<K: EntityKind> FromIterator<K::Value> for Patch<K> {
    fn from_iter<I: IntoIterator<Item = K::Value>>(iter: I) -> Self {
        let mut patch = Self::new();
        for value in iter {
            patch.insert(value);
        }
        patch
    }
}

/// Serializes as a flat `{ field: value }` object, which is the wire shape
/// remote stores expect.
impl<K: EntityKind> Serialize for Patch<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in &self.values {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}
