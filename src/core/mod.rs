pub mod error;
pub mod types;

pub use error::{AutosaveError, Result};
pub use types::{EntityId, EntityKind, FieldValue, Patch};
