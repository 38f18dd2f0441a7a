pub mod lecture;
pub mod material;
pub mod task;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::store::Table;

pub use lecture::{Lecture, LecturePatch, NewLecture, WEEKDAYS, Weekday};
pub use material::{Material, MaterialPatch, NewMaterial};
pub use task::{NewTask, Priority, Task, TaskPatch};

pub type EntityId = i64;

/// A row type owned by one user and kept in its own table.
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    const TABLE: Table;

    /// Fields supplied by a create form; the owner is stamped by the store client.
    type Draft: Serialize + DeserializeOwned + Validate + Send + Sync + 'static;
    /// Partial update; only the fields that are set are sent.
    type Patch: Serialize + DeserializeOwned + Validate + Send + Sync + 'static;

    fn id(&self) -> EntityId;
    fn owner_id(&self) -> Uuid;
}

/// Drafts and patches are checked before they reach the store.
pub trait Validate {
    fn validate(&self) -> Result<(), AppError>;
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", field)));
    }
    Ok(())
}

/// Treats an explicit `null` column the same as a missing one.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
