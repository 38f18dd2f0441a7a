use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Entity, EntityId, Validate, null_as_default, require_text};
use crate::error::AppError;
use crate::store::Table;

/// Display-only; tasks are never sorted by priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    #[default]
    #[serde(rename = "منخفضة")]
    Low,
    #[serde(rename = "متوسطة")]
    Medium,
    #[serde(rename = "عالية")]
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: EntityId,
    #[serde(rename = "userid")]
    pub owner_id: Uuid,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subject: String,
    #[serde(rename = "duedate", default, deserialize_with = "null_as_default")]
    pub due_date: String,
    /// Kept as the stored label so an unknown value does not hide the row.
    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,
}

impl Entity for Task {
    const TABLE: Table = Table::Tasks;
    type Draft = NewTask;
    type Patch = TaskPatch;

    fn id(&self) -> EntityId {
        self.id
    }

    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub subject: String,
    #[serde(rename = "duedate", alias = "due_date")]
    pub due_date: NaiveDate,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(
        rename = "duedate",
        alias = "due_date",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn completion(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }
}

impl Validate for NewTask {
    fn validate(&self) -> Result<(), AppError> {
        require_text("title", &self.title)?;
        require_text("subject", &self.subject)
    }
}

impl Validate for TaskPatch {
    fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        if let Some(subject) = &self.subject {
            require_text("subject", subject)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_serializes_store_column_names() {
        let draft = NewTask {
            title: "واجب ١".to_string(),
            subject: "رياضيات".to_string(),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            priority: Priority::High,
        };
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["duedate"], "2024-01-02");
        assert_eq!(value["priority"], "عالية");
    }

    #[test]
    fn patch_only_carries_set_fields() {
        let value = serde_json::to_value(TaskPatch::completion(true)).unwrap();
        assert_eq!(value, serde_json::json!({ "completed": true }));
    }

    #[test]
    fn task_row_with_null_completed_reads_as_incomplete() {
        let row = serde_json::json!({
            "id": 1,
            "userid": Uuid::new_v4(),
            "title": "Essay",
            "subject": "English",
            "duedate": "2024-01-01",
            "priority": "غير معروفة",
            "completed": null,
        });
        let task: Task = serde_json::from_value(row).unwrap();
        assert!(!task.completed);
        assert_eq!(task.priority, "غير معروفة");
    }

    #[test]
    fn priority_defaults_to_low() {
        let body = serde_json::json!({ "title": "a", "subject": "b", "due_date": "2024-03-01" });
        let draft: NewTask = serde_json::from_value(body).unwrap();
        assert_eq!(draft.priority, Priority::Low);
        assert_eq!(serde_json::to_value(draft.priority).unwrap(), "منخفضة");
    }
}
