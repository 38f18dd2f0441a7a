use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Entity, EntityId, Validate, null_as_default, require_text};
use crate::error::AppError;
use crate::store::Table;

/// Canonical weekday labels, Sunday first. Grid bucketing compares against
/// these byte for byte.
pub const WEEKDAYS: [&str; 7] = [
    "الأحد",
    "الإثنين",
    "الثلاثاء",
    "الأربعاء",
    "الخميس",
    "الجمعة",
    "السبت",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weekday {
    #[serde(rename = "الأحد")]
    Sunday,
    #[serde(rename = "الإثنين")]
    Monday,
    #[serde(rename = "الثلاثاء")]
    Tuesday,
    #[serde(rename = "الأربعاء")]
    Wednesday,
    #[serde(rename = "الخميس")]
    Thursday,
    #[serde(rename = "الجمعة")]
    Friday,
    #[serde(rename = "السبت")]
    Saturday,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lecture {
    pub id: EntityId,
    #[serde(rename = "userid")]
    pub owner_id: Uuid,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subject: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub day: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub time: String,
    #[serde(default)]
    pub location: Option<String>,
}

impl Entity for Lecture {
    const TABLE: Table = Table::Lectures;
    type Draft = NewLecture;
    type Patch = LecturePatch;

    fn id(&self) -> EntityId {
        self.id
    }

    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLecture {
    pub subject: String,
    pub day: Weekday,
    pub time: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LecturePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<Weekday>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

fn validate_time(time: &str) -> Result<(), AppError> {
    NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
        .map(|_| ())
        .map_err(|_| AppError::BadRequest(format!("Invalid lecture time: {}", time)))
}

impl Validate for NewLecture {
    fn validate(&self) -> Result<(), AppError> {
        require_text("subject", &self.subject)?;
        validate_time(&self.time)
    }
}

impl Validate for LecturePatch {
    fn validate(&self) -> Result<(), AppError> {
        if let Some(subject) = &self.subject {
            require_text("subject", subject)?;
        }
        if let Some(time) = &self.time {
            validate_time(time)?;
        }
        Ok(())
    }
}
