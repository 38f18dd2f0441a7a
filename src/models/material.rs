use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Entity, EntityId, Validate, null_as_default, require_text};
use crate::error::AppError;
use crate::store::Table;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: EntityId,
    #[serde(rename = "userid")]
    pub owner_id: Uuid,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subject: String,
    #[serde(rename = "fileurl", default, deserialize_with = "null_as_default")]
    pub file_url: String,
}

impl Entity for Material {
    const TABLE: Table = Table::Materials;
    type Draft = NewMaterial;
    type Patch = MaterialPatch;

    fn id(&self) -> EntityId {
        self.id
    }

    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMaterial {
    pub subject: String,
    #[serde(rename = "fileurl", alias = "file_url")]
    pub file_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(
        rename = "fileurl",
        alias = "file_url",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub file_url: Option<String>,
}

impl Validate for NewMaterial {
    fn validate(&self) -> Result<(), AppError> {
        require_text("subject", &self.subject)?;
        require_text("file_url", &self.file_url)
    }
}

impl Validate for MaterialPatch {
    fn validate(&self) -> Result<(), AppError> {
        if let Some(subject) = &self.subject {
            require_text("subject", subject)?;
        }
        if let Some(url) = &self.file_url {
            require_text("file_url", url)?;
        }
        Ok(())
    }
}
