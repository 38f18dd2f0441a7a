pub mod rest;
pub mod sqlite;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::StoreBackend;
use crate::error::StoreError;
use crate::models::{Entity, EntityId};
use crate::notify::{ChangeEvent, ChangeHub, ChangeKind};

pub use rest::{RestConfig, RestStore};
pub use sqlite::SqliteStore;

/// One row as the store sees it: column name to JSON value.
pub type Row = Map<String, Value>;

pub const OWNER_COLUMN: &str = "userid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Lectures,
    Tasks,
    Materials,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnKind {
    Text,
    OptionalText,
    Bool,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Lectures => "lectures",
            Table::Tasks => "tasks",
            Table::Materials => "materials",
        }
    }

    /// Store-side ordering for a full read.
    pub fn order_by(self) -> Option<&'static str> {
        match self {
            Table::Tasks => Some("duedate"),
            Table::Lectures | Table::Materials => None,
        }
    }

    /// Writable columns besides `id` and the owner column.
    pub(crate) fn columns(self) -> &'static [(&'static str, ColumnKind)] {
        match self {
            Table::Lectures => &[
                ("subject", ColumnKind::Text),
                ("day", ColumnKind::Text),
                ("time", ColumnKind::Text),
                ("location", ColumnKind::OptionalText),
            ],
            Table::Tasks => &[
                ("title", ColumnKind::Text),
                ("subject", ColumnKind::Text),
                ("duedate", ColumnKind::Text),
                ("priority", ColumnKind::Text),
                ("completed", ColumnKind::Bool),
            ],
            Table::Materials => &[
                ("subject", ColumnKind::Text),
                ("fileurl", ColumnKind::Text),
            ],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Equality filter on the owner plus the table's ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub table: Table,
    pub owner_id: Uuid,
    pub order_by: Option<&'static str>,
}

impl SelectQuery {
    pub fn for_owner(table: Table, owner_id: Uuid) -> Self {
        Self {
            table,
            owner_id,
            order_by: table.order_by(),
        }
    }
}

/// Primary key plus owner; every write is scoped by both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowKey {
    pub id: EntityId,
    pub owner_id: Uuid,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, StoreError>;
    /// `row` already carries the owner column. Returns the new primary key.
    async fn insert(&self, table: Table, row: Row) -> Result<EntityId, StoreError>;
    async fn update(&self, table: Table, key: RowKey, changes: Row) -> Result<(), StoreError>;
    async fn delete(&self, table: Table, key: RowKey) -> Result<(), StoreError>;
}

/// Typed front for an [`EntityStore`]. Successful writes are echoed on the
/// change hub the way the remote store would announce them.
#[derive(Clone)]
pub struct StoreClient {
    store: Arc<dyn EntityStore>,
    changes: ChangeHub,
}

impl StoreClient {
    pub fn new(store: Arc<dyn EntityStore>, changes: ChangeHub) -> Self {
        Self { store, changes }
    }

    pub fn changes(&self) -> &ChangeHub {
        &self.changes
    }

    /// Full read for one owner. Rows that do not decode are skipped.
    pub async fn fetch_all<E: Entity>(&self, owner_id: Uuid) -> Result<Vec<E>, StoreError> {
        let query = SelectQuery::for_owner(E::TABLE, owner_id);
        let rows = self.store.select(&query).await?;
        let mut items = Vec::with_capacity(rows.len());

        for row in rows {
            let id = row.get("id").cloned().unwrap_or(Value::Null);
            match serde_json::from_value::<E>(Value::Object(row)) {
                Ok(item) => items.push(item),
                Err(e) => {
                    warn!("Failed to parse {} row {}: {}", E::TABLE, id, e);
                }
            }
        }
        debug!(table = %E::TABLE, owner = %owner_id, count = items.len(), "fetched rows");
        Ok(items)
    }

    pub async fn insert<E: Entity>(
        &self,
        owner_id: Uuid,
        draft: &E::Draft,
    ) -> Result<EntityId, StoreError> {
        let mut row = to_row(draft)?;
        row.insert(OWNER_COLUMN.to_string(), Value::String(owner_id.to_string()));
        let id = self.store.insert(E::TABLE, row).await?;
        self.announce(E::TABLE, owner_id, ChangeKind::Insert, id);
        Ok(id)
    }

    pub async fn update<E: Entity>(
        &self,
        owner_id: Uuid,
        id: EntityId,
        patch: &E::Patch,
    ) -> Result<(), StoreError> {
        let changes = to_row(patch)?;
        if changes.is_empty() {
            return Err(StoreError::Query("update has no fields".to_string()));
        }
        self.store
            .update(E::TABLE, RowKey { id, owner_id }, changes)
            .await?;
        self.announce(E::TABLE, owner_id, ChangeKind::Update, id);
        Ok(())
    }

    pub async fn delete<E: Entity>(&self, owner_id: Uuid, id: EntityId) -> Result<(), StoreError> {
        self.store.delete(E::TABLE, RowKey { id, owner_id }).await?;
        self.announce(E::TABLE, owner_id, ChangeKind::Delete, id);
        Ok(())
    }

    fn announce(&self, table: Table, owner_id: Uuid, kind: ChangeKind, row_id: EntityId) {
        self.changes.publish(ChangeEvent {
            table,
            owner_id,
            kind,
            row_id: Some(row_id),
        });
    }
}

/// Which store a session talks to.
#[derive(Clone)]
pub enum Backend {
    /// One store shared by every session, e.g. the local SQLite database.
    Shared(Arc<dyn EntityStore>),
    /// Hosted store; each session authenticates with its own token.
    Rest(RestStore),
}

impl Backend {
    pub async fn connect(config: &StoreBackend) -> Result<Self, StoreError> {
        match config {
            StoreBackend::Sqlite { database_url } => {
                let store = SqliteStore::connect(database_url).await?;
                Ok(Backend::Shared(Arc::new(store)))
            }
            StoreBackend::Rest(rest) => Ok(Backend::Rest(RestStore::new(rest.clone())?)),
        }
    }

    pub fn store_for(&self, access_token: Option<&str>) -> Arc<dyn EntityStore> {
        match self {
            Backend::Shared(store) => store.clone(),
            Backend::Rest(store) => {
                Arc::new(store.with_access_token(access_token.map(str::to_string)))
            }
        }
    }
}

fn to_row<T: Serialize>(value: &T) -> Result<Row, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Query(format!("expected an object, got {}", other))),
        Err(e) => Err(StoreError::Query(e.to_string())),
    }
}
