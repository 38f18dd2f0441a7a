use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row as _;
use tracing::info;

use super::{ColumnKind, EntityStore, OWNER_COLUMN, Row, RowKey, SelectQuery, Table};
use crate::error::StoreError;
use crate::models::EntityId;

/// Local store backed by SQLite. Tables use the same column names as the
/// hosted store so rows decode identically.
#[derive(Clone)]
pub struct SqliteStore {
    db: SqlitePool,
}

enum SqlValue {
    Text(String),
    Null,
    Bool(bool),
}

impl SqliteStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let db = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = Self::new(db);
        store.migrate().await?;
        info!("connected to sqlite store at {}", database_url);
        Ok(store)
    }

    /// A single-connection in-memory database; every extra connection would
    /// open a fresh, empty database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let store = Self::new(db);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .map_err(|e| StoreError::Query(format!("migration failed: {}", e)))
    }

    fn column_list(table: Table) -> String {
        let mut columns = vec!["id", OWNER_COLUMN];
        columns.extend(table.columns().iter().map(|(name, _)| *name));
        columns.join(", ")
    }

    fn row_to_json(table: Table, row: &SqliteRow) -> Result<Row, StoreError> {
        let mut out = Row::new();
        out.insert("id".to_string(), Value::from(row.try_get::<i64, _>("id")?));
        out.insert(
            OWNER_COLUMN.to_string(),
            Value::String(row.try_get::<String, _>(OWNER_COLUMN)?),
        );
        for (name, kind) in table.columns() {
            let value = match kind {
                ColumnKind::Text | ColumnKind::OptionalText => row
                    .try_get::<Option<String>, _>(*name)?
                    .map(Value::String)
                    .unwrap_or(Value::Null),
                ColumnKind::Bool => row
                    .try_get::<Option<bool>, _>(*name)?
                    .map(Value::Bool)
                    .unwrap_or(Value::Null),
            };
            out.insert((*name).to_string(), value);
        }
        Ok(out)
    }
}

/// Maps a JSON row onto known columns, rejecting anything the table lacks.
fn bind_values(table: Table, row: Row, allow_owner: bool) -> Result<Vec<(&'static str, SqlValue)>, StoreError> {
    let mut values = Vec::with_capacity(row.len());
    for (key, value) in row {
        let (name, kind) = if key == OWNER_COLUMN && allow_owner {
            (OWNER_COLUMN, ColumnKind::Text)
        } else {
            *table
                .columns()
                .iter()
                .find(|(name, _)| *name == key)
                .ok_or_else(|| {
                    StoreError::Query(format!("column {} is not writable on {}", key, table))
                })?
        };
        let sql_value = match (kind, value) {
            (_, Value::Null) => SqlValue::Null,
            (ColumnKind::Text | ColumnKind::OptionalText, Value::String(s)) => SqlValue::Text(s),
            (ColumnKind::Bool, Value::Bool(b)) => SqlValue::Bool(b),
            (_, other) => {
                return Err(StoreError::Query(format!(
                    "invalid value for {}.{}: {}",
                    table, name, other
                )));
            }
        };
        values.push((name, sql_value));
    }
    Ok(values)
}

macro_rules! bind_all {
    ($query:expr, $values:expr) => {{
        let mut query = $query;
        for (_, value) in $values {
            query = match value {
                SqlValue::Text(s) => query.bind(s),
                SqlValue::Null => query.bind(None::<String>),
                SqlValue::Bool(b) => query.bind(b),
            };
        }
        query
    }};
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, StoreError> {
        let order = match query.order_by {
            Some(column) => format!("{} ASC, id ASC", column),
            None => "id ASC".to_string(),
        };
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ? ORDER BY {}",
            Self::column_list(query.table),
            query.table,
            OWNER_COLUMN,
            order
        );
        let rows = sqlx::query(&sql)
            .bind(query.owner_id.to_string())
            .fetch_all(&self.db)
            .await?;

        rows.iter()
            .map(|row| Self::row_to_json(query.table, row))
            .collect()
    }

    async fn insert(&self, table: Table, row: Row) -> Result<EntityId, StoreError> {
        let values = bind_values(table, row, true)?;
        if !values.iter().any(|(name, _)| *name == OWNER_COLUMN) {
            return Err(StoreError::Query(format!("insert into {} has no owner", table)));
        }
        let columns: Vec<&str> = values.iter().map(|(name, _)| *name).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        );

        let result = bind_all!(sqlx::query(&sql), values)
            .execute(&self.db)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn update(&self, table: Table, key: RowKey, changes: Row) -> Result<(), StoreError> {
        let values = bind_values(table, changes, false)?;
        let assignments: Vec<String> = values
            .iter()
            .map(|(name, _)| format!("{} = ?", name))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ? AND {} = ?",
            table,
            assignments.join(", "),
            OWNER_COLUMN
        );

        let affected = bind_all!(sqlx::query(&sql), values)
            .bind(key.id)
            .bind(key.owner_id.to_string())
            .execute(&self.db)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, table: Table, key: RowKey) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = ? AND {} = ?", table, OWNER_COLUMN);
        let affected = sqlx::query(&sql)
            .bind(key.id)
            .bind(key.owner_id.to_string())
            .execute(&self.db)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    async fn setup_test_store() -> SqliteStore {
        SqliteStore::in_memory()
            .await
            .expect("Failed to create test store")
    }

    fn task_row(owner: Uuid, title: &str, due: &str) -> Row {
        json!({
            "userid": owner.to_string(),
            "title": title,
            "subject": "رياضيات",
            "duedate": due,
            "priority": "عالية",
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_select_is_scoped_by_owner() {
        let store = setup_test_store().await;
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();

        store.insert(Table::Tasks, task_row(me, "واجب", "2026-01-10")).await.unwrap();
        store.insert(Table::Tasks, task_row(other, "ليس لي", "2026-01-09")).await.unwrap();

        let rows = store
            .select(&SelectQuery::for_owner(Table::Tasks, me))
            .await
            .expect("Failed to select tasks");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], "واجب");
        assert_eq!(rows[0]["completed"], false);
        assert_eq!(rows[0]["userid"], me.to_string());
    }

    #[tokio::test]
    async fn test_tasks_are_ordered_by_due_date() {
        let store = setup_test_store().await;
        let me = Uuid::new_v4();

        store.insert(Table::Tasks, task_row(me, "late", "2026-03-01")).await.unwrap();
        store.insert(Table::Tasks, task_row(me, "early", "2026-01-01")).await.unwrap();
        store.insert(Table::Tasks, task_row(me, "middle", "2026-02-01")).await.unwrap();

        let rows = store
            .select(&SelectQuery::for_owner(Table::Tasks, me))
            .await
            .unwrap();
        let titles: Vec<_> = rows.iter().map(|r| r["title"].as_str().unwrap()).collect();
        assert_eq!(titles, vec!["early", "middle", "late"]);
    }

    #[tokio::test]
    async fn test_update_requires_matching_owner() {
        let store = setup_test_store().await;
        let me = Uuid::new_v4();
        let id = store.insert(Table::Tasks, task_row(me, "واجب", "2026-01-10")).await.unwrap();

        let changes = json!({ "completed": true }).as_object().cloned().unwrap();
        let foreign = RowKey { id, owner_id: Uuid::new_v4() };
        assert_eq!(
            store.update(Table::Tasks, foreign, changes.clone()).await,
            Err(StoreError::NotFound)
        );

        store
            .update(Table::Tasks, RowKey { id, owner_id: me }, changes)
            .await
            .expect("Failed to update task");
        let rows = store
            .select(&SelectQuery::for_owner(Table::Tasks, me))
            .await
            .unwrap();
        assert_eq!(rows[0]["completed"], true);
        assert_eq!(rows[0]["title"], "واجب");
    }

    #[tokio::test]
    async fn test_delete_missing_row_is_not_found() {
        let store = setup_test_store().await;
        let me = Uuid::new_v4();
        let result = store
            .delete(Table::Materials, RowKey { id: 42, owner_id: me })
            .await;
        assert_eq!(result, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_unknown_column_is_rejected() {
        let store = setup_test_store().await;
        let mut row = task_row(Uuid::new_v4(), "x", "2026-01-01");
        row.insert("owner".to_string(), json!("someone"));
        let result = store.insert(Table::Tasks, row).await;
        assert!(matches!(result, Err(StoreError::Query(_))));
    }

    #[tokio::test]
    async fn test_missing_required_column_is_a_query_error() {
        let store = setup_test_store().await;
        let row = json!({ "userid": Uuid::new_v4().to_string(), "subject": "Math" })
            .as_object()
            .cloned()
            .unwrap();
        let result = store.insert(Table::Lectures, row).await;
        assert!(matches!(result, Err(StoreError::Query(_))));
    }
}
