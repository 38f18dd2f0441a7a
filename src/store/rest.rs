use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use super::{EntityStore, OWNER_COLUMN, Row, RowKey, SelectQuery, Table};
use crate::error::StoreError;
use crate::models::EntityId;

#[derive(Clone, Debug)]
pub struct RestConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub base_url: String,
    pub api_key: String,
}

/// PostgREST dialect of the entity store (the hosted Supabase tables).
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    config: RestConfig,
    access_token: Option<String>,
}

impl RestStore {
    pub fn new(config: RestConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .build()
            .map_err(|e| StoreError::Transport(format!("Failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            config,
            access_token: None,
        })
    }

    /// Same connection, authenticated as a signed-in user.
    pub fn with_access_token(&self, access_token: Option<String>) -> Self {
        Self {
            client: self.client.clone(),
            config: self.config.clone(),
            access_token,
        }
    }

    fn table_url(&self, table: Table) -> Result<Url, StoreError> {
        let base = self.config.base_url.trim_end_matches('/');
        Url::parse(&format!("{}/rest/v1/{}", base, table))
            .map_err(|e| StoreError::Transport(format!("invalid store url: {}", e)))
    }

    pub(crate) fn select_url(&self, query: &SelectQuery) -> Result<Url, StoreError> {
        let mut url = self.table_url(query.table)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", "*");
            pairs.append_pair(OWNER_COLUMN, &format!("eq.{}", query.owner_id));
            match query.order_by {
                Some(column) => pairs.append_pair("order", &format!("{}.asc,id.asc", column)),
                None => pairs.append_pair("order", "id.asc"),
            };
        }
        Ok(url)
    }

    pub(crate) fn key_url(&self, table: Table, key: RowKey) -> Result<Url, StoreError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{}", key.id))
            .append_pair(OWNER_COLUMN, &format!("eq.{}", key.owner_id));
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = self.access_token.as_deref().unwrap_or(&self.config.api_key);
        builder
            .header("apikey", &self.config.api_key)
            .header("Authorization", format!("Bearer {}", token))
    }

    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::Transport(
                format!("store refused credentials {}: {}", status, body),
            )),
            _ => Err(StoreError::Query(format!("store error {}: {}", status, body))),
        }
    }

    async fn representation(response: Response) -> Result<Vec<Row>, StoreError> {
        let response = Self::check(response).await?;
        Ok(response.json::<Vec<Row>>().await?)
    }
}

#[async_trait]
impl EntityStore for RestStore {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, StoreError> {
        let url = self.select_url(query)?;
        debug!("GET {}", url);
        let response = self.authorized(self.client.get(url)).send().await?;
        Self::representation(response).await
    }

    async fn insert(&self, table: Table, row: Row) -> Result<EntityId, StoreError> {
        let url = self.table_url(table)?;
        let response = self
            .authorized(self.client.post(url))
            .header("Prefer", "return=representation")
            .json(&vec![Value::Object(row)])
            .send()
            .await?;

        let rows = Self::representation(response).await?;
        rows.first()
            .and_then(|r| r.get("id"))
            .and_then(Value::as_i64)
            .ok_or_else(|| StoreError::Query(format!("insert into {} returned no id", table)))
    }

    async fn update(&self, table: Table, key: RowKey, changes: Row) -> Result<(), StoreError> {
        let url = self.key_url(table, key)?;
        let response = self
            .authorized(self.client.patch(url))
            .header("Prefer", "return=representation")
            .json(&Value::Object(changes))
            .send()
            .await?;

        if Self::representation(response).await?.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, table: Table, key: RowKey) -> Result<(), StoreError> {
        let url = self.key_url(table, key)?;
        let response = self
            .authorized(self.client.delete(url))
            .header("Prefer", "return=representation")
            .send()
            .await?;

        if Self::representation(response).await?.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn store() -> RestStore {
        RestStore::new(RestConfig {
            base_url: "https://example.supabase.co/".to_string(),
            api_key: "anon".to_string(),
        })
        .unwrap()
    }

    fn pairs(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn select_url_filters_by_owner_and_orders_tasks() {
        let owner = Uuid::new_v4();
        let url = store()
            .select_url(&SelectQuery::for_owner(Table::Tasks, owner))
            .unwrap();

        assert_eq!(url.path(), "/rest/v1/tasks");
        let q = pairs(&url);
        assert_eq!(q["userid"], format!("eq.{}", owner));
        assert_eq!(q["order"], "duedate.asc,id.asc");
    }

    #[test]
    fn key_url_scopes_by_id_and_owner() {
        let owner = Uuid::new_v4();
        let url = store()
            .key_url(Table::Lectures, RowKey { id: 7, owner_id: owner })
            .unwrap();

        let q = pairs(&url);
        assert_eq!(q["id"], "eq.7");
        assert_eq!(q["userid"], format!("eq.{}", owner));
    }
}
