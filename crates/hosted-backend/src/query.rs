//! Record store query builder.
//!
//! Covers the subset of the PostgREST surface the application needs:
//! equality filters, a single ordering column, inserts returning the stored
//! row and upserts keyed on a declared conflict target.

use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::client::{check_status, Client};
use crate::error::BackendError;

/// Header asking the store to echo back written rows.
const PREFER_RETURN: &str = "return=representation";

/// Header asking the store to merge conflicting rows and echo them back.
const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=representation";

/// Builder for a single request against one table.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    client: Client,
    table: String,
    access_token: Option<String>,
    columns: String,
    filters: Vec<(String, String)>,
    order: Option<String>,
}

impl QueryBuilder {
    pub(crate) fn new(client: Client, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
            access_token: None,
            columns: "*".to_string(),
            filters: Vec::new(),
            order: None,
        }
    }

    /// Run the request as the user owning `access_token`.
    pub fn auth(mut self, access_token: &str) -> Self {
        self.access_token = Some(access_token.to_string());
        self
    }

    /// Columns to return (PostgREST `select` syntax).
    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    /// Keep only rows where `column` equals `value`.
    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    /// Order results by `column`.
    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order = Some(format!("{}.{}", column, direction));
        self
    }

    /// Fetch all matching rows.
    pub async fn execute<T: DeserializeOwned>(self) -> Result<Vec<T>, BackendError> {
        let url = self.read_url()?;
        tracing::debug!(table = %self.table, %url, "select");

        let response = self
            .client
            .http_client()
            .get(url)
            .headers(self.client.build_headers(self.access_token.as_deref())?)
            .send()
            .await?;

        let response = check_status(response).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Insert one row and return the stored row, including any
    /// server-assigned columns.
    pub async fn insert<B, T>(self, row: &B) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.write_url(None)?;
        tracing::debug!(table = %self.table, "insert");
        self.send_write(url, row, PREFER_RETURN).await
    }

    /// Insert one row, or merge it into the existing row that collides on
    /// the `on_conflict` columns (comma separated). Returns the stored row.
    pub async fn upsert<B, T>(self, row: &B, on_conflict: &str) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.write_url(Some(on_conflict))?;
        tracing::debug!(table = %self.table, on_conflict, "upsert");
        self.send_write(url, row, PREFER_UPSERT).await
    }

    async fn send_write<B, T>(self, url: Url, row: &B, prefer: &'static str) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .http_client()
            .post(url)
            .headers(self.client.build_headers(self.access_token.as_deref())?)
            .header("Prefer", prefer)
            .json(row)
            .send()
            .await?;

        let response = check_status(response).await?;
        let body = response.text().await?;

        // The store answers writes with an array of the affected rows.
        let rows: Vec<T> = serde_json::from_str(&body)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::EmptyResponse(self.table.clone()))
    }

    fn read_url(&self) -> Result<Url, BackendError> {
        let mut url = self.client.rest_url(&self.table)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", &self.columns);
            for (column, filter) in &self.filters {
                pairs.append_pair(column, filter);
            }
            if let Some(ref order) = self.order {
                pairs.append_pair("order", order);
            }
        }
        Ok(url)
    }

    fn write_url(&self, on_conflict: Option<&str>) -> Result<Url, BackendError> {
        let mut url = self.client.rest_url(&self.table)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", &self.columns);
            if let Some(target) = on_conflict {
                pairs.append_pair("on_conflict", target);
            }
        }
        Ok(url)
    }
}
