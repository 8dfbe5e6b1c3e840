//! Remote record collections
//!
//! [`RecordStore`] is the capability set the purge logic needs from a remote
//! collection: list by filter, bulk delete by filter, delete by id. Two
//! collections implement it: a PostgREST table and the auth user list.

use async_trait::async_trait;
use log::warn;
use serde_json::{Value, json};
use std::fmt;

use super::client::SupabaseClient;
use super::error::ApiError;
use super::operations::Operation;
use super::query::{Filter, OrderBy, Query};

/// Text form of a remote primary key (numeric ids and UUIDs alike)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Read an id out of a JSON column; strings and numbers are accepted
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The part of a remote row needed to drive deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: RecordId,
    /// Unique key, e.g. the email address
    pub key: Option<String>,
}

impl Record {
    pub fn new(id: impl Into<String>, key: Option<&str>) -> Self {
        Self {
            id: RecordId::new(id),
            key: key.map(str::to_string),
        }
    }

    /// Key when present, otherwise the id
    pub fn label(&self) -> &str {
        self.key.as_deref().unwrap_or(self.id.as_str())
    }
}

/// A remote collection of records keyed by a unique column
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Name used in messages, e.g. `users` or `auth.users`
    fn name(&self) -> &str;

    /// Column holding the unique key the protected set refers to
    fn key_column(&self) -> &str;

    /// Every record matching the filter
    async fn list_records(&self, filter: &Filter) -> Result<Vec<Record>, ApiError>;

    /// Delete every record matching the filter in one call; returns how many went
    async fn delete_records(&self, filter: &Filter) -> Result<usize, ApiError>;

    /// Delete a single record
    async fn delete_record_by_id(&self, id: &RecordId) -> Result<(), ApiError>;

    /// The call `list_records` makes
    fn list_operation(&self, filter: &Filter) -> Operation;

    /// The call `delete_records` makes
    fn bulk_delete_operation(&self, filter: &Filter) -> Operation;

    /// The call `delete_record_by_id` makes
    fn delete_operation(&self, record: &Record) -> Operation;
}

/// A table exposed through the data API
#[derive(Debug, Clone)]
pub struct TableCollection<'a> {
    client: &'a SupabaseClient,
    table: String,
    id_column: String,
    key_column: String,
    page_size: usize,
}

impl<'a> TableCollection<'a> {
    /// Table keyed by `email` with primary key `id`
    pub fn new(client: &'a SupabaseClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
            id_column: "id".to_string(),
            key_column: "email".to_string(),
            page_size: client.rest_options().page_size,
        }
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    pub fn with_key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = column.into();
        self
    }

    fn to_record(&self, row: &Value) -> Option<Record> {
        let Some(id) = row.get(&self.id_column).and_then(RecordId::from_value) else {
            warn!(
                "Skipping row without usable {} in {}: {}",
                self.id_column, self.table, row
            );
            return None;
        };
        let key = row
            .get(&self.key_column)
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(Record { id, key })
    }
}

#[async_trait]
impl<'a> RecordStore for TableCollection<'a> {
    fn name(&self) -> &str {
        &self.table
    }

    fn key_column(&self) -> &str {
        &self.key_column
    }

    async fn list_records(&self, filter: &Filter) -> Result<Vec<Record>, ApiError> {
        let mut records = Vec::new();
        let mut offset = 0usize;

        // The server may cap a page below `limit` (db-max-rows), so only an
        // empty page ends the scan
        loop {
            let query = Query::new()
                .select([self.id_column.as_str(), self.key_column.as_str()])
                .filter(filter.clone())
                .order_by(OrderBy::asc(self.id_column.as_str()))
                .limit(self.page_size)
                .offset(offset);

            let rows = self.client.list_records(&self.table, &query).await?;
            if rows.is_empty() {
                break;
            }
            offset += rows.len();
            records.extend(rows.iter().filter_map(|row| self.to_record(row)));
        }

        Ok(records)
    }

    async fn delete_records(&self, filter: &Filter) -> Result<usize, ApiError> {
        let deleted = self
            .client
            .delete_records(&self.table, filter, &self.id_column)
            .await?;
        Ok(deleted.len())
    }

    async fn delete_record_by_id(&self, id: &RecordId) -> Result<(), ApiError> {
        self.client
            .delete_record_by_id(&self.table, &self.id_column, id.as_str())
            .await
    }

    fn list_operation(&self, filter: &Filter) -> Operation {
        Operation::ListRecords {
            table: self.table.clone(),
            filter: Some(filter.clone()),
        }
    }

    fn bulk_delete_operation(&self, filter: &Filter) -> Operation {
        Operation::bulk_delete(self.table.clone(), filter.clone())
    }

    fn delete_operation(&self, record: &Record) -> Operation {
        Operation::delete_record(
            self.table.clone(),
            self.id_column.clone(),
            record.id.clone(),
            record.key.clone(),
        )
    }
}

/// The project's auth users, keyed by email.
///
/// The admin API has no server-side filtering, so filters are evaluated
/// locally and bulk deletion is not available.
#[derive(Debug, Clone)]
pub struct AuthUserCollection<'a> {
    client: &'a SupabaseClient,
}

impl<'a> AuthUserCollection<'a> {
    pub fn new(client: &'a SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<'a> RecordStore for AuthUserCollection<'a> {
    fn name(&self) -> &str {
        "auth.users"
    }

    fn key_column(&self) -> &str {
        "email"
    }

    async fn list_records(&self, filter: &Filter) -> Result<Vec<Record>, ApiError> {
        let users = self.client.list_auth_users().await?;

        Ok(users
            .into_iter()
            .filter(|user| filter.matches(&json!({ "id": user.id, "email": user.email })))
            .map(|user| Record {
                id: RecordId::new(user.id.to_string()),
                key: user.email,
            })
            .collect())
    }

    async fn delete_records(&self, _filter: &Filter) -> Result<usize, ApiError> {
        Err(ApiError::Unsupported("bulk delete of auth users"))
    }

    async fn delete_record_by_id(&self, id: &RecordId) -> Result<(), ApiError> {
        self.client.delete_auth_user(id.as_str()).await
    }

    fn list_operation(&self, _filter: &Filter) -> Operation {
        Operation::ListAuthUsers
    }

    fn bulk_delete_operation(&self, filter: &Filter) -> Operation {
        Operation::bulk_delete(self.name(), filter.clone())
    }

    fn delete_operation(&self, record: &Record) -> Operation {
        Operation::DeleteAuthUser {
            id: record.id.clone(),
            email: record.key.clone(),
        }
    }
}
