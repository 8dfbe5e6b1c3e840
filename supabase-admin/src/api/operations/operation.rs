//! Core Operation type describing a single remote call

use std::fmt;

use crate::api::collection::RecordId;
use crate::api::query::Filter;

/// A single remote call the tool can issue against the project.
///
/// Operations are descriptive: they are what a dry run prints and what log
/// lines refer to. Executing them is the job of [`crate::api::SupabaseClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Read rows from a table
    ListRecords {
        /// Table name (e.g., "users")
        table: String,
        /// Row filter, if any
        filter: Option<Filter>,
    },
    /// Delete every row matching a filter in one request
    BulkDelete {
        table: String,
        filter: Filter,
    },
    /// Delete one row by primary key
    DeleteRecord {
        table: String,
        /// Primary key column (e.g., "id")
        id_column: String,
        id: RecordId,
        /// Unique key of the row (e.g., its email), for display
        key: Option<String>,
    },
    /// Page through the auth admin user list
    ListAuthUsers,
    /// Delete one auth user
    DeleteAuthUser {
        id: RecordId,
        email: Option<String>,
    },
    /// Run a raw SQL statement through a database function
    /// POST /rest/v1/rpc/{function}
    ExecuteSql {
        function: String,
        statement: String,
    },
    /// Check whether a table is exposed by the data API
    ProbeTable {
        table: String,
    },
    /// Password sign-in
    SignIn {
        email: String,
    },
    /// Revoke the current session
    SignOut,
}

impl Operation {
    /// Create a new DeleteRecord operation
    pub fn delete_record(
        table: impl Into<String>,
        id_column: impl Into<String>,
        id: RecordId,
        key: Option<String>,
    ) -> Self {
        Self::DeleteRecord {
            table: table.into(),
            id_column: id_column.into(),
            id,
            key,
        }
    }

    /// Create a new BulkDelete operation
    pub fn bulk_delete(table: impl Into<String>, filter: Filter) -> Self {
        Self::BulkDelete {
            table: table.into(),
            filter,
        }
    }

    /// Create a new ExecuteSql operation
    pub fn execute_sql(function: impl Into<String>, statement: impl Into<String>) -> Self {
        Self::ExecuteSql {
            function: function.into(),
            statement: statement.into(),
        }
    }

    /// Get the HTTP method for this operation
    pub fn http_method(&self) -> &'static str {
        match self {
            Self::ListRecords { .. } => "GET",
            Self::BulkDelete { .. } => "DELETE",
            Self::DeleteRecord { .. } => "DELETE",
            Self::ListAuthUsers => "GET",
            Self::DeleteAuthUser { .. } => "DELETE",
            Self::ExecuteSql { .. } => "POST",
            Self::ProbeTable { .. } => "GET",
            Self::SignIn { .. } => "POST",
            Self::SignOut => "POST",
        }
    }

    /// Get the operation type as a string
    pub fn operation_type(&self) -> &'static str {
        match self {
            Self::ListRecords { .. } => "list_records",
            Self::BulkDelete { .. } => "bulk_delete",
            Self::DeleteRecord { .. } => "delete_record",
            Self::ListAuthUsers => "list_auth_users",
            Self::DeleteAuthUser { .. } => "delete_auth_user",
            Self::ExecuteSql { .. } => "execute_sql",
            Self::ProbeTable { .. } => "probe_table",
            Self::SignIn { .. } => "sign_in",
            Self::SignOut => "sign_out",
        }
    }

    /// Path and query string relative to the project URL
    pub fn path(&self) -> String {
        match self {
            Self::ListRecords { table, filter } => match filter {
                Some(filter) => format!("/rest/v1/{}?{}", table, filter.to_query_string()),
                None => format!("/rest/v1/{}", table),
            },
            Self::BulkDelete { table, filter } => {
                format!("/rest/v1/{}?{}", table, filter.to_query_string())
            }
            Self::DeleteRecord {
                table,
                id_column,
                id,
                ..
            } => format!("/rest/v1/{}?{}=eq.{}", table, id_column, id),
            Self::ListAuthUsers => "/auth/v1/admin/users".to_string(),
            Self::DeleteAuthUser { id, .. } => format!("/auth/v1/admin/users/{}", id),
            Self::ExecuteSql { function, .. } => format!("/rest/v1/rpc/{}", function),
            Self::ProbeTable { table } => format!("/rest/v1/{}?select=*&limit=1", table),
            Self::SignIn { .. } => "/auth/v1/token?grant_type=password".to_string(),
            Self::SignOut => "/auth/v1/logout".to_string(),
        }
    }

    /// Whether the operation changes remote state
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Self::BulkDelete { .. }
                | Self::DeleteRecord { .. }
                | Self::DeleteAuthUser { .. }
                | Self::ExecuteSql { .. }
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.http_method(), self.path())?;
        match self {
            Self::DeleteRecord { key: Some(key), .. }
            | Self::DeleteAuthUser {
                email: Some(key), ..
            } => write!(f, " ({})", key),
            Self::SignIn { email } => write!(f, " ({})", email),
            Self::ExecuteSql { statement, .. } => {
                write!(f, " ({} bytes of SQL)", statement.len())
            }
            _ => Ok(()),
        }
    }
}
