//! Supabase API module
//!
//! Typed access to the two halves of a hosted project: the PostgREST data
//! API (`/rest/v1`, including RPC) and the GoTrue auth API (`/auth/v1`).

pub mod client;
pub mod collection;
pub mod error;
pub mod models;
pub mod operations;
pub mod query;
pub mod resilience;

pub use client::SupabaseClient;
pub use collection::{AuthUserCollection, Record, RecordId, RecordStore, TableCollection};
pub use error::{ApiError, RemoteError};
pub use models::{AuthUser, Session};
pub use operations::Operation;
pub use query::{Filter, FilterValue, OrderBy, Query};
pub use resilience::{
    ConcurrencyConfig, ConcurrencyLimiter, ConcurrencyStats, MonitoringConfig, ResilienceConfig,
};
