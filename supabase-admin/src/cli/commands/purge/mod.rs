pub mod handler;

pub use handler::handle_purge_command;

use clap::{Args, ValueEnum};

use crate::services::exclusion::Strategy;

#[derive(Debug, Args)]
pub struct PurgeArgs {
    /// Email to keep; repeat or comma-separate for several
    #[arg(
        long,
        value_name = "EMAIL",
        env = "SUPABASE_PROTECTED_EMAILS",
        value_delimiter = ',',
        required = true
    )]
    pub keep: Vec<String>,

    /// Collection to purge
    #[arg(long, value_enum, default_value_t = PurgeTarget::Table)]
    pub target: PurgeTarget,

    /// Table to purge when the target is a table
    #[arg(long, default_value = "users")]
    pub table: String,

    /// Column holding the protected key
    #[arg(long, default_value = "email")]
    pub key_column: String,

    /// Primary key column
    #[arg(long, default_value = "id")]
    pub id_column: String,

    /// Delete record by record, or with a single filtered request
    #[arg(long, value_enum, default_value_t = PurgeStrategy::Enumerate)]
    pub strategy: PurgeStrategy,

    /// Deletes in flight at once (overrides api.max_concurrent_deletes)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: Option<u16>,

    /// Show the requests that would be made without deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PurgeTarget {
    /// A table behind the data API
    Table,
    /// The project's auth users
    Auth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PurgeStrategy {
    /// Fetch ids first, then delete each one
    Enumerate,
    /// One filtered delete
    Bulk,
}

impl From<PurgeStrategy> for Strategy {
    fn from(value: PurgeStrategy) -> Self {
        match value {
            PurgeStrategy::Enumerate => Strategy::Enumerate,
            PurgeStrategy::Bulk => Strategy::Bulk,
        }
    }
}
