pub mod handler;

pub use handler::{handle_tables_command, verify_tables};

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Debug, Subcommand)]
pub enum TablesCommands {
    /// Report whether each table is reachable through the data API
    Check {
        #[arg(required = true, value_name = "TABLE")]
        tables: Vec<String>,
    },
    /// Create a table by running its definition through the SQL function
    Create {
        table: String,
        /// Table definition
        #[arg(long, value_name = "STATEMENT", conflicts_with = "file")]
        sql: Option<String>,
        /// File holding the table definition
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },
}
