pub mod handler;

pub use handler::handle_users_command;

use clap::{Subcommand, ValueEnum};

#[derive(Debug, Subcommand)]
pub enum UsersCommands {
    /// List every auth user
    List {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns
    Table,
    /// Pretty-printed JSON
    Json,
    /// Single-line JSON
    JsonCompact,
    /// Comma-separated values with a header row
    Csv,
}
