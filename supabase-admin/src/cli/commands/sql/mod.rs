pub mod handler;

pub use handler::handle_sql_command;

use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct SqlArgs {
    /// Statement to run
    #[arg(conflicts_with = "file")]
    pub statement: Option<String>,

    /// Read the statement from a file
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Print the result on one line
    #[arg(long)]
    pub compact: bool,
}
