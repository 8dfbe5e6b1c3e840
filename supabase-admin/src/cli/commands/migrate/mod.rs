pub mod handler;

pub use handler::handle_migrate_command;

use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// SQL migration file
    pub path: PathBuf,

    /// Tables that must exist once the migration has run
    #[arg(long, value_name = "TABLE")]
    pub verify: Vec<String>,
}
