//! SQL command handler

use anyhow::{Context, Result};
use colored::*;

use super::SqlArgs;
use crate::cli::commands::{admin_client, read_statement};
use crate::config::Config;

pub async fn handle_sql_command(args: SqlArgs, config: &Config) -> Result<()> {
    let statement = read_statement(args.statement, args.file.as_deref())?;
    let client = admin_client(config)?;

    let result = client
        .execute_sql(&statement)
        .await
        .context("Failed to execute statement")?;

    if result.is_null() {
        println!("{} Statement executed", "✓".bright_green().bold());
    } else if args.compact {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}
