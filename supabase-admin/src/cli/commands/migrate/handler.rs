//! Migrate command handler

use anyhow::{Context, Result};
use colored::*;
use log::info;

use super::MigrateArgs;
use crate::cli::commands::tables::verify_tables;
use crate::cli::commands::{admin_client, read_sql_file};
use crate::config::Config;

/// Run a migration file through the SQL function, then check the expected tables
pub async fn handle_migrate_command(args: MigrateArgs, config: &Config) -> Result<()> {
    let statement = read_sql_file(&args.path)?;
    let client = admin_client(config)?;

    println!(
        "Running migration {} ({} bytes)",
        args.path.display().to_string().cyan(),
        statement.len()
    );
    info!("Executing migration through rpc/{}", client.rest_options().rpc_function);

    let result = client
        .execute_sql(&statement)
        .await
        .with_context(|| format!("Migration {} failed", args.path.display()))?;

    println!("{} Migration executed", "✓".bright_green().bold());
    if !result.is_null() {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    if !args.verify.is_empty() {
        let missing = verify_tables(&client, &args.verify).await?;
        if !missing.is_empty() {
            anyhow::bail!("Migration ran but table(s) are missing: {}", missing.join(", "));
        }
    }
    Ok(())
}
