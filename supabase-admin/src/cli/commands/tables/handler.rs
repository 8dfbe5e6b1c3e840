//! Tables command handler

use anyhow::{Context, Result};
use colored::*;
use log::info;

use super::TablesCommands;
use crate::api::SupabaseClient;
use crate::cli::commands::{admin_client, read_statement};
use crate::config::Config;

pub async fn handle_tables_command(command: TablesCommands, config: &Config) -> Result<()> {
    let client = admin_client(config)?;

    match command {
        TablesCommands::Check { tables } => {
            let missing = verify_tables(&client, &tables).await?;
            if !missing.is_empty() {
                anyhow::bail!("Missing table(s): {}", missing.join(", "));
            }
            Ok(())
        }
        TablesCommands::Create { table, sql, file } => {
            let statement = read_statement(sql, file.as_deref())?;

            if client
                .table_exists(&table)
                .await
                .with_context(|| format!("Failed to check table {}", table))?
            {
                println!("{} {} already exists", "✓".bright_green(), table.bold());
                return Ok(());
            }

            info!("Creating table {}", table);
            client
                .execute_sql(&statement)
                .await
                .with_context(|| format!("Failed to create table {}", table))?;

            let missing = verify_tables(&client, std::slice::from_ref(&table)).await?;
            if !missing.is_empty() {
                anyhow::bail!(
                    "Statement ran but {} is still not visible; the API schema cache may need a reload",
                    table
                );
            }
            Ok(())
        }
    }
}

/// Probe each table and print the result; returns the missing ones
pub async fn verify_tables(client: &SupabaseClient, tables: &[String]) -> Result<Vec<String>> {
    let mut missing = Vec::new();

    for table in tables {
        let exists = client
            .table_exists(table)
            .await
            .with_context(|| format!("Failed to check table {}", table))?;

        if exists {
            println!("{} {} exists", "✓".bright_green(), table.bold());
        } else {
            println!("{} {} does not exist", "✗".bright_red(), table.bold());
            missing.push(table.clone());
        }
    }

    Ok(missing)
}
