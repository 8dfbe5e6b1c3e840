pub mod login;
pub mod migrate;
pub mod purge;
pub mod sql;
pub mod tables;
pub mod users;

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::api::SupabaseClient;
use crate::config::Config;

/// Client authenticated with the service role key
pub fn admin_client(config: &Config) -> Result<SupabaseClient> {
    let key = config.service_role_key()?;
    SupabaseClient::from_config(config, key).context("Failed to create Supabase client")
}

/// Read a SQL file, rejecting missing and empty files
pub fn read_sql_file(path: &Path) -> Result<String> {
    if !path.exists() {
        anyhow::bail!("SQL file does not exist: {}", path.display());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read SQL file: {}", path.display()))?;

    let trimmed = content.trim();
    if trimmed.is_empty() {
        anyhow::bail!("SQL file is empty: {}", path.display());
    }
    Ok(trimmed.to_string())
}

/// A statement given either inline or as a file, never both
pub fn read_statement(inline: Option<String>, file: Option<&Path>) -> Result<String> {
    match (inline, file) {
        (Some(_), Some(_)) => {
            anyhow::bail!("Cannot specify both a SQL statement and --file")
        }
        (Some(statement), None) => {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                anyhow::bail!("SQL statement is empty");
            }
            Ok(trimmed.to_string())
        }
        (None, Some(path)) => read_sql_file(path),
        (None, None) => {
            anyhow::bail!("Either provide a SQL statement or use --file to specify a SQL file")
        }
    }
}

/// Configuration pointing at a mock server, for handler tests
#[cfg(test)]
pub(crate) fn test_config(project_url: &str) -> Config {
    use crate::config::{ENV_ANON_KEY, ENV_SERVICE_ROLE_KEY, ENV_URL, FileConfig};

    Config::from_sources(FileConfig::default(), |name| match name {
        ENV_URL => Some(project_url.to_string()),
        ENV_SERVICE_ROLE_KEY => Some("service-key".to_string()),
        ENV_ANON_KEY => Some("anon-key".to_string()),
        _ => None,
    })
    .unwrap()
}
