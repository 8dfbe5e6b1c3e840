//! Command-line interface
//!
//! One binary, one subcommand per administrative task. Configuration is
//! resolved once here and handed to the command handlers.

pub mod commands;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use commands::{
    login::LoginArgs, migrate::MigrateArgs, purge::PurgeArgs, sql::SqlArgs,
    tables::TablesCommands, users::UsersCommands,
};

/// Administrative tasks for a hosted Supabase project
#[derive(Debug, Parser)]
#[command(name = "supabase-admin", version, about)]
pub struct Cli {
    /// Config file (defaults to <config dir>/supabase-admin/config.toml)
    #[arg(long, global = true, env = "SUPABASE_ADMIN_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Env file to load before reading the environment (defaults to ./.env)
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Delete every user except the protected ones
    Purge(PurgeArgs),
    /// Inspect auth users
    Users {
        #[command(subcommand)]
        command: UsersCommands,
    },
    /// Check for or create tables
    Tables {
        #[command(subcommand)]
        command: TablesCommands,
    },
    /// Run a SQL migration file through the SQL function
    Migrate(MigrateArgs),
    /// Run a single SQL statement through the SQL function
    Sql(SqlArgs),
    /// Verify that an account can sign in and out
    Login(LoginArgs),
}

/// Resolve configuration and dispatch to the command handler
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref(), cli.env_file.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Purge(args) => commands::purge::handle_purge_command(args, &config).await,
        Commands::Users { command } => commands::users::handle_users_command(command, &config).await,
        Commands::Tables { command } => {
            commands::tables::handle_tables_command(command, &config).await
        }
        Commands::Migrate(args) => commands::migrate::handle_migrate_command(args, &config).await,
        Commands::Sql(args) => commands::sql::handle_sql_command(args, &config).await,
        Commands::Login(args) => commands::login::handle_login_command(args, &config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::purge::{PurgeStrategy, PurgeTarget};
    use crate::cli::commands::users::OutputFormat;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_purge() {
        let cli = Cli::try_parse_from([
            "supabase-admin",
            "-vv",
            "purge",
            "--keep",
            "admin@x.com",
            "--keep",
            "ops@x.com",
            "--strategy",
            "bulk",
            "--yes",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Purge(args) = cli.command else {
            panic!("expected purge");
        };
        assert_eq!(args.keep, vec!["admin@x.com", "ops@x.com"]);
        assert_eq!(args.strategy, PurgeStrategy::Bulk);
        assert_eq!(args.target, PurgeTarget::Table);
        assert_eq!(args.table, "users");
        assert!(args.yes);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_parse_users_list_format() {
        let cli = Cli::try_parse_from(["supabase-admin", "users", "list", "--format", "csv"])
            .unwrap();
        let Commands::Users {
            command: UsersCommands::List { format },
        } = cli.command
        else {
            panic!("expected users list");
        };
        assert_eq!(format, OutputFormat::Csv);
    }

    #[test]
    fn test_migrate_requires_path() {
        assert!(Cli::try_parse_from(["supabase-admin", "migrate"]).is_err());

        let cli = Cli::try_parse_from([
            "supabase-admin",
            "migrate",
            "001_init.sql",
            "--verify",
            "users",
            "--verify",
            "profiles",
        ])
        .unwrap();
        let Commands::Migrate(args) = cli.command else {
            panic!("expected migrate");
        };
        assert_eq!(args.path, PathBuf::from("001_init.sql"));
        assert_eq!(args.verify, vec!["users", "profiles"]);
    }

    #[test]
    fn test_sql_statement_and_file_conflict() {
        let result = Cli::try_parse_from([
            "supabase-admin",
            "sql",
            "select 1",
            "--file",
            "query.sql",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "supabase-admin",
            "tables",
            "check",
            "users",
            "--no-color",
            "--env-file",
            "staging.env",
        ])
        .unwrap();
        assert!(cli.no_color);
        assert_eq!(cli.env_file, Some(PathBuf::from("staging.env")));
    }
}
