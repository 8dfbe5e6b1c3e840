//! Purge command handler

use anyhow::{Context, Result};
use colored::*;
use dialoguer::Confirm;
use is_terminal::IsTerminal;

use super::{PurgeArgs, PurgeStrategy, PurgeTarget};
use crate::api::{AuthUserCollection, ConcurrencyConfig, RecordStore, TableCollection};
use crate::cli::commands::admin_client;
use crate::config::Config;
use crate::services::exclusion::{
    BatchOutcome, BulkExclusion, DeleteOutcome, ExclusionReport, ProtectedSet, Strategy,
};

/// Delete every record of the target collection except the protected ones
pub async fn handle_purge_command(args: PurgeArgs, config: &Config) -> Result<()> {
    let Some(report) = run_purge(args, config).await? else {
        return Ok(());
    };
    print!("{}", format_report(&report));

    if let BatchOutcome::PartialFailure { failed } = report.outcome() {
        anyhow::bail!("{} of {} deletions failed", failed, report.targeted);
    }
    Ok(())
}

/// Purge and return the report, or `None` when nothing was attempted
async fn run_purge(args: PurgeArgs, config: &Config) -> Result<Option<ExclusionReport>> {
    validate(&args)?;

    let protected = ProtectedSet::new(&args.keep);
    let concurrency = match args.concurrency {
        Some(n) => ConcurrencyConfig::bounded(usize::from(n)),
        None => config.resilience.concurrency.clone(),
    };
    let client = admin_client(config)?;

    match args.target {
        PurgeTarget::Table => {
            let store = TableCollection::new(&client, args.table.as_str())
                .with_id_column(args.id_column.as_str())
                .with_key_column(args.key_column.as_str());
            purge(&store, protected, concurrency, &args).await
        }
        PurgeTarget::Auth => {
            // Auth stores emails lowercased
            let store = AuthUserCollection::new(&client);
            purge(&store, protected.lowercased(), concurrency, &args).await
        }
    }
}

/// Reject flag combinations before any remote call
fn validate(args: &PurgeArgs) -> Result<()> {
    if args.keep.iter().all(|key| key.trim().is_empty()) {
        anyhow::bail!("At least one --keep email is required");
    }
    if args.target == PurgeTarget::Auth && args.strategy == PurgeStrategy::Bulk {
        anyhow::bail!(
            "The auth admin API has no filtered delete; use --strategy enumerate with --target auth"
        );
    }
    Ok(())
}

async fn purge<S: RecordStore>(
    store: &S,
    protected: ProtectedSet,
    concurrency: ConcurrencyConfig,
    args: &PurgeArgs,
) -> Result<Option<ExclusionReport>> {
    let strategy = Strategy::from(args.strategy);
    let operator = BulkExclusion::new(store, protected).with_concurrency(concurrency);

    println!(
        "Purging {} ({} strategy), keeping {}",
        store.name().bright_cyan().bold(),
        strategy,
        operator.protected().to_string().bright_green()
    );

    if args.dry_run {
        let plan = operator
            .plan(strategy)
            .await
            .context("Failed to build purge plan")?;
        println!("{}", "Dry run, nothing will be deleted:".yellow());
        for operation in &plan {
            println!("  {}", operation);
        }
        return Ok(None);
    }

    let report = match strategy {
        Strategy::Enumerate => {
            let targets = operator
                .targets()
                .await
                .context("Failed to fetch records to delete")?;
            if targets.is_empty() {
                println!("{}", "Nothing to delete".bright_green());
                return Ok(None);
            }
            println!("{} record(s) to delete", targets.len().to_string().bold());

            let prompt = format!("Delete {} record(s) from {}?", targets.len(), store.name());
            if !confirm(&prompt, args.yes)? {
                println!("Aborted");
                return Ok(None);
            }
            operator.delete_targets(targets).await
        }
        Strategy::Bulk => {
            let prompt = format!(
                "Delete every record in {} except {} protected key(s)?",
                store.name(),
                operator.protected().len()
            );
            if !confirm(&prompt, args.yes)? {
                println!("Aborted");
                return Ok(None);
            }
            operator.bulk_delete().await.context("Purge failed")?
        }
    };

    Ok(Some(report))
}

/// Ask before deleting. Without a terminal only `--yes` can confirm.
fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        anyhow::bail!("Refusing to delete without confirmation; pass --yes when not running interactively");
    }

    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

fn format_report(report: &ExclusionReport) -> String {
    let mut out = String::new();

    for outcome in &report.outcomes {
        match &outcome.outcome {
            DeleteOutcome::Deleted => {
                out.push_str(&format!("  {} {}\n", "✓".green(), outcome.record.label()));
            }
            DeleteOutcome::Failed(reason) => {
                out.push_str(&format!(
                    "  {} {} {}\n",
                    "✗".red(),
                    outcome.record.label(),
                    reason.dimmed()
                ));
            }
        }
    }

    if report.skipped_protected > 0 {
        out.push_str(&format!(
            "{} skipped {} protected record(s) returned by the service\n",
            "!".bright_yellow(),
            report.skipped_protected
        ));
    }

    let summary = match report.outcome() {
        BatchOutcome::AllDeleted => format!(
            "{} Deleted {} record(s)",
            "✓".bright_green().bold(),
            report.deleted()
        ),
        BatchOutcome::PartialFailure { failed } => format!(
            "{} Deleted {} record(s), {} failed",
            "!".bright_yellow().bold(),
            report.deleted(),
            failed.to_string().red()
        ),
        BatchOutcome::Empty => "Nothing to delete".bright_green().to_string(),
    };
    out.push_str(&summary);
    out.push('\n');
    out
}
