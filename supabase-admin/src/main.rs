use clap::Parser;
use colored::Colorize;

use supabase_admin::cli::{self, Cli};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    init_logging(cli.verbose);

    if let Err(err) = cli::run(cli).await {
        log::debug!("Command failed: {:?}", err);
        eprintln!("{} {:#}", "error:".bright_red().bold(), err);
        std::process::exit(1);
    }
}

/// Route `log` output through env_logger; `RUST_LOG` wins over `-v` flags
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(format!("warn,supabase_admin={}", level)),
    )
    .format_timestamp(None)
    .init();
}
