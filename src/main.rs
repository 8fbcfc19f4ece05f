// cfstats: Cloudflare Pages and Workers request tracker
use cfstats::cli::{Cli, Commands};
use cfstats::commands::{
    handle_config_action, handle_history_action, handle_run_command, print_error,
};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.as_deref().map(Path::new);

    let result = match cli.command {
        Some(Commands::Run { dry_run }) => handle_run_command(config_path, dry_run, cli.json).await,
        Some(Commands::History { action }) => handle_history_action(action, config_path, cli.json),
        Some(Commands::Config { action }) => handle_config_action(action, config_path, cli.json),
        // Default behavior: a regular scheduled run
        None => handle_run_command(config_path, false, cli.json).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(cli.json, &e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; RUST_LOG overrides the default level
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}
