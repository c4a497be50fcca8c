use anyhow::Result;
use clap::Parser;
use cognspective::{
    app,
    cli::{handle_history_command, handle_show_command, Cli, CliCommand},
    config::Config,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(CliCommand::Version) => {
            println!("Cognspective {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(CliCommand::History(args)) => handle_history_command(&Config::load()?, args),
        Some(CliCommand::Show(args)) => handle_show_command(&Config::load()?, args),
        Some(CliCommand::Serve) | None => app::run_service(Config::load()?).await,
    }
}
