use std::io;

use clap::Parser;
use intention_logging::level_from_name;
use intention_server::cli::{Cli, Command};
use intention_server::config::AppConfig;
use intention_server::logging::{self, LogDestination};
use intention_server::{analyze, server, workbench};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;

    // Commands that print results keep the terminal free of log lines.
    let destination = match cli.command {
        Command::Serve { .. } => config.log.destination,
        _ => LogDestination::File,
    };
    logging::initialize(destination, level_from_name(&config.log.level));

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            server::serve(&config).await
        }
        Command::Analyze {
            repo,
            branch,
            session,
        } => analyze::run(&config, &repo, branch.as_deref(), &session).await,
        Command::Workbench { session, action } => {
            workbench::run(&session, action, &mut io::stdout().lock())
        }
    }
}
