use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use carefinder_cli::logging::{init_logging, LoggingConfig};
use carefinder_cli::output::OutputFormat;

mod commands;

#[derive(Parser, Debug)]
#[command(author, version, about = "Find nearby emergency and healthcare services")]
struct Cli {
    /// Configuration file (JSON). Overrides CAREFINDER_CONFIG.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every service in the catalog.
    Catalog(commands::catalog::CatalogArgs),
    /// Find services near a location, nearest first.
    Nearby(commands::nearby::NearbyArgs),
    /// Compute a driving route to a service.
    Route(commands::route::RouteArgs),
    /// Listen for push notifications until the channel gives up or Ctrl-C.
    Notifications(commands::notifications::NotificationsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&LoggingConfig::from_env());
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Catalog(args) => commands::catalog::handle_catalog(&args, &config, cli.format).await,
        Command::Nearby(args) => commands::nearby::handle_nearby(&args, &config, cli.format).await,
        Command::Route(args) => commands::route::handle_route(&args, &config, cli.format).await,
        Command::Notifications(args) => {
            commands::notifications::handle_notifications(&args, &config, cli.format).await
        }
    }
}
