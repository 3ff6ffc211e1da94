//! `catalog` subcommand: list the services the configured source provides.

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;

use carefinder_cli::output::{format_catalog_text, OutputFormat};
use carefinder_cli::terminal::ColorPalette;
use carefinder_lib::{CarefinderConfig, ServiceCatalog, ServiceCategory, ServiceRecord};

#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    /// Only list services of this category (repeatable).
    #[arg(long = "category", value_name = "CATEGORY")]
    pub categories: Vec<ServiceCategory>,
}

pub async fn handle_catalog(
    args: &CatalogArgs,
    config: &CarefinderConfig,
    format: OutputFormat,
) -> Result<()> {
    let provider = super::catalog_provider(config)?;
    let catalog = ServiceCatalog::refresh(&provider, &CancellationToken::new())
        .await
        .context("could not load the service catalog")?;

    let records: Vec<&ServiceRecord> = catalog
        .list()
        .iter()
        .filter(|record| args.categories.is_empty() || args.categories.contains(&record.category))
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Text => print!("{}", format_catalog_text(&records, &ColorPalette::detect())),
    }
    Ok(())
}
