//! `nearby` subcommand: resolve services around a location.

use anyhow::{bail, Result};
use clap::Args;

use carefinder_cli::output::{format_nearby_text, format_no_results, OutputFormat};
use carefinder_cli::terminal::ColorPalette;
use carefinder_lib::{CarefinderConfig, NearbySession, NearbyView, ResolveOptions, ServiceCategory};

#[derive(Args, Debug, Clone)]
pub struct NearbyArgs {
    /// Latitude of the origin in decimal degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,
    /// Longitude of the origin in decimal degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,
    /// Search radius in kilometres. Defaults to the configured radius.
    #[arg(long)]
    pub radius: Option<f64>,
    /// Only include services of this category (repeatable).
    #[arg(long = "category", value_name = "CATEGORY")]
    pub categories: Vec<ServiceCategory>,
    /// Maximum number of services to show.
    #[arg(long)]
    pub limit: Option<usize>,
}

impl NearbyArgs {
    fn options(&self, config: &CarefinderConfig) -> ResolveOptions {
        let mut opts = ResolveOptions::within(self.radius.unwrap_or(config.search.radius_km));
        if !self.categories.is_empty() {
            opts = opts.with_categories(self.categories.iter().copied());
        }
        if let Some(limit) = self.limit {
            opts = opts.with_limit(limit);
        }
        opts
    }
}

pub async fn handle_nearby(
    args: &NearbyArgs,
    config: &CarefinderConfig,
    format: OutputFormat,
) -> Result<()> {
    let origin = super::origin(args.lat, args.lon)?;
    let opts = args.options(config);
    let session = NearbySession::new(super::catalog_provider(config)?, super::route_provider(config)?);

    let view = session.search(origin, &opts).await;
    match &view {
        NearbyView::FetchFailed { reason } => {
            bail!("could not check for nearby services: {reason}")
        }
        NearbyView::Superseded => bail!("search was cancelled"),
        NearbyView::Found { .. } | NearbyView::NoResults { .. } => {}
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Text => match &view {
            NearbyView::Found { services } => {
                print!("{}", format_nearby_text(services, &ColorPalette::detect()))
            }
            NearbyView::NoResults { radius_km } => println!("{}", format_no_results(*radius_km)),
            NearbyView::FetchFailed { .. } | NearbyView::Superseded => {}
        },
    }
    Ok(())
}
