//! `route` subcommand: driving directions to one service.

use anyhow::{bail, Context, Result};
use clap::Args;

use carefinder_cli::output::{format_route_text, format_route_unavailable, OutputFormat};
use carefinder_cli::terminal::ColorPalette;
use carefinder_lib::{CarefinderConfig, NearbySession, RouteView};

#[derive(Args, Debug, Clone)]
pub struct RouteArgs {
    /// Latitude of the origin in decimal degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,
    /// Longitude of the origin in decimal degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,
    /// Destination service id or name.
    #[arg(long = "to", value_name = "SERVICE")]
    pub to: String,
}

/// A failed route lookup still succeeds as a command: the reason and an
/// external maps link are printed instead.
pub async fn handle_route(
    args: &RouteArgs,
    config: &CarefinderConfig,
    format: OutputFormat,
) -> Result<()> {
    let origin = super::origin(args.lat, args.lon)?;
    let session = NearbySession::new(super::catalog_provider(config)?, super::route_provider(config)?);
    session
        .refresh()
        .await
        .context("could not load the service catalog")?;

    let view = session.route_to(origin, &args.to).await?;
    if view == RouteView::Superseded {
        bail!("route request was cancelled");
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Text => {
            let palette = ColorPalette::detect();
            match &view {
                RouteView::Ready { service, route } => {
                    print!("{}", format_route_text(service, route, &palette))
                }
                RouteView::Unavailable {
                    service,
                    reason,
                    fallback_link,
                } => print!(
                    "{}",
                    format_route_unavailable(service, reason, fallback_link, &palette)
                ),
                RouteView::Superseded => {}
            }
        }
    }
    Ok(())
}
