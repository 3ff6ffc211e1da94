//! Output formatting for command results.
//!
//! Text formatters return strings so they can be tested without capturing
//! stdout; JSON output is produced by the command handlers with `serde_json`.

use std::fmt::Write as _;

use clap::ValueEnum;

use carefinder_lib::{NotificationEvent, ResolvedService, RouteResult, ServiceRecord};

use crate::terminal::ColorPalette;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON on stdout.
    Json,
}

/// Informational message for a search that matched nothing.
pub fn format_no_results(radius_km: f64) -> String {
    if radius_km.is_finite() {
        format!("No services found within {} km", trim_km(radius_km))
    } else {
        "No services found".to_string()
    }
}

/// Numbered list of resolved services, nearest first.
pub fn format_nearby_text(services: &[ResolvedService], palette: &ColorPalette) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Found {} service{} nearby:",
        services.len(),
        if services.len() == 1 { "" } else { "s" }
    );
    for (index, resolved) in services.iter().enumerate() {
        let record = &resolved.service;
        let _ = writeln!(
            out,
            "{:>2}. {}{}{}  [{}]  {}{:.1} km{}{}",
            index + 1,
            palette.white_bold,
            record.name,
            palette.reset,
            record.category,
            palette.cyan,
            resolved.display_distance_km(),
            palette.reset,
            availability_note(record, palette),
        );
        write_detail_line(&mut out, record, palette);
    }
    out
}

/// Catalog listing in catalog order.
pub fn format_catalog_text(records: &[&ServiceRecord], palette: &ColorPalette) -> String {
    if records.is_empty() {
        return "No services in catalog.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "Services ({}):", records.len());
    for record in records {
        let _ = writeln!(
            out,
            "  {:<24} {}{}{}  [{}]{}",
            record.id,
            palette.white_bold,
            record.name,
            palette.reset,
            record.category,
            availability_note(record, palette),
        );
    }
    out
}

pub fn format_route_text(
    service: &ServiceRecord,
    route: &RouteResult,
    palette: &ColorPalette,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Route to {}{}{}: {}{:.1} km, about {} min{}",
        palette.white_bold,
        service.name,
        palette.reset,
        palette.cyan,
        route.distance_km,
        route.duration_minutes.ceil() as u64,
        palette.reset,
    );
    for (index, step) in route.steps.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}. {} {}({:.1} km){}",
            index + 1,
            step.instruction,
            palette.gray,
            step.distance_km,
            palette.reset,
        );
    }
    out
}

/// Route failure with the external maps fallback.
pub fn format_route_unavailable(
    service: &ServiceRecord,
    reason: &str,
    fallback_link: &str,
    palette: &ColorPalette,
) -> String {
    format!(
        "{red}Route unavailable{reset} to {name}: {reason}\nOpen in maps: {link}\n",
        red = palette.red,
        reset = palette.reset,
        name = service.name,
        link = fallback_link,
    )
}

pub fn format_notification_text(event: &NotificationEvent, palette: &ColorPalette) -> String {
    format!(
        "{gray}[{time}]{reset} {orange}{kind}{reset} {title}: {message}",
        gray = palette.gray,
        orange = palette.orange,
        reset = palette.reset,
        time = event.timestamp.format("%Y-%m-%d %H:%M UTC"),
        kind = event.kind,
        title = event.title,
        message = event.message,
    )
}

fn availability_note(record: &ServiceRecord, palette: &ColorPalette) -> String {
    if !record.is_available() {
        format!("  {}unavailable{}", palette.red, palette.reset)
    } else if record.is_open_24_hours {
        format!("  {}24h{}", palette.green, palette.reset)
    } else {
        String::new()
    }
}

fn write_detail_line(out: &mut String, record: &ServiceRecord, palette: &ColorPalette) {
    let mut details: Vec<String> = Vec::new();
    if !record.address.is_empty() {
        details.push(record.address.clone());
    }
    if !record.phone.is_empty() {
        details.push(record.phone.clone());
    }
    if let Some(rating) = record.rating {
        details.push(format!("rated {rating:.1}"));
    }
    if !details.is_empty() {
        let _ = writeln!(
            out,
            "    {}{}{}",
            palette.gray,
            details.join(" | "),
            palette.reset
        );
    }
}

/// `10.0` prints as `10`, `2.5` as `2.5`.
fn trim_km(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}
