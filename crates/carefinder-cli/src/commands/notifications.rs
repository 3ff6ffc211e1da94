//! `notifications` subcommand: print push notifications as they arrive.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use clap::Args;
use tracing::info;

use carefinder_cli::output::{format_notification_text, OutputFormat};
use carefinder_cli::terminal::ColorPalette;
use carefinder_lib::{
    CarefinderConfig, ChannelState, NotificationChannel, NotificationInbox, WebSocketConnector,
};

#[derive(Args, Debug, Clone)]
pub struct NotificationsArgs {
    /// WebSocket endpoint. Defaults to the configured notification URL.
    #[arg(long)]
    pub url: Option<String>,
}

pub async fn handle_notifications(
    args: &NotificationsArgs,
    config: &CarefinderConfig,
    format: OutputFormat,
) -> Result<()> {
    let url = args
        .url
        .clone()
        .or_else(|| config.notifications.url.clone())
        .ok_or_else(|| {
            anyhow!("no notification endpoint configured; pass --url or set CAREFINDER_NOTIFICATIONS_URL")
        })?;

    let channel = NotificationChannel::with_policy(
        WebSocketConnector::new(url.clone()),
        config.notifications.reconnect_policy(),
    );

    let inbox = Arc::new(Mutex::new(NotificationInbox::new()));
    let palette = ColorPalette::detect();
    let seen = Arc::clone(&inbox);
    channel.subscribe(move |event| {
        let mut inbox = seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let known = inbox.events().iter().any(|e| e.id == event.id);
        inbox.record(event.clone());
        if known {
            return;
        }
        match format {
            OutputFormat::Json => match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(err) => tracing::warn!(error = %err, "could not encode notification"),
            },
            OutputFormat::Text => println!("{}", format_notification_text(event, &palette)),
        }
    });

    let mut states = channel.watch_state();
    channel.start();
    info!(url = %url, "listening for notifications");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            channel.shutdown().await;
        }
        result = states.wait_for(|state| *state == ChannelState::Exhausted) => {
            result.context("notification channel ended unexpectedly")?;
        }
    }

    let received = inbox
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .len();
    info!(received, "notification listener finished");
    channel
        .ensure_live()
        .with_context(|| format!("notifications from {url} are unavailable"))
}
