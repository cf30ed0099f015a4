//! ReviewCourier watcher binary entrypoint.

use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use courier_common::config::AppConfig;
use courier_common::types::Destination;
use courier_notifier::alerts::AlertPublisher;
use courier_notifier::sink::TelegramSink;
use courier_watcher::client::ReviewApiClient;
use courier_watcher::poller::{Outcome, ReviewWatcher};

/// How long queued alerts may take to flush on exit.
const ALERT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends a Telegram message whenever a submitted lesson has been reviewed.
#[derive(Parser, Debug)]
#[command(name = "courier-watcher")]
#[command(version, long_about = None)]
struct Cli {
    /// Telegram chat id to notify
    #[arg(env = "TG_CHAT_ID")]
    chat_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier_watcher=info,courier_notifier=info".into()),
        )
        .json()
        .init();

    // .env must be loaded before clap reads TG_CHAT_ID
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let destination = Destination::new(cli.chat_id);

    tracing::info!(chat_id = %destination, "ReviewCourier watcher starting...");

    let sink = TelegramSink::new(&config.telegram_api_url, &config.telegram_bot_token)?;
    let bot = sink
        .verify()
        .await
        .map_err(|e| anyhow::anyhow!("Telegram bot token check failed: {e}"))?;
    tracing::info!(bot = %bot, "Connected to Telegram");

    let client = ReviewApiClient::new(
        &config.review_api_url,
        &config.devman_token,
        config.poll_timeout(),
    )?;

    let mut watcher = ReviewWatcher::new(client, sink.clone(), destination.clone());

    let forwarder = if config.forward_alerts {
        let (publisher, forwarder) = AlertPublisher::channel(sink, destination);
        watcher = watcher.with_alerts(publisher);
        Some(tokio::spawn(forwarder.run()))
    } else {
        None
    };

    let outcome = watcher.run_until(shutdown_signal()).await;
    let stats = watcher.stats();
    tracing::info!(
        polls = stats.polls,
        notifications_sent = stats.notifications_sent,
        delivery_failures = stats.delivery_failures,
        retries = stats.retries,
        "Watcher finished"
    );

    // Dropping the watcher closes the alert channel so the forwarder can drain.
    drop(watcher);
    if let Some(handle) = forwarder
        && tokio::time::timeout(ALERT_FLUSH_TIMEOUT, handle).await.is_err()
    {
        tracing::warn!("Timed out flushing alerts");
    }

    match outcome {
        Outcome::Stopped => {
            tracing::info!("ReviewCourier watcher stopped.");
            Ok(())
        }
        Outcome::Unauthorized => {
            anyhow::bail!("review API rejected DEVMAN_TOKEN; rotate the token and restart")
        }
    }
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
