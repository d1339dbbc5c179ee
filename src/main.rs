//! listing-relay binary: wires configuration, the delivery loop and the
//! command poller together, then waits for a shutdown signal.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use listing_relay::commands;
use listing_relay::liveness::{HttpProbe, LinkProbe};
use listing_relay::seen::SeenStore;
use listing_relay::target::TargetRegistry;
use listing_relay::telegram::TelegramClient;
use listing_relay::{Config, DeliveryLoop, Relay, RssFeed};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("listing_relay=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

/// Resolve on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; real deployments set the environment.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::from_env().context("invalid configuration")?;
    tracing::info!(?config, "starting");

    let client = config.http_client().context("failed to build HTTP client")?;
    let telegram = Arc::new(TelegramClient::new(client.clone(), config.bot_token.clone()));

    let relay = Arc::new(Relay::new(
        SeenStore::load(&config.seen_file),
        TargetRegistry::load(&config.target_file),
        telegram.clone(),
        config.interval,
    ));
    if relay.target().is_none() {
        tracing::info!("no target yet; send /settarget to the bot from the destination chat");
    }

    let source = Arc::new(RssFeed::new(client.clone(), config.rss_url.clone()));
    let probe = config
        .check_links
        .then(|| Arc::new(HttpProbe::new(client.clone())) as Arc<dyn LinkProbe>);

    let delivery = DeliveryLoop::new(relay.clone(), source, probe)
        .with_send_delay(config.send_delay)
        .spawn(config.interval);
    let poller = commands::spawn(telegram, relay);

    shutdown_signal().await;
    tracing::info!("shutdown requested");

    poller.shutdown().await;
    delivery.shutdown().await;

    tracing::info!("stopped");
    Ok(())
}
