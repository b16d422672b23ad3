use std::sync::Arc;
use std::time::Duration;

use flood_watch::config::AppConfig;
use flood_watch::processor::hazard_processor::{self, WatchContext};
use flood_watch::realtime::{ChannelEvent, EventKind, RealtimeChannel, WsConnector};
use flood_watch::source::{HazardQuery, HttpHazardSource};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting Flood Watch...");

    let source = Arc::new(HttpHazardSource::new(
        config.hazard_api_url.clone(),
        Duration::from_secs(config.http_timeout_secs),
    )?);
    match source.health().await {
        Ok(true) => info!("Hazard API reachable at {}", config.hazard_api_url),
        Ok(false) => warn!("Hazard API at {} reports unhealthy", config.hazard_api_url),
        Err(e) => warn!("Hazard API health check failed: {}", e),
    }

    let ctx = Arc::new(WatchContext {
        route: config.watch_route.clone(),
        radius_m: config.proximity_radius_m,
        filters: config.filters.clone(),
    });
    let query = match config.watch_route.bounding_box(config.proximity_radius_m) {
        Some(bounds) => HazardQuery::Bounds(bounds),
        None => anyhow::bail!("watched route has no vertices"),
    };

    let channel = RealtimeChannel::new(Arc::new(WsConnector), config.channel_options());
    info!(
        "Watching {} vertex route from {} within {} m; up to {} reconnect attempts",
        ctx.route.path.len(),
        ctx.route.path[0],
        ctx.radius_m,
        channel.options().max_reconnect_attempts
    );

    for kind in [EventKind::FloodUpdate, EventKind::FloodAlert, EventKind::FallbackData] {
        let ctx = Arc::clone(&ctx);
        channel.on(kind, move |event| {
            hazard_processor::process_event(&ctx, event);
        });
    }
    channel.on(EventKind::Connected, |_| info!("Live hazard updates connected"));
    channel.on(EventKind::Reconnecting, |event| {
        if let ChannelEvent::Reconnecting { attempt, delay } = event {
            warn!("Connection lost, retry {} in {:?}", attempt, delay);
        }
    });
    channel.on(EventKind::ServerError, |event| {
        if let ChannelEvent::Message(msg) = event {
            warn!("Server reported: {:?}", msg);
        }
    });

    // The listener must not hold the channel, so it signals the loop instead.
    let (failed_tx, mut failed_rx) = mpsc::unbounded_channel();
    channel.on(EventKind::ReconnectFailed, move |_| {
        let _ = failed_tx.send(());
    });

    channel.subscribe(&config.flood_room, config.filters.clone())?;

    if let Err(e) = channel.connect(&config.realtime_url).await {
        error!("Realtime channel unavailable ({}), polling {}", e, config.hazard_api_url);
        channel.enable_fallback_mode(source.clone(), query);
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
            Some(()) = failed_rx.recv() => {
                error!("Reconnection gave up, polling {}", config.hazard_api_url);
                channel.enable_fallback_mode(source.clone(), query);
            }
        }
    }

    let stats = channel.stats();
    info!("Channel stats at shutdown: {:?}", stats);
    channel.disconnect();

    Ok(())
}
