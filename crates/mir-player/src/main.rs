mod core;
mod host;
mod http;
mod mpv;
mod stream;
mod tap;
mod view;

use std::sync::Arc;

use mir_proto::config::Config;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::core::{PlayerCore, PlayerEvent};
use crate::host::HeadlessHost;
use crate::stream::StreamHandle;
use crate::view::ViewManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // File logging; stdout stays clean for whoever launched us.
    let data_dir = mir_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("player.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,mir_player=debug")),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    // Event channel — all external inputs funnel into PlayerCore
    let (event_tx, event_rx) = mpsc::channel::<PlayerEvent>(256);

    // Stream client owns mpv; PlayerCore only talks to it through the handle
    let (stream, stream_rx) = StreamHandle::channel();
    let client = tokio::spawn(mpv::run_client(stream_rx, event_tx.clone()));

    let view = Arc::new(ViewManager::new(
        &config.station.name,
        &config.station.live_label,
        config.player.default_volume,
    ));

    if config.http.enabled {
        let _http_handle = http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            view.clone(),
            event_tx.clone(),
        );
    }

    let ctrl_c_tx = event_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = ctrl_c_tx.send(PlayerEvent::Shutdown).await;
        }
    });

    let player = PlayerCore::new(
        config,
        view,
        Box::new(HeadlessHost),
        stream,
        event_tx,
    );

    info!("Player initialised, running event loop");
    player.run(event_rx).await;

    // The core asked the client to shut down; give it a moment to stop mpv.
    if tokio::time::timeout(std::time::Duration::from_secs(3), client)
        .await
        .is_err()
    {
        warn!("mpv client did not stop in time");
    }

    Ok(())
}
