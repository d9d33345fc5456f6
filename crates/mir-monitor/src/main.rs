//! Watches the station's live page and mirrors the current track into a file.

use std::path::Path;
use std::time::Duration;

use mir_proto::config::Config;
use mir_proto::scrape::{self, TrackChange};
use reqwest::Client;
use tracing::{debug, error, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const ERROR_BACKOFF: Duration = Duration::from_secs(60);

async fn fetch_track(client: &Client, url: &str) -> Option<String> {
    let page = async {
        client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    };
    match page.await {
        Ok(html) => scrape::extract_track(&html),
        Err(e) => {
            warn!("monitor: fetching {} failed: {}", url, e);
            None
        }
    }
}

async fn write_track(path: &Path, track: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, track).await?;
    Ok(())
}

/// Write `track` if it changed.  It is only remembered once written, so a
/// failed write is retried on the next check.
async fn publish(change: &mut TrackChange, path: &Path, track: Option<String>) -> anyhow::Result<()> {
    match change.observe(track) {
        Some(track) => {
            info!("monitor: now playing {:?}", track);
            write_track(path, &track).await?;
            change.commit(track);
        }
        None => debug!("monitor: no change"),
    }
    Ok(())
}

async fn check_once(
    client: &Client,
    config: &Config,
    change: &mut TrackChange,
) -> anyhow::Result<()> {
    let track = fetch_track(client, &config.monitor.url).await;
    publish(change, &config.monitor.track_file, track).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    let interval = Duration::from_secs(config.monitor.interval_secs.max(1));
    let mut change = TrackChange::default();

    info!(
        "monitor: watching {} every {:?}, writing {:?}",
        config.monitor.url, interval, config.monitor.track_file
    );

    loop {
        let pause = match check_once(&client, &config, &mut change).await {
            Ok(()) => interval,
            Err(e) => {
                error!("monitor: {}", e);
                ERROR_BACKOFF
            }
        };
        tokio::time::sleep(pause).await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,mir_monitor=debug")),
        )
        .init();

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    tokio::select! {
        res = run(config) => res?,
        _ = tokio::signal::ctrl_c() => info!("monitor: stopped"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_write_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let unwritable = blocker.join("current_track.txt");
        let good = dir.path().join("current_track.txt");

        let mut change = TrackChange::default();
        let track = Some("Band - Song".to_string());
        assert!(publish(&mut change, &unwritable, track.clone()).await.is_err());

        publish(&mut change, &good, track.clone()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&good).unwrap(), "Band - Song");

        // unchanged track is not written again
        std::fs::remove_file(&good).unwrap();
        publish(&mut change, &good, track).await.unwrap();
        assert!(!good.exists());
    }
}
