use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::fallback::{self, FallbackTrack};
use super::platform;
use super::session::DEFAULT_HISTORY_CAPACITY;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub station: StationConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub tap: TapConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// HLS playlist of the live stream.
    #[serde(default = "default_stream_url")]
    pub url: String,
}

/// Labels shown when the stream has not told us the title or artist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    #[serde(default = "default_station_name")]
    pub name: String,
    #[serde(default = "default_live_label")]
    pub live_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Initial volume, percent.
    #[serde(default = "default_volume")]
    pub default_volume: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_fallback_interval")]
    pub interval_secs: u64,
    #[serde(default = "fallback::default_pool")]
    pub tracks: Vec<FallbackTrack>,
}

/// HLS metadata tap.  Disable it for streams that carry no timed ID3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Playlist poll period when the playlist gives no target duration.
    #[serde(default = "default_tap_poll")]
    pub poll_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Station website scraper (`mir-monitor`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_monitor_url")]
    pub url: String,
    #[serde(default = "default_monitor_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_track_file")]
    pub track_file: PathBuf,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: default_stream_url(),
        }
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            name: default_station_name(),
            live_label: default_live_label(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_fallback_interval(),
            tracks: fallback::default_pool(),
        }
    }
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_secs: default_tap_poll(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            url: default_monitor_url(),
            interval_secs: default_monitor_interval(),
            track_file: default_track_file(),
        }
    }
}

fn default_stream_url() -> String {
    "https://media1.datacenter.by-1936/radiomir/radiomir/playlist.m3u8".to_string()
}

fn default_station_name() -> String {
    "Radio MIR".to_string()
}

fn default_live_label() -> String {
    "Live broadcast".to_string()
}

fn default_volume() -> u8 {
    60
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_fallback_interval() -> u64 {
    fallback::DEFAULT_INTERVAL_SECS
}

fn default_tap_poll() -> u64 {
    6
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8995
}

fn default_monitor_url() -> String {
    "https://radiomir.by/live".to_string()
}

fn default_monitor_interval() -> u64 {
    30
}

fn default_track_file() -> PathBuf {
    platform::data_dir().join("current_track.txt")
}

impl Config {
    /// Load from the default location, writing defaults there on first run.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
