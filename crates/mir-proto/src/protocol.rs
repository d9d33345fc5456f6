use serde::{Deserialize, Serialize};

/// Current API version.  Bump this when the JSON view changes in a breaking
/// way; the web view checks it before rendering.
pub const API_VERSION: u32 = 1;

/// User-initiated actions arriving from the web view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    TogglePlay,
    SetVolume { percent: u8 },
    SkipBack,
    SkipForward,
    ToggleHistory,
    Close,
    GetState,
}

/// Fatal errors reported by the streaming collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamFault {
    Network,
    Media,
    Other,
}

impl StreamFault {
    /// Status line shown for this fault.
    pub fn status(&self) -> &'static str {
        match self {
            StreamFault::Network => status::NETWORK_ERROR,
            StreamFault::Media => status::MEDIA_ERROR,
            StreamFault::Other => status::CONNECT_ERROR,
        }
    }
}

/// Status line texts.
pub mod status {
    pub const CONNECTING: &str = "Connecting…";
    pub const STREAM_CONNECTED: &str = "Stream connected";
    pub const STREAM_ONLINE: &str = "Stream online";
    pub const LISTENING: &str = "Listening live…";
    pub const PAUSED: &str = "Paused";
    pub const BUFFERING: &str = "Buffering…";
    pub const PLAYBACK_ERROR: &str = "Playback error";
    pub const NETWORK_ERROR: &str = "Network error. Reconnecting…";
    pub const MEDIA_ERROR: &str = "Media error. Recovering…";
    pub const CONNECT_ERROR: &str = "Cannot connect to the stream";

    pub fn on_air(title: &str) -> String {
        format!("On air: {}", title)
    }
}

/// One row of the recently-played list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Monotonic per-session sequence number.
    pub id: u64,
    pub title: String,
    pub artist: String,
    /// Local wall-clock time, `HH:MM`.
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Popup {
    pub title: String,
    pub message: String,
}

/// Everything the web view renders.  `rev` increments on every change so the
/// view can skip redundant repaints.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlayerView {
    #[serde(default)]
    pub rev: u64,
    pub status: String,
    pub title: String,
    pub artist: String,
    /// True while the title/artist fields are mid-transition.
    #[serde(default)]
    pub changing: bool,
    pub volume_percent: u8,
    /// Readout text, e.g. `"60%"`.
    pub volume_label: String,
    /// Progress bar fill, 0.0..=1.0.
    pub progress: f32,
    pub is_playing: bool,
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub history_expanded: bool,
    #[serde(default)]
    pub popup: Option<Popup>,
    #[serde(default)]
    pub closed: bool,
}
