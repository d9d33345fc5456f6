//! ViewManager — the UI surface the web view polls.
//!
//! Only `PlayerCore` writes here; the HTTP API reads snapshots.  Every setter
//! bumps `rev`, even when the value did not change, so a client polling with
//! its last `rev` learns that something was pushed.

use std::sync::Arc;

use mir_proto::protocol::{HistoryEntry, PlayerView, Popup};
use tokio::sync::RwLock;

pub struct ViewManager {
    view: Arc<RwLock<PlayerView>>,
}

impl ViewManager {
    /// Initial view: the station labels in the track fields and the given
    /// volume readout.
    pub fn new(station_name: &str, live_label: &str, volume_percent: u8) -> Self {
        let view = PlayerView {
            rev: 1,
            status: String::new(),
            title: station_name.to_string(),
            artist: live_label.to_string(),
            changing: false,
            volume_percent,
            volume_label: volume_label(volume_percent),
            progress: 0.0,
            is_playing: false,
            history: Vec::new(),
            history_expanded: false,
            popup: None,
            closed: false,
        };
        Self {
            view: Arc::new(RwLock::new(view)),
        }
    }

    pub async fn snapshot(&self) -> PlayerView {
        self.view.read().await.clone()
    }

    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.view.read().await.history.clone()
    }

    pub async fn set_status(&self, status: &str) {
        let mut view = self.view.write().await;
        view.status = status.to_string();
        view.rev += 1;
    }

    pub async fn set_playing(&self, is_playing: bool) {
        let mut view = self.view.write().await;
        view.is_playing = is_playing;
        view.rev += 1;
    }

    /// First half of a track change: status and history move immediately,
    /// the track fields are flagged as changing but keep their old text.
    pub async fn begin_track_change(&self, status: &str, history: Option<Vec<HistoryEntry>>) {
        let mut view = self.view.write().await;
        view.changing = true;
        view.status = status.to_string();
        if let Some(history) = history {
            view.history = history;
        }
        view.rev += 1;
    }

    pub async fn set_track(&self, title: &str, artist: &str) {
        let mut view = self.view.write().await;
        view.title = title.to_string();
        view.artist = artist.to_string();
        view.rev += 1;
    }

    pub async fn end_track_change(&self) {
        let mut view = self.view.write().await;
        view.changing = false;
        view.rev += 1;
    }

    pub async fn set_volume(&self, percent: u8) {
        let mut view = self.view.write().await;
        view.volume_percent = percent;
        view.volume_label = volume_label(percent);
        view.rev += 1;
    }

    /// `fill` is clamped to 0.0..=1.0.
    pub async fn set_progress(&self, fill: f32) {
        let mut view = self.view.write().await;
        view.progress = fill.clamp(0.0, 1.0);
        view.rev += 1;
    }

    pub async fn toggle_history(&self) -> bool {
        let mut view = self.view.write().await;
        view.history_expanded = !view.history_expanded;
        view.rev += 1;
        view.history_expanded
    }

    pub async fn show_popup(&self, title: &str, message: &str) {
        let mut view = self.view.write().await;
        view.popup = Some(Popup {
            title: title.to_string(),
            message: message.to_string(),
        });
        view.rev += 1;
    }

    pub async fn set_closed(&self) {
        let mut view = self.view.write().await;
        view.closed = true;
        view.is_playing = false;
        view.rev += 1;
    }
}

fn volume_label(percent: u8) -> String {
    format!("{}%", percent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_view() {
        let vm = ViewManager::new("Radio MIR", "Live broadcast", 60);
        let view = vm.snapshot().await;
        assert_eq!(view.title, "Radio MIR");
        assert_eq!(view.artist, "Live broadcast");
        assert_eq!(view.volume_label, "60%");
        assert_eq!(view.rev, 1);
    }

    #[tokio::test]
    async fn test_setters_bump_rev() {
        let vm = ViewManager::new("Radio MIR", "Live broadcast", 60);
        vm.set_status("Paused").await;
        vm.set_volume(35).await;
        let view = vm.snapshot().await;
        assert_eq!(view.rev, 3);
        assert_eq!(view.status, "Paused");
        assert_eq!(view.volume_label, "35%");
    }

    #[tokio::test]
    async fn test_track_change_phases() {
        let vm = ViewManager::new("Radio MIR", "Live broadcast", 60);
        vm.begin_track_change("On air: Song", None).await;
        let mid = vm.snapshot().await;
        assert!(mid.changing);
        assert_eq!(mid.title, "Radio MIR");

        vm.set_track("Song", "Band").await;
        vm.end_track_change().await;
        let done = vm.snapshot().await;
        assert!(!done.changing);
        assert_eq!(done.title, "Song");
        assert_eq!(done.artist, "Band");
    }

    #[tokio::test]
    async fn test_progress_is_clamped() {
        let vm = ViewManager::new("Radio MIR", "Live broadcast", 60);
        vm.set_progress(1.7).await;
        assert_eq!(vm.snapshot().await.progress, 1.0);
        vm.set_progress(-0.2).await;
        assert_eq!(vm.snapshot().await.progress, 0.0);
    }

    #[tokio::test]
    async fn test_toggle_history() {
        let vm = ViewManager::new("Radio MIR", "Live broadcast", 60);
        assert!(vm.toggle_history().await);
        assert!(!vm.toggle_history().await);
    }
}
