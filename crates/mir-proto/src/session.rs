//! Now-playing session state and display reconciliation.
//!
//! A [`Session`] owns the now-playing fields, the last display fingerprint
//! and the bounded history.  Candidates from the normalizer or the fallback
//! generator are applied here; each accepted one runs [`Session::reconcile`],
//! which yields a [`DisplayUpdate`] only when what the user would see actually
//! changes.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use tracing::debug;

use crate::fallback::FallbackTrack;
use crate::id3::Frame;
use crate::metadata::{self, Candidate};
use crate::protocol::{status, HistoryEntry};

pub const DEFAULT_HISTORY_CAPACITY: usize = 5;

/// History is pre-sized up to this many entries; larger capacities grow.
const PRESIZE_LIMIT: usize = 64;

/// Raw now-playing fields as last reported.  Either may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NowPlaying {
    pub title: Option<String>,
    pub artist: Option<String>,
}

/// Equality key for what is on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    title: String,
    artist: String,
}

/// A change to push to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayUpdate {
    pub title: String,
    pub artist: String,
    pub status: String,
    /// False when the track repeated the newest history entry.
    pub history_changed: bool,
}

/// Newest-first list of recently shown tracks.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
    next_id: u64,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(PRESIZE_LIMIT) + 1),
            capacity,
            next_id: 1,
        }
    }

    /// Prepend a track unless it repeats the newest entry.  Returns whether
    /// the list changed.
    pub fn push(&mut self, title: &str, artist: &str, at: DateTime<Local>) -> bool {
        if let Some(last) = self.entries.front() {
            if last.title == title && last.artist == artist {
                return false;
            }
        }

        self.entries.push_front(HistoryEntry {
            id: self.next_id,
            title: title.to_string(),
            artist: artist.to_string(),
            timestamp: at.format("%H:%M").to_string(),
        });
        self.next_id += 1;
        self.entries.truncate(self.capacity);
        true
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct Session {
    now: NowPlaying,
    fingerprint: Option<Fingerprint>,
    history: History,
    station_name: String,
    live_label: String,
}

impl Session {
    /// `station_name` and `live_label` stand in for a missing title and
    /// artist respectively.
    pub fn new(
        station_name: impl Into<String>,
        live_label: impl Into<String>,
        history_capacity: usize,
    ) -> Self {
        Self {
            now: NowPlaying::default(),
            fingerprint: None,
            history: History::new(history_capacity),
            station_name: station_name.into(),
            live_label: live_label.into(),
        }
    }

    pub fn now_playing(&self) -> &NowPlaying {
        &self.now
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Apply every frame of one decoded container, in order.
    pub fn apply_frames(&mut self, frames: &[Frame]) -> Vec<DisplayUpdate> {
        frames
            .iter()
            .filter_map(metadata::candidate)
            .filter_map(|c| self.apply(c))
            .collect()
    }

    /// Apply one candidate.  Title and artist candidates equal to the current
    /// value are dropped without reconciling.
    pub fn apply(&mut self, candidate: Candidate) -> Option<DisplayUpdate> {
        self.apply_at(candidate, Local::now())
    }

    pub fn apply_at(&mut self, candidate: Candidate, at: DateTime<Local>) -> Option<DisplayUpdate> {
        match candidate {
            Candidate::Title(title) => {
                if self.now.title.as_deref() == Some(title.as_str()) {
                    return None;
                }
                self.now.title = Some(title);
            }
            Candidate::Artist(artist) => {
                if self.now.artist.as_deref() == Some(artist.as_str()) {
                    return None;
                }
                self.now.artist = Some(artist);
            }
            Candidate::Track { artist, title } => {
                self.now.artist = Some(artist);
                self.now.title = Some(title);
            }
        }
        self.reconcile_at(at)
    }

    /// Fill both fields from a placeholder track, but only while the title is
    /// unknown.
    pub fn fill_fallback(&mut self, track: &FallbackTrack) -> Option<DisplayUpdate> {
        self.fill_fallback_at(track, Local::now())
    }

    pub fn fill_fallback_at(
        &mut self,
        track: &FallbackTrack,
        at: DateTime<Local>,
    ) -> Option<DisplayUpdate> {
        if self.now.title.is_some() {
            return None;
        }
        debug!("session: fallback track {:?}", track);
        self.apply_at(
            Candidate::Track {
                artist: track.artist.clone(),
                title: track.title.clone(),
            },
            at,
        )
    }

    pub fn reconcile(&mut self) -> Option<DisplayUpdate> {
        self.reconcile_at(Local::now())
    }

    /// Recompute the displayed pair and report it if it changed.
    pub fn reconcile_at(&mut self, at: DateTime<Local>) -> Option<DisplayUpdate> {
        if self.now.title.is_none() && self.now.artist.is_none() {
            return None;
        }

        let title = self
            .now
            .title
            .clone()
            .unwrap_or_else(|| self.station_name.clone());
        let artist = self
            .now
            .artist
            .clone()
            .unwrap_or_else(|| self.live_label.clone());

        let fingerprint = Fingerprint {
            title: title.clone(),
            artist: artist.clone(),
        };
        if self.fingerprint.as_ref() == Some(&fingerprint) {
            return None;
        }
        self.fingerprint = Some(fingerprint);

        let history_changed = self.history.push(&title, &artist, at);
        debug!(
            "session: now showing {:?} / {:?} (history changed: {})",
            title, artist, history_changed
        );

        Some(DisplayUpdate {
            status: status::on_air(&title),
            title,
            artist,
            history_changed,
        })
    }
}
