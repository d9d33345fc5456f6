//! Placeholder tracks for streams that carry no usable metadata.
//!
//! While playing, a 30 s ticker asks [`due`] whether the display still lacks
//! real information; if so a random entry from the pool is offered to the
//! session, which only accepts it while the title is unknown.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::session::NowPlaying;

pub const DEFAULT_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackTrack {
    pub title: String,
    pub artist: String,
}

impl FallbackTrack {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
        }
    }
}

/// The station's stock programme blocks.
pub fn default_pool() -> Vec<FallbackTrack> {
    vec![
        FallbackTrack::new("World News", "Radio MIR"),
        FallbackTrack::new("Music on Air", "All Inclusive!"),
        FallbackTrack::new("Information Programme", "Interstate TV and Radio Company"),
    ]
}

/// True when a tick should try to fill the display: playback is running and
/// either field is still unknown.
pub fn due(now: &NowPlaying, is_playing: bool) -> bool {
    is_playing && (now.title.is_none() || now.artist.is_none())
}

/// Uniformly pick one placeholder.  `None` only for an empty pool.
pub fn pick<'a, R: Rng + ?Sized>(pool: &'a [FallbackTrack], rng: &mut R) -> Option<&'a FallbackTrack> {
    pool.choose(rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Candidate;
    use crate::session::Session;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_due_only_while_playing_and_incomplete() {
        let empty = NowPlaying::default();
        assert!(due(&empty, true));
        assert!(!due(&empty, false));

        let title_only = NowPlaying {
            title: Some("Song".to_string()),
            artist: None,
        };
        assert!(due(&title_only, true));

        let full = NowPlaying {
            title: Some("Song".to_string()),
            artist: Some("Band".to_string()),
        };
        assert!(!due(&full, true));
    }

    #[test]
    fn test_pick_draws_from_pool() {
        let pool = default_pool();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let t = pick(&pool, &mut rng).unwrap();
            assert!(pool.contains(t));
        }
        assert!(pick(&[], &mut rng).is_none());
    }

    #[test]
    fn test_pick_reaches_every_entry() {
        let pool = default_pool();
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(pick(&pool, &mut rng).unwrap().title.clone());
        }
        assert_eq!(seen.len(), pool.len());
    }

    #[test]
    fn test_due_tick_with_known_title_changes_nothing() {
        let mut session = Session::new("Radio MIR", "Live broadcast", 5);
        session.apply(Candidate::Title("Known".to_string()));
        // Artist missing, so the tick is due, but the title is kept.
        assert!(due(session.now_playing(), true));
        let mut rng = StdRng::seed_from_u64(1);
        let track = pick(&default_pool(), &mut rng).cloned().unwrap();
        assert!(session.fill_fallback(&track).is_none());
        assert_eq!(session.now_playing().title.as_deref(), Some("Known"));
    }
}
