//! Now-playing extraction from the station's live web page.
//!
//! The page has no stable markup, so a few patterns are tried in order and
//! the first plausible hit wins.  Hits that are just the station branding
//! (anything mentioning "радио") or too short to be a track are skipped.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

/// Hits at or below this many characters are ignored.
const MIN_TRACK_CHARS: usize = 3;

fn patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r#"<meta property="og:title" content="([^"]+)""#,
            r#"Сейчас играет[^>]*>([^<]+)"#,
            r#"currentTrack["']?\s*[:=]\s*["']([^"']+)["']"#,
            r#"nowPlaying["']?\s*[:=]\s*["']([^"']+)["']"#,
        ]
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .expect("static regex")
        })
        .collect()
    })
}

/// First plausible track name in `html`.
pub fn extract_track(html: &str) -> Option<String> {
    for re in patterns() {
        let Some(caps) = re.captures(html) else {
            continue;
        };
        let track = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        if track.chars().count() > MIN_TRACK_CHARS && !track.to_lowercase().contains("радио") {
            return Some(track.to_string());
        }
    }
    None
}

/// Remembers the last track that was written out, so only changes are
/// written.  A track counts as written only after [`TrackChange::commit`].
#[derive(Debug, Default)]
pub struct TrackChange {
    last: Option<String>,
}

impl TrackChange {
    /// Returns the track when it differs from the last committed one.
    pub fn observe(&self, track: Option<String>) -> Option<String> {
        let track = track?;
        if self.last.as_deref() == Some(track.as_str()) {
            return None;
        }
        Some(track)
    }

    pub fn commit(&mut self, track: String) {
        self.last = Some(track);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_og_title() {
        let html = r#"<head><meta property="og:title" content=" Band - Song "></head>"#;
        assert_eq!(extract_track(html), Some("Band - Song".to_string()));
    }

    #[test]
    fn test_now_playing_label() {
        let html = r#"<div class="np">Сейчас играет: <span class="t">Band - Song</span></div>"#;
        assert_eq!(extract_track(html), Some("Band - Song".to_string()));
    }

    #[test]
    fn test_script_assignments_case_insensitive() {
        let html = r#"<script>var CURRENTTRACK = 'Band - Song';</script>"#;
        assert_eq!(extract_track(html), Some("Band - Song".to_string()));
        let html = r#"<script>{"nowPlaying": "Other - Tune"}</script>"#;
        assert_eq!(extract_track(html), Some("Other - Tune".to_string()));
    }

    #[test]
    fn test_branding_is_skipped_for_next_pattern() {
        let html = r#"<meta property="og:title" content="Радио МИР — прямой эфир">
            <script>currentTrack = "Band - Song"</script>"#;
        assert_eq!(extract_track(html), Some("Band - Song".to_string()));
    }

    #[test]
    fn test_short_or_missing() {
        assert_eq!(extract_track(r#"<meta property="og:title" content="abc">"#), None);
        assert_eq!(extract_track("<html></html>"), None);
    }

    #[test]
    fn test_track_change_reports_only_changes() {
        let mut change = TrackChange::default();
        assert_eq!(change.observe(Some("A".into())), Some("A".into()));
        change.commit("A".into());
        assert_eq!(change.observe(Some("A".into())), None);
        assert_eq!(change.observe(None), None);
        assert_eq!(change.observe(Some("B".into())), Some("B".into()));
    }

    #[test]
    fn test_uncommitted_track_is_reported_again() {
        let change = TrackChange::default();
        // write failed, nothing committed
        assert_eq!(change.observe(Some("Band - Song".into())), Some("Band - Song".into()));
        assert_eq!(change.observe(Some("Band - Song".into())), Some("Band - Song".into()));
    }
}
