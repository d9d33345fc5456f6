//! HLS metadata tap.
//!
//! mpv plays the audio; this task runs beside it and only looks at the
//! playlist.  Each poll fetches the media playlist, then reads the head of
//! every segment it has not seen yet.  A segment that opens with an ID3
//! container (packed-audio HLS carries its timed metadata this way) is cut to
//! the container length and sent to the core as an `Id3` sample.  Anything
//! else goes out as an `Other` sample, which the core ignores.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, Url};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use mir_proto::id3;

use crate::core::PlayerEvent;
use crate::stream::{MetadataSample, SampleKind, StreamEvent};

/// Containers bigger than this are not metadata we can use.
const MAX_TAG_BYTES: usize = 256 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TapError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("bad playlist: {0}")]
    Playlist(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Media sequence number.
    pub sequence: u64,
    pub url: Url,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    /// Variant streams (master playlist only).
    pub variants: Vec<Url>,
    /// Media segments (media playlist only).
    pub segments: Vec<Segment>,
    pub target_duration: Option<u64>,
}

/// Parse an M3U8 playlist.  URIs are resolved against `base`.
pub fn parse_playlist(text: &str, base: &Url) -> Result<Playlist, TapError> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    if lines.next() != Some("#EXTM3U") {
        return Err(TapError::Playlist("missing #EXTM3U header".into()));
    }

    let mut playlist = Playlist::default();
    let mut sequence = 0u64;
    let mut next_is_variant = false;

    for line in lines {
        if let Some(tag) = line.strip_prefix('#') {
            if let Some(v) = tag.strip_prefix("EXT-X-MEDIA-SEQUENCE:") {
                sequence = v
                    .trim()
                    .parse()
                    .map_err(|_| TapError::Playlist(format!("media sequence {:?}", v)))?;
            } else if let Some(v) = tag.strip_prefix("EXT-X-TARGETDURATION:") {
                playlist.target_duration = v.trim().parse().ok();
            } else if tag.starts_with("EXT-X-STREAM-INF") {
                next_is_variant = true;
            }
            continue;
        }

        let url = base
            .join(line)
            .map_err(|e| TapError::InvalidUrl(format!("{}: {}", line, e)))?;
        if next_is_variant {
            playlist.variants.push(url);
            next_is_variant = false;
        } else {
            playlist.segments.push(Segment { sequence, url });
            sequence += 1;
        }
    }
    Ok(playlist)
}

/// Segments of `playlist` newer than `last_seen`.  With nothing seen yet only
/// the live edge is returned, so a fresh tap does not replay the window.  A
/// playlist whose newest segment is older than `last_seen` means the encoder
/// restarted its media sequence; that also restarts at the live edge.
pub fn fresh_segments<'a>(playlist: &'a Playlist, last_seen: Option<u64>) -> Vec<&'a Segment> {
    let newest = playlist.segments.last().map(|s| s.sequence);
    let last_seen = last_seen.filter(|&last| newest.map_or(true, |n| n >= last));
    match last_seen {
        Some(last) => playlist
            .segments
            .iter()
            .filter(|s| s.sequence > last)
            .collect(),
        None => playlist.segments.last().into_iter().collect(),
    }
}

pub struct MetadataTap {
    client: Client,
    playlist_url: Url,
    media_url: Option<Url>,
    last_seen: Option<u64>,
    poll: Duration,
    core_tx: mpsc::Sender<PlayerEvent>,
}

impl MetadataTap {
    pub fn new(url: &str, poll: Duration, core_tx: mpsc::Sender<PlayerEvent>) -> Result<Self, TapError> {
        let playlist_url = Url::parse(url).map_err(|e| TapError::InvalidUrl(format!("{}: {}", url, e)))?;
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            playlist_url,
            media_url: None,
            last_seen: None,
            poll,
            core_tx,
        })
    }

    async fn fetch_playlist(&self, url: &Url) -> Result<Playlist, TapError> {
        let text = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_playlist(&text, url)
    }

    /// The media playlist, following the first variant of a master playlist.
    async fn media_playlist(&mut self) -> Result<Playlist, TapError> {
        if let Some(url) = self.media_url.clone() {
            return self.fetch_playlist(&url).await;
        }
        let top = self.fetch_playlist(&self.playlist_url).await?;
        let Some(variant) = top.variants.first().cloned() else {
            self.media_url = Some(self.playlist_url.clone());
            return Ok(top);
        };
        debug!("tap: following variant {}", variant);
        let media = self.fetch_playlist(&variant).await?;
        self.media_url = Some(variant);
        Ok(media)
    }

    /// Read just enough of a segment to tell whether it opens with ID3.
    async fn segment_head(&self, url: &Url) -> Result<MetadataSample, TapError> {
        let resp = self.client.get(url.clone()).send().await?.error_for_status()?;
        let mut body = resp.bytes_stream();
        let mut head: Vec<u8> = Vec::new();
        let mut wanted = id3::HEADER_LEN;

        while head.len() < wanted {
            let Some(chunk) = body.next().await else {
                break;
            };
            head.extend_from_slice(&chunk?);
            if wanted == id3::HEADER_LEN && head.len() >= id3::HEADER_LEN {
                match id3::tag_len(&head) {
                    Some(len) if len <= MAX_TAG_BYTES => wanted = len,
                    Some(len) => {
                        debug!("tap: oversized tag ({} bytes) in {}", len, url);
                        break;
                    }
                    None => break,
                }
            }
        }

        match id3::tag_len(&head) {
            Some(len) if len <= head.len() => {
                head.truncate(len);
                Ok(MetadataSample::id3(head))
            }
            _ => {
                head.truncate(id3::HEADER_LEN);
                Ok(MetadataSample {
                    kind: SampleKind::Other,
                    data: head,
                })
            }
        }
    }

    async fn poll_once(&mut self) -> Result<Vec<MetadataSample>, TapError> {
        let playlist = self.media_playlist().await?;
        let fresh: Vec<Segment> = fresh_segments(&playlist, self.last_seen)
            .into_iter()
            .cloned()
            .collect();

        let mut samples = Vec::new();
        for seg in fresh {
            match self.segment_head(&seg.url).await {
                Ok(sample) => samples.push(sample),
                Err(e) => debug!("tap: segment {} skipped: {}", seg.sequence, e),
            }
            self.last_seen = Some(seg.sequence);
        }

        if let Some(secs) = playlist.target_duration.filter(|&d| d > 0) {
            self.poll = Duration::from_secs(secs);
        }
        Ok(samples)
    }

    pub async fn run(mut self) {
        info!("tap: watching {}", self.playlist_url);
        loop {
            match self.poll_once().await {
                Ok(samples) if !samples.is_empty() => {
                    let evt = PlayerEvent::Stream(StreamEvent::Metadata(samples));
                    if self.core_tx.send(evt).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("tap: poll failed: {}", e);
                    // the variant may have moved; rediscover it next time
                    self.media_url = None;
                }
            }
            tokio::time::sleep(self.poll).await;
        }
        debug!("tap: core gone, exiting");
    }
}

/// Start the tap as a background task.  Abort the handle to stop it.
pub fn spawn(url: &str, poll: Duration, core_tx: mpsc::Sender<PlayerEvent>) -> Result<AbortHandle, TapError> {
    let tap = MetadataTap::new(url, poll, core_tx)?;
    Ok(tokio::spawn(tap.run()).abort_handle())
}
