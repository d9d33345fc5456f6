//! Messages between `PlayerCore` and the streaming collaborator.
//!
//! The core never talks to mpv or the network directly.  It sends
//! [`StreamRequest`]s through a [`StreamHandle`] and receives
//! [`StreamEvent`]s on its own event channel.

use mir_proto::protocol::StreamFault;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// Timed ID3 container.
    Id3,
    Other,
}

/// A raw metadata buffer lifted out of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSample {
    pub kind: SampleKind,
    pub data: Vec<u8>,
}

impl MetadataSample {
    pub fn id3(data: Vec<u8>) -> Self {
        Self {
            kind: SampleKind::Id3,
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Stream loaded and ready to play.
    Ready,
    /// Audio is flowing.
    Playing,
    Paused,
    Buffering,
    /// Answer to `StreamRequest::Play`.
    PlayStarted,
    PlayFailed(String),
    Fatal(StreamFault),
    Metadata(Vec<MetadataSample>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamRequest {
    /// Connect and load `url` paused.
    Start { url: String, volume: u8 },
    Play,
    Pause,
    Volume(u8),
    /// Reload the stream after a network failure.
    ResumeLoading,
    /// Reset the audio pipeline after a media failure.
    RecoverMedia,
    Shutdown,
}

/// Cheaply cloneable sender side of the stream client's request queue.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    tx: mpsc::UnboundedSender<StreamRequest>,
}

impl StreamHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StreamRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, req: StreamRequest) {
        if let Err(e) = self.tx.send(req) {
            warn!("stream: client gone, dropped {:?}", e.0);
        }
    }
}
