//! Timed ID3 metadata decoding.
//!
//! HLS packed-audio segments carry a small ID3 container at their head.  The
//! decoder here is deliberately forgiving: it never fails to the caller, and a
//! truncated or garbled container simply yields fewer frames.
//!
//! ## Layout read by [`decode`]
//!
//! ```text
//!   0      2            10
//!   ┌──────┬────────────┬─────────┬──────────┬────────┬─────────┬──────
//!   │ "ID" │ header …   │ id (4)  │ size (4) │ flags  │ payload │ id …
//!   └──────┴────────────┴─────────┴──────────┴────────┴─────────┴──────
//!                        └──── 10 bytes frame header ─┘
//! ```
//!
//! Frame sizes are read as plain big-endian integers and the payload is
//! decoded as UTF-8.

use thiserror::Error;
use tracing::debug;

/// Marker at offset 0 of every container ("ID").
pub const MAGIC: [u8; 2] = *b"ID";
/// Bytes of container header before the first frame.
pub const HEADER_LEN: usize = 10;
/// Bytes of per-frame header overhead (id + size + flags).
pub const FRAME_HEADER_LEN: usize = 10;

/// One (identifier, text) pair pulled out of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: String,
    pub text: String,
}

impl Frame {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Why a single frame was dropped.  Never surfaced past [`decode`].
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame {id} payload is not valid UTF-8: {source}")]
    Utf8 {
        id: String,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("frame {id} declares {size} bytes but only {remaining} remain")]
    Truncated {
        id: String,
        size: usize,
        remaining: usize,
    },
}

/// Decode every readable frame from `buf`.
///
/// Returns an empty list when the magic marker is missing.  Stops at the
/// first zero-size frame (padding) or at a frame whose declared size runs
/// past the end of the buffer.  A frame whose payload is not UTF-8 is skipped
/// and decoding continues with the next one.
pub fn decode(buf: &[u8]) -> Vec<Frame> {
    let mut frames = Vec::new();
    if buf.len() < MAGIC.len() || buf[..2] != MAGIC {
        return frames;
    }

    let mut offset = HEADER_LEN;
    while offset + FRAME_HEADER_LEN < buf.len() {
        let id = String::from_utf8_lossy(&buf[offset..offset + 4]).into_owned();
        let size = u32::from_be_bytes([
            buf[offset + 4],
            buf[offset + 5],
            buf[offset + 6],
            buf[offset + 7],
        ]) as usize;
        offset += FRAME_HEADER_LEN;

        if size == 0 {
            break;
        }

        match read_frame(buf, offset, id, size) {
            Ok(frame) => frames.push(frame),
            Err(e @ FrameError::Utf8 { .. }) => {
                debug!("id3: skipping frame: {}", e);
            }
            Err(e @ FrameError::Truncated { .. }) => {
                debug!("id3: stopping: {}", e);
                break;
            }
        }

        offset += size;
    }

    frames
}

fn read_frame(buf: &[u8], offset: usize, id: String, size: usize) -> Result<Frame, FrameError> {
    let remaining = buf.len() - offset;
    if size > remaining {
        return Err(FrameError::Truncated {
            id,
            size,
            remaining,
        });
    }

    let raw = match std::str::from_utf8(&buf[offset..offset + size]) {
        Ok(s) => s,
        Err(source) => return Err(FrameError::Utf8 { id, source }),
    };

    Ok(Frame {
        id,
        text: clean_text(raw),
    })
}

/// Strip NULs, then surrounding whitespace and control bytes.  The control
/// trim also removes the ID3 text-encoding byte that prefixes text frames.
fn clean_text(raw: &str) -> String {
    raw.replace('\0', "")
        .trim_matches(|c: char| c.is_whitespace() || c.is_control())
        .to_string()
}

/// Total length (header + body) of the ID3v2 container at the head of `buf`,
/// read from the syncsafe size in the container header.
///
/// Returns `None` when `buf` does not start with a full "ID3" header.
pub fn tag_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < HEADER_LEN || &buf[..3] != b"ID3" {
        return None;
    }
    let size = buf[6..10]
        .iter()
        .try_fold(0usize, |acc, &b| ((b & 0x80) == 0).then(|| (acc << 7) | b as usize))?;
    Some(HEADER_LEN + size)
}
