#![allow(dead_code)]

/// Builds timed-ID3 containers the way HLS packagers lay them out: a 10-byte
/// "ID3" header with a syncsafe body size, then 10-byte frame headers.
#[derive(Debug, Default)]
pub struct TagBuilder {
    body: Vec<u8>,
}

impl TagBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A UTF-8 text frame (encoding byte 0x03).
    pub fn text(self, id: &str, text: &str) -> Self {
        let mut payload = vec![0x03];
        payload.extend_from_slice(text.as_bytes());
        self.raw(id, &payload)
    }

    pub fn raw(mut self, id: &str, payload: &[u8]) -> Self {
        assert_eq!(id.len(), 4, "frame ids are four bytes");
        self.body.extend_from_slice(id.as_bytes());
        self.body
            .extend_from_slice(&(payload.len() as u32).to_be_bytes());
        self.body.extend_from_slice(&[0, 0]);
        self.body.extend_from_slice(payload);
        self
    }

    /// Container bytes followed by `padding` zero bytes.
    pub fn build(self, padding: usize) -> Vec<u8> {
        let size = self.body.len() + padding;
        let mut out = Vec::with_capacity(10 + size);
        out.extend_from_slice(b"ID3\x04\x00\x00");
        out.extend_from_slice(&syncsafe(size as u32));
        out.extend_from_slice(&self.body);
        out.resize(out.len() + padding, 0);
        out
    }
}

fn syncsafe(n: u32) -> [u8; 4] {
    [
        ((n >> 21) & 0x7f) as u8,
        ((n >> 14) & 0x7f) as u8,
        ((n >> 7) & 0x7f) as u8,
        (n & 0x7f) as u8,
    ]
}
