//! Segmented envelope framing.
//!
//! Every message on the wire is wrapped in an envelope:
//!
//! ```text
//! u32 LE   segment count minus one
//! u32 LE   size of each segment, in 8-byte words   (one per segment)
//! u32      zero padding, present when the segment count is even
//! bytes    concatenated segments, sum(sizes) * 8 bytes
//! ```
//!
//! The header is therefore always a whole number of words. The codec only cuts
//! envelopes out of the stream; what the segments contain is up to
//! [`packet`](super::packet).

use crate::error::FrameError;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const WORD_BYTES: usize = 8;

/// Upper bound on the declared segment count of a single envelope.
pub const MAX_SEGMENTS: u32 = 512;

/// Upper bound on the payload of a single envelope.
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// One framed message: per-segment sizes (in words) and the raw segment bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    segment_sizes: Vec<u32>,
    payload: Vec<u8>,
}

impl Envelope {
    /// Builds an envelope, checking that `payload` matches the declared sizes.
    pub fn new(segment_sizes: Vec<u32>, payload: Vec<u8>) -> Result<Self, FrameError> {
        let payload_len = check_segments(&segment_sizes)?;
        if payload_len != payload.len() {
            return Err(FrameError::SizeMismatch {
                declared: payload_len as u64,
                actual: payload.len() as u64,
            });
        }
        Ok(Self {
            segment_sizes,
            payload,
        })
    }

    /// Wraps `bytes` in a single segment, zero-padded to a word boundary.
    pub fn single(bytes: &[u8]) -> Result<Self, FrameError> {
        let words = bytes.len().div_ceil(WORD_BYTES);
        let padded = words * WORD_BYTES;
        if padded > MAX_FRAME_BYTES {
            return Err(FrameError::FrameTooLarge(padded as u64));
        }
        let mut payload = Vec::with_capacity(padded);
        payload.extend_from_slice(bytes);
        payload.resize(padded, 0);
        Ok(Self {
            segment_sizes: vec![words as u32],
            payload,
        })
    }

    pub fn segment_sizes(&self) -> &[u32] {
        &self.segment_sizes
    }

    pub fn segment_count(&self) -> usize {
        self.segment_sizes.len()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Bytes of the segment at `index`.
    pub fn segment(&self, index: usize) -> Option<&[u8]> {
        let size = *self.segment_sizes.get(index)? as usize * WORD_BYTES;
        let start = self.segment_sizes[..index]
            .iter()
            .map(|s| *s as usize * WORD_BYTES)
            .sum::<usize>();
        self.payload.get(start..start + size)
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// Length of the header for an envelope with `segment_count` segments.
pub fn header_len(segment_count: usize) -> usize {
    let padding = if segment_count % 2 == 0 { 4 } else { 0 };
    4 + 4 * segment_count + padding
}

/// Turns the first header word into a segment count.
fn segment_count(first_word: u32) -> Result<usize, FrameError> {
    let count = first_word as u64 + 1;
    if count > MAX_SEGMENTS as u64 {
        return Err(FrameError::TooManySegments(count));
    }
    Ok(count as usize)
}

/// Validates declared sizes and returns the payload length they imply.
fn check_segments(segment_sizes: &[u32]) -> Result<usize, FrameError> {
    if segment_sizes.is_empty() {
        return Err(FrameError::NoSegments);
    }
    if segment_sizes.len() > MAX_SEGMENTS as usize {
        return Err(FrameError::TooManySegments(segment_sizes.len() as u64));
    }
    let bytes = segment_sizes
        .iter()
        .map(|s| *s as u64 * WORD_BYTES as u64)
        .sum::<u64>();
    if bytes > MAX_FRAME_BYTES as u64 {
        return Err(FrameError::FrameTooLarge(bytes));
    }
    Ok(bytes as usize)
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

pub struct FrameCodec;

impl FrameCodec {
    /// Serializes an envelope. Envelopes are size-checked when built, so this
    /// cannot exceed the frame limits.
    pub fn encode(envelope: &Envelope) -> Vec<u8> {
        let count = envelope.segment_sizes.len();
        let mut out = Vec::with_capacity(header_len(count) + envelope.payload.len());

        out.extend_from_slice(&(count as u32).saturating_sub(1).to_le_bytes());
        for size in &envelope.segment_sizes {
            out.extend_from_slice(&size.to_le_bytes());
        }
        if count % 2 == 0 {
            out.extend_from_slice(&[0u8; 4]);
        }
        out.extend_from_slice(&envelope.payload);
        out
    }

    /// Cuts the next envelope off the front of `buf`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((envelope, consumed)))` when a whole envelope is buffered.
    /// * `Ok(None)` when more bytes are needed.
    /// * `Err` when the header violates the segment or size limits.
    pub fn decode(buf: &[u8]) -> Result<Option<(Envelope, usize)>, FrameError> {
        if buf.len() < 4 {
            return Ok(None);
        }
        let count = segment_count(read_u32(buf, 0))?;
        let header = header_len(count);
        if buf.len() < header {
            return Ok(None);
        }

        let segment_sizes: Vec<u32> = (0..count).map(|i| read_u32(buf, 4 + 4 * i)).collect();
        let payload_len = check_segments(&segment_sizes)?;
        let total = header + payload_len;
        if buf.len() < total {
            return Ok(None);
        }

        let envelope = Envelope {
            segment_sizes,
            payload: buf[header..total].to_vec(),
        };
        Ok(Some((envelope, total)))
    }

    /// Reads exactly one envelope from `reader`.
    ///
    /// A stream that ends anywhere before the envelope is complete yields
    /// [`FrameError::ConnectionClosed`].
    pub async fn read_envelope<R>(reader: &mut R) -> Result<Envelope, FrameError>
    where
        R: AsyncRead + Unpin,
    {
        let mut word = [0u8; 4];
        reader.read_exact(&mut word).await?;
        let count = segment_count(u32::from_le_bytes(word))?;

        let mut sizes = vec![0u8; header_len(count) - 4];
        reader.read_exact(&mut sizes).await?;
        let segment_sizes: Vec<u32> = (0..count).map(|i| read_u32(&sizes, 4 * i)).collect();

        let payload_len = check_segments(&segment_sizes)?;
        let mut payload = vec![0u8; payload_len];
        reader.read_exact(&mut payload).await?;

        Ok(Envelope {
            segment_sizes,
            payload,
        })
    }
}
