//! Shared frame types passed between pipeline stages.
//!
//! [`FrameDescriptor`] borrows from the pipeline's own buffers, so it
//! lives exactly as long as one hand-off. Sinks that need the bytes
//! afterwards must copy them.

use crate::error::ExportError;

/// Bytes per pixel: red, green, blue, alpha.
pub const BYTES_PER_PIXEL: usize = 4;

// ── Dimensions ───────────────────────────────────────────────────

/// Pixel dimensions of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `true` if either side is zero.
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Length of one row in bytes.
    pub const fn row_len(self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Total RGBA byte size, or `FrameTooLarge` on overflow.
    pub fn byte_len(self) -> Result<usize, ExportError> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|px| px.checked_mul(BYTES_PER_PIXEL))
            .ok_or(ExportError::FrameTooLarge {
                width: self.width,
                height: self.height,
            })
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ── PayloadKind ──────────────────────────────────────────────────

/// Which representation a frame payload is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    /// RGBA bytes, origin-at-bottom.
    Raw,
    /// Base64 text of origin-at-top RGBA bytes.
    TextSafe,
}

impl PayloadKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            PayloadKind::Raw => "raw",
            PayloadKind::TextSafe => "text-safe",
        }
    }

    pub const fn to_wire(self) -> u8 {
        match self {
            PayloadKind::Raw => 0,
            PayloadKind::TextSafe => 1,
        }
    }

    pub const fn from_wire(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(PayloadKind::Raw),
            1 => Some(PayloadKind::TextSafe),
            _ => None,
        }
    }
}

// ── FrameDescriptor ──────────────────────────────────────────────

/// The payload handed to a [`FrameSink`](crate::sink::FrameSink).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDescriptor<'a> {
    Raw {
        data: &'a [u8],
        width: u32,
        height: u32,
    },
    TextSafe {
        encoded: &'a str,
        width: u32,
        height: u32,
    },
}

impl<'a> FrameDescriptor<'a> {
    pub fn kind(&self) -> PayloadKind {
        match self {
            FrameDescriptor::Raw { .. } => PayloadKind::Raw,
            FrameDescriptor::TextSafe { .. } => PayloadKind::TextSafe,
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        match *self {
            FrameDescriptor::Raw { width, height, .. }
            | FrameDescriptor::TextSafe { width, height, .. } => Dimensions::new(width, height),
        }
    }

    /// Payload bytes as they go on the wire.
    pub fn payload(&self) -> &'a [u8] {
        match *self {
            FrameDescriptor::Raw { data, .. } => data,
            FrameDescriptor::TextSafe { encoded, .. } => encoded.as_bytes(),
        }
    }
}
