//! Error types for the framecast export pipeline.
//!
//! Nothing inside [`ExportPipeline::export_tick`](crate::ExportPipeline::export_tick)
//! is fatal: these types describe *why* a tick degraded, and are what
//! constructors, sinks and decoders return.

use thiserror::Error;

/// The canonical error type for framecast.
#[derive(Debug, Error)]
pub enum ExportError {
    // ── Capture Errors ───────────────────────────────────────────
    /// The surface could not deliver pixels for this tick.
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    // ── Buffer Errors ────────────────────────────────────────────
    /// `width * height * 4` does not fit in `usize`.
    #[error("frame too large: {width}x{height}")]
    FrameTooLarge { width: u32, height: u32 },

    /// Two buffers that must match in length did not.
    #[error("buffer length mismatch: expected {expected}, got {actual}")]
    BufferMismatch { expected: usize, actual: usize },

    // ── Transport Errors ─────────────────────────────────────────
    /// The socket or writer reported an error.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The sink's queue is full; the frame was dropped.
    #[error("sink busy, frame dropped")]
    SinkBusy,

    /// The sink cannot carry this payload shape.
    #[error("sink does not accept {0} payloads")]
    UnsupportedPayload(&'static str),

    /// A datagram or header failed to parse.
    #[error("malformed datagram: {0}")]
    MalformedDatagram(&'static str),

    // ── Serialization Errors ─────────────────────────────────────
    /// Text-safe payload was not valid base64.
    #[error("base64 decode failed: {0}")]
    Decode(#[from] base64::DecodeError),

    /// JSON framing failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Configuration Errors ─────────────────────────────────────
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

// ── CaptureError ──────────────────────────────────────────────────

/// Recoverable failure reading pixels out of a surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The surface has no active rendering context.
    #[error("no active rendering context")]
    ContextLost,

    /// The surface exists but has nothing to read yet.
    #[error("surface not ready")]
    NotReady,

    /// The destination slice does not match the surface size.
    #[error("destination holds {actual} bytes, surface needs {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = ExportError::FrameTooLarge {
            width: 70_000,
            height: 70_000,
        };
        assert!(e.to_string().contains("70000x70000"));

        let e = ExportError::BufferMismatch {
            expected: 48,
            actual: 12,
        };
        assert!(e.to_string().contains("48"));
        assert!(e.to_string().contains("12"));
    }

    #[test]
    fn from_capture() {
        let e: ExportError = CaptureError::ContextLost.into();
        assert!(matches!(e, ExportError::Capture(CaptureError::ContextLost)));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: ExportError = io_err.into();
        assert!(matches!(e, ExportError::Transport(_)));
    }
}
