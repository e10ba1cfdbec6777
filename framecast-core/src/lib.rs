//! # framecast-core
//!
//! Real-time frame export: read pixels out of a rendering surface every
//! render tick and ship them to an external consumer at a bounded rate,
//! with no per-frame allocation at a fixed resolution.
//!
//! This crate contains:
//! - **Pipeline**: `ExportPipeline`, the per-tick orchestrator, with `Raw`
//!   and `TextSafe` strategies
//! - **Stages**: `BufferSet` (buffer lifecycle), `flip_rows`,
//!   `TextEncoder` (chunked base64), `CadenceThrottle`
//! - **Boundaries**: `FrameSurface` (pixel source) and `FrameSink`
//!   (transport), with a synthetic `TestPatternSurface`
//! - **Transports**: `UdpFrameSink` / `FrameReceiver` (chunked UDP) and
//!   `JsonLineSink` (newline-delimited JSON for pipes)
//! - **Error**: `ExportError` and `CaptureError`, `thiserror`-based

pub mod buffer;
pub mod cadence;
pub mod encoder;
pub mod error;
pub mod flip;
pub mod pipeline;
pub mod sink;
pub mod surface;
pub mod transport;
pub mod types;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use buffer::BufferSet;
pub use cadence::{CadenceThrottle, DEFAULT_FRAME_SKIP};
pub use encoder::{ENCODE_CHUNK_SIZE, TextEncoder, decode_text, encode_chunked};
pub use error::{CaptureError, ExportError};
pub use flip::flip_rows;
pub use pipeline::{
    ExportObserver, ExportPipeline, ExportStats, PipelineConfig, SkipReason, Strategy,
    TickOutcome,
};
pub use sink::{FrameSink, JsonLineSink, NullSink, TextFrameLine};
pub use surface::{FrameSurface, TestPatternSurface};
pub use transport::{ChunkHeader, FrameHeader, FrameReceiver, ReceivedFrame, UdpFrameSink};
pub use types::{BYTES_PER_PIXEL, Dimensions, FrameDescriptor, PayloadKind};
