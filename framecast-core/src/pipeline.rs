//! The per-tick export orchestrator.
//!
//! [`ExportPipeline::export_tick`] runs synchronously inside the caller's
//! render tick:
//!
//! 1. [`CadenceThrottle`] decides whether this tick is exported.
//! 2. [`BufferSet`] is sized for the surface's current dimensions.
//! 3. The [`FrameSurface`] copies its pixels into the capture buffer.
//! 4. Text-safe only: rows are flipped, then base64-encoded.
//! 5. The [`FrameDescriptor`] is handed to the [`FrameSink`].
//!
//! Every failure degrades to "no frame this tick". Nothing is returned
//! as an error; the [`TickOutcome`] and the optional [`ExportObserver`]
//! say what happened.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::buffer::BufferSet;
use crate::cadence::{CadenceThrottle, DEFAULT_FRAME_SKIP};
use crate::encoder::TextEncoder;
use crate::error::{CaptureError, ExportError};
use crate::flip::flip_rows;
use crate::sink::FrameSink;
use crate::surface::FrameSurface;
use crate::types::{Dimensions, FrameDescriptor};

// ── Strategy ─────────────────────────────────────────────────────

/// How a captured frame is conditioned for its transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Hand over the capture buffer untouched (origin-at-bottom).
    #[default]
    Raw,
    /// Flip to origin-at-top and base64-encode.
    TextSafe,
}

// ── PipelineConfig ───────────────────────────────────────────────

/// Configuration for [`ExportPipeline`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Export one tick out of every `frame_skip`.
    pub frame_skip: NonZeroU32,
    /// Fixed for the lifetime of the pipeline.
    pub strategy: Strategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_skip: DEFAULT_FRAME_SKIP,
            strategy: Strategy::Raw,
        }
    }
}

// ── Outcomes ─────────────────────────────────────────────────────

/// Why an admitted tick produced no frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Zero width or height.
    SurfaceNotReady,
    /// The surface failed to copy its pixels.
    Capture(CaptureError),
    /// The frame's byte size does not fit in memory.
    FrameTooLarge(Dimensions),
    /// Internal buffers disagreed in size.
    BufferMismatch,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::SurfaceNotReady => f.write_str("surface not ready"),
            SkipReason::Capture(e) => write!(f, "capture failed: {e}"),
            SkipReason::FrameTooLarge(dims) => write!(f, "frame too large: {dims}"),
            SkipReason::BufferMismatch => f.write_str("buffer size mismatch"),
        }
    }
}

/// What one call to [`ExportPipeline::export_tick`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not this tick's turn; the surface was not touched.
    Throttled,
    /// Admitted, but no frame was produced.
    Skipped(SkipReason),
    /// A frame was handed to the sink. `delivered` is `false` when the
    /// sink reported a failure; the frame is not retried.
    Exported { delivered: bool },
}

/// Running counters for one pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub ticks: u64,
    pub throttled: u64,
    pub skipped: u64,
    pub exported: u64,
    pub delivery_failures: u64,
    /// Buffer (re)allocations caused by dimension changes.
    pub reallocations: u64,
}

// ── ExportObserver ───────────────────────────────────────────────

/// Optional diagnostics hook. All methods default to no-ops.
pub trait ExportObserver: Send {
    /// An admitted tick produced no frame.
    fn tick_skipped(&mut self, _reason: &SkipReason) {}

    /// The sink rejected a frame.
    fn delivery_failed(&mut self, _error: &ExportError) {}

    /// Buffers were (re)allocated for new dimensions.
    fn buffers_reallocated(&mut self, _dims: Dimensions) {}
}

// ── ExportPipeline ───────────────────────────────────────────────

/// One export channel: owns its buffers, throttle, encoder and sink.
pub struct ExportPipeline<S> {
    strategy: Strategy,
    throttle: CadenceThrottle,
    buffers: BufferSet,
    encoder: TextEncoder,
    sink: S,
    observer: Option<Box<dyn ExportObserver>>,
    stats: ExportStats,
    /// Whether the last admitted tick reached the surface successfully.
    surface_ok: bool,
}

impl<S: FrameSink> ExportPipeline<S> {
    pub fn new(config: PipelineConfig, sink: S) -> Self {
        let buffers = match config.strategy {
            Strategy::Raw => BufferSet::capture_only(),
            Strategy::TextSafe => BufferSet::with_flip(),
        };
        Self {
            strategy: config.strategy,
            throttle: CadenceThrottle::new(config.frame_skip),
            buffers,
            encoder: TextEncoder::new(),
            sink,
            observer: None,
            stats: ExportStats::default(),
            surface_ok: true,
        }
    }

    /// Attach a diagnostics observer.
    pub fn with_observer(mut self, observer: Box<dyn ExportObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run one render tick.
    pub fn export_tick<F: FrameSurface + ?Sized>(&mut self, surface: &mut F) -> TickOutcome {
        self.stats.ticks += 1;

        if !self.throttle.should_export() {
            self.stats.throttled += 1;
            return TickOutcome::Throttled;
        }

        let outcome = match self.capture(surface) {
            Ok(dims) => {
                if !self.surface_ok {
                    debug!("surface available again");
                    self.surface_ok = true;
                }
                self.ship(dims)
            }
            Err(reason) => TickOutcome::Skipped(reason),
        };

        match &outcome {
            TickOutcome::Skipped(reason) => {
                self.stats.skipped += 1;
                if let Some(obs) = self.observer.as_mut() {
                    obs.tick_skipped(reason);
                }
            }
            TickOutcome::Exported { delivered } => {
                self.stats.exported += 1;
                if !delivered {
                    self.stats.delivery_failures += 1;
                }
            }
            TickOutcome::Throttled => {}
        }
        outcome
    }

    /// Size the buffers and copy the surface into the capture buffer.
    fn capture<F: FrameSurface + ?Sized>(
        &mut self,
        surface: &mut F,
    ) -> Result<Dimensions, SkipReason> {
        let dims = surface.dimensions();
        if dims.is_empty() {
            self.note_surface_failure(&SkipReason::SurfaceNotReady);
            return Err(SkipReason::SurfaceNotReady);
        }

        let before = self.buffers.reallocations();
        if self.buffers.ensure_capacity(dims).is_err() {
            let reason = SkipReason::FrameTooLarge(dims);
            self.note_surface_failure(&reason);
            return Err(reason);
        }
        if self.buffers.reallocations() != before {
            self.stats.reallocations = self.buffers.reallocations();
            if let Some(obs) = self.observer.as_mut() {
                obs.buffers_reallocated(dims);
            }
        }

        if let Err(e) = surface.read_pixels(self.buffers.capture_mut()) {
            let reason = SkipReason::Capture(e);
            self.note_surface_failure(&reason);
            return Err(reason);
        }
        Ok(dims)
    }

    /// Condition the captured frame for the strategy and hand it off.
    fn ship(&mut self, dims: Dimensions) -> TickOutcome {
        let result = match self.strategy {
            Strategy::Raw => {
                let frame = FrameDescriptor::Raw {
                    data: self.buffers.capture(),
                    width: dims.width,
                    height: dims.height,
                };
                self.sink.send_frame(&frame)
            }
            Strategy::TextSafe => {
                let (src, dst) = self.buffers.split_for_flip();
                if flip_rows(src, dst, dims).is_err() {
                    return TickOutcome::Skipped(SkipReason::BufferMismatch);
                }
                let frame = FrameDescriptor::TextSafe {
                    encoded: self.encoder.encode(self.buffers.flipped()),
                    width: dims.width,
                    height: dims.height,
                };
                self.sink.send_frame(&frame)
            }
        };

        match result {
            Ok(()) => TickOutcome::Exported { delivered: true },
            Err(e) => {
                debug!("frame dropped by sink: {e}");
                if let Some(obs) = self.observer.as_mut() {
                    obs.delivery_failed(&e);
                }
                TickOutcome::Exported { delivered: false }
            }
        }
    }

    /// Warn once per outage, then stay quiet until the surface recovers.
    fn note_surface_failure(&mut self, reason: &SkipReason) {
        if self.surface_ok {
            warn!("skipping export: {reason}");
            self.surface_ok = false;
        } else {
            debug!("skipping export: {reason}");
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn stats(&self) -> ExportStats {
        self.stats
    }

    /// Number of buffer (re)allocations so far.
    pub fn reallocations(&self) -> u64 {
        self.buffers.reallocations()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

// ── Tests ────────────────────────────────────────────────────────
