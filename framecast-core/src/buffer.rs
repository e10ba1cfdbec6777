//! Pixel buffer lifecycle.
//!
//! A [`BufferSet`] holds the capture buffer (and, for the text-safe
//! strategy, the flipped buffer) sized for the most recent dimensions.
//! Allocation happens only when the dimensions change; every other call
//! hands back the same memory.

use crate::error::ExportError;
use crate::types::Dimensions;

/// Reusable capture (and optionally flip) buffers for one pipeline.
#[derive(Debug, Default)]
pub struct BufferSet {
    /// Raw capture, origin-at-bottom.
    capture: Vec<u8>,
    /// Flipped copy, origin-at-top. Unused unless `with_flip`.
    flipped: Vec<u8>,
    /// Whether the flipped buffer is maintained.
    with_flip: bool,
    /// Dimensions the buffers are currently sized for.
    last: Option<Dimensions>,
    /// Number of times buffers were (re)allocated.
    reallocations: u64,
}

impl BufferSet {
    /// Buffers for the raw strategy (capture only).
    pub fn capture_only() -> Self {
        Self::default()
    }

    /// Buffers for the text-safe strategy (capture + flipped).
    pub fn with_flip() -> Self {
        Self {
            with_flip: true,
            ..Self::default()
        }
    }

    /// Make sure the buffers match `dims`, reallocating only on change.
    pub fn ensure_capacity(&mut self, dims: Dimensions) -> Result<&mut Self, ExportError> {
        if self.last == Some(dims) {
            return Ok(self);
        }

        let len = dims.byte_len()?;
        self.capture = vec![0; len];
        if self.with_flip {
            self.flipped = vec![0; len];
        }
        self.last = Some(dims);
        self.reallocations += 1;
        tracing::info!(%dims, bytes = len, "export buffers allocated");
        Ok(self)
    }

    pub fn capture(&self) -> &[u8] {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut [u8] {
        &mut self.capture
    }

    pub fn flipped(&self) -> &[u8] {
        &self.flipped
    }

    /// Disjoint borrows: capture as source, flipped as destination.
    pub fn split_for_flip(&mut self) -> (&[u8], &mut [u8]) {
        (&self.capture, &mut self.flipped)
    }

    /// Dimensions the buffers are sized for, if any call has happened.
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.last
    }

    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }
}
