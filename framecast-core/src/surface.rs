//! Pixel sources the pipeline reads from.
//!
//! A [`FrameSurface`] is owned by the renderer. The pipeline only asks
//! for its size and for a copy of its pixels, RGBA8, row 0 at the
//! visual bottom.

use crate::error::CaptureError;
use crate::types::{BYTES_PER_PIXEL, Dimensions};

/// A rendering target that can be read back into a byte slice.
pub trait FrameSurface {
    /// Current size in pixels. Zero on either side means "not ready".
    fn dimensions(&self) -> Dimensions;

    /// Copy the current contents into `dst`, which is exactly
    /// `dimensions().byte_len()` bytes. Must not allocate.
    fn read_pixels(&mut self, dst: &mut [u8]) -> Result<(), CaptureError>;
}

impl<S: FrameSurface + ?Sized> FrameSurface for &mut S {
    fn dimensions(&self) -> Dimensions {
        (**self).dimensions()
    }

    fn read_pixels(&mut self, dst: &mut [u8]) -> Result<(), CaptureError> {
        (**self).read_pixels(dst)
    }
}

// ── TestPatternSurface ───────────────────────────────────────────

/// Deterministic animated gradient.
///
/// Pixel `(x, y)` (with `y` counted from the bottom) on frame `f` is
/// `[x, y, f, 0xFF]`, each truncated to a byte. Useful as a synthetic
/// source for the relay and for checking orientation end to end.
#[derive(Debug, Clone)]
pub struct TestPatternSurface {
    dims: Dimensions,
    frame: u32,
    context_lost: bool,
}

impl TestPatternSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            dims: Dimensions::new(width, height),
            frame: 0,
            context_lost: false,
        }
    }

    /// Move the animation forward one frame.
    pub fn advance(&mut self) {
        self.frame = self.frame.wrapping_add(1);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.dims = Dimensions::new(width, height);
    }

    /// Simulate losing (or regaining) the rendering context.
    pub fn set_context_lost(&mut self, lost: bool) {
        self.context_lost = lost;
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// The pixel value this surface produces at `(x, y_from_bottom)`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; BYTES_PER_PIXEL] {
        [x as u8, y as u8, self.frame as u8, 0xFF]
    }
}

impl FrameSurface for TestPatternSurface {
    fn dimensions(&self) -> Dimensions {
        self.dims
    }

    fn read_pixels(&mut self, dst: &mut [u8]) -> Result<(), CaptureError> {
        if self.context_lost {
            return Err(CaptureError::ContextLost);
        }
        if self.dims.is_empty() {
            return Err(CaptureError::NotReady);
        }

        let expected = self.dims.byte_len().map_err(|_| CaptureError::NotReady)?;
        if dst.len() != expected {
            return Err(CaptureError::SizeMismatch {
                expected,
                actual: dst.len(),
            });
        }

        let row_len = self.dims.row_len();
        for (y, row) in dst.chunks_exact_mut(row_len).enumerate() {
            for (x, px) in row.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
                px.copy_from_slice(&self.pixel(x as u32, y as u32));
            }
        }
        Ok(())
    }
}
