//! Frame-skip cadence throttle.
//!
//! The only backpressure in the pipeline: with a skip of `N`, one tick
//! in every `N` is exported, starting with the first.

use std::num::NonZeroU32;

/// Default skip: ≈15 exports/s from a 60 Hz render loop.
pub const DEFAULT_FRAME_SKIP: NonZeroU32 = NonZeroU32::new(4).unwrap();

/// Counts ticks and admits every `skip`-th one.
#[derive(Debug, Clone)]
pub struct CadenceThrottle {
    skip: NonZeroU32,
    /// Always `< skip`.
    counter: u32,
}

impl CadenceThrottle {
    pub fn new(skip: NonZeroU32) -> Self {
        Self { skip, counter: 0 }
    }

    /// Advance one tick; `true` if this tick should be exported.
    pub fn should_export(&mut self) -> bool {
        let export = self.counter == 0;
        self.counter = (self.counter + 1) % self.skip.get();
        export
    }

    pub fn skip(&self) -> NonZeroU32 {
        self.skip
    }
}

impl Default for CadenceThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_SKIP)
    }
}
