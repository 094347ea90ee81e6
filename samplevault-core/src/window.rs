//! Double-Buffered Inference Windows
//!
//! ## Overview
//!
//! In inference mode the classifier needs fixed-size windows of settled
//! samples while capture keeps running. Two equally-sized slots alternate:
//! exactly one is being filled at any time, the other is either empty-idle or
//! full-and-unread. When the filling slot reaches the window size, the select
//! bit flips, the fill counter resets, and the ready flag is raised - the
//! producer never waits for the classifier.
//!
//! ```text
//!   slot 0 [############]  ready, classifier reads
//!   slot 1 [#####.......]  filling
//!                ^ select
//! ```
//!
//! ## Overrun Semantics
//!
//! The ready flag must be acknowledged (via [`WindowPair::try_window`])
//! before the producer may make further progress. A push arriving while the
//! flag is still set is an **overrun**: it is reported and the sample is
//! dropped - the unread window is never overwritten and nothing writes out of
//! bounds. Whether an overrun aborts the session is the caller's call;
//! continuing is allowed and loses samples, loudly.
//!
//! All state lives behind accessor methods; nothing else can break the
//! one-slot-filling invariant.

use crate::errors::{IngestError, IngestResult};

/// Two-slot sample window arena
///
/// `W` is the classifier's window size in samples, fixed at compile time
/// like every other buffer in this crate.
pub struct WindowPair<const W: usize> {
    buffers: [[i16; W]; 2],
    select: usize,
    fill: usize,
    ready: bool,
    overruns: u32,
}

impl<const W: usize> WindowPair<W> {
    /// New pair, slot 0 filling
    pub const fn new() -> Self {
        Self {
            buffers: [[0; W]; 2],
            select: 0,
            fill: 0,
            ready: false,
            overruns: 0,
        }
    }

    /// Append one sample to the filling slot
    ///
    /// Completing a window flips the select bit, resets the fill counter and
    /// raises the ready flag. While the previous window is unacknowledged,
    /// every push reports [`IngestError::Overrun`] and drops the sample.
    pub fn push(&mut self, sample: i16) -> IngestResult<()> {
        if self.ready {
            self.overruns = self.overruns.saturating_add(1);
            return Err(IngestError::Overrun);
        }

        self.buffers[self.select][self.fill] = sample;
        self.fill += 1;

        if self.fill >= W {
            self.select ^= 1;
            self.fill = 0;
            self.ready = true;
        }

        Ok(())
    }

    /// Take the settled window if one is ready
    ///
    /// Clears the ready flag (acknowledging the window) and returns the
    /// buffer that is *not* being filled, so its contents cannot change while
    /// the classifier reads them.
    pub fn try_window(&mut self) -> nb::Result<&[i16; W], IngestError> {
        if !self.ready {
            return Err(nb::Error::WouldBlock);
        }
        self.ready = false;
        Ok(&self.buffers[self.select ^ 1])
    }

    /// Clear fill and ready state for a non-continuous run
    ///
    /// Slot contents are left as-is; they are overwritten before they can be
    /// observed again.
    pub fn reset(&mut self) {
        self.fill = 0;
        self.ready = false;
    }

    /// True if a full window awaits acknowledgement
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// Samples in the filling slot
    pub const fn fill(&self) -> usize {
        self.fill
    }

    /// Overruns reported since construction
    pub const fn overruns(&self) -> u32 {
        self.overruns
    }
}

impl<const W: usize> Default for WindowPair<W> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_completes_after_w_samples() {
        let mut pair = WindowPair::<4>::new();

        for i in 0..3 {
            pair.push(i).unwrap();
            assert!(!pair.is_ready());
        }
        pair.push(3).unwrap();
        assert!(pair.is_ready());
        assert_eq!(pair.fill(), 0);

        let window = pair.try_window().unwrap();
        assert_eq!(window, &[0, 1, 2, 3]);
        assert!(!pair.is_ready());
    }

    #[test]
    fn unacknowledged_window_reports_overrun() {
        let mut pair = WindowPair::<4>::new();
        for i in 0..4 {
            pair.push(i).unwrap();
        }

        // (W+1)-th sample before the flag is cleared: reported, dropped
        assert_eq!(pair.push(99).unwrap_err(), IngestError::Overrun);
        assert_eq!(pair.overruns(), 1);

        // The settled window is untouched by the overrun
        assert_eq!(pair.try_window().unwrap(), &[0, 1, 2, 3]);

        // Acknowledged: pushes flow again
        pair.push(5).unwrap();
        assert_eq!(pair.fill(), 1);
    }

    #[test]
    fn alternating_slots_never_tear() {
        let mut pair = WindowPair::<2>::new();

        pair.push(1).unwrap();
        pair.push(2).unwrap();
        assert_eq!(pair.try_window().unwrap(), &[1, 2]);

        pair.push(3).unwrap();
        pair.push(4).unwrap();
        assert_eq!(pair.try_window().unwrap(), &[3, 4]);

        pair.push(5).unwrap();
        pair.push(6).unwrap();
        assert_eq!(pair.try_window().unwrap(), &[5, 6]);
    }

    #[test]
    fn try_window_blocks_until_full() {
        let mut pair = WindowPair::<3>::new();
        assert!(matches!(pair.try_window(), Err(nb::Error::WouldBlock)));

        pair.push(7).unwrap();
        assert!(matches!(pair.try_window(), Err(nb::Error::WouldBlock)));
    }

    #[test]
    fn reset_discards_partial_fill() {
        let mut pair = WindowPair::<4>::new();
        pair.push(1).unwrap();
        pair.push(2).unwrap();

        pair.reset();
        assert_eq!(pair.fill(), 0);
        assert!(!pair.is_ready());

        for i in 10..14 {
            pair.push(i).unwrap();
        }
        assert_eq!(pair.try_window().unwrap(), &[10, 11, 12, 13]);
    }
}
