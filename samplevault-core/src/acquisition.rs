//! Acquisition Scheduler and Dual-Mode Consumer
//!
//! ## Overview
//!
//! This is the producer/consumer spine of the pipeline. Two execution
//! contexts share it:
//!
//! - **Interrupt context** (`data_ready`): runs on every hardware data-ready
//!   signal. Copies the waiting samples out of the DMA buffer into the stable
//!   scratch buffer and, only if the session is armed, posts a job with the
//!   byte count. Never blocks, never allocates, never touches storage.
//! - **Worker context** (`service`): pops jobs FIFO and hands the scratch
//!   slice to whichever consumer is installed for this session. Jobs run to
//!   completion, one at a time, on one worker - mutual exclusion is
//!   structural, not lock-based.
//!
//! ```text
//! hardware -> DMA buffer -> data_ready -> scratch + JobQueue -> service
//!                             (ISR)                              (worker)
//!                                            record:    accumulator + signer
//!                                            inference: window demux
//! ```
//!
//! Unarmed data-ready events are drained from the hardware but their samples
//! are discarded, which keeps sensor activity outside a session out of the
//! container. A job that slips into the queue right at disarm time is
//! dropped by an explicit guard in `service`.
//!
//! ## Consumer Modes
//!
//! Exactly one [`SampleConsumer`] is installed per session:
//!
//! - [`RecordConsumer`] frames sample bytes through the word accumulator into
//!   storage and keeps the running signature current. Reaching the session's
//!   byte target is the sole stop condition - no timer.
//! - [`DemuxConsumer`] distributes samples into the double-buffered window
//!   pair for the classifier; overruns propagate to the caller.
//!
//! ## Scratch Hand-Off Safety
//!
//! The producer writes the scratch buffer, the worker reads it. This is safe
//! without copying because the hardware raises the next data-ready only after
//! the current DMA buffer is consumed, and the queue's FIFO ordering means
//! the worker drains a job before the producer overwrites the bytes it
//! refers to. The contract is enforced by review, not the type system - keep
//! `data_ready` minimal.

use crate::accumulator::WordAccumulator;
use crate::capture::CaptureSource;
use crate::errors::IngestResult;
use crate::queue::{JobQueue, SampleJob};
use crate::signer::PayloadSigner;
use crate::storage::SampleStorage;
use crate::window::WindowPair;

/// Scratch capacity in samples, sized to the largest DMA delivery
pub const SCRATCH_SAMPLES: usize = 2048;

/// What a consumer reports back per job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeStatus {
    /// Keep the session running
    Continue,
    /// Target reached; the scheduler disarms itself
    Complete,
}

/// Deferred-context consumer seam - one of the two modes per session
pub trait SampleConsumer {
    /// Process one job's worth of samples from the scratch buffer
    fn consume(&mut self, samples: &[i16]) -> IngestResult<ConsumeStatus>;
}

/// Interrupt-driven producer plus deferred job dispatch
///
/// `SCRATCH` is the stable copy-out buffer size in samples, `DEPTH` the job
/// queue capacity (power of two).
pub struct Acquisition<const SCRATCH: usize, const DEPTH: usize> {
    scratch: [i16; SCRATCH],
    queue: JobQueue<DEPTH>,
    armed: bool,
}

impl<const SCRATCH: usize, const DEPTH: usize> Acquisition<SCRATCH, DEPTH> {
    /// New disarmed scheduler
    pub const fn new() -> Self {
        Self {
            scratch: [0; SCRATCH],
            queue: JobQueue::new(),
            armed: false,
        }
    }

    /// Allow jobs to be enqueued
    pub fn arm(&mut self) {
        self.armed = true;
    }

    /// Stop enqueueing; samples keep draining but are discarded
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    /// True while the session accepts samples
    pub const fn is_armed(&self) -> bool {
        self.armed
    }

    /// Pending jobs
    pub fn pending_jobs(&self) -> usize {
        self.queue.len()
    }

    /// Interrupt-context entry: drain the source, post a job if armed
    ///
    /// Returns the number of samples copied out (0 when the source had
    /// nothing). Keep this path free of anything that can block.
    pub fn data_ready(&mut self, source: &mut dyn CaptureSource) -> usize {
        let available = source.available().min(SCRATCH);
        let n = source.read(&mut self.scratch[..available]);

        if n > 0 && self.armed {
            // Full queue drops the job; the stats record it
            let _ = self.queue.push(SampleJob {
                n_bytes: (n * 2) as u32,
            });
        }

        n
    }

    /// Worker-context entry: run every queued job through `consumer`
    ///
    /// Returns `Complete` once the consumer reports its target reached (the
    /// scheduler disarms itself at that point). Jobs found after disarm are
    /// dropped - a stray enqueue racing the disarm is expected and harmless.
    pub fn service(&mut self, consumer: &mut dyn SampleConsumer) -> IngestResult<ConsumeStatus> {
        let mut outcome = ConsumeStatus::Continue;

        while let Some(job) = self.queue.pop() {
            if !self.armed {
                continue;
            }

            let n_samples = (job.n_bytes / 2) as usize;
            match consumer.consume(&self.scratch[..n_samples])? {
                ConsumeStatus::Continue => {}
                ConsumeStatus::Complete => {
                    self.armed = false;
                    outcome = ConsumeStatus::Complete;
                }
            }
        }

        Ok(outcome)
    }
}

impl<const SCRATCH: usize, const DEPTH: usize> Default for Acquisition<SCRATCH, DEPTH> {
    fn default() -> Self {
        Self::new()
    }
}

/// Record-mode consumer: scratch bytes -> word accumulator + signature
pub struct RecordConsumer<'a, S: SampleStorage, G: PayloadSigner> {
    storage: &'a mut S,
    signer: &'a mut G,
    accumulator: WordAccumulator,
    current_bytes: u32,
    required_bytes: u32,
}

impl<'a, S: SampleStorage, G: PayloadSigner> RecordConsumer<'a, S, G> {
    /// New consumer committing after `header_offset`, stopping at
    /// `required_bytes` of sample data
    pub fn new(storage: &'a mut S, signer: &'a mut G, header_offset: u32, required_bytes: u32) -> Self {
        Self {
            storage,
            signer,
            accumulator: WordAccumulator::new(header_offset),
            current_bytes: 0,
            required_bytes,
        }
    }

    /// Sample bytes committed so far
    pub fn bytes_collected(&self) -> u32 {
        self.current_bytes
    }

    /// Flush a pending partial word; call once when the session ends
    pub fn finish(&mut self) -> IngestResult<()> {
        self.accumulator.flush_tail(self.storage)
    }
}

impl<S: SampleStorage, G: PayloadSigner> SampleConsumer for RecordConsumer<'_, S, G> {
    fn consume(&mut self, samples: &[i16]) -> IngestResult<ConsumeStatus> {
        // Clamp to the session target so the container holds exactly the
        // bytes the pre-erase span accounted for
        let remaining = (self.required_bytes - self.current_bytes) as usize;
        let take = (samples.len() * 2).min(remaining);

        let mut chunk = [0u8; 64];
        let mut filled = 0usize;
        for sample in &samples[..take / 2] {
            chunk[filled..filled + 2].copy_from_slice(&sample.to_le_bytes());
            filled += 2;
            if filled == chunk.len() {
                self.accumulator.accumulate(self.storage, &chunk)?;
                self.signer.update(&chunk)?;
                filled = 0;
            }
        }
        if filled > 0 {
            self.accumulator.accumulate(self.storage, &chunk[..filled])?;
            self.signer.update(&chunk[..filled])?;
        }

        self.current_bytes += take as u32;
        if self.current_bytes >= self.required_bytes {
            return Ok(ConsumeStatus::Complete);
        }
        Ok(ConsumeStatus::Continue)
    }
}

/// Inference-mode consumer: scratch samples -> double-buffered windows
pub struct DemuxConsumer<'a, const W: usize> {
    windows: &'a mut WindowPair<W>,
}

impl<'a, const W: usize> DemuxConsumer<'a, W> {
    /// Demux into `windows`
    pub fn new(windows: &'a mut WindowPair<W>) -> Self {
        Self { windows }
    }
}

impl<const W: usize> SampleConsumer for DemuxConsumer<'_, W> {
    fn consume(&mut self, samples: &[i16]) -> IngestResult<ConsumeStatus> {
        for &sample in samples {
            // Overrun propagates; the caller decides abort-vs-continue
            self.windows.push(sample)?;
        }
        Ok(ConsumeStatus::Continue)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::capture::ScriptedCapture;
    use crate::errors::IngestError;
    use crate::signer::NullSigner;
    use crate::storage::{RamFlash, SampleStorage};

    type TestAcquisition = Acquisition<64, 8>;

    #[test]
    fn unarmed_data_ready_discards() {
        let mut acq = TestAcquisition::new();
        acq.disarm();

        let mut source = ScriptedCapture::new(16_000);
        source.push_chunk(&[1, 2, 3]);

        // Hardware is drained either way, but no job is posted
        assert_eq!(acq.data_ready(&mut source), 3);
        assert_eq!(acq.pending_jobs(), 0);
    }

    #[test]
    fn record_consumer_stops_at_target() {
        let mut flash = RamFlash::new(4096, 4, 0);
        flash.erase(0, 4096);
        let mut signer = NullSigner::new();
        signer.init(b"k").unwrap();

        let mut acq = TestAcquisition::new();
        acq.arm();

        let mut source = ScriptedCapture::new(16_000);
        source.push_chunk(&[10, 20]);
        source.push_chunk(&[30, 40]);
        source.push_chunk(&[50, 60]); // beyond the target; discarded

        let mut consumer = RecordConsumer::new(&mut flash, &mut signer, 0, 8);

        let mut outcome = ConsumeStatus::Continue;
        while source.pending() > 0 {
            acq.data_ready(&mut source);
            if acq.service(&mut consumer).unwrap() == ConsumeStatus::Complete {
                outcome = ConsumeStatus::Complete;
            }
        }

        assert_eq!(outcome, ConsumeStatus::Complete);
        assert!(!acq.is_armed());
        assert_eq!(consumer.bytes_collected(), 8);
        consumer.finish().unwrap();
        drop(consumer);

        let expected: Vec<u8> = [10i16, 20, 30, 40]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        assert_eq!(&flash.sample_bytes()[..8], &expected[..]);
        assert_eq!(signer.bytes_signed(), 8);
    }

    #[test]
    fn record_consumer_clamps_final_chunk() {
        let mut flash = RamFlash::new(4096, 4, 0);
        flash.erase(0, 4096);
        let mut signer = NullSigner::new();
        signer.init(b"k").unwrap();

        let mut consumer = RecordConsumer::new(&mut flash, &mut signer, 0, 4);
        // 3 samples offered, only 2 fit the target
        let status = consumer.consume(&[1, 2, 3]).unwrap();
        assert_eq!(status, ConsumeStatus::Complete);
        assert_eq!(consumer.bytes_collected(), 4);
    }

    #[test]
    fn demux_consumer_fills_windows() {
        let mut windows = WindowPair::<4>::new();

        let mut acq = TestAcquisition::new();
        acq.arm();
        let mut source = ScriptedCapture::new(16_000);
        source.push_chunk(&[1, 2, 3, 4]);

        acq.data_ready(&mut source);
        let mut consumer = DemuxConsumer::new(&mut windows);
        acq.service(&mut consumer).unwrap();
        drop(consumer);

        assert_eq!(windows.try_window().unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn demux_overrun_surfaces_to_caller() {
        let mut windows = WindowPair::<2>::new();

        let mut acq = TestAcquisition::new();
        acq.arm();
        let mut source = ScriptedCapture::new(16_000);
        source.push_chunk(&[1, 2, 3]); // third sample arrives with window unread

        acq.data_ready(&mut source);
        let mut consumer = DemuxConsumer::new(&mut windows);
        let err = acq.service(&mut consumer).unwrap_err();
        assert_eq!(err, IngestError::Overrun);
    }

    #[test]
    fn stray_job_after_disarm_is_dropped() {
        let mut flash = RamFlash::new(4096, 4, 0);
        flash.erase(0, 4096);
        let mut signer = NullSigner::new();
        signer.init(b"k").unwrap();

        let mut acq = TestAcquisition::new();
        acq.arm();
        let mut source = ScriptedCapture::new(16_000);
        source.push_chunk(&[1, 2]);
        acq.data_ready(&mut source);
        acq.disarm();

        let mut consumer = RecordConsumer::new(&mut flash, &mut signer, 0, 64);
        acq.service(&mut consumer).unwrap();
        assert_eq!(consumer.bytes_collected(), 0);
    }
}
