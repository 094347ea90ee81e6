//! Bounded Lock-Free Job Queue for the Deferred Consumer
#![allow(unsafe_code)] // Required for lock-free atomic operations
//!
//! ## Overview
//!
//! The capture interrupt may not block, allocate or touch storage; all it is
//! allowed to do is copy samples into the stable scratch buffer and post a
//! job describing how many bytes arrived. This module is that hand-off: a
//! bounded single-producer single-consumer ring with atomic head/tail
//! pointers.
//!
//! ## Why Lock-Free?
//!
//! A mutex between an ISR and a worker invites priority inversion and
//! unbounded latency precisely where the system can least afford it. With
//! one producer and one worker the ring needs no locks at all:
//!
//! ```text
//! Producer (ISR)                    Consumer (worker)
//!      |                                 |
//!  Atomic Write ----> Ring Buffer <--- Atomic Read
//!      |                                 |
//!  Never Blocks                     Never Blocks
//! ```
//!
//! ## Memory Ordering
//!
//! - **Acquire** on loads: see all writes that preceded the matching release
//! - **Release** on pointer updates: slot contents visible before the index
//! - **Relaxed** for statistics, which never affect correctness
//!
//! ## Capacity
//!
//! `N` must be a power of two so the wrap is a mask, not a division. A full
//! queue drops the job (and counts it) rather than blocking the interrupt -
//! queue depth is sized so that only a stalled worker can make that happen.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Default job queue depth
pub const QUEUE_DEPTH: usize = 16;

/// One unit of deferred work: how many sample bytes await in the scratch
/// buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleJob {
    /// Bytes copied into the scratch buffer by the producer
    pub n_bytes: u32,
}

const EMPTY_JOB: SampleJob = SampleJob { n_bytes: 0 };

/// Queue health counters
///
/// Tracked without impacting the hot path
pub struct QueueStats {
    /// Total jobs pushed
    pub pushed: AtomicU32,
    /// Total jobs popped
    pub popped: AtomicU32,
    /// Jobs dropped because the queue was full
    pub dropped: AtomicU32,
    /// Maximum queue depth seen
    pub max_depth: AtomicU32,
}

impl QueueStats {
    const fn new() -> Self {
        Self {
            pushed: AtomicU32::new(0),
            popped: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            max_depth: AtomicU32::new(0),
        }
    }

    /// Update max depth if current is higher
    fn update_max_depth(&self, current: u32) {
        let mut max = self.max_depth.load(Ordering::Relaxed);
        while current > max {
            match self.max_depth.compare_exchange_weak(
                max,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => max = actual,
            }
        }
    }
}

/// Lock-free SPSC job queue
///
/// Usable in a static context:
///
/// ```rust
/// use samplevault_core::queue::{JobQueue, SampleJob};
///
/// static QUEUE: JobQueue<16> = JobQueue::new();
///
/// // Producer (interrupt context)
/// fn on_data_ready(n_bytes: u32) {
///     if !QUEUE.push(SampleJob { n_bytes }) {
///         // stalled worker; drop is counted
///     }
/// }
///
/// // Consumer (worker context)
/// fn service() {
///     while let Some(job) = QUEUE.pop() {
///         let _ = job.n_bytes;
///     }
/// }
/// ```
pub struct JobQueue<const N: usize> {
    /// Ring buffer storage
    ///
    /// `SampleJob` is `Copy`, so slots hold plain values; `UnsafeCell` gives
    /// the producer interior mutability alongside the atomics.
    buffer: UnsafeCell<[SampleJob; N]>,

    /// Next write position (producer owned)
    head: AtomicUsize,

    /// Next read position (consumer owned)
    tail: AtomicUsize,

    /// Queue statistics
    stats: QueueStats,
}

impl<const N: usize> JobQueue<N> {
    /// Create new empty queue
    ///
    /// Can be used in static context
    pub const fn new() -> Self {
        assert!(N.is_power_of_two(), "queue depth must be a power of 2");
        Self {
            buffer: UnsafeCell::new([EMPTY_JOB; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            stats: QueueStats::new(),
        }
    }

    /// Push a job (single producer, interrupt context)
    ///
    /// Returns false if the queue is full; the drop is counted.
    ///
    /// ## Safety
    /// Only one producer context may call this.
    pub fn push(&self, job: SampleJob) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let next_head = (head + 1) & (N - 1); // Fast modulo for power of 2

        // Check if queue is full
        if next_head == self.tail.load(Ordering::Acquire) {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        // Safe because we're the only producer
        unsafe {
            let buffer = &mut *self.buffer.get();
            buffer[head] = job;
        }

        // Make the slot visible before updating head
        self.head.store(next_head, Ordering::Release);

        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
        self.stats.update_max_depth(self.len() as u32);

        true
    }

    /// Pop the next job (single consumer, worker context)
    ///
    /// Returns None if the queue is empty
    pub fn pop(&self) -> Option<SampleJob> {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);

        // Check if queue is empty
        if tail == head {
            return None;
        }

        let job = unsafe {
            let buffer = &*self.buffer.get();
            buffer[tail]
        };

        self.tail.store((tail + 1) & (N - 1), Ordering::Release);
        self.stats.popped.fetch_add(1, Ordering::Relaxed);

        Some(job)
    }

    /// Current queue length
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);

        if head >= tail {
            head - tail
        } else {
            N - tail + head
        }
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// Check if queue is full
    pub fn is_full(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        ((head + 1) & (N - 1)) == tail
    }

    /// Queue statistics
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Discard all queued jobs (session teardown)
    ///
    /// ## Safety
    /// Only call when neither producer nor consumer is running.
    pub unsafe fn clear(&self) {
        self.head.store(0, Ordering::Release);
        self.tail.store(0, Ordering::Release);
    }
}

impl<const N: usize> Default for JobQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

// Safe to share between the producer and consumer contexts (the atomics
// handle synchronization)
unsafe impl<const N: usize> Send for JobQueue<N> {}
unsafe impl<const N: usize> Sync for JobQueue<N> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_basic() {
        let queue = JobQueue::<16>::new();

        assert!(queue.push(SampleJob { n_bytes: 128 }));
        assert_eq!(queue.len(), 1);

        let popped = queue.pop().unwrap();
        assert_eq!(popped.n_bytes, 128);
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn queue_full_drops_and_counts() {
        let queue = JobQueue::<4>::new();

        // Fill queue (capacity - 1 due to ring buffer)
        for i in 0..3 {
            assert!(queue.push(SampleJob { n_bytes: i }));
        }
        assert!(queue.is_full());

        assert!(!queue.push(SampleJob { n_bytes: 999 }));
        assert_eq!(queue.stats().dropped.load(Ordering::Relaxed), 1);
        assert_eq!(queue.stats().pushed.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn queue_preserves_fifo_order() {
        let queue = JobQueue::<8>::new();

        for i in 0..5 {
            queue.push(SampleJob { n_bytes: i });
        }
        for i in 0..5 {
            assert_eq!(queue.pop().unwrap().n_bytes, i);
        }
    }

    #[test]
    fn queue_wraps_around() {
        let queue = JobQueue::<4>::new();

        for round in 0..10u32 {
            assert!(queue.push(SampleJob { n_bytes: round }));
            assert_eq!(queue.pop().unwrap().n_bytes, round);
        }
        assert_eq!(queue.stats().max_depth.load(Ordering::Relaxed), 1);
    }
}
