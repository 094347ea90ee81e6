//! Sampling-and-framing pipeline for samplevault
//!
//! Moves data from an interrupt-driven sensor source, through a fixed-size
//! scratch buffer and a deferred single-worker job queue, into a signed
//! streaming container on raw flash. A second consumer mode slices the same
//! sample stream into double-buffered windows for a real-time classifier.
//!
//! Key constraints:
//! - No heap allocation in the capture path
//! - Interrupt-context producer never blocks and never touches storage
//! - Flash writes are 4-byte word aligned, erases sector aligned
//! - Any short storage operation is fatal for the session (no retry)
//!
//! ```no_run
//! use samplevault_core::{DeviceContext, Recorder, SampleConfig};
//! use samplevault_core::storage::RamFlash;
//! use samplevault_core::signer::NullSigner;
//! use samplevault_core::capture::ScriptedCapture;
//!
//! let mut flash = RamFlash::new(4096, 32, 512);
//! let mut signer = NullSigner::new();
//! let mut device = DeviceContext::new("01:02:03:04:05:06", "DEV-BOARD").unwrap();
//! let config = SampleConfig {
//!     length_ms: 100,
//!     interval_ms: 0.0625,
//!     label: "session-01",
//!     hmac_key: "0123456789abcdef",
//! };
//!
//! let mut source = ScriptedCapture::new(16_000);
//! // feed source.push_chunk(...) from your sensor front-end, then:
//! let mut recorder = Recorder::new(&mut flash, &mut signer, &mut device);
//! match recorder.run(&config, &mut source) {
//!     Ok(summary) => { let _ = summary.bytes_collected; }
//!     Err(e) => { let _ = e; } // session aborted, storage state untrusted
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

// Macros for optional logging (no-ops without the `log` feature)
#[cfg(feature = "log")]
#[macro_use]
mod log_shim {
    macro_rules! log_info {
        ($($arg:tt)*) => { log::info!($($arg)*) };
    }
    macro_rules! log_warn {
        ($($arg:tt)*) => { log::warn!($($arg)*) };
    }
    macro_rules! log_error {
        ($($arg:tt)*) => { log::error!($($arg)*) };
    }
}

#[cfg(not(feature = "log"))]
#[macro_use]
mod log_shim {
    macro_rules! log_info {
        ($($arg:tt)*) => {{}};
    }
    macro_rules! log_warn {
        ($($arg:tt)*) => {{}};
    }
    macro_rules! log_error {
        ($($arg:tt)*) => {{}};
    }
}

pub mod accumulator;
pub mod acquisition;
pub mod capture;
pub mod container;
pub mod device;
pub mod errors;
pub mod queue;
pub mod session;
pub mod signer;
pub mod storage;
pub mod window;

// Public API
pub use accumulator::WordAccumulator;
pub use acquisition::{Acquisition, ConsumeStatus, DemuxConsumer, RecordConsumer, SampleConsumer};
pub use device::{DeviceContext, DeviceState};
pub use errors::{IngestError, IngestResult, SignerStage, StorageOp};
pub use session::{RecordSummary, Recorder, SampleConfig, SessionState};
pub use signer::PayloadSigner;
pub use storage::{SampleStorage, StorageGeometry};
pub use window::WindowPair;

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
