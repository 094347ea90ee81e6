//! Error Types for the Sampling-and-Framing Pipeline
//!
//! ## Design Philosophy
//!
//! The error system follows the same rules as the rest of the crate:
//!
//! 1. **Small Size**: Every variant carries inline data only (integers and
//!    `&'static str`), so errors stay cheap to return from hot paths and can
//!    sit in queues or registers.
//!
//! 2. **No Heap Allocation**: No `String`, no boxing. Deterministic memory.
//!
//! 3. **Copy Semantics**: Errors implement `Copy` so they move freely across
//!    the interrupt/deferred boundary without ownership gymnastics.
//!
//! 4. **Fail-Fast**: Nothing in this crate retries. Flash operations are not
//!    safely re-enterable mid-word, so every error terminates the session and
//!    the caller gets a clean return to idle.
//!
//! ## Error Categories
//!
//! - **Storage I/O** (`StorageIo`): a read/write/erase returned fewer bytes
//!   than requested. Always fatal for the session.
//! - **Capacity** (`CapacityExceeded`, `SinkOverflow`): a fixed buffer or the
//!   storage region cannot hold what the session needs. Detected before any
//!   hardware or storage is touched.
//! - **Overrun** (`Overrun`): the inference consumer found the previous
//!   window still unacknowledged. Reported to the caller, who decides whether
//!   to abort; continuing loses samples but never corrupts the unread window.
//! - **Signer** (`Signer`): the incremental signer failed; the session aborts
//!   before any finalization write.

use thiserror_no_std::Error;

/// Result type for pipeline operations
pub type IngestResult<T> = Result<T, IngestError>;

/// Storage operation tag carried inside [`IngestError::StorageIo`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StorageOp {
    /// Block read
    Read = 0,
    /// Word-aligned program
    Write = 1,
    /// Sector-aligned erase
    Erase = 2,
}

impl StorageOp {
    /// Human-readable operation name
    pub const fn name(&self) -> &'static str {
        match self {
            StorageOp::Read => "read",
            StorageOp::Write => "write",
            StorageOp::Erase => "erase",
        }
    }
}

/// Which signer call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SignerStage {
    /// Keying / context setup
    Init = 0,
    /// Incremental update
    Update = 1,
    /// Digest production
    Finish = 2,
}

impl SignerStage {
    /// Human-readable stage name
    pub const fn name(&self) -> &'static str {
        match self {
            SignerStage::Init => "init",
            SignerStage::Update => "update",
            SignerStage::Finish => "finish",
        }
    }
}

/// Pipeline errors - kept small and `Copy` for embedded use
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestError {
    /// A storage primitive returned a byte count different from the request.
    /// Fatal for the session; retrying flash writes risks corrupt sectors.
    #[error("storage {} short: requested {requested}, got {actual}", .op.name())]
    StorageIo {
        /// Which primitive failed
        op: StorageOp,
        /// Bytes requested
        requested: u32,
        /// Bytes the collaborator reported done (0 on outright failure)
        actual: u32,
    },

    /// The session needs more sample bytes than the storage region holds
    #[error("capacity exceeded: need {required} bytes, have {available}")]
    CapacityExceeded {
        /// Bytes the session would write (header + samples, block aligned)
        required: u32,
        /// Bytes available for sample data
        available: u32,
    },

    /// A fixed scratch buffer cannot hold the data being framed
    #[error("sink overflow: need {needed} bytes, capacity {capacity}")]
    SinkOverflow {
        /// Bytes the write needed
        needed: usize,
        /// Fixed capacity of the sink
        capacity: usize,
    },

    /// Inference window completed while the previous one was unacknowledged
    #[error("inference buffer overrun: window still unread")]
    Overrun,

    /// Incremental signer returned a failure code
    #[error("signer {} failed ({code})", .stage.name())]
    Signer {
        /// Which signer call failed
        stage: SignerStage,
        /// Implementation-defined failure code
        code: i32,
    },

    /// End-of-header scan found no non-zero byte in the container scratch
    #[error("failed to find end of header")]
    HeaderTermination,

    /// Operation requires a different session state
    #[error("invalid session state: {reason}")]
    InvalidState {
        /// What the caller got wrong
        reason: &'static str,
    },

    /// Session configuration is unusable (zero interval, empty window, ...)
    #[error("bad configuration: {reason}")]
    BadConfig {
        /// Which parameter is rejected
        reason: &'static str,
    },

    /// Session stopped before reaching its target
    ///
    /// Raised after cleanup (partial-word flush) has already run; storage
    /// holds whatever was collected, but the container is unfinalized.
    #[error("session aborted: {reason}")]
    Aborted {
        /// Why the session stopped
        reason: &'static str,
    },
}

#[cfg(feature = "defmt")]
impl defmt::Format for IngestError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::StorageIo { op, requested, actual } => {
                defmt::write!(fmt, "storage {} short: {}/{}", op.name(), actual, requested)
            }
            Self::CapacityExceeded { required, available } => {
                defmt::write!(fmt, "capacity: need {}, have {}", required, available)
            }
            Self::SinkOverflow { needed, capacity } => {
                defmt::write!(fmt, "sink overflow: {}/{}", needed, capacity)
            }
            Self::Overrun => defmt::write!(fmt, "buffer overrun"),
            Self::Signer { stage, code } => {
                defmt::write!(fmt, "signer {} failed ({})", stage.name(), code)
            }
            Self::HeaderTermination => defmt::write!(fmt, "no end of header"),
            Self::InvalidState { reason } => defmt::write!(fmt, "invalid state: {}", reason),
            Self::BadConfig { reason } => defmt::write!(fmt, "bad config: {}", reason),
            Self::Aborted { reason } => defmt::write!(fmt, "aborted: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_copy_and_small() {
        // Returned across the ISR/worker boundary, so keep them small: a
        // &'static str reason plus the discriminant, nothing heap-bound
        assert!(core::mem::size_of::<IngestError>() <= 24);

        let e = IngestError::StorageIo {
            op: StorageOp::Write,
            requested: 4,
            actual: 2,
        };
        let e2 = e; // Copy
        assert_eq!(e, e2);
    }

    #[cfg(feature = "std")]
    #[test]
    fn display_names_operations() {
        let e = IngestError::StorageIo {
            op: StorageOp::Erase,
            requested: 4096,
            actual: 0,
        };
        let msg = std::format!("{}", e);
        assert!(msg.contains("erase"));
        assert!(msg.contains("4096"));
    }
}
