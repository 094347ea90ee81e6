//! Non-Volatile Block Store Interface
//!
//! ## Overview
//!
//! The pipeline persists sample containers onto a byte-addressable window of
//! raw flash. The flash driver itself (IAP, QSPI, external NOR) lives outside
//! this crate; what we define here is the contract the pipeline relies on:
//!
//! - addresses are relative to a base offset fixed when the collaborator is
//!   constructed (after the reserved firmware/config region),
//! - write addresses and lengths must be 4-byte word aligned - aligned **by
//!   the caller**, which is why the frame accumulator exists,
//! - erase lengths must be sector aligned,
//! - every primitive returns the number of bytes done, `0` on failure. A
//!   short count is always fatal for the calling session.
//!
//! ## Geometry
//!
//! Block size, device capacity and the reserved-region size are read once at
//! construction and immutable afterwards. All alignment and erase-span
//! arithmetic in the pipeline derives from [`StorageGeometry`].
//!
//! ## Host Testing
//!
//! [`RamFlash`] models NOR-flash semantics in memory (erase -> `0xFF`,
//! alignment enforcement, fault injection) so the whole record/finalize cycle
//! runs in ordinary unit tests.

use crate::errors::{IngestError, IngestResult, StorageOp};

/// Align `n` up to the next 4-byte word boundary
pub const fn word_align(n: u32) -> u32 {
    if n & 0x3 != 0 {
        (n & !0x3) + 0x4
    } else {
        n
    }
}

/// Align `n` up to the next multiple of `unit` (power of two)
pub const fn align_to(n: u32, unit: u32) -> u32 {
    assert!(unit.is_power_of_two());
    if n & (unit - 1) != 0 {
        (n & !(unit - 1)) + unit
    } else {
        n
    }
}

/// Storage geometry, fixed at device construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageGeometry {
    /// Physical sector size in bytes (erase granularity)
    pub block_size: u32,
    /// Total blocks in the sample window
    pub memory_blocks: u32,
    /// Blocks reserved at the front for device configuration
    pub used_blocks: u32,
}

impl StorageGeometry {
    /// Blocks usable for sample containers
    pub const fn available_sample_blocks(&self) -> u32 {
        self.memory_blocks - self.used_blocks
    }

    /// Bytes usable for sample data
    ///
    /// Reserves one block for the container header plus overhead, matching
    /// what the session pre-erase assumes.
    pub const fn available_sample_bytes(&self) -> u32 {
        (self.available_sample_blocks() - 1) * self.block_size
    }
}

/// Block store collaborator used by the pipeline
///
/// Implementations wrap the actual flash driver. The raw primitives keep the
/// bytes-done return convention of such drivers; the `try_*` wrappers turn a
/// short count into the session-fatal [`IngestError::StorageIo`].
pub trait SampleStorage {
    /// Geometry of the sample window
    fn geometry(&self) -> StorageGeometry;

    /// Read `buf.len()` bytes starting at `address`. Returns bytes read, 0 on
    /// failure.
    fn read(&mut self, address: u32, buf: &mut [u8]) -> usize;

    /// Program `data` at `address`. Address and length must be word aligned.
    /// Returns bytes written, 0 on failure.
    fn write(&mut self, address: u32, data: &[u8]) -> usize;

    /// Erase `len` bytes starting at `address`. Length must be sector
    /// aligned. Returns bytes erased, 0 on failure.
    fn erase(&mut self, address: u32, len: u32) -> usize;

    /// Read with short-count checking
    fn try_read(&mut self, address: u32, buf: &mut [u8]) -> IngestResult<()> {
        let requested = buf.len() as u32;
        let actual = self.read(address, buf) as u32;
        if actual != requested {
            return Err(IngestError::StorageIo {
                op: StorageOp::Read,
                requested,
                actual,
            });
        }
        Ok(())
    }

    /// Write with short-count checking
    fn try_write(&mut self, address: u32, data: &[u8]) -> IngestResult<()> {
        let requested = data.len() as u32;
        let actual = self.write(address, data) as u32;
        if actual != requested {
            return Err(IngestError::StorageIo {
                op: StorageOp::Write,
                requested,
                actual,
            });
        }
        Ok(())
    }

    /// Erase with short-count checking
    fn try_erase(&mut self, address: u32, len: u32) -> IngestResult<()> {
        let actual = self.erase(address, len) as u32;
        if actual != len {
            return Err(IngestError::StorageIo {
                op: StorageOp::Erase,
                requested: len,
                actual,
            });
        }
        Ok(())
    }
}

/// In-memory NOR-flash model for host-side tests
///
/// Behaves like the real sample window:
/// - erase fills the span with `0xFF`,
/// - writes must be word aligned (address and length) or fail outright,
/// - erases must be sector aligned or fail outright,
/// - sample addresses are relative to the end of the reserved config region.
///
/// Fault injection covers the failure modes the sessions must survive: a
/// forced short write
/// and a hard failure after N writes.
#[cfg(feature = "std")]
pub struct RamFlash {
    mem: Vec<u8>,
    geometry: StorageGeometry,
    base: u32,
    short_next_write: Option<usize>,
    fail_writes_after: Option<u32>,
    writes_done: u32,
}

#[cfg(feature = "std")]
impl RamFlash {
    /// Create a sample window of `memory_blocks` sectors of `block_size`
    /// bytes, with `config_bytes` reserved at the front
    pub fn new(block_size: u32, memory_blocks: u32, config_bytes: u32) -> Self {
        let used_blocks = if config_bytes == 0 {
            0
        } else {
            align_to(config_bytes, block_size) / block_size
        };
        let total = block_size * memory_blocks;
        Self {
            mem: vec![0xFF; total as usize],
            geometry: StorageGeometry {
                block_size,
                memory_blocks,
                used_blocks,
            },
            base: used_blocks * block_size,
            short_next_write: None,
            fail_writes_after: None,
            writes_done: 0,
        }
    }

    /// Force the next write to report `reported` bytes done
    pub fn short_next_write(&mut self, reported: usize) {
        self.short_next_write = Some(reported);
    }

    /// Make every write after the first `n` fail outright (report 0)
    pub fn fail_writes_after(&mut self, n: u32) {
        self.fail_writes_after = Some(n);
    }

    /// Raw view of the sample window, relative address 0 onward
    pub fn sample_bytes(&self) -> &[u8] {
        &self.mem[self.base as usize..]
    }

    fn in_bounds(&self, address: u32, len: usize) -> bool {
        (self.base + address) as usize + len <= self.mem.len()
    }
}

#[cfg(feature = "std")]
impl SampleStorage for RamFlash {
    fn geometry(&self) -> StorageGeometry {
        self.geometry
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> usize {
        if !self.in_bounds(address, buf.len()) {
            return 0;
        }
        let start = (self.base + address) as usize;
        buf.copy_from_slice(&self.mem[start..start + buf.len()]);
        buf.len()
    }

    fn write(&mut self, address: u32, data: &[u8]) -> usize {
        if let Some(reported) = self.short_next_write.take() {
            return reported;
        }
        if let Some(limit) = self.fail_writes_after {
            if self.writes_done >= limit {
                return 0;
            }
        }
        // Word alignment is the caller's job; surface violations as failure
        if address & 0x3 != 0 || data.len() & 0x3 != 0 {
            return 0;
        }
        if !self.in_bounds(address, data.len()) {
            return 0;
        }
        let start = (self.base + address) as usize;
        self.mem[start..start + data.len()].copy_from_slice(data);
        self.writes_done += 1;
        data.len()
    }

    fn erase(&mut self, address: u32, len: u32) -> usize {
        let bs = self.geometry.block_size;
        if address & (bs - 1) != 0 || len & (bs - 1) != 0 {
            return 0;
        }
        if !self.in_bounds(address, len as usize) {
            return 0;
        }
        let start = (self.base + address) as usize;
        self.mem[start..start + len as usize].fill(0xFF);
        len as usize
    }
}
