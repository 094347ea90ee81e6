//! Sample Frame Accumulator
//!
//! ## Overview
//!
//! The block store only guarantees correct programming semantics for 4-byte
//! word-aligned writes, but the capture path delivers byte runs of arbitrary
//! length. This accumulator sits between the two: it batches incoming bytes
//! into a single 4-byte word buffer and commits one word to storage each time
//! the buffer fills, at `cursor - 4 + header_offset`.
//!
//! ```text
//! accumulate(3 bytes)  ->  [a b c .]            no commit
//! accumulate(3 bytes)  ->  [a b c d] commit     [e f . .]
//! accumulate(2 bytes)  ->  [e f g h] commit
//! flush_tail()         ->  no-op (aligned)
//! ```
//!
//! The commit sequence is invariant under chunking: feeding the same bytes in
//! any split produces byte-identical storage writes.
//!
//! ## Tail Flush
//!
//! `flush_tail` is called exactly once at end of session. A short final word
//! is padded with `0xFF` (the erased-flash filler) and committed; when the
//! cursor is already word aligned it does nothing. The cursor only ever
//! increases - a new session gets a fresh accumulator.

use crate::errors::IngestResult;
use crate::storage::SampleStorage;

/// Word-batching writer for the sample region
#[derive(Debug, Clone, Copy)]
pub struct WordAccumulator {
    word: [u8; 4],
    cursor: u32,
    header_offset: u32,
}

impl WordAccumulator {
    /// New accumulator committing relative to `header_offset`
    pub const fn new(header_offset: u32) -> Self {
        Self {
            word: [0; 4],
            cursor: 0,
            header_offset,
        }
    }

    /// Bytes accepted so far (committed or pending in the word buffer)
    pub const fn cursor(&self) -> u32 {
        self.cursor
    }

    /// True if no partial word is pending
    pub const fn is_aligned(&self) -> bool {
        self.cursor & 0x3 == 0
    }

    /// Accept `bytes`, committing every completed 4-byte word
    ///
    /// Returns the number of bytes consumed (always all of them unless the
    /// storage fails, which is session-fatal anyway).
    pub fn accumulate<S: SampleStorage>(
        &mut self,
        storage: &mut S,
        bytes: &[u8],
    ) -> IngestResult<usize> {
        for &b in bytes {
            self.word[(self.cursor & 0x3) as usize] = b;
            self.cursor += 1;

            if self.cursor & 0x3 == 0 {
                storage.try_write((self.cursor - 4) + self.header_offset, &self.word)?;
            }
        }

        Ok(bytes.len())
    }

    /// Pad and commit a pending partial word; no-op when word aligned
    ///
    /// Call exactly once, at end of session or on abort.
    pub fn flush_tail<S: SampleStorage>(&mut self, storage: &mut S) -> IngestResult<()> {
        let fill = (self.cursor & 0x3) as usize;
        if fill == 0 {
            return Ok(());
        }

        for slot in &mut self.word[fill..] {
            *slot = 0xFF;
        }
        storage.try_write((self.cursor & !0x3) + self.header_offset, &self.word)?;

        Ok(())
    }
}
