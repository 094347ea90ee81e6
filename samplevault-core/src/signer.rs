//! Incremental Payload Signer Interface
//!
//! The container format carries a MAC over the serialized header and every
//! sample byte that follows it. The primitive itself (HMAC-SHA256 in the
//! companion `samplevault-signing` crate, something else on parts with a
//! crypto peripheral) is opaque to the pipeline: all it needs is an
//! incremental init/update/finish surface and a fixed digest length.
//!
//! The digest is stored hex-encoded inside the header, so the reserved
//! placeholder is `2 * digest_len()` bytes - that relationship is what the
//! container writer builds around.

use crate::errors::IngestResult;

/// Largest digest any signer may produce (SHA-256 sized)
///
/// Fixed buffers holding a digest are dimensioned with this, so a signer
/// reporting a larger `digest_len()` is a contract violation.
pub const MAX_DIGEST_LEN: usize = 32;

/// Incremental signer collaborator
///
/// The pipeline drives it in strict order: one `init`, any number of
/// `update`s (header bytes first, then sample bytes in stream order), one
/// `finish`. Errors at any stage abort the session before finalization
/// touches storage.
pub trait PayloadSigner {
    /// Key the signer and reset its running state
    fn init(&mut self, key: &[u8]) -> IngestResult<()>;

    /// Absorb the next run of payload bytes
    fn update(&mut self, data: &[u8]) -> IngestResult<()>;

    /// Produce the digest into `digest` (exactly `digest_len()` bytes)
    fn finish(&mut self, digest: &mut [u8]) -> IngestResult<()>;

    /// Digest size in bytes, fixed per algorithm
    fn digest_len(&self) -> usize;

    /// Algorithm tag written into the container's protected header
    fn algorithm(&self) -> &'static str;
}

/// Signer that produces an all-zero digest
///
/// Keeps the container layout (placeholder span, signed-byte accounting)
/// intact in tests that don't care about the MAC itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSigner {
    bytes_signed: usize,
}

impl NullSigner {
    /// New unkeyed null signer
    pub const fn new() -> Self {
        Self { bytes_signed: 0 }
    }

    /// How many bytes passed through `update` since `init`
    pub fn bytes_signed(&self) -> usize {
        self.bytes_signed
    }
}

impl PayloadSigner for NullSigner {
    fn init(&mut self, _key: &[u8]) -> IngestResult<()> {
        self.bytes_signed = 0;
        Ok(())
    }

    fn update(&mut self, data: &[u8]) -> IngestResult<()> {
        self.bytes_signed += data.len();
        Ok(())
    }

    fn finish(&mut self, digest: &mut [u8]) -> IngestResult<()> {
        for b in digest.iter_mut().take(self.digest_len()) {
            *b = 0;
        }
        Ok(())
    }

    fn digest_len(&self) -> usize {
        MAX_DIGEST_LEN
    }

    fn algorithm(&self) -> &'static str {
        "NONE"
    }
}
