//! HMAC-SHA256 payload signer for samplevault containers
//!
//! Software implementation of the [`PayloadSigner`] contract over `sha2`.
//! Parts with a crypto peripheral can supply their own signer instead; the
//! pipeline only sees the trait.
//!
//! The construction is RFC 2104 over SHA-256's 64-byte block: keys longer
//! than a block are hashed first, shorter ones zero-padded, then the usual
//! ipad/opad sandwich. Kept incremental so sample bytes feed the inner hash
//! as they stream - nothing buffers the payload.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

use sha2::{Digest, Sha256};

use samplevault_core::errors::{IngestError, IngestResult, SignerStage};
use samplevault_core::signer::PayloadSigner;

const BLOCK_LEN: usize = 64;
const DIGEST_LEN: usize = 32;

/// Signer-specific failure code: a call arrived before `init`
const CODE_UNKEYED: i32 = -1;
/// Signer-specific failure code: output buffer has the wrong length
const CODE_BAD_OUTPUT: i32 = -2;

/// Incremental HMAC-SHA256 signer
///
/// Drive in strict order: `init` once, `update` per payload run, `finish`
/// once. `finish` consumes the keying; re-`init` for the next session.
pub struct HmacSha256 {
    inner: Sha256,
    opad_block: [u8; BLOCK_LEN],
    keyed: bool,
}

impl HmacSha256 {
    /// New unkeyed signer
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
            opad_block: [0; BLOCK_LEN],
            keyed: false,
        }
    }
}

impl Default for HmacSha256 {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadSigner for HmacSha256 {
    fn init(&mut self, key: &[u8]) -> IngestResult<()> {
        // Long keys are hashed down to digest size first
        let mut block_key = [0u8; BLOCK_LEN];
        if key.len() > BLOCK_LEN {
            let digest = Sha256::digest(key);
            block_key[..DIGEST_LEN].copy_from_slice(&digest);
        } else {
            block_key[..key.len()].copy_from_slice(key);
        }

        let mut ipad_block = [0u8; BLOCK_LEN];
        for ix in 0..BLOCK_LEN {
            ipad_block[ix] = block_key[ix] ^ 0x36;
            self.opad_block[ix] = block_key[ix] ^ 0x5C;
        }

        self.inner = Sha256::new();
        self.inner.update(ipad_block);
        self.keyed = true;
        Ok(())
    }

    fn update(&mut self, data: &[u8]) -> IngestResult<()> {
        if !self.keyed {
            return Err(IngestError::Signer {
                stage: SignerStage::Update,
                code: CODE_UNKEYED,
            });
        }
        self.inner.update(data);
        Ok(())
    }

    fn finish(&mut self, digest: &mut [u8]) -> IngestResult<()> {
        if !self.keyed {
            return Err(IngestError::Signer {
                stage: SignerStage::Finish,
                code: CODE_UNKEYED,
            });
        }
        if digest.len() != DIGEST_LEN {
            return Err(IngestError::Signer {
                stage: SignerStage::Finish,
                code: CODE_BAD_OUTPUT,
            });
        }

        let inner = core::mem::replace(&mut self.inner, Sha256::new());
        let inner_digest = inner.finalize();

        let mut outer = Sha256::new();
        outer.update(self.opad_block);
        outer.update(inner_digest);
        digest.copy_from_slice(&outer.finalize());

        self.keyed = false;
        Ok(())
    }

    fn digest_len(&self) -> usize {
        DIGEST_LEN
    }

    fn algorithm(&self) -> &'static str {
        "HS256"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hmac(key: &[u8], data: &[u8]) -> [u8; DIGEST_LEN] {
        let mut signer = HmacSha256::new();
        signer.init(key).unwrap();
        signer.update(data).unwrap();
        let mut digest = [0u8; DIGEST_LEN];
        signer.finish(&mut digest).unwrap();
        digest
    }

    fn unhex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|ix| u8::from_str_radix(&s[ix..ix + 2], 16).unwrap())
            .collect()
    }

    // RFC 4231 test vectors

    #[test]
    fn rfc4231_case_1() {
        let digest = hmac(&[0x0B; 20], b"Hi There");
        assert_eq!(
            digest.as_slice(),
            unhex("b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7")
        );
    }

    #[test]
    fn rfc4231_case_2() {
        let digest = hmac(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            digest.as_slice(),
            unhex("5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843")
        );
    }

    #[test]
    fn rfc4231_case_6_long_key() {
        let digest = hmac(
            &[0xAA; 131],
            b"Test Using Larger Than Block-Size Key - Hash Key First",
        );
        assert_eq!(
            digest.as_slice(),
            unhex("60e431591ee0b67f0d8a26aacbf5b77f8e0bc6213728c5140546040f0ee37f54")
        );
    }

    #[test]
    fn incremental_matches_one_shot() {
        let data = b"incremental updates must not change the digest";
        let one_shot = hmac(b"key", data);

        let mut signer = HmacSha256::new();
        signer.init(b"key").unwrap();
        for chunk in data.chunks(7) {
            signer.update(chunk).unwrap();
        }
        let mut digest = [0u8; DIGEST_LEN];
        signer.finish(&mut digest).unwrap();

        assert_eq!(digest, one_shot);
    }

    #[test]
    fn update_before_init_is_rejected() {
        let mut signer = HmacSha256::new();
        let err = signer.update(b"data").unwrap_err();
        assert!(matches!(
            err,
            IngestError::Signer {
                stage: SignerStage::Update,
                code: CODE_UNKEYED,
            }
        ));
    }

    #[test]
    fn finish_rejects_wrong_output_size() {
        let mut signer = HmacSha256::new();
        signer.init(b"key").unwrap();
        let mut short = [0u8; 16];
        let err = signer.finish(&mut short).unwrap_err();
        assert!(matches!(
            err,
            IngestError::Signer {
                stage: SignerStage::Finish,
                code: CODE_BAD_OUTPUT,
            }
        ));
    }

    #[test]
    fn reinit_resets_state() {
        let mut signer = HmacSha256::new();
        signer.init(b"key").unwrap();
        signer.update(b"garbage from a previous session").unwrap();

        signer.init(b"key").unwrap();
        signer.update(b"Hi There").unwrap();
        let mut digest = [0u8; DIGEST_LEN];
        signer.finish(&mut digest).unwrap();

        assert_eq!(digest, hmac(b"key", b"Hi There"));
    }
}
