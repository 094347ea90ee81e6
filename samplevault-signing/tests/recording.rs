//! End-to-end recording with a real HMAC-SHA256 signer
//!
//! Runs a full session over the in-memory flash model, then verifies the
//! container from the outside: recompute the HMAC over the header (with the
//! placeholder restored to zeros), the reference marker, and the sample
//! bytes, and compare it against the hex digest patched into block 0.

use samplevault_core::capture::ScriptedCapture;
use samplevault_core::device::DeviceContext;
use samplevault_core::session::{Recorder, SampleConfig};
use samplevault_core::storage::RamFlash;
use samplevault_signing::HmacSha256;

use sha2::{Digest, Sha256};

const BLOCK_SIZE: u32 = 4096;
const DIGEST_LEN: usize = 32;

/// Reference HMAC-SHA256, independent of the signer under test
fn reference_hmac(key: &[u8], data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut block_key = [0u8; 64];
    if key.len() > 64 {
        block_key[..DIGEST_LEN].copy_from_slice(&Sha256::digest(key));
    } else {
        block_key[..key.len()].copy_from_slice(key);
    }

    let mut inner = Sha256::new();
    inner.update(block_key.map(|b| b ^ 0x36));
    inner.update(data);
    let inner_digest = inner.finalize();

    let mut outer = Sha256::new();
    outer.update(block_key.map(|b| b ^ 0x5C));
    outer.update(inner_digest);

    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&outer.finalize());
    out
}

fn hex(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Placeholder location: the 64 hex chars follow the CBOR text key
/// "signature" and the placeholder's own two-byte text header
fn signature_span(block: &[u8]) -> std::ops::Range<usize> {
    let key = b"\x69signature";
    let at = block
        .windows(key.len())
        .position(|w| w == key)
        .expect("signature key not found in header");
    let start = at + key.len() + 2;
    start..start + 2 * DIGEST_LEN
}

#[test]
fn recorded_container_verifies() {
    let mut flash = RamFlash::new(BLOCK_SIZE, 32, 0);
    let mut signer = HmacSha256::new();
    let mut device = DeviceContext::new("aa:bb:cc:dd:ee:ff", "VAULT-H7").unwrap();

    let config = SampleConfig {
        length_ms: 100,
        interval_ms: 1.0,
        label: "verify",
        hmac_key: "0123456789abcdef",
    };

    let mut source = ScriptedCapture::new(1_000);
    source.push_ramp(config.samples_required() as usize, 17);

    let summary = {
        let mut recorder = Recorder::new(&mut flash, &mut signer, &mut device);
        recorder.run(&config, &mut source).unwrap()
    };
    assert_eq!(summary.bytes_collected, 200);

    let stored = flash.sample_bytes();
    let header_offset = summary.header_offset as usize;
    let sig = signature_span(stored);
    assert!(sig.end <= header_offset);

    // The signed message is the header as it was during recording: the
    // placeholder as ASCII zeros, then the sample stream
    let mut message = stored[..header_offset].to_vec();
    message[sig.clone()].fill(b'0');
    message.extend_from_slice(
        &stored[header_offset..header_offset + summary.bytes_collected as usize],
    );

    let expected = reference_hmac(config.hmac_key.as_bytes(), &message);
    let patched = std::str::from_utf8(&stored[sig]).unwrap();
    assert_eq!(patched, hex(&expected));
}

#[test]
fn different_keys_give_different_digests() {
    let run = |key: &'static str| -> String {
        let mut flash = RamFlash::new(BLOCK_SIZE, 32, 0);
        let mut signer = HmacSha256::new();
        let mut device = DeviceContext::new("aa:bb:cc:dd:ee:ff", "VAULT-H7").unwrap();

        let config = SampleConfig {
            length_ms: 10,
            interval_ms: 1.0,
            label: "keyed",
            hmac_key: key,
        };
        let mut source = ScriptedCapture::new(1_000);
        source.push_ramp(config.samples_required() as usize, 4);

        let mut recorder = Recorder::new(&mut flash, &mut signer, &mut device);
        recorder.run(&config, &mut source).unwrap();
        drop(recorder);

        let stored = flash.sample_bytes();
        let sig = signature_span(stored);
        std::str::from_utf8(&stored[sig]).unwrap().to_string()
    };

    assert_ne!(run("key-one"), run("key-two"));
}
