//! Streaming Signed Container Writer
//!
//! ## Overview
//!
//! Every recording session starts with a self-describing binary header in
//! block 0, followed by the raw word-aligned sample stream. The header is
//! CBOR: a top-level map carrying the signing parameters, a reserved
//! signature placeholder, and the payload metadata (device identity, sample
//! interval, axis/unit descriptions). Other tooling parses this exact layout,
//! so the bytes here are load-bearing.
//!
//! ```text
//! block 0: [ CBOR header | "Ref-BINARY-i16" marker | 0xFF padding ... ]
//! block 1+: raw little-endian i16 samples, word aligned
//! ```
//!
//! ## Why a hand-rolled emitter?
//!
//! Finalization patches the hex-encoded digest into the placeholder *after*
//! recording, so the writer must know the exact byte offset of the
//! placeholder inside the serialized stream. General-purpose CBOR libraries
//! don't surface that, and this header needs five encodings (maps, arrays,
//! text, unsigned, f32) - small enough to emit directly.
//!
//! ## Signing
//!
//! Every emitted byte also feeds the incremental signer, placeholder
//! included (as ASCII zeros). The reference marker appended after the header
//! passes through the signer too, before the header offset is fixed - the
//! digest therefore covers header-with-placeholder + marker + samples.
//!
//! ## End-of-header discovery
//!
//! The serialized header length is discovered by scanning the scratch buffer
//! backwards for the last non-zero byte, and the marker is appended right
//! after it. This convention requires the final emitted byte to be non-zero;
//! the payload map deliberately ends with the sensors' name/units text
//! strings so a zero tail (e.g. an f32 with a zero mantissa) can never be the
//! last byte. See DESIGN.md before "fixing" this.

use crate::errors::{IngestError, IngestResult};
use crate::signer::PayloadSigner;

/// Scratch buffer size for header serialization
///
/// The header must fit here in full; sessions fail cleanly if it doesn't.
pub const HEADER_SCRATCH: usize = 1024;

/// Payload-type tag appended after the header: raw binary i16 samples follow
pub const REF_MARKER: &[u8] = b"Ref-BINARY-i16";

/// The marker block pads the header end to this alignment (flash programming
/// granularity on the supported parts)
const REF_ALIGN: usize = 0x20;

/// Byte-stream sink the container writer emits into
pub trait ContainerSink {
    /// Write all of `bytes` or fail
    fn write_all(&mut self, bytes: &[u8]) -> IngestResult<()>;
}

/// Sink backed by a caller-provided fixed buffer
pub struct ScratchSink<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> ScratchSink<'a> {
    /// Wrap `buf`, writing from its start
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl ContainerSink for ScratchSink<'_> {
    fn write_all(&mut self, bytes: &[u8]) -> IngestResult<()> {
        if self.pos + bytes.len() > self.buf.len() {
            return Err(IngestError::SinkOverflow {
                needed: self.pos + bytes.len(),
                capacity: self.buf.len(),
            });
        }
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }
}

/// One measured axis: name plus unit tag
#[derive(Debug, Clone, Copy)]
pub struct SensorAxis<'a> {
    /// Axis name, e.g. `"audio"`
    pub name: &'a str,
    /// Unit tag, e.g. `"wav"`
    pub units: &'a str,
}

/// Metadata serialized into the container header
#[derive(Debug, Clone, Copy)]
pub struct PayloadInfo<'a> {
    /// Device identifier (MAC-style string)
    pub device_id: &'a str,
    /// Device type string
    pub device_type: &'a str,
    /// Interval between samples in milliseconds
    pub interval_ms: f32,
    /// Axis descriptions, at least one
    pub sensors: &'a [SensorAxis<'a>],
}

/// CBOR emitter that feeds every byte to both the sink and the signer
struct HeaderWriter<'w, K: ContainerSink, G: PayloadSigner> {
    sink: &'w mut K,
    signer: &'w mut G,
    written: usize,
}

impl<'w, K: ContainerSink, G: PayloadSigner> HeaderWriter<'w, K, G> {
    fn new(sink: &'w mut K, signer: &'w mut G) -> Self {
        Self {
            sink,
            signer,
            written: 0,
        }
    }

    fn emit(&mut self, bytes: &[u8]) -> IngestResult<()> {
        self.sink.write_all(bytes)?;
        self.signer.update(bytes)?;
        self.written += bytes.len();
        Ok(())
    }

    /// Major-type header: small values inline, larger ones length-prefixed
    fn type_header(&mut self, major: u8, value: u64) -> IngestResult<()> {
        let m = major << 5;
        if value < 24 {
            self.emit(&[m | value as u8])
        } else if value <= 0xFF {
            self.emit(&[m | 24, value as u8])
        } else if value <= 0xFFFF {
            let v = value as u16;
            self.emit(&[m | 25, (v >> 8) as u8, v as u8])
        } else {
            let v = value as u32;
            self.emit(&[m | 26, (v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8, v as u8])
        }
    }

    fn uint(&mut self, value: u64) -> IngestResult<()> {
        self.type_header(0, value)
    }

    fn text(&mut self, s: &str) -> IngestResult<()> {
        self.type_header(3, s.len() as u64)?;
        self.emit(s.as_bytes())
    }

    fn array(&mut self, len: usize) -> IngestResult<()> {
        self.type_header(4, len as u64)
    }

    fn map(&mut self, pairs: usize) -> IngestResult<()> {
        self.type_header(5, pairs as u64)
    }

    fn f32(&mut self, value: f32) -> IngestResult<()> {
        let b = value.to_bits();
        self.emit(&[0xFA, (b >> 24) as u8, (b >> 16) as u8, (b >> 8) as u8, b as u8])
    }
}

/// Serialize the container header through `sink`, updating `signer` with
/// every emitted byte
///
/// The signer must already be keyed (`init`). Returns the stream offset of
/// the signature placeholder's first byte; the placeholder spans exactly
/// `2 * signer.digest_len()` ASCII `'0'` characters for the hex-encoded
/// digest patched in at finalization.
pub fn write_header<K: ContainerSink, G: PayloadSigner>(
    sink: &mut K,
    signer: &mut G,
    info: &PayloadInfo<'_>,
) -> IngestResult<usize> {
    const PLACEHOLDER: [u8; 64] = [b'0'; 64];

    let placeholder_len = 2 * signer.digest_len();
    debug_assert!(placeholder_len <= PLACEHOLDER.len());

    let mut w = HeaderWriter::new(sink, signer);

    w.map(3)?;

    w.text("protected")?;
    w.map(3)?;
    w.text("ver")?;
    w.text("v1")?;
    w.text("alg")?;
    let alg = w.signer.algorithm();
    w.text(alg)?;
    w.text("iat")?;
    // No wall clock on-device; kept for layout compatibility
    w.uint(0)?;

    w.text("signature")?;
    w.type_header(3, placeholder_len as u64)?;
    let signature_index = w.written;
    w.emit(&PLACEHOLDER[..placeholder_len])?;

    w.text("payload")?;
    w.map(4)?;
    w.text("device_name")?;
    w.text(info.device_id)?;
    w.text("device_type")?;
    w.text(info.device_type)?;
    w.text("interval_ms")?;
    w.f32(info.interval_ms)?;
    // Sensors last: the scan below needs a non-zero final byte
    w.text("sensors")?;
    w.array(info.sensors.len())?;
    for axis in info.sensors {
        w.map(2)?;
        w.text("name")?;
        w.text(axis.name)?;
        w.text("units")?;
        w.text(axis.units)?;
    }

    Ok(signature_index)
}

/// Locate the end of the serialized header in `scratch` and append the
/// reference marker after it, feeding the marker through the signer
///
/// The marker is a CBOR text string (`0x78`, length, "Ref-BINARY-i16", space
/// padding) closed by a `0xFF` break, sized so the header end lands on a
/// 32-byte boundary. Returns the final header offset: sample data starts
/// there.
pub fn append_reference<G: PayloadSigner>(
    scratch: &mut [u8],
    signer: &mut G,
) -> IngestResult<u32> {
    // Header length is only known after serialization: scan for the last
    // non-zero byte of the scratch buffer
    let end = match scratch.iter().rposition(|&b| b != 0) {
        Some(ix) => ix + 1,
        None => return Err(IngestError::HeaderTermination),
    };

    let padding = {
        let unpadded = end + 3 + REF_MARKER.len();
        if unpadded % REF_ALIGN != 0 {
            REF_ALIGN - unpadded % REF_ALIGN
        } else {
            0
        }
    };
    let marker_len = 2 + REF_MARKER.len() + padding + 1;
    if end + marker_len > scratch.len() {
        return Err(IngestError::SinkOverflow {
            needed: end + marker_len,
            capacity: scratch.len(),
        });
    }

    let mut pos = end;
    scratch[pos] = 0x78;
    pos += 1;
    scratch[pos] = (REF_MARKER.len() + padding) as u8;
    pos += 1;
    scratch[pos..pos + REF_MARKER.len()].copy_from_slice(REF_MARKER);
    pos += REF_MARKER.len();
    scratch[pos..pos + padding].fill(b' ');
    pos += padding;
    scratch[pos] = 0xFF;
    pos += 1;

    signer.update(&scratch[end..pos])?;

    Ok(pos as u32)
}

/// Hex-encode `digest` into `out`, two lowercase ASCII characters per byte
///
/// Nibble mapping: 0-9 -> '0'..'9', 10-15 -> 'a'..'f'. Arithmetic encoding
/// rather than a formatter keeps it identical on every libc/target.
pub fn hex_encode(digest: &[u8], out: &mut [u8]) -> IngestResult<()> {
    if out.len() < digest.len() * 2 {
        return Err(IngestError::SinkOverflow {
            needed: digest.len() * 2,
            capacity: out.len(),
        });
    }

    for (ix, &byte) in digest.iter().enumerate() {
        let first = (byte >> 4) & 0xF;
        let second = byte & 0xF;

        out[ix * 2] = if first >= 10 { 87 + first } else { 48 + first };
        out[ix * 2 + 1] = if second >= 10 { 87 + second } else { 48 + second };
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::NullSigner;

    fn test_info() -> PayloadInfo<'static> {
        static AXES: [SensorAxis<'static>; 1] = [SensorAxis {
            name: "audio",
            units: "wav",
        }];
        PayloadInfo {
            device_id: "aa:bb:cc:dd:ee:ff",
            device_type: "TEST-BOARD",
            interval_ms: 0.0625,
            sensors: &AXES,
        }
    }

    #[test]
    fn hex_encodes_lowercase() {
        let mut out = [0u8; 6];
        hex_encode(&[0x00, 0x9A, 0xFF], &mut out).unwrap();
        assert_eq!(&out, b"009aff");
    }

    #[test]
    fn hex_rejects_short_output() {
        let mut out = [0u8; 5];
        let err = hex_encode(&[0x00, 0x9A, 0xFF], &mut out).unwrap_err();
        assert!(matches!(err, IngestError::SinkOverflow { needed: 6, .. }));
    }

    #[test]
    fn placeholder_spans_twice_digest_len() {
        let mut scratch = [0u8; HEADER_SCRATCH];
        let mut signer = NullSigner::new();
        signer.init(b"key").unwrap();

        let mut sink = ScratchSink::new(&mut scratch);
        let sig_ix = write_header(&mut sink, &mut signer, &test_info()).unwrap();
        let len = sink.position();

        let span = 2 * signer.digest_len();
        assert!(sig_ix + span <= len);
        assert!(scratch[sig_ix..sig_ix + span].iter().all(|&b| b == b'0'));
        // Byte before the placeholder is the tail of its CBOR text header
        assert_eq!(scratch[sig_ix - 1], span as u8);
    }

    #[test]
    fn every_header_byte_is_signed() {
        let mut scratch = [0u8; HEADER_SCRATCH];
        let mut signer = NullSigner::new();
        signer.init(b"key").unwrap();

        let mut sink = ScratchSink::new(&mut scratch);
        write_header(&mut sink, &mut signer, &test_info()).unwrap();
        let header_len = sink.position();
        assert_eq!(signer.bytes_signed(), header_len);

        let offset = append_reference(&mut scratch, &mut signer).unwrap() as usize;
        assert_eq!(signer.bytes_signed(), offset);
    }

    #[test]
    fn reference_marker_aligns_header_end() {
        let mut scratch = [0u8; HEADER_SCRATCH];
        let mut signer = NullSigner::new();
        signer.init(b"key").unwrap();

        let mut sink = ScratchSink::new(&mut scratch);
        write_header(&mut sink, &mut signer, &test_info()).unwrap();
        let header_len = sink.position();

        let offset = append_reference(&mut scratch, &mut signer).unwrap() as usize;

        assert_eq!(offset % 0x20, 0);
        assert!(offset > header_len);
        assert_eq!(scratch[offset - 1], 0xFF);
        assert_eq!(scratch[header_len], 0x78);
        let text = &scratch[header_len + 2..offset - 1];
        assert!(text.starts_with(REF_MARKER));
        assert!(text[REF_MARKER.len()..].iter().all(|&b| b == b' '));
    }

    #[test]
    fn empty_scratch_has_no_header_end() {
        let mut scratch = [0u8; 64];
        let mut signer = NullSigner::new();
        assert_eq!(
            append_reference(&mut scratch, &mut signer).unwrap_err(),
            IngestError::HeaderTermination
        );
    }
}
