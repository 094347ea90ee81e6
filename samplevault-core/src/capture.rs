//! Sensor Capture Source Interface
//!
//! ## Overview
//!
//! The sensor front-end (PDM microphone, camera DMA, ADC) lives outside this
//! crate. What the pipeline sees is a data-ready notification plus two calls:
//! how many samples are waiting, and a copy-out into a caller buffer. There
//! is **no back-pressure**: the hardware keeps producing whether or not the
//! pipeline keeps up, so the acquisition scheduler must drain every
//! notification or accept the drop.
//!
//! [`ScriptedCapture`] replays canned chunks on the host so the whole
//! pipeline runs deterministically in tests - push the chunks a session
//! should see, then pump `data_ready` once per chunk.

/// Capture collaborator: a source of 16-bit samples
pub trait CaptureSource {
    /// Samples waiting in the hardware/DMA buffer
    fn available(&mut self) -> usize;

    /// Copy out up to `buf.len()` samples; returns samples copied
    ///
    /// Must not block: this runs in the data-ready (interrupt) context.
    fn read(&mut self, buf: &mut [i16]) -> usize;

    /// Nominal sample rate in Hz
    fn sample_rate_hz(&self) -> u32;
}

/// Deterministic replay source for host tests
///
/// Chunks are delivered one per `read` call, mimicking a DMA buffer that
/// refills between data-ready interrupts.
#[cfg(feature = "std")]
pub struct ScriptedCapture {
    chunks: std::collections::VecDeque<Vec<i16>>,
    sample_rate_hz: u32,
}

#[cfg(feature = "std")]
impl ScriptedCapture {
    /// Empty source with the given nominal rate
    pub fn new(sample_rate_hz: u32) -> Self {
        Self {
            chunks: std::collections::VecDeque::new(),
            sample_rate_hz,
        }
    }

    /// Queue one data-ready chunk
    pub fn push_chunk(&mut self, samples: &[i16]) {
        self.chunks.push_back(samples.to_vec());
    }

    /// Queue `total` samples of a counting ramp split into `chunk` sized
    /// deliveries (last one short if needed)
    pub fn push_ramp(&mut self, total: usize, chunk: usize) {
        let mut produced = 0usize;
        while produced < total {
            let n = chunk.min(total - produced);
            let samples: Vec<i16> = (0..n).map(|i| (produced + i) as i16).collect();
            self.chunks.push_back(samples);
            produced += n;
        }
    }

    /// Chunks not yet delivered
    pub fn pending(&self) -> usize {
        self.chunks.len()
    }
}

#[cfg(feature = "std")]
impl CaptureSource for ScriptedCapture {
    fn available(&mut self) -> usize {
        self.chunks.front().map_or(0, |c| c.len())
    }

    fn read(&mut self, buf: &mut [i16]) -> usize {
        let Some(chunk) = self.chunks.pop_front() else {
            return 0;
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        n
    }

    fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn replays_chunks_in_order() {
        let mut source = ScriptedCapture::new(16_000);
        source.push_chunk(&[1, 2, 3]);
        source.push_chunk(&[4]);

        let mut buf = [0i16; 8];
        assert_eq!(source.available(), 3);
        assert_eq!(source.read(&mut buf), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);

        assert_eq!(source.read(&mut buf), 1);
        assert_eq!(buf[0], 4);

        assert_eq!(source.available(), 0);
        assert_eq!(source.read(&mut buf), 0);
    }

    #[test]
    fn ramp_splits_into_chunks() {
        let mut source = ScriptedCapture::new(16_000);
        source.push_ramp(10, 4);
        assert_eq!(source.pending(), 3); // 4 + 4 + 2

        let mut buf = [0i16; 16];
        let mut collected = Vec::new();
        while source.available() > 0 {
            let n = source.read(&mut buf);
            collected.extend_from_slice(&buf[..n]);
        }
        let expected: Vec<i16> = (0..10).collect();
        assert_eq!(collected, expected);
    }
}
