//! Recording Session Orchestration
//!
//! ## Overview
//!
//! A session walks one fixed path: build and stage the signed header,
//! pre-erase the span the recording will occupy, stream samples through the
//! word accumulator while the signature accrues, then patch the finished
//! digest back into block 0. The [`Recorder`] owns that sequencing and the
//! state machine around it; the collaborators (storage, signer, capture
//! source, device context) are borrowed, never constructed here.
//!
//! ```text
//! Idle -> Armed -> Recording -> Finalizing -> Idle
//!   arm()    run()      target hit    digest patched
//! ```
//!
//! States only move forward within a session. Any error - short storage
//! count, signer failure, exhausted source - drops the session back to
//! `Idle` with no retry; flash writes are not safely re-enterable mid-word.
//!
//! ## Pre-Erase
//!
//! NOR flash programs by clearing bits, so the entire span a session will
//! touch is erased up front: `align_to(header_offset + sample_bytes,
//! block_size)`. The record consumer clamps to the sample target, which is
//! what makes this bound exact. Capacity is checked before the erase - a
//! session that cannot fit never touches the hardware.
//!
//! ## Finalization
//!
//! The digest lands inside block 0, which by then also holds the first
//! sample bytes. The whole block is read back, the hex digest is written
//! over the reserved placeholder, and the block is erased and reprogrammed
//! in one piece. Nothing outside the placeholder changes.

use crate::acquisition::{Acquisition, ConsumeStatus, RecordConsumer, SCRATCH_SAMPLES};
use crate::capture::CaptureSource;
use crate::container::{
    append_reference, write_header, PayloadInfo, ScratchSink, SensorAxis, HEADER_SCRATCH,
};
use crate::device::{DeviceContext, DeviceState};
use crate::errors::{IngestError, IngestResult};
use crate::queue::QUEUE_DEPTH;
use crate::signer::{PayloadSigner, MAX_DIGEST_LEN};
use crate::storage::{align_to, SampleStorage};

/// Largest supported storage block size; the finalization read-back buffer
/// is dimensioned with this
pub const MAX_BLOCK_SIZE: usize = 4096;

/// Default axis set for a single-microphone device
pub const DEFAULT_AXES: &[SensorAxis<'static>] = &[SensorAxis {
    name: "audio",
    units: "wav",
}];

/// Session lifecycle; moves forward only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session staged
    #[default]
    Idle,
    /// Header staged and span erased, capture not yet running
    Armed,
    /// Samples streaming to storage
    Recording,
    /// Target reached, digest being patched into block 0
    Finalizing,
}

/// Parameters for one recording session
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleConfig<'a> {
    /// Requested recording length in milliseconds
    pub length_ms: u32,
    /// Interval between samples in milliseconds (1000 / rate)
    pub interval_ms: f32,
    /// Label attached to the recording by the operator
    pub label: &'a str,
    /// Signing key for this session
    pub hmac_key: &'a str,
}

impl SampleConfig<'_> {
    /// Sample count for this configuration, rounded up to even so the byte
    /// stream ends word aligned
    pub fn samples_required(&self) -> u32 {
        let n = (self.length_ms as f32 / self.interval_ms) as u32;
        n + (n & 1)
    }

    fn validate(&self) -> IngestResult<()> {
        if !(self.interval_ms > 0.0) {
            return Err(IngestError::BadConfig {
                reason: "interval_ms must be positive",
            });
        }
        if self.length_ms == 0 {
            return Err(IngestError::BadConfig {
                reason: "length_ms must be non-zero",
            });
        }
        if self.hmac_key.is_empty() {
            return Err(IngestError::BadConfig {
                reason: "hmac_key must not be empty",
            });
        }
        Ok(())
    }
}

/// What a completed session produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSummary {
    /// Sample bytes committed after the header
    pub bytes_collected: u32,
    /// Where sample data starts (header + reference marker, 32-byte aligned)
    pub header_offset: u32,
    /// Block-aligned span the session erased and may have written
    pub total_span: u32,
}

/// Session orchestrator binding storage, signer and device context together
pub struct Recorder<'a, S: SampleStorage, G: PayloadSigner> {
    storage: &'a mut S,
    signer: &'a mut G,
    device: &'a mut DeviceContext,
    axes: &'a [SensorAxis<'a>],
    state: SessionState,
    acquisition: Acquisition<SCRATCH_SAMPLES, QUEUE_DEPTH>,
    header: [u8; HEADER_SCRATCH],
    signature_index: usize,
    header_offset: u32,
    required_bytes: u32,
    total_span: u32,
}

impl<'a, S: SampleStorage, G: PayloadSigner> Recorder<'a, S, G> {
    /// New idle recorder over the given collaborators, default axis set
    pub fn new(storage: &'a mut S, signer: &'a mut G, device: &'a mut DeviceContext) -> Self {
        Self {
            storage,
            signer,
            device,
            axes: DEFAULT_AXES,
            state: SessionState::Idle,
            acquisition: Acquisition::new(),
            header: [0; HEADER_SCRATCH],
            signature_index: 0,
            header_offset: 0,
            required_bytes: 0,
            total_span: 0,
        }
    }

    /// Replace the axis descriptions written into the header
    pub fn with_axes(mut self, axes: &'a [SensorAxis<'a>]) -> Self {
        self.axes = axes;
        self
    }

    /// Current session state
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Stage a session: key the signer, build the header, pre-erase the
    /// span, write the header to block 0
    ///
    /// On success the recorder is `Armed` and sample data may start flowing
    /// via [`Recorder::run`]. Fails without touching storage when the
    /// configuration is unusable or the recording cannot fit.
    pub fn arm(&mut self, config: &SampleConfig<'_>) -> IngestResult<()> {
        if self.state != SessionState::Idle {
            return Err(IngestError::InvalidState {
                reason: "session already staged",
            });
        }
        config.validate()?;

        self.required_bytes = config.samples_required() * 2;
        self.signer.init(config.hmac_key.as_bytes())?;

        // Serialize into zeroed scratch; the end-of-header scan depends on
        // the zero tail
        self.header = [0; HEADER_SCRATCH];
        let info = PayloadInfo {
            device_id: self.device.id(),
            device_type: self.device.device_type(),
            interval_ms: config.interval_ms,
            sensors: self.axes,
        };
        let mut sink = ScratchSink::new(&mut self.header);
        self.signature_index = write_header(&mut sink, self.signer, &info)?;
        self.header_offset = append_reference(&mut self.header, self.signer)?;

        let geometry = self.storage.geometry();
        self.total_span = align_to(self.header_offset + self.required_bytes, geometry.block_size);
        let available = geometry.available_sample_blocks() * geometry.block_size;
        if self.total_span > available {
            return Err(IngestError::CapacityExceeded {
                required: self.total_span,
                available,
            });
        }

        self.device.set_state(DeviceState::ErasingFlash);
        log_info!(
            "Erasing {} bytes, expect ~{} ms",
            self.total_span,
            self.device.erase_time_ms(&geometry, self.total_span)
        );
        self.storage.try_erase(0, self.total_span)?;
        self.storage
            .try_write(0, &self.header[..self.header_offset as usize])?;

        self.state = SessionState::Armed;
        Ok(())
    }

    /// Run a full session to completion: arm, record, finalize
    ///
    /// Blocks until the configured sample count is stored and the digest is
    /// patched into block 0. Any error returns the recorder to `Idle`; a
    /// source that dries up before the target aborts with
    /// [`IngestError::Aborted`] after flushing the partial word.
    pub fn run(
        &mut self,
        config: &SampleConfig<'_>,
        source: &mut dyn CaptureSource,
    ) -> IngestResult<RecordSummary> {
        let result = self.run_inner(config, source);
        if result.is_err() {
            self.acquisition.disarm();
            self.state = SessionState::Idle;
            self.device.set_state(DeviceState::Idle);
        }
        result
    }

    fn run_inner(
        &mut self,
        config: &SampleConfig<'_>,
        source: &mut dyn CaptureSource,
    ) -> IngestResult<RecordSummary> {
        self.arm(config)?;

        log_info!(
            "Sampling: interval {} ms, length {} ms, label '{}', HMAC key '{}'",
            config.interval_ms,
            config.length_ms,
            config.label,
            config.hmac_key
        );

        self.state = SessionState::Recording;
        self.device.set_state(DeviceState::Sampling);
        self.acquisition.arm();

        let mut consumer = RecordConsumer::new(
            &mut *self.storage,
            &mut *self.signer,
            self.header_offset,
            self.required_bytes,
        );

        loop {
            let produced = self.acquisition.data_ready(source);
            if self.acquisition.service(&mut consumer)? == ConsumeStatus::Complete {
                break;
            }
            if produced == 0 && source.available() == 0 {
                // Source dried up below the target; leave storage consistent
                consumer.finish()?;
                return Err(IngestError::Aborted {
                    reason: "capture source exhausted",
                });
            }
        }

        consumer.finish()?;
        let bytes_collected = consumer.bytes_collected();
        drop(consumer);

        self.finalize()?;

        Ok(RecordSummary {
            bytes_collected,
            header_offset: self.header_offset,
            total_span: self.total_span,
        })
    }

    /// Patch the finished digest into the reserved placeholder in block 0
    fn finalize(&mut self) -> IngestResult<()> {
        self.state = SessionState::Finalizing;

        let mut digest = [0u8; MAX_DIGEST_LEN];
        let digest_len = self.signer.digest_len();
        self.signer.finish(&mut digest[..digest_len])?;

        let block_size = self.storage.geometry().block_size as usize;
        let mut block: heapless::Vec<u8, MAX_BLOCK_SIZE> = heapless::Vec::new();
        if block.resize(block_size, 0).is_err() {
            return Err(IngestError::SinkOverflow {
                needed: block_size,
                capacity: MAX_BLOCK_SIZE,
            });
        }

        // Block 0 already holds the first sample bytes too; rewrite it whole
        self.storage.try_read(0, &mut block)?;
        hex_patch(&mut block, self.signature_index, &digest[..digest_len])?;
        self.storage.try_erase(0, block_size as u32)?;
        self.storage.try_write(0, &block)?;

        self.state = SessionState::Idle;
        self.device.set_state(DeviceState::Idle);
        Ok(())
    }

    /// Network upload is out of scope on this build; report where the
    /// container sits instead
    pub fn finish_and_upload(&mut self, summary: &RecordSummary) {
        self.device.set_state(DeviceState::Uploading);
        log_info!(
            "Not uploading file, not connected to WiFi. Used buffer, from={}, to={}",
            0u32,
            summary.bytes_collected + summary.header_offset
        );
        self.device.set_state(DeviceState::Idle);
    }
}

/// Hex-encode `digest` over the placeholder at `signature_index`
fn hex_patch(block: &mut [u8], signature_index: usize, digest: &[u8]) -> IngestResult<()> {
    let span = digest.len() * 2;
    if signature_index + span > block.len() {
        return Err(IngestError::SinkOverflow {
            needed: signature_index + span,
            capacity: block.len(),
        });
    }
    crate::container::hex_encode(digest, &mut block[signature_index..signature_index + span])
}
