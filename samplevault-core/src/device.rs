//! Device Context and Status Reporting
//!
//! Identity strings, the externally visible device state, and the derived
//! limits the host UI asks about (longest recordable sample, expected erase
//! delay). The context is constructed by the application and passed by
//! reference into the pipeline; there is no global singleton to fight over
//! in tests or on multi-session targets.

use heapless::String;

use crate::storage::StorageGeometry;

/// Worst-case single-block erase time in milliseconds
///
/// Used only for the start-delay hint reported to the host; correctness never
/// depends on it.
pub const BLOCK_ERASE_TIME_MS: u32 = 965;

/// Externally visible device state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceState {
    /// Nothing in progress
    #[default]
    Idle,
    /// Pre-erasing the sample region before a session
    ErasingFlash,
    /// A recording or inference session is running
    Sampling,
    /// Transferring a finished container off-device
    Uploading,
}

impl DeviceState {
    /// Status string reported to the host
    pub const fn name(&self) -> &'static str {
        match self {
            DeviceState::Idle => "idle",
            DeviceState::ErasingFlash => "erasing flash",
            DeviceState::Sampling => "sampling",
            DeviceState::Uploading => "uploading",
        }
    }
}

/// Per-device identity and status
///
/// The id is a MAC-style string, the type a board name; both end up verbatim
/// in every container header this device produces.
pub struct DeviceContext {
    id: String<32>,
    device_type: String<32>,
    state: DeviceState,
}

impl DeviceContext {
    /// New idle context
    ///
    /// Returns `None` when an identity string exceeds the fixed capacity.
    pub fn new(id: &str, device_type: &str) -> Option<Self> {
        Some(Self {
            id: String::try_from(id).ok()?,
            device_type: String::try_from(device_type).ok()?,
            state: DeviceState::Idle,
        })
    }

    /// Device identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Board/device type string
    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    /// Current state
    pub const fn state(&self) -> DeviceState {
        self.state
    }

    /// Update the externally visible state
    pub fn set_state(&mut self, state: DeviceState) {
        self.state = state;
    }

    /// Longest recordable sample in whole seconds at `sample_rate_hz`
    ///
    /// Derived from the storage bytes available for sample data and two bytes
    /// per sample.
    pub fn max_sample_length_s(&self, geometry: &StorageGeometry, sample_rate_hz: u32) -> u32 {
        geometry.available_sample_bytes() / (sample_rate_hz * 2)
    }

    /// Worst-case erase duration for `span` bytes, in milliseconds
    ///
    /// Reported to the host so it can delay streaming until the pre-erase is
    /// plausibly done.
    pub fn erase_time_ms(&self, geometry: &StorageGeometry, span: u32) -> u32 {
        (span / geometry.block_size) * BLOCK_ERASE_TIME_MS
    }
}
