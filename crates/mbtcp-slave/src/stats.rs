//! Poll statistics.
//!
//! Plain counters updated by the processor; nothing here allocates.

use serde::Serialize;
use std::fmt;

/// Why a received frame was dropped without a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Fewer than 12 bytes received.
    TooShort,
    /// Unit identifier addressed another slave.
    UnitIdMismatch,
    /// Protocol id or MBAP length field rejected (strict mode only).
    MbapMismatch,
    /// Function code not served.
    UnknownFunction,
    /// Frame length does not match the function's expected size.
    LengthMismatch,
    /// Declared count exceeds the buffer capacity.
    CountExceedsCapacity,
    /// Implied response would not fit the output buffer.
    ResponseExceedsCapacity,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "frame too short"),
            Self::UnitIdMismatch => write!(f, "unit id mismatch"),
            Self::MbapMismatch => write!(f, "MBAP header mismatch"),
            Self::UnknownFunction => write!(f, "unknown function code"),
            Self::LengthMismatch => write!(f, "length mismatch"),
            Self::CountExceedsCapacity => write!(f, "count exceeds capacity"),
            Self::ResponseExceedsCapacity => write!(f, "response exceeds capacity"),
        }
    }
}

/// Per-reason drop counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DropCounters {
    /// Frames shorter than the minimum request.
    pub too_short: u64,
    /// Frames for another unit id.
    pub unit_id_mismatch: u64,
    /// Frames rejected by the strict MBAP check.
    pub mbap_mismatch: u64,
    /// Frames with an unsupported function code.
    pub unknown_function: u64,
    /// Frames whose length disagrees with the function code.
    pub length_mismatch: u64,
    /// Frames declaring more items than the buffer holds.
    pub count_exceeds_capacity: u64,
    /// Frames whose response would overflow the buffer.
    pub response_exceeds_capacity: u64,
}

impl DropCounters {
    /// Sum of all drop counters.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.too_short
            + self.unit_id_mismatch
            + self.mbap_mismatch
            + self.unknown_function
            + self.length_mismatch
            + self.count_exceeds_capacity
            + self.response_exceeds_capacity
    }

    /// Counter for a given reason.
    #[must_use]
    pub fn get(&self, reason: DropReason) -> u64 {
        match reason {
            DropReason::TooShort => self.too_short,
            DropReason::UnitIdMismatch => self.unit_id_mismatch,
            DropReason::MbapMismatch => self.mbap_mismatch,
            DropReason::UnknownFunction => self.unknown_function,
            DropReason::LengthMismatch => self.length_mismatch,
            DropReason::CountExceedsCapacity => self.count_exceeds_capacity,
            DropReason::ResponseExceedsCapacity => self.response_exceeds_capacity,
        }
    }

    fn slot(&mut self, reason: DropReason) -> &mut u64 {
        match reason {
            DropReason::TooShort => &mut self.too_short,
            DropReason::UnitIdMismatch => &mut self.unit_id_mismatch,
            DropReason::MbapMismatch => &mut self.mbap_mismatch,
            DropReason::UnknownFunction => &mut self.unknown_function,
            DropReason::LengthMismatch => &mut self.length_mismatch,
            DropReason::CountExceedsCapacity => &mut self.count_exceeds_capacity,
            DropReason::ResponseExceedsCapacity => &mut self.response_exceeds_capacity,
        }
    }
}

/// Counters describing the processor's activity since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollStats {
    /// Calls to `poll`.
    pub polls: u64,
    /// Polls that read at least one byte.
    pub frames_received: u64,
    /// Responses transmitted.
    pub responses_sent: u64,
    /// Total response bytes transmitted.
    pub bytes_sent: u64,
    /// Responses built but not transmitted (write failure or disconnect).
    pub send_failures: u64,
    /// Clients admitted as the current connection.
    pub connections_accepted: u64,
    /// Clients accepted then closed because another client was live.
    pub connections_rejected: u64,
    /// Dropped frames by reason.
    pub dropped: DropCounters,
}

impl PollStats {
    /// Count a dropped frame.
    pub fn record_drop(&mut self, reason: DropReason) {
        *self.dropped.slot(reason) += 1;
    }

    /// Count a transmitted response.
    pub fn record_response(&mut self, len: usize) {
        self.responses_sent += 1;
        self.bytes_sent += len as u64;
    }
}
