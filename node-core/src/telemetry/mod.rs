//! Telemetry event catalog and ring buffer shared by firmware and host targets.
//!
//! The recorder replaces the ad-hoc serial event log of earlier bring-up
//! builds with strongly typed event kinds that serialize to compact numeric
//! codes for transport over diagnostics channels. Payload enums carry the
//! extra metadata the emulator and evidence tooling want while remaining
//! `no_std` compatible.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::link::DiagnosticKind;

/// Identifier used when tracking emitted telemetry events.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 128;

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Discriminated telemetry events shared across all node targets.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    JoinRequested,
    JoinAccepted,
    JoinRejected,
    UplinkSent,
    UplinkBusy,
    UplinkComplete,
    DownlinkReceived,
    LinkLost,
    LinkRestored,
    Diagnostic(DiagnosticKind),
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::JoinRequested => f.write_str("join-requested"),
            TelemetryEventKind::JoinAccepted => f.write_str("join-accepted"),
            TelemetryEventKind::JoinRejected => f.write_str("join-rejected"),
            TelemetryEventKind::UplinkSent => f.write_str("uplink-sent"),
            TelemetryEventKind::UplinkBusy => f.write_str("uplink-busy"),
            TelemetryEventKind::UplinkComplete => f.write_str("uplink-complete"),
            TelemetryEventKind::DownlinkReceived => f.write_str("downlink-received"),
            TelemetryEventKind::LinkLost => f.write_str("link-lost"),
            TelemetryEventKind::LinkRestored => f.write_str("link-alive"),
            TelemetryEventKind::Diagnostic(kind) => write!(f, "diagnostic {kind}"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const JOIN_REQUESTED_CODE: u16 = 0x0000;
    const JOIN_ACCEPTED_CODE: u16 = 0x0001;
    const JOIN_REJECTED_CODE: u16 = 0x0002;
    const UPLINK_SENT_CODE: u16 = 0x0004;
    const UPLINK_BUSY_CODE: u16 = 0x0005;
    const UPLINK_COMPLETE_CODE: u16 = 0x0006;
    const DOWNLINK_CODE: u16 = 0x0008;
    const LINK_LOST_CODE: u16 = 0x0009;
    const LINK_RESTORED_CODE: u16 = 0x000A;
    const DIAGNOSTIC_BASE: u16 = 0x0020;
    const DIAGNOSTIC_END: u16 = Self::DIAGNOSTIC_BASE + 0x0100;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::JoinRequested => Self::JOIN_REQUESTED_CODE,
            TelemetryEventKind::JoinAccepted => Self::JOIN_ACCEPTED_CODE,
            TelemetryEventKind::JoinRejected => Self::JOIN_REJECTED_CODE,
            TelemetryEventKind::UplinkSent => Self::UPLINK_SENT_CODE,
            TelemetryEventKind::UplinkBusy => Self::UPLINK_BUSY_CODE,
            TelemetryEventKind::UplinkComplete => Self::UPLINK_COMPLETE_CODE,
            TelemetryEventKind::DownlinkReceived => Self::DOWNLINK_CODE,
            TelemetryEventKind::LinkLost => Self::LINK_LOST_CODE,
            TelemetryEventKind::LinkRestored => Self::LINK_RESTORED_CODE,
            TelemetryEventKind::Diagnostic(kind) => Self::DIAGNOSTIC_BASE + kind.to_raw() as u16,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant into a telemetry event, falling back to [`Custom`].
    ///
    /// [`Custom`]: TelemetryEventKind::Custom
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::JOIN_REQUESTED_CODE => TelemetryEventKind::JoinRequested,
            Self::JOIN_ACCEPTED_CODE => TelemetryEventKind::JoinAccepted,
            Self::JOIN_REJECTED_CODE => TelemetryEventKind::JoinRejected,
            Self::UPLINK_SENT_CODE => TelemetryEventKind::UplinkSent,
            Self::UPLINK_BUSY_CODE => TelemetryEventKind::UplinkBusy,
            Self::UPLINK_COMPLETE_CODE => TelemetryEventKind::UplinkComplete,
            Self::DOWNLINK_CODE => TelemetryEventKind::DownlinkReceived,
            Self::LINK_LOST_CODE => TelemetryEventKind::LinkLost,
            Self::LINK_RESTORED_CODE => TelemetryEventKind::LinkRestored,
            value if (Self::DIAGNOSTIC_BASE..Self::DIAGNOSTIC_END).contains(&value) => {
                let offset = value - Self::DIAGNOSTIC_BASE;
                match u8::try_from(offset) {
                    Ok(raw) => TelemetryEventKind::Diagnostic(DiagnosticKind::from_raw(raw)),
                    Err(_) => TelemetryEventKind::Custom(value),
                }
            }
            other => TelemetryEventKind::Custom(other),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    /// Details describing an uplink attempt or completion.
    Uplink(UplinkTelemetry),
    /// Summary of a received downlink frame.
    Downlink(DownlinkTelemetry),
}

impl TelemetryPayload {
    /// Convenience constructor when no payload data is needed.
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

/// Uplink metadata payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UplinkTelemetry {
    pub port: u8,
    pub confirmed: bool,
    /// Time the transmission spent in flight, when known.
    pub in_flight_for: Option<Duration>,
}

impl UplinkTelemetry {
    #[must_use]
    pub const fn new(port: u8, confirmed: bool, in_flight_for: Option<Duration>) -> Self {
        Self {
            port,
            confirmed,
            in_flight_for,
        }
    }
}

/// Downlink summary payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DownlinkTelemetry {
    pub length: u8,
}

impl DownlinkTelemetry {
    #[must_use]
    pub const fn new(length: u8) -> Self {
        Self { length }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }

    /// Records an uplink submission.
    pub fn record_uplink_sent(&mut self, port: u8, confirmed: bool, timestamp: TInstant) -> EventId {
        let payload = TelemetryPayload::Uplink(UplinkTelemetry::new(port, confirmed, None));
        self.record(TelemetryEventKind::UplinkSent, payload, timestamp)
    }

    /// Records an attempt that was skipped because a transmission is in flight.
    pub fn record_uplink_busy(&mut self, submitted_at: TInstant, timestamp: TInstant) -> EventId {
        let waiting = timestamp.saturating_duration_since(submitted_at);
        let payload = TelemetryPayload::Uplink(UplinkTelemetry::new(0, false, Some(waiting)));
        self.record(TelemetryEventKind::UplinkBusy, payload, timestamp)
    }

    /// Records the completion of an uplink, capturing its time in flight.
    pub fn record_uplink_complete(
        &mut self,
        port: u8,
        confirmed: bool,
        submitted_at: TInstant,
        timestamp: TInstant,
    ) -> EventId {
        let in_flight = timestamp.saturating_duration_since(submitted_at);
        let payload =
            TelemetryPayload::Uplink(UplinkTelemetry::new(port, confirmed, Some(in_flight)));
        self.record(TelemetryEventKind::UplinkComplete, payload, timestamp)
    }

    /// Records a downlink frame delivered alongside a completion.
    pub fn record_downlink(&mut self, length: usize, timestamp: TInstant) -> EventId {
        let payload = TelemetryPayload::Downlink(DownlinkTelemetry::new(truncate_len(length)));
        self.record(TelemetryEventKind::DownlinkReceived, payload, timestamp)
    }

    /// Records an informational transport diagnostic.
    pub fn record_diagnostic(&mut self, kind: DiagnosticKind, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::Diagnostic(kind),
            TelemetryPayload::None,
            timestamp,
        )
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_len(length: usize) -> u8 {
    match u8::try_from(length) {
        Ok(value) => value,
        Err(_) => u8::MAX,
    }
}
