//! Transport session boundary shared between firmware and host targets.
//!
//! The scheduler consumes the wireless MAC purely through this interface: a
//! fire-and-forget command surface ([`TransportCommands`]) plus a tagged event
//! stream ([`LinkEvent`]). The transport's radio, duty-cycle, and retry logic
//! stay on the far side of the boundary; correctness here only depends on the
//! transport eventually reporting what happened.

use core::fmt;

use heapless::Vec;

/// Maximum downlink payload carried alongside a transmission-complete event.
pub const MAX_DOWNLINK_LEN: usize = 64;

/// Downlink bytes delivered opportunistically in an RX window.
pub type DownlinkFrame = Vec<u8, MAX_DOWNLINK_LEN>;

/// Device's relationship to the network.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionState {
    Unjoined,
    Joining,
    Joined,
    JoinFailed,
    LinkDead,
}

/// Volatile per-run session record. Rebuilt from scratch at every boot; no
/// join state is persisted across restarts.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Session<TInstant> {
    state: SessionState,
    last_join_attempt: Option<TInstant>,
}

impl<TInstant: Copy> Session<TInstant> {
    /// Creates a fresh session that has never attempted a join.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SessionState::Unjoined,
            last_join_attempt: None,
        }
    }

    /// Reports the current session state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the timestamp of the most recent join attempt, if any.
    pub const fn last_join_attempt(&self) -> Option<TInstant> {
        self.last_join_attempt
    }

    /// Returns `true` once the network has accepted the device.
    pub const fn is_joined(&self) -> bool {
        matches!(self.state, SessionState::Joined)
    }

    /// Records the single join attempt issued at startup.
    pub fn begin_join(&mut self, now: TInstant) {
        self.state = SessionState::Joining;
        self.last_join_attempt = Some(now);
    }

    /// Marks the session as accepted by the network.
    pub fn mark_joined(&mut self) {
        self.state = SessionState::Joined;
    }

    /// Marks the join attempt as rejected.
    pub fn mark_join_failed(&mut self) {
        self.state = SessionState::JoinFailed;
    }

    /// Marks the established link as lost.
    pub fn mark_link_dead(&mut self) {
        self.state = SessionState::LinkDead;
    }

    /// Restores a previously dead link to the joined state.
    pub fn mark_link_restored(&mut self) {
        self.state = SessionState::Joined;
    }
}

impl<TInstant: Copy> Default for Session<TInstant> {
    fn default() -> Self {
        Self::new()
    }
}

/// Informational transport events that never change scheduler state but must
/// still be drained so the transport's internal buffers do not stall.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DiagnosticKind {
    ScanTimeout,
    BeaconFound,
    BeaconMissed,
    BeaconTracked,
    JoinStarted,
    RejoinFailed,
    TimeSyncLost,
    MacReset,
    PingSlotRx,
    /// Tag the transport emitted that this build does not recognize.
    Unknown(u8),
}

impl DiagnosticKind {
    const SCAN_TIMEOUT_CODE: u8 = 0x00;
    const BEACON_FOUND_CODE: u8 = 0x01;
    const BEACON_MISSED_CODE: u8 = 0x02;
    const BEACON_TRACKED_CODE: u8 = 0x03;
    const JOIN_STARTED_CODE: u8 = 0x04;
    const REJOIN_FAILED_CODE: u8 = 0x05;
    const TIME_SYNC_LOST_CODE: u8 = 0x06;
    const MAC_RESET_CODE: u8 = 0x07;
    const PING_SLOT_RX_CODE: u8 = 0x08;

    /// Encodes the diagnostic into a compact numeric discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            DiagnosticKind::ScanTimeout => Self::SCAN_TIMEOUT_CODE,
            DiagnosticKind::BeaconFound => Self::BEACON_FOUND_CODE,
            DiagnosticKind::BeaconMissed => Self::BEACON_MISSED_CODE,
            DiagnosticKind::BeaconTracked => Self::BEACON_TRACKED_CODE,
            DiagnosticKind::JoinStarted => Self::JOIN_STARTED_CODE,
            DiagnosticKind::RejoinFailed => Self::REJOIN_FAILED_CODE,
            DiagnosticKind::TimeSyncLost => Self::TIME_SYNC_LOST_CODE,
            DiagnosticKind::MacReset => Self::MAC_RESET_CODE,
            DiagnosticKind::PingSlotRx => Self::PING_SLOT_RX_CODE,
            DiagnosticKind::Unknown(code) => code,
        }
    }

    /// Decodes a compact numeric discriminant, falling back to [`Unknown`].
    ///
    /// [`Unknown`]: DiagnosticKind::Unknown
    #[must_use]
    pub const fn from_raw(code: u8) -> Self {
        match code {
            Self::SCAN_TIMEOUT_CODE => DiagnosticKind::ScanTimeout,
            Self::BEACON_FOUND_CODE => DiagnosticKind::BeaconFound,
            Self::BEACON_MISSED_CODE => DiagnosticKind::BeaconMissed,
            Self::BEACON_TRACKED_CODE => DiagnosticKind::BeaconTracked,
            Self::JOIN_STARTED_CODE => DiagnosticKind::JoinStarted,
            Self::REJOIN_FAILED_CODE => DiagnosticKind::RejoinFailed,
            Self::TIME_SYNC_LOST_CODE => DiagnosticKind::TimeSyncLost,
            Self::MAC_RESET_CODE => DiagnosticKind::MacReset,
            Self::PING_SLOT_RX_CODE => DiagnosticKind::PingSlotRx,
            other => DiagnosticKind::Unknown(other),
        }
    }

    /// Stable text label used by logs and the emulator transcript.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            DiagnosticKind::ScanTimeout => "scan-timeout",
            DiagnosticKind::BeaconFound => "beacon-found",
            DiagnosticKind::BeaconMissed => "beacon-missed",
            DiagnosticKind::BeaconTracked => "beacon-tracked",
            DiagnosticKind::JoinStarted => "joining",
            DiagnosticKind::RejoinFailed => "rejoin-failed",
            DiagnosticKind::TimeSyncLost => "time-sync-lost",
            DiagnosticKind::MacReset => "mac-reset",
            DiagnosticKind::PingSlotRx => "ping-slot-rx",
            DiagnosticKind::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Unknown(code) => write!(f, "unknown({code})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Asynchronous events delivered by the transport session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LinkEvent {
    /// OTAA join accepted; session keys are established.
    Joined,
    /// OTAA join rejected by the network.
    JoinFailed,
    /// The in-flight uplink finished (including RX windows). Downlink bytes
    /// ride along when the network used the opportunity to respond.
    TxComplete { downlink: Option<DownlinkFrame> },
    /// Link-check machinery declared the session dead.
    LinkDead,
    /// A previously dead link produced evidence of life again.
    LinkAlive,
    /// Informational event with no scheduling consequence.
    Diagnostic(DiagnosticKind),
}

/// Fire-and-forget command surface of the transport session.
///
/// Both operations complete asynchronously; outcomes arrive later as
/// [`LinkEvent`]s. There is no cancel path once a send has been issued.
pub trait TransportCommands {
    /// Starts the over-the-air activation procedure.
    fn join(&mut self);

    /// Queues an uplink payload on the given port.
    fn send(&mut self, payload: &[u8], port: u8, confirmed: bool);
}

/// Transport that performs no radio interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopTransport;

impl NoopTransport {
    /// Creates a new no-op transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TransportCommands for NoopTransport {
    fn join(&mut self) {}

    fn send(&mut self, _: &[u8], _: u8, _: bool) {}
}

/// Consumer for downlink bytes carried on a transmission-complete event.
///
/// Decoding is out of scope for the scheduler; it only hands the bytes over.
pub trait DownlinkSink {
    /// Receives one downlink frame.
    fn on_downlink(&mut self, frame: &[u8]);
}

/// Downlink consumer that drops every frame.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopDownlinkSink;

impl NoopDownlinkSink {
    /// Creates a new no-op downlink sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DownlinkSink for NoopDownlinkSink {
    fn on_downlink(&mut self, _: &[u8]) {}
}
