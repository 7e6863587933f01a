//! Uplink session and transmission scheduler.
//!
//! This module owns the node's operational state machine: it issues the single
//! OTAA join at startup, enforces the one-in-flight-transmission invariant,
//! schedules periodic uplinks relative to each completion, and reacts to the
//! transport's asynchronous link events. Everything here is plain data plus an
//! explicit transition function; the run loop that feeds it lives with the
//! firmware and emulator targets.
//!
//! Timing invariant: the schedule timer is re-armed from the instant a
//! transmission *completes*, never from a fixed wall-clock grid, so slow
//! completions stretch the cycle instead of compounding drift. The timer
//! disarms when it fires; only a completion (or link recovery) arms it again,
//! which is what makes a busy attempt a true no-op.

use core::{fmt, ops::Add, time::Duration};

use crate::link::{DownlinkSink, LinkEvent, Session, TransportCommands};
use crate::payload::{Measurement, SensorSource, UplinkPayload};
use crate::telemetry::{TelemetryEventKind, TelemetryInstant, TelemetryPayload, TelemetryRecorder};

/// Default seconds between scheduled uplinks. Actual spacing may stretch under
/// the transport's duty-cycle limits.
pub const DEFAULT_UPLINK_INTERVAL: Duration = Duration::from_secs(600);

/// Tunables for the uplink cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UplinkConfig {
    /// Interval between a completion and the next scheduled attempt.
    pub interval: Duration,
    /// Application port carried on every uplink.
    pub port: u8,
    /// Whether uplinks request a network acknowledgment.
    pub confirmed: bool,
}

impl UplinkConfig {
    /// Creates a configuration with an explicit interval.
    #[must_use]
    pub const fn new(interval: Duration, port: u8, confirmed: bool) -> Self {
        Self {
            interval,
            port,
            confirmed,
        }
    }
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_UPLINK_INTERVAL,
            crate::payload::DEFAULT_UPLINK_PORT,
            false,
        )
    }
}

/// Why the scheduler stopped scheduling.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FaultReason {
    /// The network rejected the join; recovery requires the transport to
    /// report a later acceptance or an external restart.
    JoinRejected,
    /// The established link died mid-session; `LinkAlive` recovers it.
    LinkLost,
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultReason::JoinRejected => f.write_str("join-rejected"),
            FaultReason::LinkLost => f.write_str("link-lost"),
        }
    }
}

/// Scheduler lifecycle phases.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NodePhase {
    /// Process start; nothing issued yet.
    Idle,
    /// Join requested, waiting for the network's verdict.
    JoinPending,
    /// Joined with no transmission in flight; the timer drives attempts.
    Ready,
    /// Exactly one transmission in flight.
    TxPending,
    /// Scheduling suspended until recovery or restart.
    Faulted(FaultReason),
}

impl NodePhase {
    /// Returns `true` when the scheduler has stopped scheduling.
    #[must_use]
    pub const fn is_faulted(self) -> bool {
        matches!(self, NodePhase::Faulted(_))
    }

    /// Stable text label used by logs and the emulator transcript.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            NodePhase::Idle => "idle",
            NodePhase::JoinPending => "join-pending",
            NodePhase::Ready => "ready",
            NodePhase::TxPending => "tx-pending",
            NodePhase::Faulted(FaultReason::JoinRejected) => "faulted/join-rejected",
            NodePhase::Faulted(FaultReason::LinkLost) => "faulted/link-lost",
        }
    }
}

/// Why a transmission attempt did not issue a send.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UplinkSkipped {
    /// A transmission is already in flight; its completion schedules the next
    /// attempt, so nothing else needs to happen.
    Busy,
    /// No session is established yet.
    NotJoined,
    /// The scheduler is faulted for the given reason.
    Faulted(FaultReason),
}

impl fmt::Display for UplinkSkipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UplinkSkipped::Busy => f.write_str("busy"),
            UplinkSkipped::NotJoined => f.write_str("not-joined"),
            UplinkSkipped::Faulted(reason) => write!(f, "faulted ({reason})"),
        }
    }
}

/// The single in-flight uplink record.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PendingTransmission<TInstant> {
    payload: UplinkPayload,
    submitted_at: TInstant,
    confirmed: bool,
}

impl<TInstant: Copy> PendingTransmission<TInstant> {
    /// Creates a record for a transmission handed to the transport.
    #[must_use]
    pub const fn new(payload: UplinkPayload, submitted_at: TInstant, confirmed: bool) -> Self {
        Self {
            payload,
            submitted_at,
            confirmed,
        }
    }

    /// Returns the encoded payload that was submitted.
    pub const fn payload(&self) -> &UplinkPayload {
        &self.payload
    }

    /// Returns the submission timestamp.
    pub const fn submitted_at(&self) -> TInstant {
        self.submitted_at
    }

    /// Returns `true` when an acknowledgment was requested.
    pub const fn confirmed(&self) -> bool {
        self.confirmed
    }
}

/// Deadline for the next scheduled transmission attempt.
///
/// The timer holds at most one deadline and clears it when it fires, so a
/// fire that finds the node busy never re-arms anything by itself.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScheduleTimer<TInstant> {
    interval: Duration,
    next_fire: Option<TInstant>,
}

impl<TInstant> ScheduleTimer<TInstant>
where
    TInstant: Copy + Ord + Add<Duration, Output = TInstant>,
{
    /// Creates a disarmed timer with the given interval.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_fire: None,
        }
    }

    /// Returns the configured interval.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the pending deadline, if armed.
    pub const fn next_fire(&self) -> Option<TInstant> {
        self.next_fire
    }

    /// Arms the timer one interval after `completion`.
    pub fn arm_after(&mut self, completion: TInstant) {
        self.next_fire = Some(completion + self.interval);
    }

    /// Clears any pending deadline.
    pub fn disarm(&mut self) {
        self.next_fire = None;
    }

    /// Returns `true` when an armed deadline has been reached.
    pub fn is_due(&self, now: TInstant) -> bool {
        match self.next_fire {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    /// Consumes a due deadline, disarming the timer.
    pub fn take_due(&mut self, now: TInstant) -> Option<TInstant> {
        if self.is_due(now) {
            self.next_fire.take()
        } else {
            None
        }
    }
}

/// Coordinates join, sampling, and uplink scheduling over the transport.
pub struct UplinkScheduler<TInstant, T, S, D> {
    config: UplinkConfig,
    phase: NodePhase,
    session: Session<TInstant>,
    timer: ScheduleTimer<TInstant>,
    pending: Option<PendingTransmission<TInstant>>,
    transport: T,
    sensors: S,
    downlink: D,
}

impl<TInstant, T, S, D> UplinkScheduler<TInstant, T, S, D>
where
    TInstant: Copy + Ord + Add<Duration, Output = TInstant> + TelemetryInstant,
    T: TransportCommands,
    S: SensorSource,
    D: DownlinkSink,
{
    /// Creates a scheduler that owns its collaborators.
    pub fn new(config: UplinkConfig, transport: T, sensors: S, downlink: D) -> Self {
        Self {
            timer: ScheduleTimer::new(config.interval),
            config,
            phase: NodePhase::Idle,
            session: Session::new(),
            pending: None,
            transport,
            sensors,
            downlink,
        }
    }

    /// Returns the active configuration.
    pub const fn config(&self) -> &UplinkConfig {
        &self.config
    }

    /// Returns the current lifecycle phase.
    pub const fn phase(&self) -> NodePhase {
        self.phase
    }

    /// Returns the network session record.
    pub const fn session(&self) -> &Session<TInstant> {
        &self.session
    }

    /// Returns the in-flight transmission, if any.
    pub const fn pending(&self) -> Option<&PendingTransmission<TInstant>> {
        self.pending.as_ref()
    }

    /// Returns the next scheduled attempt time, if armed.
    pub const fn next_fire(&self) -> Option<TInstant> {
        self.timer.next_fire()
    }

    /// Accesses the underlying transport.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably accesses the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Mutably accesses the downlink consumer.
    pub fn downlink_mut(&mut self) -> &mut D {
        &mut self.downlink
    }

    /// Issues the process-lifetime join request.
    ///
    /// Called once at startup; later calls are no-ops so the one-join-in-flight
    /// invariant holds no matter how the run loop is wired.
    pub fn start<const CAPACITY: usize>(
        &mut self,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, CAPACITY>,
    ) {
        if self.phase != NodePhase::Idle {
            return;
        }

        self.transport.join();
        self.session.begin_join(now);
        self.phase = NodePhase::JoinPending;
        telemetry.record(
            TelemetryEventKind::JoinRequested,
            TelemetryPayload::none(),
            now,
        );
    }

    /// Services a due schedule deadline, if any.
    pub fn poll<const CAPACITY: usize>(
        &mut self,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, CAPACITY>,
    ) {
        if self.phase != NodePhase::Ready {
            return;
        }

        if self.timer.take_due(now).is_some() {
            // Busy and fault rejections are deliberate no-ops here; the next
            // completion or recovery event re-arms the timer.
            let _ = self.attempt_uplink(now, telemetry);
        }
    }

    /// Applies one transport event to the state machine.
    ///
    /// Every tag the transport can emit is accepted; informational tags are
    /// drained and recorded so the transport's buffers never stall on us.
    pub fn handle_event<const CAPACITY: usize>(
        &mut self,
        event: LinkEvent,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, CAPACITY>,
    ) {
        match event {
            LinkEvent::Joined => {
                self.session.mark_joined();
                telemetry.record(
                    TelemetryEventKind::JoinAccepted,
                    TelemetryPayload::none(),
                    now,
                );

                // First acceptance, or collaborator-driven recovery after an
                // earlier rejection: start transmitting immediately.
                if matches!(
                    self.phase,
                    NodePhase::JoinPending | NodePhase::Faulted(FaultReason::JoinRejected)
                ) {
                    self.phase = NodePhase::Ready;
                    let _ = self.attempt_uplink(now, telemetry);
                }
            }
            LinkEvent::JoinFailed => {
                self.session.mark_join_failed();
                self.phase = NodePhase::Faulted(FaultReason::JoinRejected);
                self.timer.disarm();
                telemetry.record(
                    TelemetryEventKind::JoinRejected,
                    TelemetryPayload::none(),
                    now,
                );
            }
            LinkEvent::TxComplete { downlink } => {
                if let Some(pending) = self.pending.take() {
                    self.phase = NodePhase::Ready;
                    self.timer.arm_after(now);
                    telemetry.record_uplink_complete(
                        self.config.port,
                        pending.confirmed(),
                        pending.submitted_at(),
                        now,
                    );

                    if let Some(frame) = downlink {
                        telemetry.record_downlink(frame.len(), now);
                        self.downlink.on_downlink(&frame);
                    }
                } else {
                    // Nothing in flight: drain the event without rescheduling.
                    telemetry.record(
                        TelemetryEventKind::UplinkComplete,
                        TelemetryPayload::none(),
                        now,
                    );
                }
            }
            LinkEvent::LinkDead => {
                self.pending = None;
                self.timer.disarm();
                self.session.mark_link_dead();
                self.phase = NodePhase::Faulted(FaultReason::LinkLost);
                telemetry.record(TelemetryEventKind::LinkLost, TelemetryPayload::none(), now);
            }
            LinkEvent::LinkAlive => {
                telemetry.record(
                    TelemetryEventKind::LinkRestored,
                    TelemetryPayload::none(),
                    now,
                );

                if self.phase == NodePhase::Faulted(FaultReason::LinkLost) {
                    self.session.mark_link_restored();
                    self.phase = NodePhase::Ready;
                    self.timer.arm_after(now);
                }
            }
            LinkEvent::Diagnostic(kind) => {
                telemetry.record_diagnostic(kind, now);
            }
        }
    }

    /// Attempts a sample-encode-send cycle.
    ///
    /// The overlap guard runs first: while a transmission is pending the
    /// attempt is reported busy and neither the transport nor the timer is
    /// touched. The pending transmission's own completion triggers the next
    /// schedule.
    pub fn attempt_uplink<const CAPACITY: usize>(
        &mut self,
        now: TInstant,
        telemetry: &mut TelemetryRecorder<TInstant, CAPACITY>,
    ) -> Result<(), UplinkSkipped> {
        if let Some(pending) = &self.pending {
            telemetry.record_uplink_busy(pending.submitted_at(), now);
            return Err(UplinkSkipped::Busy);
        }

        match self.phase {
            NodePhase::Faulted(reason) => Err(UplinkSkipped::Faulted(reason)),
            NodePhase::Idle | NodePhase::JoinPending => Err(UplinkSkipped::NotJoined),
            NodePhase::Ready | NodePhase::TxPending => {
                let payload = Measurement::sample(&mut self.sensors).encode();
                self.transport
                    .send(payload.as_ref(), self.config.port, self.config.confirmed);
                self.pending = Some(PendingTransmission::new(
                    payload,
                    now,
                    self.config.confirmed,
                ));
                self.phase = NodePhase::TxPending;
                telemetry.record_uplink_sent(self.config.port, self.config.confirmed, now);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{DiagnosticKind, DownlinkFrame, NoopDownlinkSink};
    use heapless::Vec as HeaplessVec;

    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct MockInstant(u64);

    impl MockInstant {
        fn secs(value: u64) -> Self {
            Self(value * 1_000_000)
        }
    }

    impl Add<Duration> for MockInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self::Output {
            Self(self.0 + u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX))
        }
    }

    impl TelemetryInstant for MockInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_micros(self.0.saturating_sub(earlier.0))
        }
    }

    #[derive(Clone, Debug, Default)]
    struct RecordingTransport {
        join_calls: usize,
        sends: HeaplessVec<([u8; 4], u8, bool), 8>,
    }

    impl TransportCommands for RecordingTransport {
        fn join(&mut self) {
            self.join_calls += 1;
        }

        fn send(&mut self, payload: &[u8], port: u8, confirmed: bool) {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(payload);
            self.sends
                .push((bytes, port, confirmed))
                .expect("send log overflow");
        }
    }

    /// Returns a fresh reading pair on every sample so tests can tell whether
    /// the payload was sampled at attempt time.
    #[derive(Copy, Clone, Debug)]
    struct CountingSensors {
        next: u16,
    }

    impl CountingSensors {
        fn new() -> Self {
            Self { next: 100 }
        }
    }

    impl SensorSource for CountingSensors {
        fn read_battery_voltage(&mut self) -> u16 {
            self.next += 1;
            self.next
        }

        fn read_pressure(&mut self) -> u16 {
            self.next += 1;
            self.next
        }
    }

    #[derive(Clone, Debug, Default)]
    struct CapturingSink {
        frames: HeaplessVec<HeaplessVec<u8, 64>, 4>,
    }

    impl DownlinkSink for CapturingSink {
        fn on_downlink(&mut self, frame: &[u8]) {
            let copied = HeaplessVec::from_slice(frame).expect("frame too large");
            self.frames.push(copied).expect("frame log overflow");
        }
    }

    type TestScheduler<D = NoopDownlinkSink> =
        UplinkScheduler<MockInstant, RecordingTransport, CountingSensors, D>;

    fn scheduler() -> (TestScheduler, TelemetryRecorder<MockInstant>) {
        let config = UplinkConfig::default();
        let scheduler = UplinkScheduler::new(
            config,
            RecordingTransport::default(),
            CountingSensors::new(),
            NoopDownlinkSink::new(),
        );
        (scheduler, TelemetryRecorder::new())
    }

    fn joined_scheduler() -> (TestScheduler, TelemetryRecorder<MockInstant>) {
        let (mut scheduler, mut telemetry) = scheduler();
        scheduler.start(MockInstant::secs(0), &mut telemetry);
        scheduler.handle_event(LinkEvent::Joined, MockInstant::secs(0), &mut telemetry);
        (scheduler, telemetry)
    }

    #[test]
    fn start_issues_join_exactly_once() {
        let (mut scheduler, mut telemetry) = scheduler();

        scheduler.start(MockInstant::secs(0), &mut telemetry);
        scheduler.start(MockInstant::secs(1), &mut telemetry);

        assert_eq!(scheduler.transport().join_calls, 1);
        assert_eq!(scheduler.phase(), NodePhase::JoinPending);
        assert_eq!(
            scheduler.session().last_join_attempt(),
            Some(MockInstant::secs(0))
        );
    }

    #[test]
    fn no_send_before_join_acceptance() {
        let (mut scheduler, mut telemetry) = scheduler();
        scheduler.start(MockInstant::secs(0), &mut telemetry);

        let result = scheduler.attempt_uplink(MockInstant::secs(1), &mut telemetry);
        assert_eq!(result, Err(UplinkSkipped::NotJoined));
        assert!(scheduler.transport().sends.is_empty());
    }

    #[test]
    fn join_acceptance_triggers_immediate_uplink() {
        let (scheduler, _) = joined_scheduler();

        assert_eq!(scheduler.phase(), NodePhase::TxPending);
        assert_eq!(scheduler.transport().sends.len(), 1);

        // CountingSensors yields 101/102 on the first sample.
        let (bytes, port, confirmed) = scheduler.transport().sends[0];
        assert_eq!(bytes, [0x00, 0x65, 0x00, 0x66]);
        assert_eq!(port, 1);
        assert!(!confirmed);
    }

    #[test]
    fn single_flight_invariant_holds_under_repeated_attempts() {
        let (mut scheduler, mut telemetry) = joined_scheduler();

        for offset in 1..5 {
            let result = scheduler.attempt_uplink(MockInstant::secs(offset), &mut telemetry);
            assert_eq!(result, Err(UplinkSkipped::Busy));
        }

        assert_eq!(scheduler.transport().sends.len(), 1);
        assert!(scheduler.pending().is_some());
    }

    #[test]
    fn busy_attempt_leaves_schedule_untouched() {
        let (mut scheduler, mut telemetry) = joined_scheduler();
        let before = scheduler.next_fire();

        let result = scheduler.attempt_uplink(MockInstant::secs(5), &mut telemetry);

        assert_eq!(result, Err(UplinkSkipped::Busy));
        assert_eq!(scheduler.next_fire(), before);
        assert_eq!(
            telemetry.latest().unwrap().event,
            TelemetryEventKind::UplinkBusy
        );
    }

    #[test]
    fn completion_schedules_relative_to_completion_time() {
        let (mut scheduler, mut telemetry) = joined_scheduler();

        scheduler.handle_event(
            LinkEvent::TxComplete { downlink: None },
            MockInstant::secs(10),
            &mut telemetry,
        );

        assert_eq!(scheduler.phase(), NodePhase::Ready);
        assert!(scheduler.pending().is_none());
        assert_eq!(scheduler.next_fire(), Some(MockInstant::secs(610)));
    }

    #[test]
    fn late_completion_does_not_compound_drift() {
        let (mut scheduler, mut telemetry) = joined_scheduler();

        // Completion arrives 100 s later than the nominal cycle would expect.
        scheduler.handle_event(
            LinkEvent::TxComplete { downlink: None },
            MockInstant::secs(700),
            &mut telemetry,
        );

        assert_eq!(scheduler.next_fire(), Some(MockInstant::secs(1_300)));
    }

    #[test]
    fn poll_fires_only_at_deadline() {
        let (mut scheduler, mut telemetry) = joined_scheduler();
        scheduler.handle_event(
            LinkEvent::TxComplete { downlink: None },
            MockInstant::secs(10),
            &mut telemetry,
        );

        scheduler.poll(MockInstant::secs(609), &mut telemetry);
        assert_eq!(scheduler.transport().sends.len(), 1);

        scheduler.poll(MockInstant::secs(610), &mut telemetry);
        assert_eq!(scheduler.transport().sends.len(), 2);
        assert_eq!(scheduler.phase(), NodePhase::TxPending);
        assert!(scheduler.next_fire().is_none());
    }

    #[test]
    fn join_rejection_faults_the_scheduler() {
        let (mut scheduler, mut telemetry) = scheduler();
        scheduler.start(MockInstant::secs(0), &mut telemetry);
        scheduler.handle_event(LinkEvent::JoinFailed, MockInstant::secs(2), &mut telemetry);

        assert_eq!(
            scheduler.phase(),
            NodePhase::Faulted(FaultReason::JoinRejected)
        );

        for offset in [10, 600, 1_200] {
            scheduler.poll(MockInstant::secs(offset), &mut telemetry);
        }
        assert!(scheduler.transport().sends.is_empty());
    }

    #[test]
    fn link_death_drops_pending_and_faults() {
        let (mut scheduler, mut telemetry) = joined_scheduler();

        scheduler.handle_event(LinkEvent::LinkDead, MockInstant::secs(5), &mut telemetry);

        assert_eq!(scheduler.phase(), NodePhase::Faulted(FaultReason::LinkLost));
        assert!(scheduler.pending().is_none());
        assert!(scheduler.next_fire().is_none());
    }

    #[test]
    fn link_alive_resumes_timer_driven_sends() {
        let (mut scheduler, mut telemetry) = joined_scheduler();
        scheduler.handle_event(LinkEvent::LinkDead, MockInstant::secs(5), &mut telemetry);
        scheduler.handle_event(LinkEvent::LinkAlive, MockInstant::secs(20), &mut telemetry);

        assert_eq!(scheduler.phase(), NodePhase::Ready);
        assert_eq!(scheduler.next_fire(), Some(MockInstant::secs(620)));

        scheduler.poll(MockInstant::secs(620), &mut telemetry);
        assert_eq!(scheduler.transport().sends.len(), 2);
    }

    #[test]
    fn link_alive_outside_fault_is_informational() {
        let (mut scheduler, mut telemetry) = joined_scheduler();
        let before = scheduler.phase();

        scheduler.handle_event(LinkEvent::LinkAlive, MockInstant::secs(3), &mut telemetry);

        assert_eq!(scheduler.phase(), before);
        assert_eq!(
            telemetry.latest().unwrap().event,
            TelemetryEventKind::LinkRestored
        );
    }

    #[test]
    fn diagnostics_are_drained_without_state_change() {
        let (mut scheduler, mut telemetry) = joined_scheduler();
        let phase = scheduler.phase();
        let next_fire = scheduler.next_fire();
        let sends = scheduler.transport().sends.len();

        for _ in 0..3 {
            scheduler.handle_event(
                LinkEvent::Diagnostic(DiagnosticKind::BeaconTracked),
                MockInstant::secs(4),
                &mut telemetry,
            );
        }

        assert_eq!(scheduler.phase(), phase);
        assert_eq!(scheduler.next_fire(), next_fire);
        assert_eq!(scheduler.transport().sends.len(), sends);
    }

    #[test]
    fn stray_completion_is_drained_without_rescheduling() {
        let (mut scheduler, mut telemetry) = scheduler();
        scheduler.start(MockInstant::secs(0), &mut telemetry);

        scheduler.handle_event(
            LinkEvent::TxComplete { downlink: None },
            MockInstant::secs(1),
            &mut telemetry,
        );

        assert_eq!(scheduler.phase(), NodePhase::JoinPending);
        assert!(scheduler.next_fire().is_none());
    }

    #[test]
    fn downlink_bytes_reach_the_sink() {
        let config = UplinkConfig::default();
        let mut scheduler: TestScheduler<CapturingSink> = UplinkScheduler::new(
            config,
            RecordingTransport::default(),
            CountingSensors::new(),
            CapturingSink::default(),
        );
        let mut telemetry: TelemetryRecorder<MockInstant> = TelemetryRecorder::new();

        scheduler.start(MockInstant::secs(0), &mut telemetry);
        scheduler.handle_event(LinkEvent::Joined, MockInstant::secs(0), &mut telemetry);

        let mut frame = DownlinkFrame::new();
        frame.extend_from_slice(&[0xCA, 0xFE]).unwrap();
        scheduler.handle_event(
            LinkEvent::TxComplete {
                downlink: Some(frame),
            },
            MockInstant::secs(9),
            &mut telemetry,
        );

        let frames = &scheduler.downlink.frames;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_slice(), &[0xCA, 0xFE]);
    }

    #[test]
    fn timer_take_due_disarms() {
        let mut timer: ScheduleTimer<MockInstant> = ScheduleTimer::new(Duration::from_secs(600));
        assert!(!timer.is_due(MockInstant::secs(0)));

        timer.arm_after(MockInstant::secs(10));
        assert_eq!(timer.next_fire(), Some(MockInstant::secs(610)));
        assert!(timer.take_due(MockInstant::secs(609)).is_none());

        let fired = timer.take_due(MockInstant::secs(610));
        assert_eq!(fired, Some(MockInstant::secs(610)));
        assert!(timer.next_fire().is_none());
    }
}
