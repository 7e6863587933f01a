//! Link plumbing between the scheduler and the modem task.
//!
//! The scheduler in `node-core` is generic over its clock and transport; this
//! module binds both to the firmware environment. Commands travel to the modem
//! task over a bounded channel, and parsed modem events travel back the same
//! way, so neither task ever blocks inside the state machine.

use core::ops::Add;
use core::time::Duration as CoreDuration;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_time::{Duration as EmbassyDuration, Instant};

use node_core::link::{LinkEvent, TransportCommands};
use node_core::telemetry::TelemetryInstant;

use crate::modem::{ModemCommand, TxPayload};

/// Depth of the parsed-event channel feeding the scheduler task.
pub const EVENT_QUEUE_DEPTH: usize = 8;

/// Depth of the command channel feeding the modem task. The scheduler issues
/// one join and at most one uplink at a time, so this never fills in practice.
pub const COMMAND_QUEUE_DEPTH: usize = 4;

#[cfg(target_os = "none")]
type LinkMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type LinkMutex = NoopRawMutex;

/// Channel carrying parsed modem events to the scheduler.
pub type EventQueue = Channel<LinkMutex, LinkEvent, EVENT_QUEUE_DEPTH>;

/// Convenience sender type alias for the event channel.
pub type EventSender<'a> = Sender<'a, LinkMutex, LinkEvent, EVENT_QUEUE_DEPTH>;

/// Convenience receiver type alias for the event channel.
pub type EventReceiver<'a> = Receiver<'a, LinkMutex, LinkEvent, EVENT_QUEUE_DEPTH>;

/// Channel carrying rendered modem commands to the UART task.
pub type CommandQueue = Channel<LinkMutex, ModemCommand, COMMAND_QUEUE_DEPTH>;

/// Convenience sender type alias for the command channel.
pub type CommandSender<'a> = Sender<'a, LinkMutex, ModemCommand, COMMAND_QUEUE_DEPTH>;

/// Convenience receiver type alias for the command channel.
pub type CommandReceiver<'a> = Receiver<'a, LinkMutex, ModemCommand, COMMAND_QUEUE_DEPTH>;

/// Monotonic firmware instant adapted to the clock interface the scheduler
/// and telemetry recorder expect.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeInstant(Instant);

impl NodeInstant {
    /// Captures the current monotonic time.
    #[must_use]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    /// Unwraps the underlying Embassy instant for timer arming.
    #[must_use]
    pub const fn into_inner(self) -> Instant {
        self.0
    }
}

impl From<Instant> for NodeInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl Add<CoreDuration> for NodeInstant {
    type Output = Self;

    fn add(self, rhs: CoreDuration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Self(self.0 + EmbassyDuration::from_micros(micros))
    }
}

impl TelemetryInstant for NodeInstant {
    fn saturating_duration_since(&self, earlier: Self) -> CoreDuration {
        let ticks = self.0.as_ticks().saturating_sub(earlier.0.as_ticks());
        CoreDuration::from_micros(EmbassyDuration::from_ticks(ticks).as_micros())
    }
}

/// Transport adapter that forwards scheduler commands to the modem task.
pub struct ModemTransport<'a> {
    commands: CommandSender<'a>,
}

impl<'a> ModemTransport<'a> {
    /// Creates an adapter over the command channel sender.
    #[must_use]
    pub fn new(commands: CommandSender<'a>) -> Self {
        Self { commands }
    }
}

impl TransportCommands for ModemTransport<'_> {
    fn join(&mut self) {
        let result = self.commands.try_send(ModemCommand::Join);
        debug_assert!(result.is_ok(), "modem command queue overflow");
    }

    fn send(&mut self, payload: &[u8], port: u8, confirmed: bool) {
        let Ok(payload) = TxPayload::from_slice(payload) else {
            debug_assert!(false, "uplink payload exceeds modem frame size");
            return;
        };

        let result = self.commands.try_send(ModemCommand::Uplink {
            payload,
            port,
            confirmed,
        });
        debug_assert!(result.is_ok(), "modem command queue overflow");
    }
}
