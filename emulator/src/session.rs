use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::ops::Add;
use std::path::Path;
use std::time::Duration;

use node_core::link::{
    DiagnosticKind, DownlinkFrame, DownlinkSink, LinkEvent, TransportCommands,
};
use node_core::payload::SensorSource;
use node_core::scheduler::{UplinkConfig, UplinkScheduler, UplinkSkipped};
use node_core::telemetry::{TelemetryInstant, TelemetryPayload, TelemetryRecorder};

const TRANSCRIPT_PATH: &str = "evidence/emulator-session.log";

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "tick",
        "tick <seconds>        - advance the simulated clock and service the timer",
    ),
    (
        "join",
        "join accepted|denied  - deliver the network's join verdict",
    ),
    (
        "txcomplete",
        "txcomplete [<hex>]    - complete the in-flight uplink, optionally with downlink bytes",
    ),
    (
        "link",
        "link dead|alive       - toggle the link-check verdict",
    ),
    (
        "diag",
        "diag <tag>            - inject an informational MAC event (e.g. beacon_found)",
    ),
    (
        "send",
        "send                  - force an out-of-schedule transmission attempt",
    ),
    (
        "status",
        "status                - display scheduler state",
    ),
    (
        "telemetry",
        "telemetry             - dump the telemetry ring",
    ),
    (
        "help",
        "help [topic]          - show help for a command",
    ),
];

/// Simulated monotonic clock, microseconds since session start.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SimInstant(u64);

impl SimInstant {
    const ZERO: Self = Self(0);

    fn offset(self) -> Duration {
        Duration::from_micros(self.0)
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX))
    }
}

impl TelemetryInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

/// Transport that records each command as the wire line the modem would see.
#[derive(Debug, Default)]
struct ScriptedTransport {
    lines: Vec<String>,
}

impl ScriptedTransport {
    fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }
}

impl TransportCommands for ScriptedTransport {
    fn join(&mut self) {
        self.lines.push("join".to_string());
    }

    fn send(&mut self, payload: &[u8], port: u8, confirmed: bool) {
        let mode = if confirmed { "cnf" } else { "uncnf" };
        self.lines
            .push(format!("tx {mode} {port} {}", render_hex(payload)));
    }
}

/// Battery discharges slowly while the pressure reading drifts upward, so
/// successive uplinks are visibly distinct in the transcript.
#[derive(Copy, Clone, Debug)]
struct SweepSensors {
    battery: u16,
    pressure: u16,
}

impl Default for SweepSensors {
    fn default() -> Self {
        Self {
            battery: 412,
            pressure: 700,
        }
    }
}

impl SensorSource for SweepSensors {
    fn read_battery_voltage(&mut self) -> u16 {
        self.battery = self.battery.saturating_sub(1);
        self.battery
    }

    fn read_pressure(&mut self) -> u16 {
        self.pressure = self.pressure.wrapping_add(5);
        self.pressure
    }
}

#[derive(Debug, Default)]
struct CollectingSink {
    frames: Vec<Vec<u8>>,
}

impl DownlinkSink for CollectingSink {
    fn on_downlink(&mut self, frame: &[u8]) {
        self.frames.push(frame.to_vec());
    }
}

type SimScheduler = UplinkScheduler<SimInstant, ScriptedTransport, SweepSensors, CollectingSink>;

pub struct Session {
    scheduler: SimScheduler,
    telemetry: TelemetryRecorder<SimInstant>,
    now: SimInstant,
    transcript: TranscriptLogger,
    startup_lines: Vec<String>,
}

impl Session {
    pub fn new(interval_secs: Option<u64>) -> io::Result<Self> {
        let transcript = TranscriptLogger::new()?;
        let config = match interval_secs {
            Some(seconds) => UplinkConfig {
                interval: Duration::from_secs(seconds),
                ..UplinkConfig::default()
            },
            None => UplinkConfig::default(),
        };

        let mut scheduler = UplinkScheduler::new(
            config,
            ScriptedTransport::default(),
            SweepSensors::default(),
            CollectingSink::default(),
        );
        let mut telemetry = TelemetryRecorder::new();
        scheduler.start(SimInstant::ZERO, &mut telemetry);

        let mut session = Self {
            scheduler,
            telemetry,
            now: SimInstant::ZERO,
            transcript,
            startup_lines: Vec::new(),
        };

        let mut lines = vec![format!(
            "uplink interval {}s, port {}, unconfirmed",
            session.scheduler.config().interval.as_secs(),
            session.scheduler.config().port
        )];
        session.collect_activity(&mut lines);
        session.record_output(&lines)?;
        session.startup_lines = lines;
        Ok(session)
    }

    /// Lines produced by the automatic startup join, for the banner.
    pub fn startup_lines(&self) -> &[String] {
        &self.startup_lines
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.transcript
            .append_line(self.now, TranscriptRole::Host, trimmed)?;

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        let lines = match tokens.as_slice() {
            ["help"] => self.help(None),
            ["help", topic] => self.help(Some(topic)),
            ["status"] => self.status(),
            ["telemetry"] => self.telemetry_dump(),
            ["tick", seconds] => self.tick(seconds),
            ["join", "accepted"] => self.inject(LinkEvent::Joined),
            ["join", "denied"] => self.inject(LinkEvent::JoinFailed),
            ["txcomplete"] => self.inject(LinkEvent::TxComplete { downlink: None }),
            ["txcomplete", hex] => match decode_hex(hex) {
                Some(frame) => self.inject(LinkEvent::TxComplete {
                    downlink: Some(frame),
                }),
                None => vec![format!("ERR invalid downlink hex `{hex}`")],
            },
            ["link", "dead"] => self.inject(LinkEvent::LinkDead),
            ["link", "alive"] => self.inject(LinkEvent::LinkAlive),
            ["diag", tag] => match diagnostic_by_tag(tag) {
                Some(kind) => self.inject(LinkEvent::Diagnostic(kind)),
                None => vec![format!("ERR unknown diagnostic `{tag}`")],
            },
            ["send"] => self.manual_send(),
            _ => vec![format!(
                "ERR unknown command `{trimmed}` (try `help`)"
            )],
        };

        self.record_output(&lines)?;
        Ok(lines)
    }

    fn help(&self, topic: Option<&str>) -> Vec<String> {
        let mut lines = Vec::new();
        match topic {
            Some(target) if !target.is_empty() => {
                if let Some((_, detail)) = HELP_TOPICS
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(target))
                {
                    lines.push((*detail).to_string());
                } else {
                    lines.push(format!("No help available for `{target}`."));
                }
            }
            _ => {
                lines.push("Available commands:".to_string());
                for (_, detail) in HELP_TOPICS {
                    lines.push(format!("  {detail}"));
                }
            }
        }
        lines
    }

    fn status(&self) -> Vec<String> {
        let mut lines = vec![
            format!("clock: {}", format_offset(self.now.offset())),
            format!("phase: {}", self.scheduler.phase().label()),
        ];

        match self.scheduler.next_fire() {
            Some(deadline) => lines.push(format!(
                "next attempt: {}",
                format_offset(deadline.offset())
            )),
            None => lines.push("next attempt: unarmed".to_string()),
        }

        match self.scheduler.pending() {
            Some(pending) => lines.push(format!(
                "in flight: payload={} since {}",
                pending.payload(),
                format_offset(pending.submitted_at().offset())
            )),
            None => lines.push("in flight: none".to_string()),
        }

        lines
    }

    fn telemetry_dump(&self) -> Vec<String> {
        if self.telemetry.is_empty() {
            return vec!["telemetry: empty".to_string()];
        }

        self.telemetry
            .oldest_first()
            .map(|record| {
                let details = match record.details {
                    TelemetryPayload::None => String::new(),
                    TelemetryPayload::Uplink(uplink) => {
                        let flight = uplink
                            .in_flight_for
                            .map_or_else(String::new, |duration| {
                                format!(" flight={}", format_offset(duration))
                            });
                        format!(
                            " port={} confirmed={}{flight}",
                            uplink.port, uplink.confirmed
                        )
                    }
                    TelemetryPayload::Downlink(downlink) => {
                        format!(" len={}", downlink.length)
                    }
                };
                format!(
                    "[{:>3}] {} {}{details}",
                    record.id,
                    format_offset(record.timestamp.offset()),
                    record.event
                )
            })
            .collect()
    }

    fn tick(&mut self, seconds: &str) -> Vec<String> {
        let Ok(seconds) = seconds.parse::<u64>() else {
            return vec![format!("ERR invalid tick duration `{seconds}`")];
        };

        let advanced = self.now + Duration::from_secs(seconds);
        self.now = advanced;
        self.scheduler.poll(self.now, &mut self.telemetry);

        let mut lines = vec![format!("clock advanced to {}", format_offset(self.now.offset()))];
        self.collect_activity(&mut lines);
        lines
    }

    fn inject(&mut self, event: LinkEvent) -> Vec<String> {
        self.scheduler
            .handle_event(event, self.now, &mut self.telemetry);

        let mut lines = vec![format!("phase: {}", self.scheduler.phase().label())];
        self.collect_activity(&mut lines);
        lines
    }

    fn manual_send(&mut self) -> Vec<String> {
        let mut lines = match self.scheduler.attempt_uplink(self.now, &mut self.telemetry) {
            Ok(()) => vec!["uplink submitted".to_string()],
            Err(UplinkSkipped::Busy) => {
                vec!["skipped: transmission already in flight".to_string()]
            }
            Err(UplinkSkipped::NotJoined) => vec!["skipped: not joined".to_string()],
            Err(UplinkSkipped::Faulted(reason)) => vec![format!("skipped: faulted ({reason})")],
        };
        self.collect_activity(&mut lines);
        lines
    }

    /// Drains transport commands and delivered downlinks into display lines.
    fn collect_activity(&mut self, lines: &mut Vec<String>) {
        for command in self.scheduler.transport_mut().drain() {
            lines.push(format!("modem <- {command}"));
        }
        for frame in std::mem::take(&mut self.scheduler.downlink_mut().frames) {
            lines.push(format!("downlink: {}", render_hex(&frame)));
        }
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(self.now, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new() -> io::Result<Self> {
        let path = Path::new(TRANSCRIPT_PATH);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# Pressure Node Emulator transcript")?;
        writeln!(self.writer, "# Timestamps are simulated time since start")?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, now: SimInstant, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "[{:>10}] {} {}",
            format_offset(now.offset()),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

fn diagnostic_by_tag(tag: &str) -> Option<DiagnosticKind> {
    match tag {
        "scan_timeout" => Some(DiagnosticKind::ScanTimeout),
        "beacon_found" => Some(DiagnosticKind::BeaconFound),
        "beacon_missed" => Some(DiagnosticKind::BeaconMissed),
        "beacon_tracked" => Some(DiagnosticKind::BeaconTracked),
        "joining" => Some(DiagnosticKind::JoinStarted),
        "rejoin_failed" => Some(DiagnosticKind::RejoinFailed),
        "lost_tsync" => Some(DiagnosticKind::TimeSyncLost),
        "reset" => Some(DiagnosticKind::MacReset),
        "rxcomplete" => Some(DiagnosticKind::PingSlotRx),
        _ => None,
    }
}

fn decode_hex(text: &str) -> Option<DownlinkFrame> {
    if text.len() % 2 != 0 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let mut frame = DownlinkFrame::new();
    for offset in (0..text.len()).step_by(2) {
        let byte = u8::from_str_radix(&text[offset..offset + 2], 16).ok()?;
        frame.push(byte).ok()?;
    }
    Some(frame)
}

fn render_hex(bytes: &[u8]) -> String {
    let mut rendered = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        rendered.push_str(&format!("{byte:02x}"));
    }
    rendered
}

fn format_offset(offset: Duration) -> String {
    format!("+{:.3}s", offset.as_secs_f64())
}
