//! Line codec for the serial LoRaWAN modem.
//!
//! The modem speaks a newline-delimited text protocol. Commands go out as
//! `join` or `tx uncnf <port> <hex>`; the modem answers with `ok`, `busy`, or
//! `err`, and pushes unsolicited `ev <tag>` lines as MAC events occur. A
//! transmission-complete event may carry downlink bytes as `ev txcomplete
//! rx=<hex>`. Parsing uses `winnow` combinators over the trimmed line.

use core::fmt::{self, Write as _};

use heapless::{String, Vec};
use winnow::ascii::{digit1, space1};
use winnow::combinator::{alt, opt, preceded};
use winnow::error::EmptyError;
use winnow::prelude::*;
use winnow::token::take_while;

use node_core::link::{DiagnosticKind, DownlinkFrame, LinkEvent, MAX_DOWNLINK_LEN};

/// Largest payload the modem accepts in a single `tx` command.
pub const MAX_TX_PAYLOAD_LEN: usize = 64;

/// Longest rendered command line, sized for a full-length hex payload.
pub const MAX_COMMAND_LEN: usize = 160;

/// Payload bytes carried by an uplink command.
pub type TxPayload = Vec<u8, MAX_TX_PAYLOAD_LEN>;

/// Rendered command line ready for the UART, terminator included.
pub type CommandLine = String<MAX_COMMAND_LEN>;

type ModemResult<T> = ModalResult<T, EmptyError>;

/// Commands the scheduler can issue to the modem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModemCommand {
    /// Start the over-the-air activation procedure.
    Join,
    /// Transmit an application payload.
    Uplink {
        payload: TxPayload,
        port: u8,
        confirmed: bool,
    },
}

impl ModemCommand {
    /// Renders the command into its wire form.
    pub fn render(&self) -> Result<CommandLine, fmt::Error> {
        let mut line = CommandLine::new();
        match self {
            ModemCommand::Join => write!(line, "join")?,
            ModemCommand::Uplink {
                payload,
                port,
                confirmed,
            } => {
                let mode = if *confirmed { "cnf" } else { "uncnf" };
                write!(line, "tx {mode} {port} ")?;
                for byte in payload {
                    write!(line, "{byte:02x}")?;
                }
            }
        }
        write!(line, "\r\n")?;
        Ok(line)
    }
}

/// One parsed line of modem output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModemLine {
    /// Command accepted.
    Ack,
    /// Command refused because the modem is mid-transaction.
    Busy,
    /// Command rejected.
    Error,
    /// Unsolicited MAC event.
    Event(LinkEvent),
}

/// Error raised for lines that match no known modem output.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ModemParseError;

impl fmt::Display for ModemParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unrecognized modem line")
    }
}

/// Parses one trimmed line of modem output.
pub fn parse_line(line: &str) -> Result<ModemLine, ModemParseError> {
    modem_line
        .parse(line.trim_ascii())
        .map_err(|_| ModemParseError)
}

fn modem_line(input: &mut &str) -> ModemResult<ModemLine> {
    alt((event.map(ModemLine::Event), response)).parse_next(input)
}

fn response(input: &mut &str) -> ModemResult<ModemLine> {
    alt((
        "ok".value(ModemLine::Ack),
        "busy".value(ModemLine::Busy),
        ("err", opt((space1, digit1))).value(ModemLine::Error),
    ))
    .parse_next(input)
}

fn event(input: &mut &str) -> ModemResult<LinkEvent> {
    preceded(
        ("ev", space1),
        alt((
            "joined".value(LinkEvent::Joined),
            "join_failed".value(LinkEvent::JoinFailed),
            txcomplete,
            "link_dead".value(LinkEvent::LinkDead),
            "link_alive".value(LinkEvent::LinkAlive),
            diagnostic,
        )),
    )
    .parse_next(input)
}

fn txcomplete(input: &mut &str) -> ModemResult<LinkEvent> {
    preceded("txcomplete", opt(preceded((space1, "rx="), downlink)))
        .map(|downlink| LinkEvent::TxComplete { downlink })
        .parse_next(input)
}

fn downlink(input: &mut &str) -> ModemResult<DownlinkFrame> {
    take_while(2.., |c: char| c.is_ascii_hexdigit())
        .verify_map(decode_hex)
        .parse_next(input)
}

fn diagnostic(input: &mut &str) -> ModemResult<LinkEvent> {
    alt((
        "scan_timeout".value(DiagnosticKind::ScanTimeout),
        "beacon_found".value(DiagnosticKind::BeaconFound),
        "beacon_missed".value(DiagnosticKind::BeaconMissed),
        "beacon_tracked".value(DiagnosticKind::BeaconTracked),
        "joining".value(DiagnosticKind::JoinStarted),
        "rejoin_failed".value(DiagnosticKind::RejoinFailed),
        "lost_tsync".value(DiagnosticKind::TimeSyncLost),
        "reset".value(DiagnosticKind::MacReset),
        "rxcomplete".value(DiagnosticKind::PingSlotRx),
    ))
    .map(LinkEvent::Diagnostic)
    .parse_next(input)
}

fn decode_hex(text: &str) -> Option<DownlinkFrame> {
    if text.len() % 2 != 0 || text.len() / 2 > MAX_DOWNLINK_LEN {
        return None;
    }

    let mut frame = DownlinkFrame::new();
    let mut offset = 0;
    while offset < text.len() {
        let byte = u8::from_str_radix(&text[offset..offset + 2], 16).ok()?;
        frame.push(byte).ok()?;
        offset += 2;
    }
    Some(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(line: &str) -> ModemLine {
        parse_line(line).expect("line should parse")
    }

    #[test]
    fn parses_command_responses() {
        assert_eq!(parse_ok("ok"), ModemLine::Ack);
        assert_eq!(parse_ok("busy"), ModemLine::Busy);
        assert_eq!(parse_ok("err"), ModemLine::Error);
        assert_eq!(parse_ok("err 3"), ModemLine::Error);
    }

    #[test]
    fn parses_session_events() {
        assert_eq!(parse_ok("ev joined"), ModemLine::Event(LinkEvent::Joined));
        assert_eq!(
            parse_ok("ev join_failed"),
            ModemLine::Event(LinkEvent::JoinFailed)
        );
        assert_eq!(
            parse_ok("ev link_dead"),
            ModemLine::Event(LinkEvent::LinkDead)
        );
        assert_eq!(
            parse_ok("ev link_alive"),
            ModemLine::Event(LinkEvent::LinkAlive)
        );
    }

    #[test]
    fn parses_txcomplete_without_downlink() {
        assert_eq!(
            parse_ok("ev txcomplete"),
            ModemLine::Event(LinkEvent::TxComplete { downlink: None })
        );
    }

    #[test]
    fn parses_txcomplete_with_downlink_bytes() {
        match parse_ok("ev txcomplete rx=cafe01") {
            ModemLine::Event(LinkEvent::TxComplete {
                downlink: Some(frame),
            }) => {
                assert_eq!(frame.as_slice(), &[0xCA, 0xFE, 0x01]);
            }
            other => panic!("unexpected line: {other:?}"),
        }
    }

    #[test]
    fn parses_diagnostic_tags() {
        let fixtures = [
            ("ev joining", DiagnosticKind::JoinStarted),
            ("ev scan_timeout", DiagnosticKind::ScanTimeout),
            ("ev beacon_found", DiagnosticKind::BeaconFound),
            ("ev beacon_missed", DiagnosticKind::BeaconMissed),
            ("ev beacon_tracked", DiagnosticKind::BeaconTracked),
            ("ev rejoin_failed", DiagnosticKind::RejoinFailed),
            ("ev lost_tsync", DiagnosticKind::TimeSyncLost),
            ("ev reset", DiagnosticKind::MacReset),
            ("ev rxcomplete", DiagnosticKind::PingSlotRx),
        ];

        for (line, kind) in fixtures {
            assert_eq!(
                parse_ok(line),
                ModemLine::Event(LinkEvent::Diagnostic(kind))
            );
        }
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(
            parse_ok("  ev joined \r"),
            ModemLine::Event(LinkEvent::Joined)
        );
    }

    #[test]
    fn rejects_unknown_lines() {
        assert_eq!(parse_line("ev warp_drive"), Err(ModemParseError));
        assert_eq!(parse_line("hello"), Err(ModemParseError));
        assert_eq!(parse_line("ev txcomplete rx=abc"), Err(ModemParseError));
    }

    #[test]
    fn renders_join_command() {
        let line = ModemCommand::Join.render().unwrap();
        assert_eq!(line.as_str(), "join\r\n");
    }

    #[test]
    fn renders_unconfirmed_uplink_command() {
        let payload = TxPayload::from_slice(&[0x01, 0x9C, 0x02, 0xE4]).unwrap();
        let command = ModemCommand::Uplink {
            payload,
            port: 1,
            confirmed: false,
        };
        assert_eq!(command.render().unwrap().as_str(), "tx uncnf 1 019c02e4\r\n");
    }

    #[test]
    fn renders_confirmed_uplink_command() {
        let payload = TxPayload::from_slice(&[0xFF]).unwrap();
        let command = ModemCommand::Uplink {
            payload,
            port: 42,
            confirmed: true,
        };
        assert_eq!(command.render().unwrap().as_str(), "tx cnf 42 ff\r\n");
    }
}
