mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use session::Session;

fn main() -> io::Result<()> {
    let interval = parse_interval().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("Usage: node-emulator [--interval <seconds>]");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(interval)?;
    let mut line = String::new();

    writeln!(
        writer,
        "Pressure Node Emulator ready. Type `help` for commands or `exit` to quit."
    )?;
    for response in session.startup_lines() {
        writeln!(writer, "{response}")?;
    }

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_interval() -> Result<Option<u64>, String> {
    let mut args = env::args().skip(1);
    let Some(arg) = args.next() else {
        return Ok(None);
    };

    if let Some(value) = arg.strip_prefix("--interval=") {
        parse_seconds(value).map(Some)
    } else if arg == "--interval" {
        if let Some(value) = args.next() {
            parse_seconds(&value).map(Some)
        } else {
            Err("Expected value after --interval".to_string())
        }
    } else {
        Err(format!("Unknown argument `{arg}`"))
    }
}

fn parse_seconds(value: &str) -> Result<u64, String> {
    value
        .parse::<u64>()
        .map_err(|_| format!("Invalid interval `{value}`"))
        .and_then(|seconds| {
            if seconds == 0 {
                Err("Interval must be at least one second".to_string())
            } else {
                Ok(seconds)
            }
        })
}
