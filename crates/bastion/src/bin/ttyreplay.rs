//! Replay a bastion recording as a timestamped, direction-coloured
//! timeline.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use bastion::config::BastionConfig;
use bastion::record::RecordReader;
use bastion::replay::{self, Timeline};
use clap::Parser;

/// Replay a bastion session recording.
#[derive(Debug, Parser)]
#[command(name = "ttyreplay", version, about)]
struct Cli {
    /// Recording file (ttyrecord-*).
    file: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = BastionConfig::from_env();
    if let Err(e) = bastion::logging::init(&config) {
        eprintln!("ttyreplay: {e}");
        return ExitCode::FAILURE;
    }

    let reader = match RecordReader::open(&cli.file) {
        Ok(reader) => reader.with_max_payload(config.max_entry),
        Err(e) => {
            eprintln!("ttyreplay: cannot open {}: {e}", cli.file.display());
            return ExitCode::FAILURE;
        }
    };

    let stdout = std::io::stdout();
    let colored = stdout.is_terminal();
    let mut out = stdout.lock();

    match replay::render(Timeline::new(reader), &mut out, colored) {
        Ok(summary) => {
            if let Some(e) = summary.malformed {
                tracing::debug!(error = %e, "recording ends with a malformed entry");
            }
            ExitCode::SUCCESS
        }
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ttyreplay: {e}");
            ExitCode::FAILURE
        }
    }
}
