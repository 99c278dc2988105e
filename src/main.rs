//! eventcat — read, filter and tail Windows Event Logs from the command line.
//!
//! Entry point: initialises structured logging on stderr, parses the
//! `-key=value` options, and dispatches the requested command. Record lines
//! are the only thing written to stdout.

use std::process::ExitCode;

use eventcat::util::constants;
use eventcat::{opts, run};

fn main() -> ExitCode {
    init_logging();
    tracing::debug!("{} v{} starting", constants::APP_NAME, constants::APP_VERSION);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("{}", opts::usage());
        return ExitCode::FAILURE;
    }

    let options = match opts::parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("{}", opts::usage());
            return ExitCode::FAILURE;
        }
    };

    match run::dispatch(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialise the tracing subscriber: stderr only, `info` by default,
/// overridable via `RUST_LOG`.
fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
