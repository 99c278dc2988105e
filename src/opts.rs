//! Command-line option parsing and validation.
//!
//! Options follow the `-key=value` convention. Parsing collects the raw
//! pairs, rejecting unknown or duplicate keys, then each option group
//! validates itself. Every validation failure is an
//! [`EventCatError::Config`] raised before any source is opened — the
//! caller prints the reason plus [`usage`] and exits non-zero.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::core::filter::{FilterArgs, FilterSpec};
use crate::core::window::WindowMode;
use crate::util::constants::APP_NAME;
use crate::util::error::{EventCatError, Result};

/// Every recognised option key.
const KNOWN_KEYS: &[&str] = &[
    "-cmd",
    // Input
    "-logName",
    "-sourcePath",
    // Output
    "-exportLoc",
    "-tail",
    "-head",
    "-dump",
    // Filter conditions
    "-include",
    "-exclude",
    "-logLevel",
    "-before",
    "-after",
    "-between",
];

/// Which top-level command to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Enumerate live channels with their record counts.
    List,
    /// Process exactly one `-logName` or `-sourcePath`.
    Read,
    /// Process every live channel holding at least one record.
    ReadAll,
}

impl Command {
    fn from_token(token: &str) -> Result<Self> {
        match token {
            "list" => Ok(Self::List),
            "read" => Ok(Self::Read),
            "readAll" => Ok(Self::ReadAll),
            other => Err(EventCatError::Config(format!(
                "cmd must be one of list, read, readAll (got '{other}')"
            ))),
        }
    }
}

/// The `-tail` option: a line count, or `f` for follow mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailSpec {
    Lines(usize),
    Follow,
}

/// Which source the `read` command processes.
#[derive(Debug, Clone, Default)]
pub struct InputOptions {
    pub log_name: Option<String>,
    pub source_path: Option<PathBuf>,
}

/// Output shaping: export location, windowing, and dump mode.
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    pub export_loc: Option<PathBuf>,
    pub head: Option<usize>,
    pub tail: Option<TailSpec>,
    pub dump: bool,
}

impl OutputOptions {
    /// `true` when `-tail=f` selected continuous live delivery.
    pub fn follow(&self) -> bool {
        matches!(self.tail, Some(TailSpec::Follow))
    }

    /// The window applied to a batch read. Follow mode bypasses the
    /// accumulator entirely and never consults this.
    pub fn window_mode(&self) -> WindowMode {
        match (self.head, self.tail) {
            (Some(n), _) => WindowMode::Head(n),
            (None, Some(TailSpec::Lines(n))) => WindowMode::Tail(n),
            _ => WindowMode::All,
        }
    }
}

/// Fully parsed and validated options for one invocation.
#[derive(Debug, Clone)]
pub struct CliOptions {
    pub command: Command,
    pub input: InputOptions,
    pub output: OutputOptions,
    pub filter: FilterSpec,
}

/// Parse and validate the raw argument list (without the program name).
pub fn parse_args(args: &[String]) -> Result<CliOptions> {
    let map = collect_pairs(args)?;

    let command = match map.get("-cmd") {
        Some(token) => Command::from_token(token)?,
        None => {
            return Err(EventCatError::Config(
                "cmd must be one of list, read, readAll".into(),
            ))
        }
    };

    let input = InputOptions {
        log_name: map.get("-logName").cloned().filter(|s| !s.is_empty()),
        source_path: map
            .get("-sourcePath")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from),
    };

    let output = build_output_options(&map)?;

    let filter = FilterSpec::build(&FilterArgs {
        include: map.get("-include").map(String::as_str),
        exclude: map.get("-exclude").map(String::as_str),
        log_level: map.get("-logLevel").map(String::as_str),
        before: map.get("-before").map(String::as_str),
        after: map.get("-after").map(String::as_str),
        between: map.get("-between").map(String::as_str),
    })?;

    let opts = CliOptions {
        command,
        input,
        output,
        filter,
    };
    validate_combination(&opts)?;
    Ok(opts)
}

/// Split `-key=value` arguments into a map, rejecting unknown and duplicate
/// keys.
fn collect_pairs(args: &[String]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for arg in args {
        let (key, value) = match arg.split_once('=') {
            Some((k, v)) => (k, v),
            None => (arg.as_str(), ""),
        };
        if !KNOWN_KEYS.contains(&key) {
            return Err(EventCatError::Config(format!("Unknown input {key}")));
        }
        if map.insert(key.to_string(), value.to_string()).is_some() {
            return Err(EventCatError::Config(format!("{key} given more than once")));
        }
    }
    Ok(map)
}

fn build_output_options(map: &HashMap<String, String>) -> Result<OutputOptions> {
    let mut output = OutputOptions {
        dump: map.get("-dump").map(|v| v == "true").unwrap_or(false),
        ..Default::default()
    };

    if let Some(loc) = map.get("-exportLoc").filter(|s| !s.is_empty()) {
        let dir = PathBuf::from(loc);
        if !dir.is_dir() {
            return Err(EventCatError::Config(format!(
                "exportLoc {loc} does not exist"
            )));
        }
        output.export_loc = Some(dir);
    }

    if let Some(raw) = map.get("-head").filter(|s| !s.is_empty()) {
        output.head = Some(parse_positive(raw, "head")?);
    }

    if let Some(raw) = map.get("-tail").filter(|s| !s.is_empty()) {
        output.tail = Some(if raw.eq_ignore_ascii_case("f") {
            TailSpec::Follow
        } else {
            TailSpec::Lines(parse_positive(raw, "tail")?)
        });
    }

    if output.head.is_some() && output.tail.is_some() {
        return Err(EventCatError::Config(
            "Either head or tail, not both, can be specified".into(),
        ));
    }

    Ok(output)
}

fn parse_positive(raw: &str, option: &str) -> Result<usize> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(EventCatError::Config(format!(
            "{option} must be a positive integer (got '{raw}')"
        ))),
    }
}

/// Cross-option rules that depend on the command.
fn validate_combination(opts: &CliOptions) -> Result<()> {
    if opts.command == Command::Read {
        match (&opts.input.log_name, &opts.input.source_path) {
            (None, None) => {
                return Err(EventCatError::Config(
                    "read requires one of logName or sourcePath".into(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(EventCatError::Config(
                    "Only one of logName and sourcePath can be specified".into(),
                ))
            }
            _ => {}
        }
    }

    // Follow mode is a standing subscription against a live channel.
    if opts.output.follow() && (opts.command != Command::Read || opts.input.log_name.is_none()) {
        return Err(EventCatError::Config(
            "tail=f requires cmd=read with a logName".into(),
        ));
    }

    Ok(())
}

/// The usage text printed on any configuration error.
pub fn usage() -> String {
    let options = [
        "-cmd=<list|read|readAll> where list finds configured logs, read processes one log and readAll processes every configured log with events",
        "-logName=<live windows event log name>",
        "-sourcePath=<folder or file to scan for offline log files>",
        "-exportLoc=<output folder location>",
        "-tail=<nn number of lines or f to follow>",
        "-head=<nn number of lines>",
        "-dump=<true>",
        "-include=<eventId1,eventId2,...>",
        "-exclude=<eventId1,eventId2,...>",
        "-logLevel=<info|warn|error>",
        "-before=<yyyyMMdd>",
        "-after=<yyyyMMdd>",
        "-between=<yyyyMMdd1,yyyyMMdd2>",
    ];

    let mut text = format!("Usage: {APP_NAME} ");
    text.push_str(
        &options
            .iter()
            .map(|opt| format!("[{opt}]"))
            .collect::<Vec<_>>()
            .join(",\n"),
    );
    text
}
