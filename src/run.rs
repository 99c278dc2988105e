//! Command driver: wires log sources through the filter, formatter, window
//! accumulator, and output sink.
//!
//! The batch pipeline is a single-threaded synchronous pull — no shared
//! mutable state, no locking. [`drain_records`] is the platform-independent
//! heart of it; the command dispatch around it opens real Evt* sources and
//! so only exists on Windows.

use std::io::Write;

use crate::core::event_record::EventRecord;
use crate::core::filter::FilterSpec;
use crate::core::format::render_line;
use crate::core::window::{WindowAccumulator, WindowMode};
use crate::opts::CliOptions;
use crate::util::error::Result;

/// Counters for one drained source.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Records pulled from the source. Under a head window iteration stops
    /// as soon as the quota is emitted; nothing is read past that point.
    pub records_read: u64,
    /// Lines actually written to the sink.
    pub lines_emitted: u64,
}

/// Pull one source to completion (or to its head quota) through the filter,
/// formatter, and window into the sink.
///
/// An `Err` item from the source is fatal for that source and is propagated
/// as-is; any lines a tail window was still holding are discarded with it.
/// Sink write failures abort via `?` as well — those are fatal for the whole
/// run, which the caller distinguishes by the error variant.
pub fn drain_records<I>(
    records: I,
    filter: &FilterSpec,
    window: WindowMode,
    dump: bool,
    sink: &mut dyn Write,
) -> Result<StreamOutcome>
where
    I: IntoIterator<Item = Result<EventRecord>>,
{
    let mut accumulator = WindowAccumulator::new(window);
    let mut outcome = StreamOutcome::default();

    for item in records {
        let record = item?;
        outcome.records_read += 1;

        if !filter.matches(&record) {
            continue;
        }

        let line = render_line(&record, dump);
        if let Some(out) = accumulator.offer(line) {
            writeln!(sink, "{out}")?;
            outcome.lines_emitted += 1;
        }

        if accumulator.is_complete() {
            // Head quota reached: stop pulling. Dropping the source closes
            // its handles without reading further records.
            break;
        }
    }

    for line in accumulator.into_remainder() {
        writeln!(sink, "{line}")?;
        outcome.lines_emitted += 1;
    }

    Ok(outcome)
}

#[cfg(windows)]
pub use windows_impl::dispatch;

#[cfg(windows)]
mod windows_impl {
    use super::*;

    use crate::core::channels;
    use crate::core::event_stream::EventStream;
    use crate::core::source::SourceDescriptor;
    use crate::core::tail;
    use crate::export::sink::OutputSink;
    use crate::opts::Command;
    use crate::util::cancel::CancelToken;
    use crate::util::error::EventCatError;

    /// Run the validated command.
    pub fn dispatch(opts: &CliOptions) -> Result<()> {
        match opts.command {
            Command::List => cmd_list(),
            Command::ReadAll => cmd_read_all(opts),
            Command::Read => cmd_read(opts),
        }
    }

    /// `list`: every configured channel with its record count.
    fn cmd_list() -> Result<()> {
        let channels = channels::list_channels()?;
        println!("Slno logName:numberofEvents");
        for (i, info) in channels.iter().enumerate() {
            println!("{} {}:{}", i + 1, info.name, info.record_count);
        }
        Ok(())
    }

    /// `readAll`: every channel currently holding records, sequentially.
    fn cmd_read_all(opts: &CliOptions) -> Result<()> {
        for info in channels::list_channels()? {
            if info.record_count > 0 {
                report_or_abort(&info.name, process_channel(&info.name, opts))?;
            }
        }
        Ok(())
    }

    /// `read`: one live channel (batch or follow) or one offline path.
    fn cmd_read(opts: &CliOptions) -> Result<()> {
        if let Some(path) = &opts.input.source_path {
            let descriptor = SourceDescriptor::from_path(path)?;
            return process_descriptor(&descriptor, opts);
        }

        // Option validation guarantees a log name at this point.
        let log_name = opts.input.log_name.as_deref().ok_or_else(|| {
            EventCatError::Config("read requires one of logName or sourcePath".into())
        })?;

        if opts.output.follow() {
            tail_live(log_name, opts)
        } else {
            process_channel(log_name, opts)
        }
    }

    /// Per-source isolation: source failures are reported and skipped so the
    /// remaining sources still run; sink I/O failures abort the whole run.
    fn report_or_abort(label: &str, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(e @ EventCatError::Io(_)) => Err(e),
            Err(e) => {
                tracing::error!("Skipping '{}': {}", label, e);
                Ok(())
            }
        }
    }

    fn process_descriptor(descriptor: &SourceDescriptor, opts: &CliOptions) -> Result<()> {
        match descriptor {
            SourceDescriptor::OfflineFile(path) => {
                tracing::info!("Processing file: {}", path.display());
                let query = opts.filter.build_xpath_query();
                let stream = EventStream::open_file(path, &query)?;
                emit_stream(stream, &descriptor.label(), opts)
            }
            SourceDescriptor::OfflineDirectory(_) => {
                // One archive failing to open must not abort the others.
                for inner in descriptor.clone().expand()? {
                    let label = inner.label();
                    report_or_abort(&label, process_descriptor(&inner, opts))?;
                }
                Ok(())
            }
            SourceDescriptor::OnlineChannel(name) => process_channel(name, opts),
        }
    }

    fn process_channel(channel: &str, opts: &CliOptions) -> Result<()> {
        tracing::info!("Processing live {} logs", channel);
        let query = opts.filter.build_xpath_query();
        let stream = EventStream::open_channel(channel, &query)?;
        let label = SourceDescriptor::OnlineChannel(channel.to_string()).label();
        emit_stream(stream, &label, opts)
    }

    fn emit_stream(stream: EventStream, label: &str, opts: &CliOptions) -> Result<()> {
        let mut sink = OutputSink::open(opts.output.export_loc.as_deref(), label)?;
        let outcome = drain_records(
            stream,
            &opts.filter,
            opts.output.window_mode(),
            opts.output.dump,
            &mut sink,
        )?;
        sink.finish()?;
        tracing::info!(
            "{}: {} records read, {} lines emitted",
            label,
            outcome.records_read,
            outcome.lines_emitted
        );
        Ok(())
    }

    fn tail_live(channel: &str, opts: &CliOptions) -> Result<()> {
        let query = opts.filter.build_xpath_query();
        let label = SourceDescriptor::OnlineChannel(channel.to_string()).label();
        let mut sink = OutputSink::open(opts.output.export_loc.as_deref(), &label)?;
        let cancel = CancelToken::new();
        tail::tail_channel(channel, &query, &cancel, &mut sink)?;
        sink.finish()
    }
}

/// The Evt* API only exists on Windows; everything upstream of the sources
/// (option validation, predicate building) has already run by the time this
/// is reached.
#[cfg(not(windows))]
pub fn dispatch(_opts: &CliOptions) -> Result<()> {
    Err(crate::util::error::EventCatError::Config(
        "eventcat reads the Windows Event Log and only runs on Windows".into(),
    ))
}
