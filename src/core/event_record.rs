//! Canonical data structure for a single Windows Event Log entry.
//!
//! Every entry is parsed from the XML rendered by `EvtRender` into this
//! struct. It carries the structured fields needed by the compact output
//! line plus the original raw XML for dump output.

use chrono::{DateTime, Utc};

/// Represents a single parsed Windows Event Log entry.
///
/// Records are created by a log source per yielded item, handed to the
/// formatter, and discarded.
#[derive(Debug, Clone)]
pub struct EventRecord {
    /// Position of this record within its log, as assigned by the OS.
    pub record_id: u64,

    /// The log this event came from: a channel name (`"Application"`) or,
    /// for offline sources, the archive file it was read from.
    pub log_name: String,

    /// Event ID — the numeric identifier for this event type.
    pub event_id: u32,

    /// Raw severity ordinal:
    /// - 0 = LogAlways
    /// - 1 = Critical
    /// - 2 = Error
    /// - 3 = Warning
    /// - 4 = Informational
    /// - 5 = Verbose
    pub level: u8,

    /// Display name for [`level`](Self::level), resolved from publisher
    /// metadata. `None` when the lookup fails; the formatter falls back to
    /// the raw numeric level.
    pub level_name: Option<String>,

    /// Timestamp of the event in UTC.
    pub time_created: DateTime<Utc>,

    /// Task display name, resolved from publisher metadata. `None` when the
    /// lookup fails; the formatter substitutes `---`.
    pub task_name: Option<String>,

    /// The rendered description. When the publisher's message template is
    /// unavailable this holds the lookup error's message instead.
    pub description: String,

    /// The event provider / source name.
    pub provider_name: String,

    /// Raw XML string as returned by `EvtRender` — emitted verbatim in dump
    /// mode.
    pub raw_xml: String,
}
