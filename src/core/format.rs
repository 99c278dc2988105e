//! Rendering of one [`EventRecord`] into an output line.
//!
//! Two forms: the compact single-line summary and the full raw-XML dump.
//! Fields whose metadata lookup failed upstream are substituted here —
//! a record is always printable, whatever state its publisher is in.

use crate::core::event_record::EventRecord;
use crate::util::constants::TASK_NAME_FALLBACK;
use crate::util::time::format_event_timestamp;

/// Render the compact one-line form:
///
/// `#<recordId>: <logName> <level> <timeCreated> <eventId> [<taskName>] <description> <providerName>`
///
/// A missing level display name falls back to the raw numeric level; a
/// missing task name to `---`.
pub fn compact_line(record: &EventRecord) -> String {
    let level = match &record.level_name {
        Some(name) => name.clone(),
        None => record.level.to_string(),
    };
    let task = record.task_name.as_deref().unwrap_or(TASK_NAME_FALLBACK);

    format!(
        "#{}: {} {} {} {} [{}] {} {}",
        record.record_id,
        record.log_name,
        level,
        format_event_timestamp(&record.time_created),
        record.event_id,
        task,
        record.description,
        record.provider_name,
    )
}

/// Render the dump form: the record's raw event XML, verbatim.
pub fn dump_record(record: &EventRecord) -> String {
    record.raw_xml.trim_end().to_string()
}

/// Render one record in the requested form.
pub fn render_line(record: &EventRecord, dump: bool) -> String {
    if dump {
        dump_record(record)
    } else {
        compact_line(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn make_record() -> EventRecord {
        EventRecord {
            record_id: 42,
            log_name: "Application".into(),
            event_id: 1001,
            level: 2,
            level_name: Some("Error".into()),
            time_created: Utc.with_ymd_and_hms(2024, 1, 15, 10, 23, 45).unwrap(),
            task_name: Some("General".into()),
            description: "Something happened".into(),
            provider_name: "TestProvider".into(),
            raw_xml: "<Event><System/></Event>\r\n".into(),
        }
    }

    #[test]
    fn test_compact_line_layout() {
        let line = compact_line(&make_record());
        assert_eq!(
            line,
            "#42: Application Error 2024-01-15 10:23:45.000Z 1001 [General] Something happened TestProvider"
        );
    }

    #[test]
    fn test_missing_task_name_falls_back() {
        let mut record = make_record();
        record.task_name = None;
        assert!(compact_line(&record).contains("[---]"));
    }

    #[test]
    fn test_missing_level_name_falls_back_to_numeric() {
        let mut record = make_record();
        record.level_name = None;
        assert!(compact_line(&record).contains("Application 2 2024-01-15"));
    }

    #[test]
    fn test_dump_emits_raw_xml() {
        let record = make_record();
        assert_eq!(dump_record(&record), "<Event><System/></Event>");
        assert_eq!(render_line(&record, true), "<Event><System/></Event>");
    }
}
