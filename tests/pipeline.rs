//! End-to-end tests for the batch pipeline: source iterator → filter →
//! formatter → window accumulator → sink.
//!
//! Uses an in-memory counting source so head-window early termination can be
//! verified by how many records were actually pulled.

use std::cell::Cell;
use std::rc::Rc;

use chrono::{TimeZone, Utc};
use eventcat::core::event_record::EventRecord;
use eventcat::core::filter::{FilterArgs, FilterSpec};
use eventcat::core::window::WindowMode;
use eventcat::run::drain_records;
use eventcat::util::error::EventCatError;

fn record(record_id: u64, event_id: u32) -> EventRecord {
    EventRecord {
        record_id,
        log_name: "Application".into(),
        event_id,
        level: 4,
        level_name: Some("Information".into()),
        time_created: Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
        task_name: Some("General".into()),
        description: format!("record {record_id}"),
        provider_name: "TestProvider".into(),
        raw_xml: format!("<Event><System><EventRecordID>{record_id}</EventRecordID></System></Event>"),
    }
}

/// Wraps a record list and counts how many items the pipeline pulls.
struct CountingSource {
    records: std::vec::IntoIter<Result<EventRecord, EventCatError>>,
    reads: Rc<Cell<u64>>,
}

impl CountingSource {
    fn new(records: Vec<EventRecord>) -> (Self, Rc<Cell<u64>>) {
        let reads = Rc::new(Cell::new(0));
        let source = Self {
            records: records
                .into_iter()
                .map(Ok)
                .collect::<Vec<_>>()
                .into_iter(),
            reads: reads.clone(),
        };
        (source, reads)
    }
}

impl Iterator for CountingSource {
    type Item = Result<EventRecord, EventCatError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.records.next();
        if item.is_some() {
            self.reads.set(self.reads.get() + 1);
        }
        item
    }
}

fn lines(buf: &[u8]) -> Vec<String> {
    String::from_utf8(buf.to_vec())
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

#[test]
fn exclude_filter_omits_record_and_preserves_order() {
    let records: Vec<_> = [100u32, 101, 102, 103]
        .iter()
        .enumerate()
        .map(|(i, &id)| record(i as u64 + 1, id))
        .collect();
    let (source, _) = CountingSource::new(records);

    let filter = FilterSpec::build(&FilterArgs {
        exclude: Some("101"),
        ..Default::default()
    })
    .unwrap();

    let mut out = Vec::new();
    let outcome =
        drain_records(source, &filter, WindowMode::All, false, &mut out).unwrap();

    let emitted = lines(&out);
    assert_eq!(outcome.records_read, 4);
    assert_eq!(outcome.lines_emitted, 3);
    assert_eq!(emitted.len(), 3);
    assert!(emitted[0].contains(" 100 "));
    assert!(emitted[1].contains(" 102 "));
    assert!(emitted[2].contains(" 103 "));
    assert!(!emitted.iter().any(|l| l.contains(" 101 ")));
}

#[test]
fn tail_two_keeps_last_two_in_original_order() {
    let records: Vec<_> = (1..=5).map(|i| record(i, 1000)).collect();
    let (source, _) = CountingSource::new(records);

    let filter = FilterSpec::default();
    let mut out = Vec::new();
    drain_records(source, &filter, WindowMode::Tail(2), false, &mut out).unwrap();

    let emitted = lines(&out);
    assert_eq!(emitted.len(), 2);
    assert!(emitted[0].starts_with("#4:"));
    assert!(emitted[1].starts_with("#5:"));
}

#[test]
fn tail_larger_than_stream_yields_everything() {
    let records: Vec<_> = (1..=3).map(|i| record(i, 1000)).collect();
    let (source, _) = CountingSource::new(records);

    let mut out = Vec::new();
    drain_records(
        source,
        &FilterSpec::default(),
        WindowMode::Tail(10),
        false,
        &mut out,
    )
    .unwrap();

    assert_eq!(lines(&out).len(), 3);
}

#[test]
fn head_stops_reading_at_the_quota() {
    let records: Vec<_> = (1..=100).map(|i| record(i, 1000)).collect();
    let (source, reads) = CountingSource::new(records);

    let mut out = Vec::new();
    let outcome = drain_records(
        source,
        &FilterSpec::default(),
        WindowMode::Head(2),
        false,
        &mut out,
    )
    .unwrap();

    assert_eq!(outcome.lines_emitted, 2);
    assert_eq!(lines(&out).len(), 2);
    assert_eq!(
        reads.get(),
        2,
        "head must terminate the source read, not just the output"
    );
}

#[test]
fn head_larger_than_stream_emits_all() {
    let records: Vec<_> = (1..=3).map(|i| record(i, 1000)).collect();
    let (source, reads) = CountingSource::new(records);

    let mut out = Vec::new();
    drain_records(
        source,
        &FilterSpec::default(),
        WindowMode::Head(10),
        false,
        &mut out,
    )
    .unwrap();

    assert_eq!(lines(&out).len(), 3);
    assert_eq!(reads.get(), 3);
}

#[test]
fn source_error_is_fatal_for_the_source() {
    let items = vec![
        Ok(record(1, 1000)),
        Err(EventCatError::WindowsApi {
            hr: 0x80070005,
            context: "EvtNext".into(),
        }),
        Ok(record(2, 1000)),
    ];
    let source = items.into_iter();

    let mut out = Vec::new();
    let result = drain_records(
        source,
        &FilterSpec::default(),
        WindowMode::All,
        false,
        &mut out,
    );

    assert!(result.is_err());
    // The record ahead of the failure was already emitted (streaming).
    assert_eq!(lines(&out).len(), 1);
}

#[test]
fn dump_mode_emits_raw_xml() {
    let (source, _) = CountingSource::new(vec![record(7, 1000)]);

    let mut out = Vec::new();
    drain_records(
        source,
        &FilterSpec::default(),
        WindowMode::All,
        true,
        &mut out,
    )
    .unwrap();

    let emitted = lines(&out);
    assert_eq!(emitted.len(), 1);
    assert!(emitted[0].starts_with("<Event>"));
    assert!(emitted[0].contains("<EventRecordID>7</EventRecordID>"));
}

#[test]
fn date_window_excludes_out_of_range_records() {
    let mut old = record(1, 1000);
    old.time_created = Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).unwrap();
    let recent = record(2, 1000);
    let (source, _) = CountingSource::new(vec![old, recent]);

    let filter = FilterSpec::build(&FilterArgs {
        after: Some("20230101"),
        before: Some("20240101"),
        ..Default::default()
    })
    .unwrap();

    let mut out = Vec::new();
    let outcome =
        drain_records(source, &filter, WindowMode::All, false, &mut out).unwrap();

    assert_eq!(outcome.records_read, 2);
    assert_eq!(outcome.lines_emitted, 1);
    assert!(lines(&out)[0].starts_with("#2:"));
}
