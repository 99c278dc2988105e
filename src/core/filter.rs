//! Filter specification and XPath predicate construction.
//!
//! A [`FilterSpec`] holds the validated filter criteria for one invocation:
//! event-id include/exclude sets, a severity level, and date bounds. It is
//! built once from the raw option strings, compiled into the XPath predicate
//! the Evt* query API evaluates server-side, and applied a second time
//! in-memory as records stream through the pipeline.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::core::event_record::EventRecord;
use crate::util::error::EventCatError;
use crate::util::time::{format_xpath_timestamp, parse_compact_date};

/// Logical severity selector for the `-logLevel` option.
///
/// Maps to the ETW severity ordinals used by the `Level` element of the
/// event XML: error=2, warn=3, info=4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelFilter {
    /// No level constraint.
    #[default]
    Any,
    Info,
    Warn,
    Error,
}

impl LevelFilter {
    /// Parse a `-logLevel` token. Unrecognized tokens are a filter error.
    pub fn from_token(token: &str) -> Result<Self, EventCatError> {
        match token {
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(EventCatError::InvalidFilter(format!(
                "logLevel must be one of info, warn, error (got '{other}')"
            ))),
        }
    }

    /// The numeric severity ordinal this level matches, or `None` for
    /// [`LevelFilter::Any`].
    pub fn severity(self) -> Option<u8> {
        match self {
            Self::Any => None,
            Self::Error => Some(2),
            Self::Warn => Some(3),
            Self::Info => Some(4),
        }
    }
}

/// Raw, unparsed filter option strings as collected from the command line.
///
/// `None` means the option was absent; [`FilterSpec::build`] validates and
/// parses every present value.
#[derive(Debug, Clone, Default)]
pub struct FilterArgs<'a> {
    pub include: Option<&'a str>,
    pub exclude: Option<&'a str>,
    pub log_level: Option<&'a str>,
    pub before: Option<&'a str>,
    pub after: Option<&'a str>,
    pub between: Option<&'a str>,
}

/// Validated filter criteria for one invocation. Read-only after
/// construction.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    /// Event IDs to include. Empty means "include all". Ordered so the
    /// built predicate is deterministic.
    pub include_ids: BTreeSet<u32>,

    /// Event IDs to exclude. Applied on top of the include set:
    /// a record matches iff `id ∈ include` (when non-empty) and
    /// `id ∉ exclude`.
    pub exclude_ids: BTreeSet<u32>,

    /// Severity constraint.
    pub level: LevelFilter,

    /// Inclusive lower time bound (UTC midnight of the `-after` /
    /// `-between` start date).
    pub after: Option<DateTime<Utc>>,

    /// Inclusive upper time bound (UTC midnight of the `-before` /
    /// `-between` end date).
    pub before: Option<DateTime<Utc>>,
}

impl FilterSpec {
    /// Build a validated spec from raw option strings.
    ///
    /// `-between` contributes both bounds; when combined with an explicit
    /// `-before`/`-after` all clauses are ANDed, so the tightest bound wins.
    ///
    /// # Errors
    /// [`EventCatError::InvalidFilter`] on a malformed `yyyyMMdd` date, a
    /// `between` value without exactly two parseable dates, a non-numeric
    /// event id, or an unrecognized level token.
    pub fn build(args: &FilterArgs<'_>) -> Result<Self, EventCatError> {
        let mut spec = FilterSpec {
            include_ids: parse_id_list(args.include, "include")?,
            exclude_ids: parse_id_list(args.exclude, "exclude")?,
            ..Default::default()
        };

        if let Some(token) = args.log_level {
            spec.level = LevelFilter::from_token(token)?;
        }

        if let Some(raw) = args.after {
            spec.tighten_after(parse_filter_date(raw, "after")?);
        }
        if let Some(raw) = args.before {
            spec.tighten_before(parse_filter_date(raw, "before")?);
        }
        if let Some(raw) = args.between {
            let (start, end) = parse_between(raw)?;
            spec.tighten_after(start);
            spec.tighten_before(end);
        }

        Ok(spec)
    }

    /// `true` when no criterion is active and the predicate matches all.
    pub fn is_empty(&self) -> bool {
        self.include_ids.is_empty()
            && self.exclude_ids.is_empty()
            && self.level == LevelFilter::Any
            && self.after.is_none()
            && self.before.is_none()
    }

    /// Compile the spec into the XPath predicate evaluated by the Event Log
    /// API. Unconstrained clauses are omitted entirely; an empty spec yields
    /// the match-all query `*`.
    pub fn build_xpath_query(&self) -> String {
        let mut conditions = Vec::new();

        if !self.include_ids.is_empty() {
            let ids: Vec<String> = self
                .include_ids
                .iter()
                .map(|id| format!("EventID={id}"))
                .collect();
            conditions.push(format!("({})", ids.join(" or ")));
        }
        if !self.exclude_ids.is_empty() {
            let ids: Vec<String> = self
                .exclude_ids
                .iter()
                .map(|id| format!("EventID={id}"))
                .collect();
            conditions.push(format!("not({})", ids.join(" or ")));
        }

        if let Some(severity) = self.level.severity() {
            conditions.push(format!("Level={severity}"));
        }

        if let Some(after) = &self.after {
            conditions.push(format!(
                "TimeCreated[@SystemTime>='{}']",
                format_xpath_timestamp(after)
            ));
        }
        if let Some(before) = &self.before {
            conditions.push(format!(
                "TimeCreated[@SystemTime<='{}']",
                format_xpath_timestamp(before)
            ));
        }

        if conditions.is_empty() {
            "*".to_string()
        } else {
            format!("*[System[{}]]", conditions.join(" and "))
        }
    }

    /// Test whether the given record matches **all** active criteria.
    ///
    /// Same semantics as the compiled XPath predicate; applied in-memory as
    /// records stream through the pipeline. Checks are ordered cheapest-first
    /// for short-circuit efficiency.
    pub fn matches(&self, record: &EventRecord) -> bool {
        if let Some(severity) = self.level.severity() {
            if record.level != severity {
                return false;
            }
        }

        if !self.include_ids.is_empty() && !self.include_ids.contains(&record.event_id) {
            return false;
        }
        if self.exclude_ids.contains(&record.event_id) {
            return false;
        }

        if let Some(after) = &self.after {
            if record.time_created < *after {
                return false;
            }
        }
        if let Some(before) = &self.before {
            if record.time_created > *before {
                return false;
            }
        }

        true
    }

    fn tighten_after(&mut self, bound: DateTime<Utc>) {
        self.after = Some(match self.after {
            Some(existing) => existing.max(bound),
            None => bound,
        });
    }

    fn tighten_before(&mut self, bound: DateTime<Utc>) {
        self.before = Some(match self.before {
            Some(existing) => existing.min(bound),
            None => bound,
        });
    }
}

/// Parse a comma-separated event-id list (`"1001,4625"`) into an ordered set.
fn parse_id_list(raw: Option<&str>, option: &str) -> Result<BTreeSet<u32>, EventCatError> {
    let mut ids = BTreeSet::new();
    let Some(raw) = raw else {
        return Ok(ids);
    };

    for token in raw.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let id: u32 = token.parse().map_err(|_| {
            EventCatError::InvalidFilter(format!("{option} must list numeric event ids (got '{token}')"))
        })?;
        ids.insert(id);
    }

    Ok(ids)
}

/// Parse one `yyyyMMdd` filter date, naming the offending option on failure.
fn parse_filter_date(raw: &str, option: &str) -> Result<DateTime<Utc>, EventCatError> {
    parse_compact_date(raw).ok_or_else(|| {
        EventCatError::InvalidFilter(format!("{option} must be a yyyyMMdd date (got '{raw}')"))
    })
}

/// Parse a `-between=yyyyMMdd,yyyyMMdd` pair. Exactly two well-formed dates
/// are required; the pair is normalised so start <= end.
fn parse_between(raw: &str) -> Result<(DateTime<Utc>, DateTime<Utc>), EventCatError> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 2 {
        return Err(EventCatError::InvalidFilter(format!(
            "between must supply exactly two yyyyMMdd dates (got '{raw}')"
        )));
    }
    let first = parse_filter_date(parts[0].trim(), "between")?;
    let second = parse_filter_date(parts[1].trim(), "between")?;
    Ok(if first <= second {
        (first, second)
    } else {
        (second, first)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_record(event_id: u32, level: u8) -> EventRecord {
        EventRecord {
            record_id: 1,
            log_name: "Application".into(),
            event_id,
            level,
            level_name: None,
            time_created: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            task_name: None,
            description: String::new(),
            provider_name: "TestProvider".into(),
            raw_xml: String::new(),
        }
    }

    #[test]
    fn test_empty_spec_matches_all() {
        let spec = FilterSpec::build(&FilterArgs::default()).unwrap();
        assert!(spec.is_empty());
        assert_eq!(spec.build_xpath_query(), "*");
        assert!(spec.matches(&make_record(1001, 4)));
    }

    #[test]
    fn test_include_clause() {
        let spec = FilterSpec::build(&FilterArgs {
            include: Some("101,100"),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            spec.build_xpath_query(),
            "*[System[(EventID=100 or EventID=101)]]"
        );
    }

    #[test]
    fn test_include_and_exclude_clause() {
        let spec = FilterSpec::build(&FilterArgs {
            include: Some("100,102"),
            exclude: Some("101"),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            spec.build_xpath_query(),
            "*[System[(EventID=100 or EventID=102) and not(EventID=101)]]"
        );
    }

    #[test]
    fn test_include_exclude_matching() {
        let spec = FilterSpec::build(&FilterArgs {
            include: Some("100,101"),
            exclude: Some("101"),
            ..Default::default()
        })
        .unwrap();
        assert!(spec.matches(&make_record(100, 4)));
        assert!(!spec.matches(&make_record(101, 4)), "excluded id wins");
        assert!(!spec.matches(&make_record(102, 4)), "not in include set");
    }

    #[test]
    fn test_level_clause() {
        let spec = FilterSpec::build(&FilterArgs {
            log_level: Some("warn"),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(spec.build_xpath_query(), "*[System[Level=3]]");
        assert!(spec.matches(&make_record(1, 3)));
        assert!(!spec.matches(&make_record(1, 4)));
    }

    #[test]
    fn test_bad_level_token_rejected() {
        let err = FilterSpec::build(&FilterArgs {
            log_level: Some("fatal"),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, EventCatError::InvalidFilter(_)));
    }

    #[test]
    fn test_date_bounds_clause() {
        let spec = FilterSpec::build(&FilterArgs {
            before: Some("20240101"),
            after: Some("20230101"),
            ..Default::default()
        })
        .unwrap();
        let query = spec.build_xpath_query();
        assert!(query.contains("@SystemTime>='2023-01-01T00:00:00.000Z'"));
        assert!(query.contains("@SystemTime<='2024-01-01T00:00:00.000Z'"));
    }

    #[test]
    fn test_date_bounds_exclude_old_record() {
        let spec = FilterSpec::build(&FilterArgs {
            before: Some("20240101"),
            after: Some("20230101"),
            ..Default::default()
        })
        .unwrap();
        let mut record = make_record(1, 4);
        record.time_created = Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).unwrap();
        assert!(!spec.matches(&record));
        record.time_created = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        assert!(spec.matches(&record));
    }

    #[test]
    fn test_between_requires_two_dates() {
        for raw in ["20230101", "20230101,20240101,20250101", "20230101,nope"] {
            let err = FilterSpec::build(&FilterArgs {
                between: Some(raw),
                ..Default::default()
            })
            .unwrap_err();
            assert!(matches!(err, EventCatError::InvalidFilter(_)), "raw: {raw}");
        }
    }

    #[test]
    fn test_between_sets_both_bounds() {
        let spec = FilterSpec::build(&FilterArgs {
            between: Some("20240101,20230101"), // reversed on purpose
            ..Default::default()
        })
        .unwrap();
        let query = spec.build_xpath_query();
        assert!(query.contains(">='2023-01-01"));
        assert!(query.contains("<='2024-01-01"));
    }

    #[test]
    fn test_malformed_date_rejected() {
        let err = FilterSpec::build(&FilterArgs {
            before: Some("01-01-2024"),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, EventCatError::InvalidFilter(_)));
    }

    #[test]
    fn test_non_numeric_id_rejected() {
        let err = FilterSpec::build(&FilterArgs {
            include: Some("100,abc"),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, EventCatError::InvalidFilter(_)));
    }
}
