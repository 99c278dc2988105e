//! XML parser for Windows Event Log entries.
//!
//! Converts the raw XML string returned by `EvtRender` into a typed
//! [`EventRecord`]. Uses `roxmltree` for fast, zero-allocation-friendly
//! XML parsing.

use crate::core::event_record::EventRecord;
use crate::util::error::EventCatError;
use chrono::{DateTime, Utc};

/// Parse a raw event XML string (from `EvtRender`) into an [`EventRecord`].
///
/// The XML follows the Windows Event Log schema:
/// ```xml
/// <Event xmlns="http://schemas.microsoft.com/win/2004/08/events/event">
///   <System>
///     <Provider Name="..." />
///     <EventID>1001</EventID>
///     <Level>2</Level>
///     <EventRecordID>98</EventRecordID>
///     <TimeCreated SystemTime="2024-01-15T10:23:45.1234567Z" />
///     ...
///   </System>
///   <EventData>
///     <Data Name="key">value</Data>
///     ...
///   </EventData>
/// </Event>
/// ```
///
/// `log_name` is used as the record's log when the XML carries no
/// `<Channel>` element (the usual case for offline archives).
///
/// The description defaults to a concatenation of the `<EventData>` values;
/// sources that resolve the publisher's message template overwrite it along
/// with the level and task display names.
///
/// # Errors
/// Returns [`EventCatError::XmlParse`] if the XML is malformed or missing
/// required elements.
pub fn parse_event_xml(xml: &str, log_name: &str) -> Result<EventRecord, EventCatError> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| EventCatError::XmlParse(format!("Failed to parse XML: {e}")))?;

    let root = doc.root_element();

    // Find the <System> element (may be namespace-qualified)
    let system = find_child(&root, "System")
        .ok_or_else(|| EventCatError::XmlParse("Missing <System> element".into()))?;

    // Provider name
    let provider_name = find_child(&system, "Provider")
        .and_then(|p| p.attribute("Name").map(String::from))
        .unwrap_or_default();

    // Event ID — may have a Qualifiers attribute; we want the text content
    let event_id: u32 = find_child(&system, "EventID")
        .and_then(|e| e.text())
        .and_then(|t| t.trim().parse().ok())
        .unwrap_or(0);

    // Level
    let level: u8 = find_child(&system, "Level")
        .and_then(|e| e.text())
        .and_then(|t| t.trim().parse().ok())
        .unwrap_or(0);

    // Record ID
    let record_id: u64 = find_child(&system, "EventRecordID")
        .and_then(|e| e.text())
        .and_then(|t| t.trim().parse().ok())
        .unwrap_or(0);

    // TimeCreated
    let time_created = find_child(&system, "TimeCreated")
        .and_then(|e| e.attribute("SystemTime"))
        .and_then(parse_system_time)
        .unwrap_or_else(Utc::now);

    // Log name (from XML, falling back to the parameter)
    let xml_channel = find_child(&system, "Channel")
        .and_then(|e| e.text())
        .unwrap_or("")
        .to_string();
    let log_name = if xml_channel.is_empty() {
        log_name.to_string()
    } else {
        xml_channel
    };

    // Default description: concatenated event data values. Sources with
    // access to publisher metadata replace this with the rendered template.
    let description = event_data_summary(&root);

    Ok(EventRecord {
        record_id,
        log_name,
        event_id,
        level,
        level_name: None,
        time_created,
        task_name: None,
        description,
        provider_name,
        raw_xml: xml.to_string(),
    })
}

/// Find a direct child element by local name, ignoring namespace.
fn find_child<'a>(
    parent: &'a roxmltree::Node<'a, 'a>,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    parent
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == local_name)
}

/// Parse the `SystemTime` attribute from `<TimeCreated>`.
///
/// Windows uses ISO 8601 format with varying precision:
/// - `2024-01-15T10:23:45.1234567Z`
/// - `2024-01-15T10:23:45.123Z`
/// - `2024-01-15T10:23:45Z`
fn parse_system_time(s: &str) -> Option<DateTime<Utc>> {
    // Try parsing with fractional seconds (chrono handles variable precision)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // Windows sometimes emits 7-digit fractional seconds which RFC3339 doesn't
    // handle. Truncate to 6 digits (microseconds) and retry.
    if let Some(dot_pos) = s.find('.') {
        if let Some(z_pos) = s.find('Z') {
            let frac = &s[dot_pos + 1..z_pos];
            if frac.len() > 6 {
                let truncated = format!("{}.{}Z", &s[..dot_pos], &frac[..6]);
                if let Ok(dt) = DateTime::parse_from_rfc3339(&truncated) {
                    return Some(dt.with_timezone(&Utc));
                }
            }
        }
    }

    // Last resort: try NaiveDateTime parsing
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ") {
        return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
    }

    None
}

/// Summarise `<EventData>` or `<UserData>` into a single description line.
///
/// Handles two common patterns:
/// 1. `<Data Name="key">value</Data>` — named data items
/// 2. `<Data>value</Data>` — unnamed data items
fn event_data_summary(root: &roxmltree::Node) -> String {
    let mut parts = Vec::new();

    if let Some(event_data) = find_child(root, "EventData") {
        for child in event_data.children().filter(|n| n.is_element()) {
            let value = collect_text(&child);
            match child.attribute("Name") {
                Some(name) => parts.push(format!("{name}: {value}")),
                None => parts.push(value),
            }
        }
    } else if let Some(user_data) = find_child(root, "UserData") {
        // UserData typically has a single wrapper element containing the data
        for wrapper in user_data.children().filter(|n| n.is_element()) {
            for child in wrapper.children().filter(|n| n.is_element()) {
                let name = child.tag_name().name();
                let value = collect_text(&child);
                parts.push(format!("{name}: {value}"));
            }
        }
    }

    parts.join("; ")
}

/// Collect all text content from a node and its descendants.
fn collect_text(node: &roxmltree::Node) -> String {
    let mut text = String::new();
    for desc in node.descendants() {
        if desc.is_text() {
            if let Some(t) = desc.text() {
                text.push_str(t);
            }
        }
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_XML: &str = r#"<Event xmlns="http://schemas.microsoft.com/win/2004/08/events/event">
  <System>
    <Provider Name="TestProvider" />
    <EventID>1001</EventID>
    <Level>2</Level>
    <Task>0</Task>
    <Keywords>0x80000000000000</Keywords>
    <TimeCreated SystemTime="2024-01-15T10:23:45.1234567Z" />
    <EventRecordID>4242</EventRecordID>
    <Channel>Application</Channel>
    <Computer>DESKTOP-TEST</Computer>
  </System>
  <EventData>
    <Data Name="ProgramName">explorer.exe</Data>
    <Data Name="HangTime">10000</Data>
  </EventData>
</Event>"#;

    #[test]
    fn test_parse_basic_event() {
        let record = parse_event_xml(SAMPLE_XML, "Application").unwrap();
        assert_eq!(record.record_id, 4242);
        assert_eq!(record.event_id, 1001);
        assert_eq!(record.level, 2);
        assert_eq!(record.provider_name, "TestProvider");
        assert_eq!(record.log_name, "Application");
        assert_eq!(record.description, "ProgramName: explorer.exe; HangTime: 10000");
        assert!(record.level_name.is_none());
        assert!(record.task_name.is_none());
    }

    #[test]
    fn test_log_name_falls_back_to_parameter() {
        let xml = r#"<Event><System><EventID>7</EventID><EventRecordID>1</EventRecordID>
            <TimeCreated SystemTime="2024-01-15T10:23:45Z"/></System></Event>"#;
        let record = parse_event_xml(xml, "archive.evtx").unwrap();
        assert_eq!(record.log_name, "archive.evtx");
        assert_eq!(record.description, "");
    }

    #[test]
    fn test_missing_system_element_is_an_error() {
        let err = parse_event_xml("<Event></Event>", "x").unwrap_err();
        assert!(err.to_string().contains("System"));
    }

    #[test]
    fn test_parse_system_time_7_digits() {
        let dt = parse_system_time("2024-01-15T10:23:45.1234567Z");
        assert!(dt.is_some());
    }

    #[test]
    fn test_parse_system_time_3_digits() {
        let dt = parse_system_time("2024-01-15T10:23:45.123Z");
        assert!(dt.is_some());
    }
}
