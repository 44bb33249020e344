//! iCalendar encoding for single events, plus a light read path over the
//! `icalendar` crate for objects fetched from the server.
//!
//! The encoder writes its lines by hand: output is one VCALENDAR holding one
//! VEVENT, lines joined by CRLF with nothing after `END:VCALENDAR`, and only
//! the properties listed in [`build_simple_event`].

use {
    chrono::{DateTime, TimeZone, Utc},
    icalendar::{Calendar, CalendarComponent, Component, Event},
    uuid::Uuid,
};

use crate::{
    error::{Error, Result},
    types::{EventDescription, EventFields},
};

/// Product identifier written to `PRODID`.
pub const PRODUCT_ID: &str = "-//calmcp//EN";

/// Domain tag appended to generated UIDs.
pub const UID_DOMAIN: &str = "calmcp";

const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Render an instant as an iCalendar UTC date-time (`YYYYMMDDTHHMMSSZ`).
///
/// Sub-second precision is dropped. The offset of the input only affects
/// which instant is meant, never the output format. The fixed width holds
/// for years 0000 through 9999; chrono writes larger years with a sign and
/// more digits, which no caller can produce from an RFC 3339 input.
#[must_use]
pub fn format_instant_utc<Tz: TimeZone>(instant: &DateTime<Tz>) -> String {
    instant.with_timezone(&Utc).format(UTC_FORMAT).to_string()
}

/// A fresh globally unique UID: 32 lowercase hex chars from a v4 UUID
/// followed by `@calmcp`.
#[must_use]
pub fn generate_identifier() -> String {
    format!("{}@{UID_DOMAIN}", Uuid::new_v4().simple())
}

/// Escape a TEXT value.
///
/// Backslash is replaced first so later escapes are not doubled. Semicolons
/// are left alone. Applying this twice escapes the backslashes again.
#[must_use]
pub fn escape_text(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace(',', "\\,")
}

/// Encode one event as a complete VCALENDAR document, stamped with the
/// current time.
///
/// ```text
/// BEGIN:VCALENDAR
/// VERSION:2.0
/// PRODID:-//calmcp//EN
/// CALSCALE:GREGORIAN
/// BEGIN:VEVENT
/// UID:<uid>
/// DTSTAMP:<now>
/// DTSTART:<start>
/// DTEND:<end>
/// SUMMARY:<summary>
/// DESCRIPTION:<description>   (only when present)
/// LOCATION:<location>         (only when present)
/// END:VEVENT
/// END:VCALENDAR
/// ```
pub fn build_simple_event(event: &EventDescription) -> Result<String> {
    build_simple_event_at(event, Utc::now())
}

/// [`build_simple_event`] with an explicit `DTSTAMP`.
pub fn build_simple_event_at(event: &EventDescription, stamp: DateTime<Utc>) -> Result<String> {
    if event.summary.trim().is_empty() {
        return Err(Error::MissingSummary);
    }

    let uid = match present(event.uid.as_deref()) {
        Some(uid) => uid.to_string(),
        None => generate_identifier(),
    };

    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{PRODUCT_ID}"),
        "CALSCALE:GREGORIAN".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{uid}"),
        format!("DTSTAMP:{}", format_instant_utc(&stamp)),
        format!("DTSTART:{}", format_instant_utc(&event.start)),
        format!("DTEND:{}", format_instant_utc(&event.end)),
        format!("SUMMARY:{}", escape_text(&event.summary)),
    ];
    if let Some(description) = present(event.description.as_deref()) {
        lines.push(format!("DESCRIPTION:{}", escape_text(description)));
    }
    if let Some(location) = present(event.location.as_deref()) {
        lines.push(format!("LOCATION:{}", escape_text(location)));
    }
    lines.push("END:VEVENT".to_string());
    lines.push("END:VCALENDAR".to_string());

    Ok(lines.join("\r\n"))
}

/// Empty strings count as absent.
fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Pull the readable fields out of every VEVENT in a fetched object.
pub fn parse_objects(ical_data: &str) -> Result<Vec<EventFields>> {
    let calendar: Calendar = ical_data
        .parse()
        .map_err(|e| Error::Ical(format!("{e}")))?;

    Ok(calendar
        .components
        .iter()
        .filter_map(|component| match component {
            CalendarComponent::Event(vevent) => Some(event_fields(vevent)),
            _ => None,
        })
        .collect())
}

fn event_fields(vevent: &Event) -> EventFields {
    // `property_value` is already unescaped by the parser.
    let text = |name: &str| vevent.property_value(name).map(String::from);
    EventFields {
        uid: vevent.property_value("UID").map(String::from),
        summary: text("SUMMARY"),
        start: vevent.property_value("DTSTART").map(normalise_datetime),
        end: vevent.property_value("DTEND").map(normalise_datetime),
        location: text("LOCATION"),
    }
}

/// Convert basic iCalendar date/date-time to ISO 8601 for display.
/// `20250615T100000Z` becomes `2025-06-15T10:00:00Z`, `20251225` becomes
/// `2025-12-25`. Anything else is returned untouched.
fn normalise_datetime(raw: &str) -> String {
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    let (body, zulu) = match raw.strip_suffix('Z') {
        Some(body) => (body, "Z"),
        None => (raw, ""),
    };

    match body.split_once('T') {
        None if body.len() == 8 && digits(body) => {
            format!("{}-{}-{}", &body[..4], &body[4..6], &body[6..8])
        },
        Some((date, time)) if date.len() == 8 && time.len() == 6 && digits(date) && digits(time) => {
            format!(
                "{}-{}-{}T{}:{}:{}{zulu}",
                &date[..4],
                &date[4..6],
                &date[6..8],
                &time[..2],
                &time[2..4],
                &time[4..6]
            )
        },
        _ => raw.to_string(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, chrono::FixedOffset};

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn meeting() -> EventDescription {
        EventDescription {
            uid: Some("fixed-1@test".into()),
            summary: "Meeting".into(),
            description: None,
            location: None,
            start: at("2024-03-05T09:00:00Z"),
            end: at("2024-03-05T10:30:00Z"),
        }
    }

    fn is_utc_stamp(s: &str) -> bool {
        let b = s.as_bytes();
        b.len() == 16
            && b[8] == b'T'
            && b[15] == b'Z'
            && b[..8].iter().all(u8::is_ascii_digit)
            && b[9..15].iter().all(u8::is_ascii_digit)
    }

    fn property<'a>(ical: &'a str, name: &str) -> Vec<&'a str> {
        let prefix = format!("{name}:");
        ical.split("\r\n")
            .filter_map(|line| line.strip_prefix(prefix.as_str()))
            .collect()
    }

    #[test]
    fn format_instant_is_fixed_width_utc() {
        assert_eq!(format_instant_utc(&at("2024-03-05T09:00:00Z")), "20240305T090000Z");
        assert_eq!(format_instant_utc(&at("0999-01-02T03:04:05Z")), "09990102T030405Z");
        assert_eq!(format_instant_utc(&at("9999-12-31T23:59:59Z")), "99991231T235959Z");
    }

    #[test]
    fn format_instant_converts_offsets() {
        let local = DateTime::parse_from_rfc3339("2024-03-05T10:00:00+02:00").unwrap();
        assert_eq!(format_instant_utc(&local), "20240305T080000Z");

        let east = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let late = east.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap();
        assert_eq!(format_instant_utc(&late), "20231231T203000Z");
    }

    #[test]
    fn format_instant_drops_subseconds() {
        let t = at("2024-03-05T09:00:00.987Z");
        assert_eq!(format_instant_utc(&t), "20240305T090000Z");
    }

    #[test]
    fn format_instant_round_trips_at_second_precision() {
        let t = at("2031-12-31T23:59:59Z");
        let s = format_instant_utc(&t);
        assert!(is_utc_stamp(&s));
        let back = chrono::NaiveDateTime::parse_from_str(&s, UTC_FORMAT)
            .unwrap()
            .and_utc();
        assert_eq!(back, t);
    }

    #[test]
    fn identifiers_are_hex_with_domain() {
        let uid = generate_identifier();
        let (payload, domain) = uid.split_once('@').unwrap();
        assert_eq!(domain, UID_DOMAIN);
        assert!(payload.len() >= 16);
        assert!(
            payload
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn identifiers_differ() {
        let uids: std::collections::HashSet<_> = (0..64).map(|_| generate_identifier()).collect();
        assert_eq!(uids.len(), 64);
    }

    #[test]
    fn escape_handles_backslash_first() {
        assert_eq!(escape_text("a\\,b"), "a\\\\\\,b");
    }

    #[test]
    fn escape_newline_and_comma() {
        assert_eq!(escape_text("Line1\nA,B"), "Line1\\nA\\,B");
    }

    #[test]
    fn escape_leaves_semicolons() {
        assert_eq!(escape_text("a;b"), "a;b");
        assert_eq!(escape_text(""), "");
    }

    #[test]
    fn escape_is_not_idempotent() {
        let once = escape_text("a\\b");
        assert_eq!(once, "a\\\\b");
        assert_eq!(escape_text(&once), "a\\\\\\\\b");
    }

    #[test]
    fn meeting_scenario() {
        let stamp = at("2024-03-01T12:00:00Z");
        let ical = build_simple_event_at(&meeting(), stamp).unwrap();
        let expected = [
            "BEGIN:VCALENDAR",
            "VERSION:2.0",
            "PRODID:-//calmcp//EN",
            "CALSCALE:GREGORIAN",
            "BEGIN:VEVENT",
            "UID:fixed-1@test",
            "DTSTAMP:20240301T120000Z",
            "DTSTART:20240305T090000Z",
            "DTEND:20240305T103000Z",
            "SUMMARY:Meeting",
            "END:VEVENT",
            "END:VCALENDAR",
        ]
        .join("\r\n");
        assert_eq!(ical, expected);
    }

    #[test]
    fn one_hour_meeting_in_january() {
        let event = EventDescription {
            start: at("2024-01-15T10:00:00Z"),
            end: at("2024-01-15T11:00:00Z"),
            ..meeting()
        };
        let ical = build_simple_event(&event).unwrap();
        assert_eq!(property(&ical, "DTSTART"), vec!["20240115T100000Z"]);
        assert_eq!(property(&ical, "DTEND"), vec!["20240115T110000Z"]);
        assert_eq!(property(&ical, "SUMMARY"), vec!["Meeting"]);
        assert!(ical.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ical.ends_with("END:VEVENT\r\nEND:VCALENDAR"));
    }

    #[test]
    fn no_trailing_line_break() {
        let ical = build_simple_event(&meeting()).unwrap();
        assert!(ical.ends_with("END:VCALENDAR"));
        assert!(!ical.ends_with("\r\n"));
        assert_eq!(ical.matches("\r\n").count(), 11);
        assert_eq!(ical.replace("\r\n", "").matches('\n').count(), 0);
    }

    #[test]
    fn stamp_uses_current_time() {
        let before = Utc::now().timestamp();
        let ical = build_simple_event(&meeting()).unwrap();
        let after = Utc::now().timestamp();
        let stamp = property(&ical, "DTSTAMP")[0];
        assert!(is_utc_stamp(stamp));
        let t = chrono::NaiveDateTime::parse_from_str(stamp, UTC_FORMAT)
            .unwrap()
            .and_utc()
            .timestamp();
        assert!(t >= before && t <= after);
    }

    #[test]
    fn optional_lines_omitted() {
        let ical = build_simple_event(&meeting()).unwrap();
        assert!(!ical.contains("DESCRIPTION:"));
        assert!(!ical.contains("LOCATION:"));
    }

    #[test]
    fn empty_optional_fields_omitted() {
        let event = EventDescription {
            description: Some(String::new()),
            location: Some(String::new()),
            ..meeting()
        };
        let ical = build_simple_event(&event).unwrap();
        assert!(!ical.contains("DESCRIPTION"));
        assert!(!ical.contains("LOCATION"));
    }

    #[test]
    fn optional_lines_follow_summary_in_order() {
        let event = EventDescription {
            description: Some("Line1\nA,B".into()),
            location: Some("Room 1, North".into()),
            ..meeting()
        };
        let ical = build_simple_event(&event).unwrap();
        let lines: Vec<_> = ical.split("\r\n").collect();
        let summary = lines.iter().position(|l| l.starts_with("SUMMARY:")).unwrap();
        assert_eq!(lines[summary + 1], "DESCRIPTION:Line1\\nA\\,B");
        assert_eq!(lines[summary + 2], "LOCATION:Room 1\\, North");
        assert_eq!(lines[summary + 3], "END:VEVENT");
    }

    #[test]
    fn summary_is_escaped() {
        let event = EventDescription {
            summary: "Lunch, maybe".into(),
            ..meeting()
        };
        let ical = build_simple_event(&event).unwrap();
        assert_eq!(property(&ical, "SUMMARY"), vec!["Lunch\\, maybe"]);
    }

    #[test]
    fn generated_uid_differs_between_calls() {
        let event = EventDescription {
            uid: None,
            ..meeting()
        };
        let a = build_simple_event(&event).unwrap();
        let b = build_simple_event(&event).unwrap();
        assert_ne!(property(&a, "UID"), property(&b, "UID"));
        for name in ["DTSTART", "DTEND", "SUMMARY"] {
            assert_eq!(property(&a, name), property(&b, name));
        }
        assert!(property(&a, "UID")[0].ends_with("@calmcp"));
    }

    #[test]
    fn empty_uid_is_generated() {
        let event = EventDescription {
            uid: Some(String::new()),
            ..meeting()
        };
        let ical = build_simple_event(&event).unwrap();
        assert!(property(&ical, "UID")[0].ends_with("@calmcp"));
    }

    #[test]
    fn missing_summary_is_rejected() {
        for summary in ["", "   "] {
            let event = EventDescription {
                summary: summary.into(),
                ..meeting()
            };
            let err = build_simple_event(&event).unwrap_err();
            assert!(matches!(err, Error::MissingSummary));
            assert!(err.is_validation());
        }
    }

    #[test]
    fn end_before_start_is_encoded_as_given() {
        let event = EventDescription {
            start: at("2024-03-05T10:00:00Z"),
            end: at("2024-03-05T09:00:00Z"),
            ..meeting()
        };
        let ical = build_simple_event(&event).unwrap();
        assert_eq!(property(&ical, "DTEND"), vec!["20240305T090000Z"]);
    }

    #[test]
    fn parse_reads_encoded_event() {
        let event = EventDescription {
            location: Some("Room 1, North".into()),
            ..meeting()
        };
        let ical = build_simple_event(&event).unwrap();
        // As stored by the server, with a final line break.
        let parsed = parse_objects(&format!("{ical}\r\n")).unwrap();
        assert_eq!(parsed.len(), 1);
        let fields = &parsed[0];
        assert_eq!(fields.uid.as_deref(), Some("fixed-1@test"));
        assert_eq!(fields.summary.as_deref(), Some("Meeting"));
        assert_eq!(fields.start.as_deref(), Some("2024-03-05T09:00:00Z"));
        assert_eq!(fields.end.as_deref(), Some("2024-03-05T10:30:00Z"));
        assert_eq!(fields.location.as_deref(), Some("Room 1, North"));
    }

    #[test]
    fn parse_ignores_non_event_components() {
        let ical = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//x//EN\r\n\
                    BEGIN:VTODO\r\nUID:t1\r\nSUMMARY:Chores\r\nEND:VTODO\r\n\
                    END:VCALENDAR\r\n";
        assert!(parse_objects(ical).unwrap().is_empty());
    }

    #[test]
    fn normalise_dates() {
        assert_eq!(normalise_datetime("20250615T100000Z"), "2025-06-15T10:00:00Z");
        assert_eq!(normalise_datetime("20250615T100000"), "2025-06-15T10:00:00");
        assert_eq!(normalise_datetime("20251225"), "2025-12-25");
        assert_eq!(normalise_datetime("tomorrow"), "tomorrow");
    }

    #[test]
    fn parse_keeps_backslashes_and_newlines() {
        let event = EventDescription {
            summary: "C:\\new, a;b".into(),
            location: Some("dir\\name\nline2".into()),
            ..meeting()
        };
        let ical = build_simple_event(&event).unwrap();
        let parsed = parse_objects(&format!("{ical}\r\n")).unwrap();
        assert_eq!(parsed[0].summary.as_deref(), Some("C:\\new, a;b"));
        assert_eq!(parsed[0].location.as_deref(), Some("dir\\name\nline2"));
    }
}
