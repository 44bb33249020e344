//! Typed structs for CalDAV operations.

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// Information about a discovered calendar collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarInfo {
    /// Absolute URL of the calendar collection.
    pub url: String,
    /// Server-relative href path to the calendar.
    #[serde(skip)]
    pub href: String,
    /// Human-readable display name.
    pub display_name: Option<String>,
    /// Calendar colour (CSS hex string, e.g. "#FF5733").
    #[serde(rename = "calendarColor")]
    pub color: Option<String>,
    /// Optional description text.
    pub description: Option<String>,
}

/// A raw calendar object resource as stored on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarObject {
    /// Server-relative href path to the `.ics` resource.
    pub href: String,
    /// ETag for conditional updates, when the server returned one.
    pub etag: Option<String>,
    /// iCalendar text.
    pub data: String,
}

/// Location and new ETag of a resource after a PUT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenObject {
    pub href: String,
    pub etag: Option<String>,
}

/// Time range filter for listing events. Both bounds are inclusive of
/// overlapping events, as defined by the CalDAV `time-range` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The event fields encoded into a VEVENT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDescription {
    /// Generated when absent.
    pub uid: Option<String>,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Readable fields pulled out of a fetched VEVENT.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFields {
    pub uid: Option<String>,
    pub summary: Option<String>,
    /// Start as ISO 8601 (`2025-06-15T10:00:00Z`, or `2025-06-15` for all-day).
    pub start: Option<String>,
    pub end: Option<String>,
    pub location: Option<String>,
}

/// An event as reported by `calendar_list_events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedEvent {
    pub event_url: String,
    pub calendar_url: String,
    pub etag: Option<String>,
    #[serde(rename = "iCal")]
    pub ical: String,
    #[serde(flatten)]
    pub fields: EventFields,
}

/// Result of creating an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    pub uid: String,
    /// `<uid>.ics`
    pub filename: String,
    pub event_url: String,
    pub etag: Option<String>,
}

/// Which calendars a listing covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawScope")]
pub enum CalendarScope {
    #[default]
    All,
    /// Calendar URLs (absolute or server-relative).
    Specific(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScope {
    Keyword(String),
    List(Vec<String>),
}

impl TryFrom<RawScope> for CalendarScope {
    type Error = String;

    fn try_from(raw: RawScope) -> Result<Self, Self::Error> {
        match raw {
            RawScope::Keyword(k) if k.eq_ignore_ascii_case("all") => Ok(Self::All),
            RawScope::Keyword(k) => Err(format!(
                "expected \"all\" or a list of calendar URLs, got \"{k}\""
            )),
            RawScope::List(urls) => Ok(Self::Specific(urls)),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn calendar_info_uses_public_field_names() {
        let info = CalendarInfo {
            url: "https://p01-caldav.icloud.com/123/calendars/work/".into(),
            href: "/123/calendars/work/".into(),
            display_name: Some("Work".into()),
            color: Some("#FF5733".into()),
            description: None,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["displayName"], "Work");
        assert_eq!(json["calendarColor"], "#FF5733");
        assert!(json.get("href").is_none());
    }

    #[test]
    fn listed_event_flattens_fields() {
        let event = ListedEvent {
            event_url: "https://dav.example.com/cal/a.ics".into(),
            calendar_url: "https://dav.example.com/cal/".into(),
            etag: Some("\"e1\"".into()),
            ical: "BEGIN:VCALENDAR".into(),
            fields: EventFields {
                summary: Some("Lunch".into()),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventUrl"], "https://dav.example.com/cal/a.ics");
        assert_eq!(json["iCal"], "BEGIN:VCALENDAR");
        assert_eq!(json["summary"], "Lunch");
    }

    #[test]
    fn scope_accepts_all_keyword() {
        let scope: CalendarScope = serde_json::from_value(json!("all")).unwrap();
        assert_eq!(scope, CalendarScope::All);
    }

    #[test]
    fn scope_accepts_url_list() {
        let scope: CalendarScope = serde_json::from_value(json!(["/cal/a/", "/cal/b/"])).unwrap();
        assert_eq!(
            scope,
            CalendarScope::Specific(vec!["/cal/a/".into(), "/cal/b/".into()])
        );
    }

    #[test]
    fn scope_rejects_other_keywords() {
        let err = serde_json::from_value::<CalendarScope>(json!("some")).unwrap_err();
        assert!(err.to_string().contains("expected \"all\""));
    }
}
