//! Tool parameter types and their conversion into encoder input.

use {
    chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc},
    serde::{Deserialize, de::DeserializeOwned},
    serde_json::Value,
};

use crate::{
    discovery::{filename_from_url, uid_from_filename},
    error::{Error, Result},
    types::{CalendarScope, EventDescription, TimeRange},
};

/// Deserialize tool arguments, reporting failures as validation errors.
pub fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T> {
    Ok(serde_json::from_value(params)?)
}

/// Parse an instant given as RFC 3339 (`2025-06-15T10:00:00+02:00`), as a
/// date-time without offset (taken as UTC), or as a bare date (UTC
/// midnight).
pub fn parse_instant(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    Err(Error::invalid(
        field,
        format!("expected an RFC 3339 date-time or YYYY-MM-DD, got '{raw}'"),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEventsParams {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub use_calendars: Option<CalendarScope>,
}

impl ListEventsParams {
    pub fn time_range(&self) -> Result<TimeRange> {
        let start = parse_instant("from", &self.from)?;
        let end = parse_instant("to", &self.to)?;
        if end < start {
            return Err(Error::invalid("to", "must not be before 'from'"));
        }
        Ok(TimeRange { start, end })
    }

    pub fn scope(&self) -> CalendarScope {
        self.use_calendars.clone().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateEventParams {
    /// Calendar URL; the primary calendar when absent.
    #[serde(default)]
    pub url: Option<String>,
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub start: String,
    pub end: String,
}

impl CreateEventParams {
    /// Encoder input for an event stored under `uid`.
    pub fn to_description(&self, uid: String) -> Result<EventDescription> {
        Ok(EventDescription {
            uid: Some(uid),
            summary: self.summary.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            start: parse_instant("start", &self.start)?,
            end: parse_instant("end", &self.end)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateEventParams {
    /// Event URL.
    pub url: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
}

impl UpdateEventParams {
    /// Replacement event. The UID falls back to the URL's filename stem, the
    /// start to `now` and the end to one hour after the start.
    pub fn to_description(&self, now: DateTime<Utc>) -> Result<EventDescription> {
        let summary = self
            .summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(Error::MissingSummary)?;

        let uid = self
            .uid
            .clone()
            .filter(|u| !u.is_empty())
            .or_else(|| filename_from_url(&self.url).map(|f| uid_from_filename(&f).to_string()));

        let start = match self.start.as_deref() {
            Some(raw) => parse_instant("start", raw)?,
            None => now,
        };
        let end = match self.end.as_deref() {
            Some(raw) => parse_instant("end", raw)?,
            None => start + Duration::hours(1),
        };

        Ok(EventDescription {
            uid,
            summary: summary.to_string(),
            description: self.description.clone(),
            location: self.location.clone(),
            start,
            end,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteEventParams {
    /// Event URL.
    pub url: String,
    #[serde(default)]
    pub etag: Option<String>,
}
