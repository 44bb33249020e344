//! WebDAV requests that `libdav` does not offer in the shape needed here:
//! a time-range `calendar-query` REPORT, and PUT/DELETE whose ETag
//! precondition is optional.

use {
    http::{Method, header},
    libdav::requests::{DavRequest, ParseResponseError, PreparedRequest},
};

use crate::types::{CalendarObject, WrittenObject};

const CALENDAR_MIME: &str = "text/calendar; charset=utf-8";

/// `calendar-query` REPORT returning every VEVENT object that overlaps a
/// time range, with its ETag and data.
pub struct CalendarQuery<'a> {
    collection_href: &'a str,
    start: String,
    end: String,
}

impl<'a> CalendarQuery<'a> {
    /// `start` and `end` use the iCalendar UTC form `YYYYMMDDTHHMMSSZ`.
    pub fn new(collection_href: &'a str, start: String, end: String) -> Self {
        Self {
            collection_href,
            start,
            end,
        }
    }
}

impl DavRequest for CalendarQuery<'_> {
    type Response = Vec<CalendarObject>;
    type ParseError = ParseResponseError;
    type Error<E> = libdav::dav::WebDavError<E>;

    fn prepare_request(&self) -> Result<PreparedRequest, http::Error> {
        let body = format!(
            r#"<C:calendar-query xmlns="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <prop>
        <getetag/>
        <C:calendar-data/>
    </prop>
    <C:filter>
        <C:comp-filter name="VCALENDAR">
            <C:comp-filter name="VEVENT">
                <C:time-range start="{}" end="{}"/>
            </C:comp-filter>
        </C:comp-filter>
    </C:filter>
</C:calendar-query>"#,
            self.start, self.end
        );

        Ok(PreparedRequest {
            method: Method::from_bytes(b"REPORT")?,
            path: self.collection_href.to_string(),
            body,
            headers: vec![
                ("Depth".to_string(), "1".to_string()),
                (
                    header::CONTENT_TYPE.to_string(),
                    "application/xml; charset=utf-8".to_string(),
                ),
            ],
        })
    }

    fn parse_response(
        &self,
        parts: &http::response::Parts,
        body: &[u8],
    ) -> Result<Self::Response, ParseResponseError> {
        if !parts.status.is_success() {
            return Err(ParseResponseError::BadStatusCode(parts.status));
        }
        parse_multistatus(body)
    }
}

/// Collect `(href, getetag, calendar-data)` from a multistatus body.
/// Responses without calendar data (the collection itself, 404 propstats)
/// are skipped.
fn parse_multistatus(body: &[u8]) -> Result<Vec<CalendarObject>, ParseResponseError> {
    let text = std::str::from_utf8(body)?;
    let doc = roxmltree::Document::parse(text)?;

    let mut objects = Vec::new();
    for response in doc
        .root_element()
        .descendants()
        .filter(|n| n.tag_name().name() == "response")
    {
        let child_text = |name: &str| {
            response
                .descendants()
                .find(|n| n.tag_name().name() == name)
                .and_then(|n| n.text())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let (Some(href), Some(data)) = (child_text("href"), child_text("calendar-data")) else {
            continue;
        };
        objects.push(CalendarObject {
            href,
            etag: child_text("getetag"),
            data,
        });
    }

    Ok(objects)
}

/// Guard sent with a PUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition<'a> {
    /// `If-None-Match: *`, fail if the resource exists.
    Create,
    /// `If-Match: <etag>`.
    Matches(&'a str),
    /// Unconditional overwrite.
    Overwrite,
}

/// PUT of an iCalendar object.
pub struct PutObject<'a> {
    href: &'a str,
    data: &'a str,
    precondition: Precondition<'a>,
}

impl<'a> PutObject<'a> {
    pub fn new(href: &'a str, data: &'a str, precondition: Precondition<'a>) -> Self {
        Self {
            href,
            data,
            precondition,
        }
    }
}

impl DavRequest for PutObject<'_> {
    type Response = WrittenObject;
    type ParseError = ParseResponseError;
    type Error<E> = libdav::dav::WebDavError<E>;

    fn prepare_request(&self) -> Result<PreparedRequest, http::Error> {
        let mut headers = vec![(header::CONTENT_TYPE.to_string(), CALENDAR_MIME.to_string())];
        match self.precondition {
            Precondition::Create => {
                headers.push((header::IF_NONE_MATCH.to_string(), "*".to_string()));
            },
            Precondition::Matches(etag) => {
                headers.push((header::IF_MATCH.to_string(), etag.to_string()));
            },
            Precondition::Overwrite => {},
        }

        Ok(PreparedRequest {
            method: Method::PUT,
            path: self.href.to_string(),
            body: self.data.to_string(),
            headers,
        })
    }

    fn parse_response(
        &self,
        parts: &http::response::Parts,
        _body: &[u8],
    ) -> Result<Self::Response, ParseResponseError> {
        if !parts.status.is_success() {
            return Err(ParseResponseError::BadStatusCode(parts.status));
        }
        Ok(WrittenObject {
            href: self.href.to_string(),
            etag: response_etag(parts),
        })
    }
}

/// DELETE of a resource, guarded by `If-Match` when an ETag is known.
pub struct DeleteObject<'a> {
    href: &'a str,
    etag: Option<&'a str>,
}

impl<'a> DeleteObject<'a> {
    pub fn new(href: &'a str, etag: Option<&'a str>) -> Self {
        Self { href, etag }
    }
}

impl DavRequest for DeleteObject<'_> {
    type Response = ();
    type ParseError = ParseResponseError;
    type Error<E> = libdav::dav::WebDavError<E>;

    fn prepare_request(&self) -> Result<PreparedRequest, http::Error> {
        let headers = self
            .etag
            .map(|etag| vec![(header::IF_MATCH.to_string(), etag.to_string())])
            .unwrap_or_default();

        Ok(PreparedRequest {
            method: Method::DELETE,
            path: self.href.to_string(),
            body: String::new(),
            headers,
        })
    }

    fn parse_response(
        &self,
        parts: &http::response::Parts,
        _body: &[u8],
    ) -> Result<Self::Response, ParseResponseError> {
        if !parts.status.is_success() {
            return Err(ParseResponseError::BadStatusCode(parts.status));
        }
        Ok(())
    }
}

fn response_etag(parts: &http::response::Parts) -> Option<String> {
    parts
        .headers
        .get(header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}
