//! Provider endpoints and URL/href mapping.
//!
//! Maps well-known providers to their CalDAV endpoints, and converts between
//! the absolute URLs shown to callers and the server-relative hrefs used on
//! the wire.

use http::Uri;

/// Well-known CalDAV base URL for Fastmail.
pub const FASTMAIL_CALDAV_URL: &str = "https://caldav.fastmail.com";

/// Well-known CalDAV base URL for iCloud.
/// Requires an app-specific password.
pub const ICLOUD_CALDAV_URL: &str = "https://caldav.icloud.com";

/// Resolve the CalDAV base URL for a given provider.
///
/// If `provider` is `None` or `"generic"`, the caller-supplied `url` is used.
/// For known providers, the well-known URL is returned even if `url` is `None`.
#[must_use]
pub fn resolve_base_url(provider: Option<&str>, url: Option<&str>) -> Option<String> {
    match provider {
        Some("fastmail") => Some(
            url.map(String::from)
                .unwrap_or_else(|| FASTMAIL_CALDAV_URL.to_string()),
        ),
        Some("icloud") => Some(
            url.map(String::from)
                .unwrap_or_else(|| ICLOUD_CALDAV_URL.to_string()),
        ),
        Some("generic") | None => url.map(String::from),
        Some(other) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(provider = other, "unknown CalDAV provider, using URL as-is");
            url.map(String::from)
        },
    }
}

/// Server-relative href for an absolute URL or an href.
///
/// `https://p01-caldav.icloud.com/123/calendars/work/` becomes
/// `/123/calendars/work/`. Inputs without a scheme are taken as hrefs and
/// only gain a leading slash when missing.
#[must_use]
pub fn url_to_href(url: &str) -> String {
    match url.parse::<Uri>() {
        Ok(uri) if uri.scheme().is_some() => uri.path().to_string(),
        _ if url.starts_with('/') => url.to_string(),
        _ => format!("/{url}"),
    }
}

/// Absolute URL for an href on the given server.
#[must_use]
pub fn absolute_url(base: &Uri, href: &str) -> String {
    if href.contains("://") {
        return href.to_string();
    }
    match (base.scheme_str(), base.authority()) {
        (Some(scheme), Some(authority)) => format!("{scheme}://{authority}{href}"),
        _ => href.to_string(),
    }
}

/// Href of the resource `filename` inside a calendar collection.
#[must_use]
pub fn object_href(calendar_href: &str, filename: &str) -> String {
    format!("{}/{filename}", calendar_href.trim_end_matches('/'))
}

/// Last path segment of a URL or href, ignoring a trailing slash.
#[must_use]
pub fn filename_from_url(url: &str) -> Option<String> {
    let href = url_to_href(url);
    let path = href.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(String::from)
}

/// Filename with its `.ics` extension removed.
#[must_use]
pub fn uid_from_filename(filename: &str) -> &str {
    filename.strip_suffix(".ics").unwrap_or(filename)
}
