//! CalDAV client trait and `libdav`-backed implementation.

use std::sync::Arc;

use {
    anyhow::{Result, anyhow},
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tower_http::{auth::AddAuthorization, follow_redirect::FollowRedirect},
};

use crate::{
    discovery::{absolute_url, object_href},
    ical::format_instant_utc,
    requests::{CalendarQuery, DeleteObject, Precondition, PutObject},
    types::{CalendarInfo, CalendarObject, TimeRange, WrittenObject},
};

/// Trait for CalDAV server interactions.
///
/// This allows mocking in tests without a real server.
#[async_trait]
pub trait CalDavClient: Send + Sync {
    /// Discover calendars available on this account.
    async fn fetch_calendars(&self) -> Result<Vec<CalendarInfo>>;

    /// Fetch every VEVENT object in a calendar that overlaps `range`.
    async fn fetch_calendar_objects(
        &self,
        calendar_href: &str,
        range: TimeRange,
    ) -> Result<Vec<CalendarObject>>;

    /// Store a new object as `<calendar>/<filename>`. Fails if it exists.
    async fn create_calendar_object(
        &self,
        calendar_href: &str,
        filename: &str,
        ical: &str,
    ) -> Result<WrittenObject>;

    /// Replace an object. Guarded by `If-Match` only when `etag` is given.
    async fn update_calendar_object(
        &self,
        href: &str,
        ical: &str,
        etag: Option<&str>,
    ) -> Result<WrittenObject>;

    /// Delete an object. Guarded by `If-Match` only when `etag` is given.
    async fn delete_calendar_object(&self, href: &str, etag: Option<&str>) -> Result<()>;

    /// Absolute URL for a server-relative href.
    fn absolute_url(&self, href: &str) -> String;
}

/// Type alias for the libdav HTTPS connector stack.
type HyperHttpsClient = hyper_util::client::legacy::Client<
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>,
    String,
>;

/// Basic auth, and redirects followed (iCloud moves accounts to `pNN-caldav`).
type AuthedClient = FollowRedirect<AddAuthorization<HyperHttpsClient>>;

/// `libdav`-backed CalDAV client using hyper + tower for HTTP.
pub struct LibDavCalDavClient {
    inner: libdav::CalDavClient<AuthedClient>,
}

impl LibDavCalDavClient {
    /// Connect to a CalDAV server.
    ///
    /// Uses service discovery to locate the CalDAV context path.
    pub async fn connect(
        base_url: &str,
        username: &str,
        password: &Secret<String>,
    ) -> Result<Self> {
        let uri: http::Uri = base_url
            .parse()
            .map_err(|e| anyhow!("invalid CalDAV URL '{base_url}': {e}"))?;

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| anyhow!("failed to load native TLS roots: {e}"))?
            .https_or_http()
            .enable_http1()
            .build();

        let https_client: HyperHttpsClient =
            hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
                .build(https_connector);

        let authed_client = FollowRedirect::new(AddAuthorization::basic(
            https_client,
            username,
            password.expose_secret(),
        ));

        let webdav = libdav::dav::WebDavClient::new(uri, authed_client);

        let caldav_client = libdav::CalDavClient::bootstrap_via_service_discovery(webdav)
            .await
            .map_err(|e| anyhow!("CalDAV service discovery failed: {e}"))?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            base_url = %caldav_client.base_url(),
            "connected to CalDAV server"
        );

        Ok(Self {
            inner: caldav_client,
        })
    }

    /// Find calendar home set URLs for the current user.
    async fn find_calendar_homes(&self) -> Result<Vec<http::Uri>> {
        let principal = self
            .inner
            .find_current_user_principal()
            .await
            .map_err(|e| anyhow!("failed to find user principal: {e}"))?;

        match principal {
            Some(principal_uri) => {
                let response = self
                    .inner
                    .request(libdav::caldav::FindCalendarHomeSet::new(&principal_uri))
                    .await
                    .map_err(|e| anyhow!("failed to find calendar home set: {e}"))?;
                if response.home_sets.is_empty() {
                    Ok(vec![self.inner.base_url().clone()])
                } else {
                    Ok(response.home_sets)
                }
            },
            None => Ok(vec![self.inner.base_url().clone()]),
        }
    }
}

#[async_trait]
impl CalDavClient for LibDavCalDavClient {
    async fn fetch_calendars(&self) -> Result<Vec<CalendarInfo>> {
        let homes = self.find_calendar_homes().await?;
        let mut calendars = Vec::new();

        for home_url in &homes {
            let found = self
                .inner
                .request(libdav::caldav::FindCalendars::new(home_url))
                .await
                .map_err(|e| anyhow!("failed to find calendars: {e}"))?;

            for cal in found.calendars {
                let display_name = self
                    .inner
                    .request(libdav::dav::GetProperty::new(
                        &cal.href,
                        &libdav::names::DISPLAY_NAME,
                    ))
                    .await
                    .ok()
                    .and_then(|r| r.value);

                let color = self
                    .inner
                    .request(libdav::dav::GetProperty::new(
                        &cal.href,
                        &libdav::names::CALENDAR_COLOUR,
                    ))
                    .await
                    .ok()
                    .and_then(|r| r.value)
                    .map(normalise_colour);

                let description = self
                    .inner
                    .request(libdav::dav::GetProperty::new(
                        &cal.href,
                        &libdav::names::CALENDAR_DESCRIPTION,
                    ))
                    .await
                    .ok()
                    .and_then(|r| r.value)
                    .filter(|d| !d.is_empty());

                calendars.push(CalendarInfo {
                    url: self.absolute_url(&cal.href),
                    href: cal.href,
                    display_name,
                    color,
                    description,
                });
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(count = calendars.len(), "fetched calendars");

        Ok(calendars)
    }

    async fn fetch_calendar_objects(
        &self,
        calendar_href: &str,
        range: TimeRange,
    ) -> Result<Vec<CalendarObject>> {
        let query = CalendarQuery::new(
            calendar_href,
            format_instant_utc(&range.start),
            format_instant_utc(&range.end),
        );
        let objects = self
            .inner
            .request(query)
            .await
            .map_err(|e| anyhow!("failed to query calendar {calendar_href}: {e}"))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            calendar = calendar_href,
            count = objects.len(),
            "fetched calendar objects"
        );

        Ok(objects)
    }

    async fn create_calendar_object(
        &self,
        calendar_href: &str,
        filename: &str,
        ical: &str,
    ) -> Result<WrittenObject> {
        let href = object_href(calendar_href, filename);
        let written = self
            .inner
            .request(PutObject::new(&href, ical, Precondition::Create))
            .await
            .map_err(|e| anyhow!("failed to create event at {href}: {e}"))?;

        #[cfg(feature = "tracing")]
        tracing::info!(href = %written.href, "created calendar object");

        Ok(written)
    }

    async fn update_calendar_object(
        &self,
        href: &str,
        ical: &str,
        etag: Option<&str>,
    ) -> Result<WrittenObject> {
        let precondition = etag.map_or(Precondition::Overwrite, Precondition::Matches);
        let written = self
            .inner
            .request(PutObject::new(href, ical, precondition))
            .await
            .map_err(|e| anyhow!("failed to update event at {href}: {e}"))?;

        #[cfg(feature = "tracing")]
        tracing::info!(href, guarded = etag.is_some(), "updated calendar object");

        Ok(written)
    }

    async fn delete_calendar_object(&self, href: &str, etag: Option<&str>) -> Result<()> {
        self.inner
            .request(DeleteObject::new(href, etag))
            .await
            .map_err(|e| anyhow!("failed to delete event at {href}: {e}"))?;

        #[cfg(feature = "tracing")]
        tracing::info!(href, guarded = etag.is_some(), "deleted calendar object");

        Ok(())
    }

    fn absolute_url(&self, href: &str) -> String {
        absolute_url(self.inner.base_url(), href)
    }
}

/// Apple reports colours as `#RRGGBBAA`; drop the alpha channel.
fn normalise_colour(colour: String) -> String {
    if colour.len() == 9 && colour.starts_with('#') && colour.is_ascii() {
        colour[..7].to_string()
    } else {
        colour
    }
}

/// Thread-safe shared CalDAV client.
pub type SharedCalDavClient = Arc<dyn CalDavClient>;
