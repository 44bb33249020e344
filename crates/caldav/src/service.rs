//! Calendar operations shared by the tools: the connected client and the
//! primary calendar are created on first use and kept for the life of the
//! service.

use std::sync::Arc;

use {
    anyhow::{Result, anyhow},
    calmcp_config::CalDavConfig,
    futures::future::try_join_all,
    tokio::sync::{OnceCell, RwLock},
};

use crate::{
    client::{CalDavClient, LibDavCalDavClient, SharedCalDavClient},
    discovery::{self, url_to_href},
    ical,
    types::{
        CalendarInfo, CalendarObject, CalendarScope, CreatedEvent, EventDescription, ListedEvent,
        TimeRange, WrittenObject,
    },
};

/// Where the client comes from.
enum Source {
    Config(CalDavConfig),
    Client(SharedCalDavClient),
}

pub struct CalendarService {
    source: Source,
    client: OnceCell<SharedCalDavClient>,
    primary: RwLock<Option<CalendarInfo>>,
}

impl CalendarService {
    /// Service that connects with `config` the first time it is used.
    #[must_use]
    pub fn from_config(config: &CalDavConfig) -> Self {
        Self {
            source: Source::Config(config.clone()),
            client: OnceCell::new(),
            primary: RwLock::new(None),
        }
    }

    /// Service over an already connected client.
    #[must_use]
    pub fn with_client(client: SharedCalDavClient) -> Self {
        Self {
            source: Source::Client(client),
            client: OnceCell::new(),
            primary: RwLock::new(None),
        }
    }

    async fn client(&self) -> Result<SharedCalDavClient> {
        let client = self
            .client
            .get_or_try_init(|| async {
                match &self.source {
                    Source::Client(client) => Ok(Arc::clone(client)),
                    Source::Config(config) => connect(config).await,
                }
            })
            .await?;
        Ok(Arc::clone(client))
    }

    pub async fn list_calendars(&self) -> Result<Vec<CalendarInfo>> {
        self.client().await?.fetch_calendars().await
    }

    /// The first calendar the server reports, looked up once.
    pub async fn primary_calendar(&self) -> Result<CalendarInfo> {
        if let Some(primary) = self.primary.read().await.as_ref() {
            return Ok(primary.clone());
        }

        let mut slot = self.primary.write().await;
        if let Some(primary) = slot.as_ref() {
            return Ok(primary.clone());
        }
        let primary = self
            .list_calendars()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("the CalDAV account has no calendars"))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(url = %primary.url, "cached primary calendar");

        *slot = Some(primary.clone());
        Ok(primary)
    }

    /// Events overlapping `range` in every calendar `scope` selects.
    /// Calendars are queried concurrently; URLs that match no calendar are
    /// skipped.
    pub async fn list_events(
        &self,
        range: TimeRange,
        scope: &CalendarScope,
    ) -> Result<Vec<ListedEvent>> {
        let client = self.client().await?;
        let calendars = select_calendars(client.fetch_calendars().await?, scope);

        let per_calendar = calendars.iter().map(|calendar| {
            let client = Arc::clone(&client);
            async move {
                let objects = client
                    .fetch_calendar_objects(&calendar.href, range)
                    .await?;
                Ok::<_, anyhow::Error>(
                    objects
                        .into_iter()
                        .map(|object| listed_event(client.as_ref(), calendar, object))
                        .collect::<Vec<_>>(),
                )
            }
        });

        let events: Vec<ListedEvent> = try_join_all(per_calendar)
            .await?
            .into_iter()
            .flatten()
            .collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            calendars = calendars.len(),
            events = events.len(),
            "listed events"
        );

        Ok(events)
    }

    /// Create an event in `calendar_url`, or in the primary calendar.
    pub async fn create_event(
        &self,
        calendar_url: Option<&str>,
        event: &EventDescription,
    ) -> Result<CreatedEvent> {
        let calendar_href = match calendar_url {
            Some(url) => url_to_href(url),
            None => self.primary_calendar().await?.href,
        };

        let uid = event
            .uid
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(ical::generate_identifier);
        let data = ical::build_simple_event(&EventDescription {
            uid: Some(uid.clone()),
            ..event.clone()
        })?;
        let filename = format!("{uid}.ics");

        let client = self.client().await?;
        let written = client
            .create_calendar_object(&calendar_href, &filename, &data)
            .await?;

        Ok(CreatedEvent {
            uid,
            filename,
            event_url: client.absolute_url(&written.href),
            etag: written.etag,
        })
    }

    /// Replace the event stored at `event_url`.
    pub async fn update_event(
        &self,
        event_url: &str,
        event: &EventDescription,
        etag: Option<&str>,
    ) -> Result<WrittenObject> {
        let data = ical::build_simple_event(event)?;
        let client = self.client().await?;
        let written = client
            .update_calendar_object(&url_to_href(event_url), &data, etag)
            .await?;
        Ok(WrittenObject {
            href: client.absolute_url(&written.href),
            etag: written.etag,
        })
    }

    pub async fn delete_event(&self, event_url: &str, etag: Option<&str>) -> Result<()> {
        self.client()
            .await?
            .delete_calendar_object(&url_to_href(event_url), etag)
            .await
    }
}

async fn connect(config: &CalDavConfig) -> Result<SharedCalDavClient> {
    let provider = config.provider.as_deref();
    let base_url =
        discovery::resolve_base_url(provider, config.url.as_deref()).ok_or_else(|| {
            anyhow!(
                "no CalDAV URL configured and provider '{}' requires one",
                provider.unwrap_or("generic")
            )
        })?;

    let username = config
        .username
        .as_deref()
        .ok_or_else(|| anyhow!("no CalDAV username configured"))?;

    let password = config
        .password
        .as_ref()
        .ok_or_else(|| anyhow!("no CalDAV password configured"))?;

    #[cfg(feature = "tracing")]
    tracing::info!(url = %base_url, "connecting to CalDAV server");

    let client: SharedCalDavClient =
        Arc::new(LibDavCalDavClient::connect(&base_url, username, password).await?);
    Ok(client)
}

/// Calendars named by `scope`, matched on their href.
fn select_calendars(calendars: Vec<CalendarInfo>, scope: &CalendarScope) -> Vec<CalendarInfo> {
    match scope {
        CalendarScope::All => calendars,
        CalendarScope::Specific(urls) => {
            let wanted: Vec<String> = urls.iter().map(|u| same_href(&url_to_href(u))).collect();
            let selected: Vec<CalendarInfo> = calendars
                .into_iter()
                .filter(|c| wanted.contains(&same_href(&c.href)))
                .collect();

            #[cfg(feature = "tracing")]
            if selected.len() < urls.len() {
                tracing::debug!(
                    requested = urls.len(),
                    matched = selected.len(),
                    "skipping unknown calendars"
                );
            }

            selected
        },
    }
}

fn same_href(href: &str) -> String {
    href.trim_end_matches('/').to_string()
}

fn listed_event(
    client: &dyn CalDavClient,
    calendar: &CalendarInfo,
    object: CalendarObject,
) -> ListedEvent {
    let fields = match ical::parse_objects(&object.data) {
        Ok(parsed) => parsed.into_iter().next().unwrap_or_default(),
        Err(e) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                href = %object.href,
                error = %e,
                "returning unparseable calendar object without fields"
            );
            #[cfg(not(feature = "tracing"))]
            let _ = e;
            Default::default()
        },
    };

    ListedEvent {
        event_url: client.absolute_url(&object.href),
        calendar_url: calendar.url.clone(),
        etag: object.etag,
        ical: object.data,
        fields,
    }
}
