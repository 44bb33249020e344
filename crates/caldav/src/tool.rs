//! `AgentTool` implementations for the calendar operations.
//!
//! Every tool shares one [`CalendarService`], so the CalDAV connection and the
//! primary calendar are resolved once per process.

use std::sync::Arc;

use {
    anyhow::Result,
    async_trait::async_trait,
    calmcp_tools::{AgentTool, ToolRegistry},
    chrono::Utc,
    serde_json::{Value, json},
};

use crate::{
    ical,
    params::{
        CreateEventParams, DeleteEventParams, ListEventsParams, UpdateEventParams, parse_params,
    },
    service::CalendarService,
};

/// Register the five calendar tools, all backed by `service`.
pub fn register_calendar_tools(registry: &mut ToolRegistry, service: Arc<CalendarService>) {
    registry.register(Arc::new(ListCalendarsTool::new(Arc::clone(&service))));
    registry.register(Arc::new(ListEventsTool::new(Arc::clone(&service))));
    registry.register(Arc::new(CreateEventTool::new(Arc::clone(&service))));
    registry.register(Arc::new(UpdateEventTool::new(Arc::clone(&service))));
    registry.register(Arc::new(DeleteEventTool::new(service)));
}

macro_rules! service_tool {
    ($name:ident) => {
        pub struct $name {
            service: Arc<CalendarService>,
        }

        impl $name {
            #[must_use]
            pub fn new(service: Arc<CalendarService>) -> Self {
                Self { service }
            }
        }
    };
}

service_tool!(ListCalendarsTool);
service_tool!(ListEventsTool);
service_tool!(CreateEventTool);
service_tool!(UpdateEventTool);
service_tool!(DeleteEventTool);

#[async_trait]
impl AgentTool for ListCalendarsTool {
    fn name(&self) -> &str {
        "list_calendars"
    }

    fn description(&self) -> &str {
        "List all calendars on the CalDAV account. Returns url, displayName, calendarColor \
         and description for each. Use the url to target a calendar in other tools."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _params: Value) -> Result<Value> {
        let calendars = self.service.list_calendars().await?;
        Ok(json!({ "calendars": calendars }))
    }
}

#[async_trait]
impl AgentTool for ListEventsTool {
    fn name(&self) -> &str {
        "calendar_list_events"
    }

    fn description(&self) -> &str {
        "List events overlapping a time range. Returns eventUrl, calendarUrl, etag, the raw \
         iCal text and the parsed uid, summary, start, end and location of each event. \
         Use eventUrl and etag for updates and deletions."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["from", "to"],
            "properties": {
                "from": {
                    "type": "string",
                    "description": "Range start, ISO 8601 (e.g. 2025-06-15T00:00:00Z or 2025-06-15)"
                },
                "to": {
                    "type": "string",
                    "description": "Range end, ISO 8601"
                },
                "useCalendars": {
                    "description": "\"all\" (default) or a list of calendar URLs to search",
                    "oneOf": [
                        { "type": "string", "enum": ["all"] },
                        { "type": "array", "items": { "type": "string" } }
                    ]
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let params: ListEventsParams = parse_params(params)?;
        let range = params.time_range()?;
        let events = self.service.list_events(range, &params.scope()).await?;
        Ok(json!({ "events": events }))
    }
}

#[async_trait]
impl AgentTool for CreateEventTool {
    fn name(&self) -> &str {
        "calendar_create_event"
    }

    fn description(&self) -> &str {
        "Create a calendar event. Times are ISO 8601 and stored in UTC. \
         Omit url to use the primary (first) calendar."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["summary", "start", "end"],
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Calendar URL (optional, defaults to the primary calendar)"
                },
                "summary": { "type": "string", "description": "Event title" },
                "description": { "type": "string", "description": "Event notes" },
                "location": { "type": "string", "description": "Event location" },
                "start": { "type": "string", "description": "Start, ISO 8601" },
                "end": { "type": "string", "description": "End, ISO 8601" }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let params: CreateEventParams = parse_params(params)?;
        let event = params.to_description(ical::generate_identifier())?;
        let created = self
            .service
            .create_event(params.url.as_deref(), &event)
            .await?;
        Ok(json!({
            "success": true,
            "uid": created.uid,
            "filename": created.filename,
            "eventUrl": created.event_url,
            "etag": created.etag,
        }))
    }
}

#[async_trait]
impl AgentTool for UpdateEventTool {
    fn name(&self) -> &str {
        "calendar_update_event"
    }

    fn description(&self) -> &str {
        "Replace an existing event with the given fields. Fields left out are not kept: \
         start defaults to now and end to one hour after start. Pass the etag from \
         calendar_list_events to fail instead of overwriting concurrent changes."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["url", "summary"],
            "properties": {
                "url": { "type": "string", "description": "Event URL (eventUrl)" },
                "summary": { "type": "string", "description": "Event title" },
                "description": { "type": "string", "description": "Event notes" },
                "location": { "type": "string", "description": "Event location" },
                "start": { "type": "string", "description": "Start, ISO 8601" },
                "end": { "type": "string", "description": "End, ISO 8601" },
                "etag": { "type": "string", "description": "ETag for conditional update" },
                "uid": {
                    "type": "string",
                    "description": "Event UID (defaults to the file name in url)"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let params: UpdateEventParams = parse_params(params)?;
        let event = params.to_description(Utc::now())?;
        let written = self
            .service
            .update_event(&params.url, &event, params.etag.as_deref())
            .await?;
        Ok(json!({
            "success": true,
            "eventUrl": written.href,
            "etag": written.etag,
        }))
    }
}

#[async_trait]
impl AgentTool for DeleteEventTool {
    fn name(&self) -> &str {
        "calendar_delete_event"
    }

    fn description(&self) -> &str {
        "Delete an event by URL. Pass the etag to delete only if unchanged."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["url"],
            "properties": {
                "url": { "type": "string", "description": "Event URL (eventUrl)" },
                "etag": { "type": "string", "description": "ETag for conditional delete" }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let params: DeleteEventParams = parse_params(params)?;
        self.service
            .delete_event(&params.url, params.etag.as_deref())
            .await?;
        Ok(json!({ "success": true }))
    }
}

// ── Mock client for testing ─────────────────────────────────────────────────

/// In-memory CalDAV server for unit tests. Honours ETag preconditions and
/// ignores time ranges.
#[cfg(test)]
pub(crate) struct MockCalDavClient {
    calendars: Vec<crate::types::CalendarInfo>,
    objects: std::sync::Mutex<Vec<crate::types::CalendarObject>>,
    calendar_fetches: std::sync::atomic::AtomicUsize,
    next_etag: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockCalDavClient {
    pub const ORIGIN: &str = "https://dav.example.com";

    pub fn with_calendars(names: &[&str]) -> Self {
        let calendars = names
            .iter()
            .map(|name| crate::types::CalendarInfo {
                url: format!("{}/cal/{name}/", Self::ORIGIN),
                href: format!("/cal/{name}/"),
                display_name: Some(name.to_string()),
                color: Some("#336699".into()),
                description: None,
            })
            .collect();
        Self {
            calendars,
            objects: std::sync::Mutex::new(Vec::new()),
            calendar_fetches: std::sync::atomic::AtomicUsize::new(0),
            next_etag: std::sync::atomic::AtomicUsize::new(1),
        }
    }

    pub fn calendar_fetches(&self) -> usize {
        self.calendar_fetches
            .load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn object(&self, href: &str) -> Option<crate::types::CalendarObject> {
        self.lock().iter().find(|o| o.href == href).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<crate::types::CalendarObject>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn etag(&self) -> String {
        let n = self
            .next_etag
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        format!("\"mock-{n}\"")
    }
}

#[cfg(test)]
#[async_trait]
impl crate::client::CalDavClient for MockCalDavClient {
    async fn fetch_calendars(&self) -> Result<Vec<crate::types::CalendarInfo>> {
        self.calendar_fetches
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self.calendars.clone())
    }

    async fn fetch_calendar_objects(
        &self,
        calendar_href: &str,
        _range: crate::types::TimeRange,
    ) -> Result<Vec<crate::types::CalendarObject>> {
        Ok(self
            .lock()
            .iter()
            .filter(|o| o.href.starts_with(calendar_href))
            .cloned()
            .collect())
    }

    async fn create_calendar_object(
        &self,
        calendar_href: &str,
        filename: &str,
        ical: &str,
    ) -> Result<crate::types::WrittenObject> {
        let href = crate::discovery::object_href(calendar_href, filename);
        let etag = self.etag();
        let mut objects = self.lock();
        if objects.iter().any(|o| o.href == href) {
            anyhow::bail!("412 Precondition Failed: {href} exists");
        }
        objects.push(crate::types::CalendarObject {
            href: href.clone(),
            etag: Some(etag.clone()),
            data: ical.to_string(),
        });
        Ok(crate::types::WrittenObject {
            href,
            etag: Some(etag),
        })
    }

    async fn update_calendar_object(
        &self,
        href: &str,
        ical: &str,
        etag: Option<&str>,
    ) -> Result<crate::types::WrittenObject> {
        let new_etag = self.etag();
        let mut objects = self.lock();
        let Some(object) = objects.iter_mut().find(|o| o.href == href) else {
            anyhow::bail!("404 Not Found: {href}");
        };
        if etag.is_some() && object.etag.as_deref() != etag {
            anyhow::bail!("412 Precondition Failed: {href}");
        }
        object.data = ical.to_string();
        object.etag = Some(new_etag.clone());
        Ok(crate::types::WrittenObject {
            href: href.to_string(),
            etag: Some(new_etag),
        })
    }

    async fn delete_calendar_object(&self, href: &str, etag: Option<&str>) -> Result<()> {
        let mut objects = self.lock();
        let Some(pos) = objects.iter().position(|o| o.href == href) else {
            anyhow::bail!("404 Not Found: {href}");
        };
        if etag.is_some() && objects[pos].etag.as_deref() != etag {
            anyhow::bail!("412 Precondition Failed: {href}");
        }
        objects.remove(pos);
        Ok(())
    }

    fn absolute_url(&self, href: &str) -> String {
        crate::discovery::absolute_url(&http::Uri::from_static(Self::ORIGIN), href)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (Arc<MockCalDavClient>, ToolRegistry) {
        let mock = Arc::new(MockCalDavClient::with_calendars(&["work", "home"]));
        let service = Arc::new(CalendarService::with_client(mock.clone()));
        let mut registry = ToolRegistry::new();
        register_calendar_tools(&mut registry, service);
        (mock, registry)
    }

    async fn call(registry: &ToolRegistry, name: &str, params: Value) -> Result<Value> {
        registry.get(name).unwrap().execute(params).await
    }

    #[test]
    fn registers_five_tools() {
        let (_, registry) = registry();
        assert_eq!(registry.tool_names(), vec![
            "calendar_create_event",
            "calendar_delete_event",
            "calendar_list_events",
            "calendar_update_event",
            "list_calendars",
        ]);
    }

    #[test]
    fn schemas_declare_required_fields() {
        let (_, registry) = registry();
        let schemas = registry.list_schemas();
        let required = |name: &str| {
            schemas
                .iter()
                .find(|s| s["name"] == name)
                .unwrap()["parameters"]["required"]
                .clone()
        };
        assert_eq!(required("calendar_list_events"), json!(["from", "to"]));
        assert_eq!(required("calendar_create_event"), json!(["summary", "start", "end"]));
        assert_eq!(required("calendar_delete_event"), json!(["url"]));
    }

    #[tokio::test]
    async fn list_calendars_reports_public_fields() {
        let (_, registry) = registry();
        let out = call(&registry, "list_calendars", json!({})).await.unwrap();
        let first = &out["calendars"][0];
        assert_eq!(first["url"], "https://dav.example.com/cal/work/");
        assert_eq!(first["displayName"], "work");
        assert_eq!(first["calendarColor"], "#336699");
    }

    #[tokio::test]
    async fn create_list_update_delete() {
        let (mock, registry) = registry();

        let created = call(
            &registry,
            "calendar_create_event",
            json!({
                "summary": "Standup",
                "description": "Daily\nsync",
                "start": "2025-06-16T09:00:00+02:00",
                "end": "2025-06-16T09:15:00+02:00"
            }),
        )
        .await
        .unwrap();
        assert_eq!(created["success"], true);
        let uid = created["uid"].as_str().unwrap().to_string();
        assert_eq!(created["filename"], format!("{uid}.ics"));
        let url = created["eventUrl"].as_str().unwrap().to_string();

        let listed = call(
            &registry,
            "calendar_list_events",
            json!({"from": "2025-06-16", "to": "2025-06-17", "useCalendars": "all"}),
        )
        .await
        .unwrap();
        let event = &listed["events"][0];
        assert_eq!(event["eventUrl"], url.as_str());
        assert_eq!(event["uid"], uid.as_str());
        assert_eq!(event["start"], "2025-06-16T07:00:00Z");
        assert!(event["iCal"].as_str().unwrap().contains("DESCRIPTION:Daily\\nsync"));
        let etag = event["etag"].as_str().unwrap().to_string();

        let updated = call(
            &registry,
            "calendar_update_event",
            json!({
                "url": url.as_str(),
                "summary": "Standup (moved)",
                "start": "2025-06-16T10:00:00Z",
                "etag": etag
            }),
        )
        .await
        .unwrap();
        assert_eq!(updated["success"], true);
        let stored = mock.object(&format!("/cal/work/{uid}.ics")).unwrap();
        assert!(stored.data.contains(&format!("UID:{uid}")));
        assert!(stored.data.contains("DTEND:20250616T110000Z"));
        assert!(!stored.data.contains("DESCRIPTION"));

        let deleted = call(
            &registry,
            "calendar_delete_event",
            json!({"url": url, "etag": updated["etag"]}),
        )
        .await
        .unwrap();
        assert_eq!(deleted, json!({"success": true}));
        assert_eq!(mock.object_count(), 0);
    }

    #[tokio::test]
    async fn update_without_summary_is_rejected() {
        let (_, registry) = registry();
        let err = call(
            &registry,
            "calendar_update_event",
            json!({"url": "https://dav.example.com/cal/work/x.ics"}),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("summary"));
        let typed = err.downcast_ref::<crate::error::Error>().unwrap();
        assert!(typed.is_validation());
    }

    #[tokio::test]
    async fn bad_dates_are_rejected_before_any_request() {
        let (mock, registry) = registry();
        let err = call(
            &registry,
            "calendar_create_event",
            json!({"summary": "x", "start": "soon", "end": "later"}),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("'start'"));
        assert_eq!(mock.calendar_fetches(), 0);
    }

    #[tokio::test]
    async fn delete_requires_url() {
        let (_, registry) = registry();
        let err = call(&registry, "calendar_delete_event", json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("url"));
    }
}
