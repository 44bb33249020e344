//! `calmcp calendars` and `calmcp self-test`: direct calendar access from
//! the command line, without an MCP client.

use {
    anyhow::{Context, Result},
    calmcp_caldav::{
        CalendarService,
        types::{CalendarScope, EventDescription, TimeRange},
    },
    chrono::{DurationRound, TimeDelta, Utc},
    tracing::info,
};

const SELF_TEST_SUMMARY: &str = "calmcp self-test";

pub async fn print_calendars(service: &CalendarService) -> Result<()> {
    let calendars = service.list_calendars().await?;
    if calendars.is_empty() {
        println!("No calendars found.");
        return Ok(());
    }
    for calendar in &calendars {
        let name = calendar.display_name.as_deref().unwrap_or("(unnamed)");
        match calendar.color {
            Some(ref color) => println!("  {name} [{color}]"),
            None => println!("  {name}"),
        }
        println!("    {}", calendar.url);
    }
    Ok(())
}

/// Round-trip a throwaway event through the primary calendar. The event is
/// deleted even when it cannot be found again.
pub async fn self_test(service: &CalendarService) -> Result<()> {
    let calendar = service.primary_calendar().await?;
    println!(
        "Primary calendar: {} ({})",
        calendar.display_name.as_deref().unwrap_or("(unnamed)"),
        calendar.url
    );

    let start = (Utc::now() + TimeDelta::days(1)).duration_trunc(TimeDelta::hours(1))?;
    let end = start + TimeDelta::minutes(30);
    let created = service
        .create_event(
            Some(&calendar.url),
            &EventDescription {
                uid: None,
                summary: SELF_TEST_SUMMARY.into(),
                description: Some("Created by calmcp self-test, safe to delete.".into()),
                location: None,
                start,
                end,
            },
        )
        .await
        .context("creating test event")?;
    println!("[ok] created {}", created.event_url);

    let range = TimeRange {
        start: start - TimeDelta::hours(1),
        end: end + TimeDelta::hours(1),
    };
    let found = service
        .list_events(range, &CalendarScope::Specific(vec![calendar.url.clone()]))
        .await
        .map(|events| {
            events
                .into_iter()
                .find(|e| e.fields.uid.as_deref() == Some(created.uid.as_str()))
        });

    let etag = match found {
        Ok(Some(ref event)) => {
            println!(
                "[ok] found '{}' starting {}",
                event.fields.summary.as_deref().unwrap_or_default(),
                event.fields.start.as_deref().unwrap_or_default()
            );
            event.etag.clone().or_else(|| created.etag.clone())
        },
        Ok(None) => {
            println!("[fail] created event not returned by the calendar query");
            created.etag.clone()
        },
        Err(ref e) => {
            println!("[fail] listing events: {e:#}");
            created.etag.clone()
        },
    };

    service
        .delete_event(&created.event_url, etag.as_deref())
        .await
        .context("deleting test event")?;
    println!("[ok] deleted {}", created.filename);
    info!(uid = %created.uid, "self-test finished");

    match found {
        Ok(Some(_)) => Ok(()),
        Ok(None) => anyhow::bail!("self-test failed: event {} not found", created.uid),
        Err(e) => Err(e.context("self-test failed")),
    }
}
