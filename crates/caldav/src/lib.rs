//! CalDAV calendar tools for calmcp.
//!
//! Provides the iCalendar event encoder, a CalDAV client over `libdav`, and
//! the `AgentTool` implementations for calendar CRUD. Supports iCloud,
//! Fastmail and generic CalDAV servers.

pub mod client;
pub mod discovery;
pub mod error;
pub mod ical;
pub mod params;
pub mod requests;
pub mod service;
pub mod tool;
pub mod types;

pub use {
    error::{Error, Result},
    service::CalendarService,
    tool::register_calendar_tools,
};
