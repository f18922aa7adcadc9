//! Row types shared by handlers and services. Dates are chrono types, never raw strings.

pub mod counts;
pub mod library;
pub mod scheduled_event;

pub use counts::CountsTable;
pub use library::LibraryYear;
pub use scheduled_event::{EventStatus, EventType, ScheduledEvent};

pub type LibraryId = i32;
pub type RecordId = i32;
pub type EventId = i32;
