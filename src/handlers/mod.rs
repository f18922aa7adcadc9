pub mod copy_records;
pub mod cron;
pub mod scheduled_events;

pub use copy_records::{copy_records, CopyRecordsResponse};
pub use cron::{process_scheduled_events, run_due_events, CronResponse};
pub use scheduled_events::{
    create_scheduled_event,
    delete_scheduled_event,
    get_scheduled_event,
    list_library_years,
    list_scheduled_events,
    CreateScheduledEventRequest,
};
