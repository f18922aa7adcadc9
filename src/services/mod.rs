pub mod copy_records;
pub mod event_processor;
pub mod mailer;
pub mod schedule_store;
pub mod templates;
