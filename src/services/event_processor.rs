//! Runs the scheduled events that are due "today" in the scheduling zone.
//!
//! A run loads every pending event dated on or before today, performs its side effect
//! (broadcast email, open forms, close forms) and then flips it to `completed`. The status
//! column is the only idempotency mechanism: completion is conditional on the row still being
//! pending, and a completed event is never loaded again. A failing event is logged, stamped with
//! `last_error`, reported, and left pending; the rest of the batch carries on.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::ServiceError;
use crate::models::{EventId, EventType, ScheduledEvent};
use crate::services::mailer::Mailer;
use crate::services::schedule_store::ScheduleRepository;
use crate::services::templates::{self, RenderedEmail};
use crate::utils::date;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventOutcome {
    Completed,
    /// Side effect ran but another run had already completed the event.
    AlreadyCompleted,
    Failed,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResult {
    pub event_id: EventId,
    pub event_type: EventType,
    pub scheduled_date: NaiveDate,
    pub outcome: EventOutcome,
    /// Library_Year rows whose flag changed (FORM_OPENING / FORM_CLOSING only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions_changed: Option<u64>,
    pub emails_sent: u32,
    pub emails_failed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventError {
    pub event_id: EventId,
    pub error: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingReport {
    pub today: NaiveDate,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<EventResult>,
    pub errors: Vec<EventError>,
}

impl ProcessingReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Default)]
struct Delivery {
    sent: u32,
    failed: u32,
    first_error: Option<String>,
}

pub struct EventProcessor<'a> {
    repo: &'a dyn ScheduleRepository,
    mailer: &'a dyn Mailer,
    timezone: Tz,
    app_base_url: &'a str,
}

impl<'a> EventProcessor<'a> {
    pub fn new(
        repo: &'a dyn ScheduleRepository,
        mailer: &'a dyn Mailer,
        timezone: Tz,
        app_base_url: &'a str,
    ) -> Self {
        Self {
            repo,
            mailer,
            timezone,
            app_base_url,
        }
    }

    /// Process every event due at `now`. Only the initial load can fail the whole run.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<ProcessingReport, ServiceError> {
        let today = date::today_in(self.timezone, now);
        let current_year = date::current_year_in(self.timezone, now);

        let events = self.repo.due_events(today).await?;
        info!(%today, due = events.len(), "Processing scheduled events");

        let mut report = ProcessingReport {
            today,
            processed: 0,
            succeeded: 0,
            failed: 0,
            results: Vec::new(),
            errors: Vec::new(),
        };

        for event in events {
            // Rows come from a pending-only query; re-check so a stale row can never fire twice.
            if !event.is_due(today) {
                continue;
            }
            report.processed += 1;

            match self.execute(&event, current_year).await {
                Ok(mut result) => match self.repo.mark_completed(event.id).await {
                    Ok(true) => {
                        info!(event_id = event.id, event_type = %event.event_type, "Scheduled event completed");
                        report.succeeded += 1;
                        report.results.push(result);
                    }
                    Ok(false) => {
                        warn!(event_id = event.id, "Scheduled event was completed by another run");
                        result.outcome = EventOutcome::AlreadyCompleted;
                        report.succeeded += 1;
                        report.results.push(result);
                    }
                    Err(e) => {
                        let message = format!("side effect applied but completion not recorded: {}", e);
                        error!(event_id = event.id, "{}", message);
                        result.outcome = EventOutcome::Failed;
                        result.detail = Some(message.clone());
                        report.failed += 1;
                        report.results.push(result);
                        report.errors.push(EventError {
                            event_id: event.id,
                            error: message,
                        });
                    }
                },
                Err(e) => {
                    let message = e.to_string();
                    error!(event_id = event.id, event_type = %event.event_type, "Scheduled event failed: {}", message);
                    if let Err(db_err) = self.repo.record_failure(event.id, &message).await {
                        error!(event_id = event.id, "Failed to record event error: {:?}", db_err);
                    }
                    report.failed += 1;
                    report.results.push(EventResult {
                        event_id: event.id,
                        event_type: event.event_type,
                        scheduled_date: event.scheduled_date,
                        outcome: EventOutcome::Failed,
                        sessions_changed: None,
                        emails_sent: 0,
                        emails_failed: 0,
                        detail: Some(message.clone()),
                    });
                    report.errors.push(EventError {
                        event_id: event.id,
                        error: message,
                    });
                }
            }
        }

        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            "Scheduled event run finished"
        );
        Ok(report)
    }

    async fn execute(&self, event: &ScheduledEvent, current_year: i32) -> Result<EventResult, ServiceError> {
        let mut result = EventResult {
            event_id: event.id,
            event_type: event.event_type,
            scheduled_date: event.scheduled_date,
            outcome: EventOutcome::Completed,
            sessions_changed: None,
            emails_sent: 0,
            emails_failed: 0,
            detail: None,
        };

        match event.event_type {
            EventType::Broadcast => {
                let subject = event.subject.as_deref().map(str::trim).unwrap_or_default();
                let message = event.message.as_deref().map(str::trim).unwrap_or_default();
                if subject.is_empty() || message.is_empty() {
                    return Err(ServiceError::Validation(
                        "broadcast is missing a subject or message".to_string(),
                    ));
                }

                let email = templates::broadcast(subject, message, self.app_base_url);
                let delivery = self.deliver(&email).await?;
                result.emails_sent = delivery.sent;
                result.emails_failed = delivery.failed;

                if delivery.sent == 0 && delivery.failed > 0 {
                    return Err(ServiceError::Delivery(format!(
                        "broadcast failed for all {} recipients: {}",
                        delivery.failed,
                        delivery.first_error.unwrap_or_default()
                    )));
                }
                if let Some(err) = delivery.first_error {
                    result.detail = Some(format!("{} recipient(s) failed: {}", delivery.failed, err));
                }
            }
            EventType::FormOpening | EventType::FormClosing => {
                let open = event.event_type == EventType::FormOpening;
                let year = event.year.unwrap_or(current_year);
                // An empty filter means every library, same as no filter.
                let library_ids = event.library_ids.as_deref().filter(|ids| !ids.is_empty());
                let changed = self.repo.set_forms_open(year, library_ids, open).await?;
                info!(event_id = event.id, year, open, changed, "Library_Year editing flag updated");
                result.sessions_changed = Some(changed);

                if event.notify_members {
                    let email = if open {
                        templates::forms_opened(year, self.app_base_url)
                    } else {
                        templates::forms_closed(year, self.app_base_url)
                    };
                    // The flag already changed, so a notification problem is reported, not fatal.
                    match self.deliver(&email).await {
                        Ok(delivery) => {
                            result.emails_sent = delivery.sent;
                            result.emails_failed = delivery.failed;
                            if let Some(err) = delivery.first_error {
                                result.detail = Some(format!("{} notification(s) failed: {}", delivery.failed, err));
                            }
                        }
                        Err(e) => {
                            warn!(event_id = event.id, "Could not load notification recipients: {}", e);
                            result.detail = Some(format!("notification skipped: {}", e));
                        }
                    }
                }
            }
        }

        Ok(result)
    }

    async fn deliver(&self, email: &RenderedEmail) -> Result<Delivery, ServiceError> {
        let recipients = self.repo.broadcast_recipients().await?;
        let mut delivery = Delivery::default();

        for recipient in &recipients {
            match self.mailer.send(&email.to(recipient)).await {
                Ok(()) => delivery.sent += 1,
                Err(e) => {
                    warn!(to = %recipient, "Email send failed: {}", e);
                    delivery.failed += 1;
                    if delivery.first_error.is_none() {
                        delivery.first_error = Some(e.to_string());
                    }
                }
            }
        }

        Ok(delivery)
    }
}
