use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::handlers::cron::run_due_events;
use crate::AppState;

/// In-process trigger for the scheduled-event run, for deployments without an external cron.
/// Assumes it is the only runner; the HTTP endpoint should not also be on a timer.
pub struct BackgroundScheduler {
    scheduler: JobScheduler,
}

impl BackgroundScheduler {
    pub async fn new(state: AppState, schedule: &str) -> anyhow::Result<Self> {
        let scheduler = JobScheduler::new().await?;

        scheduler
            .add(Job::new_async(schedule, move |uuid, _l| {
                let state = state.clone();
                Box::pin(async move {
                    info!(job = %uuid, "Scheduled event job starting");
                    match run_due_events(&state).await {
                        Ok(report) => info!(
                            job = %uuid,
                            processed = report.processed,
                            failed = report.failed,
                            "Scheduled event job finished"
                        ),
                        Err((status, body)) => error!(
                            job = %uuid,
                            %status,
                            "Scheduled event job failed: {}",
                            body.0
                        ),
                    }
                })
            })?)
            .await?;

        scheduler.start().await?;
        info!(%schedule, "Background scheduler started");

        Ok(Self { scheduler })
    }

    pub async fn shutdown(&mut self) {
        if let Err(e) = self.scheduler.shutdown().await {
            error!("Background scheduler shutdown failed: {:?}", e);
        }
        info!("Background scheduler stopped");
    }
}
