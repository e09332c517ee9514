mod session_cleanup;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::services::practice::PracticeService;

pub use session_cleanup::cleanup_expired_sessions;

pub struct WorkerManager {
    scheduler: Mutex<JobScheduler>,
    shutdown_tx: broadcast::Sender<()>,
    practice: Arc<PracticeService>,
    running: AtomicBool,
}

impl WorkerManager {
    pub async fn new(practice: Arc<PracticeService>) -> Result<Self, WorkerError> {
        let scheduler = JobScheduler::new().await.map_err(WorkerError::Scheduler)?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            shutdown_tx,
            practice,
            running: AtomicBool::new(false),
        })
    }

    /// Schedules the idle-session sweep on `schedule` (six-field cron).
    pub async fn start(&self, schedule: &str, session_ttl: Duration) -> Result<(), WorkerError> {
        let scheduler = self.scheduler.lock().await;

        {
            let practice = Arc::clone(&self.practice);
            let shutdown_rx = self.shutdown_tx.subscribe();
            let job = Job::new_async(schedule, move |_uuid, _lock| {
                let practice = Arc::clone(&practice);
                let mut rx = shutdown_rx.resubscribe();
                Box::pin(async move {
                    tokio::select! {
                        _ = rx.recv() => {},
                        result = cleanup_expired_sessions(practice, session_ttl) => {
                            if let Err(e) = result {
                                error!(error = %e, "Session cleanup worker error");
                            }
                        }
                    }
                })
            })
            .map_err(WorkerError::Scheduler)?;
            scheduler.add(job).await.map_err(WorkerError::Scheduler)?;
            info!(
                schedule = %schedule,
                ttl_secs = session_ttl.as_secs(),
                "Session cleanup worker scheduled"
            );
        }

        scheduler.start().await.map_err(WorkerError::Scheduler)?;
        self.running.store(true, Ordering::Release);
        info!("All workers started");
        Ok(())
    }

    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        info!("Stopping workers...");
        let _ = self.shutdown_tx.send(());

        let mut scheduler = self.scheduler.lock().await;
        if let Err(e) = scheduler.shutdown().await {
            warn!(error = %e, "Error shutting down scheduler");
        }
        info!("Workers stopped");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
}
