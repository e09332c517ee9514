use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::services::practice::PracticeService;

#[derive(Debug, Default)]
struct CleanupStats {
    expired_sessions: usize,
    remaining_sessions: usize,
    duration_secs: f64,
}

/// Evicts practice sessions idle longer than `ttl` and stops their refills.
pub async fn cleanup_expired_sessions(
    practice: Arc<PracticeService>,
    ttl: Duration,
) -> Result<(), super::WorkerError> {
    let start = Instant::now();
    debug!("Starting session cleanup cycle");

    let mut stats = CleanupStats {
        expired_sessions: practice.cleanup_expired(ttl),
        ..CleanupStats::default()
    };
    stats.remaining_sessions = practice.store().len();
    stats.duration_secs = start.elapsed().as_secs_f64();

    if stats.expired_sessions > 0 {
        info!(
            expired_sessions = stats.expired_sessions,
            remaining_sessions = stats.remaining_sessions,
            duration_secs = format!("{:.2}", stats.duration_secs),
            "Session cleanup completed"
        );
    } else {
        debug!(remaining_sessions = stats.remaining_sessions, "No idle sessions to evict");
    }

    Ok(())
}
