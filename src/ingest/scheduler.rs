//! Periodic auto-import scheduling.
//!
//! Scheduler state is an explicit value owned by the watch loop and
//! passed to the due-check; there is no ambient global.

use chrono::{DateTime, Duration, Utc};

use crate::{
    config::HubConfig,
    db::DbPool,
    github::MetricsClient,
    ingest::{self, ImportError},
    secrets::SecretManager,
};

/// Auto-import state tracked across passes of the watch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerState {
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
}

impl SchedulerState {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            last_run: None,
            next_run: None,
        }
    }

    /// Whether an import pass should run now. Never-run schedulers are
    /// due immediately.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        match self.next_run {
            None => true,
            Some(next) => now >= next,
        }
    }

    /// Record a completed pass and schedule the next one.
    pub fn mark_completed(&mut self, now: DateTime<Utc>, interval: Duration) {
        self.last_run = Some(now);
        self.next_run = Some(now + interval);
    }
}

/// Run the watch loop: check due-ness every tick and run an import pass
/// when the interval has elapsed. Returns only on a storage failure.
pub async fn run_scheduler_loop(
    config: &HubConfig,
    secrets: &dyn SecretManager,
    client: &MetricsClient,
    db: &DbPool,
) -> Result<(), ImportError> {
    let mut state = SchedulerState::new(config.scheduler.enabled);
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(
        config.scheduler.tick_secs,
    ));

    tracing::info!(
        interval_hours = config.scheduler.interval_hours,
        "Starting import scheduler"
    );

    loop {
        ticker.tick().await;

        let now = Utc::now();
        if !state.is_due(now) {
            continue;
        }

        let snapshots = db.snapshots();
        match ingest::run_import(&config.github, secrets, client, snapshots.as_ref()).await {
            Ok(report) => {
                tracing::info!(
                    inserted = report.inserted,
                    skipped = report.skipped,
                    failed_orgs = report.failures.len(),
                    "Scheduled import pass finished"
                );
            }
            // Configuration problems can't heal mid-loop; storage errors
            // mean the pass lost its backend. Both stop the watcher.
            Err(e) => return Err(e),
        }

        state.mark_completed(Utc::now(), config.scheduler.interval());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_750_000_000 + secs, 0).expect("valid timestamp")
    }

    #[test]
    fn disabled_scheduler_is_never_due() {
        let state = SchedulerState::new(false);
        assert!(!state.is_due(at(0)));
    }

    #[test]
    fn enabled_scheduler_is_due_immediately() {
        let state = SchedulerState::new(true);
        assert!(state.is_due(at(0)));
    }

    #[test]
    fn not_due_again_until_interval_elapses() {
        let mut state = SchedulerState::new(true);
        state.mark_completed(at(0), Duration::hours(24));

        assert_eq!(state.last_run, Some(at(0)));
        assert!(!state.is_due(at(60)));
        assert!(!state.is_due(at(24 * 3600 - 1)));
        assert!(state.is_due(at(24 * 3600)));
    }
}
