//! Periodic reward refresh
//!
//! `start` spawns a task that fetches, then sleeps for the base interval
//! shifted by a random jitter plus the engine's error backoff. A "refresh
//! now" signal cuts the sleep short. The returned handle owns the task:
//! stopping or dropping it aborts the loop and drops in-flight results.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::config::RewardsConfig;
use crate::logger::{self, LogTag};

use super::engine::RewardsEngine;
use super::types::RewardsSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub interval: Duration,
    /// Each sleep is shifted by a random amount in `[-jitter, +jitter]`
    pub jitter: Duration,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            jitter: Duration::from_secs(2),
        }
    }
}

impl ScheduleSettings {
    pub fn from_config(config: &RewardsConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.refresh_interval_secs),
            jitter: Duration::from_millis(config.refresh_jitter_ms),
        }
    }
}

/// Sleep before the next scheduled fetch
pub fn next_delay(settings: &ScheduleSettings, backoff: Duration) -> Duration {
    let base = settings.interval + backoff;
    let jitter_ms = settings.jitter.as_millis() as i64;
    if jitter_ms == 0 {
        return base;
    }

    let offset = rand::thread_rng().gen_range(-jitter_ms..=jitter_ms);
    let delay_ms = (base.as_millis() as i64).saturating_add(offset).max(0);
    Duration::from_millis(delay_ms as u64)
}

pub struct RewardsWatchHandle {
    engine: Arc<RewardsEngine>,
    refresh: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

/// Spawn the refresh loop for `engine`; the first fetch runs immediately
pub fn start(engine: Arc<RewardsEngine>, settings: ScheduleSettings) -> RewardsWatchHandle {
    let refresh = Arc::new(Notify::new());
    logger::debug(
        LogTag::Rewards,
        &format!(
            "Scheduler started: every {:?} +/- {:?}",
            settings.interval, settings.jitter
        ),
    );

    let task = tokio::spawn(run(engine.clone(), settings, refresh.clone()));
    RewardsWatchHandle {
        engine,
        refresh,
        task: Some(task),
    }
}

async fn run(engine: Arc<RewardsEngine>, settings: ScheduleSettings, refresh: Arc<Notify>) {
    loop {
        engine.fetch_rewards().await;

        let backoff = engine.backoff_delay();
        let delay = next_delay(&settings, backoff);
        if !backoff.is_zero() {
            logger::debug(
                LogTag::Rewards,
                &format!("Next fetch in {:?} (includes {:?} backoff)", delay, backoff),
            );
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = refresh.notified() => {
                logger::debug(LogTag::Rewards, "Refresh requested");
            }
        }
    }
}

impl RewardsWatchHandle {
    /// Skip the rest of the current wait and fetch right away. A signal sent
    /// while a fetch is running triggers one more fetch after it.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    pub fn subscribe(&self) -> watch::Receiver<RewardsSnapshot> {
        self.engine.subscribe()
    }

    pub fn engine(&self) -> &Arc<RewardsEngine> {
        &self.engine
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|task| !task.is_finished()).unwrap_or(false)
    }

    /// Abort the loop and wait for it to wind down
    pub async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.engine.invalidate_in_flight();
            let _ = task.await;
            logger::debug(LogTag::Rewards, "Scheduler stopped");
        }
    }
}

impl Drop for RewardsWatchHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.engine.invalidate_in_flight();
        }
    }
}
