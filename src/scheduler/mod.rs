//! Per-tick due-target selection and the recurring tick loop.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::db::{MonitorStore, StoreError};
use crate::engine::MonitorEngine;
use crate::models::Target;

/// Uniform over the inclusive range.
pub fn random_interval(min: u32, max: u32) -> u32 {
    rand::rng().random_range(min..=max)
}

/// A target with no history is always due.
pub fn is_due(last_checked_at: Option<DateTime<Utc>>, interval_minutes: u32, now: DateTime<Utc>) -> bool {
    match last_checked_at {
        None => true,
        Some(last) => now - last >= ChronoDuration::minutes(i64::from(interval_minutes)),
    }
}

/// Last randomized interval chosen per target, in minutes. Process memory only.
#[derive(Default)]
pub struct IntervalCache {
    next: DashMap<String, u32>,
}

impl IntervalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The interval that applies to `target` on this tick.
    pub fn current_interval(&self, target: &Target) -> u32 {
        match target.randomized_range() {
            Some((min, max)) => *self
                .next
                .entry(target.id.clone())
                .or_insert_with(|| random_interval(min, max)),
            None => target.fixed_interval(),
        }
    }

    /// Draws a fresh interval for a target that is about to be probed.
    pub fn regenerate(&self, target: &Target) -> Option<u32> {
        let (min, max) = target.randomized_range()?;
        let next = random_interval(min, max);
        self.next.insert(target.id.clone(), next);
        Some(next)
    }

    pub fn invalidate(&self, target_id: &str) {
        self.next.remove(target_id);
    }

    pub fn cached(&self, target_id: &str) -> Option<u32> {
        self.next.get(target_id).map(|v| *v)
    }
}

pub struct Scheduler {
    intervals: IntervalCache,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            intervals: IntervalCache::new(),
        }
    }

    pub fn intervals(&self) -> &IntervalCache {
        &self.intervals
    }

    /// Picks the active, actively probed targets whose interval has elapsed.
    ///
    /// Randomized targets get their next interval drawn here, before the probe runs.
    pub async fn select_due(
        &self,
        store: &dyn MonitorStore,
        now: DateTime<Utc>,
    ) -> Result<Vec<Target>, StoreError> {
        let mut due = Vec::new();
        for target in store.list_targets().await? {
            if !target.is_active || !target.probe.is_actively_probed() {
                continue;
            }
            let interval_minutes = self.intervals.current_interval(&target);
            let last = store.latest_observation(&target.id).await?;
            if !is_due(last.map(|o| o.checked_at), interval_minutes, now) {
                continue;
            }
            if let Some(next) = self.intervals.regenerate(&target) {
                debug!(monitor_id = %target.id, next_interval_minutes = next, "Drew next randomized interval.");
            }
            due.push(target);
        }
        Ok(due)
    }
}

/// Drives [`MonitorEngine::run_due_schedule`] once per `period` until `shutdown` flips to true.
pub async fn start_periodic_schedule(
    engine: Arc<MonitorEngine>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(period_seconds = period.as_secs(), "Scheduler started.");
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Scheduler received shutdown signal.");
                    break;
                }
            }
            _ = ticker.tick() => {
                match engine.run_due_schedule().await {
                    Ok(summary) => debug!(probed = summary.probed, "Tick complete."),
                    Err(e) => error!(error = %e, "Scheduler tick failed."),
                }
            }
        }
    }
}
