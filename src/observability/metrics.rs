//! Dispatch metrics
//!
//! Atomic counters for the hot path and mutex-protected collections for
//! per-agent statistics. Each dispatcher owns its own collector; there is no
//! process-wide instance.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Upper bound on retained primary execution times
const MAX_TIMING_SAMPLES: usize = 1000;

/// Thread-safe dispatch metrics
pub struct DispatchMetrics {
    dispatches: AtomicU64,
    clarifications: AtomicU64,
    primary_completed: AtomicU64,
    primary_failures: AtomicU64,

    background_submitted: AtomicU64,
    background_completed: AtomicU64,
    background_failed: AtomicU64,
    background_in_flight: AtomicU64,

    health_checks: AtomicU64,
    started_at: AtomicU64,

    // in milliseconds
    primary_times: Mutex<Vec<u64>>,
    selections: Mutex<BTreeMap<String, u64>>,
}

/// Point-in-time copy of [`DispatchMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub dispatches: u64,
    pub clarifications: u64,
    pub primary_completed: u64,
    pub primary_failures: u64,
    pub background: BackgroundMetrics,
    pub health_checks: u64,
    pub primary_selections: BTreeMap<String, u64>,
    pub avg_primary_time_ms: f64,
    pub primary_time_p95_ms: f64,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackgroundMetrics {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub in_flight: u64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self {
            dispatches: AtomicU64::new(0),
            clarifications: AtomicU64::new(0),
            primary_completed: AtomicU64::new(0),
            primary_failures: AtomicU64::new(0),
            background_submitted: AtomicU64::new(0),
            background_completed: AtomicU64::new(0),
            background_failed: AtomicU64::new(0),
            background_in_flight: AtomicU64::new(0),
            health_checks: AtomicU64::new(0),
            started_at: AtomicU64::new(current_timestamp()),
            primary_times: Mutex::new(Vec::new()),
            selections: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn dispatch_received(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn clarification_returned(&self) {
        self.clarifications.fetch_add(1, Ordering::Relaxed);
    }

    /// Record which agent handled a request in the foreground
    pub fn primary_selected(&self, agent: &str) {
        if let Ok(mut selections) = self.selections.lock() {
            *selections.entry(agent.to_string()).or_insert(0) += 1;
        }
    }

    pub fn primary_finished(&self, success: bool, elapsed: Duration) {
        if success {
            self.primary_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.primary_failures.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.primary_times.lock() {
            times.push(elapsed.as_millis() as u64);
            if times.len() > MAX_TIMING_SAMPLES {
                times.remove(0);
            }
        }
    }

    pub fn background_submitted(&self) {
        self.background_submitted.fetch_add(1, Ordering::Relaxed);
        self.background_in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn background_finished(&self, success: bool) {
        if success {
            self.background_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.background_failed.fetch_add(1, Ordering::Relaxed);
        }
        // saturating: never wrap below zero
        let _ = self
            .background_in_flight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
    }

    pub fn background_in_flight(&self) -> u64 {
        self.background_in_flight.load(Ordering::Relaxed)
    }

    pub fn health_check_run(&self) {
        self.health_checks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let (avg_primary_time_ms, primary_time_p95_ms) = self.timing_stats();
        let primary_selections = self
            .selections
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();
        let started_at = self.started_at.load(Ordering::Relaxed);

        MetricsSnapshot {
            dispatches: self.dispatches.load(Ordering::Relaxed),
            clarifications: self.clarifications.load(Ordering::Relaxed),
            primary_completed: self.primary_completed.load(Ordering::Relaxed),
            primary_failures: self.primary_failures.load(Ordering::Relaxed),
            background: BackgroundMetrics {
                submitted: self.background_submitted.load(Ordering::Relaxed),
                completed: self.background_completed.load(Ordering::Relaxed),
                failed: self.background_failed.load(Ordering::Relaxed),
                in_flight: self.background_in_flight.load(Ordering::Relaxed),
            },
            health_checks: self.health_checks.load(Ordering::Relaxed),
            primary_selections,
            avg_primary_time_ms,
            primary_time_p95_ms,
            uptime_seconds: current_timestamp().saturating_sub(started_at),
        }
    }

    fn timing_stats(&self) -> (f64, f64) {
        let Ok(times) = self.primary_times.lock() else {
            return (0.0, 0.0);
        };
        if times.is_empty() {
            return (0.0, 0.0);
        }

        let avg = times.iter().sum::<u64>() as f64 / times.len() as f64;
        let mut sorted = times.clone();
        sorted.sort_unstable();
        (avg, percentile(&sorted, 95.0))
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DispatchMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchMetrics")
            .field("dispatches", &self.dispatches.load(Ordering::Relaxed))
            .field(
                "background_in_flight",
                &self.background_in_flight.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = sorted_data[index.floor() as usize] as f64;
    let upper = sorted_data[index.ceil() as usize] as f64;
    lower + (upper - lower) * index.fract()
}
