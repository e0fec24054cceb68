//! Health Aggregator
//!
//! Polls every registered agent's health contract concurrently, each bounded by
//! a timeout, and folds the results into an overall status. A failing, panicking
//! or hanging agent only degrades its own entry; the aggregate check itself
//! never fails.

use crate::agent::{Agent, AgentRegistry};
use crate::error::AgentError;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Health of a single agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Error,
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Error => write!(f, "error"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Aggregate health across all agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
}

impl OverallStatus {
    /// `Healthy` only if every agent reports healthy
    pub fn from_checks(checks: &[AgentHealth]) -> Self {
        if checks.is_empty() {
            warn!("No agents registered - assuming healthy");
            return Self::Healthy;
        }

        let healthy_count = checks
            .iter()
            .filter(|c| c.status == HealthStatus::Healthy)
            .count();

        debug!(
            "Overall health check: {}/{} agents healthy",
            healthy_count,
            checks.len()
        );

        if healthy_count == checks.len() {
            Self::Healthy
        } else {
            Self::Degraded
        }
    }
}

/// Health check result for one agent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentHealth {
    pub identifier: String,
    pub status: HealthStatus,
    pub detail: Value,
    pub response_time_ms: u64,
}

/// Combined health of the dispatcher and its agents
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub overall_status: OverallStatus,
    pub dispatcher_status: HealthStatus,
    pub agents: Vec<AgentHealth>,
    pub timestamp: DateTime<Utc>,
}

/// Runs health checks across the registry
pub struct HealthAggregator {
    registry: Arc<AgentRegistry>,
    timeout: Duration,
}

impl HealthAggregator {
    pub fn new(registry: Arc<AgentRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// Run all health checks concurrently; results are in registration order
    pub async fn check_all(&self) -> Vec<AgentHealth> {
        let checks = self
            .registry
            .list_all()
            .into_iter()
            .map(|(id, agent)| self.check_agent(id, agent));

        join_all(checks).await
    }

    /// Overall status from a fresh round of checks
    pub async fn overall_status(&self) -> OverallStatus {
        OverallStatus::from_checks(&self.check_all().await)
    }

    /// Full report: per-agent entries plus the dispatcher's own status
    pub async fn report(&self) -> SystemHealth {
        let agents = self.check_all().await;
        SystemHealth {
            overall_status: OverallStatus::from_checks(&agents),
            dispatcher_status: HealthStatus::Healthy,
            agents,
            timestamp: Utc::now(),
        }
    }

    async fn check_agent(&self, identifier: String, agent: Arc<dyn Agent>) -> AgentHealth {
        let start = Instant::now();
        // own task, so a check that blocks its thread cannot stall the timer
        let mut handle = tokio::spawn(async move { agent.health_check().await });
        let outcome = tokio::time::timeout(self.timeout, &mut handle).await;
        if outcome.is_err() {
            handle.abort();
        }
        let elapsed = start.elapsed();
        let response_time_ms = elapsed.as_millis() as u64;
        let timed_out = AgentError::TimedOut {
            timeout_ms: self.timeout.as_millis() as u64,
        };

        let (status, detail) = match outcome {
            Ok(Ok(_)) if elapsed > self.timeout => (
                HealthStatus::Error,
                json!({"error": timed_out.to_public_message()}),
            ),
            Ok(Ok(Ok(Some(report)))) => (report.status, report.detail),
            Ok(Ok(Ok(None))) => (
                HealthStatus::Unknown,
                json!({"message": "No health check implemented"}),
            ),
            Ok(Ok(Err(e))) => (HealthStatus::Error, json!({"error": e.to_public_message()})),
            Ok(Err(join_error)) => {
                let e = match join_error.try_into_panic() {
                    Ok(panic) => AgentError::from_panic(panic),
                    Err(_) => AgentError::Unavailable {
                        message: "health check cancelled".to_string(),
                    },
                };
                (HealthStatus::Error, json!({"error": e.to_public_message()}))
            }
            Err(_) => (
                HealthStatus::Error,
                json!({"error": timed_out.to_public_message()}),
            ),
        };

        if status == HealthStatus::Error {
            warn!(
                "Health check failed: agent={}, detail={}, response_time={}ms",
                identifier, detail, response_time_ms
            );
        } else {
            debug!(
                "Health check: agent={}, status={}, response_time={}ms",
                identifier, status, response_time_ms
            );
        }

        AgentHealth {
            identifier,
            status,
            detail,
            response_time_ms,
        }
    }
}
