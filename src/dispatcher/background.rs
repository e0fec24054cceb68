//! Background execution of secondary agents
//!
//! Each background agent runs as a detached tokio task. Fan-out is bounded by
//! a semaphore and every execution by a timeout; a panic or error only affects
//! the task it happened in. Outcomes are logged and, if a report channel is
//! attached, forwarded there. They never reach the dispatch caller.

use super::guarded_execute;
use crate::agent::{Agent, AgentOutput, DispatchContext};
use crate::error::AgentError;
use crate::observability::DispatchMetrics;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Outcome of one background execution
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackgroundOutcome {
    Completed { output: AgentOutput },
    Failed { error: String },
}

/// Sent on the report channel when a background execution finishes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackgroundReport {
    pub dispatch_id: Uuid,
    pub agent: String,
    pub outcome: BackgroundOutcome,
    pub elapsed_ms: u64,
    pub finished_at: DateTime<Utc>,
}

impl BackgroundReport {
    pub fn success(&self) -> bool {
        matches!(&self.outcome, BackgroundOutcome::Completed { output } if output.success)
    }
}

/// A background job: one agent run on behalf of a finished dispatch
pub(crate) struct BackgroundJob {
    pub dispatch_id: Uuid,
    pub agent_id: String,
    pub agent: Arc<dyn Agent>,
    pub input: String,
    pub context: DispatchContext,
}

/// Spawns and supervises background agent executions
pub struct BackgroundExecutor {
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    metrics: Arc<DispatchMetrics>,
    reports: Option<mpsc::Sender<BackgroundReport>>,
}

impl BackgroundExecutor {
    pub fn new(max_concurrent: usize, timeout: Duration, metrics: Arc<DispatchMetrics>) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            timeout,
            metrics,
            reports: None,
        }
    }

    /// Forward every finished background execution to `sender`
    pub fn with_reports(mut self, sender: mpsc::Sender<BackgroundReport>) -> Self {
        self.reports = Some(sender);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Executions submitted but not yet finished
    pub fn in_flight(&self) -> u64 {
        self.metrics.background_in_flight()
    }

    pub(crate) fn submit(&self, job: BackgroundJob) -> JoinHandle<()> {
        let semaphore = self.semaphore.clone();
        let metrics = self.metrics.clone();
        let reports = self.reports.clone();
        let timeout = self.timeout;

        metrics.background_submitted();
        debug!(
            dispatch_id = %job.dispatch_id,
            agent = %job.agent_id,
            "Submitting background agent"
        );

        let span = crate::agent_span!(
            agent = %job.agent_id,
            dispatch_id = %job.dispatch_id,
            role = "background"
        );

        tokio::spawn(
            async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        let start = Instant::now();
                        let result = tokio::time::timeout(
                            timeout,
                            guarded_execute(job.agent.as_ref(), &job.input, &job.context),
                        )
                        .await
                        .unwrap_or_else(|_| {
                            Err(AgentError::TimedOut {
                                timeout_ms: timeout.as_millis() as u64,
                            })
                        });
                        Some((result, start.elapsed()))
                    }
                    Err(_) => None,
                };

                let Some((result, elapsed)) = outcome else {
                    warn!(agent = %job.agent_id, "Background executor closed; job dropped");
                    metrics.background_finished(false);
                    return;
                };

                let outcome = match result {
                    Ok(output) => BackgroundOutcome::Completed { output },
                    Err(e) => {
                        warn!(
                            agent = %job.agent_id,
                            error = %e,
                            "Background agent failed"
                        );
                        BackgroundOutcome::Failed {
                            error: e.to_public_message(),
                        }
                    }
                };

                let report = BackgroundReport {
                    dispatch_id: job.dispatch_id,
                    agent: job.agent_id,
                    outcome,
                    elapsed_ms: elapsed.as_millis() as u64,
                    finished_at: Utc::now(),
                };

                info!(
                    "Background agent {} completed: {}",
                    report.agent,
                    report.success()
                );
                metrics.background_finished(report.success());

                if let Some(sender) = reports {
                    if let Err(e) = sender.try_send(report) {
                        debug!("Background report not delivered: {}", e);
                    }
                }
            }
            .instrument(span),
        )
    }
}

impl std::fmt::Debug for BackgroundExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundExecutor")
            .field("available_permits", &self.semaphore.available_permits())
            .field("timeout", &self.timeout)
            .field("reports", &self.reports.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::MockAgent;

    fn job(agent_id: &str, agent: Arc<dyn Agent>) -> BackgroundJob {
        BackgroundJob {
            dispatch_id: Uuid::new_v4(),
            agent_id: agent_id.to_string(),
            agent,
            input: "input".to_string(),
            context: DispatchContext::new().with("user_id", 3),
        }
    }

    fn executor(timeout_ms: u64) -> (BackgroundExecutor, mpsc::Receiver<BackgroundReport>) {
        let (tx, rx) = mpsc::channel(16);
        let executor = BackgroundExecutor::new(
            4,
            Duration::from_millis(timeout_ms),
            Arc::new(DispatchMetrics::new()),
        )
        .with_reports(tx);
        (executor, rx)
    }

    #[tokio::test]
    async fn test_successful_job_reports_output() {
        let (executor, mut rx) = executor(1000);
        let agent = Arc::new(MockAgent::responding("calendar", "scheduled"));

        executor.submit(job("calendar", agent.clone())).await.unwrap();

        let report = rx.recv().await.unwrap();
        assert_eq!(report.agent, "calendar");
        assert!(report.success());
        assert_eq!(agent.calls().await[0].context.get("user_id"), Some(&serde_json::json!(3)));
        assert_eq!(executor.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_panicking_job_is_isolated() {
        let (executor, mut rx) = executor(1000);

        let handle = executor.submit(job("viber", Arc::new(MockAgent::panicking("viber"))));
        assert!(handle.await.is_ok());

        let report = rx.recv().await.unwrap();
        assert!(!report.success());
        match report.outcome {
            BackgroundOutcome::Failed { error } => assert!(error.contains("panicked")),
            other => panic!("Expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_job_times_out() {
        let (executor, mut rx) = executor(20);
        let agent = MockAgent::responding("web", "late").with_delay(Duration::from_secs(5));

        executor.submit(job("web", Arc::new(agent))).await.unwrap();

        let report = rx.recv().await.unwrap();
        match report.outcome {
            BackgroundOutcome::Failed { error } => assert!(error.contains("timed out")),
            other => panic!("Expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_closed_report_channel_is_ignored() {
        let (executor, rx) = executor(1000);
        drop(rx);

        let handle = executor.submit(job("task", Arc::new(MockAgent::responding("task", "ok"))));
        assert!(handle.await.is_ok());
        assert_eq!(executor.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let metrics = Arc::new(DispatchMetrics::new());
        let executor = BackgroundExecutor::new(1, Duration::from_secs(1), metrics.clone());
        let agent = Arc::new(
            MockAgent::responding("file", "ok").with_delay(Duration::from_millis(50)),
        );

        let first = executor.submit(job("file", agent.clone()));
        let second = executor.submit(job("file", agent.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        // second job is still waiting for the single permit
        assert_eq!(agent.execution_count(), 1);

        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(agent.execution_count(), 2);
        assert_eq!(metrics.snapshot().background.completed, 2);
    }
}
