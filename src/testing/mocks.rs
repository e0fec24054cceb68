//! Mock agents for testing
//!
//! [`MockAgent`] records every call it receives and can be scripted to
//! respond, report a failure, return an error, panic, or stall, with an
//! independently scripted health contract.

use crate::agent::{Agent, AgentOutput, DispatchContext, HealthReport};
use crate::error::{AgentError, AgentResult};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// One recorded `execute` call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub input: String,
    pub context: DispatchContext,
}

#[derive(Debug, Clone)]
enum ExecuteBehavior {
    Respond(String),
    ReportFailure(String),
    Fail(String),
    Panic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HealthBehavior {
    Healthy,
    Degraded,
    Missing,
    Fail,
    Panic,
    Hang,
    Block(Duration),
}

/// Scriptable agent for tests
#[derive(Debug, Clone)]
pub struct MockAgent {
    display_name: String,
    description: Option<String>,
    capabilities: Vec<String>,
    behavior: ExecuteBehavior,
    health: HealthBehavior,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    executions: Arc<AtomicUsize>,
}

impl MockAgent {
    fn with_behavior(name: impl Into<String>, behavior: ExecuteBehavior) -> Self {
        Self {
            display_name: name.into(),
            description: None,
            capabilities: Vec::new(),
            behavior,
            health: HealthBehavior::Healthy,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
            executions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Succeeds with `response`
    pub fn responding(name: impl Into<String>, response: impl Into<String>) -> Self {
        Self::with_behavior(name, ExecuteBehavior::Respond(response.into()))
    }

    /// Returns `AgentOutput::failure(error)`
    pub fn reporting_failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self::with_behavior(name, ExecuteBehavior::ReportFailure(error.into()))
    }

    /// Returns `Err(AgentError::ExecutionFailed)`
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_behavior(name, ExecuteBehavior::Fail(message.into()))
    }

    /// Panics inside `execute`
    pub fn panicking(name: impl Into<String>) -> Self {
        Self::with_behavior(name, ExecuteBehavior::Panic)
    }

    /// Sleep before acting on each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn without_health_check(mut self) -> Self {
        self.health = HealthBehavior::Missing;
        self
    }

    pub fn with_failing_health(mut self) -> Self {
        self.health = HealthBehavior::Fail;
        self
    }

    pub fn with_panicking_health(mut self) -> Self {
        self.health = HealthBehavior::Panic;
        self
    }

    pub fn with_hanging_health(mut self) -> Self {
        self.health = HealthBehavior::Hang;
        self
    }

    /// Health check that blocks its thread, then reports healthy
    pub fn with_blocking_health(mut self, duration: Duration) -> Self {
        self.health = HealthBehavior::Block(duration);
        self
    }

    pub fn with_degraded_health(mut self) -> Self {
        self.health = HealthBehavior::Degraded;
        self
    }

    /// Calls received so far, in arrival order
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    /// Number of times `execute` was entered
    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for MockAgent {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn capabilities(&self) -> Vec<String> {
        self.capabilities.clone()
    }

    async fn execute(&self, input: &str, context: &DispatchContext) -> AgentResult<AgentOutput> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().await.push(RecordedCall {
            input: input.to_string(),
            context: context.clone(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behavior {
            ExecuteBehavior::Respond(response) => Ok(AgentOutput::success(response.clone())
                .with_data(json!({"agent": self.display_name}))),
            ExecuteBehavior::ReportFailure(error) => Ok(AgentOutput::failure(error.clone())),
            ExecuteBehavior::Fail(message) => Err(AgentError::execution_failed(message.clone())),
            ExecuteBehavior::Panic => panic!("mock agent '{}' panicked", self.display_name),
        }
    }

    async fn health_check(&self) -> AgentResult<Option<HealthReport>> {
        match self.health {
            HealthBehavior::Healthy => Ok(Some(HealthReport::healthy(
                json!({"executions": self.execution_count()}),
            ))),
            HealthBehavior::Degraded => Ok(Some(HealthReport::degraded(
                json!({"reason": "backend slow"}),
            ))),
            HealthBehavior::Missing => Ok(None),
            HealthBehavior::Fail => Err(AgentError::unavailable("health probe failed")),
            HealthBehavior::Panic => panic!("health probe for '{}' panicked", self.display_name),
            HealthBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(None)
            }
            HealthBehavior::Block(duration) => {
                std::thread::sleep(duration);
                Ok(Some(HealthReport::healthy(json!({}))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthStatus;

    #[tokio::test]
    async fn test_mock_records_calls() {
        let agent = MockAgent::responding("email", "sent");
        let ctx = DispatchContext::new().with("user_id", 1);

        let output = agent.execute("send email", &ctx).await.unwrap();
        assert_eq!(output.response.as_deref(), Some("sent"));
        assert_eq!(agent.execution_count(), 1);

        let calls = agent.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].input, "send email");
        assert_eq!(calls[0].context, ctx);
    }

    #[tokio::test]
    async fn test_clones_share_call_log() {
        let agent = MockAgent::responding("task", "ok");
        let clone = agent.clone();
        clone.execute("x", &DispatchContext::new()).await.unwrap();
        assert_eq!(agent.execution_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_modes() {
        let ctx = DispatchContext::new();

        let reported = MockAgent::reporting_failure("viber", "offline")
            .execute("x", &ctx)
            .await
            .unwrap();
        assert!(!reported.success);

        let err = MockAgent::failing("viber", "boom")
            .execute("x", &ctx)
            .await
            .unwrap_err();
        assert_eq!(err, AgentError::execution_failed("boom"));
    }

    #[tokio::test]
    async fn test_health_modes() {
        let healthy = MockAgent::responding("a", "ok").health_check().await.unwrap();
        assert_eq!(healthy.unwrap().status, HealthStatus::Healthy);

        let missing = MockAgent::responding("a", "ok")
            .without_health_check()
            .health_check()
            .await
            .unwrap();
        assert!(missing.is_none());

        let failed = MockAgent::responding("a", "ok")
            .with_failing_health()
            .health_check()
            .await;
        assert!(failed.unwrap_err().to_string().contains("health probe failed"));
    }
}
