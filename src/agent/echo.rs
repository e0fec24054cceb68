//! Built-in echo agent used by the binary
//!
//! Acknowledges every request with its own identity so the routing engine can
//! be exercised end to end without real handlers wired in.

use super::{Agent, AgentOutput, DispatchContext, HealthReport};
use crate::config::AgentSection;
use crate::error::AgentResult;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

pub struct EchoAgent {
    identifier: String,
    display_name: String,
    description: Option<String>,
    capabilities: Vec<String>,
    requests_handled: AtomicU64,
}

impl EchoAgent {
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self {
            display_name: default_display_name(&identifier),
            identifier,
            description: None,
            capabilities: Vec::new(),
            requests_handled: AtomicU64::new(0),
        }
    }

    /// Build from a configured descriptor; missing fields fall back to defaults
    pub fn from_section(identifier: impl Into<String>, section: &AgentSection) -> Self {
        let mut agent = Self::new(identifier);
        if let Some(name) = &section.display_name {
            agent.display_name = name.clone();
        }
        agent.description = section.description.clone();
        agent.capabilities = section.capabilities.clone();
        agent
    }

    pub fn requests_handled(&self) -> u64 {
        self.requests_handled.load(Ordering::Relaxed)
    }
}

/// "calendar" -> "Calendar Agent"
fn default_display_name(identifier: &str) -> String {
    let mut chars = identifier.chars();
    match chars.next() {
        Some(first) => format!("{}{} Agent", first.to_uppercase(), chars.as_str()),
        None => "Agent".to_string(),
    }
}

#[async_trait]
impl Agent for EchoAgent {
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
        let handled = self.requests_handled.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            "Echo agent '{}' handling request #{}",
            self.identifier, handled
        );

        let context_keys: Vec<&String> = context.keys().collect();
        Ok(
            AgentOutput::success(format!("{} received: {}", self.display_name, input))
                .with_data(json!({
                    "agent": self.identifier,
                    "context_keys": context_keys,
                })),
        )
    }

    async fn health_check(&self) -> AgentResult<Option<HealthReport>> {
        Ok(Some(HealthReport::healthy(json!({
            "requests_handled": self.requests_handled(),
        }))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthStatus;

    #[test]
    fn test_default_display_name() {
        assert_eq!(default_display_name("calendar"), "Calendar Agent");
        assert_eq!(default_display_name("x"), "X Agent");
        assert_eq!(default_display_name(""), "Agent");
    }

    #[test]
    fn test_from_section() {
        let section = AgentSection {
            display_name: Some("Mailer".to_string()),
            description: Some("Sends mail".to_string()),
            capabilities: vec!["send".to_string()],
        };
        let agent = EchoAgent::from_section("email", &section);
        assert_eq!(agent.display_name(), "Mailer");
        assert_eq!(agent.description(), Some("Sends mail"));
        assert_eq!(agent.capabilities(), vec!["send"]);

        let agent = EchoAgent::from_section("email", &AgentSection::default());
        assert_eq!(agent.display_name(), "Email Agent");
        assert!(agent.description().is_none());
    }

    #[tokio::test]
    async fn test_execute_echoes_input() {
        let agent = EchoAgent::new("task");
        let ctx = DispatchContext::new().with("user_id", 1);

        let output = agent.execute("create task buy milk", &ctx).await.unwrap();
        assert!(output.success);
        assert_eq!(
            output.response.as_deref(),
            Some("Task Agent received: create task buy milk")
        );
        assert_eq!(output.data["agent"], "task");
        assert_eq!(output.data["context_keys"][0], "user_id");
        assert_eq!(agent.requests_handled(), 1);
    }

    #[tokio::test]
    async fn test_health_reports_request_count() {
        let agent = EchoAgent::new("task");
        agent.execute("todo", &DispatchContext::new()).await.unwrap();

        let report = agent.health_check().await.unwrap().unwrap();
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.detail["requests_handled"], 1);
    }
}
