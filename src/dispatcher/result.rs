//! Dispatch results returned to callers

use crate::agent::AgentOutput;
use crate::config::GENERAL_AGENT;
use crate::routing::ScoreMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// What happened to the foreground part of a dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The primary agent returned an output, successful or not
    Completed { output: AgentOutput },
    /// The primary agent returned `Err` or panicked
    Failed { error: String },
    /// Nothing matched; no agent was invoked
    Clarify {
        message: String,
        suggestions: Vec<String>,
    },
}

/// Result of one `dispatch` call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchResult {
    pub dispatch_id: Uuid,
    /// Agent that handled the request, or `"general"` for a clarification
    pub primary_agent: String,
    pub outcome: DispatchOutcome,
    /// More than one agent matched
    pub coordinated: bool,
    /// Agents submitted for background execution, in candidate order
    pub background_agents: Vec<String>,
    pub scores: ScoreMap,
    pub timestamp: DateTime<Utc>,
}

impl DispatchResult {
    pub(crate) fn clarification(
        dispatch_id: Uuid,
        message: String,
        suggestions: Vec<String>,
        scores: ScoreMap,
    ) -> Self {
        Self {
            dispatch_id,
            primary_agent: GENERAL_AGENT.to_string(),
            outcome: DispatchOutcome::Clarify {
                message,
                suggestions,
            },
            coordinated: false,
            background_agents: Vec::new(),
            scores,
            timestamp: Utc::now(),
        }
    }

    /// Whether the caller got a usable answer. A clarification counts as one.
    pub fn success(&self) -> bool {
        match &self.outcome {
            DispatchOutcome::Completed { output } => output.success,
            DispatchOutcome::Failed { .. } => false,
            DispatchOutcome::Clarify { .. } => true,
        }
    }

    /// Identifier of the agent that produced the outcome
    pub fn agent_type(&self) -> &str {
        &self.primary_agent
    }

    pub fn is_clarification(&self) -> bool {
        matches!(self.outcome, DispatchOutcome::Clarify { .. })
    }

    /// The agent's output, if the primary ran to completion
    pub fn output(&self) -> Option<&AgentOutput> {
        match &self.outcome {
            DispatchOutcome::Completed { output } => Some(output),
            _ => None,
        }
    }

    /// Error text from either an agent-reported failure or a caught `Err`/panic
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            DispatchOutcome::Completed { output } => output.error.as_deref(),
            DispatchOutcome::Failed { error } => Some(error),
            DispatchOutcome::Clarify { .. } => None,
        }
    }

    /// Every agent involved, primary first
    pub fn coordinated_agents(&self) -> Vec<&str> {
        if self.is_clarification() {
            return Vec::new();
        }
        std::iter::once(self.primary_agent.as_str())
            .chain(self.background_agents.iter().map(String::as_str))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn completed(output: AgentOutput, background: &[&str]) -> DispatchResult {
        DispatchResult {
            dispatch_id: Uuid::new_v4(),
            primary_agent: "email".to_string(),
            outcome: DispatchOutcome::Completed { output },
            coordinated: !background.is_empty(),
            background_agents: background.iter().map(|s| s.to_string()).collect(),
            scores: ScoreMap::default(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_success_follows_agent_output() {
        assert!(completed(AgentOutput::success("sent"), &[]).success());

        let failed = completed(AgentOutput::failure("smtp down"), &[]);
        assert!(!failed.success());
        assert_eq!(failed.error(), Some("smtp down"));
    }

    #[test]
    fn test_clarification_result() {
        let result = DispatchResult::clarification(
            Uuid::new_v4(),
            "Be more specific".to_string(),
            vec!["Email operations".to_string()],
            ScoreMap::default(),
        );
        assert!(result.success());
        assert!(result.is_clarification());
        assert_eq!(result.agent_type(), "general");
        assert!(result.output().is_none());
        assert!(result.coordinated_agents().is_empty());
    }

    #[test]
    fn test_coordinated_agents_lists_primary_first() {
        let result = completed(AgentOutput::success("ok"), &["calendar", "task"]);
        assert_eq!(result.coordinated_agents(), vec!["email", "calendar", "task"]);
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let value = serde_json::to_value(DispatchOutcome::Failed {
            error: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(value, json!({"status": "failed", "error": "boom"}));

        let result = completed(AgentOutput::success("ok"), &[]);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["outcome"]["status"], "completed");
        assert_eq!(value["outcome"]["output"]["response"], "ok");
        assert_eq!(value["primary_agent"], "email");
    }
}
