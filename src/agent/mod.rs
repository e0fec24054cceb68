//! Agent contract consumed by the dispatcher
//!
//! Agents are external handlers: the dispatcher only sees `execute` and the
//! optional `health_check`. Implementations should report domain failures via
//! [`AgentOutput::failure`]; the dispatcher still guards `Err` returns and
//! panics in case an implementation does not.

use crate::error::AgentResult;
use crate::health::HealthStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod echo;
pub mod registry;

pub use echo::EchoAgent;
pub use registry::AgentRegistry;

/// Handler for one task domain (email, calendar, ...)
#[async_trait]
pub trait Agent: Send + Sync {
    /// Human-readable name for listings
    fn display_name(&self) -> &str;

    /// Optional one-line description
    fn description(&self) -> Option<&str> {
        None
    }

    /// What this agent can do, for UI population
    fn capabilities(&self) -> Vec<String> {
        Vec::new()
    }

    /// Handle a request routed to this agent
    async fn execute(&self, input: &str, context: &DispatchContext) -> AgentResult<AgentOutput>;

    /// Report agent health. `Ok(None)` means the agent has no health contract.
    async fn health_check(&self) -> AgentResult<Option<HealthReport>> {
        Ok(None)
    }
}

/// Arbitrary caller-supplied context passed unchanged to every agent
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct DispatchContext(Map<String, Value>);

impl DispatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for DispatchContext {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Structured result returned by an agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentOutput {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl AgentOutput {
    /// Successful output with a textual response
    pub fn success(response: impl Into<String>) -> Self {
        Self {
            success: true,
            response: Some(response.into()),
            error: None,
            data: Value::Null,
        }
    }

    /// Failed output carrying an error message
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            response: None,
            error: Some(error.into()),
            data: Value::Null,
        }
    }

    /// Attach structured data
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// Health reported by an agent's own health contract
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde(default)]
    pub detail: Value,
}

impl HealthReport {
    pub fn healthy(detail: Value) -> Self {
        Self {
            status: HealthStatus::Healthy,
            detail,
        }
    }

    pub fn degraded(detail: Value) -> Self {
        Self {
            status: HealthStatus::Degraded,
            detail,
        }
    }
}

/// Introspection entry for one registered agent
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgentDescriptor {
    pub identifier: String,
    pub display_name: String,
    pub description: String,
    pub capabilities: Vec<String>,
    /// Trigger phrases routing to this agent (empty if it has no rule)
    pub triggers: Vec<String>,
}
