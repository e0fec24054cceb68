//! Agent Registry
//!
//! Fixed mapping from agent identifier to agent instance. Populated once while
//! the dispatcher is built and shared read-only afterwards, so lookups need no
//! locking.

use super::Agent;
use crate::config::{validate_agent_id, ConfigError};
use crate::error::DispatchError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Registry of agents keyed by identifier, in registration order
#[derive(Default)]
pub struct AgentRegistry {
    entries: Vec<(String, Arc<dyn Agent>)>,
    index: HashMap<String, usize>,
}

impl AgentRegistry {
    /// Create a new empty agent registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under `identifier`
    pub fn register(
        &mut self,
        identifier: impl Into<String>,
        agent: Arc<dyn Agent>,
    ) -> Result<(), ConfigError> {
        let identifier = identifier.into();
        validate_agent_id(&identifier)?;

        if self.index.contains_key(&identifier) {
            return Err(ConfigError::DuplicateAgent(identifier));
        }

        info!(
            "Registered agent '{}' ({})",
            identifier,
            agent.display_name()
        );
        self.index.insert(identifier.clone(), self.entries.len());
        self.entries.push((identifier, agent));
        Ok(())
    }

    /// Get an agent by identifier
    pub fn get(&self, identifier: &str) -> Result<Arc<dyn Agent>, DispatchError> {
        match self.index.get(identifier) {
            Some(&i) => Ok(self.entries[i].1.clone()),
            None => {
                debug!("Agent lookup failed: {}", identifier);
                Err(DispatchError::AgentNotFound(identifier.to_string()))
            }
        }
    }

    /// Check whether an identifier is registered
    pub fn contains(&self, identifier: &str) -> bool {
        self.index.contains_key(identifier)
    }

    /// All registered agents in registration order
    pub fn list_all(&self) -> Vec<(String, Arc<dyn Agent>)> {
        self.entries
            .iter()
            .map(|(id, agent)| (id.clone(), agent.clone()))
            .collect()
    }

    /// Registered identifiers in registration order
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    /// Number of registered agents
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.identifiers().collect::<Vec<_>>())
            .finish()
    }
}
