//! Keyword Rule Set and Priority Table
//!
//! Both are built once from [`RoutingConfig`] and never mutated. Trigger and
//! exclusion phrases are lowercased on construction so that matching against
//! lowercased input is case-insensitive.

use crate::config::{validate_agent_id, ConfigError, RoutingConfig};
use std::collections::HashSet;

/// Trigger phrases for one agent
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRule {
    identifier: String,
    triggers: Vec<String>,
    suppressible: bool,
}

impl AgentRule {
    pub fn new<I, S>(identifier: impl Into<String>, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            identifier: identifier.into(),
            triggers: triggers
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .collect(),
            suppressible: false,
        }
    }

    /// Mark the agent as skipped on conversational input
    pub fn suppressible(mut self) -> Self {
        self.suppressible = true;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn triggers(&self) -> &[String] {
        &self.triggers
    }

    pub fn is_suppressible(&self) -> bool {
        self.suppressible
    }
}

/// Conversational phrases that suppress suppressible agents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExclusionSet {
    phrases: Vec<String>,
}

impl ExclusionSet {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Whether already-lowercased input contains any exclusion phrase
    pub fn matches(&self, lowercase_input: &str) -> bool {
        self.phrases
            .iter()
            .any(|phrase| lowercase_input.contains(phrase.as_str()))
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }
}

/// Ordered trigger rules plus the router-wide exclusion set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordRuleSet {
    rules: Vec<AgentRule>,
    exclusions: ExclusionSet,
}

impl KeywordRuleSet {
    /// Build a rule set, rejecting duplicate agents and empty triggers
    pub fn new(rules: Vec<AgentRule>, exclusions: ExclusionSet) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for rule in &rules {
            validate_agent_id(rule.identifier())?;
            if !seen.insert(rule.identifier().to_string()) {
                return Err(ConfigError::DuplicateAgent(rule.identifier().to_string()));
            }
            if rule.triggers().iter().any(|t| t.trim().is_empty()) {
                return Err(ConfigError::EmptyTrigger {
                    agent: rule.identifier().to_string(),
                });
            }
        }

        if exclusions.phrases().iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::InvalidConfig(
                "exclusion phrases must not be empty".to_string(),
            ));
        }

        Ok(Self { rules, exclusions })
    }

    pub fn from_config(config: &RoutingConfig) -> Result<Self, ConfigError> {
        let rules = config
            .rules
            .iter()
            .map(|r| {
                let rule = AgentRule::new(r.agent.clone(), &r.triggers);
                if r.suppressible {
                    rule.suppressible()
                } else {
                    rule
                }
            })
            .collect();

        Self::new(rules, ExclusionSet::new(&config.exclusions))
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> &[AgentRule] {
        &self.rules
    }

    pub fn rule(&self, identifier: &str) -> Option<&AgentRule> {
        self.rules.iter().find(|r| r.identifier() == identifier)
    }

    pub fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.identifier())
    }
}

/// Precedence among matched agents, highest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorityOrder {
    order: Vec<String>,
}

impl PriorityOrder {
    pub fn new<I, S>(order: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order: Vec<String> = order.into_iter().map(Into::into).collect();

        let mut seen = HashSet::new();
        for id in &order {
            validate_agent_id(id)?;
            if !seen.insert(id.as_str()) {
                return Err(ConfigError::DuplicatePriority(id.clone()));
            }
        }

        Ok(Self { order })
    }

    pub fn from_config(config: &RoutingConfig) -> Result<Self, ConfigError> {
        Self::new(config.priority.iter().cloned())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.order.iter().any(|id| id == identifier)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
