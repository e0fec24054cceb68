//! Configuration system for the dispatch engine
//!
//! Configuration is loaded once from TOML at start-up. A missing `[routing]`
//! section falls back to the built-in keyword tables; a present one replaces
//! them entirely.

use crate::routing::{KeywordRuleSet, PriorityOrder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Identifier reserved for the clarification result; no agent may use it
pub const GENERAL_AGENT: &str = "general";

/// Main dispatcher configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DispatcherConfig {
    #[serde(default)]
    pub dispatcher: DispatcherSection,
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Descriptors for agents, keyed by identifier
    #[serde(default)]
    pub agents: BTreeMap<String, AgentSection>,
}

/// Dispatcher section: timeouts, background bound and the clarification reply
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatcherSection {
    /// Upper bound for a single agent health check
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,
    /// Upper bound for a single background agent execution
    #[serde(default = "default_background_timeout_ms")]
    pub background_timeout_ms: u64,
    /// Maximum number of background executions running at once
    #[serde(default = "default_max_background_tasks")]
    pub max_background_tasks: usize,
    /// Message returned when no agent matches
    #[serde(default = "default_clarification_message")]
    pub clarification_message: String,
    /// Example categories returned alongside the clarification message
    #[serde(default = "default_clarification_suggestions")]
    pub clarification_suggestions: Vec<String>,
}

impl Default for DispatcherSection {
    fn default() -> Self {
        Self {
            health_timeout_ms: default_health_timeout_ms(),
            background_timeout_ms: default_background_timeout_ms(),
            max_background_tasks: default_max_background_tasks(),
            clarification_message: default_clarification_message(),
            clarification_suggestions: default_clarification_suggestions(),
        }
    }
}

fn default_health_timeout_ms() -> u64 {
    5000
}

fn default_background_timeout_ms() -> u64 {
    120_000
}

fn default_max_background_tasks() -> usize {
    16
}

fn default_clarification_message() -> String {
    "I'm not sure which agent should handle this. Could you be more specific?".to_string()
}

fn default_clarification_suggestions() -> Vec<String> {
    [
        "Email operations",
        "Calendar events",
        "Viber messages",
        "Task management",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Routing section: trigger rules, exclusion phrases and priority order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingConfig {
    /// Precedence among matched agents, highest first
    #[serde(default)]
    pub priority: Vec<String>,
    /// Conversational phrases that suppress suppressible agents
    #[serde(default)]
    pub exclusions: Vec<String>,
    /// Trigger rules, one per agent, in evaluation order
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Trigger rule for a single agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleConfig {
    pub agent: String,
    pub triggers: Vec<String>,
    #[serde(default)]
    pub suppressible: bool,
}

/// Descriptor for a registered agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AgentSection {
    pub display_name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid agent ID format: {0}")]
    InvalidAgentId(String),
    #[error("{context} references unregistered agent '{agent}'")]
    UnknownAgent { context: String, agent: String },
    #[error("Agent '{0}' is defined more than once")]
    DuplicateAgent(String),
    #[error("Agent '{0}' appears more than once in the priority order")]
    DuplicatePriority(String),
    #[error("Agent '{agent}' has an empty trigger phrase")]
    EmptyTrigger { agent: String },
    #[error("Agent identifier '{0}' is reserved")]
    ReservedIdentifier(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DispatcherConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DispatcherConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate internal consistency. Registry cross-checks happen when the
    /// dispatcher is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dispatcher.validate()?;
        self.routing.validate()?;

        for id in self.agents.keys() {
            validate_agent_id(id)?;
        }

        Ok(())
    }

    /// Agent identifiers in registration order: rule order first, then any
    /// described agents without a rule
    pub fn agent_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.routing.rules.iter().map(|r| r.agent.clone()).collect();
        for id in self.agents.keys() {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[dispatcher]
health_timeout_ms = 100
background_timeout_ms = 1000

[routing]
priority = ["memory", "email"]
exclusions = ["hello", "how are you"]

[[routing.rules]]
agent = "memory"
triggers = ["remember", "recall"]

[[routing.rules]]
agent = "email"
triggers = ["email", "send email"]

[[routing.rules]]
agent = "web"
triggers = ["search", "google"]
suppressible = true
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

impl DispatcherSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.health_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "health_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.background_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "background_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_background_tasks == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_background_tasks must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl RoutingConfig {
    /// Validate identifiers, duplicates and trigger phrases by building the
    /// routing tables and discarding them
    pub fn validate(&self) -> Result<(), ConfigError> {
        KeywordRuleSet::from_config(self)?;
        PriorityOrder::from_config(self)?;
        Ok(())
    }
}

impl Default for RoutingConfig {
    /// The built-in keyword tables, exclusion phrases and priority order
    fn default() -> Self {
        fn owned(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        let rule = |agent: &str, triggers: &[&str]| RuleConfig {
            agent: agent.to_string(),
            triggers: owned(triggers),
            suppressible: false,
        };

        let rules = vec![
            rule(
                "thinking",
                &[
                    "think", "analyze", "reason", "step by step", "complex", "solve",
                    "razmisli", "analiziraj", "objasni", "korak po korak", "rezonuj",
                ],
            ),
            rule(
                "email",
                &[
                    "email", "e-mail", "mail", "pošta", "posta", "send email", "sendmail",
                    "inbox", "outbox", "gmail", "outlook", "termin", "appointment", "meeting",
                ],
            ),
            rule(
                "viber",
                &[
                    "viber", "message", "poruka", "chat", "whatsapp", "messenger",
                    "send message", "reply", "odgovori", "pošalji poruku",
                ],
            ),
            rule(
                "calendar",
                &[
                    "calendar", "kalendar", "schedule", "raspored", "appointment", "termin",
                    "meeting", "sastanak", "reminder", "podsetnik", "event", "događaj",
                    "today", "tomorrow", "danas", "sutra", "next week", "sledeca nedelja",
                ],
            ),
            rule(
                "task",
                &[
                    "task", "zadatak", "todo", "create task", "napravi zadatak",
                    "remind me", "podsetimi", "remember", "upamti", "note", "beleška",
                ],
            ),
            RuleConfig {
                suppressible: true,
                ..rule(
                    "web",
                    &[
                        "search", "pretrage", "google", "find", "pronađi", "website", "web",
                        "url", "link", "browse", "internet", "online", "information about",
                        "latest news", "current events", "research", "what is happening",
                        "informacije o", "poslednje vesti", "trenutna dešavanja",
                    ],
                )
            },
            rule(
                "file",
                &[
                    "file", "fajl", "document", "dokument", "save", "sačuvaj", "open",
                    "otvori", "create file", "napravi fajl", "upload", "download",
                ],
            ),
            rule(
                "memory",
                &[
                    "remember", "zapamti", "forget", "zaboravi", "memory", "memorija",
                    "recall", "setiti se", "my profile", "preferences", "what did i say",
                    "conversation history", "previously", "ranije", "profile", "profil",
                ],
            ),
        ];

        Self {
            priority: owned(&[
                "thinking", "memory", "email", "calendar", "viber", "task", "web", "file",
            ]),
            exclusions: owned(&[
                "how are you", "kako si", "hello", "hi", "zdravo", "hey",
                "good morning", "dobro jutro", "good evening", "dobro veče",
                "thank you", "hvala", "thanks", "bye", "goodbye", "doviđenja",
                "what is your name", "kako se zoveš", "who are you", "ko si ti",
                "how do you feel", "šta osećaš", "are you okay", "da li si dobro",
            ]),
            rules,
        }
    }
}

/// Validate agent ID format: `[a-zA-Z0-9._-]+`, excluding the reserved sentinel
pub fn validate_agent_id(agent_id: &str) -> Result<(), ConfigError> {
    let valid_chars = agent_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if agent_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidAgentId(format!(
            "Agent ID '{agent_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    if agent_id == GENERAL_AGENT {
        return Err(ConfigError::ReservedIdentifier(agent_id.to_string()));
    }

    Ok(())
}
