//! Agent Dispatch - keyword-routed agent coordination
//!
//! Routes a natural-language request to one or more specialized agents chosen
//! from the text itself. The best-ranked agent runs synchronously and its result
//! is returned to the caller; any other matched agents run in the background.
//!
//! # Overview
//!
//! - Intent scoring by literal, case-insensitive trigger phrases
//! - Priority ordering and conversational exclusion filtering
//! - Synchronous primary execution with bounded background fan-out
//! - Concurrent, timeout-bounded health aggregation
//!
//! # Quick Start
//!
//! ```rust
//! use agent_dispatch::routing::{score, KeywordRuleSet};
//! use agent_dispatch::RoutingConfig;
//!
//! let rules = KeywordRuleSet::from_config(&RoutingConfig::default()).unwrap();
//! let scores = score("show today's calendar", &rules);
//!
//! assert_eq!(scores.get("calendar"), Some(13));
//! assert_eq!(scores.len(), 1);
//! ```

pub mod agent;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod observability;
pub mod routing;
pub mod testing;

pub use agent::{
    Agent, AgentDescriptor, AgentOutput, AgentRegistry, DispatchContext, EchoAgent, HealthReport,
};
pub use config::{
    AgentSection, ConfigError, DispatcherConfig, DispatcherSection, RoutingConfig, RuleConfig,
    GENERAL_AGENT,
};
pub use dispatcher::{
    AgentCatalog, BackgroundOutcome, BackgroundReport, DispatchOutcome, DispatchResult,
    Dispatcher, DispatcherBuilder,
};
pub use error::{AgentError, AgentResult, DispatchError};
pub use health::{AgentHealth, HealthStatus, OverallStatus, SystemHealth};
pub use routing::{AgentScore, ScoreMap};
