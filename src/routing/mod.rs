//! Intent routing
//!
//! Turns raw request text into an ordered list of candidate agents:
//!
//! - [`rules`]: Keyword Rule Set, exclusion phrases and Priority Table
//! - [`scorer`]: pure literal-phrase scoring of the input
//! - [`agent_selector`]: priority composition and primary/background split

pub mod agent_selector;
pub mod rules;
pub mod scorer;

pub use agent_selector::{AgentSelectionDecision, AgentSelector};
pub use rules::{AgentRule, ExclusionSet, KeywordRuleSet, PriorityOrder};
pub use scorer::{score, AgentScore, ScoreMap};
