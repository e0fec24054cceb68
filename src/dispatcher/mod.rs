//! Dispatcher
//!
//! Scores a request, orders the matched agents, runs the first one on the
//! caller's task and hands the rest to the [`BackgroundExecutor`]. Built once
//! through [`DispatcherBuilder`]; everything it holds is immutable afterwards.
//!
//! ```no_run
//! use agent_dispatch::{DispatchContext, DispatcherBuilder, DispatcherConfig, EchoAgent};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), agent_dispatch::DispatchError> {
//! let config = DispatcherConfig::default();
//! let mut builder = DispatcherBuilder::new(config.clone());
//! for id in config.agent_ids() {
//!     builder = builder.register(id.clone(), Arc::new(EchoAgent::new(id)));
//! }
//! let dispatcher = builder.build()?;
//!
//! let result = dispatcher
//!     .dispatch("show today's calendar", DispatchContext::new())
//!     .await;
//! assert_eq!(result.agent_type(), "calendar");
//! # Ok(())
//! # }
//! ```

pub mod background;
pub mod result;

pub use background::{BackgroundExecutor, BackgroundOutcome, BackgroundReport};
pub use result::{DispatchOutcome, DispatchResult};

use crate::agent::{Agent, AgentDescriptor, AgentOutput, AgentRegistry, DispatchContext};
use crate::config::{AgentSection, ConfigError, DispatcherConfig, DispatcherSection};
use crate::error::{AgentError, AgentResult, DispatchError};
use crate::health::{HealthAggregator, SystemHealth};
use crate::observability::{DispatchMetrics, MetricsSnapshot};
use crate::routing::{
    score, AgentSelectionDecision, AgentSelector, KeywordRuleSet, PriorityOrder, ScoreMap,
};
use background::BackgroundJob;
use futures::FutureExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

/// Run `execute` with `Err` and panics folded into one error type
pub(crate) async fn guarded_execute(
    agent: &dyn Agent,
    input: &str,
    context: &DispatchContext,
) -> AgentResult<AgentOutput> {
    match AssertUnwindSafe(agent.execute(input, context))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => Err(AgentError::from_panic(panic)),
    }
}

/// Builder collecting configuration and agents before validation
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    agents: Vec<(String, Arc<dyn Agent>)>,
    reports: Option<mpsc::Sender<BackgroundReport>>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            config,
            agents: Vec::new(),
            reports: None,
        }
    }

    /// Add an agent. Identifiers are validated in [`build`](Self::build).
    pub fn register(mut self, identifier: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        self.agents.push((identifier.into(), agent));
        self
    }

    /// Forward background outcomes to `sender`
    pub fn with_background_reports(mut self, sender: mpsc::Sender<BackgroundReport>) -> Self {
        self.reports = Some(sender);
        self
    }

    /// Validate everything and produce an immutable dispatcher
    pub fn build(self) -> Result<Dispatcher, DispatchError> {
        self.config.validate()?;

        let mut registry = AgentRegistry::new();
        for (identifier, agent) in self.agents {
            registry.register(identifier, agent)?;
        }

        let rules = KeywordRuleSet::from_config(&self.config.routing)?;
        let priority = PriorityOrder::from_config(&self.config.routing)?;

        for id in rules.identifiers() {
            if !registry.contains(id) {
                return Err(ConfigError::UnknownAgent {
                    context: "routing rule".to_string(),
                    agent: id.to_string(),
                }
                .into());
            }
        }
        for id in priority.iter() {
            if !registry.contains(id) {
                return Err(ConfigError::UnknownAgent {
                    context: "priority order".to_string(),
                    agent: id.to_string(),
                }
                .into());
            }
        }

        let settings = self.config.dispatcher;
        let registry = Arc::new(registry);
        let metrics = Arc::new(DispatchMetrics::new());

        let mut background = BackgroundExecutor::new(
            settings.max_background_tasks,
            Duration::from_millis(settings.background_timeout_ms),
            metrics.clone(),
        );
        if let Some(sender) = self.reports {
            background = background.with_reports(sender);
        }

        let health = HealthAggregator::new(
            registry.clone(),
            Duration::from_millis(settings.health_timeout_ms),
        );

        info!(
            agents = registry.len(),
            rules = rules.rules().len(),
            priority = priority.len(),
            "Dispatcher initialized"
        );

        Ok(Dispatcher {
            registry,
            rules: Arc::new(rules),
            selector: AgentSelector::new(priority),
            background,
            health,
            metrics,
            descriptors: self.config.agents,
            settings,
        })
    }
}

/// Trigger phrases keyed by agent identifier
pub type KeywordTable = BTreeMap<String, Vec<String>>;

/// Registered agents with their dispatch keywords
#[derive(Debug, Clone, Serialize)]
pub struct AgentCatalog {
    pub total_agents: usize,
    pub agents: Vec<AgentDescriptor>,
    pub keywords: KeywordTable,
}

/// Routes requests to agents
pub struct Dispatcher {
    registry: Arc<AgentRegistry>,
    rules: Arc<KeywordRuleSet>,
    selector: AgentSelector,
    background: BackgroundExecutor,
    health: HealthAggregator,
    metrics: Arc<DispatchMetrics>,
    descriptors: BTreeMap<String, AgentSection>,
    settings: DispatcherSection,
}

impl Dispatcher {
    /// Route `input` and return the primary agent's result.
    ///
    /// Never fails: no match yields a clarification and agent failures are
    /// wrapped in the outcome.
    pub async fn dispatch(&self, input: &str, context: DispatchContext) -> DispatchResult {
        let dispatch_id = Uuid::new_v4();
        let span = crate::dispatch_span!(dispatch_id = %dispatch_id);
        self.dispatch_inner(dispatch_id, input, context)
            .instrument(span)
            .await
    }

    /// Like [`dispatch`](Self::dispatch) but fails when no agent matched
    pub async fn try_dispatch(
        &self,
        input: &str,
        context: DispatchContext,
    ) -> Result<DispatchResult, DispatchError> {
        let result = self.dispatch(input, context).await;
        if result.is_clarification() {
            return Err(DispatchError::NoAgentMatched);
        }
        Ok(result)
    }

    /// Scores for `input` without executing anything
    pub fn score(&self, input: &str) -> ScoreMap {
        score(input, &self.rules)
    }

    /// Ordered candidate list for `input` without executing anything
    pub fn candidates(&self, input: &str) -> Vec<String> {
        self.selector.rank(&self.score(input))
    }

    async fn dispatch_inner(
        &self,
        dispatch_id: Uuid,
        input: &str,
        context: DispatchContext,
    ) -> DispatchResult {
        self.metrics.dispatch_received();
        debug!("Analyzing input: {}", truncate(input, 100));

        let scores = self.score(input);

        let (primary, background) = match self.selector.select(&scores) {
            AgentSelectionDecision::RouteToAgent {
                primary,
                background,
                reason,
            } => {
                debug!("Routing decision: {}", reason);
                (primary, background)
            }
            AgentSelectionDecision::NoRoute { reason } => {
                info!("No agent matched ({}); asking for clarification", reason);
                self.metrics.clarification_returned();
                return DispatchResult::clarification(
                    dispatch_id,
                    self.settings.clarification_message.clone(),
                    self.settings.clarification_suggestions.clone(),
                    scores,
                );
            }
        };

        self.metrics.primary_selected(&primary);
        let outcome = self.run_primary(&primary, input, &context).await;

        let coordinated = !background.is_empty();
        if coordinated {
            info!(
                "Coordinating {} background agent(s): {:?}",
                background.len(),
                background
            );
            self.submit_background(dispatch_id, &background, input, &context);
        }

        DispatchResult {
            dispatch_id,
            primary_agent: primary,
            outcome,
            coordinated,
            background_agents: background,
            scores,
            timestamp: chrono::Utc::now(),
        }
    }

    async fn run_primary(
        &self,
        identifier: &str,
        input: &str,
        context: &DispatchContext,
    ) -> DispatchOutcome {
        let agent = match self.registry.get(identifier) {
            Ok(agent) => agent,
            Err(e) => {
                error!("Primary agent unavailable: {}", e);
                self.metrics.primary_finished(false, Duration::ZERO);
                return DispatchOutcome::Failed {
                    error: format!("Agent {identifier} not found"),
                };
            }
        };

        let span = crate::agent_span!(agent = %identifier, role = "primary");
        let start = Instant::now();
        let result = guarded_execute(agent.as_ref(), input, context)
            .instrument(span)
            .await;
        let elapsed = start.elapsed();

        match result {
            Ok(output) => {
                if output.success {
                    debug!("Agent {} completed in {:?}", identifier, elapsed);
                } else {
                    warn!(
                        "Agent {} reported failure: {}",
                        identifier,
                        output.error.as_deref().unwrap_or("unknown error")
                    );
                }
                self.metrics.primary_finished(output.success, elapsed);
                DispatchOutcome::Completed { output }
            }
            Err(e) => {
                error!("Agent {} execution error: {}", identifier, e);
                self.metrics.primary_finished(false, elapsed);
                DispatchOutcome::Failed {
                    error: e.to_public_message(),
                }
            }
        }
    }

    fn submit_background(
        &self,
        dispatch_id: Uuid,
        identifiers: &[String],
        input: &str,
        context: &DispatchContext,
    ) {
        for identifier in identifiers {
            match self.registry.get(identifier) {
                Ok(agent) => {
                    self.background.submit(BackgroundJob {
                        dispatch_id,
                        agent_id: identifier.clone(),
                        agent,
                        input: input.to_string(),
                        context: context.clone(),
                    });
                }
                Err(e) => warn!("Skipping background agent: {}", e),
            }
        }
    }

    /// Descriptors for every registered agent, in registration order
    pub fn list_agents(&self) -> Vec<AgentDescriptor> {
        self.registry
            .list_all()
            .into_iter()
            .map(|(identifier, agent)| self.describe(identifier, agent.as_ref()))
            .collect()
    }

    /// Agent descriptors plus the keyword table
    pub fn catalog(&self) -> AgentCatalog {
        let agents = self.list_agents();
        let keywords = self
            .rules
            .rules()
            .iter()
            .map(|r| (r.identifier().to_string(), r.triggers().to_vec()))
            .collect();

        AgentCatalog {
            total_agents: agents.len(),
            agents,
            keywords,
        }
    }

    fn describe(&self, identifier: String, agent: &dyn Agent) -> AgentDescriptor {
        let configured = self.descriptors.get(&identifier);

        let description = agent
            .description()
            .map(str::to_string)
            .or_else(|| configured.and_then(|c| c.description.clone()))
            .unwrap_or_else(|| format!("{} Agent", capitalize(&identifier)));

        let mut capabilities = agent.capabilities();
        if capabilities.is_empty() {
            if let Some(c) = configured {
                capabilities = c.capabilities.clone();
            }
        }

        let triggers = self
            .rules
            .rule(&identifier)
            .map(|r| r.triggers().to_vec())
            .unwrap_or_default();

        AgentDescriptor {
            display_name: agent.display_name().to_string(),
            identifier,
            description,
            capabilities,
            triggers,
        }
    }

    /// Health of every agent plus the dispatcher's own status
    pub async fn health_check(&self) -> SystemHealth {
        self.metrics.health_check_run();
        let span = crate::health_span!(agents = self.registry.len());
        self.health.report().instrument(span).await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Background executions submitted but not yet finished
    pub fn background_in_flight(&self) -> u64 {
        self.background.in_flight()
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &DispatcherSection {
        &self.settings
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("priority", &self.selector.priority())
            .field("background", &self.background)
            .finish_non_exhaustive()
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
