//! Candidate ordering and primary agent selection
//!
//! Priority only reorders matched agents: identifiers listed in the priority
//! order come first, in that order, followed by the remaining matched agents by
//! descending score. An agent without a positive score never becomes a
//! candidate.

use super::rules::PriorityOrder;
use super::scorer::ScoreMap;
use tracing::{debug, info};

/// Agent selection decision result
#[derive(Debug, Clone, PartialEq)]
pub enum AgentSelectionDecision {
    /// Run `primary` now and `background` afterwards
    RouteToAgent {
        primary: String,
        background: Vec<String>,
        reason: String,
    },
    /// Nothing scored
    NoRoute { reason: String },
}

/// Applies the priority table to a score mapping
#[derive(Debug, Clone, Default)]
pub struct AgentSelector {
    priority: PriorityOrder,
}

impl AgentSelector {
    pub fn new(priority: PriorityOrder) -> Self {
        Self { priority }
    }

    pub fn priority(&self) -> &PriorityOrder {
        &self.priority
    }

    /// Final ordered candidate list.
    ///
    /// Agents outside the priority table with exactly equal scores keep their
    /// rule-set order. That order is undefined but stable.
    pub fn rank(&self, scores: &ScoreMap) -> Vec<String> {
        let mut ranked: Vec<String> = self
            .priority
            .iter()
            .filter(|id| scores.contains(id))
            .map(str::to_string)
            .collect();

        let mut rest: Vec<_> = scores
            .iter()
            .filter(|s| !self.priority.contains(&s.agent))
            .collect();
        // stable sort: ties stay in rule-set order
        rest.sort_by(|a, b| b.score.cmp(&a.score));
        ranked.extend(rest.into_iter().map(|s| s.agent.clone()));

        debug!("Detection result: {:?}", ranked);
        ranked
    }

    /// Pick the primary agent and the background set
    pub fn select(&self, scores: &ScoreMap) -> AgentSelectionDecision {
        let mut ranked = self.rank(scores);

        if ranked.is_empty() {
            return AgentSelectionDecision::NoRoute {
                reason: "No trigger phrase matched".to_string(),
            };
        }

        let primary = ranked.remove(0);
        let reason = if self.priority.contains(&primary) {
            format!("'{primary}' is the highest-priority matched agent")
        } else {
            format!(
                "'{primary}' has the highest score ({})",
                scores.get(&primary).unwrap_or_default()
            )
        };

        info!(
            "Selected agent '{}' ({} background)",
            primary,
            ranked.len()
        );

        AgentSelectionDecision::RouteToAgent {
            primary,
            background: ranked,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::rules::{AgentRule, ExclusionSet, KeywordRuleSet};
    use crate::routing::scorer::score;

    fn rules() -> KeywordRuleSet {
        KeywordRuleSet::new(
            vec![
                AgentRule::new("alpha", ["a1"]),
                AgentRule::new("beta", ["b1", "beta-long-trigger"]),
                AgentRule::new("gamma", ["g1"]),
                AgentRule::new("delta", ["d1"]),
            ],
            ExclusionSet::default(),
        )
        .unwrap()
    }

    fn selector(priority: &[&str]) -> AgentSelector {
        AgentSelector::new(PriorityOrder::new(priority.iter().copied()).unwrap())
    }

    #[test]
    fn test_priority_beats_score() {
        let scores = score("a1 beta-long-trigger", &rules());
        assert!(scores.get("beta").unwrap() > scores.get("alpha").unwrap());

        let ranked = selector(&["alpha", "beta"]).rank(&scores);
        assert_eq!(ranked, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_unmatched_priority_agents_are_skipped() {
        let scores = score("g1", &rules());
        let ranked = selector(&["alpha", "beta"]).rank(&scores);
        assert_eq!(ranked, vec!["gamma"]);
    }

    #[test]
    fn test_unprioritized_agents_follow_by_descending_score() {
        let scores = score("a1 g1 g1 d1 d1 d1", &rules());
        let ranked = selector(&["alpha"]).rank(&scores);
        assert_eq!(ranked, vec!["alpha", "delta", "gamma"]);
    }

    #[test]
    fn test_equal_scores_keep_rule_order() {
        let scores = score("d1 g1", &rules());
        let ranked = selector(&[]).rank(&scores);
        assert_eq!(ranked, vec!["gamma", "delta"]);
    }

    #[test]
    fn test_select_splits_primary_and_background() {
        let scores = score("a1 b1 g1", &rules());
        match selector(&["beta"]).select(&scores) {
            AgentSelectionDecision::RouteToAgent {
                primary,
                background,
                reason,
            } => {
                assert_eq!(primary, "beta");
                assert_eq!(background, vec!["alpha", "gamma"]);
                assert!(reason.contains("highest-priority"));
            }
            other => panic!("Expected RouteToAgent decision, got {other:?}"),
        }
    }

    #[test]
    fn test_select_by_score_reason() {
        let scores = score("d1", &rules());
        match selector(&[]).select(&scores) {
            AgentSelectionDecision::RouteToAgent { primary, reason, .. } => {
                assert_eq!(primary, "delta");
                assert!(reason.contains("highest score (2)"));
            }
            other => panic!("Expected RouteToAgent decision, got {other:?}"),
        }
    }

    #[test]
    fn test_no_route_on_empty_scores() {
        let decision = selector(&["alpha"]).select(&ScoreMap::default());
        assert!(matches!(decision, AgentSelectionDecision::NoRoute { .. }));
    }
}
