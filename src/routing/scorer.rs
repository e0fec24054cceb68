//! Intent Scorer
//!
//! Literal phrase matching: the input is lowercased and each trigger phrase
//! contributes `chars(phrase) * occurrences(phrase)` to its agent's score.
//! Matching is plain substring containment, so a trigger embedded inside a
//! longer word still counts ("hi" matches "thinking"). Occurrences are counted
//! without overlap.

use super::rules::KeywordRuleSet;
use serde::Serialize;
use tracing::debug;

/// Score for one matched agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentScore {
    pub agent: String,
    pub score: u64,
}

/// Positive scores keyed by agent, in rule-set order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScoreMap {
    entries: Vec<AgentScore>,
}

impl ScoreMap {
    pub fn get(&self, agent: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| e.agent == agent)
            .map(|e| e.score)
    }

    pub fn contains(&self, agent: &str) -> bool {
        self.get(agent).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentScore> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, agent: &str, score: u64) {
        self.entries.push(AgentScore {
            agent: agent.to_string(),
            score,
        });
    }
}

/// Score `input` against every rule. Never fails; empty input scores nothing.
pub fn score(input: &str, rules: &KeywordRuleSet) -> ScoreMap {
    let lowercase_input = input.to_lowercase();
    let conversational = rules.exclusions().matches(&lowercase_input);

    let mut scores = ScoreMap::default();
    for rule in rules.rules() {
        if conversational && rule.is_suppressible() {
            continue;
        }

        let total: u64 = rule
            .triggers()
            .iter()
            .map(|phrase| phrase_score(phrase, &lowercase_input))
            .sum();

        if total > 0 {
            scores.push(rule.identifier(), total);
        }
    }

    debug!(
        scores = ?scores.entries,
        conversational,
        "Scored input"
    );

    scores
}

fn phrase_score(phrase: &str, lowercase_input: &str) -> u64 {
    if phrase.is_empty() {
        return 0;
    }
    let occurrences = lowercase_input.matches(phrase).count() as u64;
    occurrences * phrase.chars().count() as u64
}
