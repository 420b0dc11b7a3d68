//! Fast-path command router (spec C7).
//!
//! Resolves obvious commands without a model call. Four strategies —
//! exact, alias, pattern, fuzzy — are tried in declared order under a hard
//! 50ms wall-clock budget; the first whose confidence clears the 0.6
//! threshold wins.

pub mod cache;
pub mod fuzzy;

use std::collections::HashMap;
use std::time::{Duration, Instant};

pub use cache::FastPathCache;

const WIN_THRESHOLD: f64 = 0.6;
const BUDGET: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq)]
pub struct FastPathMatch {
    pub command: String,
    pub confidence: f64,
    pub strategy: &'static str,
}

pub struct FastPathRouter {
    commands: Vec<String>,
    aliases: HashMap<String, String>,
    patterns: Vec<(String, String)>,
    cache: FastPathCache,
}

impl FastPathRouter {
    pub fn new() -> Self {
        Self { commands: Vec::new(), aliases: HashMap::new(), patterns: Vec::new(), cache: FastPathCache::new(64) }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>, command: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), command.into());
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>, command: impl Into<String>) -> Self {
        self.patterns.push((pattern.into(), command.into()));
        self
    }

    fn normalize(input: &str) -> String {
        input.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
    }

    pub fn resolve(&mut self, input: &str) -> Option<FastPathMatch> {
        let normalized = Self::normalize(input);

        if let Some(cached) = self.cache.get(&normalized) {
            return cached;
        }

        let started = Instant::now();
        let result = self.resolve_uncached(&normalized, started);
        self.cache.put(normalized, result.clone());
        result
    }

    fn resolve_uncached(&self, normalized: &str, started: Instant) -> Option<FastPathMatch> {
        if let Some(m) = self.try_exact(normalized) {
            if m.confidence >= WIN_THRESHOLD {
                return Some(m);
            }
        }
        if started.elapsed() > BUDGET {
            return None;
        }

        if let Some(m) = self.try_alias(normalized) {
            if m.confidence >= WIN_THRESHOLD {
                return Some(m);
            }
        }
        if started.elapsed() > BUDGET {
            return None;
        }

        if let Some(m) = self.try_pattern(normalized) {
            if m.confidence >= WIN_THRESHOLD {
                return Some(m);
            }
        }
        if started.elapsed() > BUDGET {
            return None;
        }

        self.try_fuzzy(normalized).filter(|m| m.confidence >= WIN_THRESHOLD)
    }

    fn try_exact(&self, normalized: &str) -> Option<FastPathMatch> {
        self.commands
            .iter()
            .find(|c| c.to_lowercase() == normalized)
            .map(|c| FastPathMatch { command: c.clone(), confidence: 1.0, strategy: "exact" })
    }

    fn try_alias(&self, normalized: &str) -> Option<FastPathMatch> {
        self.aliases
            .get(normalized)
            .map(|c| FastPathMatch { command: c.clone(), confidence: 0.95, strategy: "alias" })
    }

    fn try_pattern(&self, normalized: &str) -> Option<FastPathMatch> {
        self.patterns
            .iter()
            .map(|(pattern, command)| (command, pattern_score(normalized, pattern)))
            .filter(|(_, score)| *score > 0.0)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .map(|(command, score)| FastPathMatch { command: command.clone(), confidence: score, strategy: "pattern" })
    }

    fn try_fuzzy(&self, normalized: &str) -> Option<FastPathMatch> {
        self.commands
            .iter()
            .map(|c| (c, fuzzy::similarity(normalized, &c.to_lowercase())))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .filter(|(_, score)| *score >= fuzzy::THRESHOLD)
            .map(|(command, score)| FastPathMatch { command: command.clone(), confidence: score, strategy: "fuzzy" })
    }
}

impl Default for FastPathRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Pattern-match scoring per spec §4.7.
fn pattern_score(input: &str, pattern: &str) -> f64 {
    let pattern = pattern.to_lowercase();
    if input == pattern {
        return 1.0;
    }
    if input.contains(&pattern) {
        return 0.9;
    }
    if pattern.contains(input) {
        return 0.8;
    }

    let input_words: std::collections::HashSet<&str> = input.split_whitespace().collect();
    let pattern_words: std::collections::HashSet<&str> = pattern.split_whitespace().collect();
    if input_words.is_empty() || pattern_words.is_empty() {
        return 0.0;
    }
    let overlap = input_words.intersection(&pattern_words).count() as f64;
    let ratio = overlap / input_words.len().max(pattern_words.len()) as f64;
    if ratio > 0.3 {
        ratio.max(0.7)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_wins_with_full_confidence() {
        let mut router = FastPathRouter::new().with_command("help");
        let m = router.resolve("help").unwrap();
        assert_eq!(m.strategy, "exact");
        assert_eq!(m.confidence, 1.0);
    }

    #[test]
    fn alias_resolves_to_its_target_command() {
        let mut router = FastPathRouter::new().with_alias("h", "help");
        let m = router.resolve("h").unwrap();
        assert_eq!(m.command, "help");
        assert_eq!(m.strategy, "alias");
    }

    #[test]
    fn pattern_substring_scores_point_nine() {
        let mut router = FastPathRouter::new().with_pattern("list files", "ls");
        let m = router.resolve("please list files now").unwrap();
        assert_eq!(m.command, "ls");
    }

    #[test]
    fn unrecognized_input_falls_through_to_none() {
        let mut router = FastPathRouter::new().with_command("help");
        assert!(router.resolve("something entirely unrelated and long").is_none());
    }

    #[test]
    fn cache_returns_the_same_decision_on_repeat_input() {
        let mut router = FastPathRouter::new().with_command("help");
        let first = router.resolve("help");
        let second = router.resolve("help");
        assert_eq!(first, second);
    }
}
