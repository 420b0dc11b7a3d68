//! Intent analyzer (spec C6).
//!
//! Composes cheap pattern heuristics with an optional, timeout-bounded
//! model-refinement call. The two paths are explicit branches merged
//! through [`UserIntent`] — there's no dynamic dispatch across them, by
//! design, since the target runtime has no duck typing to lean on.

pub mod heuristics;
pub mod refine;

use std::time::Duration;

use crate::provider::{CancelToken, CompletionOptions, Provider};

pub use heuristics::{Complexity, Entities, IntentType, RiskLevel, UserIntent};

#[derive(Debug, Clone)]
pub struct AnalysisContext {
    pub recent_history: Vec<String>,
    pub project_root: Option<String>,
    pub project_languages: Vec<String>,
    pub project_file_count: usize,
    pub recent_files: Vec<String>,
    pub last_intent: Option<IntentType>,
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self {
            recent_history: Vec::new(),
            project_root: None,
            project_languages: Vec::new(),
            project_file_count: 0,
            recent_files: Vec::new(),
            last_intent: None,
        }
    }
}

pub struct IntentAnalyzer {
    refinement_timeout: Duration,
}

impl IntentAnalyzer {
    pub fn new() -> Self {
        Self { refinement_timeout: Duration::from_millis(800) }
    }

    pub fn with_refinement_timeout(mut self, timeout: Duration) -> Self {
        self.refinement_timeout = timeout;
        self
    }

    /// Analyzes `text` against `context`, optionally refining the heuristic
    /// result with a bounded model call. A failed or timed-out refinement
    /// silently falls back to the heuristic result with attenuated
    /// confidence — refinement is an enhancement, never a hard dependency.
    pub async fn analyze(
        &self,
        text: &str,
        context: &AnalysisContext,
        refiner: Option<(&dyn Provider, &CompletionOptions)>,
    ) -> UserIntent {
        let heuristic = heuristics::analyze(text, context);

        let Some((provider, options)) = refiner else {
            return heuristic;
        };

        let cancel = CancelToken::new();
        match tokio::time::timeout(
            self.refinement_timeout,
            refine::refine(provider, options, text, context, &heuristic, &cancel),
        )
        .await
        {
            Ok(Ok(refined)) => refined,
            Ok(Err(e)) => {
                log::debug!("intent refinement failed, using heuristic result: {e}");
                heuristics::attenuate(heuristic)
            }
            Err(_) => {
                log::debug!("intent refinement timed out after {:?}, using heuristic result", self.refinement_timeout);
                heuristics::attenuate(heuristic)
            }
        }
    }
}

impl Default for IntentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn analyze_without_a_refiner_returns_the_heuristic_result() {
        let analyzer = IntentAnalyzer::new();
        let intent = analyzer.analyze("delete the config file", &AnalysisContext::default(), None).await;
        assert_eq!(intent.action, "delete");
    }
}
