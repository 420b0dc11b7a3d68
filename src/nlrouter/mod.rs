//! Natural-language router (spec C8).
//!
//! Composes the fast-path router (C7), the intent analyzer (C6), and the
//! file-operation classifier (C9) into one [`RoutingDecision`]. Each variant
//! of [`RoutingKind`] carries its own typed payload — no dynamic "any" the
//! way an untyped decision payload would.

pub mod clarification;

use crate::fastpath::FastPathRouter;
use crate::fileops::{self, FileOperationIntent, Safety};
use crate::intent::{AnalysisContext, Complexity, IntentAnalyzer, RiskLevel as IntentRisk, UserIntent};
use crate::provider::{CompletionOptions, Provider};

pub use clarification::ClarificationRequest;

const FAST_PATH_CONFIRM_THRESHOLD: f64 = 0.8;
const TASK_PLAN_CONFIDENCE_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Risk {
    Low,
    Medium,
    High,
}

impl From<IntentRisk> for Risk {
    fn from(r: IntentRisk) -> Self {
        match r {
            IntentRisk::Low => Risk::Low,
            IntentRisk::Medium => Risk::Medium,
            IntentRisk::High => Risk::High,
        }
    }
}

#[derive(Debug, Clone)]
pub enum RoutingKind {
    Command { action: String, args: Vec<String>, confidence: f64, method: &'static str },
    TaskPlan { action: String, summary: String },
    Conversation { prompt: String },
    Clarification(ClarificationRequest),
    FileOperation(FileOperationIntent),
}

#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub kind: RoutingKind,
    pub requires_confirmation: bool,
    pub estimated_seconds: u32,
    pub risk: Risk,
}

/// Minimal external-collaborator contract: whether a task planner is wired
/// up and ready to take a complex multi-step request. The planner itself is
/// out of scope (spec §1) — the router only needs to know if one exists.
pub trait TaskPlanner: Send + Sync {
    fn is_available(&self) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct RouteContext {
    pub analysis: AnalysisContext,
    pub project_files: Vec<String>,
    pub recent_files: Vec<String>,
    pub require_confirmation_always: bool,
}

pub struct NaturalLanguageRouter {
    fast_path: FastPathRouter,
    intent_analyzer: IntentAnalyzer,
}

impl NaturalLanguageRouter {
    pub fn new(fast_path: FastPathRouter) -> Self {
        Self { fast_path, intent_analyzer: IntentAnalyzer::new() }
    }

    /// Routes one line of user input per spec §4.8's six-step composition.
    pub async fn route(
        &mut self,
        input: &str,
        context: &RouteContext,
        refiner: Option<(&dyn Provider, &CompletionOptions)>,
        task_planner: Option<&dyn TaskPlanner>,
    ) -> RoutingDecision {
        if let Some(m) = self.fast_path.resolve(input) {
            if m.confidence > FAST_PATH_CONFIRM_THRESHOLD {
                return RoutingDecision {
                    kind: RoutingKind::Command { action: m.command, args: Vec::new(), confidence: m.confidence, method: m.strategy },
                    requires_confirmation: false,
                    estimated_seconds: 2,
                    risk: Risk::Low,
                };
            }
        }

        let intent = self.intent_analyzer.analyze(input, &context.analysis, refiner).await;

        if intent.requires_clarification {
            let request = ClarificationRequest {
                questions: intent.suggested_clarifications.clone(),
                options: None,
                context: input.to_string(),
                required: true,
            };
            return RoutingDecision {
                kind: RoutingKind::Clarification(request),
                requires_confirmation: false,
                estimated_seconds: intent.estimated_duration_seconds,
                risk: intent.risk_level.into(),
            };
        }

        let file_sizes = |_: &str| -> Option<u64> { None };
        if let Some(file_op) = fileops::classify(&intent, &context.project_files, &context.recent_files, &file_sizes) {
            let requires_confirmation = self.requires_confirmation(&intent, Some(&file_op), context);
            return RoutingDecision {
                kind: RoutingKind::FileOperation(file_op),
                requires_confirmation,
                estimated_seconds: intent.estimated_duration_seconds,
                risk: intent.risk_level.into(),
            };
        }

        let is_complex_task = intent.multi_step && intent.complexity == Complexity::Complex;
        if is_complex_task && task_planner.map(|p| p.is_available()).unwrap_or(false) && intent.confidence > TASK_PLAN_CONFIDENCE_THRESHOLD {
            let requires_confirmation = self.requires_confirmation(&intent, None, context);
            return RoutingDecision {
                kind: RoutingKind::TaskPlan { action: intent.action.clone(), summary: input.to_string() },
                requires_confirmation,
                estimated_seconds: intent.estimated_duration_seconds,
                risk: intent.risk_level.into(),
            };
        }

        let requires_confirmation = self.requires_confirmation(&intent, None, context);
        RoutingDecision {
            kind: RoutingKind::Conversation { prompt: input.to_string() },
            requires_confirmation,
            estimated_seconds: intent.estimated_duration_seconds,
            risk: intent.risk_level.into(),
        }
    }

    /// Re-routes after the user answers a pending clarification, merging
    /// their answer into the original text (or a structured merge when the
    /// clarification offered discrete options).
    pub async fn handle_clarification(
        &mut self,
        original: &ClarificationRequest,
        answer: &str,
        context: &RouteContext,
        refiner: Option<(&dyn Provider, &CompletionOptions)>,
        task_planner: Option<&dyn TaskPlanner>,
    ) -> RoutingDecision {
        let merged = match &original.options {
            Some(options) if options.iter().any(|o| o.eq_ignore_ascii_case(answer.trim())) => {
                format!("{} {}", original.context, answer.trim())
            }
            _ => format!("{} {}", original.context, answer),
        };
        self.route(&merged, context, refiner, task_planner).await
    }

    /// Confirmation policy (spec §4.8): any of risk=high, multi-step and
    /// complex, a destructive verb, a risky/dangerous file operation, or a
    /// standing user preference.
    fn requires_confirmation(&self, intent: &UserIntent, file_op: Option<&FileOperationIntent>, context: &RouteContext) -> bool {
        if context.require_confirmation_always {
            return true;
        }
        if intent.risk_level == IntentRisk::High {
            return true;
        }
        if intent.multi_step && intent.complexity == Complexity::Complex {
            return true;
        }
        if intent.action == "delete" {
            return true;
        }
        if let Some(op) = file_op {
            if matches!(op.safety, Safety::Risky | Safety::Dangerous) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> NaturalLanguageRouter {
        NaturalLanguageRouter::new(FastPathRouter::new().with_command("git-status").with_alias("gs", "git-status"))
    }

    #[tokio::test]
    async fn high_confidence_fast_path_skips_intent_analysis() {
        let mut router = router();
        let decision = router.route("git-status", &RouteContext::default(), None, None).await;
        assert!(matches!(decision.kind, RoutingKind::Command { .. }));
        assert!(!decision.requires_confirmation);
    }

    #[tokio::test]
    async fn ambiguous_file_op_falls_back_to_conversation_without_project_files() {
        let mut router = NaturalLanguageRouter::new(FastPathRouter::new());
        let decision = router.route("what does main.rs do?", &RouteContext::default(), None, None).await;
        assert!(matches!(decision.kind, RoutingKind::Conversation { .. }));
    }

    #[tokio::test]
    async fn delete_request_requires_confirmation() {
        let mut router = NaturalLanguageRouter::new(FastPathRouter::new());
        let context = RouteContext { project_files: vec!["config.toml".to_string()], ..Default::default() };
        let decision = router.route("delete config.toml", &context, None, None).await;
        assert!(decision.requires_confirmation);
        assert!(matches!(decision.kind, RoutingKind::FileOperation(_)));
    }

    #[tokio::test]
    async fn vague_task_request_without_a_target_asks_for_clarification() {
        let mut router = NaturalLanguageRouter::new(FastPathRouter::new());
        let decision = router.route("refactor it please", &RouteContext::default(), None, None).await;
        if let RoutingKind::Clarification(request) = decision.kind {
            assert!(!request.questions.is_empty());
        }
    }

    #[tokio::test]
    async fn handle_clarification_reroutes_with_the_merged_input() {
        let mut router = NaturalLanguageRouter::new(FastPathRouter::new());
        let context = RouteContext { project_files: vec!["main.rs".to_string()], ..Default::default() };
        let original = ClarificationRequest { questions: vec!["which file?".to_string()], options: None, context: "refactor it".to_string(), required: true };
        let decision = router.handle_clarification(&original, "main.rs", &context, None, None).await;
        assert!(!matches!(decision.kind, RoutingKind::Clarification(_)));
    }
}
