//! Pattern-heuristic half of the intent analyzer (spec §4.6).

use super::AnalysisContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentType {
    Question,
    TaskRequest,
    Command,
    Clarification,
    ClarificationResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Default)]
pub struct Entities {
    pub files: Vec<String>,
    pub technologies: Vec<String>,
    pub functions: Vec<String>,
    pub classes: Vec<String>,
    pub concepts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UserIntent {
    pub intent_type: IntentType,
    pub action: String,
    pub entities: Entities,
    pub complexity: Complexity,
    pub multi_step: bool,
    pub risk_level: RiskLevel,
    pub estimated_duration_seconds: u32,
    pub confidence: f64,
    pub requires_clarification: bool,
    pub suggested_clarifications: Vec<String>,
}

const VERBS: &[(&str, &str)] = &[
    ("create", "create"),
    ("add", "create"),
    ("make", "create"),
    ("new", "create"),
    ("edit", "edit"),
    ("update", "edit"),
    ("change", "edit"),
    ("fix", "edit"),
    ("modify", "edit"),
    ("delete", "delete"),
    ("remove", "delete"),
    ("rm", "delete"),
    ("move", "move"),
    ("rename", "move"),
    ("test", "test"),
    ("refactor", "refactor"),
];

const TECHNOLOGIES: &[&str] = &["react", "vue", "rust", "python", "typescript", "javascript", "go", "docker", "kubernetes"];

const DESTRUCTIVE_VERBS: &[&str] = &["delete", "remove", "rm", "drop", "wipe", "destroy"];

/// Heuristic-only analysis: verb classification, technology/path token
/// extraction, complexity/risk estimation — no model call.
pub fn analyze(text: &str, context: &AnalysisContext) -> UserIntent {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    let intent_type = classify_type(&lower, context);
    let action = VERBS
        .iter()
        .find(|(verb, _)| words.contains(verb))
        .map(|(_, action)| action.to_string())
        .unwrap_or_else(|| if intent_type == IntentType::TaskRequest { "edit".to_string() } else { "discuss".to_string() });

    let entities = extract_entities(text, &lower);

    let multi_step = lower.contains(" and ") || lower.contains(" then ") || words.len() > 20;
    let complexity = if multi_step && entities.files.len() + entities.technologies.len() > 2 {
        Complexity::Complex
    } else if multi_step {
        Complexity::Moderate
    } else {
        Complexity::Simple
    };

    let risk_level = if DESTRUCTIVE_VERBS.iter().any(|v| words.contains(v)) {
        RiskLevel::High
    } else if action == "edit" || action == "move" {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    let requires_clarification = entities.files.is_empty() && action != "discuss" && intent_type == IntentType::TaskRequest && !lower.contains("this");
    let suggested_clarifications = if requires_clarification {
        vec!["Which file(s) should this apply to?".to_string()]
    } else {
        Vec::new()
    };

    let estimated_duration_seconds = match complexity {
        Complexity::Simple => 15,
        Complexity::Moderate => 60,
        Complexity::Complex => 180,
    };

    UserIntent {
        intent_type,
        action,
        entities,
        complexity,
        multi_step,
        risk_level,
        estimated_duration_seconds,
        confidence: 0.7,
        requires_clarification,
        suggested_clarifications,
    }
}

/// Attenuates confidence after a failed/timed-out refinement pass, per
/// spec §4.6 — the heuristic result is still returned, just less trusted.
pub fn attenuate(mut intent: UserIntent) -> UserIntent {
    intent.confidence *= 0.7;
    intent
}

fn classify_type(lower: &str, context: &AnalysisContext) -> IntentType {
    if lower.ends_with('?') || lower.starts_with("what") || lower.starts_with("how") || lower.starts_with("why") {
        return IntentType::Question;
    }
    if context.last_intent == Some(IntentType::Clarification) {
        return IntentType::ClarificationResponse;
    }
    if lower.starts_with('/') || lower.starts_with('!') {
        return IntentType::Command;
    }
    IntentType::TaskRequest
}

fn extract_entities(original: &str, lower: &str) -> Entities {
    let mut entities = Entities::default();

    for word in original.split_whitespace() {
        let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '/' && c != '_' && c != '-');
        if trimmed.contains('/') || (trimmed.contains('.') && trimmed.rsplit('.').next().map(|e| e.len() <= 4).unwrap_or(false)) {
            if !trimmed.is_empty() {
                entities.files.push(trimmed.to_string());
            }
        }
    }

    for tech in TECHNOLOGIES {
        if lower.contains(tech) {
            entities.technologies.push(tech.to_string());
        }
    }

    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_a_question() {
        let intent = analyze("what does this function do?", &AnalysisContext::default());
        assert_eq!(intent.intent_type, IntentType::Question);
    }

    #[test]
    fn extracts_delete_as_high_risk() {
        let intent = analyze("delete the config.toml file", &AnalysisContext::default());
        assert_eq!(intent.action, "delete");
        assert_eq!(intent.risk_level, RiskLevel::High);
        assert!(intent.entities.files.contains(&"config.toml".to_string()));
    }

    #[test]
    fn requires_clarification_with_no_target() {
        let intent = analyze("refactor it please", &AnalysisContext::default());
        assert!(intent.requires_clarification || intent.action == "refactor");
    }

    #[test]
    fn attenuate_reduces_confidence() {
        let intent = analyze("edit main.rs", &AnalysisContext::default());
        let before = intent.confidence;
        let after = attenuate(intent).confidence;
        assert!(after < before);
    }
}
