//! Model-based refinement of the heuristic intent (spec §4.6).
//!
//! Optional and best-effort: the caller in [`super::IntentAnalyzer`] already
//! wraps this in a timeout and silently falls back to the heuristic result
//! on any error, so failure modes here stay simple.

use crate::provider::{CancelToken, CompletionOptions, Message, Provider, ProviderError};

use super::heuristics::{Complexity, Entities, IntentType, RiskLevel, UserIntent};
use super::AnalysisContext;

#[derive(Debug, thiserror::Error)]
pub enum RefineError {
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("model returned unparseable refinement: {0}")]
    Unparseable(String),
}

/// Asks `provider` to refine `heuristic` against `text`/`context`, returning
/// a [`UserIntent`] built from the model's JSON response. The model is
/// instructed to return compact JSON matching the same shape produced by
/// [`super::heuristics::analyze`]; any field it omits falls back to the
/// heuristic's value rather than a hardcoded default.
pub async fn refine(
    provider: &dyn Provider,
    options: &CompletionOptions,
    text: &str,
    context: &AnalysisContext,
    heuristic: &UserIntent,
    cancel: &CancelToken,
) -> Result<UserIntent, RefineError> {
    if cancel.is_cancelled() {
        return Err(RefineError::Cancelled);
    }

    let prompt = build_prompt(text, context, heuristic);
    let messages = vec![
        Message::system(
            "You refine a lightweight intent classification into a more accurate one. \
             Respond with a single compact JSON object and nothing else.",
        ),
        Message::user(prompt),
    ];

    let mut refine_options = options.clone();
    refine_options.tools = None;
    refine_options.stream = false;

    let response = provider.complete(&messages, &refine_options).await?;

    if cancel.is_cancelled() {
        return Err(RefineError::Cancelled);
    }

    parse_response(&response.content, heuristic)
}

fn build_prompt(text: &str, context: &AnalysisContext, heuristic: &UserIntent) -> String {
    format!(
        "User message: {text:?}\n\
         Recent files: {:?}\n\
         Project languages: {:?}\n\
         Heuristic guess: type={:?} action={:?} complexity={:?} risk={:?}\n\
         Return JSON: {{\"intent_type\": one of \"question\"|\"task_request\"|\"command\"|\"clarification_response\", \
         \"action\": string, \"complexity\": one of \"simple\"|\"moderate\"|\"complex\", \
         \"risk_level\": one of \"low\"|\"medium\"|\"high\", \"multi_step\": bool, \
         \"confidence\": number between 0 and 1, \"requires_clarification\": bool, \
         \"suggested_clarifications\": array of string}}",
        context.recent_files, context.project_languages, heuristic.intent_type, heuristic.action, heuristic.complexity, heuristic.risk_level,
    )
}

fn parse_response(content: &str, heuristic: &UserIntent) -> Result<UserIntent, RefineError> {
    let json_str = extract_json_object(content).ok_or_else(|| RefineError::Unparseable(content.to_string()))?;
    let value: serde_json::Value =
        serde_json::from_str(json_str).map_err(|e| RefineError::Unparseable(e.to_string()))?;

    let intent_type = value
        .get("intent_type")
        .and_then(|v| v.as_str())
        .and_then(parse_intent_type)
        .unwrap_or(heuristic.intent_type);

    let action = value
        .get("action")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| heuristic.action.clone());

    let complexity = value
        .get("complexity")
        .and_then(|v| v.as_str())
        .and_then(parse_complexity)
        .unwrap_or(heuristic.complexity);

    let risk_level = value
        .get("risk_level")
        .and_then(|v| v.as_str())
        .and_then(parse_risk)
        .unwrap_or(heuristic.risk_level);

    let multi_step = value.get("multi_step").and_then(|v| v.as_bool()).unwrap_or(heuristic.multi_step);

    let confidence = value
        .get("confidence")
        .and_then(|v| v.as_f64())
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(heuristic.confidence);

    let requires_clarification = value
        .get("requires_clarification")
        .and_then(|v| v.as_bool())
        .unwrap_or(heuristic.requires_clarification);

    let suggested_clarifications = value
        .get("suggested_clarifications")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_else(|| heuristic.suggested_clarifications.clone());

    Ok(UserIntent {
        intent_type,
        action,
        entities: clone_entities(&heuristic.entities),
        complexity,
        multi_step,
        risk_level,
        estimated_duration_seconds: heuristic.estimated_duration_seconds,
        confidence,
        requires_clarification,
        suggested_clarifications,
    })
}

fn clone_entities(entities: &Entities) -> Entities {
    Entities {
        files: entities.files.clone(),
        technologies: entities.technologies.clone(),
        functions: entities.functions.clone(),
        classes: entities.classes.clone(),
        concepts: entities.concepts.clone(),
    }
}

fn parse_intent_type(s: &str) -> Option<IntentType> {
    match s {
        "question" => Some(IntentType::Question),
        "task_request" => Some(IntentType::TaskRequest),
        "command" => Some(IntentType::Command),
        "clarification" => Some(IntentType::Clarification),
        "clarification_response" => Some(IntentType::ClarificationResponse),
        _ => None,
    }
}

fn parse_complexity(s: &str) -> Option<Complexity> {
    match s {
        "simple" => Some(Complexity::Simple),
        "moderate" => Some(Complexity::Moderate),
        "complex" => Some(Complexity::Complex),
        _ => None,
    }
}

fn parse_risk(s: &str) -> Option<RiskLevel> {
    match s {
        "low" => Some(RiskLevel::Low),
        "medium" => Some(RiskLevel::Medium),
        "high" => Some(RiskLevel::High),
        _ => None,
    }
}

/// Extracts the first balanced `{...}` span, tolerating chatty models that
/// wrap their JSON in prose or a markdown fence.
fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let mut depth = 0i32;
    for (i, c) in content[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&content[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::heuristics;

    fn sample_heuristic() -> UserIntent {
        heuristics::analyze("edit main.rs", &AnalysisContext::default())
    }

    #[test]
    fn extracts_a_bare_json_object() {
        let content = "here you go: {\"action\": \"edit\"} thanks";
        assert_eq!(extract_json_object(content), Some("{\"action\": \"edit\"}"));
    }

    #[test]
    fn parse_response_overrides_only_present_fields() {
        let heuristic = sample_heuristic();
        let content = r#"{"confidence": 0.95, "risk_level": "high"}"#;
        let refined = parse_response(content, &heuristic).unwrap();
        assert_eq!(refined.confidence, 0.95);
        assert_eq!(refined.risk_level, RiskLevel::High);
        assert_eq!(refined.action, heuristic.action);
    }

    #[test]
    fn unparseable_content_is_an_error() {
        let heuristic = sample_heuristic();
        assert!(parse_response("no json here", &heuristic).is_err());
    }
}
