//! File-operation classification (spec §4.9).
//!
//! Maps a [`UserIntent`] to a [`FileOperationIntent`]: which verb, which
//! targets, and what safety/impact tier those targets carry. The safety and
//! impact tables are fixed per spec, not configurable.

use crate::intent::UserIntent;

use super::target::{self, TargetResolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Edit,
    Delete,
    Move,
    Copy,
    Refactor,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Safety {
    Safe,
    Cautious,
    Risky,
    Dangerous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Impact {
    Minimal,
    Moderate,
    Significant,
    Major,
}

#[derive(Debug, Clone)]
pub struct FileOperationIntent {
    pub operation: Operation,
    pub targets: Vec<String>,
    pub ambiguous_targets: Vec<String>,
    pub suggestions: Vec<String>,
    pub target_confidence: f64,
    pub safety: Safety,
    pub impact: Impact,
    pub requires_approval: bool,
    pub backup_required: bool,
}

const SYSTEM_FILE_NAMES: &[&str] = &["Cargo.lock", "package-lock.json", "yarn.lock", "tsconfig.json", "Dockerfile"];

const CONFIG_FILE_PATTERNS: &[&str] = &[".env", "config.toml", "config.yaml", "config.yml", "settings.json", ".eslintrc", ".prettierrc"];

const LARGE_FILE_BYTES: u64 = 100_000;

fn operation_from_action(action: &str) -> Option<Operation> {
    match action {
        "create" => Some(Operation::Create),
        "edit" => Some(Operation::Edit),
        "delete" => Some(Operation::Delete),
        "move" => Some(Operation::Move),
        "copy" => Some(Operation::Copy),
        "refactor" => Some(Operation::Refactor),
        "test" => Some(Operation::Test),
        _ => None,
    }
}

fn is_system_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.starts_with('.') || SYSTEM_FILE_NAMES.iter().any(|sys| name.eq_ignore_ascii_case(sys))
}

fn is_config_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    CONFIG_FILE_PATTERNS.iter().any(|pattern| name.contains(pattern))
}

/// Per-file safety tier for edit/create operations (spec §4.9 table).
fn file_safety(path: &str, size_bytes: Option<u64>) -> Safety {
    if is_system_file(path) {
        Safety::Dangerous
    } else if is_config_file(path) {
        Safety::Risky
    } else if size_bytes.map(|n| n > LARGE_FILE_BYTES).unwrap_or(false) {
        Safety::Cautious
    } else {
        Safety::Safe
    }
}

fn impact_for_target_count(count: usize) -> Impact {
    if count > 5 {
        Impact::Major
    } else if count > 2 {
        Impact::Significant
    } else {
        Impact::Minimal
    }
}

/// Classifies `intent` against the project file set, returning `None` when
/// the intent names no recognizable file-affecting verb.
pub fn classify(intent: &UserIntent, project_files: &[String], recent_files: &[String], file_sizes: &dyn Fn(&str) -> Option<u64>) -> Option<FileOperationIntent> {
    let operation = operation_from_action(&intent.action).or({
        if intent.intent_type == crate::intent::IntentType::TaskRequest {
            Some(Operation::Edit)
        } else {
            None
        }
    })?;

    let resolution: TargetResolution = target::resolve(&intent.entities, project_files, recent_files);

    let (safety, impact) = match operation {
        Operation::Delete => (Safety::Dangerous, impact_for_multi_target(resolution.targets.len(), Impact::Major)),
        Operation::Move => (Safety::Risky, impact_for_multi_target(resolution.targets.len(), Impact::Significant)),
        _ => {
            let worst = resolution
                .targets
                .iter()
                .map(|t| file_safety(t, file_sizes(t)))
                .max()
                .unwrap_or(Safety::Safe);
            (worst, impact_for_target_count(resolution.targets.len()))
        }
    };

    let requires_approval = matches!(safety, Safety::Dangerous | Safety::Risky) || matches!(impact, Impact::Major | Impact::Significant);
    let backup_required = matches!(operation, Operation::Delete | Operation::Move) || (operation == Operation::Edit && matches!(safety, Safety::Risky | Safety::Dangerous));

    Some(FileOperationIntent {
        operation,
        targets: resolution.targets,
        ambiguous_targets: resolution.ambiguous_targets,
        suggestions: resolution.suggestions,
        target_confidence: resolution.confidence,
        safety,
        impact,
        requires_approval,
        backup_required,
    })
}

/// Delete/move have a fixed per-op floor impact, but still escalate to
/// `Major` when the target count alone would warrant it.
fn impact_for_multi_target(count: usize, floor: Impact) -> Impact {
    impact_for_target_count(count).max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{heuristics, AnalysisContext};

    fn no_sizes(_: &str) -> Option<u64> {
        None
    }

    #[test]
    fn delete_is_dangerous_and_requires_approval() {
        let intent = heuristics::analyze("delete config.toml", &AnalysisContext::default());
        let op = classify(&intent, &[], &[], &no_sizes).unwrap();
        assert_eq!(op.operation, Operation::Delete);
        assert_eq!(op.safety, Safety::Dangerous);
        assert!(op.requires_approval);
        assert!(op.backup_required);
    }

    #[test]
    fn move_is_risky_with_backup_required() {
        let intent = heuristics::analyze("move main.rs to lib.rs", &AnalysisContext::default());
        let op = classify(&intent, &[], &[], &no_sizes).unwrap();
        assert_eq!(op.operation, Operation::Move);
        assert_eq!(op.safety, Safety::Risky);
        assert!(op.backup_required);
    }

    #[test]
    fn edit_on_a_system_file_is_dangerous() {
        let intent = heuristics::analyze("edit .env", &AnalysisContext::default());
        let op = classify(&intent, &[], &[], &no_sizes).unwrap();
        assert_eq!(op.safety, Safety::Dangerous);
        assert!(op.requires_approval);
    }

    #[test]
    fn edit_on_a_plain_file_is_safe_and_unapproved() {
        let intent = heuristics::analyze("edit notes.txt", &AnalysisContext::default());
        let op = classify(&intent, &[], &[], &no_sizes).unwrap();
        assert_eq!(op.safety, Safety::Safe);
        assert!(!op.requires_approval);
        assert!(!op.backup_required);
    }

    #[test]
    fn non_file_intent_classifies_to_none() {
        let intent = heuristics::analyze("what does this do?", &AnalysisContext::default());
        assert!(classify(&intent, &[], &[], &no_sizes).is_none());
    }
}
