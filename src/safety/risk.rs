//! Risk assessment (spec §4.10).
//!
//! Combines the file-operation safety tier from C9 with a fixed table of
//! weighted risk factors, producing an aggregated risk level plus the
//! reasoning and mitigation suggestions shown to an approver.

use crate::fileops::{FileOperationIntent, Operation, Safety};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiskFactor {
    SystemFile,
    Deletion,
    ConfigFile,
    SecurityFile,
    DbSchema,
    LargeFile,
    BulkOp,
    CrossModule,
    ExternalDep,
}

impl RiskFactor {
    /// Fixed weight table (spec §4.10).
    pub fn weight(self) -> f64 {
        match self {
            RiskFactor::SystemFile => 0.9,
            RiskFactor::Deletion => 0.8,
            RiskFactor::ConfigFile => 0.7,
            RiskFactor::SecurityFile => 0.9,
            RiskFactor::DbSchema => 0.8,
            RiskFactor::LargeFile => 0.6,
            RiskFactor::BulkOp => 0.5,
            RiskFactor::CrossModule => 0.4,
            RiskFactor::ExternalDep => 0.6,
        }
    }

    fn label(self) -> &'static str {
        match self {
            RiskFactor::SystemFile => "touches a system file",
            RiskFactor::Deletion => "deletes content",
            RiskFactor::ConfigFile => "touches a config file",
            RiskFactor::SecurityFile => "touches a security-sensitive file",
            RiskFactor::DbSchema => "touches a database schema",
            RiskFactor::LargeFile => "touches a large file",
            RiskFactor::BulkOp => "affects many targets at once",
            RiskFactor::CrossModule => "spans multiple modules",
            RiskFactor::ExternalDep => "touches an external dependency manifest",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub score: f64,
    pub factors: Vec<RiskFactor>,
    pub reasoning: String,
    pub automatic_approval: bool,
    pub mitigations: Vec<String>,
}

const SECURITY_PATH_HINTS: &[&str] = &["auth", "secret", "credential", "token", "key.pem", ".pem", "cert"];
const DB_SCHEMA_HINTS: &[&str] = &["schema.sql", "migrations/", "migration"];
const EXTERNAL_DEP_HINTS: &[&str] = &["Cargo.toml", "package.json", "go.mod", "requirements.txt", "Gemfile"];

fn detect_factors(op: &FileOperationIntent) -> Vec<RiskFactor> {
    let mut factors = Vec::new();

    if matches!(op.safety, Safety::Dangerous) {
        factors.push(RiskFactor::SystemFile);
    }
    if op.operation == Operation::Delete {
        factors.push(RiskFactor::Deletion);
    }
    if matches!(op.safety, Safety::Risky) {
        factors.push(RiskFactor::ConfigFile);
    }
    if matches!(op.safety, Safety::Cautious) {
        factors.push(RiskFactor::LargeFile);
    }
    if op.targets.len() > 5 {
        factors.push(RiskFactor::BulkOp);
    }
    if op.targets.len() > 2 {
        factors.push(RiskFactor::CrossModule);
    }

    for target in &op.targets {
        let lower = target.to_lowercase();
        if SECURITY_PATH_HINTS.iter().any(|hint| lower.contains(hint)) {
            factors.push(RiskFactor::SecurityFile);
        }
        if DB_SCHEMA_HINTS.iter().any(|hint| lower.contains(hint)) {
            factors.push(RiskFactor::DbSchema);
        }
        if EXTERNAL_DEP_HINTS.iter().any(|hint| target.ends_with(hint)) {
            factors.push(RiskFactor::ExternalDep);
        }
    }

    factors.sort_by_key(|f| format!("{f:?}"));
    factors.dedup();
    factors
}

/// Thresholds from spec §4.10: 0.3 / 0.6 / 0.8 / 0.9.
fn level_for_score(score: f64) -> RiskLevel {
    if score >= 0.9 {
        RiskLevel::Critical
    } else if score >= 0.8 {
        RiskLevel::High
    } else if score >= 0.6 {
        RiskLevel::Medium
    } else if score >= 0.3 {
        RiskLevel::Low
    } else {
        RiskLevel::Minimal
    }
}

fn mitigations_for(factors: &[RiskFactor], op: &FileOperationIntent) -> Vec<String> {
    let mut mitigations = Vec::new();
    if factors.contains(&RiskFactor::Deletion) {
        mitigations.push("back up affected files before deletion".to_string());
    }
    if factors.contains(&RiskFactor::SystemFile) || factors.contains(&RiskFactor::ConfigFile) {
        mitigations.push("review the diff carefully before approving".to_string());
    }
    if factors.contains(&RiskFactor::BulkOp) {
        mitigations.push("consider splitting into smaller batches".to_string());
    }
    if op.operation == Operation::Move {
        mitigations.push("verify no other code references the old path".to_string());
    }
    mitigations
}

/// Aggregates risk factors into a single assessment for `op`.
pub fn assess(op: &FileOperationIntent) -> RiskAssessment {
    let factors = detect_factors(op);
    let score: f64 = factors.iter().map(|f| f.weight()).fold(0.0_f64, f64::max);
    let level = level_for_score(score);

    let reasoning = if factors.is_empty() {
        format!("{:?} on {} target(s) carries no elevated risk factors", op.operation, op.targets.len())
    } else {
        let labels: Vec<&str> = factors.iter().map(|f| f.label()).collect();
        format!("{:?}: {}", op.operation, labels.join(", "))
    };

    let automatic_approval = level <= RiskLevel::Low && !op.requires_approval;
    let mitigations = mitigations_for(&factors, op);

    RiskAssessment { level, score, factors, reasoning, automatic_approval, mitigations }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileops::Impact;

    fn op(operation: Operation, safety: Safety, targets: Vec<&str>) -> FileOperationIntent {
        FileOperationIntent {
            operation,
            targets: targets.into_iter().map(String::from).collect(),
            ambiguous_targets: Vec::new(),
            suggestions: Vec::new(),
            target_confidence: 1.0,
            safety,
            impact: Impact::Minimal,
            requires_approval: false,
            backup_required: false,
        }
    }

    #[test]
    fn deletion_scores_high_and_is_not_auto_approved() {
        let assessment = assess(&op(Operation::Delete, Safety::Dangerous, vec!["a.rs"]));
        assert_eq!(assessment.level, RiskLevel::Critical);
        assert!(!assessment.automatic_approval);
    }

    #[test]
    fn safe_edit_on_one_file_is_minimal_and_auto_approvable() {
        let assessment = assess(&op(Operation::Edit, Safety::Safe, vec!["notes.txt"]));
        assert_eq!(assessment.level, RiskLevel::Minimal);
        assert!(assessment.automatic_approval);
    }

    #[test]
    fn security_path_hint_is_detected_as_a_factor() {
        let assessment = assess(&op(Operation::Edit, Safety::Safe, vec!["src/auth/login.rs"]));
        assert!(assessment.factors.contains(&RiskFactor::SecurityFile));
    }

    #[test]
    fn level_thresholds_match_spec_boundaries() {
        assert_eq!(level_for_score(0.95), RiskLevel::Critical);
        assert_eq!(level_for_score(0.85), RiskLevel::High);
        assert_eq!(level_for_score(0.65), RiskLevel::Medium);
        assert_eq!(level_for_score(0.35), RiskLevel::Low);
        assert_eq!(level_for_score(0.1), RiskLevel::Minimal);
    }
}
