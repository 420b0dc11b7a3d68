//! Safety orchestrator (spec C10).
//!
//! Pipeline: assess risk → gather required approvals → back up every
//! existing target → run the caller's mutation callback → on failure,
//! auto-rollback when policy allows, otherwise surface the failure with the
//! rollback plan available for explicit invocation.

pub mod backup;
pub mod preview;
pub mod risk;
pub mod rollback;

use std::path::Path;
use std::time::{Duration, SystemTime};

pub use backup::{BackupError, BackupMeta, BackupStore};
pub use preview::{affected_dependents, preview_file, ChangePreview, FilePreview};
pub use risk::{assess as assess_risk, RiskAssessment, RiskFactor, RiskLevel};
pub use rollback::{execute as execute_rollback, RollbackAction, RollbackOutcome, RollbackPlan, RollbackStep};

use crate::fileops::{FileOperationIntent, Operation};

#[derive(Debug, thiserror::Error)]
pub enum SafetyError {
    #[error("risk rejected: {0}")]
    RiskRejected(String),
    #[error("approval denied by {approver}")]
    ApprovalDenied { approver: String },
    #[error("backup failed: {0}")]
    BackupFailed(#[from] BackupError),
    #[error("rollback failed: {0:?}")]
    RollbackFailed(Vec<(u32, String)>),
}

impl SafetyError {
    pub fn resolution(&self) -> String {
        match self {
            SafetyError::RiskRejected(msg) => format!("operation rejected by risk policy: {msg}"),
            SafetyError::ApprovalDenied { approver } => format!("{approver} denied this operation; ask them or adjust the request"),
            SafetyError::BackupFailed(_) => "backup could not be created; no mutation was made".to_string(),
            SafetyError::RollbackFailed(_) => "rollback could not fully restore state; inspect the backup directory manually".to_string(),
        }
    }
}

/// Named role required to approve an operation at a given risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Approver {
    User,
    Admin,
    PeerReview,
}

impl Approver {
    fn label(self) -> &'static str {
        match self {
            Approver::User => "user",
            Approver::Admin => "admin",
            Approver::PeerReview => "peer_review",
        }
    }
}

/// Required approvers by risk level, and whether auto-approval is ever
/// permitted at that level (spec §4.10).
pub fn required_approvers(level: RiskLevel) -> Vec<Approver> {
    match level {
        RiskLevel::Critical => vec![Approver::Admin, Approver::PeerReview],
        RiskLevel::High => vec![Approver::User, Approver::PeerReview],
        RiskLevel::Medium => vec![Approver::User],
        RiskLevel::Low | RiskLevel::Minimal => Vec::new(),
    }
}

pub fn auto_approval_allowed(level: RiskLevel) -> bool {
    matches!(level, RiskLevel::Low | RiskLevel::Minimal)
}

/// One approver's decision, with the time it was made — approvals expire
/// after a configurable timeout (default 5 minutes).
#[derive(Debug, Clone)]
pub struct ApprovalGrant {
    pub approver: Approver,
    pub approved: bool,
    pub at: SystemTime,
}

/// Resolves whether every required approver has granted a non-expired
/// approval. Any explicit rejection denies immediately.
pub fn approvals_satisfied(required: &[Approver], grants: &[ApprovalGrant], expiry: Duration) -> Result<(), SafetyError> {
    for approver in required {
        let grant = grants.iter().rev().find(|g| g.approver == *approver);
        match grant {
            None => return Err(SafetyError::ApprovalDenied { approver: approver.label().to_string() }),
            Some(g) if !g.approved => return Err(SafetyError::ApprovalDenied { approver: approver.label().to_string() }),
            Some(g) => {
                let age = SystemTime::now().duration_since(g.at).unwrap_or_default();
                if age > expiry {
                    return Err(SafetyError::ApprovalDenied { approver: approver.label().to_string() });
                }
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct SafetyPolicy {
    pub approval_expiry: Duration,
    /// Master switch; when off, failures always surface with the plan left
    /// for explicit invocation regardless of risk level or rollbackability.
    pub auto_rollback: bool,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self { approval_expiry: Duration::from_secs(5 * 60), auto_rollback: true }
    }
}

/// The result of a completed (or rolled-back) file operation.
pub struct ExecutionOutcome {
    pub rollback_plan: RollbackPlan,
    pub rolled_back: Option<RollbackOutcome>,
}

pub struct SafetyOrchestrator {
    backups: BackupStore,
    policy: SafetyPolicy,
}

impl SafetyOrchestrator {
    pub fn new(backup_dir: impl AsRef<Path>) -> Self {
        Self { backups: BackupStore::new(backup_dir.as_ref().to_path_buf()), policy: SafetyPolicy::default() }
    }

    pub fn with_policy(mut self, policy: SafetyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Step 1: aggregate risk for `op`. Callers consult this to decide
    /// whether to proceed to [`Self::check_approvals`] at all.
    pub fn assess(&self, op: &FileOperationIntent) -> RiskAssessment {
        assess_risk(op)
    }

    /// Step 2: verifies every required approver (by risk level) has granted
    /// a non-expired approval.
    pub fn check_approvals(&self, level: RiskLevel, grants: &[ApprovalGrant]) -> Result<(), SafetyError> {
        if auto_approval_allowed(level) && grants.is_empty() {
            return Ok(());
        }
        approvals_satisfied(&required_approvers(level), grants, self.policy.approval_expiry)
    }

    /// Step 3: backs up every existing target (and records an intent backup
    /// for `create` targets that don't exist yet), building the rollback
    /// plan before any mutation runs. For `move`, the plan additionally
    /// deletes the destination on rollback (spec §9 open question).
    pub fn backup_targets(&self, op: &FileOperationIntent, destination: Option<&str>) -> Result<RollbackPlan, SafetyError> {
        let op_name = format!("{:?}", op.operation).to_lowercase();
        let mut metas = Vec::with_capacity(op.targets.len());

        for target in &op.targets {
            let meta = if op.operation == Operation::Create && !Path::new(target).exists() {
                self.backups.backup_intent(&op_name, target)?
            } else if Path::new(target).exists() {
                self.backups.backup_existing(&op_name, target)?
            } else {
                continue;
            };
            metas.push(meta);
        }

        let mut plan = RollbackPlan::from_backups(&metas);
        if op.operation == Operation::Move {
            if let Some(dest) = destination {
                let next_order = plan.steps.last().map(|s| s.order + 1).unwrap_or(0);
                plan.steps.push(RollbackStep { order: next_order, action: RollbackAction::DeleteFile { path: dest.to_string() }, fallbacks: Vec::new() });
            }
        }

        Ok(plan)
    }

    /// Step 4: runs `mutate` after backups have succeeded. On failure, runs
    /// rollback automatically when the policy allows it and the plan is
    /// itself auto-rollbackable — risk level gates *approval* (§4.10's
    /// `required_approvers`/`check_approvals`), not whether a failure can be
    /// undone; a high-risk op with a fully automated plan still rolls back.
    /// Otherwise returns the error with the plan left for the caller to
    /// invoke explicitly via [`Self::rollback`].
    pub fn execute<F, E>(&self, plan: RollbackPlan, level: RiskLevel, mutate: F) -> Result<ExecutionOutcome, (E, RollbackPlan)>
    where
        F: FnOnce() -> Result<(), E>,
    {
        match mutate() {
            Ok(()) => Ok(ExecutionOutcome { rollback_plan: plan, rolled_back: None }),
            Err(e) => {
                log::debug!("post-backup mutation failed at risk level {level:?}; evaluating auto-rollback");
                if self.policy.auto_rollback && plan.can_auto_rollback {
                    let outcome = execute_rollback(&self.backups, &plan);
                    if outcome.is_complete_success() {
                        return Ok(ExecutionOutcome { rollback_plan: plan, rolled_back: Some(outcome) });
                    }
                }
                Err((e, plan))
            }
        }
    }

    /// Explicit rollback invocation, for callers that deferred it after
    /// [`Self::execute`] returned an error without auto-rolling back.
    pub fn rollback(&self, plan: &RollbackPlan) -> Result<RollbackOutcome, SafetyError> {
        let outcome = execute_rollback(&self.backups, plan);
        if outcome.is_complete_success() {
            Ok(outcome)
        } else {
            Err(SafetyError::RollbackFailed(outcome.failed_steps))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileops::{Impact, Safety};

    fn op(operation: Operation, targets: Vec<&str>) -> FileOperationIntent {
        FileOperationIntent {
            operation,
            targets: targets.into_iter().map(String::from).collect(),
            ambiguous_targets: Vec::new(),
            suggestions: Vec::new(),
            target_confidence: 1.0,
            safety: Safety::Risky,
            impact: Impact::Minimal,
            requires_approval: true,
            backup_required: true,
        }
    }

    #[test]
    fn low_risk_auto_approves_with_no_grants() {
        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = SafetyOrchestrator::new(tmp.path().join(".backups"));
        assert!(orchestrator.check_approvals(RiskLevel::Minimal, &[]).is_ok());
    }

    #[test]
    fn medium_risk_requires_user_approval() {
        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = SafetyOrchestrator::new(tmp.path().join(".backups"));
        assert!(orchestrator.check_approvals(RiskLevel::Medium, &[]).is_err());

        let grants = vec![ApprovalGrant { approver: Approver::User, approved: true, at: SystemTime::now() }];
        assert!(orchestrator.check_approvals(RiskLevel::Medium, &grants).is_ok());
    }

    #[test]
    fn expired_approval_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = SafetyOrchestrator::new(tmp.path().join(".backups")).with_policy(SafetyPolicy {
            approval_expiry: Duration::from_secs(0),
            ..SafetyPolicy::default()
        });
        let grants = vec![ApprovalGrant { approver: Approver::User, approved: true, at: SystemTime::now() - Duration::from_secs(10) }];
        assert!(orchestrator.check_approvals(RiskLevel::Medium, &grants).is_err());
    }

    #[test]
    fn delete_with_auto_rollback_restores_file_on_post_mutation_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("old.ts");
        std::fs::write(&target, b"ABC content").unwrap();

        let orchestrator = SafetyOrchestrator::new(tmp.path().join(".backups"));
        let intent = op(Operation::Delete, vec![target.to_str().unwrap()]);
        let plan = orchestrator.backup_targets(&intent, None).unwrap();

        let result: Result<ExecutionOutcome, (String, RollbackPlan)> = orchestrator.execute(plan, RiskLevel::High, || {
            std::fs::remove_file(&target).unwrap();
            Err("callback failed after deletion".to_string())
        });

        let outcome = result.unwrap();
        assert!(outcome.rolled_back.is_some());
        assert_eq!(std::fs::read(&target).unwrap(), b"ABC content");
    }

    #[test]
    fn move_rollback_also_deletes_the_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("a.rs");
        let dest = tmp.path().join("b.rs");
        std::fs::write(&source, b"content").unwrap();

        let orchestrator = SafetyOrchestrator::new(tmp.path().join(".backups"));
        let intent = op(Operation::Move, vec![source.to_str().unwrap()]);
        let plan = orchestrator.backup_targets(&intent, Some(dest.to_str().unwrap())).unwrap();

        std::fs::rename(&source, &dest).unwrap();
        let outcome = orchestrator.rollback(&plan).unwrap();

        assert!(outcome.is_complete_success());
        assert!(source.exists());
        assert!(!dest.exists());
    }
}
