//! Rollback execution (spec §4.10).
//!
//! A rollback plan is an ordered list of steps; each step runs its primary
//! action and, on failure, tries its declared fallbacks in order. A step
//! with no remaining fallback aborts the whole rollback and reports
//! everything that failed.

use std::path::PathBuf;

use super::backup::{BackupMeta, BackupStore};

#[derive(Debug, Clone)]
pub enum RollbackAction {
    RestoreFile { backup_path: String },
    DeleteFile { path: String },
    RevertChanges { backup_path: String },
}

#[derive(Debug, Clone)]
pub struct RollbackStep {
    pub order: u32,
    pub action: RollbackAction,
    pub fallbacks: Vec<RollbackAction>,
}

#[derive(Debug, Clone)]
pub struct RollbackPlan {
    pub steps: Vec<RollbackStep>,
    /// Whether every step can run unattended. `false` would mean at least
    /// one step is a `manual_step` needing a human; this crate's steps are
    /// all backup-store-driven restores/deletes, so it's always `true` today.
    pub can_auto_rollback: bool,
}

impl RollbackPlan {
    pub fn from_backups(backups: &[BackupMeta]) -> Self {
        let mut steps: Vec<RollbackStep> = backups
            .iter()
            .enumerate()
            .map(|(i, meta)| RollbackStep {
                order: i as u32,
                action: RollbackAction::RestoreFile { backup_path: meta.backup_path.clone() },
                fallbacks: vec![RollbackAction::DeleteFile { path: meta.original_path.clone() }],
            })
            .collect();
        steps.sort_by_key(|s| s.order);
        Self { steps, can_auto_rollback: true }
    }
}

#[derive(Debug, Clone)]
pub struct RollbackOutcome {
    pub succeeded_steps: Vec<u32>,
    pub failed_steps: Vec<(u32, String)>,
}

impl RollbackOutcome {
    pub fn is_complete_success(&self) -> bool {
        self.failed_steps.is_empty()
    }
}

fn run_action(store: &BackupStore, action: &RollbackAction) -> Result<(), String> {
    match action {
        RollbackAction::RestoreFile { backup_path } | RollbackAction::RevertChanges { backup_path } => restore_file(store, backup_path),
        RollbackAction::DeleteFile { path } => delete_file(path),
    }
}

/// `restore_file`: locate the backup's sidecar; if it's an intent backup,
/// delete the created file; otherwise verify the checksum and write the
/// bytes back, restoring the recorded mode.
fn restore_file(store: &BackupStore, backup_path: &str) -> Result<(), String> {
    let backup_path_buf = PathBuf::from(backup_path);
    let meta = store.load_meta(&backup_path_buf).map_err(|e| e.to_string())?;

    if meta.intent_only {
        return delete_file(&meta.original_path);
    }

    let bytes = std::fs::read(&backup_path_buf).map_err(|e| format!("reading backup {backup_path}: {e}"))?;
    let actual_checksum = {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        format!("{:x}", hasher.finalize())
    };
    if actual_checksum != meta.checksum {
        return Err(format!("checksum mismatch restoring {}: backup may be corrupt", meta.original_path));
    }

    std::fs::write(&meta.original_path, &bytes).map_err(|e| format!("restoring {}: {e}", meta.original_path))?;

    #[cfg(unix)]
    if let Some(mode) = meta.mode {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(&meta.original_path, std::fs::Permissions::from_mode(mode));
    }

    Ok(())
}

/// `delete_file`: remove if present, silently succeed if already absent.
fn delete_file(path: &str) -> Result<(), String> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(format!("deleting {path}: {e}")),
    }
}

/// Executes `plan` in ascending step order, trying declared fallbacks on
/// failure; aborts on the first step that exhausts its fallbacks.
pub fn execute(store: &BackupStore, plan: &RollbackPlan) -> RollbackOutcome {
    let mut succeeded_steps = Vec::new();
    let mut failed_steps = Vec::new();

    for step in &plan.steps {
        let mut last_error = match run_action(store, &step.action) {
            Ok(()) => {
                succeeded_steps.push(step.order);
                continue;
            }
            Err(e) => e,
        };

        let mut recovered = false;
        for fallback in &step.fallbacks {
            match run_action(store, fallback) {
                Ok(()) => {
                    recovered = true;
                    break;
                }
                Err(e) => last_error = e,
            }
        }

        if recovered {
            succeeded_steps.push(step.order);
        } else {
            failed_steps.push((step.order, last_error));
            break;
        }
    }

    RollbackOutcome { succeeded_steps, failed_steps }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restores_a_backed_up_file() {
        let tmp = tempfile::tempdir().unwrap();
        let original = tmp.path().join("a.txt");
        std::fs::write(&original, b"original").unwrap();

        let store = BackupStore::new(tmp.path().join(".backups"));
        let meta = store.backup_existing("edit", original.to_str().unwrap()).unwrap();

        std::fs::write(&original, b"mutated").unwrap();

        let plan = RollbackPlan::from_backups(&[meta]);
        let outcome = execute(&store, &plan);

        assert!(outcome.is_complete_success());
        assert_eq!(std::fs::read(&original).unwrap(), b"original");
    }

    #[test]
    fn intent_backup_deletes_the_created_file() {
        let tmp = tempfile::tempdir().unwrap();
        let created = tmp.path().join("created.txt");
        std::fs::write(&created, b"new").unwrap();

        let store = BackupStore::new(tmp.path().join(".backups"));
        let meta = store.backup_intent("create", created.to_str().unwrap()).unwrap();

        let plan = RollbackPlan::from_backups(&[meta]);
        let outcome = execute(&store, &plan);

        assert!(outcome.is_complete_success());
        assert!(!created.exists());
    }

    #[test]
    fn missing_backup_falls_back_to_delete_and_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BackupStore::new(tmp.path().join(".backups"));
        let target = tmp.path().join("gone.txt");
        std::fs::write(&target, b"x").unwrap();

        let plan = RollbackPlan {
            steps: vec![RollbackStep {
                order: 0,
                action: RollbackAction::RestoreFile { backup_path: tmp.path().join("nonexistent").to_str().unwrap().to_string() },
                fallbacks: vec![RollbackAction::DeleteFile { path: target.to_str().unwrap().to_string() }],
            }],
            can_auto_rollback: true,
        };
        let outcome = execute(&store, &plan);
        assert!(outcome.is_complete_success());
        assert!(!target.exists());
    }
}
