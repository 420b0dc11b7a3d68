//! Backup storage (spec §4.10).
//!
//! Each backup writes the original bytes under a dedicated directory plus a
//! `.meta` JSON sidecar carrying the checksum, original path, and mode. A
//! "create" operation on a path that didn't previously exist still records
//! an *intent backup* — no bytes, just "rollback = delete this path".

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const RETENTION_DAYS: u64 = 7;
const MAX_BACKUPS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("io error backing up {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BackupMeta {
    pub original_path: String,
    pub backup_path: String,
    pub checksum: String,
    pub mode: Option<u32>,
    pub created_at_unix: u64,
    /// True when the original path didn't exist: rollback is "delete it".
    pub intent_only: bool,
}

pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn now_unix() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
    }

    fn checksum(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }

    fn meta_path(&self, backup_path: &Path) -> PathBuf {
        let mut meta = backup_path.as_os_str().to_owned();
        meta.push(".meta");
        PathBuf::from(meta)
    }

    /// Backs up an existing file before `op` mutates or removes it.
    pub fn backup_existing(&self, op: &str, original_path: &str) -> Result<BackupMeta, BackupError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| BackupError::Io { path: self.dir.display().to_string(), source: e })?;

        let bytes = std::fs::read(original_path).map_err(|e| BackupError::Io { path: original_path.to_string(), source: e })?;
        let mode = std::fs::metadata(original_path).ok().map(|m| {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                m.permissions().mode()
            }
            #[cfg(not(unix))]
            {
                let _ = m;
                0
            }
        });

        let basename = Path::new(original_path).file_name().and_then(|n| n.to_str()).unwrap_or("file");
        let ts = Self::now_unix();
        let checksum = Self::checksum(&bytes);
        let backup_name = format!("{op}_{basename}_{ts}_{}", &checksum[..12.min(checksum.len())]);
        let backup_path = self.dir.join(&backup_name);

        let mut file = std::fs::File::create(&backup_path).map_err(|e| BackupError::Io { path: backup_path.display().to_string(), source: e })?;
        file.write_all(&bytes).map_err(|e| BackupError::Io { path: backup_path.display().to_string(), source: e })?;

        let meta = BackupMeta {
            original_path: original_path.to_string(),
            backup_path: backup_path.display().to_string(),
            checksum,
            mode,
            created_at_unix: ts,
            intent_only: false,
        };
        self.write_meta(&backup_path, &meta)?;
        self.prune()?;
        Ok(meta)
    }

    /// Records an intent backup for a `create` operation: no bytes exist
    /// yet, rollback is simply "delete the path that gets created".
    pub fn backup_intent(&self, op: &str, target_path: &str) -> Result<BackupMeta, BackupError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| BackupError::Io { path: self.dir.display().to_string(), source: e })?;

        let basename = Path::new(target_path).file_name().and_then(|n| n.to_str()).unwrap_or("file");
        let ts = Self::now_unix();
        let backup_name = format!("{op}_{basename}_{ts}_intent");
        let backup_path = self.dir.join(&backup_name);

        let meta = BackupMeta {
            original_path: target_path.to_string(),
            backup_path: backup_path.display().to_string(),
            checksum: String::new(),
            mode: None,
            created_at_unix: ts,
            intent_only: true,
        };
        self.write_meta(&backup_path, &meta)?;
        self.prune()?;
        Ok(meta)
    }

    fn write_meta(&self, backup_path: &Path, meta: &BackupMeta) -> Result<(), BackupError> {
        let meta_path = self.meta_path(backup_path);
        let json = serde_json::to_string_pretty(meta)?;
        std::fs::write(&meta_path, json).map_err(|e| BackupError::Io { path: meta_path.display().to_string(), source: e })?;
        Ok(())
    }

    pub fn load_meta(&self, backup_path: &Path) -> Result<BackupMeta, BackupError> {
        let meta_path = self.meta_path(backup_path);
        let json = std::fs::read_to_string(&meta_path).map_err(|e| BackupError::Io { path: meta_path.display().to_string(), source: e })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Lists all sidecar-backed backups, newest first.
    pub fn list(&self) -> Vec<BackupMeta> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut metas: Vec<BackupMeta> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|ext| ext == "meta").unwrap_or(false))
            .filter_map(|e| std::fs::read_to_string(e.path()).ok())
            .filter_map(|json| serde_json::from_str(&json).ok())
            .collect();
        metas.sort_by(|a: &BackupMeta, b: &BackupMeta| b.created_at_unix.cmp(&a.created_at_unix));
        metas
    }

    /// Prunes by age (> 7 days) and by count (> 10), oldest-first.
    fn prune(&self) -> Result<(), BackupError> {
        let mut metas = self.list();
        let cutoff = Self::now_unix().saturating_sub(RETENTION_DAYS * 24 * 60 * 60);

        metas.sort_by_key(|m| m.created_at_unix);

        let expired: Vec<BackupMeta> = metas.iter().filter(|m| m.created_at_unix < cutoff).cloned().collect();
        for meta in &expired {
            self.remove(meta);
        }
        metas.retain(|m| m.created_at_unix >= cutoff);

        while metas.len() > MAX_BACKUPS {
            let oldest = metas.remove(0);
            self.remove(&oldest);
        }
        Ok(())
    }

    fn remove(&self, meta: &BackupMeta) {
        let backup_path = PathBuf::from(&meta.backup_path);
        let _ = std::fs::remove_file(&backup_path);
        let _ = std::fs::remove_file(self.meta_path(&backup_path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_existing_writes_bytes_and_sidecar() {
        let tmp = tempfile::tempdir().unwrap();
        let original = tmp.path().join("source.txt");
        std::fs::write(&original, b"hello").unwrap();

        let store = BackupStore::new(tmp.path().join(".backups"));
        let meta = store.backup_existing("edit", original.to_str().unwrap()).unwrap();

        assert!(!meta.intent_only);
        assert!(PathBuf::from(&meta.backup_path).exists());
        let loaded = store.load_meta(&PathBuf::from(&meta.backup_path)).unwrap();
        assert_eq!(loaded.checksum, meta.checksum);
    }

    #[test]
    fn backup_intent_records_no_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BackupStore::new(tmp.path().join(".backups"));
        let meta = store.backup_intent("create", "new_file.txt").unwrap();
        assert!(meta.intent_only);
        assert!(!PathBuf::from(&meta.backup_path).exists());
    }

    #[test]
    fn prune_evicts_past_the_max_backup_count() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BackupStore::new(tmp.path().join(".backups"));
        for i in 0..(MAX_BACKUPS + 3) {
            let path = tmp.path().join(format!("f{i}.txt"));
            std::fs::write(&path, b"x").unwrap();
            store.backup_existing("edit", path.to_str().unwrap()).unwrap();
        }
        assert!(store.list().len() <= MAX_BACKUPS);
    }
}
