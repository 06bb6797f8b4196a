use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Advisory lock expiry, a safety valve against a crashed holder leaving the
/// lock stuck forever.
const LOCK_EXPIRY_HOURS: i64 = 4;
const LOCK_FILE_NAME: &str = ".project_lock";

/// Who is allowed to claim a project lock. Coordination between a
/// human-driven (terminal) and an autonomous (heartbeat) instance of the
/// same agent, as in `spec.md` §3's data-model notes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LockHolder {
    Terminal,
    Heartbeat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectLock {
    pub locked_by: LockHolder,
    pub locked_at: DateTime<Utc>,
    pub context: String,
}

impl ProjectLock {
    fn path(entity_path: &Path) -> PathBuf {
        entity_path.join(LOCK_FILE_NAME)
    }

    /// Acquire the lock for `holder`, overwriting any existing (non-expired
    /// or expired, doesn't matter) lock file. Advisory only: nothing stops a
    /// caller from ignoring `status`.
    pub async fn acquire(
        entity_path: &Path,
        holder: LockHolder,
        context: &str,
    ) -> Result<(), AppError> {
        let lock = Self {
            locked_by: holder,
            locked_at: Utc::now(),
            context: context.to_owned(),
        };
        let body = serde_json::to_string_pretty(&lock)
            .map_err(|e| AppError::InternalError(e.to_string()))?;
        tokio::fs::write(Self::path(entity_path), body).await?;
        Ok(())
    }

    pub async fn release(entity_path: &Path) -> Result<(), AppError> {
        match tokio::fs::remove_file(Self::path(entity_path)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Returns the lock if present and unexpired. An expired lock is removed
    /// as a side effect, mirroring the original's "clean it up" behavior.
    pub async fn status(entity_path: &Path) -> Result<Option<Self>, AppError> {
        let path = Self::path(entity_path);
        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let lock: Self =
            serde_json::from_str(&body).map_err(|e| AppError::InternalError(e.to_string()))?;

        let expiry = lock.locked_at + Duration::hours(LOCK_EXPIRY_HOURS);
        if Utc::now() > expiry {
            tokio::fs::remove_file(&path).await.ok();
            return Ok(None);
        }

        Ok(Some(lock))
    }
}

/// Resolve the filesystem layout rooted at `entity_path` for a single
/// entity's memory store (crystal markdown files, inventory seeds).
#[derive(Debug, Clone)]
pub struct EntityLayout {
    pub root: PathBuf,
}

impl EntityLayout {
    pub fn new(entity_path: impl Into<PathBuf>) -> Self {
        Self {
            root: entity_path.into(),
        }
    }

    pub fn crystals_dir(&self) -> PathBuf {
        self.root.join("crystals")
    }

    pub fn crystal_path(&self, crystal_num: u32) -> PathBuf {
        self.crystals_dir().join(format!("{crystal_num:04}.md"))
    }

    pub fn inventory_dir(&self) -> PathBuf {
        self.root.join("inventory")
    }

    pub async fn ensure_directories(&self) -> Result<(), AppError> {
        tokio::fs::create_dir_all(self.crystals_dir()).await?;
        tokio::fs::create_dir_all(self.inventory_dir()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_then_status_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");

        let status = ProjectLock::status(dir.path()).await.expect("status");
        assert!(status.is_none());

        ProjectLock::acquire(dir.path(), LockHolder::Terminal, "writing crystal")
            .await
            .expect("acquire");

        let status = ProjectLock::status(dir.path())
            .await
            .expect("status")
            .expect("lock present");
        assert_eq!(status.locked_by, LockHolder::Terminal);
        assert_eq!(status.context, "writing crystal");

        ProjectLock::release(dir.path()).await.expect("release");
        assert!(ProjectLock::status(dir.path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_lock_is_treated_as_unlocked() {
        let dir = tempfile::tempdir().expect("tempdir");

        let expired = ProjectLock {
            locked_by: LockHolder::Heartbeat,
            locked_at: Utc::now() - Duration::hours(LOCK_EXPIRY_HOURS + 1),
            context: "stale".into(),
        };
        let body = serde_json::to_string_pretty(&expired).unwrap();
        tokio::fs::write(dir.path().join(".project_lock"), body)
            .await
            .unwrap();

        let status = ProjectLock::status(dir.path()).await.expect("status");
        assert!(status.is_none());
    }

    #[tokio::test]
    async fn ensure_directories_creates_crystals_and_inventory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = EntityLayout::new(dir.path());
        layout.ensure_directories().await.expect("ensure dirs");

        assert!(layout.crystals_dir().is_dir());
        assert!(layout.inventory_dir().is_dir());
    }
}
