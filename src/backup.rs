//! Single-slot backups taken before every destructive edit.

use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::BACKUP_SUFFIX;
use crate::error::{Result, StoreError};
use crate::paths::{backup_dir, set_secure_permissions};

/// Keeps one backup per config file basename under `<state-dir>/backups`.
#[derive(Debug, Clone)]
pub struct BackupManager {
    dir: PathBuf,
}

impl BackupManager {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: backup_dir(state_dir),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Slot for `path`. Same-named files from different directories share it.
    pub fn slot_for(&self, path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config".to_string());
        self.dir.join(format!("{name}{BACKUP_SUFFIX}"))
    }

    /// Copy `path` into its slot, replacing any earlier backup.
    pub fn backup(&self, path: &Path) -> Result<PathBuf> {
        let slot = self.slot_for(path);
        self.copy_into_slot(path, &slot)
            .map_err(|err| StoreError::Backup {
                path: path.to_path_buf(),
                source: Box::new(err),
            })?;
        tracing::debug!(source = %path.display(), backup = %slot.display(), "backed up config");
        Ok(slot)
    }

    fn copy_into_slot(&self, path: &Path, slot: &Path) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|err| StoreError::io(&self.dir, err))?;
        let content = fs::read(path).map_err(|err| StoreError::io(path, err))?;
        fs::write(slot, content).map_err(|err| StoreError::io(slot, err))?;
        set_secure_permissions(slot)
    }

    /// Overwrite `path` with the content of its backup slot.
    pub fn restore(&self, path: &Path) -> Result<PathBuf> {
        let slot = self.slot_for(path);
        let content = fs::read(&slot).map_err(|err| StoreError::io(&slot, err))?;
        fs::write(path, content).map_err(|err| StoreError::io(path, err))?;
        tracing::info!(
            target_file = %path.display(),
            backup = %slot.display(),
            "restored config from backup"
        );
        Ok(slot)
    }
}
