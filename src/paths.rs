//! Platform path resolution for the SSH config tree and the tool's own state.
//!
//! Nothing here overwrites an existing file; the only side effects are
//! directory creation and permission tightening on files we create.

use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Component, Path, PathBuf};

use crate::constants::{APP_DIR_NAME, BACKUP_DIR_NAME, STATE_DIR_ENV};
use crate::error::{Result, StoreError};

pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(StoreError::NoHomeDir)
}

/// The `.ssh` directory under the user's home.
pub fn ssh_directory() -> Result<PathBuf> {
    Ok(home_dir()?.join(".ssh"))
}

/// `<home>/.ssh/config` on every platform.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(ssh_directory()?.join("config"))
}

/// Directory holding backups and the activity log.
///
/// Resolution order:
/// 1. `SSHM_STATE_DIR`
/// 2. `%APPDATA%\sshm` on Windows, `$XDG_CONFIG_HOME/sshm` elsewhere
/// 3. `<home>/.config/sshm`
pub fn state_dir() -> Result<PathBuf> {
    let override_dir = env::var_os(STATE_DIR_ENV).map(PathBuf::from);
    #[cfg(windows)]
    let platform_dir = env::var_os("APPDATA").map(PathBuf::from);
    #[cfg(not(windows))]
    let platform_dir = env::var_os("XDG_CONFIG_HOME").map(PathBuf::from);
    Ok(resolve_state_dir(override_dir, platform_dir, &home_dir()?))
}

fn resolve_state_dir(
    override_dir: Option<PathBuf>,
    platform_dir: Option<PathBuf>,
    home: &Path,
) -> PathBuf {
    if let Some(dir) = override_dir.filter(|dir| !dir.as_os_str().is_empty()) {
        return dir;
    }
    match platform_dir.filter(|dir| !dir.as_os_str().is_empty()) {
        Some(dir) => dir.join(APP_DIR_NAME),
        None => home.join(".config").join(APP_DIR_NAME),
    }
}

pub fn backup_dir(state_dir: &Path) -> PathBuf {
    state_dir.join(BACKUP_DIR_NAME)
}

/// Create `~/.ssh` with owner-only access if it is missing.
pub fn ensure_ssh_directory() -> Result<()> {
    ensure_private_dir(&ssh_directory()?)
}

/// Create `dir` (and parents) if missing. A freshly created leaf gets mode 0700;
/// an existing directory is left as it is.
pub fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|err| StoreError::io(dir, err))?;
    restrict_mode(dir, 0o700)
}

/// Create an empty file with mode 0600 unless it already exists.
pub fn create_private_file(path: &Path) -> Result<()> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path).map_err(|err| StoreError::io(path, err))?;
    set_secure_permissions(path)
}

/// Restrict a file to owner read/write. No-op on non-Unix platforms.
pub fn set_secure_permissions(path: &Path) -> Result<()> {
    restrict_mode(path, 0o600)
}

#[cfg(unix)]
fn restrict_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|err| StoreError::io(path, err))
}

#[cfg(not(unix))]
fn restrict_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Expand a leading `~` or `~/` to the home directory.
pub fn expand_tilde(raw: &str) -> Result<PathBuf> {
    if raw == "~" {
        return home_dir();
    }
    if let Some(stripped) = raw.strip_prefix("~/") {
        return Ok(home_dir()?.join(stripped));
    }
    Ok(PathBuf::from(raw))
}

/// Absolute, lexically cleaned form of `path`. `.` and `..` are collapsed
/// without touching the filesystem or following links, so one file has one key.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    let full = std::path::absolute(path).map_err(|err| StoreError::io(path, err))?;
    Ok(clean(&full))
}

fn clean(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            // `..` at the root stays at the root.
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other),
        }
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_lives_in_dot_ssh() {
        let path = default_config_path().unwrap();
        assert!(path.ends_with(".ssh/config"));
        assert_eq!(path.parent().unwrap(), ssh_directory().unwrap());
    }

    #[test]
    fn state_dir_prefers_override_then_platform_dir() {
        let home = Path::new("/home/u");
        assert_eq!(
            resolve_state_dir(Some("/tmp/state".into()), Some("/xdg".into()), home),
            PathBuf::from("/tmp/state")
        );
        assert_eq!(
            resolve_state_dir(None, Some("/xdg".into()), home),
            PathBuf::from("/xdg/sshm")
        );
        assert_eq!(
            resolve_state_dir(Some(PathBuf::new()), None, home),
            PathBuf::from("/home/u/.config/sshm")
        );
    }

    #[test]
    fn ensure_private_dir_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("a").join(".ssh");
        ensure_private_dir(&dir).unwrap();
        ensure_private_dir(&dir).unwrap();
        assert!(dir.is_dir());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&dir).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[test]
    fn create_private_file_keeps_existing_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config");
        fs::write(&path, "Host a\n").unwrap();
        create_private_file(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Host a\n");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn absolute_collapses_dot_and_parent_components() {
        let temp = TempDir::new().unwrap();
        let base = absolute(temp.path()).unwrap();
        assert_eq!(
            absolute(&temp.path().join(".ssh/conf.d/../config")).unwrap(),
            base.join(".ssh/config")
        );
        assert_eq!(
            absolute(&temp.path().join("./.ssh/../.ssh/./config")).unwrap(),
            base.join(".ssh/config")
        );
        assert_eq!(clean(Path::new("/../etc/./ssh")), PathBuf::from("/etc/ssh"));
    }

    #[test]
    fn expand_tilde_only_touches_leading_home_marker() {
        let home = home_dir().unwrap();
        assert_eq!(expand_tilde("~").unwrap(), home);
        assert_eq!(expand_tilde("~/.ssh/conf.d/*").unwrap(), home.join(".ssh/conf.d/*"));
        assert_eq!(expand_tilde("conf.d/*").unwrap(), PathBuf::from("conf.d/*"));
    }
}
