//! The config store: read model plus serialized, backed-up mutations.
//!
//! Reads never take the lock and may observe a file mid-write. Every mutation
//! holds the store's lock from backup to final write.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::activity::ActivityLog;
use crate::backup::BackupManager;
use crate::editor::{appended_lines, remove_block, replace_block};
use crate::error::{Result, StoreError};
use crate::locator;
use crate::model::HostRecord;
use crate::parser::{ConfigParser, ParseReport};
use crate::paths::{absolute, default_config_path, state_dir};

/// Where the store reads from and where it keeps its own state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Root of the include tree; created empty on first parse if missing.
    pub config_path: PathBuf,
    /// Holds `backups/` and the activity log.
    pub state_dir: PathBuf,
}

impl StoreConfig {
    pub fn new(config_path: impl Into<PathBuf>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            state_dir: state_dir.into(),
        }
    }

    pub fn default_paths() -> Result<Self> {
        Ok(Self::new(default_config_path()?, state_dir()?))
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }
}

pub struct ConfigStore {
    root: PathBuf,
    backups: BackupManager,
    activity: ActivityLog,
    lock: Mutex<()>,
}

impl ConfigStore {
    pub fn open(config: StoreConfig) -> Result<Self> {
        let root = absolute(&config.config_path)?;
        let activity = ActivityLog::new(&config.state_dir);
        activity.prune();
        Ok(Self {
            root,
            backups: BackupManager::new(&config.state_dir),
            activity,
            lock: Mutex::new(()),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(StoreConfig::default_paths()?)
    }

    pub fn config_path(&self) -> &Path {
        &self.root
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    // Read side.

    /// Hosts from the root config and everything it includes.
    pub fn parse(&self) -> Result<Vec<HostRecord>> {
        self.parse_file(&self.root)
    }

    pub fn parse_file(&self, path: &Path) -> Result<Vec<HostRecord>> {
        Ok(self.parse_report(path)?.hosts)
    }

    /// Like [`parse_file`](Self::parse_file) but also returns visited files and
    /// the includes that were skipped.
    pub fn parse_report(&self, path: &Path) -> Result<ParseReport> {
        ConfigParser::new(Some(&self.root)).parse(path)
    }

    pub fn find_in_all_files(&self, name: &str) -> Result<HostRecord> {
        locator::find_in_all_files(&self.root, name)
    }

    /// First host named `name` when parsing from `path` (includes followed).
    pub fn find_in_file(&self, name: &str, path: &Path) -> Result<HostRecord> {
        self.parse_file(path)?
            .into_iter()
            .find(|host| host.name == name)
            .ok_or_else(|| StoreError::not_found(name))
    }

    pub fn host_exists(&self, name: &str) -> Result<bool> {
        Ok(self.parse()?.iter().any(|host| host.name == name))
    }

    pub fn exists_in_file(&self, name: &str, path: &Path) -> Result<bool> {
        locator::exists_in_file(name, path)
    }

    pub fn all_config_files(&self) -> Result<Vec<PathBuf>> {
        self.all_config_files_from(None)
    }

    pub fn all_config_files_from(&self, root: Option<&Path>) -> Result<Vec<PathBuf>> {
        match root {
            Some(root) => Ok(self.parse_report(root)?.files),
            None => locator::all_config_files(&self.root),
        }
    }

    /// Files a new host can go into: the root first, then every other existing
    /// file in the include tree.
    pub fn writable_config_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = vec![self.root.clone()];
        for file in self.all_config_files()? {
            if file != self.root && file.is_file() {
                files.push(file);
            }
        }
        Ok(files)
    }

    /// Files a host could be moved to.
    pub fn config_files_excluding(&self, name: &str) -> Result<Vec<PathBuf>> {
        let host = self.find_in_all_files(name)?;
        Ok(self
            .all_config_files()?
            .into_iter()
            .filter(|file| *file != host.source_file)
            .collect())
    }

    // Write side.

    /// Append `record` to `target`, or to the root config when `target` is `None`.
    pub fn add(&self, record: &HostRecord, target: Option<&Path>) -> Result<()> {
        let target = match target {
            Some(path) => absolute(path)?,
            None => self.root.clone(),
        };
        let _guard = self.lock.lock();
        self.add_locked(record, &target)
    }

    pub fn add_default(&self, record: &HostRecord) -> Result<()> {
        self.add(record, None)
    }

    /// Replace the block of `old_name` wherever it is defined.
    pub fn update(&self, old_name: &str, record: &HostRecord) -> Result<()> {
        let existing = self.find_in_all_files(old_name)?;
        self.update_in_file(old_name, record, &existing.source_file)
    }

    pub fn update_in_file(&self, old_name: &str, record: &HostRecord, path: &Path) -> Result<()> {
        let _guard = self.lock.lock();
        self.update_locked(old_name, record, path)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let existing = self.find_in_all_files(name)?;
        self.delete_from_file(name, &existing.source_file)
    }

    pub fn delete_from_file(&self, name: &str, path: &Path) -> Result<()> {
        let _guard = self.lock.lock();
        self.delete_locked(name, path)
    }

    /// Add the host to `target`, then delete it from its current file.
    ///
    /// If the delete fails, `target` is put back to its exact prior content before
    /// the error is returned.
    pub fn move_host(&self, name: &str, target: &Path) -> Result<()> {
        let host = self.find_in_all_files(name)?;
        let target = absolute(target)?;
        if host.source_file == target {
            return Err(StoreError::AlreadyInTarget {
                name: name.to_string(),
                path: target,
            });
        }

        let _guard = self.lock.lock();
        let before = match fs::read(&target) {
            Ok(content) => Some(content),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(StoreError::io(&target, err)),
        };
        self.add_locked(&host, &target)?;
        if let Err(err) = self.delete_locked(name, &host.source_file) {
            self.undo_add(&target, before);
            return Err(err);
        }
        self.activity.record(&format!(
            "moved host '{name}' from {} to {}",
            host.source_file.display(),
            target.display()
        ));
        Ok(())
    }

    fn backup_if_exists(&self, path: &Path) -> Result<()> {
        if path.exists() {
            self.backups.backup(path)?;
        }
        Ok(())
    }

    fn add_locked(&self, record: &HostRecord, target: &Path) -> Result<()> {
        self.backup_if_exists(target)?;
        if locator::exists_in_file(&record.name, target)? {
            return Err(StoreError::AlreadyExists {
                name: record.name.clone(),
                path: target.to_path_buf(),
            });
        }

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(target)
            .map_err(|err| StoreError::io(target, err))?;
        // One write per line; a failure part way leaves what was written so far.
        for line in appended_lines(record) {
            writeln!(file, "{line}").map_err(|err| StoreError::io(target, err))?;
        }

        tracing::info!(host = %record.name, file = %target.display(), "added host");
        self.activity
            .record(&format!("added host '{}' to {}", record.name, target.display()));
        Ok(())
    }

    fn update_locked(&self, old_name: &str, record: &HostRecord, path: &Path) -> Result<()> {
        self.backup_if_exists(path)?;
        let content = fs::read_to_string(path).map_err(|err| StoreError::io(path, err))?;
        let updated = replace_block(&content, old_name, record)
            .ok_or_else(|| StoreError::not_found(old_name))?;
        if record.name != old_name && locator::exists_in_file(&record.name, path)? {
            return Err(StoreError::AlreadyExists {
                name: record.name.clone(),
                path: path.to_path_buf(),
            });
        }
        fs::write(path, updated).map_err(|err| StoreError::io(path, err))?;

        tracing::info!(
            host = %old_name,
            new_name = %record.name,
            file = %path.display(),
            "updated host"
        );
        self.activity.record(&format!(
            "updated host '{old_name}' as '{}' in {}",
            record.name,
            path.display()
        ));
        Ok(())
    }

    fn delete_locked(&self, name: &str, path: &Path) -> Result<()> {
        self.backup_if_exists(path)?;
        let content = fs::read_to_string(path).map_err(|err| StoreError::io(path, err))?;
        let updated = remove_block(&content, name).ok_or_else(|| StoreError::not_found(name))?;
        fs::write(path, updated).map_err(|err| StoreError::io(path, err))?;

        tracing::info!(host = %name, file = %path.display(), "deleted host");
        self.activity
            .record(&format!("deleted host '{name}' from {}", path.display()));
        Ok(())
    }

    fn undo_add(&self, target: &Path, before: Option<Vec<u8>>) {
        let outcome = match before {
            Some(content) => fs::write(target, content),
            None => fs::remove_file(target),
        };
        match outcome {
            Ok(()) => {
                tracing::warn!(file = %target.display(), "move failed, reverted target file")
            }
            Err(err) => tracing::error!(
                file = %target.display(),
                error = %err,
                "move failed and target could not be reverted; host is now duplicated"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        store: ConfigStore,
    }

    impl Fixture {
        fn new(config: &str) -> Self {
            let temp = TempDir::new().unwrap();
            let ssh = temp.path().join(".ssh");
            fs::create_dir_all(&ssh).unwrap();
            fs::write(ssh.join("config"), config).unwrap();
            let store = ConfigStore::open(StoreConfig::new(
                ssh.join("config"),
                temp.path().join("state"),
            ))
            .unwrap();
            Self { temp, store }
        }

        fn empty() -> Self {
            let temp = TempDir::new().unwrap();
            let store = ConfigStore::open(StoreConfig::new(
                temp.path().join(".ssh").join("config"),
                temp.path().join("state"),
            ))
            .unwrap();
            Self { temp, store }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.temp.path().join(".ssh").join(name)
        }

        fn read(&self, name: &str) -> String {
            fs::read_to_string(self.path(name)).unwrap()
        }
    }

    const ABC: &str = "Host a\n    HostName 1.1.1.1\n\nHost b\n    HostName 2.2.2.2\n\n# Tags: keep\nHost c\n    HostName 3.3.3.3\n    User carol\n";

    #[test]
    fn add_then_find_on_empty_config() {
        let fx = Fixture::empty();
        assert!(fx.store.parse().unwrap().is_empty());
        assert!(fx.store.config_path().is_file());

        fx.store
            .add_default(&HostRecord::new("db1").with_hostname("10.0.0.5"))
            .unwrap();
        let found = fx.store.find_in_all_files("db1").unwrap();
        assert_eq!(found.hostname, "10.0.0.5");
        assert_eq!(found.port, "22");
        assert_eq!(found.source_file, fx.path("config"));
        assert_eq!(fx.read("config"), "\nHost db1\n    HostName 10.0.0.5\n");
    }

    #[test]
    fn add_rejects_duplicate_in_same_file() {
        let fx = Fixture::new(ABC);
        let err = fx
            .store
            .add(&HostRecord::new("b").with_hostname("x"), Some(&fx.path("config")))
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert_eq!(fx.read("config"), ABC);
    }

    #[test]
    fn add_backs_up_existing_file_first() {
        let fx = Fixture::new(ABC);
        fx.store.add_default(&HostRecord::new("d").with_hostname("4")).unwrap();
        let slot = fx.store.backups().slot_for(&fx.path("config"));
        assert_eq!(fs::read_to_string(slot).unwrap(), ABC);
        assert!(fx.read("config").ends_with("3.3.3.3\n    User carol\n\nHost d\n    HostName 4\n"));
    }

    #[test]
    fn add_into_missing_directory_is_io_failure() {
        let fx = Fixture::new(ABC);
        let target = fx.temp.path().join("nope").join("extra.conf");
        let err = fx.store.add(&HostRecord::new("z"), Some(&target)).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn update_preserves_sibling_blocks() {
        let fx = Fixture::new(ABC);
        fx.store
            .update("b", &HostRecord::new("b2").with_hostname("x"))
            .unwrap();
        assert_eq!(
            fx.read("config"),
            "Host a\n    HostName 1.1.1.1\n\nHost b2\n    HostName x\n\n# Tags: keep\nHost c\n    HostName 3.3.3.3\n    User carol\n"
        );
        let names: Vec<String> = fx.store.parse().unwrap().into_iter().map(|h| h.name).collect();
        assert_eq!(names, vec!["a", "b2", "c"]);
    }

    #[test]
    fn update_of_tagged_block_replaces_tags_too() {
        let fx = Fixture::new(ABC);
        let record = HostRecord::new("c").with_hostname("3.3.3.3").with_tags(["new", "tags"]);
        fx.store.update("c", &record).unwrap();
        let c = fx.store.find_in_all_files("c").unwrap();
        assert_eq!(c.tags, vec!["new", "tags"]);
        assert!(c.user.is_empty());
        assert!(!fx.read("config").contains("keep"));
    }

    #[test]
    fn update_refuses_rename_onto_existing_host() {
        let fx = Fixture::new(ABC);
        let err = fx
            .store
            .update("a", &HostRecord::new("c").with_hostname("x"))
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert_eq!(fx.read("config"), ABC);
    }

    #[test]
    fn update_in_file_without_host_is_not_found() {
        let fx = Fixture::new(ABC);
        let err = fx
            .store
            .update_in_file("zz", &HostRecord::new("zz"), &fx.path("config"))
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(fx.read("config"), ABC);
    }

    #[test]
    fn delete_missing_host_leaves_file_untouched() {
        let fx = Fixture::new(ABC);
        assert!(fx.store.delete("ghost").unwrap_err().is_not_found());
        assert!(
            fx.store
                .delete_from_file("ghost", &fx.path("config"))
                .unwrap_err()
                .is_not_found()
        );
        assert_eq!(fx.read("config"), ABC);
    }

    #[test]
    fn delete_removes_block_and_keeps_backup() {
        let fx = Fixture::new(ABC);
        fx.store.delete("b").unwrap();
        assert_eq!(
            fx.read("config"),
            "Host a\n    HostName 1.1.1.1\n\n# Tags: keep\nHost c\n    HostName 3.3.3.3\n    User carol\n"
        );
        let slot = fx.store.backups().slot_for(&fx.path("config"));
        assert_eq!(fs::read_to_string(slot).unwrap(), ABC);
    }

    #[test]
    fn mutations_reach_hosts_in_included_files() {
        let fx = Fixture::new("Include conf.d/*\n\nHost main\n    HostName m\n");
        fs::create_dir_all(fx.path("conf.d")).unwrap();
        let work = fx.path("conf.d").join("work");
        fs::write(&work, "Host w1\n    HostName a\n\nHost w2\n    HostName b\n").unwrap();

        fx.store.delete("w1").unwrap();
        assert_eq!(fs::read_to_string(&work).unwrap(), "Host w2\n    HostName b\n");
        assert_eq!(fx.read("config"), "Include conf.d/*\n\nHost main\n    HostName m\n");
    }

    #[test]
    fn move_relocates_host_between_files() {
        let fx = Fixture::new(&format!("Include extra.conf\n\n{ABC}"));
        let extra = fx.path("extra.conf");
        fs::write(&extra, "Host e\n    HostName 5.5.5.5\n").unwrap();

        fx.store.move_host("c", &extra).unwrap();
        let c = fx.store.find_in_all_files("c").unwrap();
        assert_eq!(c.source_file, extra);
        assert_eq!(c.tags, vec!["keep"]);
        assert_eq!(c.user, "carol");
        assert!(!fx.read("config").contains("Host c"));
        assert_eq!(
            fs::read_to_string(&extra).unwrap(),
            "Host e\n    HostName 5.5.5.5\n\n# Tags: keep\nHost c\n    HostName 3.3.3.3\n    User carol\n"
        );
    }

    #[test]
    fn move_to_current_file_is_rejected() {
        let fx = Fixture::new(ABC);
        let err = fx.store.move_host("a", &fx.path("config")).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyInTarget { .. }));
        assert_eq!(fx.read("config"), ABC);
    }

    #[test]
    fn move_onto_own_file_through_parent_dir_is_rejected() {
        let fx = Fixture::new(ABC);
        let detour = fx.temp.path().join(".ssh/../.ssh/./config");
        let err = fx.store.move_host("a", &detour).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyInTarget { .. }));
        assert_eq!(fx.read("config"), ABC);

        let targets = fx.store.config_files_excluding("a").unwrap();
        assert!(!targets.contains(&absolute(&fx.path("config")).unwrap()));
    }

    #[test]
    fn failed_move_reverts_target() {
        let fx = Fixture::new(ABC);
        let extra = fx.path("extra.conf");
        fs::write(&extra, "Host e\n").unwrap();
        // A directory in the source's backup slot makes the delete step fail.
        fs::create_dir_all(fx.store.backups().slot_for(&fx.path("config"))).unwrap();

        let err = fx.store.move_host("a", &extra).unwrap_err();
        assert!(matches!(err, StoreError::Backup { .. }));
        assert_eq!(fs::read_to_string(&extra).unwrap(), "Host e\n");
        assert_eq!(fx.read("config"), ABC);
    }

    #[test]
    fn failed_move_removes_target_it_created() {
        let fx = Fixture::new(ABC);
        let fresh = fx.path("fresh.conf");
        fs::create_dir_all(fx.store.backups().slot_for(&fx.path("config"))).unwrap();

        assert!(fx.store.move_host("a", &fresh).is_err());
        assert!(!fresh.exists());
    }

    #[test]
    fn rendered_blocks_parse_back_identically() {
        let fx = Fixture::new(
            "# Tags: x, y\nHost full\n    HostName h\n    User u\n    Port 2200\n    IdentityFile ~/.ssh/k\n    ProxyJump j\n    Compression yes\n    ForwardAgent no\n\nHost bare\n",
        );
        let original = fx.store.parse().unwrap();

        let copy = fx.path("copy");
        let text: Vec<String> = original.iter().flat_map(appended_lines).collect();
        fs::write(&copy, text.join("\n") + "\n").unwrap();
        let reparsed = fx.store.parse_file(&copy).unwrap();

        assert_eq!(reparsed.len(), original.len());
        for (before, after) in original.iter().zip(&reparsed) {
            assert_eq!(
                HostRecord {
                    source_file: PathBuf::new(),
                    ..before.clone()
                },
                HostRecord {
                    source_file: PathBuf::new(),
                    ..after.clone()
                }
            );
        }
    }

    #[test]
    fn file_listings_cover_include_tree() {
        let fx = Fixture::new("Include extra.conf missing.conf\nHost a\n");
        let extra = fx.path("extra.conf");
        fs::write(&extra, "Host e\n").unwrap();

        let all = fx.store.all_config_files().unwrap();
        assert_eq!(all, vec![fx.path("config"), extra.clone()]);
        assert_eq!(fx.store.writable_config_files().unwrap(), all);
        assert_eq!(fx.store.config_files_excluding("a").unwrap(), vec![extra.clone()]);
        assert_eq!(fx.store.all_config_files_from(Some(&extra)).unwrap(), vec![extra]);
        assert!(fx.store.host_exists("e").unwrap());
        assert!(!fx.store.host_exists("zz").unwrap());
        assert_eq!(fx.store.find_in_file("a", &fx.path("config")).unwrap().name, "a");
    }

    #[test]
    fn concurrent_adds_are_serialized() {
        let fx = Fixture::new("Host seed\n");
        let store = Arc::new(fx.store);
        std::thread::scope(|scope| {
            for worker in 0..8 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for i in 0..5 {
                        let name = format!("host-{worker}-{i}");
                        store.add_default(&HostRecord::new(name).with_hostname("h")).unwrap();
                    }
                });
            }
        });
        let hosts = store.parse().unwrap();
        assert_eq!(hosts.len(), 41);
        assert!(hosts.iter().all(|host| host.hostname == "h" || host.name == "seed"));
    }

    #[test]
    fn mutations_are_recorded_in_activity_log() {
        let fx = Fixture::new(ABC);
        fx.store.delete("a").unwrap();
        let log = fs::read_to_string(fx.store.activity().path()).unwrap();
        assert!(log.contains("deleted host 'a'"));
    }
}
