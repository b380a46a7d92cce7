pub(crate) const DEFAULT_PORT: &str = "22";
pub(crate) const TAGS_PREFIX: &str = "# Tags:";
pub(crate) const BLOCK_INDENT: &str = "    ";

pub(crate) const APP_DIR_NAME: &str = "sshm";
pub(crate) const STATE_DIR_ENV: &str = "SSHM_STATE_DIR";
pub(crate) const BACKUP_DIR_NAME: &str = "backups";
pub(crate) const BACKUP_SUFFIX: &str = ".backup";
pub(crate) const MARKDOWN_SUFFIX: &str = ".md";

pub(crate) const ACTIVITY_LOG_NAME: &str = "sshm.log";
pub(crate) const LOG_TIMESTAMP_FORMAT: &str = "%m-%d %H:%M:%S";
pub(crate) const LOG_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub(crate) const LOG_SEPARATOR: &str = " | ";

pub(crate) const LOG_RETENTION_DAYS: i64 = 7;
pub(crate) const LOG_MAX_ENTRIES: usize = 10_000;
