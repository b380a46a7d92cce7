use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Datelike;

use crate::constants::{
    ACTIVITY_LOG_NAME, LOG_MAX_ENTRIES, LOG_PARSE_FORMAT, LOG_RETENTION_DAYS, LOG_SEPARATOR,
    LOG_TIMESTAMP_FORMAT,
};

/// Append-only record of changes made to config files.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    path: PathBuf,
}

impl ActivityLog {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(ACTIVITY_LOG_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best effort: a log that cannot be written never fails the caller.
    pub fn record(&self, message: &str) {
        let timestamp = chrono::Local::now().format(LOG_TIMESTAMP_FORMAT);
        let line = format!("{timestamp}{LOG_SEPARATOR}{message}");
        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                let _ = writeln!(file, "{line}");
            }
            Err(err) => {
                tracing::debug!(
                    log = %self.path.display(),
                    error = %err,
                    "activity log unavailable"
                );
            }
        }
    }

    pub fn prune(&self) {
        prune_log_file(&self.path);
    }
}

pub(crate) fn prune_log_file(path: &Path) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    let now = chrono::Local::now().naive_local();
    let cutoff = now - chrono::Duration::days(LOG_RETENTION_DAYS);
    let mut kept = Vec::new();
    for line in content.lines() {
        let Some((timestamp, _)) = line.split_once(LOG_SEPARATOR) else {
            continue;
        };
        if let Some(stamped) = stamp_with_year(timestamp, now)
            && stamped >= cutoff
        {
            kept.push(line.to_string());
        }
    }
    if kept.len() > LOG_MAX_ENTRIES {
        kept = kept.split_off(kept.len().saturating_sub(LOG_MAX_ENTRIES));
    }
    if kept.is_empty() {
        let _ = fs::remove_file(path);
    } else {
        let _ = fs::write(path, kept.join("\n") + "\n");
    }
}

/// Log lines carry no year; anything that would land in the future is from last year.
fn stamp_with_year(timestamp: &str, now: chrono::NaiveDateTime) -> Option<chrono::NaiveDateTime> {
    let parse = |year: i32| {
        chrono::NaiveDateTime::parse_from_str(&format!("{year}-{timestamp}"), LOG_PARSE_FORMAT).ok()
    };
    match parse(now.year()) {
        Some(stamped) if stamped > now + chrono::Duration::days(1) => parse(now.year() - 1),
        other => other,
    }
}
