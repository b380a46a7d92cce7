//! Reads a config file and everything it `Include`s into a flat list of hosts.
//!
//! Traversal is guarded by a visited set keyed on absolute path, so include
//! cycles terminate. A failing include contributes no hosts; the failure is
//! recorded in [`ParseReport::skipped`] instead of aborting the parse.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::constants::{BACKUP_SUFFIX, MARKDOWN_SUFFIX};
use crate::error::{Result, StoreError};
use crate::model::{HostRecord, is_host_pattern, parse_tags_line};
use crate::paths::{
    absolute, create_private_file, default_config_path, ensure_private_dir, expand_tilde,
};

/// An include that was dropped from the result.
#[derive(Debug)]
pub struct SkippedInclude {
    /// The pattern or matched file that failed.
    pub target: String,
    /// File containing the `Include` line.
    pub included_from: PathBuf,
    pub error: StoreError,
}

#[derive(Debug, Default)]
pub struct ParseReport {
    pub hosts: Vec<HostRecord>,
    /// Every file visited, in visit order, without duplicates.
    pub files: Vec<PathBuf>,
    pub skipped: Vec<SkippedInclude>,
}

pub struct ConfigParser {
    root: Option<PathBuf>,
    visited: HashSet<PathBuf>,
    report: ParseReport,
}

impl ConfigParser {
    /// `root` is the config that gets created on first use when it is missing.
    pub fn new(root: Option<&Path>) -> Self {
        Self {
            root: root.map(|path| absolute(path).unwrap_or_else(|_| path.to_path_buf())),
            visited: HashSet::new(),
            report: ParseReport::default(),
        }
    }

    pub fn parse(mut self, path: &Path) -> Result<ParseReport> {
        let hosts = self.parse_file(path)?;
        self.report.hosts = hosts;
        Ok(self.report)
    }

    fn parse_file(&mut self, path: &Path) -> Result<Vec<HostRecord>> {
        let path = absolute(path)?;
        if !self.visited.insert(path.clone()) {
            tracing::debug!(file = %path.display(), "already visited, skipping");
            return Ok(Vec::new());
        }
        self.report.files.push(path.clone());

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                if self.root.as_deref() == Some(path.as_path()) {
                    if let Some(parent) = path.parent() {
                        ensure_private_dir(parent)?;
                    }
                    create_private_file(&path)?;
                    tracing::info!(file = %path.display(), "created empty ssh config");
                }
                return Ok(Vec::new());
            }
            Err(err) => return Err(StoreError::io(&path, err)),
        };

        let mut hosts = Vec::new();
        let mut current: Option<HostRecord> = None;
        let mut pending_tags: Option<Vec<String>> = None;

        for raw in content.lines() {
            let line = raw.trim();
            // Tags only attach to the line directly below them.
            let tags = pending_tags.take();
            if line.is_empty() {
                continue;
            }
            if let Some(parsed) = parse_tags_line(line) {
                pending_tags = Some(parsed);
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = split_directive(line) else {
                continue;
            };

            match key.to_ascii_lowercase().as_str() {
                "include" => {
                    let included = self.include(&value, &path);
                    hosts.extend(included);
                }
                "host" => {
                    if let Some(done) = current.take() {
                        hosts.push(done);
                    }
                    if is_host_pattern(&value) {
                        continue;
                    }
                    let mut record = HostRecord::new(value);
                    record.tags = tags.unwrap_or_default();
                    record.source_file = path.clone();
                    current = Some(record);
                }
                field => {
                    let Some(record) = current.as_mut() else {
                        continue;
                    };
                    match field {
                        "hostname" => record.hostname = value,
                        "user" => record.user = value,
                        "port" => record.port = value,
                        "identityfile" => record.identity_file = value,
                        "proxyjump" => record.proxy_jump = value,
                        _ => record.options.push(format!("{key} {value}")),
                    }
                }
            }
        }

        if let Some(done) = current {
            hosts.push(done);
        }
        Ok(hosts)
    }

    fn include(&mut self, value: &str, including: &Path) -> Vec<HostRecord> {
        let mut hosts = Vec::new();
        for pattern in value.split_whitespace() {
            let files = match expand_include(pattern, including) {
                Ok(files) => files,
                Err(error) => {
                    self.skip(pattern.to_string(), including, error);
                    continue;
                }
            };
            for file in files {
                match self.parse_file(&file) {
                    Ok(found) => hosts.extend(found),
                    Err(error) => self.skip(file.display().to_string(), including, error),
                }
            }
        }
        hosts
    }

    fn skip(&mut self, target: String, including: &Path, error: StoreError) {
        tracing::warn!(
            include = %target,
            from = %including.display(),
            error = %error,
            "skipping include"
        );
        self.report.skipped.push(SkippedInclude {
            target,
            included_from: including.to_path_buf(),
            error,
        });
    }
}

/// Resolve an `Include` pattern relative to the including file and expand it.
fn expand_include(pattern: &str, including: &Path) -> Result<Vec<PathBuf>> {
    let expanded = expand_tilde(pattern)?;
    let full = if expanded.is_absolute() {
        expanded
    } else {
        including
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(expanded)
    };
    let full = full.to_string_lossy().into_owned();
    let entries = glob::glob(&full).map_err(|source| StoreError::Glob {
        pattern: full.clone(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if is_includable(&path) => files.push(path),
            Ok(_) => {}
            Err(err) => tracing::debug!(pattern = %full, error = %err, "unreadable include match"),
        }
    }
    Ok(files)
}

/// Directories, our own backups and markdown notes never count as config.
fn is_includable(path: &Path) -> bool {
    if path.is_dir() {
        return false;
    }
    let name = path.to_string_lossy();
    !name.ends_with(BACKUP_SUFFIX) && !name.ends_with(MARKDOWN_SUFFIX)
}

/// Split a trimmed config line into its keyword and its value.
///
/// Accepts both `Key value` and `Key=value`; the value is re-joined with single
/// spaces. Lines without a value yield `None`.
pub(crate) fn split_directive(line: &str) -> Option<(&str, String)> {
    let line = line.trim();
    let key_end = line.find(|c: char| c.is_whitespace() || c == '=')?;
    let key = &line[..key_end];
    let rest = line[key_end..].trim_start();
    let rest = rest.strip_prefix('=').unwrap_or(rest);
    let value = rest.split_whitespace().collect::<Vec<_>>().join(" ");
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Parse `path` and its includes. `path` is created if it is the default config.
pub fn parse(path: &Path) -> Result<Vec<HostRecord>> {
    let root = default_config_path().ok();
    Ok(ConfigParser::new(root.as_deref()).parse(path)?.hosts)
}

pub fn parse_default() -> Result<Vec<HostRecord>> {
    parse(&default_config_path()?)
}
