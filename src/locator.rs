//! Finding which file in an include closure owns a host.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};
use crate::model::HostRecord;
use crate::parser::{ConfigParser, ParseReport, split_directive};

fn parse_closure(root: &Path) -> Result<ParseReport> {
    ConfigParser::new(Some(root)).parse(root)
}

/// First record named `name` anywhere under `root`.
pub fn find_in_all_files(root: &Path, name: &str) -> Result<HostRecord> {
    parse_closure(root)?
        .hosts
        .into_iter()
        .find(|host| host.name == name)
        .ok_or_else(|| StoreError::not_found(name))
}

/// Whether `path` itself (includes not followed) has a `Host` line listing `name`.
/// A missing file holds no hosts.
pub fn exists_in_file(name: &str, path: &Path) -> Result<bool> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(StoreError::io(path, err)),
    };
    Ok(content.lines().any(|line| {
        split_directive(line).is_some_and(|(key, value)| {
            key.eq_ignore_ascii_case("host") && value.split(' ').any(|candidate| candidate == name)
        })
    }))
}

/// Every file visited when parsing from `root`, in visit order.
pub fn all_config_files(root: &Path) -> Result<Vec<PathBuf>> {
    Ok(parse_closure(root)?.files)
}
