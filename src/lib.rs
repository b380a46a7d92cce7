//! Discover, add, edit, delete and relocate `Host` entries in OpenSSH config
//! files while leaving the rest of each file exactly as it was written.
//!
//! [`ConfigStore`] is the entry point. It parses the `Include` tree rooted at a
//! config file into [`HostRecord`]s and edits single host blocks in place,
//! taking a backup of the file before every change.

mod activity;
mod backup;
mod constants;
mod editor;
mod error;
mod locator;
mod model;
mod parser;
pub mod paths;
mod store;

pub use activity::ActivityLog;
pub use backup::BackupManager;
pub use error::{Result, StoreError};
pub use locator::{all_config_files, exists_in_file, find_in_all_files};
pub use model::HostRecord;
pub use parser::{ConfigParser, ParseReport, SkippedInclude, parse, parse_default};
pub use store::{ConfigStore, StoreConfig};
