use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{BLOCK_INDENT, DEFAULT_PORT, TAGS_PREFIX};

/// One `Host` block as read from (or about to be written to) a config file.
///
/// Scalar fields use the empty string for "not set".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostRecord {
    pub name: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub identity_file: String,
    #[serde(default)]
    pub proxy_jump: String,
    /// Raw `Key value` lines for directives without a dedicated field, in file order.
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Absolute path of the file holding the block. Set by the parser only.
    #[serde(default)]
    pub source_file: PathBuf,
}

impl HostRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port: DEFAULT_PORT.to_string(),
            ..Self::default()
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = port.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Options joined the way they appear in a form field.
    pub fn options_text(&self) -> String {
        self.options.join("\n")
    }

    /// `["Compression yes"]` -> `"-o Compression=yes"`.
    pub fn command_options(&self) -> String {
        self.options
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(|line| match line.split_once(' ') {
                Some((key, value)) => format!("-o {key}={}", value.trim()),
                None => format!("-o {line}"),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `"-o Compression=yes -o ServerAliveInterval=60"` -> config-style option lines.
    pub fn options_from_command(raw: &str) -> Vec<String> {
        raw.split("-o")
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| part.replace('=', " "))
            .collect()
    }

    /// The block text for this record, one entry per line, without separators.
    pub fn block_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.tags.is_empty() {
            lines.push(format_tags_line(&self.tags));
        }
        lines.push(format!("Host {}", self.name));
        let fields = [
            ("HostName", self.hostname.as_str()),
            ("User", self.user.as_str()),
            ("Port", self.port.as_str()),
            ("IdentityFile", self.identity_file.as_str()),
            ("ProxyJump", self.proxy_jump.as_str()),
        ];
        for (key, value) in fields {
            if value.is_empty() || (key == "Port" && value == DEFAULT_PORT) {
                continue;
            }
            lines.push(format!("{BLOCK_INDENT}{key} {value}"));
        }
        for option in &self.options {
            let option = option.trim();
            if !option.is_empty() {
                lines.push(format!("{BLOCK_INDENT}{option}"));
            }
        }
        lines
    }
}

/// Host patterns with glob characters are defaults, not addressable hosts.
pub(crate) fn is_host_pattern(value: &str) -> bool {
    value.contains(['*', '?'])
}

pub(crate) fn format_tags_line(tags: &[String]) -> String {
    format!("{TAGS_PREFIX} {}", tags.join(", "))
}

/// Tags from a trimmed `# Tags:` line, or `None` if the line is not one.
pub(crate) fn parse_tags_line(line: &str) -> Option<Vec<String>> {
    let rest = line.strip_prefix(TAGS_PREFIX)?;
    Some(
        rest.split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect(),
    )
}
