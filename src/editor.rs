//! Line-level surgery on config text.
//!
//! A file is handled as the sequence of its `\n`-separated lines. Edits splice
//! one host block by index range and re-join; every other line is copied through
//! untouched, including comments, `Include`s and odd indentation.

use std::ops::Range;

use crate::model::{HostRecord, parse_tags_line};
use crate::parser::split_directive;

fn host_value(line: &str) -> Option<String> {
    let (key, value) = split_directive(line)?;
    key.eq_ignore_ascii_case("host").then_some(value)
}

fn is_host_line_for(line: &str, name: &str) -> bool {
    host_value(line).is_some_and(|value| value == name)
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// A block stops at a blank line, the next `Host` line, or the next host's tags.
fn ends_block(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || host_value(trimmed).is_some() || parse_tags_line(trimmed).is_some()
}

/// Range of the first block for `name`: its optional tags line, the `Host` line,
/// the directives below it and any blank lines trailing it.
pub(crate) fn find_block(lines: &[&str], name: &str) -> Option<Range<usize>> {
    let mut start = None;
    for (index, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if is_host_line_for(trimmed, name) {
            start = Some((index, index));
            break;
        }
        if parse_tags_line(trimmed).is_some()
            && lines
                .get(index + 1)
                .is_some_and(|next| is_host_line_for(next.trim(), name))
        {
            start = Some((index, index + 1));
            break;
        }
    }
    let (start, header) = start?;

    let mut end = header + 1;
    while end < lines.len() && !ends_block(lines[end]) {
        end += 1;
    }
    while end < lines.len() && is_blank(lines[end]) {
        end += 1;
    }
    Some(start..end)
}

/// `content` with the block for `old_name` replaced by `record`, or `None` if absent.
pub(crate) fn replace_block(content: &str, old_name: &str, record: &HostRecord) -> Option<String> {
    let lines: Vec<&str> = content.split('\n').collect();
    let span = find_block(&lines, old_name)?;

    let mut out: Vec<String> = lines[..span.start].iter().map(|line| line.to_string()).collect();
    if out.last().is_some_and(|line| !is_blank(line)) {
        out.push(String::new());
    }
    out.extend(record.block_lines());
    out.push(String::new());
    out.extend(lines[span.end..].iter().map(|line| line.to_string()));
    Some(out.join("\n"))
}

/// `content` without the block for `name`, or `None` if absent.
pub(crate) fn remove_block(content: &str, name: &str) -> Option<String> {
    let lines: Vec<&str> = content.split('\n').collect();
    let span = find_block(&lines, name)?;
    let kept: Vec<&str> = lines[..span.start]
        .iter()
        .chain(&lines[span.end..])
        .copied()
        .collect();
    Some(kept.join("\n"))
}

/// The lines Add appends: a blank separator followed by the block.
pub(crate) fn appended_lines(record: &HostRecord) -> Vec<String> {
    let mut lines = vec![String::new()];
    lines.extend(record.block_lines());
    lines
}
