//! Glob patterns
//!
//! Shell patterns appear in two places: unquoted words with `*`, `?` or
//! `[` are matched against file names, and the pattern operand of
//! `${name#pat}` and `${name/pat/rep}` is matched against a value. Both
//! translate the pattern into a [`Regex`].
//!
//! Quoted parts of a pattern always match literally. Callers mark them by
//! escaping each character with a backslash ([`escape`]).

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::trace;

/// Characters that make an unquoted word a pattern.
const GLOB_CHARS: &[char] = &['*', '?', '['];

/// File name generation for unquoted words containing pattern characters.
///
/// The default implementation lists the real file system. Hosts that run
/// scripts against a virtual tree can plug in their own.
pub trait Globber: Send + Sync {
    /// Paths matching `pattern`, sorted. Relative patterns are resolved
    /// against `cwd` and the matches are returned relative as well.
    ///
    /// An empty result leaves the word as it was.
    fn glob(&self, pattern: &str, cwd: &Path) -> Vec<String>;
}

/// Check if a string contains unescaped glob characters.
pub fn has_glob_chars(text: &str) -> bool {
    let mut escaped = false;
    for ch in text.chars() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if GLOB_CHARS.contains(&ch) {
            return true;
        }
    }
    false
}

/// Escape every pattern metacharacter so `text` matches only itself.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Remove pattern escapes, the inverse of [`escape`].
pub fn unescape(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(ch);
    }
    out
}

/// Translate a shell pattern to regex syntax, without anchors.
///
/// In path mode `*` and `?` do not cross a `/`.
fn translate(pattern: &str, path_mode: bool) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(if path_mode { "[^/]*" } else { ".*" }),
            '?' => out.push_str(if path_mode { "[^/]" } else { "." }),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push_str(&translate_class(&chars[i + 1..end]));
                    i = end;
                }
                None => out.push_str(r"\["),
            },
            '\\' if i + 1 < chars.len() => {
                i += 1;
                out.push_str(&regex::escape(&chars[i].to_string()));
            }
            ch => out.push_str(&regex::escape(&ch.to_string())),
        }
        i += 1;
    }
    out
}

/// Index of the `]` closing the bracket expression opened at `start`.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    if matches!(chars.get(i), Some('!') | Some('^')) {
        i += 1;
    }
    // a leading ']' is a member, not the end
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    while i < chars.len() {
        if chars[i] == ']' {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn translate_class(members: &[char]) -> String {
    let mut out = String::from("[");
    let mut rest = members;
    if let Some((&('!' | '^'), tail)) = rest.split_first() {
        out.push('^');
        rest = tail;
    }
    for &ch in rest {
        if matches!(ch, '\\' | '[' | ']' | '&' | '~' | '^') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push(']');
    out
}

/// A pattern matched against values.
#[derive(Debug, Clone)]
pub struct Pattern {
    /// Set when the pattern has metacharacters; otherwise this is plain
    /// text compared literally.
    regex: Option<Regex>,
    literal: String,
}

impl Pattern {
    /// Build from pattern text where quoted characters are escaped.
    pub fn new(pattern: &str) -> Self {
        let literal = unescape(pattern);
        if !has_glob_chars(pattern) {
            return Self {
                regex: None,
                literal,
            };
        }
        let source = format!("(?s)^(?:{})$", translate(pattern, false));
        match Regex::new(&source) {
            Ok(regex) => Self {
                regex: Some(regex),
                literal,
            },
            Err(err) => {
                trace!(pattern, error = %err, "pattern falls back to literal");
                Self {
                    regex: None,
                    literal,
                }
            }
        }
    }

    /// Pattern without metacharacters.
    pub fn is_literal(&self) -> bool {
        self.regex.is_none()
    }

    /// The literal text of the pattern.
    pub fn text(&self) -> &str {
        &self.literal
    }

    /// Whole-string match.
    pub fn matches(&self, text: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(text),
            None => text == self.literal,
        }
    }

    /// Byte length of the shortest or longest prefix of `text` matching.
    pub fn match_prefix(&self, text: &str, longest: bool) -> Option<usize> {
        let mut ends = boundaries(text);
        if longest {
            ends.reverse();
        }
        ends.into_iter().find(|&end| self.matches(&text[..end]))
    }

    /// Byte offset where the shortest or longest matching suffix starts.
    pub fn match_suffix(&self, text: &str, longest: bool) -> Option<usize> {
        let mut starts = boundaries(text);
        if !longest {
            starts.reverse();
        }
        starts.into_iter().find(|&start| self.matches(&text[start..]))
    }

    /// First (leftmost, then longest) non-empty match at or after `from`.
    pub fn find(&self, text: &str, from: usize) -> Option<(usize, usize)> {
        let bounds = boundaries(text);
        for &start in bounds.iter().filter(|&&b| b >= from) {
            let found = bounds
                .iter()
                .rev()
                .filter(|&&end| end > start)
                .find(|&&end| self.matches(&text[start..end]));
            if let Some(&end) = found {
                return Some((start, end));
            }
        }
        None
    }
}

/// Every char boundary of `text`, including 0 and `text.len()`.
fn boundaries(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}

/// Globber over the host file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsGlobber;

impl Globber for FsGlobber {
    fn glob(&self, pattern: &str, cwd: &Path) -> Vec<String> {
        let absolute = pattern.starts_with('/');
        // (path on disk, path as it will be printed)
        let mut candidates: Vec<(PathBuf, String)> = if absolute {
            vec![(PathBuf::from("/"), String::from("/"))]
        } else {
            vec![(cwd.to_path_buf(), String::new())]
        };

        let components: Vec<&str> = pattern.split('/').filter(|c| !c.is_empty()).collect();
        for (index, component) in components.iter().enumerate() {
            let last = index + 1 == components.len();
            let mut next = Vec::new();
            for (dir, shown) in &candidates {
                if has_glob_chars(component) {
                    next.extend(match_directory(dir, shown, component, last));
                } else {
                    let name = unescape(component);
                    let path = dir.join(&name);
                    if path.symlink_metadata().is_ok() {
                        next.push((path, join_shown(shown, &name)));
                    }
                }
            }
            candidates = next;
            if candidates.is_empty() {
                break;
            }
        }

        let mut matches: Vec<String> = candidates
            .into_iter()
            .map(|(_, shown)| shown)
            .filter(|shown| !shown.is_empty())
            .collect();
        matches.sort();
        trace!(pattern, count = matches.len(), "glob");
        matches
    }
}

fn match_directory(
    dir: &Path,
    shown: &str,
    component: &str,
    last: bool,
) -> Vec<(PathBuf, String)> {
    let Ok(regex) = Regex::new(&format!("^(?:{})$", translate(component, true))) else {
        return Vec::new();
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let show_hidden = component.starts_with('.');
    let mut found = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') && !show_hidden {
            continue;
        }
        if !regex.is_match(&name) {
            continue;
        }
        let path = entry.path();
        if !last && !path.is_dir() {
            continue;
        }
        found.push((path, join_shown(shown, &name)));
    }
    found
}

fn join_shown(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else if prefix.ends_with('/') {
        format!("{prefix}{name}")
    } else {
        format!("{prefix}/{name}")
    }
}
