//! What the interpreter is allowed to put in its logs
//!
//! Shoal logs through `tracing` (`warn` for failed spawns and limits,
//! `debug` for dispatch and assignments, `trace` for expansion and
//! redirection wiring). Anything derived from a script passes through
//! [`LogConfig`] first: `export API_TOKEN=...` must not land in a debug log.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

const REDACTED: &str = "[REDACTED]";

/// Name fragments that mark a variable as sensitive.
const SENSITIVE_NAMES: &[&str] = &[
    "PASSWORD",
    "PASSWD",
    "SECRET",
    "TOKEN",
    "KEY",
    "CREDENTIAL",
    "AUTH",
    "COOKIE",
    "SESSION",
    "DATABASE_URL",
];

/// Values that look like credentials whatever they are stored in: vendor
/// key prefixes and three-segment JWTs.
static SECRET_VALUE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:sk|pk)[-_][A-Za-z0-9_-]{10,}",
        r"|^gh[pousr]_[A-Za-z0-9]{10,}",
        r"|^xox[abp]-[A-Za-z0-9-]{10,}",
        r"|^AKIA[A-Z0-9]{12,}",
        r"|^[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,}$",
    ))
    .ok()
});

/// Redaction and truncation settings for log output.
#[derive(Debug, Clone)]
pub struct LogConfig {
    redact: bool,
    /// Upper-cased name fragments, matched as substrings
    names: Vec<String>,
    scripts: bool,
    max_len: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            redact: true,
            names: SENSITIVE_NAMES.iter().map(|s| s.to_string()).collect(),
            scripts: false,
            max_len: 200,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log every value as is. Only for trusted debugging sessions.
    pub fn unsafe_disable_redaction(mut self) -> Self {
        self.redact = false;
        self
    }

    /// Also treat variables whose name contains `fragment` as sensitive.
    pub fn redact_name(mut self, fragment: &str) -> Self {
        self.names.push(fragment.to_uppercase());
        self
    }

    /// Log script text instead of a size summary.
    pub fn unsafe_log_scripts(mut self) -> Self {
        self.scripts = true;
        self
    }

    /// Longest value logged before it is cut short.
    pub fn max_value_length(mut self, len: usize) -> Self {
        self.max_len = len;
        self
    }

    pub fn should_redact_name(&self, name: &str) -> bool {
        let upper = name.to_uppercase();
        self.redact && self.names.iter().any(|fragment| upper.contains(fragment.as_str()))
    }

    /// Loggable form of the value assigned to `name`.
    pub fn assignment<'a>(&self, name: &str, value: &'a str) -> Cow<'a, str> {
        if self.should_redact_name(name) {
            Cow::Borrowed(REDACTED)
        } else {
            self.redact_value(value)
        }
    }

    pub fn redact_value<'a>(&self, value: &'a str) -> Cow<'a, str> {
        let secret = SECRET_VALUE
            .as_ref()
            .is_some_and(|re| re.is_match(value.trim()));
        if self.redact && secret {
            Cow::Borrowed(REDACTED)
        } else {
            self.truncate(value)
        }
    }

    /// Loggable form of a whole script.
    pub fn script(&self, script: &str) -> String {
        if !self.scripts {
            return format!("<{} lines, {} bytes>", script.lines().count(), script.len());
        }
        let flat = escape_control(script);
        self.truncate(&flat).into_owned()
    }

    fn truncate<'a>(&self, value: &'a str) -> Cow<'a, str> {
        if value.len() <= self.max_len {
            return Cow::Borrowed(value);
        }
        let end = (0..=self.max_len)
            .rev()
            .find(|&i| value.is_char_boundary(i))
            .unwrap_or(0);
        Cow::Owned(format!("{}... ({} more bytes)", &value[..end], value.len() - end))
    }
}

/// One log line per record: line breaks become escapes, other control
/// characters are dropped.
fn escape_control(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}
