//! Parameter operators: `${name:off:len}`, `${name#pat}`, `${name/pat/rep}`
//! and case folding. These work on an already resolved value.
//!
//! A pattern without metacharacters is plain text: `#` strips it once and
//! `##` strips it as long as it keeps matching. With metacharacters the
//! usual shortest and longest match rules apply.

use crate::glob::Pattern;
use crate::parser::{FoldDirection, FoldScope, ReplaceMode, TrimSide};

/// Substring by character offset.
///
/// A negative offset counts from the end and is clamped to the start of
/// the string. A negative length stops that many characters before the
/// end. A zero length means the rest of the string, except at offset 0
/// where it selects nothing.
pub(super) fn slice(value: &str, offset: i64, length: Option<i64>) -> String {
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len() as i64;
    let start = if offset < 0 {
        len.saturating_add(offset).max(0)
    } else {
        offset.min(len)
    };
    let end = match length {
        None => len,
        Some(0) if offset == 0 => return String::new(),
        Some(0) => len,
        Some(l) if l > 0 => start.saturating_add(l).min(len),
        Some(l) => len.saturating_add(l),
    };
    if end <= start {
        return String::new();
    }
    chars[start as usize..end as usize].iter().collect()
}

pub(super) fn trim(value: &str, pattern: &Pattern, side: TrimSide, greedy: bool) -> String {
    if pattern.is_literal() {
        let literal = pattern.text();
        if literal.is_empty() {
            return value.to_string();
        }
        let strip = |s: &str| -> Option<usize> {
            match side {
                TrimSide::Prefix => s.strip_prefix(literal).map(|rest| s.len() - rest.len()),
                TrimSide::Suffix => s.strip_suffix(literal).map(|rest| rest.len()),
            }
        };
        let mut rest = value;
        while let Some(at) = strip(rest) {
            rest = match side {
                TrimSide::Prefix => &rest[at..],
                TrimSide::Suffix => &rest[..at],
            };
            if !greedy {
                break;
            }
        }
        return rest.to_string();
    }

    match side {
        TrimSide::Prefix => match pattern.match_prefix(value, greedy) {
            Some(end) => value[end..].to_string(),
            None => value.to_string(),
        },
        TrimSide::Suffix => match pattern.match_suffix(value, greedy) {
            Some(start) => value[..start].to_string(),
            None => value.to_string(),
        },
    }
}

pub(super) fn trim_all(
    values: Vec<String>,
    pattern: &str,
    side: TrimSide,
    greedy: bool,
) -> Vec<String> {
    let pattern = Pattern::new(pattern);
    values
        .iter()
        .map(|v| trim(v, &pattern, side, greedy))
        .collect()
}

pub(super) fn replace(value: &str, pattern: &Pattern, replacement: &str, mode: ReplaceMode) -> String {
    if pattern.is_literal() {
        let literal = pattern.text();
        if literal.is_empty() {
            return value.to_string();
        }
        return match mode {
            ReplaceMode::First => value.replacen(literal, replacement, 1),
            ReplaceMode::All => value.replace(literal, replacement),
            ReplaceMode::Prefix => match value.strip_prefix(literal) {
                Some(rest) => format!("{replacement}{rest}"),
                None => value.to_string(),
            },
            ReplaceMode::Suffix => match value.strip_suffix(literal) {
                Some(rest) => format!("{rest}{replacement}"),
                None => value.to_string(),
            },
        };
    }

    match mode {
        ReplaceMode::First => match pattern.find(value, 0) {
            Some((start, end)) => format!("{}{replacement}{}", &value[..start], &value[end..]),
            None => value.to_string(),
        },
        ReplaceMode::All => {
            let mut out = String::new();
            let mut from = 0;
            while let Some((start, end)) = pattern.find(value, from) {
                out.push_str(&value[from..start]);
                out.push_str(replacement);
                from = end;
            }
            out.push_str(&value[from..]);
            out
        }
        ReplaceMode::Prefix => match pattern.match_prefix(value, true) {
            Some(end) => format!("{replacement}{}", &value[end..]),
            None => value.to_string(),
        },
        ReplaceMode::Suffix => match pattern.match_suffix(value, true) {
            Some(start) => format!("{}{replacement}", &value[..start]),
            None => value.to_string(),
        },
    }
}

pub(super) fn replace_all(
    values: Vec<String>,
    pattern: &str,
    replacement: &str,
    mode: ReplaceMode,
) -> Vec<String> {
    let pattern = Pattern::new(pattern);
    values
        .iter()
        .map(|v| replace(v, &pattern, replacement, mode))
        .collect()
}

pub(super) fn fold(value: &str, scope: FoldScope, direction: FoldDirection) -> String {
    let convert = |s: &str| match direction {
        FoldDirection::Upper => s.to_uppercase(),
        FoldDirection::Lower => s.to_lowercase(),
    };
    match scope {
        FoldScope::All => convert(value),
        FoldScope::First => {
            let mut chars = value.chars();
            match chars.next() {
                Some(first) => {
                    let mut out = convert(first.encode_utf8(&mut [0; 4]));
                    out.push_str(chars.as_str());
                    out
                }
                None => String::new(),
            }
        }
    }
}
