//! Word expansion
//!
//! Turning a parsed [`Word`] into argument strings happens in this order:
//!
//! 1. brace expansion, producing one word per alternative
//! 2. parameter, arithmetic and command substitution, left to right
//! 3. field splitting of unquoted results on `IFS`
//! 4. file name generation for unquoted pattern characters
//!
//! Assignment values, case words and `[[ ]]` operands use
//! [`Shell::expand_single`], which stops after step 2.

mod arith;
mod param;
mod test;

pub use arith::evaluate;

use futures_util::future::BoxFuture;
use tracing::trace;

use crate::error::{ExpansionError, Result};
use crate::glob::{escape, has_glob_chars};
use crate::io::{Capture, Io};
use crate::parser::{DefaultKind, Expander, Script, Word};
use crate::shell::{Environment, Shell};

const PARAMETER_NOT_SET: &str = "parameter null or not set";

#[derive(Debug, Default)]
struct Field {
    text: String,
    /// Same text with quoted characters escaped, for globbing
    pattern: String,
    /// Has unquoted pattern characters
    glob: bool,
}

/// Collects expansion results into fields.
struct FieldBuilder {
    ifs: String,
    split: bool,
    done: Vec<Field>,
    current: Option<Field>,
}

impl FieldBuilder {
    fn new(ifs: String, split: bool) -> Self {
        Self {
            ifs,
            split,
            done: Vec::new(),
            current: None,
        }
    }

    /// Append text to the current field. Quoted text, even empty, always
    /// makes the field exist.
    fn push(&mut self, text: &str, quoted: bool) {
        if text.is_empty() && !quoted {
            return;
        }
        let field = self.current.get_or_insert_with(Field::default);
        field.text.push_str(text);
        if quoted {
            field.pattern.push_str(&escape(text));
        } else {
            field.pattern.push_str(text);
            field.glob |= has_glob_chars(text);
        }
    }

    /// Append an unquoted expansion result, splitting it on `IFS`.
    fn push_split(&mut self, text: &str) {
        if !self.split || self.ifs.is_empty() {
            self.push(text, false);
            return;
        }
        let mut piece = String::new();
        let mut after_whitespace = false;
        for ch in text.chars() {
            if !self.ifs.contains(ch) {
                piece.push(ch);
                after_whitespace = false;
                continue;
            }
            self.push(&piece, false);
            piece.clear();
            if matches!(ch, ' ' | '\t' | '\n') {
                self.end_field();
                after_whitespace = true;
            } else {
                if !(after_whitespace && self.current.is_none()) {
                    self.current.get_or_insert_with(Field::default);
                    self.end_field();
                }
                after_whitespace = false;
            }
        }
        self.push(&piece, false);
    }

    fn push_value(&mut self, text: &str, quoted: bool) {
        if quoted {
            self.push(text, true);
        } else {
            self.push_split(text);
        }
    }

    /// Append the fields of a variable.
    fn push_values(&mut self, values: Option<Vec<String>>, quoted: bool) {
        match values {
            None => {
                if quoted {
                    self.push("", true);
                }
            }
            Some(values) if quoted => self.push(&values.join(" "), true),
            Some(values) => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.separate();
                    }
                    self.push_split(value);
                }
            }
        }
    }

    /// Boundary between two values of a multi-field variable.
    fn separate(&mut self) {
        if self.split {
            self.end_field();
        } else {
            self.push(" ", true);
        }
    }

    fn end_field(&mut self) {
        if let Some(field) = self.current.take() {
            self.done.push(field);
        }
    }

    fn finish(mut self) -> Vec<Field> {
        self.end_field();
        self.done
    }
}

/// Alternative part lists of a word after brace expansion, in order.
fn brace_variants(parts: &[Expander]) -> Vec<Vec<Expander>> {
    let mut variants: Vec<Vec<Expander>> = vec![Vec::new()];
    for part in parts {
        let alternatives: Vec<Vec<Expander>> = match part {
            Expander::ListBrace { alternatives } => alternatives
                .iter()
                .flat_map(|alt| brace_variants(&alt.parts))
                .collect(),
            Expander::RangeBrace {
                from,
                to,
                step,
                width,
            } => range_values(*from, *to, *step, *width)
                .into_iter()
                .map(|text| vec![Expander::Literal { text, quoted: false }])
                .collect(),
            other => {
                for variant in &mut variants {
                    variant.push(other.clone());
                }
                continue;
            }
        };
        variants = variants
            .iter()
            .flat_map(|prefix| {
                alternatives.iter().map(move |alt| {
                    let mut variant = prefix.clone();
                    variant.extend(alt.iter().cloned());
                    variant
                })
            })
            .collect();
    }
    variants
}

/// `{from..to..step}` values; the direction follows `from` and `to`.
fn range_values(from: i64, to: i64, step: i64, width: usize) -> Vec<String> {
    let step = step.checked_abs().unwrap_or(i64::MAX).max(1);
    let mut values = Vec::new();
    let mut n = from;
    loop {
        if (from <= to && n > to) || (from > to && n < to) {
            break;
        }
        values.push(format!("{n:0width$}"));
        let next = if from <= to {
            n.checked_add(step)
        } else {
            n.checked_sub(step)
        };
        match next {
            Some(next) => n = next,
            None => break,
        }
    }
    values
}

impl Shell {
    /// Expand command words into argument fields.
    pub async fn expand_words(&mut self, words: &[Word], io: &Io) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for word in words {
            out.extend(self.expand_word(word, io).await?);
        }
        Ok(out)
    }

    /// Fully expand one word: braces, substitutions, splitting, globbing.
    pub async fn expand_word(&mut self, word: &Word, io: &Io) -> Result<Vec<String>> {
        let mut out = Vec::new();
        if word.has_brace() {
            for variant in brace_variants(&word.parts) {
                self.expand_variant(&variant, io, &mut out).await?;
            }
        } else {
            self.expand_variant(&word.parts, io, &mut out).await?;
        }
        trace!(word = %word, fields = out.len(), "expanded word");
        Ok(out)
    }

    async fn expand_variant(
        &mut self,
        parts: &[Expander],
        io: &Io,
        out: &mut Vec<String>,
    ) -> Result<()> {
        let mut fields = FieldBuilder::new(self.ifs(), true);
        self.expand_parts(parts, &mut fields, io).await?;
        for field in fields.finish() {
            if field.glob {
                let matches = self.globber.glob(&field.pattern, self.cwd());
                if !matches.is_empty() {
                    out.extend(matches);
                    continue;
                }
            }
            out.push(field.text);
        }
        Ok(())
    }

    /// Expand a word to exactly one string without splitting or globbing.
    pub async fn expand_single(&mut self, word: &Word, io: &Io) -> Result<String> {
        Ok(self.expand_unsplit(word, io).await?.text)
    }

    /// Like [`Shell::expand_single`], keeping quoted characters escaped
    /// for pattern matching.
    pub(crate) async fn expand_pattern(&mut self, word: &Word, io: &Io) -> Result<String> {
        Ok(self.expand_unsplit(word, io).await?.pattern)
    }

    async fn expand_unsplit(&mut self, word: &Word, io: &Io) -> Result<Field> {
        let mut fields = FieldBuilder::new(self.ifs(), false);
        self.expand_parts(&word.parts, &mut fields, io).await?;
        Ok(fields.finish().into_iter().next().unwrap_or_default())
    }

    /// Expand a word that must yield exactly one field, such as a
    /// redirection target.
    pub async fn expand_exactly_one(&mut self, word: &Word, io: &Io) -> Result<String> {
        let mut fields = self.expand_word(word, io).await?;
        if fields.len() != 1 {
            return Err(ExpansionError::FieldCount {
                word: word.to_string(),
                count: fields.len(),
            }
            .into());
        }
        Ok(fields.remove(0))
    }

    fn expand_parts<'a>(
        &'a mut self,
        parts: &'a [Expander],
        fields: &'a mut FieldBuilder,
        io: &'a Io,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for part in parts {
                self.expand_part(part, fields, io).await?;
            }
            Ok(())
        })
    }

    async fn expand_part(
        &mut self,
        part: &Expander,
        fields: &mut FieldBuilder,
        io: &Io,
    ) -> Result<()> {
        match part {
            Expander::Literal { text, quoted } => fields.push(text, *quoted),
            Expander::Variable { name, quoted } => {
                let value = self.resolve(name);
                fields.push_values(value, *quoted);
            }
            Expander::Length { name, quoted } => {
                let length = self
                    .resolve(name)
                    .and_then(|fields| fields.first().map(|f| f.chars().count()))
                    .unwrap_or(0);
                fields.push(&length.to_string(), *quoted);
            }
            Expander::Slice {
                name,
                offset,
                length,
                quoted,
            } => {
                let value = self.var(name).unwrap_or_default();
                let offset = self.eval_arith(offset, io).await?;
                let length = match length {
                    Some(expr) => Some(self.eval_arith(expr, io).await?),
                    None => None,
                };
                fields.push_value(&param::slice(&value, offset, length), *quoted);
            }
            Expander::Trim {
                name,
                pattern,
                side,
                greedy,
                quoted,
            } => {
                let pattern = self.expand_pattern(pattern, io).await?;
                let values = self
                    .resolve(name)
                    .map(|v| param::trim_all(v, &pattern, *side, *greedy));
                fields.push_values(values, *quoted);
            }
            Expander::Replace {
                name,
                pattern,
                replacement,
                mode,
                quoted,
            } => {
                let pattern = self.expand_pattern(pattern, io).await?;
                let replacement = self.expand_single(replacement, io).await?;
                let values = self
                    .resolve(name)
                    .map(|v| param::replace_all(v, &pattern, &replacement, *mode));
                fields.push_values(values, *quoted);
            }
            Expander::CaseFold {
                name,
                scope,
                direction,
                quoted,
            } => {
                let values = self.resolve(name).map(|v| {
                    v.iter()
                        .map(|s| param::fold(s, *scope, *direction))
                        .collect()
                });
                fields.push_values(values, *quoted);
            }
            Expander::Default {
                name,
                kind,
                colon,
                word,
                quoted,
            } => {
                self.expand_default(name, *kind, *colon, word, *quoted, fields, io)
                    .await?;
            }
            // braces left inside a context that is not brace expanded
            Expander::ListBrace { .. } | Expander::RangeBrace { .. } => {
                fields.push(&part.to_string(), false);
            }
            Expander::Arithmetic { expr, quoted } => {
                let value = self.eval_arith(expr, io).await?;
                fields.push_value(&value.to_string(), *quoted);
            }
            Expander::CommandSubst { script, quoted } => {
                let output = self.substitute(script, io).await?;
                fields.push_value(&output, *quoted);
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn expand_default(
        &mut self,
        name: &str,
        kind: DefaultKind,
        colon: bool,
        word: &Word,
        quoted: bool,
        fields: &mut FieldBuilder,
        io: &Io,
    ) -> Result<()> {
        let value = self.resolve(name);
        let is_set = match &value {
            None => false,
            Some(values) => !colon || values.iter().any(|v| !v.is_empty()),
        };
        match kind {
            DefaultKind::Use if is_set => fields.push_values(value, quoted),
            DefaultKind::Use => self.expand_alternative(word, quoted, fields, io).await?,
            DefaultKind::Assign if is_set => fields.push_values(value, quoted),
            DefaultKind::Assign => {
                let assigned = self.expand_single(word, io).await?;
                self.define(name, vec![assigned.clone()])?;
                fields.push_value(&assigned, quoted);
            }
            DefaultKind::Alternate if is_set => {
                self.expand_alternative(word, quoted, fields, io).await?
            }
            DefaultKind::Alternate => {
                if quoted {
                    fields.push("", true);
                }
            }
            DefaultKind::Error if is_set => fields.push_values(value, quoted),
            DefaultKind::Error => {
                let message = self.expand_single(word, io).await?;
                let message = if message.is_empty() {
                    PARAMETER_NOT_SET.to_string()
                } else {
                    message
                };
                return Err(ExpansionError::Unset {
                    name: name.to_string(),
                    message,
                }
                .into());
            }
        }
        Ok(())
    }

    /// The word operand of `${name:-word}` and `${name:+word}`.
    async fn expand_alternative(
        &mut self,
        word: &Word,
        quoted: bool,
        fields: &mut FieldBuilder,
        io: &Io,
    ) -> Result<()> {
        if quoted {
            let text = self.expand_single(word, io).await?;
            fields.push(&text, true);
            Ok(())
        } else {
            self.expand_parts(&word.parts, fields, io).await
        }
    }

    /// Run `$( script )` in a child shell and return its output without
    /// trailing newlines.
    pub(crate) async fn substitute(&mut self, script: &Script, io: &Io) -> Result<String> {
        let mut child = self.subshell()?;
        let capture = Capture::new();
        let sub_io = io.with_stdout(capture.handle());
        let status = child.run_script(script, &sub_io).await?;
        drop(sub_io);

        self.subst_status = Some(status);
        self.last.status = status;

        let mut output = capture.text();
        let end = output.trim_end_matches('\n').len();
        output.truncate(end);
        trace!(%status, bytes = output.len(), "command substitution");
        Ok(output)
    }
}
