//! read builtin - read a line of input

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExitStatus;

/// read builtin - read a line of input into variables
///
/// Input is consumed one byte at a time so that commands sharing the
/// same stdin (`while read line`) each see only their own lines. Fields
/// are split on `$IFS`; the last name receives the rest of the line.
/// With no names the whole line goes to `REPLY`. Reaching end of input
/// before a newline fails, even though the partial line is assigned.
pub struct Read;

#[async_trait]
impl Builtin for Read {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExitStatus> {
        let mut raw_mode = false;
        let mut names: Vec<&str> = Vec::new();
        for arg in ctx.args {
            match arg.as_str() {
                "-r" if names.is_empty() => raw_mode = true,
                name => names.push(name),
            }
        }
        if let Some(bad) = names
            .iter()
            .find(|name| !crate::parser::is_identifier(name))
        {
            return ctx.fail(format!("read: `{bad}': not a valid identifier")).await;
        }

        let (line, complete) = read_line(&ctx, raw_mode).await?;

        if names.is_empty() {
            ctx.shell.set_var("REPLY", line.clone())?;
        } else {
            let ifs = ctx.shell.ifs();
            let values = split_fields(&line, &ifs, names.len());
            for (name, value) in names.iter().zip(values) {
                ctx.shell.set_var(name, value)?;
            }
        }

        Ok(ExitStatus::from_bool(complete))
    }
}

/// Read up to a newline. The flag is false when input ended first.
///
/// Without `-r` a backslash quotes the next character and a
/// backslash-newline pair continues the line.
async fn read_line(ctx: &Context<'_>, raw_mode: bool) -> Result<(String, bool)> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    let mut escaped = false;
    loop {
        if ctx.stdin.read(&mut byte).await? == 0 {
            return Ok((String::from_utf8_lossy(&bytes).into_owned(), false));
        }
        match byte[0] {
            b'\n' if escaped => escaped = false,
            b'\n' => break,
            b'\\' if !raw_mode && !escaped => escaped = true,
            other => {
                escaped = false;
                bytes.push(other);
            }
        }
    }
    Ok((String::from_utf8_lossy(&bytes).into_owned(), true))
}

/// Split `line` into exactly `count` values.
fn split_fields(line: &str, ifs: &str, count: usize) -> Vec<String> {
    if ifs.is_empty() {
        let mut values = vec![line.to_string()];
        values.resize(count, String::new());
        return values;
    }
    let is_ifs = |c: char| ifs.contains(c);
    let is_ifs_space = |c: char| ifs.contains(c) && c.is_ascii_whitespace();

    let mut values = Vec::with_capacity(count);
    let mut rest = line.trim_matches(is_ifs_space);
    for index in 0..count {
        if index + 1 == count {
            values.push(rest.to_string());
            break;
        }
        let end = rest.find(is_ifs).unwrap_or(rest.len());
        values.push(rest[..end].to_string());
        rest = &rest[end..];
        // one separator: any amount of whitespace around at most one
        // non-whitespace IFS character
        rest = rest.trim_start_matches(is_ifs_space);
        if let Some(c) = rest.chars().next().filter(|c| is_ifs(*c)) {
            rest = rest[c.len_utf8()..].trim_start_matches(is_ifs_space);
        }
    }
    values
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ShellBuilder;

    #[test]
    fn test_split_fields() {
        assert_eq!(split_fields("  a b  c  ", " \t\n", 2), vec!["a", "b  c"]);
        assert_eq!(split_fields("a", " \t\n", 3), vec!["a", "", ""]);
        assert_eq!(split_fields("a:b::c", ":", 4), vec!["a", "b", "", "c"]);
        assert_eq!(split_fields("a b", "", 2), vec!["a b", ""]);
    }

    #[tokio::test]
    async fn test_read_into_names() {
        let mut shell = ShellBuilder::new().build();
        let result = shell
            .exec("echo 'one two three' | { read a b; echo \"$a|$b\"; }")
            .await
            .unwrap();
        assert_eq!(result.stdout, "one|two three\n");
    }

    #[tokio::test]
    async fn test_read_reply_and_raw() {
        let mut shell = ShellBuilder::new().build();
        let result = shell
            .exec("echo 'a\\b' | { read; echo \"$REPLY\"; }")
            .await
            .unwrap();
        assert_eq!(result.stdout, "ab\n");
        let result = shell
            .exec("echo 'a\\b' | { read -r line; echo \"$line\"; }")
            .await
            .unwrap();
        assert_eq!(result.stdout, "a\\b\n");
    }

    #[tokio::test]
    async fn test_read_loop_consumes_lines() {
        let mut shell = ShellBuilder::new().build();
        let result = shell
            .exec("for i in 1 2 3; do echo $i; done | while read n; do echo got$n; done")
            .await
            .unwrap();
        assert_eq!(result.stdout, "got1\ngot2\ngot3\n");
    }

    #[tokio::test]
    async fn test_read_eof() {
        let mut shell = ShellBuilder::new().build();
        let result = shell.exec("read v").await.unwrap();
        assert_eq!(result.exit_code, 1);
        let result = shell
            .exec("echo -n partial | { read v; echo $? $v; }")
            .await
            .unwrap();
        assert_eq!(result.stdout, "1 partial\n");
    }
}
