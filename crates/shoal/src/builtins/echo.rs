//! echo builtin command

use async_trait::async_trait;

use super::{Builtin, Context};
use crate::error::Result;
use crate::interpreter::ExitStatus;

/// The echo builtin command.
///
/// Leading `-n`, `-e` and `-E` arguments are options; the first argument
/// that is not one of them ends option parsing.
pub struct Echo;

#[async_trait]
impl Builtin for Echo {
    async fn execute(&self, ctx: Context<'_>) -> Result<ExitStatus> {
        let mut add_newline = true;
        let mut interpret_escapes = false;
        let mut args_iter = ctx.args.iter().peekable();

        while let Some(arg) = args_iter.peek() {
            match arg.as_str() {
                "-n" => add_newline = false,
                "-e" => interpret_escapes = true,
                "-E" => interpret_escapes = false,
                _ => break,
            }
            args_iter.next();
        }

        let mut output = String::new();
        let mut stopped = false;
        for (i, arg) in args_iter.enumerate() {
            if i > 0 {
                output.push(' ');
            }
            if interpret_escapes {
                let (text, stop) = interpret_escape_sequences(arg);
                output.push_str(&text);
                if stop {
                    stopped = true;
                    break;
                }
            } else {
                output.push_str(arg);
            }
        }

        if add_newline && !stopped {
            output.push('\n');
        }
        ctx.stdout.write_str(&output).await?;
        Ok(ExitStatus::SUCCESS)
    }
}

/// Expand backslash escapes. The flag is set when `\c` cut the output short.
fn interpret_escape_sequences(s: &str) -> (String, bool) {
    let mut result = String::new();
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('\\') => result.push('\\'),
            Some('a') => result.push('\x07'),
            Some('b') => result.push('\x08'),
            Some('e') => result.push('\x1b'),
            Some('f') => result.push('\x0c'),
            Some('v') => result.push('\x0b'),
            Some('0') => result.push(char::from(take_digits(&mut chars, 8, 3))),
            Some('x') => result.push(char::from(take_digits(&mut chars, 16, 2))),
            Some('c') => return (result, true),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    (result, false)
}

/// Consume up to `max` digits in `radix`, wrapping into a byte.
fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, radix: u32, max: usize) -> u8 {
    let mut value: u32 = 0;
    for _ in 0..max {
        match chars.peek().and_then(|c| c.to_digit(radix)) {
            Some(digit) => {
                value = value * radix + digit;
                chars.next();
            }
            None => break,
        }
    }
    (value & 0xff) as u8
}
