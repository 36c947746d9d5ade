//! Registering custom builtins
//!
//! Run with: cargo run --example custom_builtins

use shoal::{async_trait, Builtin, Context, ExitStatus, Shell};

/// Counts the words on stdin.
struct WordCount;

#[async_trait]
impl Builtin for WordCount {
    async fn execute(&self, ctx: Context<'_>) -> shoal::Result<ExitStatus> {
        let input = ctx.stdin.read_to_end().await?;
        let words = String::from_utf8_lossy(&input).split_whitespace().count();
        ctx.stdout.write_str(&format!("{words}\n")).await?;
        Ok(ExitStatus::SUCCESS)
    }
}

/// Sets `$GREETING` in the calling shell.
struct Greet;

#[async_trait]
impl Builtin for Greet {
    async fn execute(&self, ctx: Context<'_>) -> shoal::Result<ExitStatus> {
        let Some(name) = ctx.args.first() else {
            return ctx.fail("greet: missing name").await;
        };
        ctx.shell.set_var("GREETING", format!("Hello, {name}!"))?;
        Ok(ExitStatus::SUCCESS)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut shell = Shell::builder()
        .builtin("words", Box::new(WordCount))
        .builtin("greet", Box::new(Greet))
        .build();

    let result = shell.exec("echo one two three | words").await?;
    println!("words: {}", result.stdout.trim());

    let result = shell.exec("greet shoal && echo \"$GREETING\"").await?;
    println!("{}", result.stdout.trim());

    let result = shell.exec("greet").await?;
    println!("status {}: {}", result.exit_code, result.stderr.trim());

    Ok(())
}
