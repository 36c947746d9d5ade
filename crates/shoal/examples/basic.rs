//! Basic shoal usage example
//!
//! Run with: cargo run --example basic

use shoal::Shell;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut shell = Shell::new();

    let result = shell.exec("echo 'Hello, shoal!'").await?;
    println!("Output: {}", result.stdout);

    // Variable assignment and expansion
    let result = shell.exec("NAME=World; echo \"Hello, $NAME!\"").await?;
    println!("Output: {}", result.stdout);

    // Pipelines between builtins
    let result = shell
        .exec("echo -e 'apple\\nbanana\\ncherry' | while read fruit; do echo \"* $fruit\"; done")
        .await?;
    println!("Listed:\n{}", result.stdout);

    // Command substitution and parameter operators
    let result = shell
        .exec("file=$(echo report.tar.gz); echo \"${file%%.*} (${#file} chars)\"")
        .await?;
    println!("Output: {}", result.stdout);

    // Arithmetic
    let result = shell.exec("echo \"2 ** 10 = $((2 ** 10))\"").await?;
    println!("Output: {}", result.stdout);

    // Control flow, including the loop else branch
    let script = r#"
        for fruit in {apple,banana}; do
            case $fruit in
                a*) echo "$fruit starts with a" ;;
                *) echo "I like $fruit" ;;
            esac
        else
            echo "no fruit"
        done
    "#;
    let result = shell.exec(script).await?;
    println!("Loop output:\n{}", result.stdout);

    Ok(())
}
