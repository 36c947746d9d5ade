//! End-to-end script tests
//!
//! Each test runs a script through `Shell::exec` and checks the captured
//! streams and exit code.

use pretty_assertions::assert_eq;
use shoal::{Error, Shell};

async fn run(script: &str) -> shoal::ExecResult {
    Shell::new().exec(script).await.unwrap()
}

#[tokio::test]
async fn quoted_word_is_one_field() {
    let result = run("for x in \"a b\"; do echo \"<$x>\"; done").await;
    assert_eq!(result.stdout, "<a b>\n");
    let result = run("for x in a b; do echo \"<$x>\"; done").await;
    assert_eq!(result.stdout, "<a>\n<b>\n");
}

#[tokio::test]
async fn slice_from_end_and_past_end() {
    let result = run("s=0123456789ABCDEF; echo ${s: -6}; echo \"[${s:20}]\"; echo ${s:2:3}").await;
    assert_eq!(result.stdout, "ABCDEF\n[]\n234\n");
}

#[tokio::test]
async fn slice_clamps_offset_and_zero_length_runs_to_end() {
    let result = run("s=0123456789ABCDEF; echo \"[${s: -30}]\"; echo \"[${s: -6:0}]\"; echo \"[${s:0:0}]\"; echo \"[${s:21:0}]\"").await;
    assert_eq!(result.stdout, "[0123456789ABCDEF]\n[ABCDEF]\n[]\n[]\n");
}

#[tokio::test]
async fn trim_prefix_shortest_and_longest() {
    let result = run("s=FOOFOOBAR; echo ${s#FOO} ${s##FOO}; f=a.tar.gz; echo ${f%.*} ${f%%.*}").await;
    assert_eq!(result.stdout, "FOOBAR BAR\na.tar a\n");
}

#[tokio::test]
async fn brace_product() {
    let result = run("echo {A,B}{1,2}").await;
    assert_eq!(result.stdout, "A1 A2 B1 B2\n");
}

#[tokio::test]
async fn arithmetic_precedence() {
    let result = run("echo $((1+2*3)) $((2**3*2)) $(( (1+2) * 3 ))").await;
    assert_eq!(result.stdout, "7 16 9\n");
}

#[tokio::test]
async fn arithmetic_assignment_persists() {
    let result = run("n=1; while [[ $n -lt 4 ]]; do echo $n; : $((n += 1)); done").await;
    assert_eq!(result.stdout, "1\n2\n3\n");
}

#[tokio::test]
async fn division_by_zero_is_an_error() {
    let err = Shell::new().exec("echo $((1 / 0))").await.unwrap_err();
    assert_eq!(err.to_string(), "division by zero");
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn pipeline_status_is_last_stage() {
    let result = run("false | true").await;
    assert!(result.is_success());
    let result = run("true | false; echo $?").await;
    assert_eq!(result.stdout, "1\n");
}

#[tokio::test]
async fn and_short_circuits() {
    let result = run("false && echo sideeffect; true || echo other").await;
    assert_eq!(result.stdout, "");
    assert_eq!(result.exit_code, 0);
}

#[tokio::test]
async fn for_else_runs_once_on_empty_list() {
    let result = run("for x in ; do echo $x; else echo empty; done").await;
    assert_eq!(result.stdout, "empty\n");
}

#[tokio::test]
async fn unterminated_quote_is_a_lex_error() {
    let err = Shell::new().exec("echo \"unterminated").await.unwrap_err();
    assert!(matches!(err, Error::Lex(_)));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn nested_control_flow() {
    let script = r#"
for i in 1 2 3 4; do
    case $i in
        1) echo one ;;
        2|3) if [[ $i == 2 ]]; then echo two; else continue; fi ;;
        *) break ;;
    esac
    echo "after $i"
done
"#;
    let result = run(script).await;
    assert_eq!(result.stdout, "one\nafter 1\ntwo\nafter 2\n");
}

#[tokio::test]
async fn case_with_glob_patterns() {
    let script = r#"
for f in main.rs notes.txt Makefile; do
    case $f in
        *.rs) echo "$f: rust" ;;
        *.txt|*.md) echo "$f: text" ;;
        *) echo "$f: other" ;;
    esac
done
"#;
    let result = run(script).await;
    assert_eq!(
        result.stdout,
        "main.rs: rust\nnotes.txt: text\nMakefile: other\n"
    );
}

#[tokio::test]
async fn subshell_and_group() {
    let result = run("x=outer; (x=inner; echo $x); echo $x; { x=group; }; echo $x").await;
    assert_eq!(result.stdout, "inner\nouter\ngroup\n");
}

#[tokio::test]
async fn command_substitution_nesting() {
    let result = run("echo $(echo a $(echo b $(echo c)))").await;
    assert_eq!(result.stdout, "a b c\n");
    let result = run("x=$(printf_missing 2>&1); echo \"$?\"").await;
    assert_eq!(result.stdout, "127\n");
}

#[tokio::test]
async fn test_expressions() {
    let script = r#"
v=hello
[[ -n $v && $v == h* ]] && echo glob
[[ $v != world ]] && echo differ
[[ ! -z $v ]] && echo nonempty
[[ 10 -gt 9 ]] && echo numeric
[[ abc < abd ]] && echo ordered
re='^h(el)+o$'
[[ $v =~ $re ]] && echo regex
[[ -z $missing || $v == x ]] && echo either
"#;
    let result = run(script).await;
    assert_eq!(
        result.stdout,
        "glob\ndiffer\nnonempty\nnumeric\nordered\nregex\neither\n"
    );
}

#[tokio::test]
async fn parameter_case_and_replace() {
    let result = run("s='hello world'; echo ${s^^} ${s^} ${s//o/0} ${s/#hello/bye}; echo ${#s}").await;
    assert_eq!(result.stdout, "HELLO WORLD Hello world hell0 w0rld bye world\n11\n");
}

#[tokio::test]
async fn error_if_unset_stops_the_script() {
    let mut shell = Shell::new();
    let err = shell
        .exec("echo before; echo ${nope:?must be set}; echo after")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "nope: must be set");
}

#[tokio::test]
async fn until_loop_and_break() {
    let result = run("i=0; until [[ $i -ge 3 ]]; do i=$((i + 1)); echo $i; done").await;
    assert_eq!(result.stdout, "1\n2\n3\n");
    let result = run("while true; do echo once; break; done").await;
    assert_eq!(result.stdout, "once\n");
}

#[tokio::test]
async fn stderr_is_captured_separately() {
    let result = run("echo out; missing-cmd-xyz; echo err 1>&2").await;
    assert_eq!(result.stdout, "out\n");
    assert_eq!(
        result.stderr,
        "missing-cmd-xyz: command not found\nerr\n"
    );
}

#[tokio::test]
async fn arithmetic_short_circuit_skips_substitution() {
    let dir = tempfile::tempdir().unwrap();
    let mut shell = Shell::builder().cwd(dir.path()).build();
    let result = shell
        .exec("echo $(( 0 && $(echo 1 > side.txt; echo 1) )); [[ -e side.txt ]] && echo ran")
        .await
        .unwrap();
    assert_eq!(result.stdout, "0\n");
    assert!(!dir.path().join("side.txt").exists());

    let result = shell
        .exec("echo $(( 1 ? 5 : $(echo 1 > other.txt; echo 2) ))")
        .await
        .unwrap();
    assert_eq!(result.stdout, "5\n");
    assert!(!dir.path().join("other.txt").exists());
}
