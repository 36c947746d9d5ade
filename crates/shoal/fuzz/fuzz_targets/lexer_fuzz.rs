//! Fuzz target for the lexer
//!
//! Drains the token stream of arbitrary input, including the nested
//! modes entered by quotes, `$(`, `${` and `[[`.
//!
//! Run with: cargo +nightly fuzz run lexer_fuzz -- -max_total_time=300

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if input.len() > 10_000 {
            return;
        }
        let script = format!("echo \"{input}\" ${{x:-{input}}} [[ {input} ]]");
        let _ = shoal::Parser::new(&script).parse();
    }
});
