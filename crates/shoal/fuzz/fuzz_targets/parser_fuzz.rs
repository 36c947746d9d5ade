//! Fuzz target for the parser
//!
//! Any input must either parse or produce a syntax error, never panic or
//! recurse without bound.
//!
//! Run with: cargo +nightly fuzz run parser_fuzz -- -max_total_time=300

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if input.len() > 10_000 {
            return;
        }
        let _ = shoal::Parser::new(input).parse();
    }
});
