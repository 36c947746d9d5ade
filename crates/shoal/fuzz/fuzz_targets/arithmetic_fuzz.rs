//! Fuzz target for arithmetic expansion
//!
//! This target tests arithmetic parsing and evaluation to find:
//! - overflow that panics instead of wrapping
//! - division or remainder by zero that is not reported
//! - stack exhaustion on deeply nested expressions
//!
//! Run with: cargo +nightly fuzz run arithmetic_fuzz -- -max_total_time=300

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if input.len() > 10_000 {
            return;
        }

        let script = format!("echo $(({input}))");
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let mut shell = shoal::Shell::builder()
                .limits(shoal::ExecutionLimits::new().max_commands(100))
                .build();
            // errors are fine, panics are not
            let _ = shell.exec(&script).await;
        });
    }
});
