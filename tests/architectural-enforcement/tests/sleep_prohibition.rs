//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Client code MUST NOT call sleep methods. Work waits on the
//! remote call or on a completion channel, never on the clock.
//! **Exception**: the session recovery timer in `manager.rs`, which exists
//! to wait a fixed delay before binding a replacement session.
//! Test modules are not checked.

use architectural_enforcement::{cli_src, core_src, rust_sources, SourceFile};

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_outside_recovery_timer() {
    let mut violations = Vec::new();
    for file in rust_sources(&core_src())
        .iter()
        .chain(rust_sources(&cli_src()).iter())
    {
        find_sleep_violations(file, &mut violations);
    }

    if !violations.is_empty() {
        eprintln!("\n❌ Sleep calls found in client code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ ACCEPTABLE: the recovery timer in manager.rs");
        eprintln!("❌ FORBIDDEN: polling loops, sleeping to wait for a reply");

        panic!("\nFound {} sleep violation(s).", violations.len());
    }
}

/// The recovery timer itself must still be there
#[test]
fn test_recovery_timer_uses_tokio_sleep() {
    let manager = rust_sources(&core_src())
        .into_iter()
        .find(|file| file.is("manager.rs"))
        .expect("manager.rs exists");

    let sleeps = manager
        .code_lines()
        .filter(|(_, code)| code.contains("tokio::time::sleep("))
        .count();
    assert_eq!(sleeps, 1, "expected exactly one recovery sleep");
}

fn find_sleep_violations(file: &SourceFile, violations: &mut Vec<String>) {
    let lines: Vec<&str> = file.code_lines().map(|(_, code)| code).collect();

    for (idx, code) in lines.iter().enumerate() {
        if !(code.contains("::sleep(") || code.contains(".sleep(")) {
            continue;
        }
        if file.is("manager.rs") && is_recovery_context(&lines, idx) {
            continue;
        }
        violations.push(format!(
            "{}:{} - {}",
            file.path.display(),
            idx + 1,
            code.trim()
        ));
    }
}

/// Check if sleep sits inside the recovery timer
fn is_recovery_context(lines: &[&str], current_idx: usize) -> bool {
    let context_range = current_idx.saturating_sub(25)..current_idx;
    lines[context_range]
        .iter()
        .any(|line| line.contains("fn begin_recovery"))
}
