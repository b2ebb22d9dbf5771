//! Integration Test: Layering
//!
//! **Policy**:
//! - Only `backend/http.rs` may name reqwest; everything else talks to the
//!   service through `RemoteService`.
//! - Pure interpretation modules (classifier, payloads, fallback answers,
//!   session and log types, document checks) must not touch the runtime.

use architectural_enforcement::{cli_src, core_src, rust_sources};

const PURE_MODULES: &[&str] = &[
    "classifier.rs",
    "payload.rs",
    "fallback.rs",
    "session.rs",
    "conversation.rs",
    "documents/library.rs",
    "documents/upload.rs",
    "documents/delete.rs",
];

#[test]
fn test_reqwest_only_in_http_adapter() {
    let offenders: Vec<String> = rust_sources(&core_src())
        .iter()
        .chain(rust_sources(&cli_src()).iter())
        .filter(|file| !file.is("backend/http.rs"))
        .flat_map(|file| {
            file.code_lines()
                .filter(|(_, code)| code.contains("reqwest"))
                .map(|(line, code)| format!("{}:{line} - {}", file.path.display(), code.trim()))
                .collect::<Vec<_>>()
        })
        .collect();

    assert!(
        offenders.is_empty(),
        "reqwest used outside the HTTP adapter:\n{}",
        offenders.join("\n")
    );
}

#[test]
fn test_pure_modules_do_not_use_the_runtime() {
    let sources = rust_sources(&core_src());
    let mut offenders = Vec::new();

    for module in PURE_MODULES {
        let file = sources
            .iter()
            .find(|file| file.is(module))
            .unwrap_or_else(|| panic!("{module} exists"));

        for (line, code) in file.code_lines() {
            if code.contains("tokio") || code.contains("reqwest") {
                offenders.push(format!("{module}:{line} - {}", code.trim()));
            }
        }
    }

    assert!(
        offenders.is_empty(),
        "runtime used in pure modules:\n{}",
        offenders.join("\n")
    );
}

#[test]
fn test_cli_goes_through_core() {
    let sources = rust_sources(&cli_src());
    assert!(!sources.is_empty(), "cli sources found");

    let uses_core = sources
        .iter()
        .any(|file| file.code_lines().any(|(_, code)| code.contains("edubot_core")));
    assert!(uses_core);
}
