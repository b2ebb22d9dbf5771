//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce how the client is
//! layered:
//! - No sleep() calls outside the session recovery timer
//! - Only the HTTP adapter talks to reqwest
//! - Outcome interpretation stays free of the runtime
//!
//! The helpers below walk the client sources relative to this crate.

use std::fs;
use std::path::{Path, PathBuf};

/// Root of the workspace
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

/// Source directory of the core library
#[must_use]
pub fn core_src() -> PathBuf {
    workspace_root().join("client").join("core").join("src")
}

/// Source directory of the command-line client
#[must_use]
pub fn cli_src() -> PathBuf {
    workspace_root().join("client").join("cli").join("src")
}

/// A Rust source file with its production part split off
pub struct SourceFile {
    /// Path on disk
    pub path: PathBuf,
    /// Lines before the first `#[cfg(test)]`
    pub production: Vec<String>,
}

impl SourceFile {
    /// Whether the path ends with `suffix` (component-wise)
    #[must_use]
    pub fn is(&self, suffix: &str) -> bool {
        self.path.ends_with(suffix)
    }

    /// Production lines with `//` comments stripped, numbered from 1
    pub fn code_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.production.iter().enumerate().map(|(idx, line)| {
            let code = line.split("//").next().unwrap_or(line);
            (idx + 1, code)
        })
    }
}

/// Every `.rs` file under `dir`
///
/// Returns an empty list if the directory does not exist.
#[must_use]
pub fn rust_sources(dir: &Path) -> Vec<SourceFile> {
    if !dir.exists() {
        return Vec::new();
    }

    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .filter_map(|entry| {
            let content = fs::read_to_string(entry.path()).ok()?;
            let production = content
                .lines()
                .take_while(|line| !line.trim_start().starts_with("#[cfg(test)]"))
                .map(String::from)
                .collect();
            Some(SourceFile {
                path: entry.path().to_path_buf(),
                production,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_sources_are_found() {
        let sources = rust_sources(&core_src());
        assert!(sources.iter().any(|file| file.is("lib.rs")));
        assert!(sources.iter().any(|file| file.is("backend/http.rs")));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        assert!(rust_sources(Path::new("/definitely/not/here")).is_empty());
    }
}
