//! Build script for fpm-matcher
//!
//! Stamps `GIT_HASH`, `BUILD_TIMESTAMP` and `BUILD_PROFILE` into the crate,
//! read back by `fpm_matcher::build_identity`. No `rerun-if-changed` lines
//! are emitted, so every build refreshes them.

use std::process::Command;

const UNKNOWN: &str = "unknown";

/// Trimmed stdout of a successful `git` invocation
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn stamp(key: &str, value: &str) {
    println!("cargo:rustc-env={}={}", key, value);
}

fn main() {
    let commit = git(&["rev-parse", "--short=8", "HEAD"]).unwrap_or_else(|| UNKNOWN.into());
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| UNKNOWN.into());
    let built_at = chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false);

    stamp("GIT_HASH", &commit);
    stamp("BUILD_TIMESTAMP", &built_at);
    stamp("BUILD_PROFILE", &profile);
}
