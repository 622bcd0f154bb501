//! Embeds build identification for the startup log line.
//!
//! `GDSR_BUILD_ID` overrides the git revision (release tarballs have no
//! `.git` directory). No `rerun-if` directives: the script reruns on every
//! package change.

use std::process::Command;

fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let rev = String::from_utf8(output.stdout).ok()?;
    Some(rev.trim().to_string())
}

fn main() {
    let revision = std::env::var("GDSR_BUILD_ID")
        .ok()
        .filter(|id| !id.is_empty())
        .or_else(git_revision)
        .unwrap_or_else(|| "unknown".to_string());

    let built_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", revision);
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", built_at);
    println!("cargo:rustc-env=BUILD_PROFILE={}", profile);
}
