// Injects THEMEPARK_VERSION from `git describe`, falling back to the package
// version when git or tags are unavailable.

use std::process::Command;

fn main() {
    let version = git_version().unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=THEMEPARK_VERSION={}", version);
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads");
    println!("cargo:rerun-if-changed=.git/refs/tags");
}

/// "v0.2.0" → "0.2.0", "v0.2.0-5-gabc123" → "0.2.0",
/// untagged "abc123-dirty" → "<pkg>-abc123-dirty"
fn git_version() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let described = String::from_utf8(output.stdout).ok()?;
    let described = described.trim();
    if described.is_empty() {
        return None;
    }

    match described.strip_prefix('v') {
        Some(tagged) => Some(tagged.split('-').next().unwrap_or(tagged).to_string()),
        None => Some(format!("{}-{}", env!("CARGO_PKG_VERSION"), described)),
    }
}
