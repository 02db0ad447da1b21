// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    // Re-run build script if git HEAD changes
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");

    // Packagers can pin the version string explicitly
    let version = match std::env::var("PANO_CAPTURE_VERSION") {
        Ok(v) => v,
        Err(_) => describe_version(),
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Build a version string from `git describe`, falling back to the crate version
fn describe_version() -> String {
    let crate_version = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".into());

    let described = Command::new("git")
        .args(["describe", "--tags", "--always", "--match", "v*"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string());

    match described {
        // "v0.1.0-5-gabcdef1" (commits after a tag) becomes "0.1.0-dirty-abcdef1"
        Some(desc) if desc.starts_with('v') && desc.contains('-') => {
            let desc = desc.trim_start_matches('v');
            let parts: Vec<&str> = desc.rsplitn(3, '-').collect();
            if parts.len() >= 3 {
                let hash = parts[0].strip_prefix('g').unwrap_or(parts[0]);
                format!("{}-dirty-{}", parts[2], hash)
            } else {
                desc.to_string()
            }
        }
        Some(desc) if desc.starts_with('v') => desc.trim_start_matches('v').to_string(),
        // No tags yet: plain commit hash
        Some(hash) => format!("{}-{}", crate_version, hash),
        None => crate_version,
    }
}
