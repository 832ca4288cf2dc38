//! Build script for meatmonsters
//!
//! Embeds the git revision, build time, target and compiler version so
//! `meatmonsters version` can report exactly what is running.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let git_hash = command_output("git", &["rev-parse", "--short=8", "HEAD"]);
    let git_dirty = command_output("git", &["status", "--porcelain"])
        .map(|status| !status.is_empty());

    let vars = [
        ("MEATMONSTERS_GIT_HASH", git_hash.unwrap_or_else(|| "unknown".to_string())),
        (
            "MEATMONSTERS_GIT_DIRTY",
            match git_dirty {
                Some(true) => "true".to_string(),
                Some(false) => "false".to_string(),
                None => "unknown".to_string(),
            },
        ),
        (
            "MEATMONSTERS_BUILD_TIMESTAMP",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ),
        ("MEATMONSTERS_TARGET", env_or_unknown("TARGET")),
        ("MEATMONSTERS_PROFILE", env_or_unknown("PROFILE")),
        (
            "MEATMONSTERS_RUSTC_VERSION",
            command_output("rustc", &["--version"]).unwrap_or_else(|| "unknown".to_string()),
        ),
    ];

    for (key, value) in vars {
        println!("cargo:rustc-env={}={}", key, value);
    }
}

/// Trimmed stdout of a successful command
fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn env_or_unknown(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| "unknown".to_string())
}
