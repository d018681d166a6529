// Embeds target triple, build date and git revision for `--build-info`

use std::process::Command;

fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn main() {
    let target = std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=TORBIT_TARGET={}", target);

    let built_at = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    println!("cargo:rustc-env=TORBIT_BUILD_TIMESTAMP={}", built_at);

    if let Some(commit) = git_short_hash() {
        println!("cargo:rustc-env=TORBIT_GIT_COMMIT={}", commit);
    }

    println!("cargo:rerun-if-changed=../../.git/HEAD");
}
