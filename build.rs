//! Bakes the project root into the sbcli binary as `SBCLI_ROOT_DIR`. It is
//! the default base directory of `sbcli configs`, so the generated configs
//! point at this checkout's `bin/` and `scripts/` directories.

use serde::Deserialize;
use std::{env, process::Command};

// Only the `workspace_root` field is needed from cargo's metadata
#[derive(Deserialize)]
struct Metadata {
    workspace_root: String,
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let cargo = env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());

    let output = Command::new(cargo)
        .arg("metadata")
        .arg("--format-version=1")
        .arg("--no-deps")
        .output()
        .expect("Failed to run cargo metadata");

    if !output.status.success() {
        panic!(
            "cargo metadata failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let metadata: Metadata =
        serde_json::from_slice(&output.stdout).expect("Failed to parse cargo metadata");

    println!("cargo:rustc-env=SBCLI_ROOT_DIR={}", metadata.workspace_root);
}
